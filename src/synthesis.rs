//! Generative video synthesis client.
//!
//! Turns an ordered sequence of matched street-level images into one merged
//! drive-through video: each consecutive image pair becomes a generated
//! transition clip (a long-running operation on the generative backend,
//! polled until done), and the clips are concatenated with a fixed number of
//! tail frames trimmed from each to mask the seams. The backend is opaque;
//! a response without a usable video payload is a fatal synthesis error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::error::{Result, RoadviewError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL_ID: &str = "veo-3.1-generate-001";
const DEFAULT_PROMPT: &str = "A smooth driving roadview video transitioning from the first frame \
     to the second frame, as if a camera is moving forward along the road.";

/// Configuration for transition generation and the final merge.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Generative model identifier
    pub model_id: String,
    /// Prompt sent with every transition request
    pub prompt: String,
    /// Length of each generated clip in seconds
    pub duration_seconds: u32,
    pub aspect_ratio: String,
    pub resolution: String,
    /// Frames trimmed from the end of every clip before concatenation
    pub trim_tail_frames: u32,
    /// Delay between long-running operation polls
    pub poll_interval: Duration,
    /// Reuse transition clips already present on disk
    pub resume: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            duration_seconds: 4,
            aspect_ratio: "16:9".to_string(),
            resolution: "720p".to_string(),
            trim_tail_frames: 7,
            poll_interval: Duration::from_secs(10),
            resume: true,
        }
    }
}

/// Client for the generative video backend plus the local merge step.
pub struct VideoSynthesizer {
    client: Client,
    api_key: String,
    base_url: String,
    config: SynthesisConfig,
}

impl VideoSynthesizer {
    pub fn new(api_key: &str, config: SynthesisConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| RoadviewError::Synthesis {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            config,
        })
    }

    /// Generate pairwise transition clips for `image_paths` and merge them
    /// into `out_dir/out_file`. Intermediate clips live under
    /// `out_dir/clips` and are deleted after a successful merge.
    pub async fn synthesize(
        &self,
        image_paths: &[PathBuf],
        out_dir: &Path,
        out_file: &str,
    ) -> Result<PathBuf> {
        let clip_dir = out_dir.join("clips");
        tokio::fs::create_dir_all(&clip_dir).await?;

        let transitions = image_paths.len().saturating_sub(1);
        let mut clip_paths = Vec::with_capacity(transitions);

        for (i, pair) in image_paths.windows(2).enumerate() {
            let clip_path = clip_dir.join(format!("transition_{:03}.mp4", i + 1));

            if self.config.resume && clip_path.exists() {
                info!("Reusing existing clip {}", clip_path.display());
                clip_paths.push(clip_path);
                continue;
            }

            info!(
                "Generating transition {}/{}: {} -> {}",
                i + 1,
                transitions,
                pair[0].display(),
                pair[1].display()
            );
            self.generate_transition(&pair[0], &pair[1], &clip_path)
                .await?;
            clip_paths.push(clip_path);
        }

        if clip_paths.is_empty() {
            return Err(RoadviewError::Synthesis {
                message: "no transition clips were produced".to_string(),
            });
        }

        let artifact = out_dir.join(out_file);
        merge_clips(&clip_paths, &artifact, self.config.trim_tail_frames).await?;

        if let Err(err) = tokio::fs::remove_dir_all(&clip_dir).await {
            warn!(
                "Could not remove clip directory {}: {}",
                clip_dir.display(),
                err
            );
        }

        Ok(artifact)
    }

    /// Generate one transition clip from a first and last frame.
    async fn generate_transition(
        &self,
        first_frame: &Path,
        last_frame: &Path,
        out_path: &Path,
    ) -> Result<()> {
        let first = encode_image(first_frame).await?;
        let last = encode_image(last_frame).await?;

        let url = format!(
            "{}/models/{}:predictLongRunning?key={}",
            self.base_url, self.config.model_id, self.api_key
        );
        let body = json!({
            "instances": [{
                "prompt": self.config.prompt,
                "image": {"bytesBase64Encoded": first, "mimeType": "image/png"},
                "lastFrame": {"bytesBase64Encoded": last, "mimeType": "image/png"},
            }],
            "parameters": {
                "durationSeconds": self.config.duration_seconds,
                "aspectRatio": self.config.aspect_ratio,
                "resolution": self.config.resolution,
                "sampleCount": 1,
            },
        });

        let operation: Value = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RoadviewError::Synthesis {
                message: format!("generate request failed: {}", e),
            })?
            .error_for_status()
            .map_err(|e| RoadviewError::Synthesis {
                message: format!("generate request rejected: {}", e),
            })?
            .json()
            .await
            .map_err(|e| RoadviewError::Synthesis {
                message: format!("unparsable generate response: {}", e),
            })?;

        let name = operation
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RoadviewError::Synthesis {
                message: "generate response carries no operation name".to_string(),
            })?;

        let done = self.poll_operation(name).await?;
        let video = done
            .pointer("/response/generateVideoResponse/generatedSamples/0/video")
            .ok_or_else(|| RoadviewError::Synthesis {
                message: "operation finished without a generated video".to_string(),
            })?;

        self.save_video(video, out_path).await
    }

    /// Poll a long-running operation until it reports `done`.
    async fn poll_operation(&self, name: &str) -> Result<Value> {
        let url = format!("{}/{}?key={}", self.base_url, name, self.api_key);

        loop {
            let operation: Value = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| RoadviewError::Synthesis {
                    message: format!("operation poll failed: {}", e),
                })?
                .json()
                .await
                .map_err(|e| RoadviewError::Synthesis {
                    message: format!("unparsable operation state: {}", e),
                })?;

            if operation.get("done").and_then(Value::as_bool) == Some(true) {
                if let Some(err) = operation.get("error") {
                    return Err(RoadviewError::Synthesis {
                        message: format!("operation failed: {}", err),
                    });
                }
                return Ok(operation);
            }

            debug!("Operation {} still running", name);
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Persist a generated video, either by downloading its URI or by
    /// decoding inline bytes. Any other payload shape is fatal.
    async fn save_video(&self, video: &Value, out_path: &Path) -> Result<()> {
        if let Some(uri) = video.get("uri").and_then(Value::as_str) {
            if !uri.starts_with("http://") && !uri.starts_with("https://") {
                return Err(RoadviewError::Synthesis {
                    message: format!("unsupported video URI scheme: {}", uri),
                });
            }

            debug!("Downloading generated clip from {}", uri);
            let bytes = self
                .client
                .get(uri)
                .query(&[("key", self.api_key.as_str())])
                .send()
                .await
                .map_err(|e| RoadviewError::Synthesis {
                    message: format!("clip download failed: {}", e),
                })?
                .error_for_status()
                .map_err(|e| RoadviewError::Synthesis {
                    message: format!("clip download rejected: {}", e),
                })?
                .bytes()
                .await
                .map_err(|e| RoadviewError::Synthesis {
                    message: format!("clip download interrupted: {}", e),
                })?;

            tokio::fs::write(out_path, &bytes).await?;
            return Ok(());
        }

        if let Some(encoded) = video.get("bytesBase64Encoded").and_then(Value::as_str) {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| RoadviewError::Synthesis {
                    message: format!("invalid inline video payload: {}", e),
                })?;
            tokio::fs::write(out_path, &bytes).await?;
            return Ok(());
        }

        Err(RoadviewError::Synthesis {
            message: "video response carries neither a URI nor inline bytes".to_string(),
        })
    }
}

/// Read an image file and base64-encode it for the generate request.
async fn encode_image(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| RoadviewError::Synthesis {
            message: format!("cannot read frame {}: {}", path.display(), e),
        })?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Concatenate clips into `output`, trimming `trim_tail_frames` frames from
/// the end of each. Clips trimmed to nothing are skipped with a warning;
/// ending up with zero clips is fatal.
async fn merge_clips(clips: &[PathBuf], output: &Path, trim_tail_frames: u32) -> Result<()> {
    let mut kept: Vec<(PathBuf, f64)> = Vec::with_capacity(clips.len());

    for clip in clips {
        let (fps, duration) = probe_clip(clip).await?;
        let trim_secs = if fps > 0.0 {
            trim_tail_frames as f64 / fps
        } else {
            0.0
        };
        let keep = duration - trim_secs;
        if keep <= 0.0 {
            warn!("Clip {} is too short after trimming, skipping", clip.display());
            continue;
        }
        kept.push((clip.clone(), keep));
    }

    if kept.is_empty() {
        return Err(RoadviewError::Merge {
            message: "no clips left to merge after trimming".to_string(),
        });
    }

    info!(
        "Merging {} clips into {} ({} tail frames trimmed per clip)",
        kept.len(),
        output.display(),
        trim_tail_frames
    );

    // The concat demuxer takes a per-file outpoint, which handles the tail
    // trim without re-cutting each clip separately.
    let list_path = output.with_extension("concat.txt");
    let mut list = String::new();
    for (clip, keep) in &kept {
        list.push_str(&format!("file '{}'\noutpoint {:.6}\n", clip.display(), keep));
    }
    tokio::fs::write(&list_path, list).await?;

    let ffmpeg = Command::new("ffmpeg")
        .args(["-y", "-f", "concat", "-safe", "0", "-i"])
        .arg(&list_path)
        .args(["-c:v", "libx264", "-an"])
        .arg(output)
        .output()
        .await
        .map_err(|e| RoadviewError::Merge {
            message: format!("failed to run ffmpeg: {}", e),
        })?;

    tokio::fs::remove_file(&list_path).await.ok();

    if !ffmpeg.status.success() {
        return Err(RoadviewError::Merge {
            message: format!(
                "ffmpeg exited with {}: {}",
                ffmpeg.status,
                String::from_utf8_lossy(&ffmpeg.stderr)
            ),
        });
    }

    Ok(())
}

/// Probe a clip's frame rate and duration with ffprobe.
async fn probe_clip(path: &Path) -> Result<(f64, f64)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=r_frame_rate",
            "-show_entries",
            "format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| RoadviewError::Merge {
            message: format!("failed to run ffprobe: {}", e),
        })?;

    if !output.status.success() {
        return Err(RoadviewError::Merge {
            message: format!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }

    let probe: Value =
        serde_json::from_slice(&output.stdout).map_err(|e| RoadviewError::Merge {
            message: format!("unparsable ffprobe output: {}", e),
        })?;

    let fps = probe
        .pointer("/streams/0/r_frame_rate")
        .and_then(Value::as_str)
        .and_then(parse_frame_rate)
        .unwrap_or(0.0);
    let duration = probe
        .pointer("/format/duration")
        .and_then(Value::as_str)
        .and_then(|d| d.parse().ok())
        .ok_or_else(|| RoadviewError::Merge {
            message: format!("clip {} has no duration", path.display()),
        })?;

    Ok((fps, duration))
}

/// Parse an ffprobe rational frame rate such as `30/1` or `30000/1001`.
fn parse_frame_rate(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        let ntsc = parse_frame_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("30"), None);
        assert_eq!(parse_frame_rate("30/0"), None);
    }

    #[test]
    fn test_default_config() {
        let config = SynthesisConfig::default();
        assert_eq!(config.trim_tail_frames, 7);
        assert_eq!(config.duration_seconds, 4);
        assert!(config.resume);
    }
}
