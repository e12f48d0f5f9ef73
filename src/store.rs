//! Job state store for the server layer.
//!
//! The store replaces a process-wide mutable cache with an injected
//! key-value dependency: each request signature maps to an enumerated job
//! state, and the background synthesis worker updates the entry on both
//! success and failure. Swapping in a persistent or distributed store only
//! requires another [`VideoStore`] implementation; the matching core never
//! touches this module.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

/// The four-coordinate request signature identifying one drive-through job.
///
/// Coordinates are kept as the strings received at the HTTP boundary, so the
/// key is exact (no float round-tripping) and hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub start_lng: String,
    pub start_lat: String,
    pub end_lng: String,
    pub end_lat: String,
}

impl RequestKey {
    pub fn new(start_lng: &str, start_lat: &str, end_lng: &str, end_lat: &str) -> Self {
        Self {
            start_lng: start_lng.to_string(),
            start_lat: start_lat.to_string(),
            end_lng: end_lng.to_string(),
            end_lat: end_lat.to_string(),
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.start_lng, self.start_lat, self.end_lng, self.end_lat
        )
    }
}

/// State of one drive-through job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Synthesis is running in the background
    Pending,
    /// The final artifact is available at this path
    Ready(PathBuf),
    /// No job is known for this key
    Absent,
}

/// Key-value store exposing job state to concurrent readers.
///
/// Implementations must be safe to share across the request handlers and the
/// background worker.
pub trait VideoStore: Send + Sync {
    /// Current state for a key; unknown keys are [`JobState::Absent`].
    fn get(&self, key: &RequestKey) -> JobState;

    /// Mark a job as running.
    fn mark_pending(&self, key: &RequestKey);

    /// Record the finished artifact for a key.
    fn complete(&self, key: &RequestKey, artifact: PathBuf);

    /// Clear a failed job so the request can be retried.
    fn fail(&self, key: &RequestKey);
}

/// In-memory store over a mutex-guarded map. Suitable for a single-process
/// server; entries do not survive restarts (completed artifacts are
/// re-adopted from disk by the server layer).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<RequestKey, JobState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VideoStore for MemoryStore {
    fn get(&self, key: &RequestKey) -> JobState {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned().unwrap_or(JobState::Absent)
    }

    fn mark_pending(&self, key: &RequestKey) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.clone(), JobState::Pending);
    }

    fn complete(&self, key: &RequestKey, artifact: PathBuf) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.clone(), JobState::Ready(artifact));
    }

    fn fail(&self, key: &RequestKey) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }
}
