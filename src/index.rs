//! Image index built from filename-encoded coordinates.
//!
//! Street-level photographs carry their own geotag in the filename:
//! `<lon>,<lat>,<heading>.png` (commas and whitespace are interchangeable,
//! trailing tokens are ignored). The index is rebuilt from a directory
//! snapshot for every matching run and discarded afterward.

use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// File extension accepted by the index builder, compared case-insensitively.
pub const IMAGE_EXTENSION: &str = "png";

/// A geotagged street-level photograph, parsed from its filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Filename including extension; unique within one index
    pub filename: String,
    pub longitude: f64,
    pub latitude: f64,
    /// Camera heading in degrees
    pub heading: f64,
}

/// All image records loaded for one matching run, plus the names of image
/// files whose stems could not be parsed.
///
/// Record order is directory listing order, which is platform-dependent;
/// callers must not rely on it beyond the matcher's first-minimum tie-break.
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    pub records: Vec<ImageRecord>,
    /// Image files rejected during parsing (too few tokens or non-numeric),
    /// kept so the skip-on-parse-failure behavior stays observable
    pub skipped: Vec<String>,
}

impl ImageIndex {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Build an image index from a directory snapshot.
///
/// Lists entries whose extension equals [`IMAGE_EXTENSION`] case-insensitively
/// and parses each stem as `lon lat heading [extra...]`. Unparsable names are
/// recorded in `skipped`. A missing or unreadable directory degrades to an
/// empty index with a warning; it is not an error.
pub fn load_image_index(dir: &Path) -> ImageIndex {
    let mut index = ImageIndex::default();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(
                "Image folder {} is not readable ({}), matching will run against an empty index",
                dir.display(),
                err
            );
            return index;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(IMAGE_EXTENSION));
        if !is_image {
            continue;
        }

        let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };

        match parse_stem(stem) {
            Some((longitude, latitude, heading)) => index.records.push(ImageRecord {
                filename: filename.to_string(),
                longitude,
                latitude,
                heading,
            }),
            None => {
                debug!("Skipping image with unparsable name: {}", filename);
                index.skipped.push(filename.to_string());
            }
        }
    }

    index
}

/// Parse `lon lat heading` from a filename stem, treating commas as
/// whitespace. Extra trailing tokens are ignored.
fn parse_stem(stem: &str) -> Option<(f64, f64, f64)> {
    let normalized = stem.replace(',', " ");
    let mut tokens = normalized.split_whitespace();

    let longitude = tokens.next()?.parse().ok()?;
    let latitude = tokens.next()?.parse().ok()?;
    let heading = tokens.next()?.parse().ok()?;

    Some((longitude, latitude, heading))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).unwrap();
    }

    #[test]
    fn test_parse_stem_formats() {
        assert_eq!(
            parse_stem("126.5,37.2,45"),
            Some((126.5, 37.2, 45.0))
        );
        assert_eq!(
            parse_stem("126.5 37.2 45"),
            Some((126.5, 37.2, 45.0))
        );
        // Mixed separators and extra trailing tokens
        assert_eq!(
            parse_stem("126.5, 37.2, 45, extra"),
            Some((126.5, 37.2, 45.0))
        );
        assert_eq!(parse_stem("126.5,37.2"), None);
        assert_eq!(parse_stem("a,b,c"), None);
    }

    #[test]
    fn test_load_index_parses_valid_names() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "126.5,37.2,45.png");
        touch(dir.path(), "126.6 37.3 90.PNG");

        let index = load_image_index(dir.path());
        assert_eq!(index.len(), 2);
        assert!(index.skipped.is_empty());

        let record = index
            .records
            .iter()
            .find(|r| r.filename == "126.5,37.2,45.png")
            .unwrap();
        assert_eq!(record.longitude, 126.5);
        assert_eq!(record.latitude, 37.2);
        assert_eq!(record.heading, 45.0);
    }

    #[test]
    fn test_load_index_records_skipped_names() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "126.5,37.2,45.png");
        touch(dir.path(), "126.5,37.2.png"); // too few tokens
        touch(dir.path(), "lon,lat,heading.png"); // non-numeric

        let index = load_image_index(dir.path());
        assert_eq!(index.len(), 1);
        assert_eq!(index.skipped.len(), 2);
    }

    #[test]
    fn test_load_index_wrong_extension_excluded_entirely() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "126.5 37.2 45.mp4");

        let index = load_image_index(dir.path());
        assert!(index.is_empty());
        // Not even counted as skipped: it never qualified as an image
        assert!(index.skipped.is_empty());
    }

    #[test]
    fn test_load_index_missing_directory_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let index = load_image_index(&missing);
        assert!(index.is_empty());
        assert!(index.skipped.is_empty());
    }
}
