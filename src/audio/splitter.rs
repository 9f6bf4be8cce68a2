//! Large-file segmentation through the external ffmpeg binary.
//!
//! A multi-hour source is stream-copied into bounded `.m4a` segments so the
//! search only ever decodes one of them at a time. Segment `k` of a prefix
//! lives at `<prefix>_kkk.m4a` and starts at global time `k * segment_secs`.

use crate::audio::loader;
use crate::error::{Error, Result};
use crate::types::AudioData;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Split `input` into consecutive segments of at most `segment_secs`
/// seconds each, written next to `output_prefix`. The audio stream is
/// copied, not re-encoded. Returns the segment paths in chunk order.
pub fn split_file(input: &Path, segment_secs: u64, output_prefix: &Path) -> Result<Vec<PathBuf>> {
    if let Some(dir) = output_prefix.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let pattern = format!("{}_%03d.m4a", output_prefix.display());
    info!(
        "segmenting {} into {segment_secs} s pieces",
        input.display()
    );

    let output = Command::new("ffmpeg")
        .args(["-loglevel", "quiet", "-y", "-i"])
        .arg(input)
        .args(["-f", "segment", "-segment_time"])
        .arg(segment_secs.to_string())
        .args(["-c", "copy"])
        .arg(&pattern)
        .output()
        .map_err(|e| Error::Tool(format!("ffmpeg not found: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Tool(format!("segmenting failed: {stderr}")));
    }

    let segments = segment_paths(output_prefix);
    if segments.is_empty() {
        return Err(Error::Tool("ffmpeg produced no segments".into()));
    }
    debug!("wrote {} segments", segments.len());
    Ok(segments)
}

/// Enumerate existing segment files for a prefix, in chunk order.
pub fn segment_paths(prefix: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for index in 0.. {
        let path = segment_path(prefix, index);
        if !path.exists() {
            break;
        }
        paths.push(path);
    }
    paths
}

/// Path of segment `index` for a prefix: `<prefix>_000.m4a` etc.
pub fn segment_path(prefix: &Path, index: usize) -> PathBuf {
    PathBuf::from(format!("{}_{index:03}.m4a", prefix.display()))
}

/// Lazily decode segment files at `target_rate`, one per iteration, so the
/// caller never holds more than a single chunk.
pub fn load_segments<'a>(
    paths: &'a [PathBuf],
    target_rate: u32,
) -> impl Iterator<Item = Result<AudioData>> + 'a {
    paths
        .iter()
        .map(move |path| loader::load_file(path, target_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_names_are_zero_padded() {
        let prefix = Path::new("/tmp/segments/part");
        assert_eq!(
            segment_path(prefix, 0),
            PathBuf::from("/tmp/segments/part_000.m4a")
        );
        assert_eq!(
            segment_path(prefix, 41),
            PathBuf::from("/tmp/segments/part_041.m4a")
        );
        // widens naturally past 999
        assert_eq!(
            segment_path(prefix, 1000),
            PathBuf::from("/tmp/segments/part_1000.m4a")
        );
    }

    #[test]
    fn enumeration_stops_at_the_first_gap() {
        let dir = std::env::temp_dir().join("clipseek-splitter-test");
        std::fs::create_dir_all(&dir).unwrap();
        let prefix = dir.join("seg");

        for index in [0usize, 1, 3] {
            std::fs::write(segment_path(&prefix, index), b"x").unwrap();
        }

        let paths = segment_paths(&prefix);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1], segment_path(&prefix, 1));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
