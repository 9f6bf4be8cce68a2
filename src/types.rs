use serde::Serialize;

/// Decoded mono audio at a known sample rate. Samples are in `[-1, 1]`.
#[derive(Clone, Debug)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the source file before the mono mixdown.
    pub channels: u32,
    pub duration_secs: f64,
}

impl AudioData {
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration_secs = samples.len() as f64 / sample_rate as f64;
        Self {
            samples,
            sample_rate,
            channels: 1,
            duration_secs,
        }
    }
}

/// One STFT frame: per-bin levels in dB relative to the spectrogram peak.
#[derive(Clone, Debug)]
pub struct SpectrogramColumn {
    pub db: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct SpectrogramData {
    pub columns: Vec<SpectrogramColumn>,
    pub freq_resolution: f64,
    pub time_resolution: f64,
    pub sample_rate: u32,
}

impl SpectrogramData {
    pub fn num_frames(&self) -> usize {
        self.columns.len()
    }

    pub fn num_bins(&self) -> usize {
        self.columns.first().map_or(0, |c| c.db.len())
    }
}

/// A spectrogram cell that is a local maximum over its neighborhood.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    /// Frequency bin index.
    pub bin: usize,
    /// STFT frame index.
    pub frame: usize,
    pub level_db: f32,
}

/// Verdict of one fingerprint comparison. `best_count` is the number of
/// hashes agreeing on the single most popular time offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub is_match: bool,
    pub best_count: usize,
}

/// Where the clip was found, in source-relative coordinates.
#[derive(Clone, Debug, Serialize)]
pub struct MatchLocation {
    /// Start of the clip within the full source, seconds.
    pub offset_secs: f64,
    /// Which source chunk the match was found in.
    pub chunk_index: usize,
    /// Histogram score of the matching window.
    pub best_count: usize,
}

impl MatchLocation {
    /// The offset as a `HH:MM:SS` timecode (whole seconds).
    pub fn timecode(&self) -> String {
        crate::search::timecode::sec_to_time(self.offset_secs as u64)
    }
}
