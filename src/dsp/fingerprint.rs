//! Constellation fingerprinting and the offset-histogram matcher.
//!
//! Each spectrogram peak acts as an anchor paired with the peaks that follow
//! it within a short frame fan; a pair hashes to `(binA, binB, dt)`. Two
//! streams that share audio produce many pairs whose reference-minus-sample
//! anchor differences collapse onto a single offset bin, while chance
//! collisions scatter. The height of the tallest bin is both the match
//! decision and the confidence score.

use crate::dsp::peaks::{detect_peaks, PeakParams};
use crate::dsp::spectrogram::compute_spectrogram;
use crate::error::{Error, Result};
use crate::types::{MatchResult, Peak};
use std::collections::HashMap;

/// Two peak frequency bins and their gap in frames, `1 <= dt <= fan_frames`.
pub type HashKey = (usize, usize, usize);

/// Reference-side constellation index: hash key to anchor frames. Anchor
/// lists keep insertion order (ascending anchor frame) and duplicates.
#[derive(Clone, Debug, Default)]
pub struct Fingerprint {
    entries: HashMap<HashKey, Vec<usize>>,
}

impl Fingerprint {
    /// Total number of (key, anchor) pairs.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn anchors(&self, key: &HashKey) -> Option<&[usize]> {
        self.entries.get(key).map(Vec::as_slice)
    }
}

/// Pair every peak with the peaks following it by at most `fan_frames`
/// frames (self-pairs excluded) and index the pairs by hash key.
pub fn build_fingerprint(peaks: &[Peak], fan_frames: usize) -> Fingerprint {
    let sorted = sort_peaks(peaks);
    let mut entries: HashMap<HashKey, Vec<usize>> = HashMap::new();
    for_each_forward_pair(&sorted, fan_frames, |key, anchor| {
        entries.entry(key).or_default().push(anchor);
    });
    Fingerprint { entries }
}

/// Vote counts per `anchor_ref - anchor_sample` frame offset. Every anchor
/// in a reference list votes, duplicates included.
pub fn offset_histogram(
    reference: &Fingerprint,
    sample_peaks: &[Peak],
    fan_frames: usize,
) -> HashMap<i64, usize> {
    let sorted = sort_peaks(sample_peaks);
    let mut histogram: HashMap<i64, usize> = HashMap::new();
    for_each_forward_pair(&sorted, fan_frames, |key, sample_anchor| {
        if let Some(anchors) = reference.anchors(&key) {
            for &ref_anchor in anchors {
                *histogram
                    .entry(ref_anchor as i64 - sample_anchor as i64)
                    .or_insert(0) += 1;
            }
        }
    });
    histogram
}

/// The `(offset, count)` of the tallest histogram bin, or `None` when no
/// hash collided at all. Count ties resolve toward the smallest offset.
pub fn best_offset(histogram: &HashMap<i64, usize>) -> Option<(i64, usize)> {
    histogram
        .iter()
        .map(|(&offset, &count)| (offset, count))
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
}

fn sort_peaks(peaks: &[Peak]) -> Vec<Peak> {
    let mut sorted = peaks.to_vec();
    sorted.sort_by_key(|p| (p.frame, p.bin));
    sorted
}

/// Forward-fan traversal shared by the builder and the matcher: for each
/// anchor, visit later peaks until the frame gap exceeds `fan_frames`.
fn for_each_forward_pair(
    sorted: &[Peak],
    fan_frames: usize,
    mut emit: impl FnMut(HashKey, usize),
) {
    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            let dt = sorted[j].frame - sorted[i].frame;
            if dt > fan_frames {
                break;
            }
            if dt > 0 {
                emit((sorted[i].bin, sorted[j].bin, dt), sorted[i].frame);
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct MatcherParams {
    /// Sample rate every analyzed stream must already be at.
    pub sample_rate: u32,
    /// STFT window size.
    pub n_fft: usize,
    /// STFT hop, samples per frame.
    pub hop_length: usize,
    pub peak_threshold_db: f32,
    pub peak_neighborhood: usize,
    /// Forward pairing range, frames.
    pub fan_frames: usize,
    /// Histogram votes a single offset needs for a match verdict.
    pub min_count: usize,
}

impl Default for MatcherParams {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            n_fft: 2048,
            hop_length: 512,
            peak_threshold_db: -30.0,
            peak_neighborhood: 3,
            fan_frames: 5,
            min_count: 8,
        }
    }
}

/// Fingerprint comparison front-end holding validated tunables.
///
/// `build_reference` runs the spectrogram, peak and pairing stages once for
/// the excerpt; `compare` then scores any number of sample windows against
/// the cached result. `identify` is the one-shot build-then-compare form.
pub struct Matcher {
    params: MatcherParams,
}

impl Matcher {
    pub fn new(params: MatcherParams) -> Result<Self> {
        if params.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be positive".into()));
        }
        if params.n_fft == 0 || params.hop_length == 0 {
            return Err(Error::Config("n_fft and hop_length must be positive".into()));
        }
        if params.fan_frames == 0 {
            return Err(Error::Config("fan_frames must be positive".into()));
        }
        if params.min_count == 0 {
            return Err(Error::Config("min_count must be positive".into()));
        }
        if !params.peak_threshold_db.is_finite() {
            return Err(Error::Config("peak_threshold_db must be finite".into()));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &MatcherParams {
        &self.params
    }

    /// Spectrogram peaks of one stream (the C1 + C2 stages).
    pub fn peaks(&self, samples: &[f32]) -> Vec<Peak> {
        let spec = compute_spectrogram(
            samples,
            self.params.sample_rate,
            self.params.n_fft,
            self.params.hop_length,
        );
        detect_peaks(
            &spec,
            &PeakParams {
                threshold_db: self.params.peak_threshold_db,
                neighborhood: self.params.peak_neighborhood,
            },
        )
    }

    /// Fingerprint the excerpt once.
    pub fn build_reference(&self, samples: &[f32]) -> Fingerprint {
        build_fingerprint(&self.peaks(samples), self.params.fan_frames)
    }

    /// Score a sample stream against a prebuilt reference fingerprint.
    /// Degenerate inputs score `(false, 0)` rather than failing.
    pub fn compare(&self, reference: &Fingerprint, samples: &[f32]) -> MatchResult {
        let histogram = offset_histogram(reference, &self.peaks(samples), self.params.fan_frames);
        match best_offset(&histogram) {
            Some((_, best_count)) => MatchResult {
                is_match: best_count >= self.params.min_count,
                best_count,
            },
            None => MatchResult {
                is_match: false,
                best_count: 0,
            },
        }
    }

    /// Build-then-compare sugar for one-shot pairs of streams.
    pub fn identify(&self, reference: &[f32], sample: &[f32]) -> MatchResult {
        self.compare(&self.build_reference(reference), sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(bin: usize, frame: usize) -> Peak {
        Peak {
            bin,
            frame,
            level_db: -10.0,
        }
    }

    /// Several tones per frame so pairs exist within the fan window. All
    /// (bin, frame) combinations are distinct.
    fn staircase_peaks(frames: usize) -> Vec<Peak> {
        let mut peaks = Vec::new();
        for t in 0..frames {
            peaks.push(peak(10 + t, t));
            peaks.push(peak(100 + t, t));
        }
        peaks
    }

    /// Polyphonic test signal: eight seeded pseudo-random partials per
    /// quarter-second note. Dense enough in peaks for the constellation to
    /// bite, unlike a lone sine whose ridge yields almost no pairs.
    fn polyphony(seed: u64, num_samples: usize) -> Vec<f32> {
        let sample_rate = 16_000usize;
        let note_len = sample_rate / 4;
        let partials = 8usize;
        let num_notes = num_samples.div_ceil(note_len);

        let mut state = seed.wrapping_mul(2654435761) & 0xffff_ffff;
        let mut notes: Vec<Vec<f64>> = Vec::with_capacity(num_notes);
        for _ in 0..num_notes {
            let mut freqs = Vec::with_capacity(partials);
            for _ in 0..partials {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                freqs.push(300.0 + ((state >> 33) % 3700) as f64);
            }
            notes.push(freqs);
        }

        (0..num_samples)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                let sum: f64 = notes[i / note_len]
                    .iter()
                    .map(|f| (2.0 * std::f64::consts::PI * f * t).sin())
                    .sum();
                (sum / partials as f64) as f32
            })
            .collect()
    }

    #[test]
    fn fan_window_bounds_pairing() {
        let peaks = vec![peak(1, 0), peak(2, 3), peak(3, 5), peak(4, 9)];
        let fp = build_fingerprint(&peaks, 5);

        assert_eq!(fp.anchors(&(1, 2, 3)), Some(&[0][..]));
        assert_eq!(fp.anchors(&(1, 3, 5)), Some(&[0][..]));
        assert_eq!(fp.anchors(&(2, 3, 2)), Some(&[3][..]));
        assert_eq!(fp.anchors(&(3, 4, 4)), Some(&[5][..]));
        // frame 0 -> frame 9 exceeds the fan
        assert_eq!(fp.anchors(&(1, 4, 9)), None);
        assert_eq!(fp.len(), 4);
    }

    #[test]
    fn same_frame_peaks_never_pair() {
        let peaks = vec![peak(1, 0), peak(2, 0), peak(3, 0)];
        let fp = build_fingerprint(&peaks, 5);
        assert!(fp.is_empty());
    }

    #[test]
    fn anchor_lists_keep_insertion_order_and_duplicates() {
        // Two pairs producing the identical (key, anchor), plus a third
        // occurrence of the same key at a later anchor.
        let peaks = vec![
            peak(5, 0),
            peak(5, 0), // duplicate entry, must be retained rather than collapsed
            peak(7, 2),
            peak(5, 10),
            peak(7, 12),
        ];
        let fp = build_fingerprint(&peaks, 5);
        assert_eq!(fp.anchors(&(5, 7, 2)), Some(&[0, 0, 10][..]));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let peaks = staircase_peaks(40);
        let a = build_fingerprint(&peaks, 5);
        let b = build_fingerprint(&peaks, 5);
        assert_eq!(a.len(), b.len());
        for (key, anchors) in &a.entries {
            assert_eq!(b.anchors(key), Some(anchors.as_slice()));
        }
    }

    #[test]
    fn self_histogram_concentrates_at_zero() {
        let peaks = staircase_peaks(40);
        let fp = build_fingerprint(&peaks, 5);
        let histogram = offset_histogram(&fp, &peaks, 5);

        // Every (key, anchor) pair is unique here, so the zero bin holds
        // exactly one vote per forward pair.
        assert_eq!(histogram.get(&0), Some(&fp.len()));
        let (offset, count) = best_offset(&histogram).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(count, fp.len());
    }

    #[test]
    fn shifted_peaks_vote_for_the_shift() {
        let reference_peaks: Vec<Peak> = staircase_peaks(40)
            .into_iter()
            .map(|p| peak(p.bin, p.frame + 17))
            .collect();
        let sample_peaks = staircase_peaks(40);

        let fp = build_fingerprint(&reference_peaks, 5);
        let histogram = offset_histogram(&fp, &sample_peaks, 5);
        let (offset, count) = best_offset(&histogram).unwrap();
        assert_eq!(offset, 17);
        assert!(count > 0);
    }

    #[test]
    fn best_offset_tie_breaks_toward_smallest() {
        let mut histogram = HashMap::new();
        histogram.insert(12i64, 4usize);
        histogram.insert(-3i64, 4usize);
        histogram.insert(7i64, 2usize);
        assert_eq!(best_offset(&histogram), Some((-3, 4)));
    }

    #[test]
    fn identify_matches_a_stream_with_itself() {
        let matcher = Matcher::new(MatcherParams::default()).unwrap();
        let samples = polyphony(1, 16000 * 2);

        let result = matcher.identify(&samples, &samples);
        assert!(result.is_match, "self comparison must match");
        assert!(result.best_count >= matcher.params().min_count);
    }

    #[test]
    fn self_comparison_counts_every_forward_pair() {
        let matcher = Matcher::new(MatcherParams::default()).unwrap();
        let samples = polyphony(1, 16000 * 2);

        let reference = matcher.build_reference(&samples);
        let result = matcher.compare(&reference, &samples);
        // (key, anchor) pairs of this signal are unique, so the zero-offset
        // bin collects exactly one vote per pair
        assert_eq!(result.best_count, reference.len());
    }

    #[test]
    fn padding_shifts_the_histogram_argmax() {
        let matcher = Matcher::new(MatcherParams::default()).unwrap();
        let params = matcher.params().clone();
        let samples = polyphony(3, params.sample_rate as usize * 3);

        let pad_frames = 10usize;
        let mut padded = vec![0.0f32; pad_frames * params.hop_length];
        padded.extend_from_slice(&samples);

        let reference = matcher.build_reference(&padded);
        let histogram = offset_histogram(&reference, &matcher.peaks(&samples), params.fan_frames);
        let (offset, _) = best_offset(&histogram).unwrap();
        assert!(
            (offset - pad_frames as i64).abs() <= 1,
            "argmax {offset}, expected ~{pad_frames}"
        );
    }

    #[test]
    fn unrelated_streams_do_not_match() {
        let matcher = Matcher::new(MatcherParams::default()).unwrap();
        let a = polyphony(1, 16000 * 2);
        let b = polyphony(2, 16000 * 2);

        let result = matcher.identify(&a, &b);
        assert!(!result.is_match, "independent streams should not match");
        assert!(result.best_count < matcher.params().min_count);
    }

    #[test]
    fn empty_input_compares_cleanly() {
        let matcher = Matcher::new(MatcherParams::default()).unwrap();
        let samples = polyphony(1, 16000);

        let silent: Vec<f32> = Vec::new();
        let result = matcher.identify(&samples, &silent);
        assert_eq!(
            result,
            MatchResult {
                is_match: false,
                best_count: 0
            }
        );

        let result = matcher.identify(&silent, &samples);
        assert_eq!(
            result,
            MatchResult {
                is_match: false,
                best_count: 0
            }
        );
    }

    #[test]
    fn silence_yields_no_match() {
        let matcher = Matcher::new(MatcherParams::default()).unwrap();
        let silence = vec![0.0f32; 16000 * 5];
        let other = polyphony(1, 16000 * 5);

        let result = matcher.identify(&silence, &other);
        assert_eq!(
            result,
            MatchResult {
                is_match: false,
                best_count: 0
            }
        );
    }

    #[test]
    fn nonsense_tunables_are_rejected() {
        let defaults = MatcherParams::default;

        assert!(Matcher::new(MatcherParams {
            fan_frames: 0,
            ..defaults()
        })
        .is_err());
        assert!(Matcher::new(MatcherParams {
            min_count: 0,
            ..defaults()
        })
        .is_err());
        assert!(Matcher::new(MatcherParams {
            n_fft: 0,
            ..defaults()
        })
        .is_err());
        assert!(Matcher::new(MatcherParams {
            peak_threshold_db: f32::NAN,
            ..defaults()
        })
        .is_err());
    }
}
