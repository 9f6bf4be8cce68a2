//! Sliding-window search for a clip across a long, pre-chunked source.
//!
//! The clip is fingerprinted once; the source is consumed one chunk at a
//! time, never holding more than one decoded chunk. Each chunk is scanned
//! left to right in overlapping query windows, and the first window the
//! matcher accepts is refined by cross-correlation into the final offset.
//! The tail of every chunk is carried into the next one so a clip straddling
//! a chunk boundary still falls wholly inside some window.

pub mod timecode;

use crate::dsp::correlate::find_offset;
use crate::dsp::fingerprint::{Matcher, MatcherParams};
use crate::error::{Error, Result};
use crate::types::{AudioData, MatchLocation};
use log::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct SearchParams {
    pub matcher: MatcherParams,
    /// Upper bound on chunk duration, seconds. Chunk `k` is assumed to
    /// start at global time `k * split_duration`.
    pub split_duration: u64,
    /// Seconds of the clip head handed to the correlation refiner.
    pub correlation_head_secs: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            matcher: MatcherParams::default(),
            split_duration: 3600,
            correlation_head_secs: 10,
        }
    }
}

/// Query-window geometry derived from the clip length.
///
/// The overlap is twice the clip length, added on both sides of every
/// window while the stride stays at `segment_secs`; any clip-length
/// interval therefore lies wholly inside at least one window. Short clips
/// get a larger segment multiplier: the sparser the clip's hashes, the
/// less competing content a window should contain.
#[derive(Clone, Debug)]
pub struct WindowPlan {
    pub overlap_secs: f64,
    pub segment_secs: f64,
}

impl WindowPlan {
    pub fn for_clip_seconds(clip_secs: f64) -> Self {
        let whole = clip_secs.floor();
        let segment_secs = if whole > 60.0 { whole * 6.0 } else { whole * 15.0 };
        Self {
            overlap_secs: whole * 2.0,
            segment_secs,
        }
    }

    /// The `(seg_start, seg_end)` query windows covering one chunk.
    /// `lookback_secs` is how far the first window may reach back into the
    /// previous chunk's carried tail; starts are negative in that range.
    pub fn windows(&self, duration_secs: f64, lookback_secs: f64) -> Vec<(f64, f64)> {
        let mut out = Vec::new();
        if self.segment_secs <= 0.0 {
            return out;
        }
        let mut current = 0.0;
        while current < duration_secs {
            let seg_start = (current - self.overlap_secs).max(-lookback_secs);
            let seg_end = (current + self.segment_secs + self.overlap_secs).min(duration_secs);
            if seg_start >= seg_end {
                break;
            }
            out.push((seg_start, seg_end));
            current += self.segment_secs;
        }
        out
    }
}

/// Find where `clip` starts inside the source, given as an iterator of
/// decoded chunks in ascending order. Returns `Ok(None)` when no window
/// matches. A chunk that fails to decode is skipped with a diagnostic;
/// every other failure surfaces immediately.
pub fn locate_clip<I>(clip: &AudioData, chunks: I, params: &SearchParams) -> Result<Option<MatchLocation>>
where
    I: IntoIterator<Item = Result<AudioData>>,
{
    let matcher = Matcher::new(params.matcher.clone())?;
    validate_clip(clip, matcher.params())?;

    let reference = matcher.build_reference(&clip.samples);
    if reference.is_empty() {
        warn!("clip produced no fingerprint hashes; nothing can match");
        return Ok(None);
    }

    let plan = WindowPlan::for_clip_seconds(clip.duration_secs);
    debug!(
        "window plan: segment {:.0} s, overlap {:.0} s, {} reference hashes",
        plan.segment_secs,
        plan.overlap_secs,
        reference.len()
    );

    let sample_rate = matcher.params().sample_rate;
    // Tail of the previous chunk, for windows that straddle the boundary
    let mut carry: Vec<f32> = Vec::new();

    for (chunk_index, chunk) in chunks.into_iter().enumerate() {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("skipping chunk {chunk_index}: {e}");
                carry.clear(); // cannot bridge across a missing chunk
                continue;
            }
        };
        if chunk.sample_rate != sample_rate {
            return Err(Error::InvalidInput(format!(
                "chunk {chunk_index} is at {} Hz, expected {sample_rate} Hz",
                chunk.sample_rate
            )));
        }

        let base_secs = chunk_index as f64 * params.split_duration as f64;
        let carry_secs = carry.len() as f64 / sample_rate as f64;

        for (seg_start, seg_end) in plan.windows(chunk.duration_secs, carry_secs) {
            let window = window_samples(&carry, &chunk.samples, sample_rate, seg_start, seg_end);
            let result = matcher.compare(&reference, &window);
            debug!(
                "chunk {chunk_index}, window {} ~ {}: match={}, count={}",
                timecode::sec_to_time((base_secs + seg_start).max(0.0) as u64),
                timecode::sec_to_time((base_secs + seg_end) as u64),
                result.is_match,
                result.best_count
            );

            if result.is_match {
                let within =
                    find_offset(&window, sample_rate, &clip.samples, params.correlation_head_secs);
                let offset_secs = base_secs + seg_start + within;
                let location = MatchLocation {
                    offset_secs,
                    chunk_index,
                    best_count: result.best_count,
                };
                info!(
                    "matched at {} ({} agreeing hashes)",
                    location.timecode(),
                    location.best_count
                );
                return Ok(Some(location));
            }
        }

        let keep = ((plan.overlap_secs * sample_rate as f64) as usize).min(chunk.samples.len());
        carry = chunk.samples[chunk.samples.len() - keep..].to_vec();
    }

    Ok(None)
}

/// Copy one query window out of the carried tail plus the current chunk.
/// `seg_start` may be negative, reaching into the carry.
fn window_samples(carry: &[f32], chunk: &[f32], sample_rate: u32, seg_start: f64, seg_end: f64) -> Vec<f32> {
    let hi = ((seg_end * sample_rate as f64).round() as usize).min(chunk.len());
    let lo = (seg_start * sample_rate as f64).round() as i64;
    if lo >= 0 {
        chunk[(lo as usize).min(hi)..hi].to_vec()
    } else {
        let tail = (-lo as usize).min(carry.len());
        let mut window = Vec::with_capacity(tail + hi);
        window.extend_from_slice(&carry[carry.len() - tail..]);
        window.extend_from_slice(&chunk[..hi]);
        window
    }
}

fn validate_clip(clip: &AudioData, params: &MatcherParams) -> Result<()> {
    if clip.samples.is_empty() {
        return Err(Error::InvalidInput("clip is empty".into()));
    }
    if clip.sample_rate != params.sample_rate {
        return Err(Error::InvalidInput(format!(
            "clip is at {} Hz, expected {} Hz",
            clip.sample_rate, params.sample_rate
        )));
    }
    if clip.samples.len() < params.n_fft {
        return Err(Error::InvalidInput(format!(
            "clip holds {} samples, shorter than one {}-sample analysis window",
            clip.samples.len(),
            params.n_fft
        )));
    }
    // The window plan derives from the whole-second clip length; a
    // sub-second clip would make the stride zero
    if clip.duration_secs < 1.0 {
        return Err(Error::InvalidInput(
            "clip must be at least one second long".into(),
        ));
    }
    if clip.samples.iter().any(|s| !s.is_finite()) {
        return Err(Error::InvalidInput(
            "clip contains non-finite samples".into(),
        ));
    }
    Ok(())
}
