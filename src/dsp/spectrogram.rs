use crate::types::{SpectrogramColumn, SpectrogramData};
use realfft::RealFftPlanner;
use std::cell::RefCell;
use std::collections::HashMap;

/// Levels this far below the spectrogram peak are clamped. Matches the
/// 80 dB dynamic range the peak picker is tuned against.
pub const DB_FLOOR: f32 = -80.0;

/// Magnitude floor for the dB conversion, keeps log10 away from -inf.
const AMIN: f32 = 1e-10;

thread_local! {
    static FFT_PLANNER: RefCell<RealFftPlanner<f32>> = RefCell::new(RealFftPlanner::new());
    static HANN_CACHE: RefCell<HashMap<usize, Vec<f32>>> = RefCell::new(HashMap::new());
}

/// Periodic Hann window (denominator `size`, the STFT analysis variant).
fn hann_window(size: usize) -> Vec<f32> {
    HANN_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .entry(size)
            .or_insert_with(|| {
                (0..size)
                    .map(|i| {
                        0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos())
                    })
                    .collect()
            })
            .clone()
    })
}

/// Compute a log-magnitude spectrogram via STFT.
///
/// Frames are emitted only where a full `n_fft` window fits (no boundary
/// padding), so an input shorter than `n_fft` yields zero frames. Levels are
/// in dB relative to the loudest cell, which therefore sits at exactly 0 dB;
/// everything is clamped at [`DB_FLOOR`]. An all-silent input has no peak to
/// normalize against and comes back pinned to the floor.
pub fn compute_spectrogram(
    samples: &[f32],
    sample_rate: u32,
    n_fft: usize,
    hop_length: usize,
) -> SpectrogramData {
    let fft = FFT_PLANNER.with(|p| p.borrow_mut().plan_fft_forward(n_fft));
    let window = hann_window(n_fft);

    // Pre-allocate FFT buffers once and reuse across frames
    let mut input = fft.make_input_vec();
    let mut spectrum = fft.make_output_vec();

    let mut magnitudes: Vec<Vec<f32>> = Vec::new();
    let mut peak_magnitude = 0.0f32;

    let mut pos = 0;
    while pos + n_fft <= samples.len() {
        for (inp, (&s, &w)) in input
            .iter_mut()
            .zip(samples[pos..pos + n_fft].iter().zip(window.iter()))
        {
            *inp = s * w;
        }

        fft.process(&mut input, &mut spectrum).expect("FFT failed");

        let mags: Vec<f32> = spectrum.iter().map(|c| c.norm()).collect();
        for &m in &mags {
            if m > peak_magnitude {
                peak_magnitude = m;
            }
        }
        magnitudes.push(mags);

        pos += hop_length;
    }

    let columns = magnitudes
        .into_iter()
        .map(|mags| SpectrogramColumn {
            db: mags.iter().map(|&m| to_db(m, peak_magnitude)).collect(),
        })
        .collect();

    SpectrogramData {
        columns,
        freq_resolution: sample_rate as f64 / n_fft as f64,
        time_resolution: hop_length as f64 / sample_rate as f64,
        sample_rate,
    }
}

fn to_db(magnitude: f32, reference: f32) -> f32 {
    if reference <= AMIN {
        // Silent input: no meaningful reference level
        return DB_FLOOR;
    }
    (20.0 * (magnitude.max(AMIN) / reference).log10()).max(DB_FLOOR)
}
