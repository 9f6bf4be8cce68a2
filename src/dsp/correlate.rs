//! FFT cross-correlation for sample-accurate match refinement.
//!
//! The histogram matcher localizes to a frame; this stage recovers the exact
//! sample where the clip starts inside an already-matched window.

use realfft::RealFftPlanner;
use std::cell::RefCell;

thread_local! {
    static XCORR_PLANNER: RefCell<RealFftPlanner<f32>> = RefCell::new(RealFftPlanner::new());
}

/// Locate the start of `clip` within `window` by linear cross-correlation.
///
/// Only the first `head_secs` seconds of the clip are correlated (the full
/// clip when it is shorter); that is enough to pin down the start and keeps
/// the transform small when the match is already known to exist. Both inputs
/// are zero-padded past `window.len() + head.len() - 1` so the circular
/// product is linear, and only lags where the head fits entirely inside the
/// window are considered. Returns window-local seconds rounded to 0.01 s.
pub fn find_offset(window: &[f32], sample_rate: u32, clip: &[f32], head_secs: u32) -> f64 {
    let head_len = (head_secs as usize * sample_rate as usize).min(clip.len());
    if head_len == 0 || window.len() < head_len {
        return 0.0;
    }
    let head = &clip[..head_len];

    let fft_len = (window.len() + head_len - 1).next_power_of_two().max(2);
    let (fft, ifft) = XCORR_PLANNER.with(|p| {
        let mut p = p.borrow_mut();
        (p.plan_fft_forward(fft_len), p.plan_fft_inverse(fft_len))
    });

    let mut padded = fft.make_input_vec();
    padded[..window.len()].copy_from_slice(window);
    let mut window_spectrum = fft.make_output_vec();
    fft.process(&mut padded, &mut window_spectrum)
        .expect("FFT failed");

    padded.fill(0.0);
    padded[..head_len].copy_from_slice(head);
    let mut head_spectrum = fft.make_output_vec();
    fft.process(&mut padded, &mut head_spectrum)
        .expect("FFT failed");

    // corr[k] = sum window[k+i] * head[i]: multiply by the conjugate spectrum
    for (w, h) in window_spectrum.iter_mut().zip(head_spectrum.iter()) {
        *w *= h.conj();
    }
    // The inverse transform requires exactly real DC and Nyquist bins;
    // rounding can leave them with a tiny imaginary residue
    window_spectrum[0].im = 0.0;
    if let Some(last) = window_spectrum.last_mut() {
        last.im = 0.0;
    }

    let mut correlation = ifft.make_output_vec();
    ifft.process(&mut window_spectrum, &mut correlation)
        .expect("FFT failed");

    // Lags where the head lies fully inside the window
    let valid = window.len() - head_len + 1;
    let mut best_lag = 0usize;
    let mut best_val = f32::NEG_INFINITY;
    for (lag, &v) in correlation[..valid].iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_lag = lag;
        }
    }

    round_centis(best_lag as f64 / sample_rate as f64)
}

fn round_centis(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}
