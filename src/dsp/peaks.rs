use crate::types::{Peak, SpectrogramData};

#[derive(Clone, Debug)]
pub struct PeakParams {
    /// Cells below this level (dB) are never peaks.
    pub threshold_db: f32,
    /// Radius of the square neighborhood a peak must dominate, in cells.
    pub neighborhood: usize,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            threshold_db: -30.0,
            neighborhood: 3,
        }
    }
}

/// Find the 2-D local maxima of a spectrogram.
///
/// A cell qualifies when it is at or above `threshold_db` and no cell in its
/// neighborhood (clipped to the matrix bounds) exceeds it. The comparison is
/// `>=`, so every cell of a level plateau is reported; the matcher's offset
/// histogram absorbs the extra hash density. Peaks come out frame by frame,
/// ascending bin order within a frame.
pub fn detect_peaks(spec: &SpectrogramData, params: &PeakParams) -> Vec<Peak> {
    let frames = spec.num_frames();
    let bins = spec.num_bins();
    let n = params.neighborhood;
    let mut peaks = Vec::new();

    for t in 0..frames {
        for f in 0..bins {
            let val = spec.columns[t].db[f];
            if val < params.threshold_db {
                continue;
            }

            let t0 = t.saturating_sub(n);
            let t1 = (t + n + 1).min(frames);
            let f0 = f.saturating_sub(n);
            let f1 = (f + n + 1).min(bins);

            let mut local_max = f32::NEG_INFINITY;
            for col in &spec.columns[t0..t1] {
                for &v in &col.db[f0..f1] {
                    if v > local_max {
                        local_max = v;
                    }
                }
            }

            if val >= local_max {
                peaks.push(Peak {
                    bin: f,
                    frame: t,
                    level_db: val,
                });
            }
        }
    }

    peaks
}
