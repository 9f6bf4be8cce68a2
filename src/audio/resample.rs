//! Sample-rate conversion to the fixed analysis rate.

use crate::error::{Error, Result};
use crate::types::AudioData;
use log::debug;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Resample decoded mono audio to `target_rate`. Audio already at the
/// target rate passes through untouched.
pub fn resample(audio: AudioData, target_rate: u32) -> Result<AudioData> {
    if audio.sample_rate == target_rate {
        return Ok(audio);
    }

    let AudioData {
        samples,
        sample_rate,
        channels,
        ..
    } = audio;

    if samples.is_empty() {
        return Ok(AudioData {
            samples,
            sample_rate: target_rate,
            channels,
            duration_secs: 0.0,
        });
    }

    debug!(
        "resampling {sample_rate} Hz -> {target_rate} Hz ({} samples)",
        samples.len()
    );

    let converted = sinc_convert(samples, sample_rate, target_rate)?;
    let duration_secs = converted.len() as f64 / target_rate as f64;
    Ok(AudioData {
        samples: converted,
        sample_rate: target_rate,
        channels,
        duration_secs,
    })
}

/// Run one whole-buffer pass through a sinc converter. The quality preset
/// is rubato's stock high-quality configuration.
fn sinc_convert(samples: Vec<f32>, from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    let quality = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    // Chunk size is the full input; the streams this crate feeds in are
    // decoded into memory already
    let mut converter = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        2.0,
        quality,
        samples.len(),
        1,
    )
    .map_err(|e| Error::Decode(format!("cannot build rate converter: {e}")))?;

    let mut channels = converter
        .process(&[samples], None)
        .map_err(|e| Error::Decode(format!("rate conversion failed: {e}")))?;
    Ok(channels.pop().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_at_the_target_rate() {
        let audio = AudioData::from_samples(vec![0.1, 0.2, 0.3], 16000);
        let out = resample(audio, 16000).unwrap();
        assert_eq!(out.samples, vec![0.1, 0.2, 0.3]);
        assert_eq!(out.sample_rate, 16000);
    }

    #[test]
    fn halves_the_sample_count_at_half_rate() {
        let sine: Vec<f32> = (0..32_000)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 32_000.0).sin())
            .collect();
        let audio = AudioData::from_samples(sine, 32_000);

        let out = resample(audio, 16_000).unwrap();
        assert_eq!(out.sample_rate, 16_000);
        // Sinc resampling trims a little tail; allow a small tolerance
        let expected = 16_000f64;
        assert!(
            (out.samples.len() as f64 - expected).abs() < expected * 0.02,
            "got {} samples, expected ~{expected}",
            out.samples.len()
        );
    }

    #[test]
    fn empty_input_stays_empty() {
        let audio = AudioData::from_samples(Vec::new(), 44_100);
        let out = resample(audio, 16_000).unwrap();
        assert!(out.samples.is_empty());
        assert_eq!(out.sample_rate, 16_000);
    }
}
