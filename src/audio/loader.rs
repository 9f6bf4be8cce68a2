//! Audio file decoding to the mono float stream the analysis stages consume.
//!
//! Every decoder funnels into the same shape: interleaved f32 samples plus a
//! rate and channel count, which are then downmixed and resampled once.

use crate::audio::resample::resample;
use crate::error::{Error, Result};
use crate::types::AudioData;
use log::debug;
use std::io::Cursor;
use std::path::Path;

enum Container {
    Wav,
    Flac,
    /// Anything symphonia can probe: M4A/AAC, MP3, OGG.
    Compressed,
}

/// Decode a file and bring it to `target_rate` mono.
pub fn load_file(path: &Path, target_rate: u32) -> Result<AudioData> {
    let bytes = std::fs::read(path)?;
    let extension = path.extension().and_then(|e| e.to_str());
    let decoded = decode_bytes(&bytes, extension)?;
    debug!(
        "decoded {}: {:.1} s, {} Hz, {} ch",
        path.display(),
        decoded.duration_secs,
        decoded.sample_rate,
        decoded.channels
    );
    resample(decoded, target_rate)
}

/// Decode raw file bytes. WAV and FLAC are picked out by their magic bytes
/// and handled natively; everything else is probed by symphonia, with the
/// file extension as a hint.
pub fn decode_bytes(bytes: &[u8], extension: Option<&str>) -> Result<AudioData> {
    let (interleaved, rate, channel_count) = match sniff(bytes)? {
        Container::Wav => read_wav(bytes)?,
        Container::Flac => read_flac(bytes)?,
        Container::Compressed => read_compressed(bytes, extension)?,
    };

    let samples = downmix(interleaved, channel_count);
    let duration_secs = samples.len() as f64 / rate as f64;
    Ok(AudioData {
        samples,
        sample_rate: rate,
        channels: channel_count,
        duration_secs,
    })
}

fn sniff(bytes: &[u8]) -> Result<Container> {
    let magic = bytes
        .get(0..4)
        .ok_or_else(|| Error::Decode("file too short to identify".into()))?;
    Ok(match magic {
        b"RIFF" => Container::Wav,
        b"fLaC" => Container::Flac,
        _ => Container::Compressed,
    })
}

/// Average interleaved frames down to one channel. Mono input passes
/// through without copying.
fn downmix(interleaved: Vec<f32>, channel_count: u32) -> Vec<f32> {
    if channel_count <= 1 {
        return interleaved;
    }
    let step = channel_count as usize;
    let mut mono = Vec::with_capacity(interleaved.len() / step);
    let mut at = 0;
    while at + step <= interleaved.len() {
        let mut level = 0.0f32;
        for sample in &interleaved[at..at + step] {
            level += sample;
        }
        mono.push(level / step as f32);
        at += step;
    }
    mono
}

/// Drain a decoder's sample iterator, converting its error type.
fn collect_samples<E>(samples: impl Iterator<Item = std::result::Result<f32, E>>) -> Result<Vec<f32>>
where
    E: std::fmt::Display,
{
    samples
        .map(|s| s.map_err(|e| Error::Decode(format!("bad sample data: {e}"))))
        .collect()
}

fn read_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32, u32)> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| Error::Decode(format!("failed to parse WAV header: {e}")))?;
    let header = reader.spec();
    let rate = header.sample_rate;
    let channel_count = header.channels as u32;

    let interleaved = match header.sample_format {
        hound::SampleFormat::Float => collect_samples(reader.into_samples::<f32>())?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (header.bits_per_sample - 1)) as f32;
            collect_samples(
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale)),
            )?
        }
    };

    Ok((interleaved, rate, channel_count))
}

fn read_flac(bytes: &[u8]) -> Result<(Vec<f32>, u32, u32)> {
    let mut reader = claxon::FlacReader::new(Cursor::new(bytes))
        .map_err(|e| Error::Decode(format!("failed to parse FLAC stream: {e}")))?;
    let info = reader.streaminfo();
    let scale = 1.0 / (1i64 << (info.bits_per_sample - 1)) as f32;

    let interleaved = collect_samples(reader.samples().map(|s| s.map(|v| v as f32 * scale)))?;
    Ok((interleaved, info.sample_rate, info.channels))
}

fn read_compressed(bytes: &[u8], extension: Option<&str>) -> Result<(Vec<f32>, u32, u32)> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let mut reader = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Decode(format!("unrecognized container: {e}")))?
        .format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("no decodable audio track".into()))?;
    let selected = track.id;
    let codec_params = track.codec_params.clone();

    let rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode("track reports no sample rate".into()))?;
    let channel_count = codec_params
        .channels
        .ok_or_else(|| Error::Decode("track reports no channel layout".into()))?
        .count() as u32;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("unsupported codec: {e}")))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut scratch: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(Error::Decode(format!("container read failed: {e}"))),
        };
        if packet.track_id() != selected {
            continue;
        }

        let frame = match decoder.decode(&packet) {
            Ok(frame) => frame,
            // Isolated corrupt packets are recoverable
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(Error::Decode(format!("codec failure: {e}"))),
        };

        let needed = frame.capacity() * frame.spec().channels.count();
        let refit = match &scratch {
            Some(buffer) => buffer.capacity() < needed,
            None => true,
        };
        if refit {
            scratch = Some(SampleBuffer::new(frame.capacity() as u64, *frame.spec()));
        }
        if let Some(buffer) = scratch.as_mut() {
            buffer.copy_interleaved_ref(frame);
            interleaved.extend_from_slice(buffer.samples());
        }
    }

    Ok((interleaved, rate, channel_count))
}
