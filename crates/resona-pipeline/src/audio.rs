//! Audio decoding to mono PCM at a target sample rate.

use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{PipelineError, PipelineResult};

/// Decoded audio as mono PCM samples at a specific sample rate.
#[derive(Debug)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub duration_secs: f64,
}

/// Decode an audio file to mono PCM at `target_sample_rate`.
///
/// Stereo input is folded to mono by averaging channels. When
/// `max_seconds` is set, decoding stops once enough source samples are
/// buffered and the output is truncated to exactly that duration.
pub fn decode_audio(
    path: &Path,
    target_sample_rate: u32,
    max_seconds: Option<u32>,
) -> PipelineResult<DecodedAudio> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(
        Box::new(file),
        symphonia::core::io::MediaSourceStreamOptions::default(),
    );

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| PipelineError::audio(path, format!("failed to probe format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| PipelineError::audio(path, "no default audio track"))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let channels = codec_params.channels.map_or(1, |c| c.count());
    let source_rate = codec_params.sample_rate.unwrap_or(44_100);

    // Enough interleaved source samples to cover the clip; decoding
    // past this point is wasted work.
    let sample_budget =
        max_seconds.map(|secs| source_rate as usize * channels * secs as usize + channels);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| PipelineError::audio(path, format!("failed to create decoder: {e}")))?;

    let mut sample_buf = None;
    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        if let Some(budget) = sample_budget {
            if all_samples.len() >= budget {
                break;
            }
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(PipelineError::audio(path, format!("failed to read packet: {e}")))
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                if sample_buf.is_none() {
                    let spec = *audio_buf.spec();
                    let duration = audio_buf.capacity() as u64;
                    sample_buf = Some(SampleBuffer::<f32>::new(duration, spec));
                }

                if let Some(ref mut buf) = sample_buf {
                    buf.copy_interleaved_ref(audio_buf);
                    all_samples.extend_from_slice(buf.samples());
                }
            }
            // Corrupt packets are skipped; the rest of the stream may
            // still decode.
            Err(symphonia::core::errors::Error::DecodeError(_)) => {}
            Err(e) => {
                return Err(PipelineError::audio(path, format!("failed to decode: {e}")))
            }
        }
    }

    let mono_samples = if channels > 1 {
        all_samples
            .chunks(channels)
            .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
            .collect()
    } else {
        all_samples
    };

    let mut resampled = if source_rate == target_sample_rate {
        mono_samples
    } else {
        resample_linear(&mono_samples, source_rate, target_sample_rate)
    };

    if let Some(secs) = max_seconds {
        resampled.truncate(target_sample_rate as usize * secs as usize);
    }

    let duration = resampled.len() as f64 / f64::from(target_sample_rate);

    Ok(DecodedAudio {
        samples: resampled,
        sample_rate: target_sample_rate,
        duration_secs: duration,
    })
}

/// Linear-interpolation resampling. Fine for preview clips feeding an
/// embedding model; not a mastering-grade resampler.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        if idx + 1 < samples.len() {
            let frac = (pos - idx as f64) as f32;
            let sample = samples[idx].mul_add(1.0 - frac, samples[idx + 1] * frac);
            output.push(sample);
        } else if idx < samples.len() {
            output.push(samples[idx]);
        }
    }

    output
}
