//! Audio normalization: arbitrary preview clips in, mono fixed-rate
//! fixed-duration WAV files out.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::audio::decode_audio;
use crate::error::{PipelineError, PipelineResult};

/// Normalize one clip: mono, resampled to `sample_rate`, truncated to
/// the first `max_seconds`, written as 16-bit PCM WAV.
///
/// The output name is derived from the input stem, so repeated runs
/// overwrite rather than accumulate.
pub fn convert_file(
    input_path: &Path,
    output_dir: &Path,
    sample_rate: u32,
    max_seconds: u32,
) -> PipelineResult<PathBuf> {
    let stem = input_path
        .file_stem()
        .ok_or_else(|| PipelineError::audio(input_path, "input has no file stem"))?;
    std::fs::create_dir_all(output_dir)?;
    let output_path = output_dir.join(stem).with_extension("wav");

    log::debug!("Converting {} to WAV", input_path.display());

    let decoded = decode_audio(input_path, sample_rate, Some(max_seconds))?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&output_path, spec)
        .map_err(|e| PipelineError::audio(&output_path, e))?;
    for sample in &decoded.samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer
            .write_sample(value)
            .map_err(|e| PipelineError::audio(&output_path, e))?;
    }
    writer
        .finalize()
        .map_err(|e| PipelineError::audio(&output_path, e))?;

    log::debug!(
        "Wrote {} ({:.1}s at {} Hz)",
        output_path.display(),
        decoded.duration_secs,
        sample_rate
    );
    Ok(output_path)
}

/// Read a normalized WAV back as f32 samples plus its sample rate.
pub fn read_wav(path: &Path) -> PipelineResult<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path).map_err(|e| PipelineError::audio(path, e))?;
    let sample_rate = reader.spec().sample_rate;
    let samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
    let samples = samples.map_err(|e| PipelineError::audio(path, e))?;
    Ok((
        samples
            .into_iter()
            .map(|s| f32::from(s) / f32::from(i16::MAX))
            .collect(),
        sample_rate,
    ))
}

fn is_audio_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        matches!(
            ext.to_string_lossy().to_lowercase().as_ref(),
            "mp3" | "wav" | "flac" | "ogg" | "oga" | "m4a" | "aac"
        )
    })
}

/// Normalize every clip in `input_dir`. Each file is independent: a
/// decode failure is logged and that file is excluded from the output
/// set without aborting the batch.
pub fn convert_directory(
    input_dir: &Path,
    output_dir: &Path,
    sample_rate: u32,
    max_seconds: u32,
) -> PipelineResult<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        return Err(PipelineError::InvalidInput(format!(
            "input directory not found: {}",
            input_dir.display()
        )));
    }

    let mut converted = Vec::new();
    for entry in WalkDir::new(input_dir)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !path.is_file() || !is_audio_file(path) {
            continue;
        }

        match convert_file(path, output_dir, sample_rate, max_seconds) {
            Ok(output) => converted.push(output),
            Err(e) => {
                log::warn!("Failed to convert {}: {e}", path.display());
            }
        }
    }

    log::info!("Converted {} files to WAV", converted.len());
    Ok(converted)
}
