//! Combines the two speakers' clips into a single alternating track.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::DialogError;

/// Pause inserted after every clip of an interleaved user/assistant pair.
pub const SILENCE_GAP_MS: u64 = 500;

/// One piece of the combined track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Clip(PathBuf),
    Silence,
}

/// Order in which clips and pauses are concatenated.
///
/// Pairs at the same position become `user, pause, assistant, pause`. Clips
/// left over from the longer side follow directly, with no pause before or
/// between them. The missing gaps there look accidental but existing output
/// depends on them.
pub fn merge_plan(user: &[PathBuf], assistant: &[PathBuf]) -> Vec<Segment> {
    let paired = user.len().min(assistant.len());
    let mut plan = Vec::with_capacity(paired * 4 + user.len().max(assistant.len()) - paired);

    for (u, a) in user.iter().zip(assistant) {
        plan.push(Segment::Clip(u.clone()));
        plan.push(Segment::Silence);
        plan.push(Segment::Clip(a.clone()));
        plan.push(Segment::Silence);
    }

    let remaining = if user.len() > paired {
        &user[paired..]
    } else {
        &assistant[paired..]
    };
    plan.extend(remaining.iter().cloned().map(Segment::Clip));

    plan
}

/// The written conversation track.
#[derive(Debug, Clone)]
pub struct CombinedTrack {
    pub path: PathBuf,
    pub spec: WavSpec,
    /// Length in frames (samples per channel).
    pub frames: u64,
}

impl CombinedTrack {
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.spec.sample_rate as f64
    }
}

/// Render `merge_plan(user, assistant)` into a WAV file at `output`.
///
/// The first clip fixes the output format; every other clip must match it.
pub fn assemble(
    user: &[PathBuf],
    assistant: &[PathBuf],
    output: &Path,
) -> Result<CombinedTrack, DialogError> {
    let plan = merge_plan(user, assistant);
    let first = plan
        .iter()
        .find_map(|segment| match segment {
            Segment::Clip(path) => Some(path),
            Segment::Silence => None,
        })
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no clips to assemble"))?;

    let spec = WavReader::open(first)?.spec();
    let silence_frames = spec.sample_rate as u64 * SILENCE_GAP_MS / 1000;
    let mut writer = WavWriter::create(output, spec)?;
    let mut frames = 0u64;

    for segment in &plan {
        match segment {
            Segment::Clip(path) => frames += append_clip(&mut writer, path, spec)?,
            Segment::Silence => {
                append_silence(&mut writer, spec, silence_frames)?;
                frames += silence_frames;
            }
        }
    }
    writer.finalize()?;

    tracing::debug!(path = %output.display(), frames, "combined track written");
    Ok(CombinedTrack {
        path: output.to_path_buf(),
        spec,
        frames,
    })
}

fn append_clip<W: io::Write + io::Seek>(
    writer: &mut WavWriter<W>,
    path: &Path,
    spec: WavSpec,
) -> Result<u64, DialogError> {
    let mut reader = WavReader::open(path)?;
    let found = reader.spec();
    if found != spec {
        return Err(DialogError::AudioFormatMismatch {
            path: path.to_path_buf(),
            expected: describe(spec),
            found: describe(found),
        });
    }

    match spec.sample_format {
        SampleFormat::Int => {
            for sample in reader.samples::<i32>() {
                writer.write_sample(sample?)?;
            }
        }
        SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                writer.write_sample(sample?)?;
            }
        }
    }

    Ok(reader.duration() as u64)
}

fn append_silence<W: io::Write + io::Seek>(
    writer: &mut WavWriter<W>,
    spec: WavSpec,
    frames: u64,
) -> Result<(), DialogError> {
    let samples = frames * spec.channels as u64;
    for _ in 0..samples {
        match spec.sample_format {
            SampleFormat::Int => writer.write_sample(0i32)?,
            SampleFormat::Float => writer.write_sample(0.0f32)?,
        }
    }
    Ok(())
}

fn describe(spec: WavSpec) -> String {
    let format = match spec.sample_format {
        SampleFormat::Int => "int",
        SampleFormat::Float => "float",
    };
    format!(
        "{} ch {} Hz {}-bit {}",
        spec.channels, spec.sample_rate, spec.bits_per_sample, format
    )
}
