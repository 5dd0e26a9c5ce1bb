//! Offline rendering to WAV.
//!
//! Drives the same render loop the audio callback uses, but as fast as
//! possible, writing each buffer to a WAV file. The sample format of the
//! file follows the session: 16-bit PCM or 32-bit float.

use super::clock::ms_to_frames;
use super::engine::SynthesisEngine;
use super::render::{OutputSample, RenderSession, SampleFormat};
use crate::config::OUTPUT_CHANNELS;
use crate::error::{PlayerError, Result};
use hound::{WavSpec, WavWriter};
use std::io::{Seek, Write};
use std::path::Path;

/// Renders a session to a WAV file.
///
/// Renders until every event has been applied, then `tail_ms` more so that
/// released notes can decay.
///
/// # Arguments
///
/// * `session` - A loaded session (typically from `Playback::start`)
/// * `output_path` - Path for the output WAV file
/// * `buffer_size` - Frames rendered per iteration
/// * `tail_ms` - Extra audio rendered after the last event
/// * `progress_callback` - Optional callback for progress updates (0.0 to 1.0)
///
/// # Returns
///
/// The number of frames written
///
/// # Errors
///
/// Returns error if the output file cannot be created or written
pub fn render_to_wav<E, P, F>(
    mut session: RenderSession<E>,
    output_path: P,
    buffer_size: usize,
    tail_ms: u64,
    progress_callback: Option<F>,
) -> Result<u64>
where
    E: SynthesisEngine,
    P: AsRef<Path>,
    F: FnMut(f32),
{
    if buffer_size == 0 {
        return Err(PlayerError::Config("buffer_size must be positive".to_string()));
    }

    let format = session.sample_format();
    let spec = WavSpec {
        channels: OUTPUT_CHANNELS,
        sample_rate: session.sample_rate(),
        bits_per_sample: (format.bytes_per_sample() * 8) as u16,
        sample_format: match format {
            SampleFormat::I16 => hound::SampleFormat::Int,
            SampleFormat::F32 => hound::SampleFormat::Float,
        },
    };
    let mut writer = WavWriter::create(output_path.as_ref(), spec).map_err(wav_error)?;
    tracing::info!("Exporting to {}", output_path.as_ref().display());

    let tail_frames = ms_to_frames(tail_ms, session.sample_rate());
    let frames = match format {
        SampleFormat::I16 => write_session::<E, i16, _, _>(
            &mut session,
            &mut writer,
            buffer_size,
            tail_frames,
            progress_callback,
        )?,
        SampleFormat::F32 => write_session::<E, f32, _, _>(
            &mut session,
            &mut writer,
            buffer_size,
            tail_frames,
            progress_callback,
        )?,
    };

    writer.finalize().map_err(wav_error)?;
    tracing::info!("Export finished: {} frames", frames);
    Ok(frames)
}

fn write_session<E, S, W, F>(
    session: &mut RenderSession<E>,
    writer: &mut WavWriter<W>,
    buffer_size: usize,
    tail_frames: u64,
    mut progress_callback: Option<F>,
) -> Result<u64>
where
    E: SynthesisEngine,
    S: OutputSample + hound::Sample,
    W: Write + Seek,
    F: FnMut(f32),
{
    let total_ms = session.events().duration_ms();
    let mut buffer = vec![S::default(); buffer_size * OUTPUT_CHANNELS as usize];
    let mut written: u64 = 0;

    while !session.is_finished() {
        written += session.render_into(&mut buffer) as u64;
        write_samples(writer, &buffer)?;

        if let Some(ref mut callback) = progress_callback {
            let progress = if total_ms > 0.0 {
                (session.clock().elapsed_ms() / total_ms).min(1.0)
            } else {
                1.0
            };
            callback(progress as f32);
        }
    }

    let mut remaining = tail_frames;
    while remaining > 0 {
        let frames = remaining.min(buffer_size as u64) as usize;
        let chunk = &mut buffer[..frames * OUTPUT_CHANNELS as usize];
        written += session.render_into(chunk) as u64;
        write_samples(writer, chunk)?;
        remaining -= frames as u64;
    }

    Ok(written)
}

fn write_samples<S, W>(writer: &mut WavWriter<W>, samples: &[S]) -> Result<()>
where
    S: hound::Sample + Copy,
    W: Write + Seek,
{
    for &sample in samples {
        writer.write_sample(sample).map_err(wav_error)?;
    }
    Ok(())
}

fn wav_error(e: hound::Error) -> PlayerError {
    match e {
        hound::Error::IoError(io) => PlayerError::Io(io),
        other => PlayerError::Io(std::io::Error::other(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::engine::testing::RecordingEngine;
    use crate::midi::{EventStream, MidiEvent};

    fn session(format: SampleFormat) -> RenderSession<RecordingEngine> {
        RenderSession::new(
            EventStream::new(vec![
                MidiEvent::note_on(0.0, 0, 60, 100),
                MidiEvent::note_off(100.0, 0, 60),
            ])
            .unwrap(),
            RecordingEngine::new(64),
            44100,
            format,
        )
        .unwrap()
    }

    #[test]
    fn test_export_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let mut last_progress = 0.0;
        let frames = render_to_wav(
            session(SampleFormat::F32),
            &path,
            1024,
            50,
            Some(|p: f32| last_progress = p),
        )
        .unwrap();

        // 100ms = 4410 frames rounds up to 5 buffers, plus 2205 tail frames
        assert_eq!(frames, 5 * 1024 + 2205);
        assert_eq!(last_progress, 1.0);

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);
        assert_eq!(reader.duration() as u64, frames);
    }

    #[test]
    fn test_export_pcm16_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out16.wav");

        render_to_wav(session(SampleFormat::I16), &path, 4096, 0, None::<fn(f32)>).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        let expected = crate::audio::engine::f32_to_i16(0.25);
        assert!(reader.samples::<i16>().all(|s| s.unwrap() == expected));
    }

    #[test]
    fn test_zero_buffer_size() {
        let dir = tempfile::tempdir().unwrap();
        let result = render_to_wav(
            session(SampleFormat::F32),
            dir.path().join("x.wav"),
            0,
            0,
            None::<fn(f32)>,
        );
        assert!(matches!(result, Err(PlayerError::Config(_))));
    }
}
