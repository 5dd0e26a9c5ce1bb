//! Audio output via rodio.
//!
//! The sink owns the output stream and wraps a [`RenderSession`] in a
//! rodio [`Source`]. Whenever the mixer drains the source's interleaved
//! buffer, the source asks the session to render the next `buffer_size`
//! frames into it; that refill is the audio callback.

use super::engine::SynthesisEngine;
use super::render::{OutputSample, RenderSession, SampleFormat};
use super::session::PlaybackHandle;
use crate::config::{PlayerConfig, OUTPUT_CHANNELS};
use crate::error::{PlayerError, Result};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::time::Duration;

/// Output options recognized by [`AudioSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    pub sample_rate: u32,
    /// Always 2; anything else is rejected.
    pub channel_count: u16,
    pub sample_format: SampleFormat,
    /// Frames rendered per callback.
    pub buffer_size: usize,
}

impl SinkConfig {
    pub fn from_config(config: &PlayerConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channel_count: OUTPUT_CHANNELS,
            sample_format: config.sample_format,
            buffer_size: config.buffer_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_count != OUTPUT_CHANNELS {
            return Err(PlayerError::Config(format!(
                "channel_count must be {}, got {}",
                OUTPUT_CHANNELS, self.channel_count
            )));
        }
        if self.sample_rate == 0 || self.buffer_size == 0 {
            return Err(PlayerError::Config(
                "sample_rate and buffer_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Time between callbacks at this buffer size and rate.
    pub fn callback_period(&self) -> Duration {
        Duration::from_secs_f64(self.buffer_size as f64 / f64::from(self.sample_rate))
    }
}

/// rodio source that renders a session one buffer at a time.
struct SessionSource<E, S> {
    session: RenderSession<E>,
    buffer: Vec<S>,
    /// Current position in the buffer.
    buf_pos: usize,
}

impl<E: SynthesisEngine, S: OutputSample> SessionSource<E, S> {
    fn new(session: RenderSession<E>, buffer_size: usize) -> Self {
        let len = buffer_size * OUTPUT_CHANNELS as usize;
        Self {
            session,
            buffer: vec![S::default(); len],
            buf_pos: len, // Start at end to trigger first render
        }
    }
}

impl<E: SynthesisEngine, S: OutputSample> Iterator for SessionSource<E, S> {
    type Item = S;

    fn next(&mut self) -> Option<S> {
        if self.buf_pos >= self.buffer.len() {
            self.session.render_into(&mut self.buffer);
            self.buf_pos = 0;
        }

        // Samples are already interleaved: L, R, L, R, ...
        let sample = self.buffer[self.buf_pos];
        self.buf_pos += 1;
        Some(sample)
    }
}

impl<E, S> Source for SessionSource<E, S>
where
    E: SynthesisEngine,
    S: OutputSample + rodio::Sample,
{
    fn current_frame_len(&self) -> Option<usize> {
        None // Continuous stream
    }

    fn channels(&self) -> u16 {
        OUTPUT_CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        self.session.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        None // Runs until the sink is stopped
    }
}

/// Operating-system audio output driving a render session.
pub struct AudioSink {
    /// Audio output stream (must be kept alive).
    _stream: OutputStream,
    /// Audio output handle the sink plays through.
    _stream_handle: OutputStreamHandle,
    sink: Sink,
    config: SinkConfig,
}

impl AudioSink {
    /// Opens the default output device.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Config`] for an invalid configuration and
    /// [`PlayerError::EngineInit`] if the device cannot be opened.
    pub fn open(config: SinkConfig) -> Result<Self> {
        config.validate()?;

        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| PlayerError::EngineInit(format!("Failed to open audio output: {}", e)))?;
        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| PlayerError::EngineInit(format!("Failed to create audio sink: {}", e)))?;
        sink.pause();

        tracing::info!(
            "Audio output opened: {} Hz, {:?}, {} frames per callback (~{:.0} ms)",
            config.sample_rate,
            config.sample_format,
            config.buffer_size,
            config.callback_period().as_secs_f64() * 1000.0
        );

        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
            sink,
            config,
        })
    }

    /// Starts invoking the render loop of `session`.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::InvalidPrecondition`] if the session's sample
    /// rate or format differ from the sink configuration.
    pub fn start<E>(&self, session: RenderSession<E>) -> Result<()>
    where
        E: SynthesisEngine + Send + 'static,
    {
        if session.sample_rate() != self.config.sample_rate
            || session.sample_format() != self.config.sample_format
        {
            return Err(PlayerError::precondition(format!(
                "session renders {:?} at {} Hz but the sink expects {:?} at {} Hz",
                session.sample_format(),
                session.sample_rate(),
                self.config.sample_format,
                self.config.sample_rate
            )));
        }

        let buffer_size = self.config.buffer_size;
        match self.config.sample_format {
            SampleFormat::I16 => self
                .sink
                .append(SessionSource::<E, i16>::new(session, buffer_size)),
            SampleFormat::F32 => self
                .sink
                .append(SessionSource::<E, f32>::new(session, buffer_size)),
        }
        self.sink.play();
        tracing::info!("Audio output started");
        Ok(())
    }

    /// Stops the output. The render loop is not invoked again.
    pub fn stop(&self) {
        self.sink.stop();
        tracing::info!("Audio output stopped");
    }
}

/// Blocks the control thread until playback finishes.
///
/// `quit_requested` is called once per iteration and may wait up to the
/// given poll interval for user input. When it returns true the playback
/// is cancelled and the loop keeps waiting for the render side to observe
/// the cancellation.
pub fn wait_until_finished<F>(
    handle: &PlaybackHandle,
    poll_interval: Duration,
    mut quit_requested: F,
) where
    F: FnMut(Duration) -> bool,
{
    while !handle.is_finished() {
        if quit_requested(poll_interval) && !handle.is_cancelled() {
            tracing::info!("Quit requested, cancelling playback");
            handle.cancel();
        }
    }
    tracing::debug!(
        "Playback finished at {:.1}s{}",
        handle.progress_ms() / 1000.0,
        if handle.is_cancelled() { " (cancelled)" } else { "" }
    );
}

/// Runs [`wait_until_finished`], then lets releases ring out for
/// `release_tail` and stops the sink. A cancelled playback stops at once.
pub fn play_until_finished<F>(
    handle: &PlaybackHandle,
    sink: &AudioSink,
    poll_interval: Duration,
    release_tail: Duration,
    quit_requested: F,
) where
    F: FnMut(Duration) -> bool,
{
    wait_until_finished(handle, poll_interval, quit_requested);
    if !handle.is_cancelled() {
        std::thread::sleep(release_tail);
    }
    sink.stop();
}
