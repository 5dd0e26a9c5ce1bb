//! The render loop: MIDI events in, interleaved audio out.
//!
//! [`RenderSession::render`] is called from the audio callback with a
//! buffer to fill. It walks the buffer in engine-sized blocks; before each
//! block it advances the clock by that block's frame count and applies
//! every event that has become due, then asks the engine for the block's
//! samples. Nothing on this path allocates, locks or performs I/O.

use super::clock::PlaybackClock;
use super::engine::SynthesisEngine;
use super::session::{SessionShared, SessionState};
use crate::error::{PlayerError, Result};
use crate::midi::{velocity_to_unit, EventKind, EventStream, MidiEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Output sample format, fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Signed 16-bit integer PCM.
    I16,
    /// 32-bit float in -1.0..=1.0.
    F32,
}

impl SampleFormat {
    /// Size of a single sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::I16 => 2,
            SampleFormat::F32 => 4,
        }
    }
}

/// Interleaved stereo output buffer handed to [`RenderSession::render`].
#[derive(Debug)]
pub enum SampleBuffer<'a> {
    I16(&'a mut [i16]),
    F32(&'a mut [f32]),
}

impl SampleBuffer<'_> {
    pub fn format(&self) -> SampleFormat {
        match self {
            SampleBuffer::I16(_) => SampleFormat::I16,
            SampleBuffer::F32(_) => SampleFormat::F32,
        }
    }

    /// Number of complete stereo frames the buffer holds.
    pub fn frames(&self) -> usize {
        match self {
            SampleBuffer::I16(buf) => buf.len() / 2,
            SampleBuffer::F32(buf) => buf.len() / 2,
        }
    }

    fn fill_silence(&mut self) {
        match self {
            SampleBuffer::I16(buf) => buf.fill(0),
            SampleBuffer::F32(buf) => buf.fill(0.0),
        }
    }

    /// Zeroes a trailing sample that does not form a full frame.
    fn clear_partial_frame(&mut self) {
        match self {
            SampleBuffer::I16(buf) if buf.len() % 2 == 1 => {
                if let Some(last) = buf.last_mut() {
                    *last = 0;
                }
            }
            SampleBuffer::F32(buf) if buf.len() % 2 == 1 => {
                if let Some(last) = buf.last_mut() {
                    *last = 0.0;
                }
            }
            _ => {}
        }
    }

    /// Renders `frames` frames starting at frame `offset`.
    fn render_block<E: SynthesisEngine>(&mut self, engine: &mut E, offset: usize, frames: usize) {
        let range = offset * 2..(offset + frames) * 2;
        match self {
            SampleBuffer::I16(buf) => engine.render_i16(&mut buf[range]),
            SampleBuffer::F32(buf) => engine.render_f32(&mut buf[range]),
        }
    }
}

/// Sample types a session can render into.
pub trait OutputSample: Copy + Default + Send + 'static {
    fn wrap(buf: &mut [Self]) -> SampleBuffer<'_>;
}

impl OutputSample for i16 {
    fn wrap(buf: &mut [Self]) -> SampleBuffer<'_> {
        SampleBuffer::I16(buf)
    }
}

impl OutputSample for f32 {
    fn wrap(buf: &mut [Self]) -> SampleBuffer<'_> {
        SampleBuffer::F32(buf)
    }
}

/// Everything the audio callback needs to keep playing: the event stream
/// and its cursor, the clock, and the engine.
///
/// A session is owned by exactly one thread at a time. The only state it
/// shares is the lifecycle block behind [`PlaybackHandle`](super::PlaybackHandle),
/// used for cancellation and completion.
pub struct RenderSession<E> {
    events: EventStream,
    clock: PlaybackClock,
    engine: E,
    sample_format: SampleFormat,
    shared: Arc<SessionShared>,
    silenced: bool,
}

impl<E: SynthesisEngine> RenderSession<E> {
    /// Creates a loaded session with its own lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::InvalidPrecondition`] for a zero sample rate
    /// or an engine that reports a zero block size.
    pub fn new(
        events: EventStream,
        engine: E,
        sample_rate: u32,
        sample_format: SampleFormat,
    ) -> Result<Self> {
        let shared = Arc::new(SessionShared::new(sample_rate, SessionState::Loaded));
        Self::with_shared(events, engine, sample_format, shared)
    }

    pub(crate) fn with_shared(
        events: EventStream,
        engine: E,
        sample_format: SampleFormat,
        shared: Arc<SessionShared>,
    ) -> Result<Self> {
        let sample_rate = shared.sample_rate();
        if sample_rate == 0 {
            return Err(PlayerError::precondition("sample rate must be positive"));
        }
        if engine.block_size() == 0 {
            return Err(PlayerError::precondition(
                "synthesis engine reports a zero block size",
            ));
        }
        Ok(Self {
            events,
            clock: PlaybackClock::new(sample_rate),
            engine,
            sample_format,
            shared,
            silenced: false,
        })
    }

    /// Handle for observing and cancelling this session from another thread.
    pub fn handle(&self) -> super::PlaybackHandle {
        super::PlaybackHandle::new(Arc::clone(&self.shared))
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn events(&self) -> &EventStream {
        &self.events
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Returns true once every event has been applied or playback was cancelled.
    pub fn is_finished(&self) -> bool {
        self.events.is_exhausted()
    }

    /// Fills `out` with the next `out.frames()` frames of audio.
    ///
    /// Returns the number of frames rendered. After a cancellation, or when
    /// `out` does not match the session's sample format, the buffer is
    /// filled with silence and 0 is returned without advancing the clock.
    pub fn render(&mut self, mut out: SampleBuffer<'_>) -> usize {
        if out.format() != self.sample_format {
            tracing::warn!(
                "Dropping {:?} buffer handed to a {:?} session",
                out.format(),
                self.sample_format
            );
            out.fill_silence();
            return 0;
        }
        out.clear_partial_frame();

        if self.shared.is_cancelled() {
            self.cancel_now();
            out.fill_silence();
            return 0;
        }

        let total = out.frames();
        let block_size = self.engine.block_size();
        let mut offset = 0;

        while offset < total {
            let frames = block_size.min(total - offset);

            // Clock first, so events due within this block fire before it renders
            self.clock.advance(frames);
            let now_ms = self.clock.elapsed_ms();
            while let Some(event) = self.events.pop_due(now_ms) {
                apply_event(&mut self.engine, &event);
            }

            out.render_block(&mut self.engine, offset, frames);
            offset += frames;
        }

        self.shared.publish_position(self.clock.frames());
        if self.events.is_exhausted() {
            self.shared.mark_finished();
        }
        total
    }

    /// Convenience wrapper for callers that own a typed buffer.
    pub fn render_into<S: OutputSample>(&mut self, out: &mut [S]) -> usize {
        self.render(S::wrap(out))
    }

    fn cancel_now(&mut self) {
        self.events.finish();
        if !self.silenced {
            self.engine.all_notes_off();
            self.silenced = true;
        }
        self.shared.mark_finished();
    }
}

/// Applies one event to the engine.
///
/// Program changes on the percussion channel always select the drum bank.
#[inline]
pub fn apply_event<E: SynthesisEngine>(engine: &mut E, event: &MidiEvent) {
    let channel = event.channel;
    match event.kind {
        EventKind::ProgramChange { program } => {
            engine.set_program(channel, program, event.is_percussion())
        }
        EventKind::NoteOn { key, velocity } => {
            engine.note_on(channel, key, velocity_to_unit(velocity))
        }
        EventKind::NoteOff { key } => engine.note_off(channel, key),
        EventKind::PitchBend { value } => engine.set_pitch_bend(channel, value),
        EventKind::ControlChange { controller, value } => {
            engine.control_change(channel, controller, value)
        }
    }
}
