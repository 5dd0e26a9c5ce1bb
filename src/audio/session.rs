//! Session lifecycle and cross-thread control.
//!
//! A playback moves through `Unloaded -> Loaded -> Playing -> Finished`,
//! or to `Failed` from any state. The state lives in a small block of
//! atomics shared between the control thread (which loads, starts, polls
//! and cancels) and the audio callback (which publishes progress and
//! completion). Cancellation is a release store observed by the callback
//! with an acquire load.

use super::engine::SynthesisEngine;
use super::render::{RenderSession, SampleFormat};
use crate::error::{PlayerError, Result};
use crate::midi::EventStream;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle state of a playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Nothing loaded yet.
    Unloaded = 0,
    /// Events parsed and engine ready; not yet handed to the sink.
    Loaded = 1,
    /// The sink is invoking the render loop.
    Playing = 2,
    /// Every event has been applied, or playback was cancelled.
    Finished = 3,
    /// Setup failed. Terminal.
    Failed = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Unloaded,
            1 => SessionState::Loaded,
            2 => SessionState::Playing,
            3 => SessionState::Finished,
            _ => SessionState::Failed,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unloaded => "unloaded",
            SessionState::Loaded => "loaded",
            SessionState::Playing => "playing",
            SessionState::Finished => "finished",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State shared between the control thread and the audio callback.
#[derive(Debug)]
pub(crate) struct SessionShared {
    sample_rate: u32,
    state: AtomicU8,
    cancelled: AtomicBool,
    /// Frames rendered so far, for progress reporting only.
    position_frames: AtomicU64,
}

impl SessionShared {
    pub(crate) fn new(sample_rate: u32, state: SessionState) -> Self {
        Self {
            sample_rate,
            state: AtomicU8::new(state as u8),
            cancelled: AtomicBool::new(false),
            position_frames: AtomicU64::new(0),
        }
    }

    pub(crate) fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub(crate) fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Moves from any of `from` to `to`. Returns false if the current state
    /// was not in `from`.
    fn transition(&self, from: &[SessionState], to: SessionState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                from.contains(&SessionState::from_u8(current))
                    .then_some(to as u8)
            })
            .is_ok()
    }

    /// Called by the render loop once the cursor is exhausted.
    pub(crate) fn mark_finished(&self) {
        self.transition(
            &[SessionState::Loaded, SessionState::Playing],
            SessionState::Finished,
        );
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub(crate) fn publish_position(&self, frames: u64) {
        self.position_frames.store(frames, Ordering::Relaxed);
    }

    fn position_frames(&self) -> u64 {
        self.position_frames.load(Ordering::Relaxed)
    }
}

/// Cheap, clonable view of a playback for the control thread.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    shared: Arc<SessionShared>,
}

impl PlaybackHandle {
    pub(crate) fn new(shared: Arc<SessionShared>) -> Self {
        Self { shared }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Returns true once the render loop has consumed every event or
    /// observed a cancellation.
    pub fn is_finished(&self) -> bool {
        self.state() == SessionState::Finished
    }

    /// Requests that playback stop.
    ///
    /// The next render call drops all pending events, silences the engine,
    /// outputs silence and moves the session to `Finished`.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Playback position as last published by the render loop.
    pub fn progress_ms(&self) -> f64 {
        super::clock::frames_to_ms(self.shared.position_frames(), self.shared.sample_rate())
    }
}

/// Owner of a playback's lifecycle.
///
/// Holds the [`RenderSession`] while it is `Loaded` and gives it up to the
/// audio side on [`Playback::start`].
pub struct Playback<E> {
    shared: Arc<SessionShared>,
    session: Option<RenderSession<E>>,
}

impl<E: SynthesisEngine> Playback<E> {
    /// Creates an unloaded playback for the given output rate.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            shared: Arc::new(SessionShared::new(sample_rate, SessionState::Unloaded)),
            session: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn handle(&self) -> PlaybackHandle {
        PlaybackHandle::new(Arc::clone(&self.shared))
    }

    /// Attaches the parsed events and an initialized engine.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::InvalidPrecondition`] unless the playback is
    /// `Unloaded`, or if the engine or sample rate cannot drive a session.
    /// The latter also moves the playback to `Failed`.
    pub fn load(
        &mut self,
        events: EventStream,
        engine: E,
        sample_format: SampleFormat,
    ) -> Result<()> {
        let state = self.state();
        if state != SessionState::Unloaded {
            return Err(PlayerError::precondition(format!(
                "cannot load a playback that is {}",
                state
            )));
        }

        let shared = Arc::clone(&self.shared);
        let session = match RenderSession::with_shared(events, engine, sample_format, shared) {
            Ok(session) => session,
            Err(e) => return Err(self.fail(e)),
        };
        tracing::info!(
            "Playback loaded: {} events, {:?} output at {} Hz",
            session.events().len(),
            sample_format,
            self.shared.sample_rate()
        );

        self.session = Some(session);
        self.shared.set_state(SessionState::Loaded);
        Ok(())
    }

    /// Hands the render session to the audio side and enters `Playing`.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::InvalidPrecondition`] if the playback is not `Loaded`.
    pub fn start(&mut self) -> Result<RenderSession<E>> {
        let state = self.state();
        if state != SessionState::Loaded {
            return Err(PlayerError::precondition(format!(
                "render requested while playback is {}",
                state
            )));
        }
        let session = self
            .session
            .take()
            .ok_or_else(|| PlayerError::precondition("loaded playback has no session"))?;

        self.shared.transition(&[SessionState::Loaded], SessionState::Playing);
        tracing::info!("Playback started");
        Ok(session)
    }

    /// Marks the playback as failed and returns the error for propagation.
    ///
    /// Failure is terminal: later `load` or `start` calls are rejected.
    pub fn fail(&mut self, error: PlayerError) -> PlayerError {
        tracing::error!("Playback failed: {}", error);
        self.session = None;
        self.shared.set_state(SessionState::Failed);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::engine::testing::RecordingEngine;
    use crate::midi::MidiEvent;

    fn events() -> EventStream {
        EventStream::new(vec![
            MidiEvent::note_on(0.0, 0, 60, 100),
            MidiEvent::note_off(100.0, 0, 60),
        ])
        .unwrap()
    }

    #[test]
    fn test_lifecycle_to_finished() {
        let mut playback = Playback::new(44100);
        let handle = playback.handle();
        assert_eq!(handle.state(), SessionState::Unloaded);

        playback
            .load(events(), RecordingEngine::new(64), SampleFormat::F32)
            .unwrap();
        assert_eq!(handle.state(), SessionState::Loaded);

        let mut session = playback.start().unwrap();
        assert_eq!(handle.state(), SessionState::Playing);

        // 4096 frames cover 92.9 ms, so the NoteOff at 100 ms needs a second buffer.
        let mut buf = vec![0.0f32; 2 * 4096];
        let mut callbacks = 0;
        while !handle.is_finished() && callbacks < 10 {
            session.render_into(&mut buf);
            callbacks += 1;
        }
        assert_eq!(callbacks, 2);
        assert!(handle.is_finished());
        assert_eq!(playback.state(), SessionState::Finished);
    }

    #[test]
    fn test_start_before_load_is_invalid() {
        let mut playback: Playback<RecordingEngine> = Playback::new(44100);
        assert!(matches!(
            playback.start(),
            Err(PlayerError::InvalidPrecondition(_))
        ));
    }

    #[test]
    fn test_start_twice_is_invalid() {
        let mut playback = Playback::new(44100);
        playback
            .load(events(), RecordingEngine::new(64), SampleFormat::F32)
            .unwrap();
        let _session = playback.start().unwrap();
        assert!(matches!(
            playback.start(),
            Err(PlayerError::InvalidPrecondition(_))
        ));
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut playback: Playback<RecordingEngine> = Playback::new(44100);
        let err = playback.fail(PlayerError::NotFound {
            name: "x".to_string(),
            searched: Vec::new(),
        });
        assert!(matches!(err, PlayerError::NotFound { .. }));
        assert_eq!(playback.state(), SessionState::Failed);

        assert!(playback
            .load(events(), RecordingEngine::new(64), SampleFormat::F32)
            .is_err());
        assert!(playback.start().is_err());
        assert_eq!(playback.state(), SessionState::Failed);
    }

    #[test]
    fn test_invalid_engine_fails_at_load() {
        let mut playback = Playback::new(44100);
        let result = playback.load(events(), RecordingEngine::new(0), SampleFormat::F32);
        assert!(matches!(result, Err(PlayerError::InvalidPrecondition(_))));
        assert_eq!(playback.state(), SessionState::Failed);
    }

    #[test]
    fn test_cancel_from_control_thread() {
        let mut playback = Playback::new(44100);
        playback
            .load(
                EventStream::new(vec![
                    MidiEvent::note_on(0.0, 0, 60, 100),
                    MidiEvent::note_off(1.0e12, 0, 60),
                ])
                .unwrap(),
                RecordingEngine::new(64),
                SampleFormat::F32,
            )
            .unwrap();
        let handle = playback.handle();
        let mut session = playback.start().unwrap();

        let audio = std::thread::spawn(move || {
            let mut buf = vec![0.0f32; 512];
            while !session.is_finished() {
                session.render_into(&mut buf);
                std::thread::yield_now();
            }
            buf
        });

        std::thread::sleep(std::time::Duration::from_millis(5));
        handle.cancel();
        let last = audio.join().unwrap();

        assert!(handle.is_cancelled());
        assert!(handle.is_finished());
        assert!(last.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Playing.to_string(), "playing");
        assert_eq!(SessionState::from_u8(4), SessionState::Failed);
    }
}
