//! Real-time MIDI rendering.
//!
//! This module turns an [`EventStream`](crate::midi::EventStream) into
//! audio. It provides:
//! - The synthesis engine interface and a rustysynth implementation
//! - The sample-accurate render loop and its playback clock
//! - The session lifecycle shared between control and audio threads
//! - Audio output via rodio and offline WAV export via hound

pub mod clock;
pub mod engine;
pub mod export;
pub mod render;
pub mod session;
pub mod sink;

pub use clock::PlaybackClock;
pub use engine::{SoundFontEngine, SynthesisEngine};
pub use export::render_to_wav;
pub use render::{apply_event, OutputSample, RenderSession, SampleBuffer, SampleFormat};
pub use session::{Playback, PlaybackHandle, SessionState};
pub use sink::{play_until_finished, wait_until_finished, AudioSink, SinkConfig};
