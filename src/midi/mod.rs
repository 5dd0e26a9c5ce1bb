//! MIDI data model for playback.
//!
//! This module provides the decoded event representation consumed by the
//! render loop, the ordered [`EventStream`] that owns the playback cursor,
//! and the Standard MIDI File parser that builds it.

mod event;
pub mod smf;
mod stream;

pub use event::{
    velocity_to_unit, EventKind, MidiEvent, MIDI_CHANNELS, PERCUSSION_CHANNEL, PITCH_BEND_MAX,
};
pub use stream::EventStream;
