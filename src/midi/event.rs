//! Decoded, time-stamped MIDI events.
//!
//! Events carry an absolute time in milliseconds from the start of the
//! sequence. Tick resolution and tempo have already been resolved by the
//! parser, so the render loop only compares times against its clock.

/// Number of MIDI channels.
pub const MIDI_CHANNELS: u8 = 16;

/// Channel reserved for percussion by General MIDI (the 10th channel).
pub const PERCUSSION_CHANNEL: u8 = 9;

/// Largest 14-bit pitch wheel value.
pub const PITCH_BEND_MAX: u16 = 0x3FFF;

/// Kind-specific payload of a [`MidiEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Select an instrument (preset) for the channel.
    ProgramChange {
        /// Program number (0-127).
        program: u8,
    },
    /// Start a note.
    NoteOn {
        /// MIDI note number (0-127).
        key: u8,
        /// Raw MIDI velocity (1-127).
        velocity: u8,
    },
    /// Stop a note.
    NoteOff {
        /// MIDI note number (0-127).
        key: u8,
    },
    /// Move the pitch wheel.
    PitchBend {
        /// 14-bit wheel position (0-16383, 8192 is centre).
        value: u16,
    },
    /// Controller message (volume, pan, sustain, bank select...).
    ControlChange {
        /// Controller number (0-127).
        controller: u8,
        /// Controller value (0-127).
        value: u8,
    },
}

/// A single MIDI channel event at an absolute time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiEvent {
    /// Time from the start of the sequence, in milliseconds.
    pub time_ms: f64,
    /// MIDI channel (0-15).
    pub channel: u8,
    /// What the event does.
    pub kind: EventKind,
}

impl MidiEvent {
    /// Creates an event.
    pub fn new(time_ms: f64, channel: u8, kind: EventKind) -> Self {
        Self {
            time_ms,
            channel,
            kind,
        }
    }

    pub fn program_change(time_ms: f64, channel: u8, program: u8) -> Self {
        Self::new(time_ms, channel, EventKind::ProgramChange { program })
    }

    pub fn note_on(time_ms: f64, channel: u8, key: u8, velocity: u8) -> Self {
        Self::new(time_ms, channel, EventKind::NoteOn { key, velocity })
    }

    pub fn note_off(time_ms: f64, channel: u8, key: u8) -> Self {
        Self::new(time_ms, channel, EventKind::NoteOff { key })
    }

    pub fn pitch_bend(time_ms: f64, channel: u8, value: u16) -> Self {
        Self::new(time_ms, channel, EventKind::PitchBend { value })
    }

    pub fn control_change(time_ms: f64, channel: u8, controller: u8, value: u8) -> Self {
        Self::new(
            time_ms,
            channel,
            EventKind::ControlChange { controller, value },
        )
    }

    /// Returns true if this event targets the General MIDI percussion channel.
    pub fn is_percussion(&self) -> bool {
        self.channel == PERCUSSION_CHANNEL
    }
}

/// Converts a raw MIDI velocity (0-127) into the engine's 0.0-1.0 range.
#[inline]
pub fn velocity_to_unit(velocity: u8) -> f32 {
    f32::from(velocity.min(127)) / 127.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_to_unit() {
        assert_eq!(velocity_to_unit(0), 0.0);
        assert_eq!(velocity_to_unit(127), 1.0);
        assert!((velocity_to_unit(100) - 0.7874).abs() < 0.001);
        // Out-of-range input is clamped rather than exceeding 1.0
        assert_eq!(velocity_to_unit(200), 1.0);
    }

    #[test]
    fn test_percussion_channel() {
        assert!(MidiEvent::program_change(0.0, 9, 0).is_percussion());
        assert!(!MidiEvent::program_change(0.0, 0, 0).is_percussion());
    }
}
