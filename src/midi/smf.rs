//! Standard MIDI File (SMF) parsing into an [`EventStream`].
//!
//! Supports SMF Format 0 (single track) and Format 1 (multi-track) files
//! with either metrical or SMPTE timecode timing. All tracks are merged into
//! a single sequence and tick positions are converted to milliseconds.
//!
//! # Limitations
//!
//! - Format 2 (sequential) files are rejected
//! - Aftertouch, SysEx and meta events other than tempo are dropped

use super::event::{EventKind, MidiEvent};
use super::stream::EventStream;
use crate::error::{PlayerError, Result};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

/// Tempo assumed until the first Set Tempo event (120 BPM).
pub const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

/// How ticks map onto wall-clock time for a file.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TimeBase {
    /// Ticks per quarter note; duration depends on the current tempo.
    Metrical { ticks_per_beat: u16 },
    /// Fixed duration per tick, independent of tempo.
    Timecode { ms_per_tick: f64 },
}

impl TimeBase {
    fn ms_per_tick(self, micros_per_beat: u32) -> f64 {
        match self {
            TimeBase::Metrical { ticks_per_beat } => {
                f64::from(micros_per_beat) / 1000.0 / f64::from(ticks_per_beat)
            }
            TimeBase::Timecode { ms_per_tick } => ms_per_tick,
        }
    }
}

/// Event payload collected while merging tracks, before timing is resolved.
#[derive(Debug, Clone, Copy)]
enum Payload {
    Tempo(u32),
    Channel { channel: u8, kind: EventKind },
}

#[derive(Debug, Clone, Copy)]
struct TickedPayload {
    tick: u64,
    payload: Payload,
}

/// Parses an in-memory MIDI file.
///
/// # Arguments
///
/// * `bytes` - Complete, decompressed SMF data
///
/// # Returns
///
/// An [`EventStream`] with every channel event of every track, in time order
///
/// # Errors
///
/// Returns [`PlayerError::Decode`] if the data is not a valid SMF, uses
/// Format 2, or declares a zero time division.
pub fn parse(bytes: &[u8]) -> Result<EventStream> {
    let smf =
        Smf::parse(bytes).map_err(|e| PlayerError::decode(format!("MIDI parse error: {}", e)))?;

    if smf.header.format == Format::Sequential {
        return Err(PlayerError::decode(
            "Format 2 (sequential) MIDI files not supported",
        ));
    }

    let time_base = match smf.header.timing {
        Timing::Metrical(tpb) => {
            let ticks_per_beat = tpb.as_int();
            if ticks_per_beat == 0 {
                return Err(PlayerError::decode("MIDI header declares 0 ticks per beat"));
            }
            TimeBase::Metrical { ticks_per_beat }
        }
        Timing::Timecode(fps, subframes) => {
            let ticks_per_second = f64::from(fps.as_f32()) * f64::from(subframes);
            if ticks_per_second <= 0.0 {
                return Err(PlayerError::decode("MIDI header declares 0 timecode subframes"));
            }
            TimeBase::Timecode {
                ms_per_tick: 1000.0 / ticks_per_second,
            }
        }
    };

    let mut merged: Vec<TickedPayload> = Vec::new();
    for track in &smf.tracks {
        let mut tick: u64 = 0;
        for event in track {
            tick += u64::from(event.delta.as_int());
            let payload = match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => Payload::Tempo(tempo.as_int()),
                TrackEventKind::Midi { channel, message } => match convert_message(message) {
                    Some(kind) => Payload::Channel {
                        channel: channel.as_int(),
                        kind,
                    },
                    None => continue,
                },
                _ => continue, // SysEx, escapes and other meta events
            };
            merged.push(TickedPayload { tick, payload });
        }
    }

    // Stable sort: events at the same tick keep track order, then file order
    merged.sort_by_key(|p| p.tick);

    let mut events = Vec::with_capacity(merged.len());
    let mut micros_per_beat = DEFAULT_MICROS_PER_BEAT;
    let mut last_tick: u64 = 0;
    let mut time_ms = 0.0f64;

    for entry in merged {
        time_ms += (entry.tick - last_tick) as f64 * time_base.ms_per_tick(micros_per_beat);
        last_tick = entry.tick;

        match entry.payload {
            Payload::Tempo(tempo) => {
                // A zero tempo would freeze the clock
                if tempo > 0 {
                    micros_per_beat = tempo;
                }
            }
            Payload::Channel { channel, kind } => {
                events.push(MidiEvent::new(time_ms, channel, kind));
            }
        }
    }

    EventStream::new(events)
}

/// Maps a channel message onto the subset the renderer understands.
fn convert_message(message: MidiMessage) -> Option<EventKind> {
    match message {
        MidiMessage::NoteOn { key, vel } => {
            let key = key.as_int();
            let velocity = vel.as_int();
            if velocity > 0 {
                Some(EventKind::NoteOn { key, velocity })
            } else {
                // Note on with velocity 0 = note off
                Some(EventKind::NoteOff { key })
            }
        }
        MidiMessage::NoteOff { key, vel: _ } => Some(EventKind::NoteOff { key: key.as_int() }),
        MidiMessage::ProgramChange { program } => Some(EventKind::ProgramChange {
            program: program.as_int(),
        }),
        MidiMessage::PitchBend { bend } => Some(EventKind::PitchBend {
            value: bend.0.as_int(),
        }),
        MidiMessage::Controller { controller, value } => Some(EventKind::ControlChange {
            controller: controller.as_int(),
            value: value.as_int(),
        }),
        _ => None, // Aftertouch is not forwarded
    }
}
