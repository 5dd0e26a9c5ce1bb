//! In-memory event sequence with a consumption cursor.

use super::event::{MidiEvent, MIDI_CHANNELS};
use crate::error::{PlayerError, Result};

/// Time-ordered MIDI events plus the index of the next unconsumed one.
///
/// The events themselves are immutable once built. Only the cursor moves,
/// and only forward: [`EventStream::pop_due`] consumes events whose time
/// has been reached and [`EventStream::finish`] jumps straight to the end.
#[derive(Debug, Clone)]
pub struct EventStream {
    events: Vec<MidiEvent>,
    cursor: usize,
}

impl EventStream {
    /// Builds a stream from events that are already in time order.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Decode`] if a time is negative or not finite,
    /// a channel is out of range, or the times ever decrease. Events are
    /// never reordered.
    pub fn new(events: Vec<MidiEvent>) -> Result<Self> {
        let mut last = 0.0f64;
        for (index, event) in events.iter().enumerate() {
            if !event.time_ms.is_finite() || event.time_ms < 0.0 {
                return Err(PlayerError::decode(format!(
                    "event {} has invalid time {}",
                    index, event.time_ms
                )));
            }
            if event.channel >= MIDI_CHANNELS {
                return Err(PlayerError::decode(format!(
                    "event {} uses channel {}",
                    index, event.channel
                )));
            }
            if event.time_ms < last {
                return Err(PlayerError::decode(format!(
                    "event {} at {}ms precedes previous event at {}ms",
                    index, event.time_ms, last
                )));
            }
            last = event.time_ms;
        }
        Ok(Self { events, cursor: 0 })
    }

    /// Creates a stream with no events. It is exhausted from the start.
    pub fn empty() -> Self {
        Self {
            events: Vec::new(),
            cursor: 0,
        }
    }

    /// All events, consumed or not.
    pub fn events(&self) -> &[MidiEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Index of the next unconsumed event.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Number of events not yet consumed.
    pub fn remaining(&self) -> usize {
        self.events.len() - self.cursor
    }

    /// Returns true once every event has been consumed (or the stream was
    /// cancelled).
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.events.len()
    }

    /// The next unconsumed event, without consuming it.
    pub fn peek(&self) -> Option<&MidiEvent> {
        self.events.get(self.cursor)
    }

    /// Consumes and returns the next event if it is due at `now_ms`.
    ///
    /// An event is due when its time is less than or equal to `now_ms`.
    /// Never looks past the first event that is not yet due.
    #[inline]
    pub fn pop_due(&mut self, now_ms: f64) -> Option<MidiEvent> {
        let event = *self.events.get(self.cursor)?;
        if event.time_ms <= now_ms {
            self.cursor += 1;
            Some(event)
        } else {
            None
        }
    }

    /// Moves the cursor to the terminal position.
    pub fn finish(&mut self) {
        self.cursor = self.events.len();
    }

    /// Time of the last event, or 0 for an empty stream.
    pub fn duration_ms(&self) -> f64 {
        self.events.last().map_or(0.0, |e| e.time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::EventKind;

    fn two_notes() -> EventStream {
        EventStream::new(vec![
            MidiEvent::note_on(0.0, 0, 60, 100),
            MidiEvent::note_off(500.0, 0, 60),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_unsorted_events() {
        let result = EventStream::new(vec![
            MidiEvent::note_on(10.0, 0, 60, 100),
            MidiEvent::note_off(5.0, 0, 60),
        ]);
        assert!(matches!(result, Err(PlayerError::Decode(_))));
    }

    #[test]
    fn test_rejects_bad_channel_and_time() {
        assert!(EventStream::new(vec![MidiEvent::note_on(0.0, 16, 60, 100)]).is_err());
        assert!(EventStream::new(vec![MidiEvent::note_on(f64::NAN, 0, 60, 100)]).is_err());
        assert!(EventStream::new(vec![MidiEvent::note_on(-1.0, 0, 60, 100)]).is_err());
    }

    #[test]
    fn test_equal_times_are_allowed() {
        let stream = EventStream::new(vec![
            MidiEvent::program_change(0.0, 0, 5),
            MidiEvent::note_on(0.0, 0, 60, 100),
        ])
        .unwrap();
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn test_pop_due_respects_time() {
        let mut stream = two_notes();

        assert!(matches!(
            stream.pop_due(0.0).map(|e| e.kind),
            Some(EventKind::NoteOn { key: 60, .. })
        ));
        assert_eq!(stream.pop_due(499.9), None);
        assert_eq!(stream.position(), 1);
        assert!(stream.pop_due(500.0).is_some());
        assert!(stream.is_exhausted());
        assert_eq!(stream.pop_due(10_000.0), None);
    }

    #[test]
    fn test_finish_jumps_to_end() {
        let mut stream = two_notes();
        stream.finish();
        assert!(stream.is_exhausted());
        assert_eq!(stream.remaining(), 0);
        assert_eq!(stream.peek(), None);
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn test_empty_stream_is_exhausted() {
        let stream = EventStream::empty();
        assert!(stream.is_exhausted());
        assert_eq!(stream.duration_ms(), 0.0);
    }
}
