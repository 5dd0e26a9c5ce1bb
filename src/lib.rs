//! midiplay - sample-accurate MIDI playback through a SoundFont synthesizer.
//!
//! Compressed MIDI assets are located in a pair of cache directories,
//! unpacked, parsed into a time-ordered event stream and rendered from the
//! audio callback in engine-sized blocks, applying each event at the block
//! where the playback clock reaches it.

pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod midi;

// Re-export commonly used types
pub use audio::{
    AudioSink, Playback, PlaybackHandle, RenderSession, SampleFormat, SessionState,
    SoundFontEngine, SynthesisEngine,
};
pub use cache::{AssetLocator, Loader};
pub use config::PlayerConfig;
pub use error::{PlayerError, Result};
pub use midi::{EventKind, EventStream, MidiEvent};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::engine::testing::{Call, RecordingEngine};
    use crate::midi::smf::fixtures::{event, smf};
    use std::fs;

    #[test]
    fn test_cached_asset_plays_to_completion() {
        // Drums on channel 10 plus a melodic note, 120 BPM, 480 ticks per beat
        let midi = smf(
            0,
            480,
            &[vec![
                event(0, &[0xC9, 25]),
                event(0, &[0x99, 36, 127]),
                event(0, &[0x90, 60, 100]),
                event(480, &[0x80, 60, 0]),
                event(0, &[0x89, 36, 0]),
            ]],
        );
        let root = tempfile::tempdir().unwrap();
        let jingles = root.path().join("jingles");
        fs::create_dir_all(&jingles).unwrap();
        fs::write(jingles.join("fanfare.mid"), cache::compress(&midi).unwrap()).unwrap();

        let config = PlayerConfig {
            primary_dir: root.path().join("songs"),
            fallback_dir: jingles,
            sample_format: SampleFormat::I16,
            buffer_size: 4096,
            ..PlayerConfig::default()
        };
        let loader = Loader::new(AssetLocator::from_config(&config));
        let events = loader.load("fanfare", Some(midi.len())).unwrap();

        let mut playback = Playback::new(config.sample_rate);
        playback
            .load(events, RecordingEngine::new(64), config.sample_format)
            .unwrap();
        let handle = playback.handle();
        let mut session = playback.start().unwrap();

        let mut buf = vec![0i16; config.buffer_size * 2];
        let mut callbacks = 0;
        while !handle.is_finished() {
            session.render_into(&mut buf);
            callbacks += 1;
        }

        // 500ms needs six 4096-frame callbacks (~93ms each)
        assert_eq!(callbacks, 6);
        assert_eq!(handle.state(), SessionState::Finished);
        assert_eq!(
            session.engine().call_list()[0],
            Call::Program {
                channel: 9,
                program: 25,
                percussion: true
            }
        );
        assert_eq!(session.engine().calls.len(), 5);
    }
}
