//! Synthesis engine interface and the SoundFont-backed implementation.
//!
//! The render loop talks to the synthesizer only through
//! [`SynthesisEngine`], so sessions can be driven by rustysynth in
//! production and by a recording stand-in under test.

use crate::error::{PlayerError, Result};
use crate::midi::{PERCUSSION_CHANNEL, PITCH_BEND_MAX};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// SoundFont bank that holds drum kits.
pub const PERCUSSION_BANK: i32 = 128;

/// Stateful per-channel synthesizer driven by discrete control events.
///
/// Rendering methods write interleaved stereo (`L, R, L, R, ...`); the
/// number of frames is `out.len() / 2`. Implementations must not allocate
/// or block in any method: they are called from the audio callback.
pub trait SynthesisEngine {
    /// Frames the engine processes per internal step. Must be non-zero.
    fn block_size(&self) -> usize;

    /// Selects a preset. With `use_percussion_bank` the drum bank is used
    /// whatever the program number.
    ///
    /// General MIDI reserves drums for channel 9 and engines may honour the
    /// flag only there; on other channels it can be ignored.
    fn set_program(&mut self, channel: u8, program: u8, use_percussion_bank: bool);

    /// Starts a note. `velocity` is in 0.0..=1.0.
    fn note_on(&mut self, channel: u8, key: u8, velocity: f32);

    fn note_off(&mut self, channel: u8, key: u8);

    /// Sets the 14-bit pitch wheel position (8192 = centre).
    fn set_pitch_bend(&mut self, channel: u8, value: u16);

    fn control_change(&mut self, channel: u8, controller: u8, value: u8);

    /// Silences every voice immediately.
    fn all_notes_off(&mut self);

    fn render_f32(&mut self, out: &mut [f32]);

    fn render_i16(&mut self, out: &mut [i16]);
}

/// [`SynthesisEngine`] backed by a rustysynth [`Synthesizer`].
///
/// Owns per-block scratch buffers so that rendering into the caller's
/// interleaved buffer never allocates.
pub struct SoundFontEngine {
    synth: Synthesizer,
    sample_rate: u32,
    block_size: usize,
    left_buf: Vec<f32>,
    right_buf: Vec<f32>,
}

impl SoundFontEngine {
    /// Loads a SoundFont file and creates a synthesizer for it.
    ///
    /// # Arguments
    ///
    /// * `soundfont_path` - Path to the SoundFont file (.sf2)
    /// * `sample_rate` - Output sample rate in Hz
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::EngineInit`] if:
    /// - The SoundFont file cannot be read
    /// - The SoundFont is invalid
    /// - The synthesizer rejects the sample rate
    pub fn from_file<P: AsRef<Path>>(soundfont_path: P, sample_rate: u32) -> Result<Self> {
        let path = soundfont_path.as_ref();
        let file = File::open(path).map_err(|e| {
            PlayerError::EngineInit(format!(
                "Failed to open SoundFont {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut reader = BufReader::new(file);
        let soundfont = SoundFont::new(&mut reader)
            .map_err(|e| PlayerError::EngineInit(format!("Failed to load SoundFont: {:?}", e)))?;
        tracing::info!("Loaded SoundFont {}", path.display());

        Self::from_soundfont(Arc::new(soundfont), sample_rate)
    }

    /// Creates a synthesizer for an already loaded SoundFont.
    pub fn from_soundfont(soundfont: Arc<SoundFont>, sample_rate: u32) -> Result<Self> {
        let presets = soundfont.get_presets();
        let has_drums = presets
            .iter()
            .any(|p| p.get_bank_number() == PERCUSSION_BANK);
        if !has_drums {
            tracing::warn!("SoundFont has no percussion bank; channel 10 will use melodic presets");
        }
        tracing::debug!("SoundFont provides {} presets", presets.len());

        let sample_rate_i32 = i32::try_from(sample_rate)
            .map_err(|_| {
                PlayerError::EngineInit(format!("Unsupported sample rate {}", sample_rate))
            })?;
        let settings = SynthesizerSettings::new(sample_rate_i32);
        let block_size = settings.block_size;
        let synth = Synthesizer::new(&soundfont, &settings)
            .map_err(|e| {
                PlayerError::EngineInit(format!("Failed to create synthesizer: {:?}", e))
            })?;

        Ok(Self {
            synth,
            sample_rate,
            block_size,
            left_buf: vec![0.0; block_size],
            right_buf: vec![0.0; block_size],
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Points the percussion channel at the drum bank, program 0.
    ///
    /// Files that never send a program change on channel 10 still get drums.
    pub fn prime_percussion(&mut self) {
        self.set_program(PERCUSSION_CHANNEL, 0, true);
    }

    /// Renders `out.len() / 2` frames block by block, converting each
    /// sample with `convert`.
    fn render_interleaved<T: Copy + Default>(&mut self, out: &mut [T], convert: impl Fn(f32) -> T) {
        for chunk in out.chunks_mut(self.block_size * 2) {
            let frames = chunk.len() / 2;
            let left = &mut self.left_buf[..frames];
            let right = &mut self.right_buf[..frames];
            self.synth.render(left, right);

            for (i, frame) in chunk.chunks_exact_mut(2).enumerate() {
                frame[0] = convert(left[i]);
                frame[1] = convert(right[i]);
            }
            // An odd trailing sample has no partner channel
            if chunk.len() % 2 == 1 {
                chunk[chunk.len() - 1] = T::default();
            }
        }
    }
}

/// Bank select value that puts `channel` on the drum bank, if it can have one.
///
/// rustysynth adds [`PERCUSSION_BANK`] to the bank number of channel 9 only,
/// so bank select 0 there means bank 128. Other channels have no drum bank
/// and the flag is ignored for them.
fn percussion_bank_select(channel: u8, use_percussion_bank: bool) -> Option<i32> {
    (use_percussion_bank && channel == PERCUSSION_CHANNEL).then_some(0)
}

/// Converts a float sample (-1.0 to 1.0) to 16-bit PCM.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

impl SynthesisEngine for SoundFontEngine {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn set_program(&mut self, channel: u8, program: u8, use_percussion_bank: bool) {
        if let Some(bank) = percussion_bank_select(channel, use_percussion_bank) {
            self.synth
                .process_midi_message(i32::from(channel), 0xB0, 0x00, bank);
        }
        // Program change is MIDI command 0xC0 (192)
        self.synth
            .process_midi_message(i32::from(channel), 0xC0, i32::from(program), 0);
    }

    fn note_on(&mut self, channel: u8, key: u8, velocity: f32) {
        let velocity = (velocity.clamp(0.0, 1.0) * 127.0).round() as i32;
        self.synth
            .note_on(i32::from(channel), i32::from(key), velocity);
    }

    fn note_off(&mut self, channel: u8, key: u8) {
        self.synth.note_off(i32::from(channel), i32::from(key));
    }

    fn set_pitch_bend(&mut self, channel: u8, value: u16) {
        let value = value.min(PITCH_BEND_MAX);
        let lsb = i32::from(value & 0x7F);
        let msb = i32::from((value >> 7) & 0x7F);
        self.synth
            .process_midi_message(i32::from(channel), 0xE0, lsb, msb);
    }

    fn control_change(&mut self, channel: u8, controller: u8, value: u8) {
        self.synth.process_midi_message(
            i32::from(channel),
            0xB0,
            i32::from(controller),
            i32::from(value),
        );
    }

    fn all_notes_off(&mut self) {
        self.synth.note_off_all(true);
    }

    fn render_f32(&mut self, out: &mut [f32]) {
        self.render_interleaved(out, |s| s);
    }

    fn render_i16(&mut self, out: &mut [i16]) {
        self.render_interleaved(out, f32_to_i16);
    }
}
