//! Sample-counting playback clock.

/// Playback position derived from the number of frames rendered.
///
/// The clock stores a frame count rather than accumulating milliseconds, so
/// the elapsed time after `S` frames is exactly `S * 1000 / sample_rate` no
/// matter how the frames were split into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackClock {
    sample_rate: u32,
    frames: u64,
}

impl PlaybackClock {
    /// Creates a clock at time zero.
    ///
    /// `sample_rate` must be non-zero; session setup validates it.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frames: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Elapsed playback time in milliseconds.
    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        frames_to_ms(self.frames, self.sample_rate)
    }

    /// Advances by the number of frames actually rendered.
    #[inline]
    pub fn advance(&mut self, frames: usize) {
        self.frames += frames as u64;
    }
}

/// Converts a frame count to milliseconds at `sample_rate`.
#[inline]
pub fn frames_to_ms(frames: u64, sample_rate: u32) -> f64 {
    frames as f64 * 1000.0 / f64::from(sample_rate)
}

/// Converts milliseconds to a frame count at `sample_rate`, rounding up.
///
/// Saturates at `u64::MAX / 1000` frames rather than wrapping.
pub fn ms_to_frames(ms: u64, sample_rate: u32) -> u64 {
    ms.saturating_mul(u64::from(sample_rate)).div_ceil(1000)
}
