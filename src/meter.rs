//! Level estimates published for metering.
//!
//! Levels are linear RMS gains smoothed with an exponential moving average.
//! They are advisory: the processing thread stores them with relaxed
//! ordering and readers may observe a value that is one block old.

use atomic_float::AtomicF32;
use std::sync::atomic::Ordering;

/// Level reported for silence by [`gain_to_db`].
pub const SILENCE_DB: f32 = -100.0;

/// Root mean square of `samples`, 0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// One step of an exponential moving average; `alpha` weighs `current`.
pub fn smooth(previous: f32, current: f32, alpha: f32) -> f32 {
    previous * (1.0 - alpha) + current * alpha
}

/// Converts a linear gain to dB, clamped at [`SILENCE_DB`].
pub fn gain_to_db(gain: f32) -> f32 {
    if gain <= 0.0 {
        return SILENCE_DB;
    }
    (20.0 * gain.log10()).max(SILENCE_DB)
}

pub fn db_to_gain(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Single-writer, multi-reader smoothed level cell.
#[derive(Debug)]
pub struct LevelCell {
    value: AtomicF32,
}

impl Default for LevelCell {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelCell {
    pub fn new() -> Self {
        Self {
            value: AtomicF32::new(0.0),
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.value.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Folds the RMS of `samples` into the stored level. Only the processing
    /// thread may call this.
    #[inline]
    pub fn update(&self, samples: &[f32], alpha: f32) {
        self.set(smooth(self.get(), rms(samples), alpha));
    }
}
