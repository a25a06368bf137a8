//! # Read Head Controller
//!
//! The read head decides *where* in the ring buffer the delayed sample is
//! taken from. Under a constant delay time it moves exactly one slot per
//! sample, in lockstep with the write head, so the output is a clean
//! copy of the input `delay_samples` ago.
//!
//! ## Re-tracking without clicks
//!
//! When the delay time changes, the naive approach is to move the read
//! head straight to `write_head - new_delay`. That skips (or repeats) a
//! chunk of audio in a single sample, which you hear as a click.
//!
//! Instead we let the head *drift* toward the new target, like a tape
//! machine whose playback speed is nudged up or down:
//!
//! ```text
//! target_distance = write_head - delay_samples - read_head   (buffer-wrapped)
//! speed           = 1 + target_distance * time_constant_per_sample
//! speed           = clamp(speed, min_speed, max_speed)
//! read_head      += speed
//! ```
//!
//! Far from the target the head moves fast (or slow), close to it the
//! correction shrinks exponentially. The clamp bounds the pitch bend you
//! hear while it catches up: at the defaults, playback never runs slower
//! than 0.2x or faster than 5x. Within half a sample of the target the
//! head counts as locked and only the unit step is applied.

/// Smoothing time in seconds. Larger is slower and smoother.
pub const DEFAULT_TIME_CONSTANT_SECONDS: f64 = 3.072;

/// Slowest playback rate allowed while catching up (0.2x).
pub const DEFAULT_MIN_READ_HEAD_SPEED: f64 = 0.2;

/// Fastest playback rate allowed while catching up (5x).
pub const DEFAULT_MAX_READ_HEAD_SPEED: f64 = 5.0;

/// Below this many samples of remaining distance the head is locked.
pub const LOCK_THRESHOLD_SAMPLES: f64 = 0.5;

/// How aggressively the read head chases a new delay target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadHeadTuning {
    /// Smoothing time in seconds, scaled per sample by the sample rate.
    pub time_constant_seconds: f64,
    /// Lower bound for the instantaneous playback rate.
    pub min_speed: f64,
    /// Upper bound for the instantaneous playback rate.
    pub max_speed: f64,
}

impl Default for ReadHeadTuning {
    fn default() -> Self {
        Self {
            time_constant_seconds: DEFAULT_TIME_CONSTANT_SECONDS,
            min_speed: DEFAULT_MIN_READ_HEAD_SPEED,
            max_speed: DEFAULT_MAX_READ_HEAD_SPEED,
        }
    }
}

/// Fractional read position plus the state needed to steer it.
///
/// The position is an `f64`: after hours of variable-speed playback an
/// `f32` would no longer resolve sub-sample offsets in a multi-second
/// buffer.
#[derive(Debug)]
pub struct ReadHeadController {
    /// Fractional index into the ring, always in `0..capacity`.
    position: f64,

    /// Signed distance still to travel, as of the last step.
    target_distance: f64,

    /// Ring capacity in samples. Zero until prepared.
    capacity: usize,

    sample_rate: f64,
    tuning: ReadHeadTuning,

    /// `tuning.time_constant_seconds / sample_rate`. Only recomputed
    /// while the sample rate is valid.
    time_constant_per_sample: f64,
}

impl Default for ReadHeadController {
    fn default() -> Self {
        Self::new(ReadHeadTuning::default())
    }
}

impl ReadHeadController {
    pub fn new(tuning: ReadHeadTuning) -> Self {
        Self {
            position: 0.0,
            target_distance: 0.0,
            capacity: 0,
            sample_rate: 0.0,
            tuning,
            time_constant_per_sample: 0.0,
        }
    }

    /// Adopt a new ring capacity and sample rate, rewinding to index 0.
    ///
    /// A sample rate of zero leaves the per-sample coefficient untouched.
    pub fn prepare(&mut self, sample_rate: f32, capacity: usize) {
        self.sample_rate = f64::from(sample_rate);
        self.capacity = capacity;
        self.position = 0.0;
        self.target_distance = 0.0;
        self.update_coefficient();
    }

    pub fn set_time_constant(&mut self, seconds: f64) {
        self.tuning.time_constant_seconds = seconds;
        self.update_coefficient();
    }

    pub fn set_min_speed(&mut self, speed: f64) {
        self.tuning.min_speed = speed;
    }

    pub fn set_max_speed(&mut self, speed: f64) {
        self.tuning.max_speed = speed;
    }

    pub fn tuning(&self) -> ReadHeadTuning {
        self.tuning
    }

    pub fn time_constant_per_sample(&self) -> f64 {
        self.time_constant_per_sample
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn target_distance(&self) -> f64 {
        self.target_distance
    }

    pub fn is_locked(&self) -> bool {
        self.target_distance.abs() <= LOCK_THRESHOLD_SAMPLES
    }

    /// Integer slot the engine should read from: the nearest one.
    ///
    /// A glide stops anywhere inside the ±0.5 lock band, on either side of
    /// the target. Rounding maps the whole band onto the target slot;
    /// truncating would read one slot early after approaching from behind.
    #[inline]
    pub fn index(&self) -> usize {
        if self.capacity == 0 {
            return 0;
        }
        // Rounding up past the last slot wraps to 0.
        ((self.position + 0.5) as usize) % self.capacity
    }

    /// Place the head so that the next [`advance()`](Self::advance) lands
    /// exactly on `write_head - delay_samples`, with nothing left to catch up.
    pub fn lock_to(&mut self, write_head: usize, delay_samples: usize) {
        if self.capacity == 0 {
            return;
        }
        let target = write_head as f64 - delay_samples as f64 - 1.0;
        self.position = target.rem_euclid(self.capacity as f64);
        self.target_distance = 0.0;
    }

    /// Move the head by one sample's worth of travel.
    ///
    /// `write_head` is the slot about to be written this sample.
    #[inline]
    pub fn advance(&mut self, write_head: usize, delay_samples: usize) {
        if self.capacity == 0 {
            return;
        }
        let capacity = self.capacity as f64;
        let write_head = write_head as f64;

        // Baseline: one slot per sample, same as the write head.
        self.position += 1.0;
        if self.position >= capacity {
            self.position -= capacity;
        }

        let mut distance = write_head - delay_samples as f64 - self.position;
        if write_head < self.position {
            distance += capacity;
        }
        self.target_distance = distance;

        if distance.abs() > LOCK_THRESHOLD_SAMPLES {
            // max/min rather than clamp(): a caller may set min > max.
            let speed = (1.0 + distance * self.time_constant_per_sample)
                .max(self.tuning.min_speed)
                .min(self.tuning.max_speed);
            let extra = speed - 1.0;

            self.position = (self.position + extra).rem_euclid(capacity);
            self.target_distance -= extra;
        }

        nih_plug::nih_debug_assert!(self.position.is_finite());
    }

    fn update_coefficient(&mut self) {
        if self.sample_rate > 0.0 {
            self.time_constant_per_sample = self.tuning.time_constant_seconds / self.sample_rate;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
