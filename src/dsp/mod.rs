//! # DSP (Digital Signal Processing) Core
//!
//! Everything here is independent of the plugin host and can be driven
//! from plain slices of `f32`:
//!
//! - **`ring_buffer`**: fixed-capacity circular sample storage.
//!
//! - **`read_head`**: the fractional read position and the logic that
//!   steers it toward a new delay time at a bounded speed, which is what
//!   makes delay time changes click-free.
//!
//! - **`mailbox`**: the pending/active parameter handoff between setter
//!   threads and the audio thread.
//!
//! - **`channel_delay`**: the per-channel sample loop tying the above
//!   together.
//!
//! - **`multi_channel`**: one channel engine per audio channel, with a
//!   per-channel delay offset for stereo widening.

pub mod channel_delay;
pub mod mailbox;
pub mod multi_channel;
pub mod read_head;
pub mod ring_buffer;

/// Longest delay the ring is sized for unless the caller asks otherwise.
pub const DEFAULT_MAX_DELAY_SECONDS: f32 = 12.0;

/// Convert a duration to the nearest whole number of samples.
///
/// Negative, NaN and infinite products all map to zero.
pub fn seconds_to_samples(seconds: f32, sample_rate: f32) -> usize {
    let samples = (f64::from(seconds) * f64::from(sample_rate)).round();
    if samples.is_finite() && samples > 0.0 {
        samples as usize
    } else {
        0
    }
}
