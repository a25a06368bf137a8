//! # Parameter Mailbox
//!
//! Parameters reach the audio thread through a two-stage handoff:
//!
//! ```text
//!  UI / automation thread              audio thread
//!  ──────────────────────              ────────────
//!  set_mix(0.3) ─┐
//!  set_feedback ─┼──► ParameterMailbox ──snapshot()──► DelayParameters
//!  set_delay    ─┘     (pending, atomics)  once per      (active, plain Copy,
//!                                          block          read by every sample)
//! ```
//!
//! Setters may run at any time on any thread. The audio thread copies the
//! mailbox into a plain [`DelayParameters`] once at the start of each
//! block, so no single block ever sees a parameter change halfway through.
//!
//! Each field is its own relaxed atomic. If a setter lands while the
//! snapshot is being taken, one field may be from before and one from
//! after the change. That is accepted: every field is a standalone scalar,
//! so the worst case is one block with a slightly stale value.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use super::seconds_to_samples;

pub const DEFAULT_MIX: f32 = 0.5;
pub const DEFAULT_FEEDBACK: f32 = 0.0;
pub const DEFAULT_DELAY_TIME_SECONDS: f32 = 0.5;

/// The active parameter set, fixed for the duration of one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayParameters {
    /// How much of the delayed signal is added to the dry signal.
    pub mix: f32,
    /// Share of the processed output that is written back into the ring.
    pub feedback: f32,
    pub delay_time_seconds: f32,
    /// `delay_time_seconds` converted at the current sample rate and
    /// clamped into the ring.
    pub delay_samples: usize,
    /// `false` bypasses the wet path entirely.
    pub enabled: bool,
}

impl Default for DelayParameters {
    fn default() -> Self {
        Self {
            mix: DEFAULT_MIX,
            feedback: DEFAULT_FEEDBACK,
            delay_time_seconds: DEFAULT_DELAY_TIME_SECONDS,
            delay_samples: 0,
            enabled: true,
        }
    }
}

/// An `f32` that can be shared between threads, stored as its raw bits.
#[derive(Debug)]
struct AtomicSample(AtomicU32);

impl AtomicSample {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// The pending parameter set. All setters take `&self`.
///
/// Values are stored as given. Out-of-range input (negative delay, feedback
/// above 1) is not rejected; the snapshot clamps the delay into the ring and
/// the engine zeroes non-finite samples before they reach the buffer.
#[derive(Debug)]
pub struct ParameterMailbox {
    mix: AtomicSample,
    feedback: AtomicSample,
    delay_time_seconds: AtomicSample,
    /// Only read by the multi-channel wrapper.
    stereo_offset_seconds: AtomicSample,
    enabled: AtomicBool,
}

impl Default for ParameterMailbox {
    fn default() -> Self {
        Self {
            mix: AtomicSample::new(DEFAULT_MIX),
            feedback: AtomicSample::new(DEFAULT_FEEDBACK),
            delay_time_seconds: AtomicSample::new(DEFAULT_DELAY_TIME_SECONDS),
            stereo_offset_seconds: AtomicSample::new(0.0),
            enabled: AtomicBool::new(true),
        }
    }
}

impl ParameterMailbox {
    pub fn set_mix(&self, mix: f32) {
        self.mix.store(mix);
    }

    pub fn set_feedback(&self, feedback: f32) {
        self.feedback.store(feedback);
    }

    pub fn set_delay_time_seconds(&self, seconds: f32) {
        self.delay_time_seconds.store(seconds);
    }

    pub fn set_stereo_offset_seconds(&self, seconds: f32) {
        self.stereo_offset_seconds.store(seconds);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn mix(&self) -> f32 {
        self.mix.load()
    }

    pub fn feedback(&self) -> f32 {
        self.feedback.load()
    }

    pub fn delay_time_seconds(&self) -> f32 {
        self.delay_time_seconds.load()
    }

    pub fn stereo_offset_seconds(&self) -> f32 {
        self.stereo_offset_seconds.load()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Copy the pending values into an active set for one block.
    pub fn snapshot(&self, sample_rate: f32, capacity: usize) -> DelayParameters {
        let delay_time_seconds = self.delay_time_seconds();

        DelayParameters {
            mix: self.mix(),
            feedback: self.feedback(),
            delay_time_seconds,
            delay_samples: delay_samples_for(delay_time_seconds, sample_rate, capacity),
            enabled: self.is_enabled(),
        }
    }
}

/// Convert a delay time to a whole number of samples that fits the ring.
///
/// The result is at least one sample, so the read never lands on the slot
/// that is about to be overwritten, and at most `capacity - 1`.
pub fn delay_samples_for(seconds: f32, sample_rate: f32, capacity: usize) -> usize {
    let longest = capacity.saturating_sub(1);
    seconds_to_samples(seconds, sample_rate).max(1).min(longest)
}

/// A cloneable, thread-safe handle to an engine's pending parameters.
///
/// Hand this to a UI or automation thread. It only exposes the setters
/// that are safe to call concurrently with processing; repositioning the
/// read head instantly requires `&mut` access to the engine itself.
///
/// A single engine has no stereo offset, so neither does its handle. See
/// [`MultiChannelHandle`] for that.
#[derive(Debug, Clone)]
pub struct DelayHandle {
    mailbox: Arc<ParameterMailbox>,
}

impl DelayHandle {
    pub(crate) fn new(mailbox: Arc<ParameterMailbox>) -> Self {
        Self { mailbox }
    }

    pub fn set_mix(&self, mix: f32) {
        self.mailbox.set_mix(mix);
    }

    pub fn set_feedback(&self, feedback: f32) {
        self.mailbox.set_feedback(feedback);
    }

    /// Request a new delay time. The read head glides toward it.
    pub fn set_delay_time_seconds(&self, seconds: f32) {
        self.mailbox.set_delay_time_seconds(seconds);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.mailbox.set_enabled(enabled);
    }

    pub fn mix(&self) -> f32 {
        self.mailbox.mix()
    }

    pub fn feedback(&self) -> f32 {
        self.mailbox.feedback()
    }

    pub fn delay_time_seconds(&self) -> f32 {
        self.mailbox.delay_time_seconds()
    }

    pub fn is_enabled(&self) -> bool {
        self.mailbox.is_enabled()
    }
}

/// A [`DelayHandle`] for a multi-channel delay, which also carries the
/// per-channel stereo offset.
#[derive(Debug, Clone)]
pub struct MultiChannelHandle {
    handle: DelayHandle,
}

impl MultiChannelHandle {
    pub(crate) fn new(mailbox: Arc<ParameterMailbox>) -> Self {
        Self {
            handle: DelayHandle::new(mailbox),
        }
    }

    /// Extra delay added per channel index.
    pub fn set_stereo_offset_seconds(&self, seconds: f32) {
        self.handle.mailbox.set_stereo_offset_seconds(seconds);
    }

    pub fn stereo_offset_seconds(&self) -> f32 {
        self.handle.mailbox.stereo_offset_seconds()
    }
}

impl Deref for MultiChannelHandle {
    type Target = DelayHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
