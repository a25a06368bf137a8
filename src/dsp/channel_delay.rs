//! # Channel Delay Engine
//!
//! One channel's worth of smooth delay: a ring buffer, an integer write
//! head, a fractional read head and the parameters that drive them.
//!
//! ## Per-sample flow (enabled)
//!
//! ```text
//!                 ┌────────────── × mix ──────────────┐
//!                 │                                   ▼
//! x ──┬──────────(+)◄── wet ◄── ring[read_head]      (+)──► y
//!     │                                               ▲
//!     └──────────────────── × (1 - mix) ──────────────┘
//!
//! ring[write_head] ◄── y × feedback + x × (1 - feedback)
//! ```
//!
//! The wet signal is *added* to the dry one under the mix control rather
//! than crossfaded against it. At `mix = 1` the output is `x + wet`.
//!
//! When disabled the wet path is skipped, but the dry input is still
//! written into the ring and the read head keeps moving, so re-enabling
//! plays back real, correctly timed audio instead of stale content.

use std::sync::Arc;

use super::mailbox::{delay_samples_for, DelayHandle, DelayParameters, ParameterMailbox};
use super::read_head::{ReadHeadController, ReadHeadTuning};
use super::ring_buffer::RingBuffer;
use super::seconds_to_samples;

/// A single-channel delay whose delay time can change without clicks.
#[derive(Debug)]
pub struct ChannelDelayEngine {
    /// Pending parameters, written by setters from any thread.
    pending: Arc<ParameterMailbox>,

    /// Active parameters, refreshed from `pending` once per block.
    active: DelayParameters,

    buffer: RingBuffer,
    read_head: ReadHeadController,

    /// Slot the next sample is written to. Always steps by exactly one.
    write_head: usize,

    sample_rate: f32,
}

impl Default for ChannelDelayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelDelayEngine {
    /// Create an unprepared engine with default parameters.
    ///
    /// Nothing is allocated until [`prepare()`](Self::prepare); until then
    /// [`process()`](Self::process) leaves audio untouched.
    pub fn new() -> Self {
        Self::with_tuning(ReadHeadTuning::default())
    }

    pub fn with_tuning(tuning: ReadHeadTuning) -> Self {
        Self {
            pending: Arc::new(ParameterMailbox::default()),
            active: DelayParameters::default(),
            buffer: RingBuffer::default(),
            read_head: ReadHeadController::new(tuning),
            write_head: 0,
            sample_rate: 0.0,
        }
    }

    /// Allocate a silent ring of `max_delay_seconds` and reset both heads.
    ///
    /// The write head starts at slot 0 and the read head is locked onto
    /// the current delay time, so processing starts with nothing to catch
    /// up on. A zero, negative or non-finite sample rate leaves the engine
    /// not ready.
    pub fn prepare(&mut self, sample_rate: f32, max_delay_seconds: f32) {
        self.sample_rate = if sample_rate.is_finite() && sample_rate > 0.0 {
            sample_rate
        } else {
            0.0
        };

        let capacity = seconds_to_samples(max_delay_seconds, self.sample_rate);
        self.buffer.prepare(capacity);
        self.read_head.prepare(self.sample_rate, capacity);
        self.write_head = 0;

        self.active = self.pending.snapshot(self.sample_rate, capacity);
        self.read_head.lock_to(self.write_head, self.active.delay_samples);
    }

    /// Silence the ring and re-lock the heads, keeping parameters.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.write_head = 0;
        self.read_head.lock_to(self.write_head, self.active.delay_samples);
    }

    /// `true` once a ring of at least one sample has been allocated.
    pub fn is_ready(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Process one block of a single channel in place.
    ///
    /// Parameters are snapshotted once here and hold for the whole block.
    pub fn process(&mut self, block: &mut [f32]) {
        self.active = self.pending.snapshot(self.sample_rate, self.buffer.capacity());

        if !self.is_ready() {
            return;
        }

        let DelayParameters {
            mix,
            feedback,
            delay_samples,
            enabled,
            ..
        } = self.active;

        if enabled {
            for sample in block.iter_mut() {
                // 1. Move the read head (unit step plus any catch-up).
                self.read_head.advance(self.write_head, delay_samples);

                // 2. Read the delayed sample.
                let dry = *sample;
                let wet = self.buffer.get(self.read_head.index());

                // 3. Mix.
                let output = mix * (dry + wet) + (1.0 - mix) * dry;
                *sample = output;

                // 4. Write back with feedback; `write` zeroes NaN/Inf.
                self.write(output * feedback + dry * (1.0 - feedback));
            }
        } else {
            // Bypassed: the block passes through untouched, but the ring
            // keeps recording dry input and the read head keeps tracking,
            // so re-enabling resumes without a gap.
            for &dry in block.iter() {
                self.read_head.advance(self.write_head, delay_samples);
                self.write(dry);
            }
        }
    }

    /// Store one sample at the write head and step it forward.
    #[inline]
    fn write(&mut self, sample: f32) {
        // A NaN or infinity in the ring would circulate through the
        // feedback path forever.
        let sample = if sample.is_finite() { sample } else { 0.0 };

        self.buffer.set(self.write_head, sample);
        self.write_head = (self.write_head + 1) % self.buffer.capacity();
    }

    // ─── Parameter setters (any thread, via the mailbox) ───

    pub fn set_mix(&self, mix: f32) {
        self.pending.set_mix(mix);
    }

    /// Request a new delay time. The read head glides toward it.
    pub fn set_delay_time_seconds(&self, seconds: f32) {
        self.pending.set_delay_time_seconds(seconds);
    }

    pub fn set_feedback(&self, feedback: f32) {
        self.pending.set_feedback(feedback);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.pending.set_enabled(enabled);
    }

    /// Jump straight to a new delay time without gliding.
    ///
    /// This moves the read head itself, so it needs the same exclusive
    /// access as [`process()`](Self::process) and can only be called by
    /// whoever owns the engine on the audio thread. Handles from
    /// [`handle()`](Self::handle) cannot reach it. Mostly useful for
    /// setting the initial delay time.
    pub fn set_delay_time_seconds_instant(&mut self, seconds: f32) {
        self.pending.set_delay_time_seconds(seconds);

        self.active.delay_time_seconds = seconds;
        self.active.delay_samples =
            delay_samples_for(seconds, self.sample_rate, self.buffer.capacity());
        self.read_head.lock_to(self.write_head, self.active.delay_samples);
    }

    // ─── Read-head tuning (owner only) ───

    pub fn set_time_constant(&mut self, seconds: f64) {
        self.read_head.set_time_constant(seconds);
    }

    pub fn set_min_read_head_speed(&mut self, speed: f64) {
        self.read_head.set_min_speed(speed);
    }

    pub fn set_max_read_head_speed(&mut self, speed: f64) {
        self.read_head.set_max_speed(speed);
    }

    pub fn tuning(&self) -> ReadHeadTuning {
        self.read_head.tuning()
    }

    // ─── Getters ───

    /// A thread-safe handle for setting parameters from elsewhere.
    pub fn handle(&self) -> DelayHandle {
        DelayHandle::new(Arc::clone(&self.pending))
    }

    /// The most recently requested delay time.
    pub fn delay_time_seconds(&self) -> f32 {
        self.pending.delay_time_seconds()
    }

    pub fn feedback(&self) -> f32 {
        self.pending.feedback()
    }

    pub fn mix(&self) -> f32 {
        self.pending.mix()
    }

    pub fn is_enabled(&self) -> bool {
        self.pending.is_enabled()
    }

    /// The parameter set used by the most recent block.
    pub fn active_parameters(&self) -> DelayParameters {
        self.active
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn read_position(&self) -> f64 {
        self.read_head.position()
    }

    pub fn target_distance(&self) -> f64 {
        self.read_head.target_distance()
    }

    pub fn write_position(&self) -> usize {
        self.write_head
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// A repeating ramp: every sample differs from its neighbors, so an
    /// off-by-one in the delay shows up immediately.
    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i % 37) as f32 * 0.01 + 0.05).collect()
    }

    /// Run `input` through `engine` in blocks of `block_size`.
    fn run(engine: &mut ChannelDelayEngine, input: &[f32], block_size: usize) -> Vec<f32> {
        let mut output = input.to_vec();
        for block in output.chunks_mut(block_size) {
            engine.process(block);
        }
        output
    }

    fn prepared(sample_rate: f32, max_delay_seconds: f32) -> ChannelDelayEngine {
        let mut engine = ChannelDelayEngine::new();
        engine.prepare(sample_rate, max_delay_seconds);
        engine
    }

    /// With mix and feedback at zero the engine is transparent.
    #[test]
    fn test_pass_through_identity() {
        let mut engine = prepared(48000.0, 1.0);
        engine.set_mix(0.0);
        engine.set_feedback(0.0);
        engine.set_delay_time_seconds(0.01);

        let input = ramp(10_000);
        let output = run(&mut engine, &input, 256);

        for (n, (x, y)) in input.iter().zip(&output).enumerate() {
            assert!((x - y).abs() < 1e-9, "Sample {n}: expected {x}, got {y}");
        }
    }

    /// Under a constant delay time the wet component of the output is the
    /// input from exactly `delay_samples` ago.
    #[test]
    fn test_pure_delay_after_instant_set() {
        let mut engine = prepared(1000.0, 1.0);
        engine.set_mix(1.0);
        engine.set_feedback(0.0);
        engine.set_delay_time_seconds_instant(0.1);
        assert_eq!(engine.active_parameters().delay_samples, 100);

        let input = ramp(3000);
        let output = run(&mut engine, &input, 64);

        for n in 0..input.len() {
            let wet = output[n] - input[n];
            let expected = if n >= 100 { input[n - 100] } else { 0.0 };
            assert!(
                (wet - expected).abs() < 1e-5,
                "Sample {n}: expected wet {expected}, got {wet}"
            );
        }
    }

    /// A delay time set before prepare() is locked in from the first sample.
    #[test]
    fn test_delay_set_before_prepare_is_locked() {
        let mut engine = ChannelDelayEngine::new();
        engine.set_mix(1.0);
        engine.set_delay_time_seconds(0.05);
        engine.prepare(1000.0, 1.0);

        let mut impulse = vec![0.0; 200];
        impulse[0] = 1.0;
        let output = run(&mut engine, &impulse, 32);

        assert!((output[50] - 1.0).abs() < 1e-6, "Echo expected at 50");
        for (n, y) in output.iter().enumerate() {
            if n != 0 && n != 50 {
                assert!(y.abs() < 1e-6, "Unexpected output {y} at {n}");
            }
        }
    }

    /// Feedback produces repeats that decay by the feedback factor.
    #[test]
    fn test_feedback_repeats() {
        let mut engine = prepared(1000.0, 1.0);
        engine.set_mix(1.0);
        engine.set_feedback(0.5);
        engine.set_delay_time_seconds_instant(0.1);

        let mut impulse = vec![0.0; 400];
        impulse[0] = 1.0;
        let output = run(&mut engine, &impulse, 50);

        // The impulse itself is written as y*fb + x*(1-fb) = 1.0. Each later
        // pass writes back y * 0.5.
        assert!((output[100] - 1.0).abs() < 1e-6);
        assert!((output[200] - 0.5).abs() < 1e-6);
        assert!((output[300] - 0.25).abs() < 1e-6);
    }

    /// Changing the delay time glides the read head: it never moves by
    /// more than the maximum speed in a single sample, and it ends up
    /// locked on the new delay.
    #[test]
    fn test_delay_change_glides_without_jumps() {
        let sample_rate = 1000.0;
        let mut engine = prepared(sample_rate, 2.0);
        engine.set_mix(1.0);
        engine.set_delay_time_seconds_instant(0.5);

        engine.set_delay_time_seconds(0.2);
        let capacity = engine.capacity() as f64;
        let tuning = engine.tuning();

        let mut sample = [0.1_f32];
        let mut before = engine.read_position();
        let mut locked_at = None;
        for n in 0..20_000 {
            engine.process(&mut sample);
            let moved = (engine.read_position() - before).rem_euclid(capacity);
            before = engine.read_position();

            assert!(moved <= tuning.max_speed + 1e-9, "Jump of {moved} at {n}");
            assert!(moved >= tuning.min_speed - 1e-9, "Stall of {moved} at {n}");

            if locked_at.is_none() && engine.target_distance().abs() <= 0.5 {
                locked_at = Some(n);
            }
        }

        assert!(locked_at.is_some(), "Read head never locked");
        assert!(engine.target_distance().abs() <= 0.5);
    }

    /// Once a glide has settled, shorter or longer, the output is a pure
    /// delay of exactly the new `delay_samples` again.
    #[test]
    fn test_pure_delay_after_glide() {
        for (from, to, to_samples) in [(0.5, 0.2, 200), (0.2, 0.5, 500)] {
            let mut engine = prepared(1000.0, 1.0);
            engine.set_mix(1.0);
            engine.set_feedback(0.0);
            engine.set_delay_time_seconds_instant(from);
            engine.set_delay_time_seconds(to);

            let input = ramp(10_000);
            let output = run(&mut engine, &input, 64);
            assert_eq!(engine.active_parameters().delay_samples, to_samples);
            assert!(engine.target_distance().abs() <= 0.5, "Glide {from} -> {to} never locked");

            for n in 8000..input.len() {
                let wet = output[n] - input[n];
                let expected = input[n - to_samples];
                assert!(
                    (wet - expected).abs() < 1e-5,
                    "Glide {from} -> {to}, sample {n}: expected wet {expected}, got {wet}"
                );
            }
        }
    }

    /// A NaN or infinity in the input never gets stored, so the output
    /// is finite again from the very next sample.
    #[test]
    fn test_non_finite_input_is_contained() {
        for poison in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let mut engine = prepared(1000.0, 0.5);
            engine.set_mix(0.7);
            engine.set_feedback(0.9);
            engine.set_delay_time_seconds_instant(0.05);

            let mut input = vec![0.3; 2000];
            input[10] = poison;
            let output = run(&mut engine, &input, 128);

            for (n, y) in output.iter().enumerate().skip(11) {
                assert!(y.is_finite(), "Non-finite output {y} at {n} after {poison}");
            }
        }
    }

    /// Feedback above 1 grows each repeat until the written value
    /// overflows; that slot is zeroed and the build-up starts over.
    #[test]
    fn test_runaway_feedback_stays_finite_in_ring() {
        let mut engine = prepared(1000.0, 0.1);
        engine.set_mix(1.0);
        engine.set_feedback(3.0);
        engine.set_delay_time_seconds_instant(0.01);

        let input = vec![1.0_f32; 3000];
        let output = run(&mut engine, &input, 100);

        for (n, y) in output.iter().enumerate() {
            assert!(y.is_finite(), "Non-finite output {y} at {n}");
        }

        // Somewhere past the first cycle the echo collapsed back to dry.
        assert!(
            output.iter().skip(100).any(|y| *y < 2.0),
            "Overflowed repeats were never zeroed"
        );
    }

    /// Disabled processing is dry, but keeps filling the ring, so
    /// re-enabling sounds the same as never having disabled.
    #[test]
    fn test_disable_enable_continuity() {
        let make = || {
            let mut engine = prepared(1000.0, 1.0);
            engine.set_mix(0.5);
            engine.set_feedback(0.0);
            engine.set_delay_time_seconds_instant(0.1);
            engine
        };
        let mut reference = make();
        let mut toggled = make();

        let input = vec![0.4_f32; 1000];
        toggled.set_enabled(false);
        let bypassed = run(&mut toggled, &input[..500], 100);
        let _ = run(&mut reference, &input[..500], 100);

        for (x, y) in input.iter().zip(&bypassed) {
            assert!((x - y).abs() < 1e-9, "Bypass must be dry");
        }

        toggled.set_enabled(true);
        let resumed = run(&mut toggled, &input[500..], 100);
        let expected = run(&mut reference, &input[500..], 100);

        for (n, (a, b)) in resumed.iter().zip(&expected).enumerate() {
            assert!((a - b).abs() < 1e-6, "Sample {n}: {a} vs {b}");
        }
        assert!((resumed[0] - 0.6).abs() < 1e-6, "Expected dry + half wet");
    }

    /// A non-finite sample arriving while bypassed is not stored either.
    #[test]
    fn test_bypass_write_is_sanitized() {
        let mut engine = prepared(1000.0, 1.0);
        engine.set_delay_time_seconds_instant(0.01);
        engine.set_enabled(false);

        let mut poisoned = [f32::NAN];
        engine.process(&mut poisoned);
        engine.set_enabled(true);
        engine.set_mix(1.0);

        let output = run(&mut engine, &vec![0.0; 50], 50);
        assert!(output.iter().all(|y| y.is_finite()));
    }

    /// Parameters set mid-stream take effect at the next block boundary,
    /// not partway through a block.
    #[test]
    fn test_parameters_snapshot_per_block() {
        let mut engine = prepared(1000.0, 1.0);
        engine.set_mix(0.0);

        let mut block = [0.5_f32; 64];
        engine.process(&mut block);
        assert!((engine.active_parameters().mix - 0.0).abs() < 1e-9);

        let handle = engine.handle();
        std::thread::spawn(move || handle.set_mix(0.8))
            .join()
            .expect("setter thread panicked");

        // Pending changed, active did not.
        assert!((engine.mix() - 0.8).abs() < 1e-9);
        assert!((engine.active_parameters().mix - 0.0).abs() < 1e-9);

        engine.process(&mut block);
        assert!((engine.active_parameters().mix - 0.8).abs() < 1e-9);
    }

    /// Getters report the requested values.
    #[test]
    fn test_getters() {
        let engine = prepared(48000.0, 1.0);
        engine.set_delay_time_seconds(0.25);
        engine.set_feedback(0.3);

        assert!((engine.delay_time_seconds() - 0.25).abs() < 1e-9);
        assert!((engine.feedback() - 0.3).abs() < 1e-9);
        assert_eq!(engine.capacity(), 48_000);
    }

    /// An unprepared engine, or one prepared at 0 Hz, leaves audio alone.
    #[test]
    fn test_not_ready_leaves_block_untouched() {
        let input = ramp(100);

        let mut unprepared = ChannelDelayEngine::new();
        unprepared.set_mix(1.0);
        assert_eq!(run(&mut unprepared, &input, 32), input);

        let mut zero_rate = prepared(0.0, 1.0);
        zero_rate.set_mix(1.0);
        assert!(!zero_rate.is_ready());
        assert_eq!(run(&mut zero_rate, &input, 32), input);
    }

    /// reset() silences the ring but keeps the delay locked.
    #[test]
    fn test_reset_clears_echoes() {
        let mut engine = prepared(1000.0, 1.0);
        engine.set_mix(1.0);
        engine.set_feedback(0.5);
        engine.set_delay_time_seconds_instant(0.1);

        let _ = run(&mut engine, &vec![1.0; 300], 100);
        engine.reset();

        let output = run(&mut engine, &vec![0.0; 300], 100);
        assert!(output.iter().all(|y| y.abs() < 1e-9), "Echoes survived reset");
        assert!(engine.target_distance().abs() <= 0.5);
    }

    /// Oversized delay requests are clamped to the ring instead of
    /// wrapping around it.
    #[test]
    fn test_delay_longer_than_ring_is_clamped() {
        let mut engine = prepared(1000.0, 1.0);
        engine.set_delay_time_seconds_instant(30.0);

        assert_eq!(engine.active_parameters().delay_samples, 999);
    }
}
