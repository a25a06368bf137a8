//! # Multi-Channel Delay
//!
//! Owns one [`ChannelDelayEngine`] per audio channel and fans parameters
//! out to all of them. Every channel gets the same mix, feedback and
//! enable state; the delay time is offset per channel:
//!
//! ```text
//! channel_delay = delay_time + channel_index * stereo_offset
//! ```
//!
//! With two channels and a small offset the right side echoes slightly
//! later than the left, which widens the stereo image.
//!
//! Engines are only (re)allocated in [`prepare()`](MultiChannelDelay::prepare)
//! or when a block arrives with a different channel count. In the latter
//! case the whole set is rebuilt with silent rings and the last known
//! parameters.

use std::sync::Arc;

use nih_plug::prelude::*;

use super::channel_delay::ChannelDelayEngine;
use super::mailbox::{MultiChannelHandle, ParameterMailbox};
use super::read_head::ReadHeadTuning;
use super::DEFAULT_MAX_DELAY_SECONDS;

/// A bank of smooth delays, one per channel.
#[derive(Debug)]
pub struct MultiChannelDelay {
    engines: Vec<ChannelDelayEngine>,

    /// Last known parameters, including the stereo offset. Survives
    /// reallocation and is broadcast to the engines at every block.
    pending: Arc<ParameterMailbox>,

    tuning: ReadHeadTuning,
    sample_rate: f32,
    max_delay_seconds: f32,
}

impl Default for MultiChannelDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiChannelDelay {
    pub fn new() -> Self {
        Self {
            engines: Vec::new(),
            pending: Arc::new(ParameterMailbox::default()),
            tuning: ReadHeadTuning::default(),
            sample_rate: 0.0,
            max_delay_seconds: DEFAULT_MAX_DELAY_SECONDS,
        }
    }

    /// Allocate `num_channels` silent engines sized for `max_delay_seconds`.
    pub fn prepare(&mut self, sample_rate: f32, max_delay_seconds: f32, num_channels: usize) {
        self.sample_rate = sample_rate;
        self.max_delay_seconds = max_delay_seconds;
        self.reallocate(num_channels);
    }

    /// Silence every ring, keeping parameters and channel count.
    pub fn reset(&mut self) {
        for engine in &mut self.engines {
            engine.reset();
        }
    }

    /// Process one block in place, one slice per channel.
    ///
    /// A block whose channel count differs from the current engine set
    /// triggers a rebuild first. That allocates, and the rebuilt channels
    /// start from silence.
    pub fn process(&mut self, block: &mut [&mut [f32]]) {
        if block.len() != self.engines.len() {
            let num_channels = block.len();
            util::permit_alloc(|| {
                nih_warn!(
                    "Channel count changed from {} to {num_channels}, reallocating delay lines",
                    self.engines.len()
                );
                self.reallocate(num_channels);
            });
        }

        self.broadcast();

        for (engine, channel) in self.engines.iter_mut().zip(block.iter_mut()) {
            engine.process(channel);
        }
    }

    fn reallocate(&mut self, num_channels: usize) {
        self.engines = (0..num_channels)
            .map(|_| ChannelDelayEngine::with_tuning(self.tuning))
            .collect();

        // Parameters first, so prepare() locks each read head onto its
        // own offset delay time.
        self.broadcast();
        for engine in &mut self.engines {
            engine.prepare(self.sample_rate, self.max_delay_seconds);
        }
    }

    /// Push the last known parameters into every engine's mailbox.
    fn broadcast(&self) {
        let mix = self.pending.mix();
        let feedback = self.pending.feedback();
        let enabled = self.pending.is_enabled();

        for (channel, engine) in self.engines.iter().enumerate() {
            engine.set_mix(mix);
            engine.set_feedback(feedback);
            engine.set_enabled(enabled);
            engine.set_delay_time_seconds(self.channel_delay_time(channel));
        }
    }

    fn channel_delay_time(&self, channel: usize) -> f32 {
        self.pending.delay_time_seconds() + channel as f32 * self.pending.stereo_offset_seconds()
    }

    // ─── Parameter setters ───

    pub fn set_mix(&self, mix: f32) {
        self.pending.set_mix(mix);
        self.broadcast();
    }

    /// Set the base delay time; each channel adds its own offset.
    pub fn set_delay_time_seconds(&self, seconds: f32) {
        self.pending.set_delay_time_seconds(seconds);
        self.broadcast();
    }

    pub fn set_feedback(&self, feedback: f32) {
        self.pending.set_feedback(feedback);
        self.broadcast();
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.pending.set_enabled(enabled);
        self.broadcast();
    }

    /// Set the extra delay added per channel index.
    pub fn set_stereo_offset_seconds(&self, seconds: f32) {
        self.pending.set_stereo_offset_seconds(seconds);
        self.broadcast();
    }

    /// Jump every channel to the new delay time without gliding.
    ///
    /// Needs exclusive access, i.e. must be called from the thread that
    /// calls [`process()`](Self::process).
    pub fn set_delay_time_seconds_instant(&mut self, seconds: f32) {
        self.pending.set_delay_time_seconds(seconds);
        for channel in 0..self.engines.len() {
            let channel_seconds = self.channel_delay_time(channel);
            self.engines[channel].set_delay_time_seconds_instant(channel_seconds);
        }
    }

    pub fn set_time_constant(&mut self, seconds: f64) {
        self.tuning.time_constant_seconds = seconds;
        for engine in &mut self.engines {
            engine.set_time_constant(seconds);
        }
    }

    pub fn set_min_read_head_speed(&mut self, speed: f64) {
        self.tuning.min_speed = speed;
        for engine in &mut self.engines {
            engine.set_min_read_head_speed(speed);
        }
    }

    pub fn set_max_read_head_speed(&mut self, speed: f64) {
        self.tuning.max_speed = speed;
        for engine in &mut self.engines {
            engine.set_max_read_head_speed(speed);
        }
    }

    // ─── Getters ───

    /// A thread-safe handle; changes reach the engines at the next block.
    pub fn handle(&self) -> MultiChannelHandle {
        MultiChannelHandle::new(Arc::clone(&self.pending))
    }

    /// The base delay time, without any per-channel offset.
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

    pub fn stereo_offset_seconds(&self) -> f32 {
        self.pending.stereo_offset_seconds()
    }

    pub fn tuning(&self) -> ReadHeadTuning {
        self.tuning
    }

    pub fn num_channels(&self) -> usize {
        self.engines.len()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn engine(&self, channel: usize) -> Option<&ChannelDelayEngine> {
        self.engines.get(channel)
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
