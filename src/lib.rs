//! # Smooth Delay: a click-free, variable-time delay
//!
//! A delay effect whose delay time can be changed while audio is playing
//! without clicks. Instead of jumping to the new position, the read head
//! speeds up or slows down (within bounds) until it has caught up, like a
//! tape machine being nudged. Built on
//! [nih-plug](https://github.com/robbert-vdh/nih-plug) for CLAP and VST3.
//!
//! The DSP core in [`dsp`] does not depend on the host and can be driven
//! from plain `f32` slices; this file only wires it to the plugin API.
//!
//! ## Signal Flow (per channel)
//!
//! ```text
//! Input ──┬──────────────────────────── × (1 - mix) ──────────┐
//!         │                                                   │
//!         ├──────────────────────┐                            │
//!         │                      ▼                            │
//!         │   ┌──────────────────────────────────┐            │
//!         │   │ Ring Buffer ◄── write head       │            │
//!         │   │     │                            │            │
//!         │   │     └──► read head (glides to    │            │
//!         │   │          write - delay samples)  │            │
//!         │   └──────────────┬───────────────────┘            │
//!         │                  ▼                                │
//!         └────────────────►(+)── × mix ─────────────────────(+)──► Output
//!                                                              │
//!        ring ◄── Output × feedback + Input × (1 - feedback) ◄─┘
//! ```

pub mod dsp;
mod params;

use std::num::NonZeroU32;
use std::sync::Arc;

use dsp::multi_channel::MultiChannelDelay;
use dsp::{seconds_to_samples, DEFAULT_MAX_DELAY_SECONDS};
use nih_plug::prelude::*;
use params::PluginParams;

pub use dsp::channel_delay::ChannelDelayEngine;
pub use dsp::mailbox::{DelayHandle, DelayParameters, MultiChannelHandle};
pub use dsp::read_head::ReadHeadTuning;

/// The plugin: host parameters plus one smooth delay per channel.
///
/// The host may touch parameters from its UI or automation thread while
/// `process()` runs. We only read them at the top of each block and push
/// them through the delay's setters, so every block sees one consistent
/// parameter set.
struct SmoothDelayPlugin {
    params: Arc<PluginParams>,

    /// Set in `initialize()`. Used for the tail length.
    sample_rate: f32,

    delay: MultiChannelDelay,
}

impl Default for SmoothDelayPlugin {
    fn default() -> Self {
        Self {
            params: Arc::new(PluginParams::default()),
            // Placeholder until the host tells us the real rate.
            sample_rate: 44100.0,
            // No engines yet: prepared in initialize().
            delay: MultiChannelDelay::new(),
        }
    }
}

impl SmoothDelayPlugin {
    /// Copy the host parameter values into the delay's pending set.
    fn push_parameters(&self) {
        self.delay.set_mix(self.params.mix.value());
        self.delay.set_feedback(self.params.feedback.value());
        self.delay.set_enabled(self.params.enabled.value());
        self.delay
            .set_stereo_offset_seconds(self.params.stereo_offset.value() / 1000.0);
        self.delay
            .set_delay_time_seconds(self.params.delay_time.value() / 1000.0);
    }

    /// Delay of the slowest channel, in samples.
    fn longest_delay_samples(&self) -> usize {
        let channels = self.delay.num_channels().max(1);
        let seconds = self.delay.delay_time_seconds()
            + (channels - 1) as f32 * self.delay.stereo_offset_seconds();
        seconds_to_samples(seconds, self.sample_rate)
    }
}

impl Plugin for SmoothDelayPlugin {
    const NAME: &'static str = "Smooth Delay";
    const VENDOR: &'static str = "Loveless Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "steve.loveless@gmail.com";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Stereo first, mono as a fallback.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    // Parameters are snapshotted once per block; splitting blocks at
    // automation points would only add more snapshots.
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Allocate the ring buffers for the host's sample rate and channel
    /// count. This is the only place the delay allocates, apart from a
    /// channel count change mid-stream.
    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        self.sample_rate = buffer_config.sample_rate;
        if self.sample_rate <= 0.0 {
            nih_error!("Refusing to initialize at a sample rate of {}", self.sample_rate);
            return false;
        }

        let num_channels = audio_io_layout
            .main_input_channels
            .map(|c| c.get() as usize)
            .unwrap_or(2);

        // The ring must hold the longest delay on the last channel.
        let max_delay_seconds = DEFAULT_MAX_DELAY_SECONDS.max(
            (params::MAX_DELAY_TIME_MS
                + num_channels.saturating_sub(1) as f32 * params::MAX_STEREO_OFFSET_MS)
                / 1000.0,
        );

        self.push_parameters();
        self.delay
            .prepare(self.sample_rate, max_delay_seconds, num_channels);

        // Start at the saved delay time instead of gliding to it from
        // the default.
        self.delay
            .set_delay_time_seconds_instant(self.params.delay_time.value() / 1000.0);

        nih_log!(
            "Prepared {num_channels} channel(s) at {} Hz with {max_delay_seconds} s of delay memory",
            self.sample_rate
        );

        true
    }

    /// Playback stopped: drop stale echoes but keep the read heads locked.
    fn reset(&mut self) {
        self.delay.reset();
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        self.push_parameters();
        self.delay.process(buffer.as_slice());

        ProcessStatus::Tail(tail_length_samples(
            self.longest_delay_samples(),
            self.delay.feedback(),
        ))
    }
}

/// How long the host should keep calling `process()` after the input goes
/// silent.
///
/// Each repeat is scaled by `feedback`, so after `N` repeats the level is
/// `feedback^N`. Solving for -60 dB (`0.001`) gives `N = -3 / log10(fb)`.
/// Feedback at or above 1 never decays; that tail is capped at `u32::MAX`.
fn tail_length_samples(delay_samples: usize, feedback: f32) -> u32 {
    let delay_samples = delay_samples as f32;

    let samples = if feedback >= 1.0 {
        f32::INFINITY
    } else if feedback > 0.001 {
        let repeats = -3.0 / feedback.log10();
        (repeats + 1.0) * delay_samples
    } else {
        delay_samples
    };

    // Float-to-int casts saturate.
    samples as u32
}

impl ClapPlugin for SmoothDelayPlugin {
    const CLAP_ID: &'static str = "com.loveless-audio.smooth-delay";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("A delay whose time can be changed without clicks");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Mono,
        ClapFeature::Delay,
    ];
}

impl Vst3Plugin for SmoothDelayPlugin {
    // `*b"..."` turns a 16-character ASCII literal into a `[u8; 16]`.
    const VST3_CLASS_ID: [u8; 16] = *b"SmoothDelay_v001";

    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Delay];
}

nih_export_clap!(SmoothDelayPlugin);
nih_export_vst3!(SmoothDelayPlugin);

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
