//! # Plugin Parameters
//!
//! The knobs the host shows for the smooth delay. Each parameter has a
//! stable string ID (`#[id = "..."]`) used for presets and automation;
//! never change a published ID.
//!
//! ## No host-side smoothing
//!
//! Unlike most parameters, these are read with `.value()` once per block
//! and handed to the delay as-is. Delay time needs no smoother: the read
//! head already glides toward a new delay time at a bounded speed, and a
//! linear ramp on top of that would only blur the tape-like pitch bend.

use nih_plug::prelude::*;

/// Longest delay time the knob offers, in milliseconds.
pub const MAX_DELAY_TIME_MS: f32 = 10_000.0;

/// Largest per-channel offset the knob offers, in milliseconds.
pub const MAX_STEREO_OFFSET_MS: f32 = 250.0;

#[derive(Params)]
pub struct PluginParams {
    /// **Delay Time**: base delay, before any stereo offset.
    ///
    /// Skewed so the short end (slapback territory) gets most of the
    /// knob travel.
    #[id = "delay"]
    pub delay_time: FloatParam,

    /// **Feedback**: share of the processed output written back into the
    /// delay, producing repeating echoes.
    #[id = "fdbk"]
    pub feedback: FloatParam,

    /// **Mix**: how much of the delayed signal is added to the dry one.
    #[id = "mix"]
    pub mix: FloatParam,

    /// **Stereo Offset**: extra delay added per channel. Channel 0 uses
    /// the base delay, channel 1 the base delay plus this offset.
    #[id = "stoff"]
    pub stereo_offset: FloatParam,

    /// **Enabled**: when off, audio passes dry but the delay keeps
    /// recording so it resumes in time.
    #[id = "enable"]
    pub enabled: BoolParam,
}

impl Default for PluginParams {
    fn default() -> Self {
        Self {
            delay_time: FloatParam::new(
                "Delay Time",
                500.0,
                FloatRange::Skewed {
                    min: 1.0,
                    max: MAX_DELAY_TIME_MS,
                    factor: FloatRange::skew_factor(-2.0),
                },
            )
            .with_unit(" ms")
            .with_step_size(0.1),

            feedback: FloatParam::new("Feedback", 0.0, FloatRange::Linear { min: 0.0, max: 1.0 })
                .with_unit("%")
                .with_value_to_string(formatters::v2s_f32_percentage(1))
                .with_string_to_value(formatters::s2v_f32_percentage()),

            mix: FloatParam::new("Mix", 0.5, FloatRange::Linear { min: 0.0, max: 1.0 })
                .with_unit("%")
                .with_value_to_string(formatters::v2s_f32_percentage(1))
                .with_string_to_value(formatters::s2v_f32_percentage()),

            stereo_offset: FloatParam::new(
                "Stereo Offset",
                0.0,
                FloatRange::Linear {
                    min: 0.0,
                    max: MAX_STEREO_OFFSET_MS,
                },
            )
            .with_unit(" ms")
            .with_step_size(0.1),

            enabled: BoolParam::new("Enabled", true),
        }
    }
}
