// src/config.rs
//
// Configuration structs. Defaults carry the instrument's tuned constants.

/// Engine-wide settings fixed before the audio callback starts.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Frames per audio callback
    pub block_size: usize,
    /// Slots in the control -> audio command queue
    pub command_capacity: usize,
    /// Longest delay line any stage may allocate
    pub max_delay_ms: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            block_size: 128,
            command_capacity: 256,
            max_delay_ms: 1000.0,
        }
    }
}

/// Linear attack / hold / decay / sustain / release envelope, times in ms.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvelopeConfig {
    pub attack_ms: f32,
    pub hold_ms: f32,
    pub decay_ms: f32,
    /// Sustain level, 0..1
    pub sustain: f32,
    pub release_ms: f32,
}

impl EnvelopeConfig {
    /// Short, bright envelope for the triangle keyboard.
    pub const SOFT: Self = Self {
        attack_ms: 9.2,
        hold_ms: 2.1,
        decay_ms: 31.4,
        sustain: 0.6,
        release_ms: 84.5,
    };

    /// Pad-like envelope of the detuned saw voice.
    pub const PAD: Self = Self {
        attack_ms: 10.0,
        hold_ms: 2.0,
        decay_ms: 35.0,
        sustain: 0.8,
        release_ms: 300.0,
    };

    /// Percussive envelope of the cheap pluck.
    pub const PLUCK: Self = Self {
        attack_ms: 0.0,
        hold_ms: 0.0,
        decay_ms: 100.0,
        sustain: 0.3,
        release_ms: 200.0,
    };
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self::PAD
    }
}

/// Stereo delay with feedback tap and cross-feed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DelayConfig {
    pub left_ms: f32,
    pub right_ms: f32,
    /// Gain of each channel's own delayed signal
    pub tap_gain: f32,
    /// Gain of the opposite channel's delayed signal
    pub cross_gain: f32,
    pub dry_gain: f32,
    pub active: bool,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            left_ms: 220.0,
            right_ms: 660.0,
            tap_gain: 0.4,
            cross_gain: 0.2,
            dry_gain: 1.0,
            active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrusherConfig {
    pub bits: f32,
    /// Effective sample rate in Hz; clamped to the engine rate
    pub sample_rate: f32,
}

impl Default for CrusherConfig {
    fn default() -> Self {
        Self {
            bits: 16.0,
            sample_rate: 44_100.0,
        }
    }
}

/// Feed-forward limiter shape.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DynamicsConfig {
    pub threshold_db: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub ratio: f32,
    pub makeup_db: f32,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            threshold_db: -12.0,
            attack_ms: 10.0,
            release_ms: 60.0,
            ratio: 4.0,
            makeup_db: 0.0,
        }
    }
}

/// Resonant feedback echo: two symmetric channel loops with cross-wired taps.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EchoConfig {
    pub delay_ms: f32,
    /// Input gain into the loop
    pub drive: f32,
    pub feedback: f32,
    pub cross_feedback: f32,
    pub cutoff_hz: f32,
    pub resonance: f32,
    /// Wet amount, 0 = dry only
    pub mix: f32,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            delay_ms: 250.0,
            drive: 0.8,
            feedback: 0.45,
            cross_feedback: 0.15,
            cutoff_hz: 3000.0,
            resonance: 0.3,
            mix: 0.35,
        }
    }
}

/// LFO-modulated short delay. Short base delays with feedback flange.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChorusConfig {
    pub base_ms: f32,
    pub depth_ms: f32,
    pub rate_hz: f32,
    pub feedback: f32,
    pub mix: f32,
}

impl ChorusConfig {
    pub const FLANGE: Self = Self {
        base_ms: 1.0,
        depth_ms: 2.0,
        rate_hz: 0.25,
        feedback: 0.6,
        mix: 0.5,
    };
}

impl Default for ChorusConfig {
    fn default() -> Self {
        Self {
            base_ms: 5.0,
            depth_ms: 8.0,
            rate_hz: 0.8,
            feedback: 0.0,
            mix: 0.5,
        }
    }
}
