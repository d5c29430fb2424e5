// Oscillator + envelope voices.

use std::f32::consts::TAU;

use super::envelope::Envelope;
use super::filters::Svf;
use super::oscillators::{Oscillator, Waveform};
use crate::config::EnvelopeConfig;
use crate::voice::{Voice, VoiceState};

/// Low-pass whose cutoff follows the note frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyTracking {
    /// Cutoff as a multiple of the note frequency
    pub multiple: f32,
    pub q: f32,
}

/// Slow pitch wobble whose rate rises with pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vibrato {
    pub rate_hz: f32,
    /// Extra rate per 440 Hz of note frequency
    pub rate_tracking: f32,
    /// Frequency deviation as a ratio
    pub depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TonalConfig {
    pub waveform: Waveform,
    pub amplitude: f32,
    pub envelope: EnvelopeConfig,
    pub filter: Option<KeyTracking>,
    pub vibrato: Option<Vibrato>,
}

impl TonalConfig {
    pub fn soft_triangle() -> Self {
        Self {
            waveform: Waveform::Triangle,
            amplitude: 0.5,
            envelope: EnvelopeConfig::SOFT,
            filter: None,
            vibrato: None,
        }
    }

    pub fn cheap_pluck() -> Self {
        Self {
            waveform: Waveform::Saw,
            amplitude: 0.5,
            envelope: EnvelopeConfig::PLUCK,
            filter: Some(KeyTracking { multiple: 2.0, q: 0.7 }),
            vibrato: Some(Vibrato {
                rate_hz: 6.0,
                rate_tracking: 2.0,
                depth: 0.02,
            }),
        }
    }
}

impl Default for TonalConfig {
    fn default() -> Self {
        Self::soft_triangle()
    }
}

// ═══════════════════════════════════════════════════════════════════
// Tonal voice: one oscillator, optional filter, envelope
// ═══════════════════════════════════════════════════════════════════

pub struct TonalVoice {
    config: TonalConfig,
    osc: Oscillator,
    env: Envelope,
    filter: Option<Svf>,
    lfo_phase: f32,
    lfo_inc: f32,
    freq: f32,
    enabled: bool,
    sample_rate: f32,
}

impl TonalVoice {
    pub fn new(config: TonalConfig) -> Self {
        let filter = config.filter.map(|kt| {
            let mut svf = Svf::lowpass();
            svf.set_q(kt.q);
            svf
        });
        Self {
            osc: Oscillator::new(config.waveform, config.amplitude),
            env: Envelope::new(config.envelope),
            filter,
            lfo_phase: 0.0,
            lfo_inc: 0.0,
            freq: 440.0,
            enabled: true,
            sample_rate: 44_100.0,
            config,
        }
    }

    pub fn config(&self) -> &TonalConfig {
        &self.config
    }

    pub fn envelope(&self) -> &Envelope {
        &self.env
    }

    /// Takes effect immediately and survives `begin`.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.config.waveform = waveform;
        self.osc.set_waveform(waveform);
    }

    fn apply_frequency(&mut self) {
        self.osc.set_frequency(self.freq);
        if let (Some(svf), Some(kt)) = (self.filter.as_mut(), self.config.filter) {
            svf.set_cutoff(self.freq * kt.multiple);
        }
        if let Some(vib) = self.config.vibrato {
            let rate = vib.rate_hz + (self.freq / 440.0) * vib.rate_tracking;
            self.lfo_inc = rate / self.sample_rate;
        }
    }
}

impl Voice for TonalVoice {
    fn prepare(&mut self, sample_rate: f64, _max_block: usize) {
        self.sample_rate = sample_rate as f32;
        self.osc.prepare(sample_rate);
        self.env.prepare(sample_rate);
        if let Some(svf) = self.filter.as_mut() {
            svf.prepare(sample_rate);
        }
        self.apply_frequency();
    }

    fn begin(&mut self) {
        self.osc.set_waveform(self.config.waveform);
        self.osc.set_amplitude(self.config.amplitude);
        self.osc.reset_phase();
        self.env.set_config(self.config.envelope);
        self.env.reset();
        if let Some(svf) = self.filter.as_mut() {
            svf.reset();
        }
        self.lfo_phase = 0.0;
        self.apply_frequency();
    }

    fn note_on(&mut self) {
        if !self.enabled {
            return;
        }
        self.apply_frequency();
        self.env.note_on();
    }

    fn note_off(&mut self) {
        self.env.note_off();
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.env.reset();
        if let Some(svf) = self.filter.as_mut() {
            svf.reset();
        }
    }

    fn set_frequency(&mut self, freq: f32) {
        self.freq = freq.max(0.0);
        self.apply_frequency();
    }

    fn frequency(&self) -> f32 {
        self.freq
    }

    fn state(&self) -> VoiceState {
        if self.env.is_idle() {
            VoiceState::Idle
        } else if self.env.is_releasing() {
            VoiceState::Releasing
        } else {
            VoiceState::Sounding
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn render(&mut self, out: &mut [f32]) -> bool {
        if !self.enabled || self.env.is_idle() {
            out.fill(0.0);
            return true;
        }

        let vibrato_depth = self.config.vibrato.map_or(0.0, |v| v.depth);

        for sample in out.iter_mut() {
            if vibrato_depth > 0.0 {
                let wobble = (self.lfo_phase * TAU).sin() * vibrato_depth;
                self.osc.set_frequency(self.freq * (1.0 + wobble));
                self.lfo_phase = (self.lfo_phase + self.lfo_inc).fract();
            }

            let mut x = self.osc.next_sample();
            if let Some(svf) = self.filter.as_mut() {
                x = svf.process_sample(x);
            }
            *sample = x * self.env.next_sample();
        }

        false
    }
}

// ═══════════════════════════════════════════════════════════════════
// Detuned voice: two saws, the second sharpened by a fixed ratio
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetunedConfig {
    /// Second oscillator runs at `freq * (1 + detune)`
    pub detune: f32,
    /// Mixer gain per oscillator
    pub mix: f32,
    pub amplitude: f32,
    pub envelope: EnvelopeConfig,
}

impl Default for DetunedConfig {
    fn default() -> Self {
        Self {
            detune: 0.1,
            mix: 0.5,
            amplitude: 0.5,
            envelope: EnvelopeConfig::PAD,
        }
    }
}

pub struct DetunedVoice {
    config: DetunedConfig,
    main: Oscillator,
    detuned: Oscillator,
    env: Envelope,
    freq: f32,
    enabled: bool,
}

impl DetunedVoice {
    pub fn new(config: DetunedConfig) -> Self {
        Self {
            main: Oscillator::new(Waveform::Saw, config.amplitude),
            detuned: Oscillator::new(Waveform::Saw, config.amplitude),
            env: Envelope::new(config.envelope),
            freq: 440.0,
            enabled: true,
            config,
        }
    }

    /// Frequency of the sharpened oscillator.
    pub fn detuned_frequency(&self) -> f32 {
        self.detuned.frequency()
    }

    fn apply_frequency(&mut self) {
        self.main.set_frequency(self.freq);
        self.detuned.set_frequency(self.freq * (1.0 + self.config.detune));
    }
}

impl Voice for DetunedVoice {
    fn prepare(&mut self, sample_rate: f64, _max_block: usize) {
        self.main.prepare(sample_rate);
        self.detuned.prepare(sample_rate);
        self.env.prepare(sample_rate);
        self.apply_frequency();
    }

    fn begin(&mut self) {
        self.env.set_config(self.config.envelope);
        self.env.reset();
        self.main.reset_phase();
        self.detuned.reset_phase();
        self.apply_frequency();
    }

    fn note_on(&mut self) {
        if !self.enabled {
            return;
        }
        self.main.set_amplitude(self.config.amplitude);
        self.detuned.set_amplitude(self.config.amplitude);
        self.env.note_on();
    }

    fn note_off(&mut self) {
        self.env.note_off();
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.env.reset();
    }

    fn set_frequency(&mut self, freq: f32) {
        self.freq = freq.max(0.0);
        self.apply_frequency();
    }

    fn frequency(&self) -> f32 {
        self.freq
    }

    fn state(&self) -> VoiceState {
        if self.env.is_idle() {
            VoiceState::Idle
        } else if self.env.is_releasing() {
            VoiceState::Releasing
        } else {
            VoiceState::Sounding
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn render(&mut self, out: &mut [f32]) -> bool {
        if !self.enabled || self.env.is_idle() {
            out.fill(0.0);
            return true;
        }

        let mix = self.config.mix;
        for sample in out.iter_mut() {
            let x = self.main.next_sample() * mix + self.detuned.next_sample() * mix;
            *sample = x * self.env.next_sample();
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared<V: Voice>(mut voice: V) -> V {
        voice.prepare(44_100.0, 256);
        voice.begin();
        voice
    }

    #[test]
    fn tonal_lifecycle() {
        let mut voice = prepared(TonalVoice::new(TonalConfig::soft_triangle()));
        voice.set_frequency(440.0);
        assert_eq!(voice.state(), VoiceState::Idle);

        voice.note_on();
        assert_eq!(voice.state(), VoiceState::Sounding);

        let mut block = [0.0; 256];
        assert!(!voice.render(&mut block));
        assert!(block.iter().all(|s| s.abs() <= 0.5 + 1e-6));

        voice.note_off();
        assert_eq!(voice.state(), VoiceState::Releasing);

        // 84.5 ms release is under 15 blocks of 256 at 44.1 kHz
        for _ in 0..20 {
            voice.render(&mut block);
        }
        assert_eq!(voice.state(), VoiceState::Idle);
        assert!(voice.render(&mut block));
    }

    #[test]
    fn idle_voice_is_silent() {
        let mut voice = prepared(TonalVoice::new(TonalConfig::soft_triangle()));
        let mut block = [1.0; 64];
        assert!(voice.render(&mut block));
        assert!(block.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn key_tracked_filter_follows_pitch() {
        let mut voice = prepared(TonalVoice::new(TonalConfig::cheap_pluck()));
        voice.set_frequency(300.0);
        assert_eq!(voice.filter.as_ref().map(Svf::cutoff), Some(600.0));
    }

    #[test]
    fn detuned_oscillator_is_ten_percent_sharp() {
        let mut voice = prepared(DetunedVoice::new(DetunedConfig::default()));
        voice.set_frequency(200.0);
        assert!((voice.detuned_frequency() - 220.0).abs() < 1e-3);
        assert_eq!(voice.frequency(), 200.0);
    }

    #[test]
    fn detuned_release_takes_its_time() {
        let mut voice = prepared(DetunedVoice::new(DetunedConfig::default()));
        voice.set_frequency(110.0);
        voice.note_on();
        let mut block = [0.0; 256];
        for _ in 0..20 {
            voice.render(&mut block);
        }
        voice.note_off();
        // 300 ms release spans more than 50 blocks
        for _ in 0..10 {
            voice.render(&mut block);
        }
        assert_eq!(voice.state(), VoiceState::Releasing);
    }
}
