// Envelope generator.

use crate::config::EnvelopeConfig;

// ═══════════════════════════════════════════════════════════════════
// Linear AHDSR Envelope
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
}

/// Linear attack / hold / decay / sustain / release envelope.
///
/// `note_on` always restarts the attack from zero, including on retrigger.
#[derive(Debug, Clone)]
pub struct Envelope {
    config: EnvelopeConfig,
    stage: EnvelopeStage,
    level: f32,
    hold_remaining: u32,
    release_rate: f32,
    sample_rate: f32,
}

impl Envelope {
    pub fn new(config: EnvelopeConfig) -> Self {
        Self {
            config,
            stage: EnvelopeStage::Idle,
            level: 0.0,
            hold_remaining: 0,
            release_rate: 0.0,
            sample_rate: 44_100.0,
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate as f32;
    }

    pub fn set_config(&mut self, config: EnvelopeConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    #[inline]
    fn samples(&self, ms: f32) -> f32 {
        (ms.max(0.0) * 0.001 * self.sample_rate).max(1.0)
    }

    pub fn note_on(&mut self) {
        self.level = 0.0;
        self.stage = EnvelopeStage::Attack;
    }

    pub fn note_off(&mut self) {
        if matches!(self.stage, EnvelopeStage::Idle | EnvelopeStage::Release) {
            return;
        }
        self.release_rate = self.level / self.samples(self.config.release_ms);
        self.stage = EnvelopeStage::Release;
    }

    /// Drop straight to silence.
    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
        self.hold_remaining = 0;
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn is_idle(&self) -> bool {
        self.stage == EnvelopeStage::Idle
    }

    pub fn is_releasing(&self) -> bool {
        self.stage == EnvelopeStage::Release
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => 0.0,

            EnvelopeStage::Attack => {
                self.level += 1.0 / self.samples(self.config.attack_ms);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.hold_remaining = (self.config.hold_ms.max(0.0) * 0.001 * self.sample_rate) as u32;
                    self.stage = if self.hold_remaining > 0 {
                        EnvelopeStage::Hold
                    } else {
                        EnvelopeStage::Decay
                    };
                }
                self.level
            }

            EnvelopeStage::Hold => {
                self.hold_remaining = self.hold_remaining.saturating_sub(1);
                if self.hold_remaining == 0 {
                    self.stage = EnvelopeStage::Decay;
                }
                self.level
            }

            EnvelopeStage::Decay => {
                let sustain = self.config.sustain.clamp(0.0, 1.0);
                self.level -= (1.0 - sustain) / self.samples(self.config.decay_ms);
                if self.level <= sustain {
                    self.level = sustain;
                    self.stage = EnvelopeStage::Sustain;
                }
                self.level
            }

            EnvelopeStage::Sustain => self.level,

            EnvelopeStage::Release => {
                self.level -= self.release_rate;
                if self.level <= 0.0 || self.release_rate <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
                self.level
            }
        }
    }
}
