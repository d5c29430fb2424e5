// Karplus-Strong plucked string.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::voice::{Voice, VoiceState};

/// Lowest pitch the delay line is sized for.
const MIN_FREQ: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StringConfig {
    /// Excitation level on note-on
    pub velocity: f32,
    /// Loop gain while the note is held
    pub sustain_decay: f32,
    /// Loop gain after note-off
    pub release_decay: f32,
    /// Block peak below which the string counts as finished
    pub silence_threshold: f32,
}

impl Default for StringConfig {
    fn default() -> Self {
        Self {
            velocity: 0.7,
            sustain_decay: 0.996,
            release_decay: 0.9,
            silence_threshold: 1.0e-4,
        }
    }
}

/// Noise burst circulating through an averaging delay loop.
pub struct PluckedString {
    config: StringConfig,
    line: Vec<f32>,
    len: usize,
    pos: usize,
    rng: SmallRng,
    seed: u64,
    freq: f32,
    sample_rate: f32,
    state: VoiceState,
    enabled: bool,
}

impl PluckedString {
    pub fn new(config: StringConfig, seed: u64) -> Self {
        let sample_rate = 44_100.0;
        Self {
            config,
            line: vec![0.0; Self::line_capacity(sample_rate)],
            len: 2,
            pos: 0,
            rng: SmallRng::seed_from_u64(seed),
            seed,
            freq: 440.0,
            sample_rate,
            state: VoiceState::Idle,
            enabled: true,
        }
    }

    fn line_capacity(sample_rate: f32) -> usize {
        (sample_rate / MIN_FREQ).ceil() as usize + 2
    }

    /// Delay-line length for the current pitch.
    pub fn period(&self) -> usize {
        if self.freq <= 0.0 {
            return self.line.len();
        }
        ((self.sample_rate / self.freq).round() as usize).clamp(2, self.line.len())
    }

    fn silence(&mut self) {
        self.line.fill(0.0);
        self.pos = 0;
        self.state = VoiceState::Idle;
    }
}

impl Voice for PluckedString {
    fn prepare(&mut self, sample_rate: f64, _max_block: usize) {
        self.sample_rate = sample_rate as f32;
        let capacity = Self::line_capacity(self.sample_rate);
        if self.line.len() != capacity {
            self.line = vec![0.0; capacity];
        }
        self.silence();
    }

    fn begin(&mut self) {
        self.rng = SmallRng::seed_from_u64(self.seed);
        self.silence();
    }

    fn note_on(&mut self) {
        if !self.enabled {
            return;
        }
        self.len = self.period();
        let velocity = self.config.velocity;
        for s in &mut self.line[..self.len] {
            *s = self.rng.gen_range(-1.0..1.0) * velocity;
        }
        self.pos = 0;
        self.state = VoiceState::Sounding;
    }

    fn note_off(&mut self) {
        if self.state == VoiceState::Sounding {
            self.state = VoiceState::Releasing;
        }
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.silence();
    }

    /// Takes effect at the next pluck; the running loop keeps its length.
    fn set_frequency(&mut self, freq: f32) {
        self.freq = freq.max(0.0);
    }

    fn frequency(&self) -> f32 {
        self.freq
    }

    fn state(&self) -> VoiceState {
        self.state
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn render(&mut self, out: &mut [f32]) -> bool {
        if !self.enabled || self.state == VoiceState::Idle {
            out.fill(0.0);
            return true;
        }

        let decay = match self.state {
            VoiceState::Releasing => self.config.release_decay,
            _ => self.config.sustain_decay,
        };
        let len = self.len;
        let mut peak = 0.0_f32;

        for sample in out.iter_mut() {
            let current = self.line[self.pos];
            let next_pos = if self.pos + 1 == len { 0 } else { self.pos + 1 };
            let next = self.line[next_pos];

            self.line[self.pos] = (current + next) * 0.5 * decay;
            self.pos = next_pos;

            *sample = current;
            peak = peak.max(current.abs());
        }

        if peak < self.config.silence_threshold {
            self.silence();
        }

        false
    }
}
