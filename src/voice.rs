// src/voice.rs
//
// Note voices: the closed set of per-key sound generators.

use crate::audio_buffer::AudioBuffer;
use crate::node::{Node, PortInputs, ProcessContext};
use crate::nodes::{
    DetunedConfig, DetunedVoice, MultiVoice, PluckedString, SampleData, SampleVoice, StringConfig,
    TonalConfig, TonalVoice,
};

/// Lifecycle of a voice.
///
/// `Idle` produces no energy. `note_on` moves to `Sounding` (also from
/// `Sounding`, as a retrigger), `note_off` to `Releasing`, and the voice
/// returns to `Idle` once its envelope or sample is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VoiceState {
    Idle,
    Sounding,
    Releasing,
}

impl VoiceState {
    #[inline]
    pub fn is_active(self) -> bool {
        self != VoiceState::Idle
    }
}

/// Capability set every voice implements.
///
/// A disabled voice renders silence and ignores `note_on` until it is
/// enabled again; disabling also cuts any release tail.
pub trait Voice: Send {
    /// Size internal state for the engine rate. Build phase only.
    fn prepare(&mut self, sample_rate: f64, max_block: usize);

    /// Restore configured DSP parameters and go idle.
    fn begin(&mut self);

    fn note_on(&mut self);
    fn note_off(&mut self);
    fn enable(&mut self);
    fn disable(&mut self);

    /// Update pitch without retriggering.
    fn set_frequency(&mut self, freq: f32);
    fn frequency(&self) -> f32;

    fn state(&self) -> VoiceState;
    fn is_enabled(&self) -> bool;

    /// Render one mono block. Returns `true` if the block is silent.
    fn render(&mut self, out: &mut [f32]) -> bool;
}

/// A voice slot in the graph.
pub enum NoteVoice {
    Tonal(TonalVoice),
    Detuned(DetunedVoice),
    Plucked(PluckedString),
    Sample(SampleVoice),
    Multi(MultiVoice),
}

impl NoteVoice {
    /// Triangle with a short soft envelope.
    pub fn soft_triangle() -> Self {
        NoteVoice::Tonal(TonalVoice::new(TonalConfig::soft_triangle()))
    }

    /// Saw through a key-tracked low-pass with a plucky envelope.
    pub fn cheap_pluck() -> Self {
        NoteVoice::Tonal(TonalVoice::new(TonalConfig::cheap_pluck()))
    }

    pub fn tonal(config: TonalConfig) -> Self {
        NoteVoice::Tonal(TonalVoice::new(config))
    }

    pub fn detuned() -> Self {
        NoteVoice::Detuned(DetunedVoice::new(DetunedConfig::default()))
    }

    /// Karplus-Strong string. `seed` fixes the excitation noise.
    pub fn plucked(seed: u64) -> Self {
        NoteVoice::Plucked(PluckedString::new(StringConfig::default(), seed))
    }

    pub fn sample(sample: SampleData) -> Self {
        NoteVoice::Sample(SampleVoice::new(sample))
    }

    pub fn multi(voices: Vec<NoteVoice>) -> Self {
        NoteVoice::Multi(MultiVoice::new(voices))
    }

    /// Swap the sample of every sample player in this slot.
    ///
    /// Returns `false` if the slot holds no sample player.
    pub fn set_sample(&mut self, sample: &SampleData) -> bool {
        match self {
            NoteVoice::Sample(voice) => {
                voice.set_sample(sample.clone());
                true
            }
            NoteVoice::Multi(multi) => multi
                .voices_mut()
                .iter_mut()
                .fold(false, |found, v| v.set_sample(sample) | found),
            _ => false,
        }
    }

    pub fn as_sample(&self) -> Option<&SampleVoice> {
        match self {
            NoteVoice::Sample(voice) => Some(voice),
            _ => None,
        }
    }

    pub fn as_multi(&self) -> Option<&MultiVoice> {
        match self {
            NoteVoice::Multi(multi) => Some(multi),
            _ => None,
        }
    }

    pub fn as_multi_mut(&mut self) -> Option<&mut MultiVoice> {
        match self {
            NoteVoice::Multi(multi) => Some(multi),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NoteVoice::Tonal(_) => "tonal",
            NoteVoice::Detuned(_) => "detuned",
            NoteVoice::Plucked(_) => "plucked",
            NoteVoice::Sample(_) => "sample",
            NoteVoice::Multi(_) => "multi",
        }
    }

    #[inline]
    fn inner(&self) -> &dyn Voice {
        match self {
            NoteVoice::Tonal(v) => v,
            NoteVoice::Detuned(v) => v,
            NoteVoice::Plucked(v) => v,
            NoteVoice::Sample(v) => v,
            NoteVoice::Multi(v) => v,
        }
    }

    #[inline]
    fn inner_mut(&mut self) -> &mut dyn Voice {
        match self {
            NoteVoice::Tonal(v) => v,
            NoteVoice::Detuned(v) => v,
            NoteVoice::Plucked(v) => v,
            NoteVoice::Sample(v) => v,
            NoteVoice::Multi(v) => v,
        }
    }
}

impl Voice for NoteVoice {
    fn prepare(&mut self, sample_rate: f64, max_block: usize) {
        self.inner_mut().prepare(sample_rate, max_block);
    }

    fn begin(&mut self) {
        self.inner_mut().begin();
    }

    fn note_on(&mut self) {
        self.inner_mut().note_on();
    }

    fn note_off(&mut self) {
        self.inner_mut().note_off();
    }

    fn enable(&mut self) {
        self.inner_mut().enable();
    }

    fn disable(&mut self) {
        self.inner_mut().disable();
    }

    fn set_frequency(&mut self, freq: f32) {
        self.inner_mut().set_frequency(freq);
    }

    fn frequency(&self) -> f32 {
        self.inner().frequency()
    }

    fn state(&self) -> VoiceState {
        self.inner().state()
    }

    fn is_enabled(&self) -> bool {
        self.inner().is_enabled()
    }

    fn render(&mut self, out: &mut [f32]) -> bool {
        self.inner_mut().render(out)
    }
}

impl Node for NoteVoice {
    fn prepare(&mut self, sample_rate: f64, max_block: usize) {
        Voice::prepare(self, sample_rate, max_block);
    }

    fn process(&mut self, _ctx: &ProcessContext, _inputs: &PortInputs, output: &mut AudioBuffer) -> bool {
        self.render(output.channel_mut(0))
    }

    fn num_inputs(&self) -> usize {
        0
    }

    fn num_channels(&self) -> usize {
        1
    }

    fn reset(&mut self) {
        self.begin();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ramp_sample() -> SampleData {
        let samples: Vec<i16> = (0..4000).map(|i| ((i % 100) as i16 - 50) * 300).collect();
        SampleData::new(Arc::from(samples), 440.0)
    }

    fn every_kind() -> Vec<NoteVoice> {
        vec![
            NoteVoice::soft_triangle(),
            NoteVoice::cheap_pluck(),
            NoteVoice::detuned(),
            NoteVoice::plucked(7),
            NoteVoice::sample(ramp_sample()),
            NoteVoice::multi(vec![NoteVoice::soft_triangle(), NoteVoice::plucked(3)]),
        ]
    }

    #[test]
    fn disable_silences_next_block_in_any_phase() {
        for mut voice in every_kind() {
            Voice::prepare(&mut voice, 44_100.0, 128);
            voice.begin();
            voice.enable();
            voice.set_frequency(220.0);
            voice.note_on();

            let mut block = [0.0_f32; 128];
            voice.render(&mut block);
            assert!(block.iter().any(|s| *s != 0.0), "{} produced nothing", voice.kind());

            voice.note_off();
            voice.disable();
            assert_eq!(voice.state(), VoiceState::Idle, "{}", voice.kind());
            assert!(voice.render(&mut block));
            assert!(block.iter().all(|s| *s == 0.0), "{} leaked after disable", voice.kind());
        }
    }

    #[test]
    fn note_on_while_disabled_is_ignored() {
        for mut voice in every_kind() {
            Voice::prepare(&mut voice, 44_100.0, 64);
            voice.begin();
            voice.disable();
            voice.set_frequency(330.0);
            voice.note_on();
            assert_eq!(voice.state(), VoiceState::Idle, "{}", voice.kind());
        }
    }

    #[test]
    fn set_frequency_does_not_retrigger() {
        for mut voice in every_kind() {
            Voice::prepare(&mut voice, 44_100.0, 64);
            voice.begin();
            voice.enable();
            voice.set_frequency(261.63);
            assert_eq!(voice.state(), VoiceState::Idle);
            assert!((voice.frequency() - 261.63).abs() < 1e-3, "{}", voice.kind());
        }
    }

    #[test]
    fn set_sample_reaches_nested_players() {
        let mut multi = NoteVoice::multi(vec![NoteVoice::soft_triangle(), NoteVoice::sample(ramp_sample())]);
        let replacement = SampleData::new(Arc::from(vec![0_i16; 16]), 110.0);
        assert!(multi.set_sample(&replacement));
        assert!(!NoteVoice::detuned().set_sample(&replacement));
    }

    #[test]
    fn graph_node_output_is_mono() {
        let voice = NoteVoice::soft_triangle();
        assert_eq!(Node::num_channels(&voice), 1);
        assert_eq!(Node::num_inputs(&voice), 0);
    }
}
