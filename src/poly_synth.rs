// src/poly_synth.rs
//
// Pooled polyphony: eight voices shared by the whole key grid.

use crate::config::EngineConfig;
use crate::error::BuildError;
use crate::graph::{Graph, NodeId};
use crate::layer::LAYER_KEYS;
use crate::nodes::{Mixer, TonalConfig, Waveform};
use crate::scale::ScaleGenerator;
use crate::voice::{NoteVoice, Voice, VoiceState};
use crate::voice_allocator::{Allocation, VoiceAllocator};

pub const POLY_VOICES: usize = 8;

/// Eight tonal voices behind a [`VoiceAllocator`].
///
/// Voices are mixed 4 -> 1 at 0.25 per voice, then 2 -> 1 at 0.5, so a
/// full chord cannot exceed the amplitude of one voice.
pub struct PolySynth {
    graph: Graph,
    voices: [NodeId; POLY_VOICES],
    allocator: VoiceAllocator,
    scale: [f32; LAYER_KEYS],
    waveform: Waveform,
    sample_pos: u64,
}

impl PolySynth {
    pub fn new(config: EngineConfig) -> Result<Self, BuildError> {
        let mut graph = Graph::new(config.block_size);

        let mut voices = [0; POLY_VOICES];
        for slot in &mut voices {
            *slot = graph.add_voice(NoteVoice::tonal(TonalConfig::soft_triangle()))?;
        }

        let submixers = [graph.add_node(Mixer::uniform(4, 0.25))?, graph.add_node(Mixer::uniform(4, 0.25))?];
        for (i, &voice) in voices.iter().enumerate() {
            graph.connect(voice, submixers[i / 4], i % 4)?;
        }
        let output = graph.add_node(Mixer::uniform(2, 0.5))?;
        graph.connect(submixers[0], output, 0)?;
        graph.connect(submixers[1], output, 1)?;
        graph.set_output(output)?;
        graph.assemble(config.sample_rate)?;

        Ok(Self {
            graph,
            voices,
            allocator: VoiceAllocator::new(POLY_VOICES),
            scale: ScaleGenerator::default().generate(),
            waveform: Waveform::Triangle,
            sample_pos: 0,
        })
    }

    /// Milliseconds of audio rendered so far.
    pub fn now_ms(&self) -> u64 {
        (self.sample_pos as f64 * 1000.0 / self.graph.sample_rate()) as u64
    }

    /// Start `note` (a key index) on a pooled voice.
    ///
    /// Returns the allocation, or `None` for keys outside the grid.
    pub fn note_on(&mut self, note: usize) -> Option<Allocation> {
        let freq = *self.scale.get(note)?;
        let allocation = self.allocator.note_on(note, self.now_ms())?;
        let waveform = self.waveform;

        let voice = self.graph.voice_mut(self.voices[allocation.voice])?;
        if let NoteVoice::Tonal(tonal) = voice {
            tonal.set_waveform(waveform);
        }
        voice.set_frequency(freq);
        voice.note_on();
        Some(allocation)
    }

    /// Release `note`. No-op if it was stolen or never started.
    pub fn note_off(&mut self, note: usize) {
        let Some(index) = self.allocator.note_off(note) else {
            return;
        };
        if let Some(voice) = self.graph.voice_mut(self.voices[index]) {
            voice.note_off();
        }
    }

    /// Frequencies used by the next note-ons. Sounding notes keep their pitch.
    pub fn set_scale(&mut self, frequencies: &[f32; LAYER_KEYS]) {
        self.scale = *frequencies;
    }

    /// Waveform used by the next note-ons.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn voice_state(&self, voice: usize) -> Option<VoiceState> {
        let id = *self.voices.get(voice)?;
        self.graph.voice(id).map(|v| v.state())
    }

    pub fn voice_frequency(&self, voice: usize) -> Option<f32> {
        let id = *self.voices.get(voice)?;
        self.graph.voice(id).map(|v| v.frequency())
    }

    pub fn allocator(&self) -> &VoiceAllocator {
        &self.allocator
    }

    pub fn active_voices(&self) -> usize {
        (0..POLY_VOICES)
            .filter(|&v| self.voice_state(v).is_some_and(VoiceState::is_active))
            .count()
    }

    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        let chunk = self.graph.max_block();
        let mut offset = 0;

        while offset < frames {
            let n = chunk.min(frames - offset);
            self.graph.process(n, self.sample_pos);
            self.sample_pos += n as u64;

            match self.graph.output_buffer() {
                Some(out) => {
                    left[offset..offset + n].copy_from_slice(&out.channel(0)[..n]);
                    right[offset..offset + n].copy_from_slice(&out.upmixed(1)[..n]);
                }
                None => {
                    left[offset..offset + n].fill(0.0);
                    right[offset..offset + n].fill(0.0);
                }
            }
            offset += n;
        }
    }
}
