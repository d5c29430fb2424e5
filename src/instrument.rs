// src/instrument.rs
//
// The multi-layer instrument: layers -> layer selector -> mastering chain.

use crate::chain::{ChainSpec, FilterChain};
use crate::config::EngineConfig;
use crate::error::BuildError;
use crate::graph::{Graph, NodeId};
use crate::layer::{LAYER_KEYS, Layer, LayerSpec};
use crate::nodes::{DelayParams, Mixer, SampleBank, SampleData};
use crate::state::Settings;
use crate::voice::{NoteVoice, VoiceState};

/// Reference pitches of the built-in sample bank.
pub const SAMPLE_PITCHES: [f32; 4] = [110.0, 220.0, 440.0, 523.25];

/// Selectable layers sharing one key grid and one mastering chain.
///
/// Exactly one layer is audible. The layer selector is a mixer with one
/// port per layer at gain 1 for the current layer and 0 for the rest, and
/// every other layer is disabled so its notes stop.
pub struct Instrument {
    graph: Graph,
    settings: Settings,
    layers: Vec<Layer>,
    selector: NodeId,
    chain: FilterChain,
    delay: Option<DelayParams>,
    current: usize,
    scale: [f32; LAYER_KEYS],
    sample_pos: u64,
    config: EngineConfig,
}

impl Instrument {
    /// Build and assemble the graph. Layer 0 starts selected.
    pub fn new(config: EngineConfig, layers: &[LayerSpec], chain: &ChainSpec) -> Result<Self, BuildError> {
        if layers.is_empty() {
            return Err(BuildError::NoLayers);
        }

        let mut graph = Graph::new(config.block_size);
        let mut settings = Settings::new();

        let mut built = Vec::with_capacity(layers.len());
        for (i, spec) in layers.iter().enumerate() {
            built.push(Layer::build(
                &mut graph,
                &mut settings,
                spec,
                &format!("layer{i}"),
                config.max_delay_ms,
            )?);
        }

        let gains = (0..built.len()).map(|i| if i == 0 { 1.0 } else { 0.0 }).collect();
        let selector = graph.add_node(Mixer::with_gains(gains))?;
        for (i, layer) in built.iter().enumerate() {
            graph.connect(layer.output(), selector, i)?;
        }

        let master = chain.build(&mut graph, &mut settings, selector, config.sample_rate, config.max_delay_ms)?;
        graph.set_output(master.chain.tail())?;
        graph.assemble(config.sample_rate)?;

        let mut instrument = Self {
            graph,
            settings,
            layers: built,
            selector,
            chain: master.chain,
            delay: master.delay,
            current: 0,
            scale: [0.0; LAYER_KEYS],
            sample_pos: 0,
            config,
        };
        for layer in &instrument.layers {
            layer.begin(&mut instrument.graph);
        }
        instrument.apply_selection(0);

        log::info!(
            "Instrument ready: {} layers, {} chain stages, {} settings",
            instrument.layers.len(),
            instrument.chain.len(),
            instrument.settings.len()
        );
        Ok(instrument)
    }

    /// The five-layer instrument: soft triangle, sample bank, plucked
    /// string, cheap pluck and a switchable multi-timbre layer, through the
    /// default chain.
    pub fn with_default_layers(config: EngineConfig) -> Result<Self, BuildError> {
        Self::new(config, &default_layers(config.sample_rate as f32), &ChainSpec::default())
    }

    // ═══════════════════════════════════════════════════════════════
    // Notes
    // ═══════════════════════════════════════════════════════════════

    /// Trigger key `index` on the current layer. Out of range is a no-op.
    pub fn note_on(&mut self, index: usize) {
        if let Some(layer) = self.layers.get(self.current) {
            layer.note_on(&mut self.graph, index);
        }
    }

    pub fn note_off(&mut self, index: usize) {
        if let Some(layer) = self.layers.get(self.current) {
            layer.note_off(&mut self.graph, index);
        }
    }

    /// Release every key of the current layer.
    pub fn all_notes_off(&mut self) {
        for index in 0..LAYER_KEYS {
            self.note_off(index);
        }
    }

    /// Switch the timbre of `row` on the current layer. Notes held in that
    /// row stop. Layers without composite voices ignore it.
    pub fn select_voice(&mut self, row: usize, voice: usize) {
        if let Some(layer) = self.layers.get(self.current) {
            let switched = layer.select_voice(&mut self.graph, row, voice);
            log::debug!(
                "Row {} of layer {} -> voice {} ({} keys switched)",
                row,
                self.current,
                voice,
                switched
            );
        }
    }

    /// Stop every note and clear every effect tail. Scale, layer selection
    /// and parameters are kept.
    pub fn reset(&mut self) {
        // Voices reset through `begin`, which keeps their frequencies
        self.graph.reset();
        self.apply_selection(self.current);
        log::info!("Instrument reset");
    }

    /// Apply a frequency table to every layer.
    pub fn set_scale(&mut self, frequencies: &[f32; LAYER_KEYS]) {
        for layer in &self.layers {
            layer.set_scale(&mut self.graph, frequencies);
        }
        self.scale = *frequencies;
    }

    pub fn scale(&self) -> &[f32; LAYER_KEYS] {
        &self.scale
    }

    // ═══════════════════════════════════════════════════════════════
    // Layers
    // ═══════════════════════════════════════════════════════════════

    /// Make layer `k` the only audible one. Out of range is a no-op.
    pub fn select_layer(&mut self, k: usize) {
        if k >= self.layers.len() {
            return;
        }
        self.apply_selection(k);
        log::debug!("Selected layer {} ({})", k, self.layers[k].name());
    }

    fn apply_selection(&mut self, k: usize) {
        for (i, layer) in self.layers.iter_mut().enumerate() {
            if i != k {
                layer.disable(&mut self.graph);
                self.graph.set_param(self.selector, i as u32, 0.0);
            }
        }
        self.layers[k].enable(&mut self.graph);
        self.graph.set_param(self.selector, k as u32, 1.0);
        self.current = k;
    }

    pub fn current_layer(&self) -> usize {
        self.current
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, k: usize) -> Option<&Layer> {
        self.layers.get(k)
    }

    pub fn voice_state(&self, layer: usize, index: usize) -> Option<VoiceState> {
        self.layers.get(layer)?.voice_state(&self.graph, index)
    }

    /// Sounding or releasing voices across all layers.
    pub fn active_voices(&self) -> usize {
        self.layers.iter().map(|l| l.active_voices(&self.graph)).sum()
    }

    // ═══════════════════════════════════════════════════════════════
    // Chain
    // ═══════════════════════════════════════════════════════════════

    /// Shared parameter registry. Clones write to the same parameters.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Bypass or restore the master delay.
    pub fn set_delay_active(&self, active: bool) {
        if let Some(delay) = &self.delay {
            delay.set_active(active);
        }
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════
    // Audio
    // ═══════════════════════════════════════════════════════════════

    /// Render `min(left.len(), right.len())` frames, in graph-sized chunks.
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

    /// Frames rendered since construction.
    pub fn sample_pos(&self) -> u64 {
        self.sample_pos
    }
}

/// Layer specs of the default instrument.
pub fn default_layers(sample_rate: f32) -> Vec<LayerSpec> {
    let bank = SampleBank::new(
        SAMPLE_PITCHES
            .iter()
            .map(|&freq| SampleData::synthesize(freq, sample_rate, 0.6))
            .collect(),
    );
    let first = bank.get(0).cloned();

    let samples = LayerSpec::uniform("samples", move |_| match &first {
        Some(sample) => NoteVoice::sample(sample.clone()),
        None => NoteVoice::soft_triangle(),
    })
    .with_bank(bank);

    vec![
        LayerSpec::uniform("triangle", |_| NoteVoice::soft_triangle()),
        samples,
        LayerSpec::uniform("string", |key| NoteVoice::plucked(key as u64 + 1)),
        LayerSpec::uniform("pluck", |_| NoteVoice::cheap_pluck()),
        LayerSpec::uniform("multi", |key| {
            NoteVoice::multi(vec![
                NoteVoice::soft_triangle(),
                NoteVoice::plucked(key as u64 + 1),
                NoteVoice::detuned(),
            ])
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::Voice;

    fn scale() -> [f32; LAYER_KEYS] {
        std::array::from_fn(|i| 110.0 * 2.0_f32.powf(i as f32 / 12.0))
    }

    fn instrument() -> Instrument {
        let mut inst = Instrument::with_default_layers(EngineConfig::default()).unwrap();
        inst.set_scale(&scale());
        inst
    }

    #[test]
    fn default_preset_has_five_layers() {
        let inst = instrument();
        assert_eq!(inst.layer_count(), 5);
        assert_eq!(inst.current_layer(), 0);
        let names: Vec<_> = (0..5).map(|k| inst.layer(k).unwrap().name().to_string()).collect();
        assert_eq!(names, ["triangle", "samples", "string", "pluck", "multi"]);
        assert!(inst.layer(0).unwrap().is_enabled());
        assert!((1..5).all(|k| !inst.layer(k).unwrap().is_enabled()));
    }

    #[test]
    fn notes_go_to_current_layer_only() {
        let mut inst = instrument();
        inst.select_layer(3);
        inst.note_on(5);
        assert_eq!(inst.voice_state(3, 5), Some(VoiceState::Sounding));
        assert_eq!(inst.voice_state(0, 5), Some(VoiceState::Idle));
        assert_eq!(inst.active_voices(), 1);
    }

    #[test]
    fn switching_layers_silences_old_notes() {
        let mut inst = instrument();
        inst.note_on(0);
        inst.note_on(1);
        inst.select_layer(2);
        assert_eq!(inst.active_voices(), 0);
        assert!(!inst.layer(0).unwrap().is_enabled());
        assert!(inst.layer(2).unwrap().is_enabled());
    }

    #[test]
    fn out_of_range_selection_is_ignored() {
        let mut inst = instrument();
        inst.select_layer(1);
        inst.select_layer(inst.layer_count());
        assert_eq!(inst.current_layer(), 1);
        inst.note_on(LAYER_KEYS);
        assert_eq!(inst.active_voices(), 0);
    }

    #[test]
    fn scale_reaches_every_layer() {
        let inst = instrument();
        for k in 0..inst.layer_count() {
            assert_eq!(inst.layer(k).unwrap().frequencies(inst.graph()), scale());
        }
    }

    #[test]
    fn renders_odd_sized_blocks() {
        let mut inst = instrument();
        inst.note_on(12);
        let mut left = vec![0.0; 300];
        let mut right = vec![0.0; 300];
        inst.process_block(&mut left, &mut right);
        assert_eq!(inst.sample_pos(), 300);
        assert!(left.iter().any(|s| *s != 0.0));
        assert!(left.iter().chain(&right).all(|s| s.is_finite() && s.abs() <= 1.0));
    }

    #[test]
    fn select_voice_switches_timbre_under_held_notes() {
        let mut inst = instrument();
        inst.select_layer(4);
        inst.note_on(0);
        inst.note_on(8);

        inst.select_voice(0, 2);
        let layer = inst.layer(4).unwrap();
        assert_eq!(layer.selected_voice(inst.graph(), 0), Some(2));
        assert_eq!(layer.selected_voice(inst.graph(), 1), Some(0));
        assert_eq!(inst.voice_state(4, 0), Some(VoiceState::Idle));
        assert_eq!(inst.voice_state(4, 8), Some(VoiceState::Sounding));

        inst.note_on(0);
        let id = inst.layer(4).unwrap().voice_id(0).unwrap();
        let multi = inst.graph().voice(id).and_then(|v| v.as_multi()).unwrap();
        assert_eq!(multi.voices()[2].kind(), "detuned");
        assert_eq!(multi.voices()[2].state(), VoiceState::Sounding);

        let mut left = vec![0.0; 256];
        let mut right = vec![0.0; 256];
        inst.process_block(&mut left, &mut right);
        assert!(left.iter().any(|s| *s != 0.0));
    }

    #[test]
    fn select_voice_ignores_plain_layers() {
        let mut inst = instrument();
        inst.note_on(3);
        inst.select_voice(0, 1);
        assert_eq!(inst.voice_state(0, 3), Some(VoiceState::Sounding));
        assert_eq!(inst.layer(0).unwrap().selected_voice(inst.graph(), 0), None);
    }

    #[test]
    fn reselecting_current_layer_keeps_held_notes() {
        let mut inst = instrument();
        for k in 0..inst.layer_count() {
            inst.select_layer(k);
            inst.note_on(6);
            inst.select_layer(k);
            assert_eq!(inst.voice_state(k, 6), Some(VoiceState::Sounding), "layer {}", k);
        }
    }

    #[test]
    fn reset_stops_notes_and_keeps_setup() {
        let mut inst = instrument();
        inst.select_layer(2);
        inst.note_on(1);
        inst.note_on(30);
        let mut left = vec![0.0; 512];
        let mut right = vec![0.0; 512];
        inst.process_block(&mut left, &mut right);

        inst.reset();
        assert_eq!(inst.active_voices(), 0);
        assert_eq!(inst.current_layer(), 2);
        assert!(inst.layer(2).unwrap().is_enabled());
        assert!(!inst.layer(0).unwrap().is_enabled());
        assert_eq!(inst.layer(2).unwrap().frequencies(inst.graph()), scale());

        // Delay lines were cleared along with the voices
        inst.process_block(&mut left, &mut right);
        assert!(left.iter().chain(&right).all(|s| *s == 0.0));

        inst.note_on(1);
        assert_eq!(inst.voice_state(2, 1), Some(VoiceState::Sounding));
    }

    #[test]
    fn empty_layer_list_is_rejected() {
        let result = Instrument::new(EngineConfig::default(), &[], &ChainSpec::default());
        assert!(matches!(result, Err(BuildError::NoLayers)));
    }

    #[test]
    fn chain_parameters_are_exposed() {
        let inst = instrument();
        assert!(inst.settings().contains("delay.active"));
        inst.set_delay_active(false);
        assert_eq!(inst.settings().get("delay.active").unwrap(), 0.0);
    }
}
