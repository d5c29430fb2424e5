// src/layer.rs
//
// Rows and layers: fixed groups of voices with their mixing trees.
//
// A layer covers the whole 4x8 key grid. Key `index` lives in row
// `index / 8`, column `index % 8`, in every layer, so the same key always
// addresses the same pitch slot whichever layer is selected.

use std::rc::Rc;

use crate::config::DelayConfig;
use crate::error::BuildError;
use crate::graph::{Graph, NodeId};
use crate::nodes::{DelayParams, DelayStage, Mixer, SampleBank};
use crate::state::Settings;
use crate::voice::{NoteVoice, Voice, VoiceState};

pub const ROW_VOICES: usize = 8;
pub const LAYER_ROWS: usize = 4;
pub const LAYER_KEYS: usize = ROW_VOICES * LAYER_ROWS;

/// Builds the voice for a key index (0..32).
pub type VoiceFactory = Rc<dyn Fn(usize) -> NoteVoice>;

// ═══════════════════════════════════════════════════════════════════
// Specs
// ═══════════════════════════════════════════════════════════════════

/// How to build one row.
#[derive(Clone)]
pub struct RowSpec {
    factory: VoiceFactory,
    delay: Option<DelayConfig>,
}

impl RowSpec {
    pub fn new(factory: impl Fn(usize) -> NoteVoice + 'static) -> Self {
        Self {
            factory: Rc::new(factory),
            delay: None,
        }
    }

    /// Insert a stereo delay after the row mixer.
    pub fn with_delay(mut self, config: DelayConfig) -> Self {
        self.delay = Some(config);
        self
    }

    pub fn has_delay(&self) -> bool {
        self.delay.is_some()
    }
}

/// How to build one layer.
#[derive(Clone)]
pub struct LayerSpec {
    name: String,
    rows: [RowSpec; LAYER_ROWS],
    bank: Option<SampleBank>,
}

impl LayerSpec {
    /// Every row uses the same voice factory.
    pub fn uniform(name: impl Into<String>, factory: impl Fn(usize) -> NoteVoice + 'static) -> Self {
        let row = RowSpec::new(factory);
        Self {
            name: name.into(),
            rows: [row.clone(), row.clone(), row.clone(), row],
            bank: None,
        }
    }

    /// One spec per row, for layers mixing voice types.
    pub fn with_rows(name: impl Into<String>, rows: [RowSpec; LAYER_ROWS]) -> Self {
        Self {
            name: name.into(),
            rows,
            bank: None,
        }
    }

    /// Samples to choose from by pitch when a scale is applied.
    pub fn with_bank(mut self, bank: SampleBank) -> Self {
        self.bank = Some(bank);
        self
    }

    /// Add a delay insert to one row. Out-of-range rows are ignored.
    pub fn with_row_delay(mut self, row: usize, config: DelayConfig) -> Self {
        if let Some(spec) = self.rows.get_mut(row) {
            spec.delay = Some(config);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[RowSpec] {
        &self.rows
    }
}

// ═══════════════════════════════════════════════════════════════════
// Row
// ═══════════════════════════════════════════════════════════════════

/// Eight voices summed 4 -> 1 twice, then 2 -> 1, all at unity.
pub struct Row {
    voices: [NodeId; ROW_VOICES],
    submixers: [NodeId; 2],
    mixer: NodeId,
    delay: Option<(NodeId, DelayParams)>,
}

impl Row {
    fn build(
        graph: &mut Graph,
        settings: &mut Settings,
        spec: &RowSpec,
        first_key: usize,
        prefix: &str,
        max_delay_ms: f32,
    ) -> Result<Self, BuildError> {
        let mut voices = [0; ROW_VOICES];
        for (col, slot) in voices.iter_mut().enumerate() {
            *slot = graph.add_voice((spec.factory)(first_key + col))?;
        }

        let submixers = [graph.add_node(Mixer::new(4))?, graph.add_node(Mixer::new(4))?];
        for (col, &voice) in voices.iter().enumerate() {
            graph.connect(voice, submixers[col / 4], col % 4)?;
        }

        let mixer = graph.add_node(Mixer::new(2))?;
        graph.connect(submixers[0], mixer, 0)?;
        graph.connect(submixers[1], mixer, 1)?;

        let delay = match &spec.delay {
            Some(config) => {
                let stage = DelayStage::register(settings, &format!("{prefix}.delay"), config, max_delay_ms)?;
                let params = stage.params().clone();
                let node = graph.add_node(stage)?;
                graph.connect(mixer, node, 0)?;
                Some((node, params))
            }
            None => None,
        };

        Ok(Self {
            voices,
            submixers,
            mixer,
            delay,
        })
    }

    pub fn voices(&self) -> &[NodeId; ROW_VOICES] {
        &self.voices
    }

    pub fn submixers(&self) -> &[NodeId; 2] {
        &self.submixers
    }

    pub fn mixer(&self) -> NodeId {
        self.mixer
    }

    /// Last node of the row: the delay insert if present, else the mixer.
    pub fn output(&self) -> NodeId {
        self.delay.as_ref().map_or(self.mixer, |(node, _)| *node)
    }

    pub fn delay(&self) -> Option<&DelayParams> {
        self.delay.as_ref().map(|(_, params)| params)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Layer
// ═══════════════════════════════════════════════════════════════════

/// One playable timbre across the full key grid.
///
/// The layer owns node ids, not nodes: all note operations go through the
/// graph that holds its voices.
pub struct Layer {
    name: String,
    rows: Vec<Row>,
    mixer: NodeId,
    bank: Option<SampleBank>,
    enabled: bool,
}

impl Layer {
    /// Add the layer's voices, mixers and row delays to `graph`.
    ///
    /// Row delay parameters are registered as `{prefix}.row{n}.delay.*`.
    pub fn build(
        graph: &mut Graph,
        settings: &mut Settings,
        spec: &LayerSpec,
        prefix: &str,
        max_delay_ms: f32,
    ) -> Result<Self, BuildError> {
        let mut rows = Vec::with_capacity(LAYER_ROWS);
        for (r, row_spec) in spec.rows.iter().enumerate() {
            let row_prefix = format!("{prefix}.row{r}");
            rows.push(Row::build(
                graph,
                settings,
                row_spec,
                r * ROW_VOICES,
                &row_prefix,
                max_delay_ms,
            )?);
        }

        let mixer = graph.add_node(Mixer::new(LAYER_ROWS))?;
        for (r, row) in rows.iter().enumerate() {
            graph.connect(row.output(), mixer, r)?;
        }

        Ok(Self {
            name: spec.name.clone(),
            rows,
            mixer,
            bank: spec.bank.clone(),
            enabled: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Stereo output node of the layer.
    pub fn output(&self) -> NodeId {
        self.mixer
    }

    pub fn bank(&self) -> Option<&SampleBank> {
        self.bank.as_ref()
    }

    /// Node of the voice bound to key `index`.
    pub fn voice_id(&self, index: usize) -> Option<NodeId> {
        if index >= LAYER_KEYS {
            return None;
        }
        self.rows
            .get(index / ROW_VOICES)
            .map(|row| row.voices[index % ROW_VOICES])
    }

    fn voice_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.rows.iter().flat_map(|row| row.voices.iter().copied())
    }

    /// Reinitialize every voice. All notes stop.
    pub fn begin(&self, graph: &mut Graph) {
        for id in self.voice_ids() {
            if let Some(voice) = graph.voice_mut(id) {
                voice.begin();
            }
        }
    }

    pub fn enable(&mut self, graph: &mut Graph) {
        for id in self.voice_ids() {
            if let Some(voice) = graph.voice_mut(id) {
                voice.enable();
            }
        }
        self.enabled = true;
    }

    /// Gate every voice off; release tails are cut.
    pub fn disable(&mut self, graph: &mut Graph) {
        for id in self.voice_ids() {
            if let Some(voice) = graph.voice_mut(id) {
                voice.disable();
            }
        }
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Trigger key `index`. Out-of-range keys are ignored.
    pub fn note_on(&self, graph: &mut Graph, index: usize) {
        if let Some(voice) = self.voice_id(index).and_then(|id| graph.voice_mut(id)) {
            voice.note_on();
        }
    }

    /// Release key `index`. Out-of-range keys are ignored.
    pub fn note_off(&self, graph: &mut Graph, index: usize) {
        if let Some(voice) = self.voice_id(index).and_then(|id| graph.voice_mut(id)) {
            voice.note_off();
        }
    }

    /// Switch every composite voice in `row` to sub-voice `voice`.
    ///
    /// Notes held in the row stop. Returns how many voices switched; rows
    /// without composite voices, and out-of-range indices, switch none.
    pub fn select_voice(&self, graph: &mut Graph, row: usize, voice: usize) -> usize {
        let Some(row) = self.rows.get(row) else {
            return 0;
        };
        let mut switched = 0;
        for &id in &row.voices {
            if let Some(multi) = graph.voice_mut(id).and_then(NoteVoice::as_multi_mut) {
                if voice < multi.len() {
                    multi.select(voice);
                    switched += 1;
                }
            }
        }
        switched
    }

    /// Sub-voice routed in `row`, if the row holds composite voices.
    pub fn selected_voice(&self, graph: &Graph, row: usize) -> Option<usize> {
        let id = self.rows.get(row)?.voices[0];
        graph.voice(id)?.as_multi().map(|multi| multi.selected())
    }

    /// Assign one frequency per key, row-major.
    ///
    /// Sample layers also pick, per key, the bank sample whose reference
    /// pitch is nearest. Reapplying the same table changes nothing.
    pub fn set_scale(&self, graph: &mut Graph, frequencies: &[f32; LAYER_KEYS]) {
        for (index, &freq) in frequencies.iter().enumerate() {
            let Some(voice) = self.voice_id(index).and_then(|id| graph.voice_mut(id)) else {
                continue;
            };
            if let Some(sample) = self.bank.as_ref().and_then(|bank| bank.nearest(freq)) {
                voice.set_sample(sample);
            }
            voice.set_frequency(freq);
        }
    }

    pub fn voice_state(&self, graph: &Graph, index: usize) -> Option<VoiceState> {
        self.voice_id(index)
            .and_then(|id| graph.voice(id))
            .map(|voice| voice.state())
    }

    pub fn voice_states(&self, graph: &Graph) -> [VoiceState; LAYER_KEYS] {
        let mut states = [VoiceState::Idle; LAYER_KEYS];
        for (index, state) in states.iter_mut().enumerate() {
            if let Some(s) = self.voice_state(graph, index) {
                *state = s;
            }
        }
        states
    }

    pub fn frequencies(&self, graph: &Graph) -> [f32; LAYER_KEYS] {
        let mut freqs = [0.0; LAYER_KEYS];
        for (index, freq) in freqs.iter_mut().enumerate() {
            if let Some(voice) = self.voice_id(index).and_then(|id| graph.voice(id)) {
                *freq = voice.frequency();
            }
        }
        freqs
    }

    pub fn active_voices(&self, graph: &Graph) -> usize {
        self.voice_ids()
            .filter_map(|id| graph.voice(id))
            .filter(|voice| voice.state().is_active())
            .count()
    }
}
