// src/chain.rs
//
// Mastering chain: stereo stages appended one after another at build time.

use crate::config::{ChorusConfig, CrusherConfig, DelayConfig, DynamicsConfig, EchoConfig};
use crate::error::BuildError;
use crate::graph::{Graph, GraphResult, NodeId};
use crate::node::Node;
use crate::nodes::{BitCrusherStage, ChorusStage, DelayParams, DelayStage, DynamicsStage, EchoStage, GainStage};
use crate::state::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Gain,
    Delay,
    Echo,
    Chorus,
    Crusher,
    Limiter,
}

/// Tail of the stereo signal plus the stages appended so far.
#[derive(Debug, Clone)]
pub struct FilterChain {
    tail: NodeId,
    stages: Vec<(StageKind, NodeId)>,
}

impl FilterChain {
    /// Start a chain fed by `head`.
    pub fn new(head: NodeId) -> Self {
        Self {
            tail: head,
            stages: Vec::new(),
        }
    }

    /// Wire the current tail into `stage`'s input and make it the new tail.
    pub fn append(&mut self, graph: &mut Graph, kind: StageKind, stage: impl Node + 'static) -> GraphResult<NodeId> {
        let node = graph.add_node(stage)?;
        graph.connect(self.tail, node, 0)?;
        self.tail = node;
        self.stages.push((kind, node));
        Ok(node)
    }

    pub fn tail(&self) -> NodeId {
        self.tail
    }

    pub fn stages(&self) -> &[(StageKind, NodeId)] {
        &self.stages
    }

    pub fn find(&self, kind: StageKind) -> Option<NodeId> {
        self.stages.iter().find(|(k, _)| *k == kind).map(|(_, node)| *node)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Which stages to build and how.
///
/// Order is gain, delay, echo, chorus, bit-crusher, limiter. The limiter is
/// always present.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSpec {
    pub gain: Option<f32>,
    pub delay: Option<DelayConfig>,
    pub echo: Option<EchoConfig>,
    pub chorus: Option<ChorusConfig>,
    pub crusher: Option<CrusherConfig>,
    pub limiter: DynamicsConfig,
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self {
            gain: Some(GainStage::DEFAULT_GAIN),
            delay: Some(DelayConfig::default()),
            echo: None,
            chorus: None,
            crusher: Some(CrusherConfig::default()),
            limiter: DynamicsConfig::default(),
        }
    }
}

impl ChainSpec {
    /// Limiter only.
    pub fn bare() -> Self {
        Self {
            gain: None,
            delay: None,
            echo: None,
            chorus: None,
            crusher: None,
            limiter: DynamicsConfig::default(),
        }
    }

    pub fn with_echo(mut self, config: EchoConfig) -> Self {
        self.echo = Some(config);
        self
    }

    pub fn with_chorus(mut self, config: ChorusConfig) -> Self {
        self.chorus = Some(config);
        self
    }

    /// Append the configured stages after `head`.
    ///
    /// Parameters are registered under `gain.*`, `delay.*`, `echo.*`,
    /// `chorus.*`, `crusher.*` and `limiter.*`.
    pub fn build(
        &self,
        graph: &mut Graph,
        settings: &mut Settings,
        head: NodeId,
        sample_rate: f64,
        max_delay_ms: f32,
    ) -> Result<MasterChain, BuildError> {
        let mut chain = FilterChain::new(head);
        let mut delay = None;

        if let Some(gain) = self.gain {
            let stage = GainStage::register(settings, "gain", gain)?;
            chain.append(graph, StageKind::Gain, stage)?;
        }
        if let Some(config) = &self.delay {
            let stage = DelayStage::register(settings, "delay", config, max_delay_ms)?;
            delay = Some(stage.params().clone());
            chain.append(graph, StageKind::Delay, stage)?;
        }
        if let Some(config) = &self.echo {
            let stage = EchoStage::register(settings, "echo", config, max_delay_ms)?;
            chain.append(graph, StageKind::Echo, stage)?;
        }
        if let Some(config) = &self.chorus {
            let stage = ChorusStage::register(settings, "chorus", config)?;
            chain.append(graph, StageKind::Chorus, stage)?;
        }
        if let Some(config) = &self.crusher {
            let stage = BitCrusherStage::register(settings, "crusher", config, sample_rate as f32)?;
            chain.append(graph, StageKind::Crusher, stage)?;
        }
        let limiter = DynamicsStage::register(settings, "limiter", &self.limiter)?;
        chain.append(graph, StageKind::Limiter, limiter)?;

        Ok(MasterChain { chain, delay })
    }
}

/// A built chain with handles to the stages the instrument toggles.
#[derive(Debug, Clone)]
pub struct MasterChain {
    pub chain: FilterChain,
    pub delay: Option<DelayParams>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_buffer::AudioBuffer;
    use crate::node::{PortInputs, ProcessContext};

    struct Silence;

    impl Node for Silence {
        fn prepare(&mut self, _: f64, _: usize) {}

        fn process(&mut self, _: &ProcessContext, _: &PortInputs, output: &mut AudioBuffer) -> bool {
            output.clear();
            true
        }

        fn num_inputs(&self) -> usize {
            0
        }

        fn num_channels(&self) -> usize {
            2
        }
    }

    fn build(spec: &ChainSpec) -> (Graph, Settings, MasterChain) {
        let mut graph = Graph::new(64);
        let mut settings = Settings::new();
        let head = graph.add_node(Silence).unwrap();
        let built = spec.build(&mut graph, &mut settings, head, 44_100.0, 1000.0).unwrap();
        graph.set_output(built.chain.tail()).unwrap();
        graph.assemble(44_100.0).unwrap();
        (graph, settings, built)
    }

    #[test]
    fn default_chain_order() {
        let (graph, _, built) = build(&ChainSpec::default());
        let kinds: Vec<_> = built.chain.stages().iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![StageKind::Gain, StageKind::Delay, StageKind::Crusher, StageKind::Limiter]
        );
        assert!(built.delay.is_some());
        assert_eq!(graph.eval_order().last(), Some(&built.chain.tail()));
    }

    #[test]
    fn stages_are_wired_in_sequence() {
        let spec = ChainSpec::default()
            .with_echo(EchoConfig::default())
            .with_chorus(ChorusConfig::FLANGE);
        let (graph, _, built) = build(&spec);

        let stages = built.chain.stages();
        assert_eq!(stages.len(), 6);
        assert_eq!(graph.inputs_of(stages[0].1).unwrap(), &[Some(0)]);
        for pair in stages.windows(2) {
            assert_eq!(graph.inputs_of(pair[1].1).unwrap(), &[Some(pair[0].1)]);
        }
        assert_eq!(built.chain.find(StageKind::Limiter), Some(built.chain.tail()));
    }

    #[test]
    fn stage_parameters_are_registered() {
        let spec = ChainSpec::default().with_echo(EchoConfig::default());
        let (_, settings, _) = build(&spec);
        for key in ["gain.level", "delay.feedback", "echo.mix", "crusher.bits", "limiter.threshold"] {
            assert!(settings.contains(key), "missing {}", key);
        }
        assert!(!settings.contains("chorus.mix"));
    }

    #[test]
    fn bare_chain_is_limiter_only() {
        let (_, _, built) = build(&ChainSpec::bare());
        assert_eq!(built.chain.len(), 1);
        assert!(built.delay.is_none());
    }

    #[test]
    fn appending_after_assembly_fails() {
        let (mut graph, mut settings, mut built) = build(&ChainSpec::bare());
        let stage = GainStage::register(&mut settings, "late", 1.0).unwrap();
        assert!(built.chain.append(&mut graph, StageKind::Gain, stage).is_err());
    }
}
