//! Explicit runtime audio graph.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Edges connect a
//! source node's output to a numbered input port of a destination node.
//! Building happens in two phases: register nodes and edges, then
//! [`Graph::assemble`] freezes the wiring, computes a topological
//! evaluation order and prepares every node. After that only node-local
//! state and parameters change; the audio callback runs
//! [`Graph::process`], a flat walk over the precomputed order.

use std::collections::VecDeque;
use std::fmt;

use crate::audio_buffer::AudioBuffer;
use crate::node::{Node, PortInputs, ProcessContext};
use crate::voice::NoteVoice;

pub type NodeId = usize;

/// Error during graph construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// An id does not refer to a node in this graph.
    UnknownNode(NodeId),

    /// The destination has fewer input ports.
    PortOutOfRange { node: NodeId, port: usize, ports: usize },

    /// Each input port accepts exactly one edge.
    PortOccupied { node: NodeId, port: usize },

    /// A node cannot feed itself.
    SelfConnection(NodeId),

    /// The edges contain a cycle through this node.
    Cycle(NodeId),

    /// `assemble` was called before an output node was chosen.
    NoOutput,

    /// Wiring is frozen once the graph is assembled.
    AlreadyAssembled,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::UnknownNode(id) => write!(f, "Unknown node {}", id),
            GraphError::PortOutOfRange { node, port, ports } => {
                write!(f, "Node {} has {} input ports, port {} requested", node, ports, port)
            }
            GraphError::PortOccupied { node, port } => {
                write!(f, "Input port {} of node {} is already connected", port, node)
            }
            GraphError::SelfConnection(id) => write!(f, "Node {} cannot feed itself", id),
            GraphError::Cycle(id) => write!(f, "Graph contains a cycle through node {}", id),
            GraphError::NoOutput => write!(f, "No output node set"),
            GraphError::AlreadyAssembled => write!(f, "Graph is already assembled"),
        }
    }
}

impl std::error::Error for GraphError {}

pub type GraphResult<T> = Result<T, GraphError>;

/// What lives in a graph slot.
///
/// Voices are kept as a distinct variant so the instrument can reach their
/// note controls by id.
pub enum NodeInstance {
    Voice(Box<NoteVoice>),
    Processor(Box<dyn Node>),
}

impl NodeInstance {
    #[inline]
    fn as_node_mut(&mut self) -> &mut dyn Node {
        match self {
            NodeInstance::Voice(voice) => voice.as_mut(),
            NodeInstance::Processor(node) => node.as_mut(),
        }
    }

    #[inline]
    fn as_node(&self) -> &dyn Node {
        match self {
            NodeInstance::Voice(voice) => voice.as_ref(),
            NodeInstance::Processor(node) => node.as_ref(),
        }
    }
}

/// One node in the graph
pub struct GraphNode {
    pub instance: NodeInstance,
    /// Source node per input port
    pub inputs: Vec<Option<NodeId>>,
}

/// The audio graph
pub struct Graph {
    nodes: Vec<GraphNode>,
    buffers: Vec<AudioBuffer>,
    silent: Vec<bool>,
    output_node: Option<NodeId>,
    max_block: usize,
    sample_rate: f64,

    /// Topologically sorted evaluation order (computed in assemble)
    eval_order: Vec<NodeId>,
    assembled: bool,
}

impl Graph {
    pub fn new(max_block: usize) -> Self {
        Self {
            nodes: Vec::new(),
            buffers: Vec::new(),
            silent: Vec::new(),
            output_node: None,
            max_block: max_block.max(1),
            sample_rate: 44_100.0,
            eval_order: Vec::new(),
            assembled: false,
        }
    }

    /// Register a voice. Returns its node id.
    pub fn add_voice(&mut self, voice: NoteVoice) -> GraphResult<NodeId> {
        self.add_instance(NodeInstance::Voice(Box::new(voice)))
    }

    /// Register a processing node. Returns its node id.
    pub fn add_node(&mut self, node: impl Node + 'static) -> GraphResult<NodeId> {
        self.add_instance(NodeInstance::Processor(Box::new(node)))
    }

    fn add_instance(&mut self, instance: NodeInstance) -> GraphResult<NodeId> {
        if self.assembled {
            return Err(GraphError::AlreadyAssembled);
        }

        let node = instance.as_node();
        let channels = node.num_channels();
        let ports = node.num_inputs();

        let idx = self.nodes.len();
        self.nodes.push(GraphNode {
            instance,
            inputs: vec![None; ports],
        });
        self.buffers.push(AudioBuffer::new(channels, self.max_block));
        self.silent.push(true);

        Ok(idx)
    }

    /// Add an edge: `src` output -> `dst` input `port`.
    pub fn connect(&mut self, src: NodeId, dst: NodeId, port: usize) -> GraphResult<()> {
        if self.assembled {
            return Err(GraphError::AlreadyAssembled);
        }
        if src >= self.nodes.len() {
            return Err(GraphError::UnknownNode(src));
        }
        if src == dst {
            return Err(GraphError::SelfConnection(src));
        }

        let node = self.nodes.get_mut(dst).ok_or(GraphError::UnknownNode(dst))?;
        let ports = node.inputs.len();
        let slot = node
            .inputs
            .get_mut(port)
            .ok_or(GraphError::PortOutOfRange { node: dst, port, ports })?;

        if slot.is_some() {
            return Err(GraphError::PortOccupied { node: dst, port });
        }
        *slot = Some(src);
        Ok(())
    }

    /// Choose the node whose buffer is the graph output.
    pub fn set_output(&mut self, node: NodeId) -> GraphResult<()> {
        if self.assembled {
            return Err(GraphError::AlreadyAssembled);
        }
        if node >= self.nodes.len() {
            return Err(GraphError::UnknownNode(node));
        }
        self.output_node = Some(node);
        Ok(())
    }

    /// Freeze wiring, compute the evaluation order and prepare all nodes.
    pub fn assemble(&mut self, sample_rate: f64) -> GraphResult<()> {
        if self.assembled {
            return Err(GraphError::AlreadyAssembled);
        }
        if self.output_node.is_none() {
            return Err(GraphError::NoOutput);
        }

        self.eval_order = self.topological_sort()?;
        self.sample_rate = sample_rate;

        for (node, buf) in self.nodes.iter_mut().zip(&mut self.buffers) {
            node.instance.as_node_mut().prepare(sample_rate, self.max_block);
            buf.clear();
        }
        self.silent.fill(true);
        self.assembled = true;

        log::info!(
            "Assembled audio graph: {} nodes, {} edges, block {} @ {} Hz",
            self.nodes.len(),
            self.edge_count(),
            self.max_block,
            sample_rate
        );

        Ok(())
    }

    /// Kahn's algorithm over port edges.
    fn topological_sort(&self) -> GraphResult<Vec<NodeId>> {
        let n = self.nodes.len();

        let mut in_degree = vec![0usize; n];
        let mut out_edges: Vec<Vec<NodeId>> = vec![Vec::new(); n];
        for (idx, node) in self.nodes.iter().enumerate() {
            for &src in node.inputs.iter().flatten() {
                in_degree[idx] += 1;
                out_edges[src].push(idx);
            }
        }

        let mut queue: VecDeque<NodeId> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            for &dependent in &out_edges[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() < n {
            let stuck = (0..n).find(|&i| in_degree[i] > 0).unwrap_or(0);
            return Err(GraphError::Cycle(stuck));
        }

        Ok(order)
    }

    /// Process one block of audio.
    ///
    /// Total: an unassembled graph renders nothing, oversize blocks are
    /// clamped to the configured block size.
    pub fn process(&mut self, frames: usize, sample_pos: u64) {
        if !self.assembled {
            return;
        }

        let frames = frames.min(self.max_block);
        let ctx = ProcessContext::new(frames, self.sample_rate, sample_pos);

        for i in 0..self.eval_order.len() {
            let idx = self.eval_order[i];

            // Taking the buffer out leaves an empty placeholder; no node reads
            // its own output, so the inputs below never see it.
            let mut output = std::mem::take(&mut self.buffers[idx]);
            output.set_frames(frames);

            let GraphNode { instance, inputs } = &mut self.nodes[idx];
            let ports = PortInputs::new(inputs, &self.buffers, &self.silent);
            let silent = instance.as_node_mut().process(&ctx, &ports, &mut output);

            self.buffers[idx] = output;
            self.silent[idx] = silent;
        }
    }

    /// Output buffer of the last processed block.
    pub fn output_buffer(&self) -> Option<&AudioBuffer> {
        if !self.assembled {
            return None;
        }
        self.output_node.and_then(|idx| self.buffers.get(idx))
    }

    /// Output buffer of any node after the last processed block.
    #[cfg(test)]
    pub(crate) fn node_output(&self, node: NodeId) -> Option<&AudioBuffer> {
        self.buffers.get(node)
    }

    pub fn voice(&self, node: NodeId) -> Option<&NoteVoice> {
        match &self.nodes.get(node)?.instance {
            NodeInstance::Voice(voice) => Some(voice),
            NodeInstance::Processor(_) => None,
        }
    }

    pub fn voice_mut(&mut self, node: NodeId) -> Option<&mut NoteVoice> {
        match &mut self.nodes.get_mut(node)?.instance {
            NodeInstance::Voice(voice) => Some(voice),
            NodeInstance::Processor(_) => None,
        }
    }

    /// Set a node-local parameter by graph index.
    #[inline]
    pub fn set_param(&mut self, node: NodeId, param_id: u32, value: f32) {
        if let Some(node) = self.nodes.get_mut(node) {
            node.instance.as_node_mut().set_param(param_id, value);
        }
    }

    /// Reset all nodes and clear buffers. Wiring is untouched.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.instance.as_node_mut().reset();
        }
        for buf in &mut self.buffers {
            buf.clear();
        }
        self.silent.fill(true);
    }

    pub fn is_assembled(&self) -> bool {
        self.assembled
    }

    pub fn is_silent(&self, node: NodeId) -> bool {
        self.silent.get(node).copied().unwrap_or(true)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn max_block(&self) -> usize {
        self.max_block
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn eval_order(&self) -> &[NodeId] {
        &self.eval_order
    }

    pub fn inputs_of(&self, node: NodeId) -> Option<&[Option<NodeId>]> {
        self.nodes.get(node).map(|n| n.inputs.as_slice())
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.inputs.iter().flatten().count()).sum()
    }
}
