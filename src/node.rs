// src/node.rs

use crate::audio_buffer::AudioBuffer;
use crate::graph::NodeId;

/// Context passed to nodes during processing.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext {
    /// Number of frames to process
    pub frames: usize,

    /// Sample rate
    pub sample_rate: f64,

    /// Absolute position of the first frame of this block
    pub sample_pos: u64,
}

impl ProcessContext {
    pub fn new(frames: usize, sample_rate: f64, sample_pos: u64) -> Self {
        Self {
            frames,
            sample_rate,
            sample_pos,
        }
    }
}

/// Read-only view of a node's wired input ports for one block.
///
/// Port `i` resolves to the output buffer of whatever node was connected to
/// it during assembly. Unconnected ports and ports whose source reported
/// silence both resolve to `None`.
#[derive(Clone, Copy)]
pub struct PortInputs<'a> {
    ports: &'a [Option<NodeId>],
    buffers: &'a [AudioBuffer],
    silent: &'a [bool],
}

impl<'a> PortInputs<'a> {
    pub(crate) fn new(
        ports: &'a [Option<NodeId>],
        buffers: &'a [AudioBuffer],
        silent: &'a [bool],
    ) -> Self {
        Self {
            ports,
            buffers,
            silent,
        }
    }

    /// An input view with no ports, for driving nodes outside a graph.
    pub fn none() -> PortInputs<'static> {
        PortInputs {
            ports: &[],
            buffers: &[],
            silent: &[],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Buffer feeding `port`, or `None` when unconnected or silent.
    #[inline]
    pub fn port(&self, port: usize) -> Option<&'a AudioBuffer> {
        let src = (*self.ports.get(port)?)?;
        if self.silent.get(src).copied().unwrap_or(true) {
            return None;
        }
        self.buffers.get(src)
    }

    /// Left/right view of `port`, mono sources up-mixed.
    #[inline]
    pub fn stereo(&self, port: usize) -> Option<(&'a [f32], &'a [f32])> {
        let buf = self.port(port)?;
        Some((buf.upmixed(0), buf.upmixed(1)))
    }

    /// True when no port carries sound this block.
    pub fn all_silent(&self) -> bool {
        (0..self.ports.len()).all(|p| self.port(p).is_none())
    }
}

/// Core DSP node trait.
///
/// Nodes:
/// - do NOT know about scheduling
/// - do NOT allocate in `process`
/// - ONLY process audio for the given context
pub trait Node: Send {
    /// Called once during graph assembly, before any audio flows.
    fn prepare(&mut self, sample_rate: f64, max_block: usize);

    /// Process one block.
    ///
    /// The graph guarantees every upstream node has already run for this
    /// block. `output.frames == ctx.frames`.
    ///
    /// Returns `true` if the output is silent (optimization hint).
    fn process(&mut self, ctx: &ProcessContext, inputs: &PortInputs, output: &mut AudioBuffer)
    -> bool;

    /// Number of input ports.
    fn num_inputs(&self) -> usize;

    /// Number of output channels.
    fn num_channels(&self) -> usize;

    /// Set a node-local parameter. Audio-thread only.
    fn set_param(&mut self, _param_id: u32, _value: f32) {}

    /// Clear internal state (delay lines, filter memories).
    fn reset(&mut self) {}
}
