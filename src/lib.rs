// src/lib.rs
//
// Polyphonic multi-layer key-grid instrument.

mod audio_buffer;
mod bridge;
mod chain;
mod config;
mod error;
mod event;
mod graph;
mod instrument;
mod layer;
mod node;
mod parameter;
mod poly_synth;
mod scale;
mod voice;
mod voice_allocator;

pub mod nodes;
pub mod state;

pub use audio_buffer::AudioBuffer;
pub use bridge::{AudioHandle, BridgeError, ControlHandle, Telemetry, create_bridge};
pub use chain::{ChainSpec, FilterChain, MasterChain, StageKind};
pub use config::{
    ChorusConfig, CrusherConfig, DelayConfig, DynamicsConfig, EchoConfig, EngineConfig, EnvelopeConfig,
};
pub use error::BuildError;
pub use event::Command;
pub use graph::{Graph, GraphError, GraphResult, NodeId, NodeInstance};
pub use instrument::{Instrument, SAMPLE_PITCHES, default_layers};
pub use layer::{LAYER_KEYS, LAYER_ROWS, Layer, LayerSpec, ROW_VOICES, Row, RowSpec, VoiceFactory};
pub use node::{Node, PortInputs, ProcessContext};
pub use parameter::SharedParam;
pub use poly_synth::{POLY_VOICES, PolySynth};
pub use scale::{ROOT_NOTE_NAMES, SCALE_PATTERNS, ScaleGenerator, ScalePattern, root_frequency};
pub use voice::{NoteVoice, Voice, VoiceState};
pub use voice_allocator::{Allocation, VoiceAllocator};
