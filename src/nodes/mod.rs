// src/nodes/mod.rs
//
// DSP building blocks, voice implementations and chain stages.

mod chorus;
mod crusher;
mod dynamics;
mod echo;
mod effects;
mod envelope;
mod filters;
mod mixer;
mod multi;
mod oscillators;
mod sampler;
mod string;
mod tonal;

pub use chorus::*;
pub use crusher::*;
pub use dynamics::*;
pub use echo::*;
pub use effects::*;
pub use envelope::*;
pub use filters::*;
pub use mixer::*;
pub use multi::*;
pub use oscillators::*;
pub use sampler::*;
pub use string::*;
pub use tonal::*;
