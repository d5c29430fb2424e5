// src/state/mod.rs
//
// Control-side state: parameter metadata and the settings registry the
// menu layer iterates.
//
// Key principles:
// - Parameters are registered once, while the graph is built
// - The control loop writes, the audio callback reads once per block
// - Nothing here can change the graph structure

mod param_info;
mod settings;

pub use param_info::*;
pub use settings::*;
