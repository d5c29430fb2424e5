// src/event.rs

use crate::layer::LAYER_KEYS;

/// A structural change sent from the control loop to the audio callback.
///
/// These commands:
/// - are `Copy`, so queueing them never allocates
/// - are applied at the next block boundary, in send order
/// - carry key indices, never node ids
///
/// Continuous parameters do not travel as commands; they are written
/// straight into the settings registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    NoteOn { index: usize },

    NoteOff { index: usize },

    SetScale { frequencies: [f32; LAYER_KEYS] },

    SelectLayer { layer: usize },

    /// Switch the timbre of one row of the current layer.
    SelectVoice { row: usize, voice: usize },

    /// Release every key of the current layer.
    AllNotesOff,

    /// Stop everything and clear effect tails.
    Reset,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::NoteOn { .. } => "NoteOn",
            Command::NoteOff { .. } => "NoteOff",
            Command::SetScale { .. } => "SetScale",
            Command::SelectLayer { .. } => "SelectLayer",
            Command::SelectVoice { .. } => "SelectVoice",
            Command::AllNotesOff => "AllNotesOff",
            Command::Reset => "Reset",
        }
    }
}
