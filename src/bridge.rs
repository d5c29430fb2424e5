//! Bridge between the control loop and the audio callback.
//!
//! # Architecture
//!
//! - **Control loop** owns [`ControlHandle`]: key presses, scale and layer
//!   changes, parameter edits, telemetry reads
//! - **Audio callback** owns [`AudioHandle`] with the [`Instrument`]
//! - Structural commands travel through a wait-free SPSC ring buffer
//!   (`rtrb`) and are applied at block boundaries
//! - Continuous parameters skip the queue: both sides hold the same
//!   [`Settings`] registry, whose values are atomic scalars
//! - Telemetry flows back through atomics
//!
//! # Usage
//!
//! ```ignore
//! let (mut control, mut audio) = create_bridge(instrument, 256);
//!
//! // Control loop
//! control.note_on(3)?;
//! control.settings().set("crusher.bits", 8.0)?;
//!
//! // Audio callback
//! audio.process(&mut left, &mut right);
//! ```

use std::fmt;
use std::sync::{
    Arc,
    atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering},
};

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::event::Command;
use crate::instrument::Instrument;
use crate::layer::LAYER_KEYS;
use crate::state::{Settings, SettingsError};

/// Error on the control side of the bridge. The audio side has none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BridgeError {
    /// The queue was full; the command was dropped.
    QueueFull(Command),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::QueueFull(cmd) => write!(f, "Command queue full, dropped {}", cmd.name()),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Snapshot of what the audio side last published.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Telemetry {
    pub blocks: u64,
    pub frames: u64,
    pub active_voices: usize,
    pub current_layer: usize,
    pub peaks: [f32; 2],
    pub dropped_commands: u64,
}

/// Lock-free shared state. Single writer per field.
struct SharedTelemetry {
    blocks: AtomicU64,
    frames: AtomicU64,
    active_voices: AtomicUsize,
    current_layer: AtomicUsize,
    /// f32 bits
    peak_left: AtomicU32,
    peak_right: AtomicU32,
    /// Written by the control side
    dropped_commands: AtomicU64,
}

impl SharedTelemetry {
    fn new(current_layer: usize) -> Self {
        Self {
            blocks: AtomicU64::new(0),
            frames: AtomicU64::new(0),
            active_voices: AtomicUsize::new(0),
            current_layer: AtomicUsize::new(current_layer),
            peak_left: AtomicU32::new(0.0_f32.to_bits()),
            peak_right: AtomicU32::new(0.0_f32.to_bits()),
            dropped_commands: AtomicU64::new(0),
        }
    }
}

/// Handle for the control loop.
pub struct ControlHandle {
    producer: Producer<Command>,
    settings: Settings,
    telemetry: Arc<SharedTelemetry>,
    layer_count: usize,
}

/// Handle for the audio callback. Owns the instrument.
pub struct AudioHandle {
    instrument: Instrument,
    consumer: Consumer<Command>,
    telemetry: Arc<SharedTelemetry>,
}

/// Split an instrument into its control and audio sides.
///
/// `capacity` is the number of commands that may be in flight between
/// two audio blocks.
pub fn create_bridge(instrument: Instrument, capacity: usize) -> (ControlHandle, AudioHandle) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    let telemetry = Arc::new(SharedTelemetry::new(instrument.current_layer()));

    let control = ControlHandle {
        producer,
        settings: instrument.settings().clone(),
        telemetry: Arc::clone(&telemetry),
        layer_count: instrument.layer_count(),
    };

    let audio = AudioHandle {
        instrument,
        consumer,
        telemetry,
    };

    (control, audio)
}

// ═══════════════════════════════════════════════════════════════════
// ControlHandle - control loop API
// ═══════════════════════════════════════════════════════════════════

impl ControlHandle {
    /// Queue a command for the next audio block.
    pub fn send(&mut self, cmd: Command) -> Result<(), BridgeError> {
        match self.producer.push(cmd) {
            Ok(()) => Ok(()),
            Err(PushError::Full(cmd)) => {
                self.telemetry.dropped_commands.fetch_add(1, Ordering::Relaxed);
                log::warn!("Command queue full, dropping {}", cmd.name());
                Err(BridgeError::QueueFull(cmd))
            }
        }
    }

    pub fn note_on(&mut self, index: usize) -> Result<(), BridgeError> {
        self.send(Command::NoteOn { index })
    }

    pub fn note_off(&mut self, index: usize) -> Result<(), BridgeError> {
        self.send(Command::NoteOff { index })
    }

    pub fn set_scale(&mut self, frequencies: &[f32; LAYER_KEYS]) -> Result<(), BridgeError> {
        self.send(Command::SetScale {
            frequencies: *frequencies,
        })
    }

    pub fn select_layer(&mut self, layer: usize) -> Result<(), BridgeError> {
        self.send(Command::SelectLayer { layer })
    }

    pub fn select_voice(&mut self, row: usize, voice: usize) -> Result<(), BridgeError> {
        self.send(Command::SelectVoice { row, voice })
    }

    pub fn all_notes_off(&mut self) -> Result<(), BridgeError> {
        self.send(Command::AllNotesOff)
    }

    pub fn reset(&mut self) -> Result<(), BridgeError> {
        self.send(Command::Reset)
    }

    /// The instrument's parameter registry. Writes are seen by the next block.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Set a parameter by key. Returns the clamped value.
    pub fn set_param(&self, key: &str, value: f32) -> Result<f32, SettingsError> {
        self.settings.set(key, value)
    }

    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    /// Free slots in the command queue.
    pub fn queue_space(&self) -> usize {
        self.producer.slots()
    }

    pub fn telemetry(&self) -> Telemetry {
        let t = &self.telemetry;
        Telemetry {
            blocks: t.blocks.load(Ordering::Relaxed),
            frames: t.frames.load(Ordering::Relaxed),
            active_voices: t.active_voices.load(Ordering::Relaxed),
            current_layer: t.current_layer.load(Ordering::Relaxed),
            peaks: [
                f32::from_bits(t.peak_left.load(Ordering::Relaxed)),
                f32::from_bits(t.peak_right.load(Ordering::Relaxed)),
            ],
            dropped_commands: t.dropped_commands.load(Ordering::Relaxed),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// AudioHandle - audio callback API
// ═══════════════════════════════════════════════════════════════════

impl AudioHandle {
    /// Apply queued commands, render one block, publish telemetry.
    ///
    /// Never blocks or allocates.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.drain_commands();
        self.instrument.process_block(left, right);
        self.publish(left, right);
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.consumer.pop() {
            match cmd {
                Command::NoteOn { index } => self.instrument.note_on(index),
                Command::NoteOff { index } => self.instrument.note_off(index),
                Command::SetScale { frequencies } => self.instrument.set_scale(&frequencies),
                Command::SelectLayer { layer } => self.instrument.select_layer(layer),
                Command::SelectVoice { row, voice } => self.instrument.select_voice(row, voice),
                Command::AllNotesOff => self.instrument.all_notes_off(),
                Command::Reset => self.instrument.reset(),
            }
        }
    }

    fn publish(&self, left: &[f32], right: &[f32]) {
        let peak = |buf: &[f32]| buf.iter().fold(0.0_f32, |p, s| p.max(s.abs()));
        let frames = left.len().min(right.len()) as u64;
        let t = &self.telemetry;

        t.peak_left.store(peak(left).to_bits(), Ordering::Relaxed);
        t.peak_right.store(peak(right).to_bits(), Ordering::Relaxed);
        t.active_voices.store(self.instrument.active_voices(), Ordering::Relaxed);
        t.current_layer.store(self.instrument.current_layer(), Ordering::Relaxed);
        t.frames.fetch_add(frames, Ordering::Relaxed);
        t.blocks.fetch_add(1, Ordering::Release);
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn instrument_mut(&mut self) -> &mut Instrument {
        &mut self.instrument
    }
}
