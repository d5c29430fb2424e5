// src/voice_allocator.rs

/// Result of a note-on: the voice to trigger and the note it was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub voice: usize,
    /// Note that was still held on the voice and is now silenced
    pub stolen: Option<usize>,
    /// The note was already held on this voice
    pub retrigger: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    note: Option<usize>,
    start_time: u64,
    /// Trigger order, breaks ties between equal start times
    serial: u64,
}

impl Slot {
    fn is_active(&self) -> bool {
        self.note.is_some()
    }
}

/// Maps notes onto a fixed pool of voices.
///
/// On note-on: reuse the voice already holding the note, else the
/// lowest-indexed free voice, else steal the voice started earliest.
/// Note-off frees the voice immediately; its release tail keeps sounding
/// but the slot can be reassigned.
///
/// Does NOT:
/// - own DSP state
/// - allocate after construction
#[derive(Debug, Clone)]
pub struct VoiceAllocator {
    slots: Vec<Slot>,
    next_serial: u64,
}

impl VoiceAllocator {
    pub fn new(max_voices: usize) -> Self {
        Self {
            slots: vec![Slot::default(); max_voices],
            next_serial: 0,
        }
    }

    /// Bind `note` to a voice at time `now_ms`. `None` only for an empty pool.
    pub fn note_on(&mut self, note: usize, now_ms: u64) -> Option<Allocation> {
        let (voice, retrigger) = match self.find(note) {
            Some(v) => (v, true),
            None => (self.find_free().or_else(|| self.find_oldest())?, false),
        };

        let slot = &mut self.slots[voice];
        let stolen = if retrigger { None } else { slot.note };
        slot.note = Some(note);
        slot.start_time = now_ms;
        slot.serial = self.next_serial;
        self.next_serial += 1;

        Some(Allocation {
            voice,
            stolen,
            retrigger,
        })
    }

    /// Free the voice holding `note`. Returns it, or `None` if the note was
    /// already stolen or never held.
    pub fn note_off(&mut self, note: usize) -> Option<usize> {
        let voice = self.find(note)?;
        self.slots[voice].note = None;
        Some(voice)
    }

    /// Free every voice.
    pub fn reset(&mut self) {
        self.slots.fill(Slot::default());
    }

    pub fn voice_for(&self, note: usize) -> Option<usize> {
        self.find(note)
    }

    pub fn note_of(&self, voice: usize) -> Option<usize> {
        self.slots.get(voice).and_then(|s| s.note)
    }

    pub fn start_time(&self, voice: usize) -> Option<u64> {
        self.slots.get(voice).filter(|s| s.is_active()).map(|s| s.start_time)
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_active()).count()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn find(&self, note: usize) -> Option<usize> {
        self.slots.iter().position(|s| s.note == Some(note))
    }

    fn find_free(&self) -> Option<usize> {
        self.slots.iter().position(|s| !s.is_active())
    }

    fn find_oldest(&self) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| (s.start_time, s.serial))
            .map(|(i, _)| i)
    }
}
