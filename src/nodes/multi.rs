// Composite voice that multiplexes between several sub-voices.

use crate::voice::{NoteVoice, Voice, VoiceState};

/// Several voices behind one key; only the selected one is routed.
///
/// Unselected sub-voices stay disabled, so they cost nothing and cannot
/// leak a release tail into the output.
pub struct MultiVoice {
    voices: Vec<NoteVoice>,
    selected: usize,
    enabled: bool,
}

impl MultiVoice {
    pub fn new(voices: Vec<NoteVoice>) -> Self {
        let mut multi = Self {
            voices,
            selected: 0,
            enabled: true,
        };
        multi.route();
        multi
    }

    /// Switch the routed sub-voice. Every sub-voice is silenced first.
    /// Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) {
        if index >= self.voices.len() {
            return;
        }
        self.selected = index;
        self.route();
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn voices(&self) -> &[NoteVoice] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [NoteVoice] {
        &mut self.voices
    }

    fn route(&mut self) {
        for voice in &mut self.voices {
            voice.disable();
        }
        if self.enabled {
            if let Some(voice) = self.voices.get_mut(self.selected) {
                voice.enable();
            }
        }
    }
}

impl Voice for MultiVoice {
    fn prepare(&mut self, sample_rate: f64, max_block: usize) {
        for voice in &mut self.voices {
            Voice::prepare(voice, sample_rate, max_block);
        }
    }

    fn begin(&mut self) {
        for voice in &mut self.voices {
            voice.begin();
        }
        self.route();
    }

    fn note_on(&mut self) {
        if !self.enabled {
            return;
        }
        if let Some(voice) = self.voices.get_mut(self.selected) {
            voice.note_on();
        }
    }

    fn note_off(&mut self) {
        if let Some(voice) = self.voices.get_mut(self.selected) {
            voice.note_off();
        }
    }

    /// Ungate the selected sub-voice only. A held note keeps sounding.
    fn enable(&mut self) {
        self.enabled = true;
        if let Some(voice) = self.voices.get_mut(self.selected) {
            voice.enable();
        }
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.route();
    }

    fn set_frequency(&mut self, freq: f32) {
        for voice in &mut self.voices {
            voice.set_frequency(freq);
        }
    }

    fn frequency(&self) -> f32 {
        self.voices.get(self.selected).map_or(0.0, |v| v.frequency())
    }

    fn state(&self) -> VoiceState {
        self.voices.get(self.selected).map_or(VoiceState::Idle, |v| v.state())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn render(&mut self, out: &mut [f32]) -> bool {
        match self.voices.get_mut(self.selected) {
            Some(voice) if self.enabled => voice.render(out),
            _ => {
                out.fill(0.0);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multi() -> MultiVoice {
        let mut m = MultiVoice::new(vec![
            NoteVoice::plucked(1),
            NoteVoice::soft_triangle(),
            NoteVoice::detuned(),
        ]);
        m.prepare(44_100.0, 64);
        m.begin();
        m.set_frequency(220.0);
        m
    }

    #[test]
    fn only_selected_sub_voice_is_enabled() {
        let m = multi();
        let enabled: Vec<bool> = m.voices().iter().map(|v| v.is_enabled()).collect();
        assert_eq!(enabled, [true, false, false]);
    }

    #[test]
    fn select_silences_everything() {
        let mut m = multi();
        m.note_on();
        assert_eq!(m.state(), VoiceState::Sounding);

        m.select(2);
        assert_eq!(m.selected(), 2);
        assert!(m.voices().iter().all(|v| v.state() == VoiceState::Idle));
        assert!(m.voices()[2].is_enabled());

        m.note_on();
        assert_eq!(m.voices()[2].state(), VoiceState::Sounding);
        assert_eq!(m.voices()[0].state(), VoiceState::Idle);
    }

    #[test]
    fn enable_keeps_held_note() {
        let mut m = multi();
        m.note_on();
        m.enable();
        assert_eq!(m.state(), VoiceState::Sounding);

        let mut out = [0.0; 64];
        assert!(!m.render(&mut out));
        assert!(out.iter().any(|s| *s != 0.0));
        let enabled: Vec<bool> = m.voices().iter().map(|v| v.is_enabled()).collect();
        assert_eq!(enabled, [true, false, false]);
    }

    #[test]
    fn enable_after_disable_routes_selected_only() {
        let mut m = multi();
        m.select(1);
        m.disable();
        m.enable();
        let enabled: Vec<bool> = m.voices().iter().map(|v| v.is_enabled()).collect();
        assert_eq!(enabled, [false, true, false]);
    }

    #[test]
    fn out_of_range_select_is_ignored() {
        let mut m = multi();
        m.select(7);
        assert_eq!(m.selected(), 0);
    }

    #[test]
    fn frequency_reaches_every_sub_voice() {
        let m = multi();
        assert!(m.voices().iter().all(|v| (v.frequency() - 220.0).abs() < 1e-3));
    }

    #[test]
    fn disabled_multi_stays_disabled_across_select() {
        let mut m = multi();
        m.disable();
        m.select(1);
        assert!(m.voices().iter().all(|v| !v.is_enabled()));
        m.note_on();
        assert_eq!(m.state(), VoiceState::Idle);
    }
}
