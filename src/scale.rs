// src/scale.rs
//
// Frequency tables for the key grid.

use crate::layer::{LAYER_KEYS, LAYER_ROWS, ROW_VOICES};

/// C3, the lowest root.
pub const C3: f32 = 130.81;

pub const ROOT_NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Eight ascending notes of one row, as semitones above the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalePattern {
    pub name: &'static str,
    pub semitones: [u8; ROW_VOICES],
}

pub const SCALE_PATTERNS: [ScalePattern; 12] = [
    ScalePattern { name: "Original", semitones: [0, 2, 4, 7, 9, 12, 14, 16] },
    ScalePattern { name: "Major", semitones: [0, 2, 4, 5, 7, 9, 11, 12] },
    ScalePattern { name: "Natural Minor", semitones: [0, 2, 3, 5, 7, 8, 10, 12] },
    ScalePattern { name: "Pentatonic Major", semitones: [0, 2, 4, 7, 9, 12, 14, 16] },
    ScalePattern { name: "Pentatonic Minor", semitones: [0, 3, 5, 7, 10, 12, 15, 17] },
    ScalePattern { name: "Blues", semitones: [0, 3, 5, 6, 7, 10, 12, 15] },
    ScalePattern { name: "Half-Whole Dim", semitones: [0, 1, 3, 4, 6, 7, 9, 10] },
    ScalePattern { name: "Whole-Half Dim", semitones: [0, 2, 3, 5, 6, 8, 9, 11] },
    ScalePattern { name: "Phrygian", semitones: [0, 1, 3, 5, 7, 8, 10, 12] },
    ScalePattern { name: "Hungarian Minor", semitones: [0, 2, 3, 6, 7, 8, 11, 12] },
    ScalePattern { name: "Locrian", semitones: [0, 1, 3, 5, 6, 8, 10, 12] },
    ScalePattern { name: "Chromatic", semitones: [0, 1, 2, 3, 4, 5, 6, 7] },
];

#[inline]
fn semitone_ratio(semitones: f32) -> f32 {
    2.0_f32.powf(semitones / 12.0)
}

/// Frequency of root `index` (0 = C3 .. 11 = B3). Wraps past B.
pub fn root_frequency(index: usize) -> f32 {
    C3 * semitone_ratio((index % ROOT_NOTE_NAMES.len()) as f32)
}

/// Root + pattern selection producing the 32-key frequency table.
///
/// Row `r` plays the pattern `2^r` octaves above the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScaleGenerator {
    root: usize,
    pattern: usize,
}

impl ScaleGenerator {
    /// Out-of-range indices wrap.
    pub fn new(root: usize, pattern: usize) -> Self {
        Self {
            root: root % ROOT_NOTE_NAMES.len(),
            pattern: pattern % SCALE_PATTERNS.len(),
        }
    }

    pub fn set_root(&mut self, root: usize) {
        self.root = root % ROOT_NOTE_NAMES.len();
    }

    pub fn set_pattern(&mut self, pattern: usize) {
        self.pattern = pattern % SCALE_PATTERNS.len();
    }

    /// Step the root by encoder `delta`, wrapping around the octave.
    pub fn nudge_root(&mut self, delta: i32) {
        let n = ROOT_NOTE_NAMES.len() as i32;
        self.root = (self.root as i32 + delta).rem_euclid(n) as usize;
    }

    pub fn nudge_pattern(&mut self, delta: i32) {
        let n = SCALE_PATTERNS.len() as i32;
        self.pattern = (self.pattern as i32 + delta).rem_euclid(n) as usize;
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn root_name(&self) -> &'static str {
        ROOT_NOTE_NAMES[self.root]
    }

    pub fn pattern(&self) -> &'static ScalePattern {
        &SCALE_PATTERNS[self.pattern]
    }

    pub fn generate(&self) -> [f32; LAYER_KEYS] {
        let root = root_frequency(self.root);
        let pattern = self.pattern();
        let mut freqs = [0.0; LAYER_KEYS];
        for row in 0..LAYER_ROWS {
            let octave = (1 << row) as f32;
            for (col, &st) in pattern.semitones.iter().enumerate() {
                freqs[row * ROW_VOICES + col] = root * semitone_ratio(st as f32) * octave;
            }
        }
        freqs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.05
    }

    #[test]
    fn default_is_c3_original() {
        let freqs = ScaleGenerator::default().generate();
        assert_eq!(freqs[0], C3);
        // D3, E3, G3, A3
        assert!(close(freqs[1], 146.83));
        assert!(close(freqs[2], 164.81));
        assert!(close(freqs[3], 196.00));
        assert!(close(freqs[4], 220.00));
        assert!(close(freqs[5], 261.62));
    }

    #[test]
    fn rows_step_by_octave_multipliers() {
        let freqs = ScaleGenerator::new(9, 1).generate();
        for col in 0..ROW_VOICES {
            assert!(close(freqs[8 + col], freqs[col] * 2.0));
            assert!(close(freqs[16 + col], freqs[col] * 4.0));
            assert!(close(freqs[24 + col], freqs[col] * 8.0));
        }
        assert!(close(freqs[0], 220.0));
    }

    #[test]
    fn rows_ascend() {
        for p in 0..SCALE_PATTERNS.len() {
            let freqs = ScaleGenerator::new(0, p).generate();
            for row in freqs.chunks(ROW_VOICES) {
                assert!(row.windows(2).all(|w| w[1] > w[0]), "{}", SCALE_PATTERNS[p].name);
            }
        }
    }

    #[test]
    fn nudges_wrap() {
        let mut g = ScaleGenerator::default();
        g.nudge_root(-1);
        assert_eq!(g.root_name(), "B");
        g.nudge_pattern(13);
        assert_eq!(g.pattern().name, "Major");
        assert!(close(root_frequency(12), C3));
    }
}
