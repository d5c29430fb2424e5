// Basic oscillators used inside tonal voices.

use std::f32::consts::TAU;

/// Oscillator waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Waveform {
    Sine,
    /// Naive, non-bandlimited
    Saw,
    Square,
    #[default]
    Triangle,
}

/// Phase-accumulator oscillator.
///
/// Frequency changes keep the current phase, so pitch updates never click.
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    phase: f32,
    freq: f32,
    amplitude: f32,
    sample_rate: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform, amplitude: f32) -> Self {
        Self {
            waveform,
            phase: 0.0,
            freq: 440.0,
            amplitude,
            sample_rate: 44_100.0,
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate as f32;
    }

    #[inline]
    pub fn set_frequency(&mut self, freq: f32) {
        let nyquist = self.sample_rate * 0.5;
        self.freq = freq.clamp(0.0, nyquist);
    }

    pub fn frequency(&self) -> f32 {
        self.freq
    }

    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude.clamp(0.0, 1.0);
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn reset_phase(&mut self) {
        self.phase = 0.0;
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let p = self.phase;
        let raw = match self.waveform {
            Waveform::Sine => (p * TAU).sin(),
            Waveform::Saw => 2.0 * p - 1.0,
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
        };

        self.phase += self.freq / self.sample_rate;
        self.phase -= self.phase.floor();

        raw * self.amplitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(osc: &mut Oscillator, n: usize) -> Vec<f32> {
        (0..n).map(|_| osc.next_sample()).collect()
    }

    #[test]
    fn output_is_bounded_by_amplitude() {
        for waveform in [Waveform::Sine, Waveform::Saw, Waveform::Square, Waveform::Triangle] {
            let mut osc = Oscillator::new(waveform, 0.5);
            osc.prepare(44_100.0);
            osc.set_frequency(440.0);
            let peak = render(&mut osc, 2000).iter().fold(0.0_f32, |a, s| a.max(s.abs()));
            assert!(peak <= 0.5 + 1e-6, "{:?} peaked at {}", waveform, peak);
            assert!(peak > 0.4, "{:?} too quiet", waveform);
        }
    }

    #[test]
    fn period_matches_frequency() {
        let mut osc = Oscillator::new(Waveform::Square, 1.0);
        osc.prepare(1000.0);
        osc.set_frequency(100.0);
        let out = render(&mut osc, 20);
        // 10 samples per period: 5 high, 5 low
        assert_eq!(&out[..5], &[1.0; 5]);
        assert_eq!(&out[5..10], &[-1.0; 5]);
        assert_eq!(out[10], 1.0);
    }

    #[test]
    fn frequency_is_clamped_to_nyquist() {
        let mut osc = Oscillator::new(Waveform::Sine, 1.0);
        osc.prepare(44_100.0);
        osc.set_frequency(100_000.0);
        assert_eq!(osc.frequency(), 22_050.0);
        osc.set_frequency(-5.0);
        assert_eq!(osc.frequency(), 0.0);
    }
}
