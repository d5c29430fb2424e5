// src/nodes/filters.rs
//
// State Variable Filter (SVF), trapezoidal topology, low-pass output.

/// Low-pass State Variable Filter.
///
/// Stable under fast cutoff modulation, which the key-tracked voices and
/// the echo loop rely on.
#[derive(Debug, Clone)]
pub struct Svf {
    cutoff: f32,
    resonance: f32,

    // Filter state
    ic1eq: f32,
    ic2eq: f32,

    // Cached coefficients
    a1: f32,
    a2: f32,
    a3: f32,

    sample_rate: f32,
}

impl Svf {
    pub fn lowpass() -> Self {
        let mut svf = Self {
            cutoff: 1000.0,
            resonance: 0.5,
            ic1eq: 0.0,
            ic2eq: 0.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
            sample_rate: 44_100.0,
        };
        svf.recalc_coeffs();
        svf
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate as f32;
        self.recalc_coeffs();
    }

    pub fn set_cutoff(&mut self, cutoff: f32) {
        if cutoff != self.cutoff {
            self.cutoff = cutoff;
            self.recalc_coeffs();
        }
    }

    /// Resonance 0..1. Values near 1 ring, they never self-oscillate.
    pub fn set_resonance(&mut self, resonance: f32) {
        if resonance != self.resonance {
            self.resonance = resonance;
            self.recalc_coeffs();
        }
    }

    /// Resonance expressed as filter Q (0.5 = no peak, 0.707 = Butterworth).
    pub fn set_q(&mut self, q: f32) {
        self.set_resonance(1.0 - 0.5 / q.max(0.5));
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    fn recalc_coeffs(&mut self) {
        let cutoff = self.cutoff.clamp(20.0, (self.sample_rate * 0.49).max(20.0));
        let resonance = self.resonance.clamp(0.0, 0.99);

        let g = (std::f32::consts::PI * cutoff / self.sample_rate).tan();
        let k = 2.0 - 2.0 * resonance;
        self.a1 = 1.0 / (1.0 + g * (g + k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let v3 = input - self.ic2eq;
        let v1 = self.a1 * self.ic1eq + self.a2 * v3;
        let v2 = self.ic2eq + self.a2 * self.ic1eq + self.a3 * v3;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        v2
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}
