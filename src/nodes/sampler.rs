// Variable-speed sample playback.

use std::f32::consts::TAU;
use std::sync::Arc;

use crate::voice::{Voice, VoiceState};

/// How far into a sample the click-avoiding start search may look.
pub const ZERO_CROSSING_WINDOW: usize = 600;

/// Lowest playback pitch. Keeps the read head moving so playback always ends.
pub const MIN_PLAYBACK_FREQ: f32 = 1.0;

const I16_SCALE: f32 = 1.0 / 32_768.0;

/// Immutable 16-bit sample shared between voices.
#[derive(Debug, Clone)]
pub struct SampleData {
    samples: Arc<[i16]>,
    reference_freq: f32,
}

impl SampleData {
    pub fn new(samples: Arc<[i16]>, reference_freq: f32) -> Self {
        Self {
            samples,
            reference_freq,
        }
    }

    /// A decaying harmonic tone pitched at `reference_freq`, for hosts
    /// without recorded material.
    pub fn synthesize(reference_freq: f32, sample_rate: f32, seconds: f32) -> Self {
        let frames = (sample_rate * seconds).max(1.0) as usize;
        let samples: Vec<i16> = (0..frames)
            .map(|i| {
                let t = i as f32 / sample_rate;
                let phase = TAU * reference_freq * t;
                let tone = phase.sin() + 0.5 * (2.0 * phase).sin() + 0.25 * (3.0 * phase).sin();
                let decay = (-3.0 * t / seconds.max(1e-3)).exp();
                (tone / 1.75 * decay * 0.8 * 32_767.0) as i16
            })
            .collect();
        Self::new(Arc::from(samples), reference_freq)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn reference_freq(&self) -> f32 {
        self.reference_freq
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True if both refer to the same buffer.
    pub fn shares_buffer(&self, other: &SampleData) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }
}

/// Ordered set of samples to pick from by pitch.
#[derive(Debug, Clone, Default)]
pub struct SampleBank {
    samples: Vec<SampleData>,
}

impl SampleBank {
    pub fn new(samples: Vec<SampleData>) -> Self {
        Self { samples }
    }

    /// Index of the sample whose reference pitch is closest to `freq`.
    /// Ties go to the lower index.
    pub fn nearest_index(&self, freq: f32) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, s) in self.samples.iter().enumerate() {
            let distance = (s.reference_freq - freq).abs();
            match best {
                Some((_, d)) if distance >= d => {}
                _ => best = Some((i, distance)),
            }
        }
        best.map(|(i, _)| i)
    }

    pub fn nearest(&self, freq: f32) -> Option<&SampleData> {
        self.nearest_index(freq).and_then(|i| self.samples.get(i))
    }

    pub fn get(&self, index: usize) -> Option<&SampleData> {
        self.samples.get(index)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Scan the first `window` samples for an exact zero or a sign change.
///
/// Returns the index to start playback from: the zero, the first sample
/// after the sign change, or 0 if neither occurs inside the window. At
/// most `window` samples are inspected and the result is always inside
/// the buffer (0 for an empty one).
pub fn find_zero_crossing(samples: &[i16], window: usize) -> usize {
    let limit = window.min(samples.len());
    for i in 0..limit {
        let s = samples[i];
        if s == 0 {
            return i;
        }
        if let Some(&next) = samples.get(i + 1) {
            if i + 1 < limit && (s < 0) != (next < 0) {
                return i + 1;
            }
        }
    }
    0
}

/// What note-off does to a sounding sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleRelease {
    /// Keep streaming until the sample is exhausted.
    #[default]
    PlayToCompletion,
    /// Cut immediately.
    Stop,
    /// Linear fade over the given milliseconds.
    Fade(f32),
}

/// Plays a [`SampleData`] at `freq / reference` speed with linear
/// interpolation.
pub struct SampleVoice {
    sample: SampleData,
    release: SampleRelease,
    position: f64,
    speed: f64,
    freq: f32,
    fade_gain: f32,
    fade_step: f32,
    sample_rate: f32,
    state: VoiceState,
    enabled: bool,
}

impl SampleVoice {
    pub fn new(sample: SampleData) -> Self {
        Self::with_release(sample, SampleRelease::default())
    }

    pub fn with_release(sample: SampleData, release: SampleRelease) -> Self {
        let freq = sample.reference_freq;
        Self {
            sample,
            release,
            position: 0.0,
            speed: 1.0,
            freq,
            fade_gain: 1.0,
            fade_step: 0.0,
            sample_rate: 44_100.0,
            state: VoiceState::Idle,
            enabled: true,
        }
    }

    /// Replace the sample. Playback stops only if the buffer changes.
    pub fn set_sample(&mut self, sample: SampleData) {
        if !self.sample.shares_buffer(&sample) {
            self.stop();
        }
        self.sample = sample;
    }

    pub fn sample(&self) -> &SampleData {
        &self.sample
    }

    pub fn set_release(&mut self, release: SampleRelease) {
        self.release = release;
    }

    pub fn release(&self) -> SampleRelease {
        self.release
    }

    /// Playback speed computed at the last note-on.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    fn stop(&mut self) {
        self.state = VoiceState::Idle;
        self.position = 0.0;
        self.fade_gain = 1.0;
        self.fade_step = 0.0;
    }
}

impl Voice for SampleVoice {
    fn prepare(&mut self, sample_rate: f64, _max_block: usize) {
        self.sample_rate = sample_rate as f32;
    }

    fn begin(&mut self) {
        self.stop();
    }

    fn note_on(&mut self) {
        if !self.enabled || self.sample.is_empty() {
            return;
        }
        let reference = self.sample.reference_freq;
        self.speed = if reference > 0.0 {
            (self.freq / reference) as f64
        } else {
            1.0
        };
        self.position = find_zero_crossing(self.sample.samples(), ZERO_CROSSING_WINDOW) as f64;
        self.fade_gain = 1.0;
        self.fade_step = 0.0;
        self.state = VoiceState::Sounding;
    }

    fn note_off(&mut self) {
        if self.state != VoiceState::Sounding {
            return;
        }
        match self.release {
            SampleRelease::PlayToCompletion => self.state = VoiceState::Releasing,
            SampleRelease::Stop => self.stop(),
            SampleRelease::Fade(ms) => {
                let samples = (ms.max(0.0) * 0.001 * self.sample_rate).max(1.0);
                self.fade_step = 1.0 / samples;
                self.state = VoiceState::Releasing;
            }
        }
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.stop();
    }

    fn set_frequency(&mut self, freq: f32) {
        // NaN lands on the floor too
        self.freq = freq.max(MIN_PLAYBACK_FREQ);
    }

    fn frequency(&self) -> f32 {
        self.freq
    }

    fn state(&self) -> VoiceState {
        self.state
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn render(&mut self, out: &mut [f32]) -> bool {
        if !self.enabled || self.state == VoiceState::Idle {
            out.fill(0.0);
            return true;
        }

        let data = self.sample.samples();
        let last = data.len().saturating_sub(1);
        let mut written = 0;

        for sample in out.iter_mut() {
            if self.position > last as f64 || self.fade_gain <= 0.0 {
                break;
            }

            let idx = self.position as usize;
            let frac = (self.position - idx as f64) as f32;
            let a = data[idx] as f32;
            let b = data[(idx + 1).min(last)] as f32;

            *sample = (a + (b - a) * frac) * I16_SCALE * self.fade_gain;
            self.position += self.speed;
            self.fade_gain -= self.fade_step;
            written += 1;
        }

        if written < out.len() {
            out[written..].fill(0.0);
            self.stop();
        }

        written == 0
    }
}
