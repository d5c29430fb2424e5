// Gain and delay stages, plus the delay line shared by the time-based effects.

use crate::audio_buffer::AudioBuffer;
use crate::config::DelayConfig;
use crate::node::{Node, PortInputs, ProcessContext};
use crate::parameter::SharedParam;
use crate::state::{ParamInfo, ParamUnit, Settings, SettingsError};

// ═══════════════════════════════════════════════════════════════════
// Delay line
// ═══════════════════════════════════════════════════════════════════

/// Ring buffer read at integer or fractional offsets behind the write head.
#[derive(Debug, Clone, Default)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write: usize,
}

impl DelayLine {
    /// Size for delays up to `max_samples`. Build phase only.
    pub fn allocate(&mut self, max_samples: usize) {
        self.buffer = vec![0.0; max_samples + 1];
        self.write = 0;
    }

    pub fn max_delay(&self) -> usize {
        self.buffer.len().saturating_sub(1)
    }

    /// Sample written `delay` pushes ago (0 = the most recent one).
    #[inline]
    pub fn read(&self, delay: usize) -> f32 {
        let len = self.buffer.len();
        if len == 0 {
            return 0.0;
        }
        let delay = delay.min(len - 1);
        self.buffer[(self.write + len - 1 - delay) % len]
    }

    /// Linear interpolation between neighbouring integer delays.
    #[inline]
    pub fn read_frac(&self, delay: f32) -> f32 {
        let delay = delay.max(0.0);
        let whole = delay as usize;
        let frac = delay - whole as f32;
        let a = self.read(whole);
        let b = self.read(whole + 1);
        a + (b - a) * frac
    }

    #[inline]
    pub fn push(&mut self, sample: f32) {
        if self.buffer.is_empty() {
            return;
        }
        self.buffer[self.write] = sample;
        self.write = (self.write + 1) % self.buffer.len();
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write = 0;
    }
}

#[inline]
pub(crate) fn ms_to_samples(ms: f32, sample_rate: f64) -> f32 {
    ms.max(0.0) * 0.001 * sample_rate as f32
}

#[inline]
pub(crate) fn input_at(input: Option<&[f32]>, i: usize) -> f32 {
    input.map_or(0.0, |buf| buf[i])
}

// ═══════════════════════════════════════════════════════════════════
// Gain Stage
// ═══════════════════════════════════════════════════════════════════

/// Master gain. Changes ramp across one block.
pub struct GainStage {
    gain: SharedParam,
    current: f32,
}

impl GainStage {
    pub const DEFAULT_GAIN: f32 = 0.7;

    pub fn register(settings: &mut Settings, prefix: &str, gain: f32) -> Result<Self, SettingsError> {
        let gain = settings.register(
            ParamInfo::new(format!("{prefix}.level"), "Gain")
                .range(0.0, 2.0)
                .default(gain)
                .step(0.05),
        )?;
        Ok(Self::new(gain))
    }

    pub fn new(gain: SharedParam) -> Self {
        let current = gain.get();
        Self { gain, current }
    }
}

impl Node for GainStage {
    fn prepare(&mut self, _sample_rate: f64, _max_block: usize) {
        self.current = self.gain.get();
    }

    fn process(&mut self, ctx: &ProcessContext, inputs: &PortInputs, output: &mut AudioBuffer) -> bool {
        let target = self.gain.get();
        let start = self.current;
        self.current = target;

        let Some((in_l, in_r)) = inputs.stereo(0) else {
            output.clear();
            return true;
        };

        let step = if ctx.frames > 0 {
            (target - start) / ctx.frames as f32
        } else {
            0.0
        };

        let (out_l, out_r) = output.stereo_mut();
        let mut g = start;
        for i in 0..ctx.frames {
            g += step;
            out_l[i] = in_l[i] * g;
            out_r[i] = in_r[i] * g;
        }

        target == 0.0 && start == 0.0
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn num_channels(&self) -> usize {
        2
    }
}

// ═══════════════════════════════════════════════════════════════════
// Delay Stage
// ═══════════════════════════════════════════════════════════════════

/// Registered parameters of a [`DelayStage`].
#[derive(Debug, Clone)]
pub struct DelayParams {
    pub active: SharedParam,
    pub left_ms: SharedParam,
    pub right_ms: SharedParam,
    pub tap: SharedParam,
    pub cross: SharedParam,
    pub dry: SharedParam,
}

impl DelayParams {
    pub fn register(
        settings: &mut Settings,
        prefix: &str,
        config: &DelayConfig,
        max_delay_ms: f32,
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            active: settings.register(
                ParamInfo::new(format!("{prefix}.active"), "Delay On")
                    .range(0.0, 1.0)
                    .default(if config.active { 1.0 } else { 0.0 })
                    .step(1.0),
            )?,
            left_ms: settings.register(
                ParamInfo::new(format!("{prefix}.left_ms"), "Delay L")
                    .range(0.0, max_delay_ms)
                    .default(config.left_ms.min(max_delay_ms))
                    .step(10.0)
                    .unit(ParamUnit::Ms),
            )?,
            right_ms: settings.register(
                ParamInfo::new(format!("{prefix}.right_ms"), "Delay R")
                    .range(0.0, max_delay_ms)
                    .default(config.right_ms.min(max_delay_ms))
                    .step(10.0)
                    .unit(ParamUnit::Ms),
            )?,
            tap: settings.register(
                ParamInfo::new(format!("{prefix}.feedback"), "Feedback")
                    .range(0.0, 1.0)
                    .default(config.tap_gain)
                    .step(0.05),
            )?,
            cross: settings.register(
                ParamInfo::new(format!("{prefix}.crossfeed"), "Crossfeed")
                    .range(0.0, 1.0)
                    .default(config.cross_gain)
                    .step(0.05),
            )?,
            dry: settings.register(
                ParamInfo::new(format!("{prefix}.dry"), "Dry")
                    .range(0.0, 1.0)
                    .default(config.dry_gain)
                    .step(0.05),
            )?,
        })
    }

    /// Control-side switch. Off is a silent bypass: the graph keeps the
    /// stage, the audio path zeroes its taps and delay times.
    pub fn set_active(&self, active: bool) {
        self.active.set(if active { 1.0 } else { 0.0 });
    }

    pub fn is_active(&self) -> bool {
        self.active.get() >= 0.5
    }
}

/// Stereo delay: dry + own delayed signal + the other channel's delayed
/// signal. Delayed signals are not recirculated.
pub struct DelayStage {
    params: DelayParams,
    left: DelayLine,
    right: DelayLine,
    max_delay_ms: f32,
}

impl DelayStage {
    pub fn register(
        settings: &mut Settings,
        prefix: &str,
        config: &DelayConfig,
        max_delay_ms: f32,
    ) -> Result<Self, SettingsError> {
        let params = DelayParams::register(settings, prefix, config, max_delay_ms)?;
        Ok(Self::new(params, max_delay_ms))
    }

    pub fn new(params: DelayParams, max_delay_ms: f32) -> Self {
        Self {
            params,
            left: DelayLine::default(),
            right: DelayLine::default(),
            max_delay_ms,
        }
    }

    pub fn params(&self) -> &DelayParams {
        &self.params
    }

    pub fn set_active(&self, active: bool) {
        self.params.set_active(active);
    }
}

impl Node for DelayStage {
    fn prepare(&mut self, sample_rate: f64, _max_block: usize) {
        let max = ms_to_samples(self.max_delay_ms, sample_rate).ceil() as usize;
        self.left.allocate(max);
        self.right.allocate(max);
    }

    fn process(&mut self, ctx: &ProcessContext, inputs: &PortInputs, output: &mut AudioBuffer) -> bool {
        let p = &self.params;
        let dry = p.dry.get();
        let (tap, cross, d_l, d_r) = if p.is_active() {
            (
                p.tap.get(),
                p.cross.get(),
                ms_to_samples(p.left_ms.get(), ctx.sample_rate) as usize,
                ms_to_samples(p.right_ms.get(), ctx.sample_rate) as usize,
            )
        } else {
            (0.0, 0.0, 0, 0)
        };

        let input = inputs.stereo(0);
        let in_l = input.map(|(l, _)| l);
        let in_r = input.map(|(_, r)| r);

        let (out_l, out_r) = output.stereo_mut();
        let mut silent = true;
        for i in 0..ctx.frames {
            let x_l = input_at(in_l, i);
            let x_r = input_at(in_r, i);
            self.left.push(x_l);
            self.right.push(x_r);

            let delayed_l = self.left.read(d_l);
            let delayed_r = self.right.read(d_r);

            out_l[i] = dry * x_l + tap * delayed_l + cross * delayed_r;
            out_r[i] = dry * x_r + tap * delayed_r + cross * delayed_l;

            silent &= out_l[i] == 0.0 && out_r[i] == 0.0;
        }

        silent
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn num_channels(&self) -> usize {
        2
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    /// Emits a unit impulse on the first frame of the first block.
    struct Impulse {
        fired: bool,
    }

    impl Node for Impulse {
        fn prepare(&mut self, _: f64, _: usize) {}

        fn process(&mut self, _: &ProcessContext, _: &PortInputs, output: &mut AudioBuffer) -> bool {
            output.clear();
            if self.fired {
                return true;
            }
            self.fired = true;
            output.channel_mut(0)[0] = 1.0;
            output.channel_mut(1)[0] = 1.0;
            false
        }

        fn num_inputs(&self) -> usize {
            0
        }

        fn num_channels(&self) -> usize {
            2
        }
    }

    struct Ones;

    impl Node for Ones {
        fn prepare(&mut self, _: f64, _: usize) {}

        fn process(&mut self, _: &ProcessContext, _: &PortInputs, output: &mut AudioBuffer) -> bool {
            let (l, r) = output.stereo_mut();
            l.fill(1.0);
            r.fill(1.0);
            false
        }

        fn num_inputs(&self) -> usize {
            0
        }

        fn num_channels(&self) -> usize {
            2
        }
    }

    fn delay_graph(active: bool) -> (Graph, DelayParams) {
        let mut settings = Settings::new();
        let stage = DelayStage::register(&mut settings, "delay", &DelayConfig::default(), 1000.0).unwrap();
        stage.set_active(active);
        let params = stage.params().clone();

        let mut graph = Graph::new(128);
        let src = graph.add_node(Impulse { fired: false }).unwrap();
        let delay = graph.add_node(stage).unwrap();
        graph.connect(src, delay, 0).unwrap();
        graph.set_output(delay).unwrap();
        graph.assemble(44_100.0).unwrap();
        (graph, params)
    }

    #[test]
    fn bypass_passes_dry_impulse_only() {
        let (mut graph, _) = delay_graph(false);
        graph.process(128, 0);
        let out = graph.output_buffer().unwrap();
        assert_eq!(out.channel(0)[0], 1.0);
        assert_eq!(out.channel(1)[0], 1.0);
        assert!(out.channel(0)[1..].iter().all(|s| *s == 0.0));
        assert!(out.channel(1)[1..].iter().all(|s| *s == 0.0));

        // 1.5 s of blocks, well past the 660 ms right tap
        let mut energy = 0.0;
        for b in 1..520 {
            graph.process(128, b * 128);
            let out = graph.output_buffer().unwrap();
            energy += out.channel(0).iter().chain(out.channel(1)).map(|s| s * s).sum::<f32>();
        }
        assert_eq!(energy, 0.0);
    }

    #[test]
    fn active_delay_echoes_at_tap_times() {
        let (mut graph, _) = delay_graph(true);
        let left_at = ms_to_samples(220.0, 44_100.0) as usize;
        let right_at = ms_to_samples(660.0, 44_100.0) as usize;

        let blocks = right_at / 128 + 2;
        let mut left = vec![0.0_f32; blocks * 128];
        let mut right = vec![0.0_f32; blocks * 128];
        for b in 0..blocks {
            graph.process(128, (b * 128) as u64);
            let out = graph.output_buffer().unwrap();
            left[b * 128..(b + 1) * 128].copy_from_slice(out.channel(0));
            right[b * 128..(b + 1) * 128].copy_from_slice(out.channel(1));
        }

        assert!((left[left_at] - 0.4).abs() < 1e-6);
        assert!((right[left_at] - 0.2).abs() < 1e-6);
        assert!((right[right_at] - 0.4).abs() < 1e-6);
        assert!((left[right_at] - 0.2).abs() < 1e-6);
        // Taps are not recirculated
        assert_eq!(left[2 * left_at], 0.0);
    }

    #[test]
    fn reactivation_restores_taps() {
        let (_graph, params) = delay_graph(false);
        assert!(!params.is_active());
        params.set_active(true);
        assert!(params.is_active());
        assert_eq!(params.tap.get(), 0.4);
    }

    #[test]
    fn gain_ramps_to_new_value() {
        let mut settings = Settings::new();
        let stage = GainStage::register(&mut settings, "gain", 1.0).unwrap();

        let mut graph = Graph::new(4);
        let src = graph.add_node(Ones).unwrap();
        let gain = graph.add_node(stage).unwrap();
        graph.connect(src, gain, 0).unwrap();
        graph.set_output(gain).unwrap();
        graph.assemble(44_100.0).unwrap();

        graph.process(4, 0);
        assert_eq!(graph.output_buffer().unwrap().channel(0), &[1.0; 4]);

        settings.set("gain.level", 0.5).unwrap();
        graph.process(4, 4);
        assert_eq!(graph.output_buffer().unwrap().channel(1), &[0.875, 0.75, 0.625, 0.5]);

        graph.process(4, 8);
        assert_eq!(graph.output_buffer().unwrap().channel(0), &[0.5; 4]);
    }

    #[test]
    fn delay_line_reads_behind_write_head() {
        let mut line = DelayLine::default();
        line.allocate(4);
        for x in [1.0, 2.0, 3.0] {
            line.push(x);
        }
        assert_eq!(line.read(0), 3.0);
        assert_eq!(line.read(2), 1.0);
        assert_eq!(line.read_frac(0.5), 2.5);
        assert_eq!(line.read(100), line.read(4));
    }
}
