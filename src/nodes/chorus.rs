// Chorus / flanger: LFO-modulated short delay.

use std::f32::consts::TAU;

use super::effects::{DelayLine, input_at, ms_to_samples};
use crate::audio_buffer::AudioBuffer;
use crate::config::ChorusConfig;
use crate::node::{Node, PortInputs, ProcessContext};
use crate::parameter::SharedParam;
use crate::state::{ParamInfo, ParamUnit, Settings, SettingsError};

const MAX_BASE_MS: f32 = 20.0;
const MAX_DEPTH_MS: f32 = 20.0;

/// Stereo modulated delay. The right LFO runs a quarter cycle ahead.
///
/// Long base delays without feedback give chorus; short base delays with
/// feedback give flange.
pub struct ChorusStage {
    base_ms: SharedParam,
    depth_ms: SharedParam,
    rate_hz: SharedParam,
    feedback: SharedParam,
    mix: SharedParam,
    lines: [DelayLine; 2],
    phase: f32,
}

impl ChorusStage {
    pub fn register(settings: &mut Settings, prefix: &str, config: &ChorusConfig) -> Result<Self, SettingsError> {
        Ok(Self {
            base_ms: settings.register(
                ParamInfo::new(format!("{prefix}.delay"), "Chorus Delay")
                    .range(0.5, MAX_BASE_MS)
                    .default(config.base_ms)
                    .step(0.5)
                    .unit(ParamUnit::Ms),
            )?,
            depth_ms: settings.register(
                ParamInfo::new(format!("{prefix}.depth"), "Chorus Depth")
                    .range(0.0, MAX_DEPTH_MS)
                    .default(config.depth_ms)
                    .step(0.5)
                    .unit(ParamUnit::Ms),
            )?,
            rate_hz: settings.register(
                ParamInfo::new(format!("{prefix}.rate"), "Chorus Rate")
                    .range(0.01, 10.0)
                    .default(config.rate_hz)
                    .step(0.05)
                    .unit(ParamUnit::Hz),
            )?,
            feedback: settings.register(
                ParamInfo::new(format!("{prefix}.feedback"), "Chorus Fdbk")
                    .range(0.0, 0.9)
                    .default(config.feedback)
                    .step(0.05),
            )?,
            mix: settings.register(
                ParamInfo::new(format!("{prefix}.mix"), "Chorus Mix")
                    .range(0.0, 1.0)
                    .default(config.mix)
                    .step(0.05)
                    .unit(ParamUnit::Percent),
            )?,
            lines: [DelayLine::default(), DelayLine::default()],
            phase: 0.0,
        })
    }

    pub fn lfo_phase(&self) -> f32 {
        self.phase
    }
}

impl Node for ChorusStage {
    fn prepare(&mut self, sample_rate: f64, _max_block: usize) {
        let max = ms_to_samples(MAX_BASE_MS + MAX_DEPTH_MS, sample_rate).ceil() as usize + 2;
        for line in &mut self.lines {
            line.allocate(max);
        }
        self.phase = 0.0;
    }

    fn process(&mut self, ctx: &ProcessContext, inputs: &PortInputs, output: &mut AudioBuffer) -> bool {
        let base = ms_to_samples(self.base_ms.get(), ctx.sample_rate);
        let depth = ms_to_samples(self.depth_ms.get(), ctx.sample_rate);
        let inc = self.rate_hz.get() / ctx.sample_rate as f32;
        let feedback = self.feedback.get();
        let mix = self.mix.get();

        let input = inputs.stereo(0);
        let in_l = input.map(|(l, _)| l);
        let in_r = input.map(|(_, r)| r);

        let [line_l, line_r] = &mut self.lines;
        let (out_l, out_r) = output.stereo_mut();
        let mut silent = true;

        for i in 0..ctx.frames {
            let x_l = input_at(in_l, i);
            let x_r = input_at(in_r, i);

            let lfo_l = 0.5 + 0.5 * (self.phase * TAU).sin();
            let lfo_r = 0.5 + 0.5 * ((self.phase + 0.25) * TAU).sin();

            // Offsets are behind the previous frame's write
            let wet_l = line_l.read_frac((base + depth * lfo_l - 1.0).max(0.0));
            let wet_r = line_r.read_frac((base + depth * lfo_r - 1.0).max(0.0));

            line_l.push(x_l + feedback * wet_l);
            line_r.push(x_r + feedback * wet_r);

            out_l[i] = (1.0 - mix) * x_l + mix * wet_l;
            out_r[i] = (1.0 - mix) * x_r + mix * wet_r;

            self.phase = (self.phase + inc).fract();
            silent &= out_l[i].abs() < 1e-9 && out_r[i].abs() < 1e-9;
        }

        if silent {
            output.clear();
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
        for line in &mut self.lines {
            line.clear();
        }
        self.phase = 0.0;
    }
}
