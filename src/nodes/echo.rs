// Resonant feedback echo.

use super::effects::{DelayLine, input_at, ms_to_samples};
use super::filters::Svf;
use crate::audio_buffer::AudioBuffer;
use crate::config::EchoConfig;
use crate::node::{Node, PortInputs, ProcessContext};
use crate::parameter::SharedParam;
use crate::state::{DisplayCurve, ParamInfo, ParamUnit, Settings, SettingsError};

/// Combined loop gain never reaches this.
const MAX_LOOP_GAIN: f32 = 0.95;

/// One channel's loop: delay line with a low-pass in the feedback path.
struct EchoUnit {
    line: DelayLine,
    filter: Svf,
}

impl EchoUnit {
    fn new() -> Self {
        Self {
            line: DelayLine::default(),
            filter: Svf::lowpass(),
        }
    }
}

/// Two symmetric echo loops whose feedback taps are cross-wired.
///
/// Each channel feeds back `feedback * own_tap + cross * other_tap`
/// through its filter. The sum of both gains is scaled below unity so the
/// loop always decays.
pub struct EchoStage {
    delay_ms: SharedParam,
    drive: SharedParam,
    feedback: SharedParam,
    cross: SharedParam,
    cutoff: SharedParam,
    resonance: SharedParam,
    mix: SharedParam,
    units: [EchoUnit; 2],
    max_delay_ms: f32,
}

impl EchoStage {
    pub fn register(
        settings: &mut Settings,
        prefix: &str,
        config: &EchoConfig,
        max_delay_ms: f32,
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            delay_ms: settings.register(
                ParamInfo::new(format!("{prefix}.time"), "Echo Time")
                    .range(1.0, max_delay_ms)
                    .default(config.delay_ms.clamp(1.0, max_delay_ms))
                    .step(10.0)
                    .unit(ParamUnit::Ms),
            )?,
            drive: settings.register(
                ParamInfo::new(format!("{prefix}.drive"), "Drive")
                    .range(0.0, 2.0)
                    .default(config.drive)
                    .step(0.05),
            )?,
            feedback: settings.register(
                ParamInfo::new(format!("{prefix}.feedback"), "Echo Feedback")
                    .range(0.0, MAX_LOOP_GAIN)
                    .default(config.feedback)
                    .step(0.05),
            )?,
            cross: settings.register(
                ParamInfo::new(format!("{prefix}.cross"), "Echo Cross")
                    .range(0.0, MAX_LOOP_GAIN)
                    .default(config.cross_feedback)
                    .step(0.05),
            )?,
            cutoff: settings.register(
                ParamInfo::new(format!("{prefix}.cutoff"), "Echo Cutoff")
                    .range(100.0, 12_000.0)
                    .default(config.cutoff_hz)
                    .step(100.0)
                    .unit(ParamUnit::Hz)
                    .curve(DisplayCurve::Logarithmic),
            )?,
            resonance: settings.register(
                ParamInfo::new(format!("{prefix}.resonance"), "Echo Res")
                    .range(0.0, 0.95)
                    .default(config.resonance)
                    .step(0.05),
            )?,
            mix: settings.register(
                ParamInfo::new(format!("{prefix}.mix"), "Echo Mix")
                    .range(0.0, 1.0)
                    .default(config.mix)
                    .step(0.05)
                    .unit(ParamUnit::Percent),
            )?,
            units: [EchoUnit::new(), EchoUnit::new()],
            max_delay_ms,
        })
    }

    /// Own and cross loop gains after the stability clamp.
    fn loop_gains(&self) -> (f32, f32) {
        let fb = self.feedback.get();
        let cross = self.cross.get();
        let total = fb + cross;
        if total > MAX_LOOP_GAIN {
            let scale = MAX_LOOP_GAIN / total;
            (fb * scale, cross * scale)
        } else {
            (fb, cross)
        }
    }
}

impl Node for EchoStage {
    fn prepare(&mut self, sample_rate: f64, _max_block: usize) {
        let max = ms_to_samples(self.max_delay_ms, sample_rate).ceil() as usize;
        for unit in &mut self.units {
            unit.line.allocate(max);
            unit.filter.prepare(sample_rate);
            unit.filter.reset();
        }
    }

    fn process(&mut self, ctx: &ProcessContext, inputs: &PortInputs, output: &mut AudioBuffer) -> bool {
        let delay = (ms_to_samples(self.delay_ms.get(), ctx.sample_rate) as usize).max(1);
        let drive = self.drive.get();
        let (fb, cross) = self.loop_gains();
        let mix = self.mix.get();
        let cutoff = self.cutoff.get();
        let resonance = self.resonance.get();
        for unit in &mut self.units {
            unit.filter.set_cutoff(cutoff);
            unit.filter.set_resonance(resonance);
        }

        let input = inputs.stereo(0);
        let in_l = input.map(|(l, _)| l);
        let in_r = input.map(|(_, r)| r);

        let [left, right] = &mut self.units;
        let (out_l, out_r) = output.stereo_mut();
        let mut silent = true;

        for i in 0..ctx.frames {
            let x_l = input_at(in_l, i);
            let x_r = input_at(in_r, i);

            // Taps delayed by `delay`; read before this frame is pushed
            let tap_l = left.line.read(delay - 1);
            let tap_r = right.line.read(delay - 1);

            let fb_l = left.filter.process_sample(fb * tap_l + cross * tap_r);
            let fb_r = right.filter.process_sample(fb * tap_r + cross * tap_l);

            left.line.push(drive * x_l + fb_l);
            right.line.push(drive * x_r + fb_r);

            out_l[i] = (1.0 - mix) * x_l + mix * tap_l;
            out_r[i] = (1.0 - mix) * x_r + mix * tap_r;

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
        for unit in &mut self.units {
            unit.line.clear();
            unit.filter.reset();
        }
    }
}
