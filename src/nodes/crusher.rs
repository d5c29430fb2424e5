// Bit-depth and sample-rate reduction.

use crate::audio_buffer::AudioBuffer;
use crate::config::CrusherConfig;
use crate::node::{Node, PortInputs, ProcessContext};
use crate::parameter::SharedParam;
use crate::state::{DisplayCurve, ParamInfo, ParamUnit, Settings, SettingsError};

pub const MIN_BITS: f32 = 2.0;
pub const MAX_BITS: f32 = 16.0;

/// Quantizes to `bits` and holds each kept sample for `native / rate`
/// frames. 16 bits at the native rate is an exact pass-through.
pub struct BitCrusherStage {
    bits: SharedParam,
    rate: SharedParam,
    held: [f32; 2],
    countdown: usize,
}

impl BitCrusherStage {
    /// `native_rate` bounds the sample-rate parameter.
    pub fn register(
        settings: &mut Settings,
        prefix: &str,
        config: &CrusherConfig,
        native_rate: f32,
    ) -> Result<Self, SettingsError> {
        let bits = settings.register(
            ParamInfo::new(format!("{prefix}.bits"), "Bits")
                .range(MIN_BITS, MAX_BITS)
                .default(config.bits.clamp(MIN_BITS, MAX_BITS))
                .step(1.0)
                .unit(ParamUnit::Bits),
        )?;
        let rate = settings.register(
            ParamInfo::new(format!("{prefix}.rate"), "Crush Rate")
                .range(1.0, native_rate)
                .default(config.sample_rate.clamp(1.0, native_rate))
                .step(500.0)
                .unit(ParamUnit::Hz)
                .curve(DisplayCurve::Logarithmic),
        )?;
        Ok(Self::new(bits, rate))
    }

    pub fn new(bits: SharedParam, rate: SharedParam) -> Self {
        Self {
            bits,
            rate,
            held: [0.0; 2],
            countdown: 0,
        }
    }

    #[inline]
    fn quantize(x: f32, levels: f32) -> f32 {
        (x * levels).round() / levels
    }
}

impl Node for BitCrusherStage {
    fn prepare(&mut self, _sample_rate: f64, _max_block: usize) {
        self.reset();
    }

    fn process(&mut self, ctx: &ProcessContext, inputs: &PortInputs, output: &mut AudioBuffer) -> bool {
        let Some((in_l, in_r)) = inputs.stereo(0) else {
            output.clear();
            self.held = [0.0; 2];
            return true;
        };

        let native = ctx.sample_rate as f32;
        let bits = self.bits.get().round().clamp(MIN_BITS, MAX_BITS);
        let rate = self.rate.get().clamp(1.0, native);
        let (out_l, out_r) = output.stereo_mut();

        if bits >= MAX_BITS && rate >= native {
            out_l.copy_from_slice(&in_l[..ctx.frames]);
            out_r.copy_from_slice(&in_r[..ctx.frames]);
            self.countdown = 0;
            return false;
        }

        let levels = 2.0_f32.powf(bits - 1.0);
        let hold = (native / rate).round().max(1.0) as usize;

        for i in 0..ctx.frames {
            if self.countdown == 0 {
                self.held = [Self::quantize(in_l[i], levels), Self::quantize(in_r[i], levels)];
                self.countdown = hold;
            }
            self.countdown -= 1;
            out_l[i] = self.held[0];
            out_r[i] = self.held[1];
        }

        false
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn num_channels(&self) -> usize {
        2
    }

    fn reset(&mut self) {
        self.held = [0.0; 2];
        self.countdown = 0;
    }
}
