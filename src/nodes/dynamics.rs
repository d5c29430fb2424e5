// Feed-forward limiter for the chain tail.

use crate::audio_buffer::AudioBuffer;
use crate::config::DynamicsConfig;
use crate::node::{Node, PortInputs, ProcessContext};
use crate::parameter::SharedParam;
use crate::state::{ParamInfo, ParamUnit, Settings, SettingsError};

/// Gain computer state for one channel, in dB of reduction.
#[derive(Debug, Clone, Copy, Default)]
struct Follower {
    reduction_db: f32,
}

impl Follower {
    #[inline]
    fn process(&mut self, x: f32, threshold_db: f32, slope: f32, attack: f32, release: f32) -> f32 {
        let level_db = 20.0 * x.abs().max(1e-10).log10();
        let over = level_db - threshold_db;
        let target = if over > 0.0 { over * slope } else { 0.0 };

        let coeff = if target > self.reduction_db { attack } else { release };
        self.reduction_db = coeff * self.reduction_db + (1.0 - coeff) * target;

        10.0_f32.powf(-self.reduction_db / 20.0)
    }
}

/// Compressor with fixed shape applied with identical settings to both
/// channels. Each channel follows its own level.
pub struct DynamicsStage {
    threshold_db: SharedParam,
    attack_ms: SharedParam,
    release_ms: SharedParam,
    ratio: SharedParam,
    makeup_db: SharedParam,
    followers: [Follower; 2],
}

impl DynamicsStage {
    pub fn register(settings: &mut Settings, prefix: &str, config: &DynamicsConfig) -> Result<Self, SettingsError> {
        Ok(Self {
            threshold_db: settings.register(
                ParamInfo::new(format!("{prefix}.threshold"), "Threshold")
                    .range(-60.0, 0.0)
                    .default(config.threshold_db)
                    .step(1.0)
                    .unit(ParamUnit::Db),
            )?,
            attack_ms: settings.register(
                ParamInfo::new(format!("{prefix}.attack"), "Attack")
                    .range(0.1, 500.0)
                    .default(config.attack_ms)
                    .step(1.0)
                    .unit(ParamUnit::Ms),
            )?,
            release_ms: settings.register(
                ParamInfo::new(format!("{prefix}.release"), "Release")
                    .range(1.0, 2000.0)
                    .default(config.release_ms)
                    .step(5.0)
                    .unit(ParamUnit::Ms),
            )?,
            ratio: settings.register(
                ParamInfo::new(format!("{prefix}.ratio"), "Ratio")
                    .range(1.0, 20.0)
                    .default(config.ratio)
                    .step(0.5)
                    .unit(ParamUnit::Ratio),
            )?,
            makeup_db: settings.register(
                ParamInfo::new(format!("{prefix}.makeup"), "Makeup")
                    .range(0.0, 24.0)
                    .default(config.makeup_db)
                    .step(1.0)
                    .unit(ParamUnit::Db),
            )?,
            followers: [Follower::default(); 2],
        })
    }

    #[inline]
    fn coefficient(ms: f32, sample_rate: f64) -> f32 {
        (-1.0 / (ms * 0.001 * sample_rate as f32).max(1.0)).exp()
    }
}

impl Node for DynamicsStage {
    fn prepare(&mut self, _sample_rate: f64, _max_block: usize) {
        self.reset();
    }

    fn process(&mut self, ctx: &ProcessContext, inputs: &PortInputs, output: &mut AudioBuffer) -> bool {
        let Some((in_l, in_r)) = inputs.stereo(0) else {
            output.clear();
            // Let the gain recover while nothing plays
            let release = Self::coefficient(self.release_ms.get(), ctx.sample_rate).powi(ctx.frames as i32);
            for f in &mut self.followers {
                f.reduction_db *= release;
            }
            return true;
        };

        let threshold = self.threshold_db.get();
        let slope = 1.0 - 1.0 / self.ratio.get().max(1.0);
        let attack = Self::coefficient(self.attack_ms.get(), ctx.sample_rate);
        let release = Self::coefficient(self.release_ms.get(), ctx.sample_rate);
        let makeup = 10.0_f32.powf(self.makeup_db.get() / 20.0);

        let [fl, fr] = &mut self.followers;
        let (out_l, out_r) = output.stereo_mut();
        for i in 0..ctx.frames {
            out_l[i] = in_l[i] * fl.process(in_l[i], threshold, slope, attack, release) * makeup;
            out_r[i] = in_r[i] * fr.process(in_r[i], threshold, slope, attack, release) * makeup;
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
        self.followers = [Follower::default(); 2];
    }
}
