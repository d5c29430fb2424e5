// Stereo summing mixer.

use crate::audio_buffer::AudioBuffer;
use crate::node::{Node, PortInputs, ProcessContext};

/// N-input stereo mixer with one gain per input port.
///
/// `set_param(port, gain)` changes a port gain. Mono inputs are spread
/// to both channels.
pub struct Mixer {
    gains: Vec<f32>,
}

impl Mixer {
    /// Unity gain on every port.
    pub fn new(ports: usize) -> Self {
        Self::uniform(ports, 1.0)
    }

    pub fn uniform(ports: usize, gain: f32) -> Self {
        Self {
            gains: vec![gain; ports],
        }
    }

    pub fn with_gains(gains: Vec<f32>) -> Self {
        Self { gains }
    }

    pub fn gain(&self, port: usize) -> Option<f32> {
        self.gains.get(port).copied()
    }
}

impl Node for Mixer {
    fn prepare(&mut self, _sample_rate: f64, _max_block: usize) {}

    fn process(&mut self, ctx: &ProcessContext, inputs: &PortInputs, output: &mut AudioBuffer) -> bool {
        output.clear();

        let mut silent = true;
        for (port, &gain) in self.gains.iter().enumerate() {
            if gain == 0.0 {
                continue;
            }
            let Some((in_l, in_r)) = inputs.stereo(port) else {
                continue;
            };
            silent = false;

            let (out_l, out_r) = output.stereo_mut();
            for i in 0..ctx.frames {
                out_l[i] += in_l[i] * gain;
                out_r[i] += in_r[i] * gain;
            }
        }

        silent
    }

    fn num_inputs(&self) -> usize {
        self.gains.len()
    }

    fn num_channels(&self) -> usize {
        2
    }

    fn set_param(&mut self, port: u32, gain: f32) {
        if let Some(g) = self.gains.get_mut(port as usize) {
            if gain.is_finite() {
                *g = gain;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::voice::{NoteVoice, Voice};

    #[test]
    fn sums_ports_with_gains() {
        let mut graph = Graph::new(64);
        let a = graph.add_voice(NoteVoice::soft_triangle()).unwrap();
        let b = graph.add_voice(NoteVoice::soft_triangle()).unwrap();
        let mix = graph.add_node(Mixer::with_gains(vec![1.0, 0.5])).unwrap();
        graph.connect(a, mix, 0).unwrap();
        graph.connect(b, mix, 1).unwrap();
        graph.set_output(mix).unwrap();
        graph.assemble(44_100.0).unwrap();

        for id in [a, b] {
            let v = graph.voice_mut(id).unwrap();
            v.set_frequency(440.0);
            v.note_on();
        }
        graph.process(64, 0);

        let va = graph.node_output(a).unwrap().channel(0).to_vec();
        let vb = graph.node_output(b).unwrap().channel(0).to_vec();
        let out = graph.output_buffer().unwrap();
        for i in 0..64 {
            let expected = va[i] + 0.5 * vb[i];
            assert!((out.channel(0)[i] - expected).abs() < 1e-6);
            assert!((out.channel(1)[i] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn silent_without_sources() {
        let mut mixer = Mixer::new(4);
        let mut out = AudioBuffer::new(2, 16);
        let ctx = ProcessContext::new(16, 44_100.0, 0);
        assert!(mixer.process(&ctx, &PortInputs::none(), &mut out));
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn set_param_addresses_ports() {
        let mut mixer = Mixer::new(2);
        mixer.set_param(1, 0.25);
        mixer.set_param(9, 3.0);
        mixer.set_param(0, f32::NAN);
        assert_eq!(mixer.gain(0), Some(1.0));
        assert_eq!(mixer.gain(1), Some(0.25));
    }
}
