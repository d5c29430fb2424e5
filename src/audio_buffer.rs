// src/audio_buffer.rs

/// Planar block buffer: `[ch0 frames..][ch1 frames..]`.
///
/// Capacity is fixed at construction; `frames` is the active length of the
/// current block and never exceeds it.
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    pub channels: usize,
    pub frames: usize,
    capacity: usize,
    data: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(channels: usize, max_block: usize) -> Self {
        Self {
            channels,
            frames: max_block,
            capacity: max_block,
            data: vec![0.0; channels * max_block],
        }
    }

    /// Set the active frame count for the next block.
    #[inline]
    pub fn set_frames(&mut self, frames: usize) {
        self.frames = frames.min(self.capacity);
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn clear(&mut self) {
        for ch in 0..self.channels {
            self.channel_mut(ch).fill(0.0);
        }
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        let start = ch * self.capacity;
        &self.data[start..start + self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        let start = ch * self.capacity;
        &mut self.data[start..start + self.frames]
    }

    /// Channel to read when feeding `ch` of a consumer that may be wider.
    ///
    /// Mono buffers answer every channel with channel 0.
    #[inline]
    pub fn upmixed(&self, ch: usize) -> &[f32] {
        self.channel(ch.min(self.channels.saturating_sub(1)))
    }

    /// Split into two mutable channel views (stereo processors).
    #[inline]
    pub fn stereo_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        let frames = self.frames;
        let capacity = self.capacity;
        let (left, right) = self.data.split_at_mut(capacity);
        (&mut left[..frames], &mut right[..frames])
    }

    /// Largest absolute sample across all channels of the active block.
    pub fn peak(&self) -> f32 {
        (0..self.channels)
            .flat_map(|ch| self.channel(ch).iter())
            .fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_never_exceed_capacity() {
        let mut buf = AudioBuffer::new(2, 64);
        buf.set_frames(1000);
        assert_eq!(buf.frames, 64);
        assert_eq!(buf.channel(1).len(), 64);
    }

    #[test]
    fn channels_are_planar() {
        let mut buf = AudioBuffer::new(2, 8);
        buf.set_frames(4);
        buf.channel_mut(0).fill(1.0);
        buf.channel_mut(1).fill(-2.0);
        assert_eq!(buf.channel(0), &[1.0; 4]);
        assert_eq!(buf.channel(1), &[-2.0; 4]);
        assert_eq!(buf.peak(), 2.0);
    }

    #[test]
    fn mono_upmixes_to_any_channel() {
        let mut buf = AudioBuffer::new(1, 4);
        buf.channel_mut(0).copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(buf.upmixed(1), buf.channel(0));
    }

    #[test]
    fn stereo_split_matches_channels() {
        let mut buf = AudioBuffer::new(2, 8);
        buf.set_frames(3);
        {
            let (l, r) = buf.stereo_mut();
            l.fill(0.5);
            r.fill(0.25);
        }
        assert_eq!(buf.channel(0), &[0.5; 3]);
        assert_eq!(buf.channel(1), &[0.25; 3]);
    }
}
