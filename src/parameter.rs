use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::state::ParamInfo;

struct ParamCell {
    bits: AtomicU32,
    min: f32,
    max: f32,
}

/// A scalar parameter shared between the control loop and the audio callback.
///
/// Contract: one writer domain (control loop) and one reader domain (audio
/// callback). The writer clamps to the parameter range and publishes with a
/// `Release` store; the reader loads with `Acquire` once per block, so a
/// block never sees a half-written value and every write is visible no
/// later than the next block. Multi-field state never goes through a
/// `SharedParam`; it travels as a command through the bridge queue.
#[derive(Clone)]
pub struct SharedParam {
    cell: Arc<ParamCell>,
}

impl SharedParam {
    /// Parameter bounded by `info`, starting at its default.
    pub fn new(info: &ParamInfo) -> Self {
        Self::with_range(info.default, info.min, info.max)
    }

    pub fn with_range(value: f32, min: f32, max: f32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            cell: Arc::new(ParamCell {
                bits: AtomicU32::new(value.clamp(min, max).to_bits()),
                min,
                max,
            }),
        }
    }

    /// Writer side. NaN is ignored.
    #[inline]
    pub fn set(&self, value: f32) {
        if value.is_nan() {
            return;
        }
        let value = value.clamp(self.cell.min, self.cell.max);
        self.cell.bits.store(value.to_bits(), Ordering::Release);
    }

    /// Reader side.
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.cell.bits.load(Ordering::Acquire))
    }

    pub fn min(&self) -> f32 {
        self.cell.min
    }

    pub fn max(&self) -> f32 {
        self.cell.max
    }

    /// True if both handles refer to the same cell.
    pub fn same_as(&self, other: &SharedParam) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl std::fmt::Debug for SharedParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedParam")
            .field("value", &self.get())
            .field("min", &self.cell.min)
            .field("max", &self.cell.max)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_clamped() {
        let p = SharedParam::with_range(0.7, 0.0, 2.0);
        p.set(5.0);
        assert_eq!(p.get(), 2.0);
        p.set(-1.0);
        assert_eq!(p.get(), 0.0);
    }

    #[test]
    fn nan_is_ignored() {
        let p = SharedParam::with_range(0.5, 0.0, 1.0);
        p.set(f32::NAN);
        assert_eq!(p.get(), 0.5);
    }

    #[test]
    fn clones_share_state() {
        let writer = SharedParam::with_range(0.0, 0.0, 1.0);
        let reader = writer.clone();
        writer.set(0.25);
        assert_eq!(reader.get(), 0.25);
        assert!(reader.same_as(&writer));
    }

    #[test]
    fn visible_across_threads() {
        let writer = SharedParam::with_range(0.0, 0.0, 10.0);
        let reader = writer.clone();
        std::thread::spawn(move || writer.set(3.0)).join().unwrap();
        assert_eq!(reader.get(), 3.0);
    }

    #[test]
    fn starts_at_info_default() {
        let info = ParamInfo::new("gain", "Gain").range(0.0, 2.0).default(0.7);
        assert_eq!(SharedParam::new(&info).get(), 0.7);
    }
}
