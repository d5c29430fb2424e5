// src/state/param_info.rs
//
// Parameter metadata for menu display and validation.

use std::fmt;

/// Display curve for menu mapping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DisplayCurve {
    #[default]
    Linear,
    /// Logarithmic (good for frequency, gain)
    Logarithmic,
}

/// Unit type for parameter display.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamUnit {
    #[default]
    None,
    /// Hertz (frequency)
    Hz,
    /// Decibels (gain)
    Db,
    /// Percentage (0-100)
    Percent,
    /// Milliseconds
    Ms,
    /// Compression ratio (n:1)
    Ratio,
    Bits,
}

impl fmt::Display for ParamUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamUnit::None => Ok(()),
            ParamUnit::Hz => write!(f, "Hz"),
            ParamUnit::Db => write!(f, "dB"),
            ParamUnit::Percent => write!(f, "%"),
            ParamUnit::Ms => write!(f, "ms"),
            ParamUnit::Ratio => write!(f, ":1"),
            ParamUnit::Bits => write!(f, "bit"),
        }
    }
}

/// Metadata describing a tunable parameter.
///
/// Used by the menu layer to:
/// - Validate and clamp input
/// - Step values from encoder deltas
/// - Format values for display
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamInfo {
    /// Registry key, e.g. `"delay.feedback"`
    pub key: String,

    /// Human-readable name
    pub name: String,

    /// Short name for compact displays
    pub short_name: String,

    pub min: f32,
    pub max: f32,
    pub default: f32,

    /// Unit for display
    pub unit: ParamUnit,

    /// Display curve for menu mapping
    pub curve: DisplayCurve,

    /// Encoder step size (0 = 1% of the range)
    pub step: f32,
}

impl ParamInfo {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let short_name = name.chars().take(4).collect();
        Self {
            key: key.into(),
            name,
            short_name,
            min: 0.0,
            max: 1.0,
            default: 0.0,
            unit: ParamUnit::None,
            curve: DisplayCurve::Linear,
            step: 0.0,
        }
    }

    pub fn range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn default(mut self, value: f32) -> Self {
        self.default = value;
        self
    }

    pub fn unit(mut self, unit: ParamUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn curve(mut self, curve: DisplayCurve) -> Self {
        self.curve = curve;
        self
    }

    pub fn step(mut self, step: f32) -> Self {
        self.step = step;
        self
    }

    /// Clamp a value to the valid range.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    /// Normalize a value to 0..1 range.
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        (value - self.min) / span
    }

    /// Denormalize a 0..1 value to the parameter range.
    #[inline]
    pub fn denormalize(&self, normalized: f32) -> f32 {
        self.min + normalized * (self.max - self.min)
    }

    /// Size of one encoder detent.
    #[inline]
    pub fn step_size(&self) -> f32 {
        if self.step > 0.0 {
            self.step
        } else {
            (self.max - self.min) / 100.0
        }
    }

    /// Format a value for display.
    pub fn format(&self, value: f32) -> String {
        let precision = if self.step >= 1.0 { 0 } else { 2 };
        if self.unit == ParamUnit::None {
            format!("{:.prec$}", value, prec = precision)
        } else {
            format!("{:.prec$} {}", value, self.unit, prec = precision)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits() -> ParamInfo {
        ParamInfo::new("crusher.bits", "Bit Depth")
            .range(2.0, 16.0)
            .default(16.0)
            .step(1.0)
            .unit(ParamUnit::Bits)
    }

    #[test]
    fn clamps_into_range() {
        let info = bits();
        assert_eq!(info.clamp(40.0), 16.0);
        assert_eq!(info.clamp(0.0), 2.0);
        assert_eq!(info.clamp(8.0), 8.0);
    }

    #[test]
    fn normalizes_against_range() {
        let info = ParamInfo::new("gain", "Gain").range(0.0, 2.0);
        assert_eq!(info.normalize(0.5), 0.25);
        assert_eq!(info.denormalize(0.25), 0.5);
    }

    #[test]
    fn short_name_and_format() {
        let info = bits();
        assert_eq!(info.short_name, "Bit ");
        assert_eq!(info.format(12.0), "12 bit");
        assert_eq!(ParamInfo::new("mix", "Mix").format(0.5), "0.50");
    }

    #[test]
    fn continuous_step_is_one_percent() {
        let info = ParamInfo::new("gain", "Gain").range(0.0, 2.0);
        assert!((info.step_size() - 0.02).abs() < 1e-6);
    }
}
