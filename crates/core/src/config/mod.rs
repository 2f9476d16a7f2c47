use serde::{Deserialize, Serialize};

use crate::scale::Axis;

/// Frequency mapping settings for a single pointer axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Frequency of the lowest note in Hz.
    pub base_freq: f32,
    /// Number of octaves the axis spans when a quantized scale is active.
    pub octave_range: u32,
}

impl AxisConfig {
    pub const fn new(base_freq: f32, octave_range: u32) -> Self {
        Self {
            base_freq,
            octave_range,
        }
    }
}

/// Top-level configuration for the instrument engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// A2 base over three octaves by default.
    pub x_axis: AxisConfig,
    /// A3 base over two octaves by default.
    pub y_axis: AxisConfig,
    /// Inclusive lower bound on lines per orientation.
    pub min_lines: usize,
    /// Inclusive upper bound on lines per orientation.
    pub max_lines: usize,
    /// Gap between adjacent lines in equal spacing mode, canvas units.
    pub base_gap: f32,
    /// Bounds for gaps drawn into the random spacing table.
    pub min_random_gap: f32,
    pub max_random_gap: f32,
    /// Canvas extent used to normalize raw pointer coordinates.
    pub canvas_width: f32,
    pub canvas_height: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            x_axis: AxisConfig::new(110.0, 3),
            y_axis: AxisConfig::new(220.0, 2),
            min_lines: 1,
            max_lines: 8,
            base_gap: 80.0,
            min_random_gap: 20.0,
            max_random_gap: 150.0,
            canvas_width: 1280.0,
            canvas_height: 720.0,
        }
    }
}

impl EngineConfig {
    /// Returns the mapping configuration for the requested axis.
    pub fn axis(&self, axis: Axis) -> &AxisConfig {
        match axis {
            Axis::X => &self.x_axis,
            Axis::Y => &self.y_axis,
        }
    }

    /// Clamps a requested line count into the configured range.
    pub fn clamp_line_count(&self, requested: usize) -> usize {
        requested.clamp(self.min_lines, self.max_lines)
    }
}
