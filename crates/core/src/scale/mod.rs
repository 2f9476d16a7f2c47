use serde::{Deserialize, Serialize};

use crate::config::AxisConfig;

/// Hard clamp applied to every mapped frequency, in Hz.
pub const MIN_FREQ_HZ: f32 = 20.0;
pub const MAX_FREQ_HZ: f32 = 20_000.0;

const NOTES_PER_OCTAVE: i32 = 12;

/// Pointer axis a frequency is derived from. Vertical lines sound pitches
/// derived from the Y axis and horizontal lines from the X axis, so both
/// axes carry independent mapping configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// Fixed Hz band used by the continuous scale. The X axis covers five
    /// octaves starting at A1, the Y axis three octaves starting at A2.
    fn continuous_band(self) -> (f32, f32) {
        match self {
            Axis::X => (55.0, 1760.0),
            Axis::Y => (110.0, 880.0),
        }
    }
}

/// Closed registry of the selectable tuning systems.
///
/// Every entry except [`Scale::Continuous`] quantizes pointer position to a
/// table of semitone intervals within one octave. `Continuous` bypasses
/// quantization entirely and maps the pointer onto a logarithmic Hz band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scale {
    Chromatic,
    Major,
    Minor,
    HarmonicMinor,
    Pentatonic,
    Blues,
    MiddleEastern,
    Japanese,
    WholeTone,
    Continuous,
}

impl Scale {
    /// Registry order. Number keys 1-9 select the first nine entries and 0
    /// selects the last (continuous) one.
    pub const ALL: [Scale; 10] = [
        Scale::Chromatic,
        Scale::Major,
        Scale::Minor,
        Scale::HarmonicMinor,
        Scale::Pentatonic,
        Scale::Blues,
        Scale::MiddleEastern,
        Scale::Japanese,
        Scale::WholeTone,
        Scale::Continuous,
    ];

    /// Semitone intervals within one octave. Empty for the continuous scale.
    pub fn intervals(self) -> &'static [i32] {
        match self {
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Scale::Pentatonic => &[0, 2, 4, 7, 9],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::MiddleEastern => &[0, 1, 4, 5, 7, 8, 11],
            Scale::Japanese => &[0, 2, 3, 7, 8],
            Scale::WholeTone => &[0, 2, 4, 6, 8, 10],
            Scale::Continuous => &[],
        }
    }

    pub fn is_continuous(self) -> bool {
        matches!(self, Scale::Continuous)
    }

    /// Display name used by hosts when listing the registry.
    pub fn name(self) -> &'static str {
        match self {
            Scale::Chromatic => "Chromatic",
            Scale::Major => "Major",
            Scale::Minor => "Natural Minor",
            Scale::HarmonicMinor => "Harmonic Minor",
            Scale::Pentatonic => "Pentatonic",
            Scale::Blues => "Blues",
            Scale::MiddleEastern => "Middle Eastern",
            Scale::Japanese => "Japanese",
            Scale::WholeTone => "Whole Tone",
            Scale::Continuous => "Continuous (linear Hz)",
        }
    }

    /// Maps a normalized axis value to a frequency in Hz.
    ///
    /// `value` is clamped into [0, 1] defensively; the result is always
    /// within [`MIN_FREQ_HZ`, `MAX_FREQ_HZ`]. Quantized scales walk the
    /// interval table across `config.octave_range` octaves above
    /// `config.base_freq`; transpose is an additive semitone offset there
    /// and a multiplicative ratio in continuous mode.
    pub fn map_to_frequency(
        self,
        value: f32,
        axis: Axis,
        config: &AxisConfig,
        transpose: i32,
    ) -> f32 {
        let value = value.clamp(0.0, 1.0);

        if self.is_continuous() {
            return continuous_frequency(value, axis, transpose);
        }

        let intervals = self.intervals();
        let interval_count = intervals.len() as i64;
        let note_range = interval_count * config.octave_range as i64;
        let note_index = (value * note_range as f32).floor() as i64;
        let octave = (note_index / interval_count) as i32;
        let scale_index = (note_index % interval_count) as usize;

        let semitone = intervals[scale_index] + octave * NOTES_PER_OCTAVE + transpose;
        let freq = config.base_freq * 2f32.powf(semitone as f32 / NOTES_PER_OCTAVE as f32);
        freq.clamp(MIN_FREQ_HZ, MAX_FREQ_HZ)
    }
}

/// Ratio between two pitches `num_semitones` apart in equal temperament.
pub fn semitone_ratio(num_semitones: f32) -> f32 {
    2f32.powf(num_semitones / NOTES_PER_OCTAVE as f32)
}

fn continuous_frequency(value: f32, axis: Axis, transpose: i32) -> f32 {
    let (min_hz, max_hz) = axis.continuous_band();
    let log_freq = min_hz.ln() + value * (max_hz.ln() - min_hz.ln());
    let freq = log_freq.exp() * semitone_ratio(transpose as f32);
    freq.clamp(MIN_FREQ_HZ, MAX_FREQ_HZ)
}
