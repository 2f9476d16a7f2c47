use std::f32::consts::PI;

use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};

use crate::backend::BackendStack;
use crate::voice::{Orientation, VoicePool};

/// Length of one arpeggio slot in milliseconds.
pub const ARPEGGIO_STEP_MS: u64 = 120;

/// Detune spread applied across a chord cluster, as a fraction of the base
/// frequency at the last voice.
const CLUSTER_DETUNE: f32 = 0.3;

/// Per-index detune step of the line treatment.
const LINE_DETUNE_STEP: f32 = 0.1;

/// Depth of the phase treatment's frequency modulation.
const PHASE_DEPTH: f32 = 0.1;

/// Probability that an improvising voice sounds on a given tick.
const IMPROVISE_PLAY_CHANCE: f32 = 0.6;

/// Just-intonation flavored ratios the improvise treatment picks from.
const IMPROVISE_RATIOS: [f32; 5] = [1.0, 1.125, 1.25, 1.33, 1.5];

/// Strategy deciding which voices sound on each tick and at what pitch.
///
/// Pitch assignment is cross-coupled in every strategy: vertical lines sound
/// frequencies derived from the Y axis and horizontal lines from the X axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Treatment {
    /// Every voice retriggers every tick, detuned into a cluster.
    Chord,
    /// Time-division round robin; exactly one voice per orientation sounds.
    Arpeggio,
    /// All voices sound with a fixed alternating detune.
    Line,
    /// Stochastic: each voice independently sounds or rests.
    Improvise,
    /// Slow sinusoidal drift between voices, after Reich.
    Phase,
}

impl Treatment {
    pub const ALL: [Treatment; 5] = [
        Treatment::Chord,
        Treatment::Arpeggio,
        Treatment::Line,
        Treatment::Improvise,
        Treatment::Phase,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Treatment::Chord => "Chord",
            Treatment::Arpeggio => "Arpeggio",
            Treatment::Line => "Line",
            Treatment::Improvise => "Improvise",
            Treatment::Phase => "Phase",
        }
    }
}

/// Applies one tick of the selected treatment to the whole pool.
///
/// `freq_x` and `freq_y` are the mapped frequencies for the current pointer
/// position; the mapper is consulted once per axis per tick, never per
/// voice. Backend failures inside the pool are reported and swallowed, so
/// this function cannot abort the tick.
pub fn apply(
    treatment: Treatment,
    pool: &mut VoicePool,
    backend: &mut BackendStack,
    freq_x: f32,
    freq_y: f32,
    now_ms: u64,
    rng: &mut StdRng,
) {
    match treatment {
        Treatment::Chord => chord(pool, backend, freq_x, freq_y),
        Treatment::Arpeggio => arpeggio(pool, backend, freq_x, freq_y, now_ms),
        Treatment::Line => line(pool, backend, freq_x, freq_y),
        Treatment::Improvise => improvise(pool, backend, freq_x, freq_y, rng),
        Treatment::Phase => phase(pool, backend, freq_x, freq_y, now_ms),
    }
}

/// Base frequency for one orientation: the cross-coupled axis frequency.
fn base_freq(orientation: Orientation, freq_x: f32, freq_y: f32) -> f32 {
    match orientation {
        Orientation::Vertical => freq_y,
        Orientation::Horizontal => freq_x,
    }
}

/// Spreads voice `index` of `count` upward by up to [`CLUSTER_DETUNE`].
fn cluster_freq(base: f32, index: usize, count: usize) -> f32 {
    let offset = index as f32 / count.max(1) as f32;
    base * (1.0 + offset * CLUSTER_DETUNE)
}

fn chord(pool: &mut VoicePool, backend: &mut BackendStack, freq_x: f32, freq_y: f32) {
    for orientation in [Orientation::Vertical, Orientation::Horizontal] {
        let base = base_freq(orientation, freq_x, freq_y);
        let count = pool.count(orientation);
        for index in 0..count {
            pool.play(orientation, index, cluster_freq(base, index, count), backend);
        }
    }
}

fn arpeggio(
    pool: &mut VoicePool,
    backend: &mut BackendStack,
    freq_x: f32,
    freq_y: f32,
    now_ms: u64,
) {
    let step = (now_ms / ARPEGGIO_STEP_MS) as usize;
    let vertical_count = pool.count(Orientation::Vertical);

    for orientation in [Orientation::Vertical, Orientation::Horizontal] {
        let base = base_freq(orientation, freq_x, freq_y);
        let count = pool.count(orientation);
        // Horizontal voices run the same round robin shifted by the vertical
        // count so the two orientations interleave instead of doubling up.
        let active = match orientation {
            Orientation::Vertical => step % count.max(1),
            Orientation::Horizontal => (step + vertical_count) % count.max(1),
        };
        for index in 0..count {
            if index == active {
                pool.play(orientation, index, cluster_freq(base, index, count), backend);
            } else {
                pool.stop(orientation, index, backend);
            }
        }
    }
}

fn line(pool: &mut VoicePool, backend: &mut BackendStack, freq_x: f32, freq_y: f32) {
    for orientation in [Orientation::Vertical, Orientation::Horizontal] {
        let base = base_freq(orientation, freq_x, freq_y);
        for index in 0..pool.count(orientation) {
            // Even vertical indices detune upward, even horizontal indices
            // downward, so the two families move against each other.
            let direction = match (orientation, index % 2 == 0) {
                (Orientation::Vertical, true) | (Orientation::Horizontal, false) => 1.0,
                _ => -1.0,
            };
            let detune = 1.0 + index as f32 * LINE_DETUNE_STEP * direction;
            pool.play(orientation, index, base * detune, backend);
        }
    }
}

fn improvise(
    pool: &mut VoicePool,
    backend: &mut BackendStack,
    freq_x: f32,
    freq_y: f32,
    rng: &mut StdRng,
) {
    for orientation in [Orientation::Vertical, Orientation::Horizontal] {
        let base = base_freq(orientation, freq_x, freq_y);
        for index in 0..pool.count(orientation) {
            if rng.random::<f32>() < IMPROVISE_PLAY_CHANCE {
                let choice = rng.random_range(0..IMPROVISE_RATIOS.len());
                pool.play(orientation, index, base * IMPROVISE_RATIOS[choice], backend);
            } else {
                pool.stop(orientation, index, backend);
            }
        }
    }
}

fn phase(pool: &mut VoicePool, backend: &mut BackendStack, freq_x: f32, freq_y: f32, now_ms: u64) {
    let t = now_ms as f32 / 1000.0;
    for orientation in [Orientation::Vertical, Orientation::Horizontal] {
        let base = base_freq(orientation, freq_x, freq_y);
        for index in 0..pool.count(orientation) {
            let rate = 1.0 + index as f32 * 0.05;
            let modulation = match orientation {
                Orientation::Vertical => {
                    let shift = index as f32 * 0.25;
                    (t * rate + shift).sin()
                }
                Orientation::Horizontal => {
                    let shift = index as f32 * 0.25 + PI;
                    (t * rate + shift).cos()
                }
            };
            let freq = base * (1.0 + modulation * PHASE_DEPTH);
            pool.play(orientation, index, freq, backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use rand::SeedableRng;

    const FREQ_X: f32 = 440.0;
    const FREQ_Y: f32 = 220.0;

    fn setup(vertical: usize, horizontal: usize) -> (VoicePool, BackendStack) {
        let mut backend = BackendStack::new(Box::new(NullBackend::new()), None);
        let mut pool = VoicePool::new(crate::voice::Waveform::Sine);
        let v: Vec<f32> = (0..vertical).map(|i| i as f32).collect();
        let h: Vec<f32> = (0..horizontal).map(|i| i as f32).collect();
        pool.rebuild(&mut backend, vertical, horizontal, &v, &h);
        (pool, backend)
    }

    fn active_vertical(pool: &VoicePool) -> Vec<bool> {
        pool.voices(Orientation::Vertical)
            .iter()
            .map(|v| v.active)
            .collect()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0)
    }

    #[test]
    fn chord_triggers_every_voice_with_spread_cluster() {
        let (mut pool, mut backend) = setup(3, 2);
        apply(
            Treatment::Chord,
            &mut pool,
            &mut backend,
            FREQ_X,
            FREQ_Y,
            0,
            &mut rng(),
        );

        let vertical = pool.voices(Orientation::Vertical);
        assert!(vertical.iter().all(|v| v.active));
        assert_eq!(vertical[0].frequency, FREQ_Y);
        assert!((vertical[1].frequency - FREQ_Y * 1.1).abs() < 1e-3);
        assert!((vertical[2].frequency - FREQ_Y * 1.2).abs() < 1e-3);

        // Horizontal voices derive pitch from the X axis.
        let horizontal = pool.voices(Orientation::Horizontal);
        assert_eq!(horizontal[0].frequency, FREQ_X);
        assert!((horizontal[1].frequency - FREQ_X * 1.15).abs() < 1e-3);
    }

    #[test]
    fn arpeggio_walks_vertical_voices_in_slot_order() {
        let (mut pool, mut backend) = setup(3, 1);
        let mut rng = rng();

        let mut run = |now: u64| {
            apply(
                Treatment::Arpeggio,
                &mut pool,
                &mut backend,
                FREQ_X,
                FREQ_Y,
                now,
                &mut rng,
            );
            active_vertical(&pool)
        };

        assert_eq!(run(0), vec![true, false, false]);
        assert_eq!(run(119), vec![true, false, false]);
        assert_eq!(run(120), vec![false, true, false]);
        assert_eq!(run(239), vec![false, true, false]);
        assert_eq!(run(240), vec![false, false, true]);
        // One full 360 ms cycle later the first voice sounds again.
        assert_eq!(run(360), vec![true, false, false]);
    }

    #[test]
    fn line_alternates_detune_direction_by_parity() {
        let (mut pool, mut backend) = setup(4, 2);
        apply(
            Treatment::Line,
            &mut pool,
            &mut backend,
            FREQ_X,
            FREQ_Y,
            0,
            &mut rng(),
        );

        let vertical = pool.voices(Orientation::Vertical);
        assert_eq!(vertical[0].frequency, FREQ_Y);
        assert!((vertical[1].frequency - FREQ_Y * 0.9).abs() < 1e-3);
        assert!((vertical[2].frequency - FREQ_Y * 1.2).abs() < 1e-3);
        assert!((vertical[3].frequency - FREQ_Y * 0.7).abs() < 1e-3);
        assert!(vertical.iter().all(|v| v.active));

        let horizontal = pool.voices(Orientation::Horizontal);
        assert_eq!(horizontal[0].frequency, FREQ_X);
        assert!((horizontal[1].frequency - FREQ_X * 1.1).abs() < 1e-3);
    }

    #[test]
    fn improvise_is_reproducible_for_a_fixed_seed() {
        let run = || {
            let (mut pool, mut backend) = setup(4, 2);
            let mut rng = StdRng::seed_from_u64(99);
            apply(
                Treatment::Improvise,
                &mut pool,
                &mut backend,
                FREQ_X,
                FREQ_Y,
                0,
                &mut rng,
            );
            pool.voices(Orientation::Vertical)
                .iter()
                .chain(pool.voices(Orientation::Horizontal))
                .map(|v| (v.active, v.frequency))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn improvise_ratios_come_from_the_fixed_set() {
        let (mut pool, mut backend) = setup(8, 8);
        let mut rng = StdRng::seed_from_u64(3);
        for now in 0..16 {
            apply(
                Treatment::Improvise,
                &mut pool,
                &mut backend,
                FREQ_X,
                FREQ_Y,
                now * 33,
                &mut rng,
            );
            for voice in pool.voices(Orientation::Vertical).iter().filter(|v| v.active) {
                let ratio = voice.frequency / FREQ_Y;
                assert!(
                    IMPROVISE_RATIOS.iter().any(|r| (ratio - r).abs() < 1e-4),
                    "unexpected ratio {ratio}"
                );
            }
        }
    }

    #[test]
    fn phase_modulates_within_ten_percent_and_never_stops() {
        let (mut pool, mut backend) = setup(3, 3);
        let mut rng = rng();
        for now in (0..5000).step_by(33) {
            apply(
                Treatment::Phase,
                &mut pool,
                &mut backend,
                FREQ_X,
                FREQ_Y,
                now,
                &mut rng,
            );
            for voice in pool.voices(Orientation::Vertical) {
                assert!(voice.active);
                let ratio = voice.frequency / FREQ_Y;
                assert!((0.9 - 1e-3..=1.1 + 1e-3).contains(&ratio));
            }
        }
    }
}
