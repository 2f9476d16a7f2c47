use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::{BackendStack, BackendVoice};
use crate::error::{FreqGridError, Result};

/// Frequency a freshly created voice reports before its first trigger.
const DEFAULT_FREQ_HZ: f32 = 440.0;

/// Oscillator shape assigned per voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Triangle,
        Waveform::Sawtooth,
        Waveform::Square,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Triangle => "triangle",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Square => "square",
        }
    }
}

/// Which of the two line families a voice belongs to. Vertical lines move
/// along the X axis, horizontal lines along the Y axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

impl Orientation {
    pub fn opposite(self) -> Self {
        match self {
            Orientation::Vertical => Orientation::Horizontal,
            Orientation::Horizontal => Orientation::Vertical,
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Vertical => write!(f, "vertical"),
            Orientation::Horizontal => write!(f, "horizontal"),
        }
    }
}

/// One monophonic voice bound to one grid line.
///
/// Voices are owned exclusively by the [`VoicePool`]; the backend binding is
/// released when the pool destroys the voice. Identity does not survive a
/// pool rebuild — only the logical slot (orientation plus index) and the
/// preserved attributes do.
#[derive(Debug)]
pub struct Voice {
    pub orientation: Orientation,
    pub index: usize,
    /// Last commanded frequency in Hz.
    pub frequency: f32,
    pub active: bool,
    pub waveform: Waveform,
    /// Last computed coordinate along the line's movement axis.
    pub position: f32,
    pub(crate) handle: Option<BackendVoice>,
}

/// Identifies the one voice that waveform-edit commands target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub orientation: Orientation,
    pub index: usize,
}

/// Attributes carried across a pool rebuild for a surviving slot.
struct SavedVoice {
    waveform: Waveform,
    frequency: f32,
    active: bool,
}

/// Owns every active voice of both orientations.
///
/// Changing a line count rebuilds the pool wholesale: every backend voice is
/// destroyed and recreated, but each new voice inherits the waveform,
/// frequency and activity of the voice that previously occupied its slot.
/// After any mutation the voice count per orientation equals the line count.
#[derive(Debug)]
pub struct VoicePool {
    vertical: Vec<Voice>,
    horizontal: Vec<Voice>,
    selection: Selection,
    default_waveform: Waveform,
}

impl VoicePool {
    pub fn new(default_waveform: Waveform) -> Self {
        Self {
            vertical: Vec::new(),
            horizontal: Vec::new(),
            selection: Selection {
                orientation: Orientation::Vertical,
                index: 0,
            },
            default_waveform,
        }
    }

    pub fn count(&self, orientation: Orientation) -> usize {
        self.family(orientation).len()
    }

    pub fn voices(&self, orientation: Orientation) -> &[Voice] {
        self.family(orientation)
    }

    pub fn voice(&self, orientation: Orientation, index: usize) -> Option<&Voice> {
        self.family(orientation).get(index)
    }

    fn family(&self, orientation: Orientation) -> &Vec<Voice> {
        match orientation {
            Orientation::Vertical => &self.vertical,
            Orientation::Horizontal => &self.horizontal,
        }
    }

    fn family_mut(&mut self, orientation: Orientation) -> &mut Vec<Voice> {
        match orientation {
            Orientation::Vertical => &mut self.vertical,
            Orientation::Horizontal => &mut self.horizontal,
        }
    }

    fn voice_mut(&mut self, orientation: Orientation, index: usize) -> Option<&mut Voice> {
        self.family_mut(orientation).get_mut(index)
    }

    /// Destroys and recreates every voice, preserving per-slot attributes.
    ///
    /// Audible side effect: any sounding voice is stopped and replaced.
    /// Position lists must match the requested counts; missing entries fall
    /// back to the previous centerline of 0.0.
    pub fn rebuild(
        &mut self,
        backend: &mut BackendStack,
        vertical_count: usize,
        horizontal_count: usize,
        vertical_positions: &[f32],
        horizontal_positions: &[f32],
    ) {
        let saved_vertical = save_family(&self.vertical);
        let saved_horizontal = save_family(&self.horizontal);
        self.destroy_all(backend);

        self.vertical = build_family(
            backend,
            Orientation::Vertical,
            vertical_count,
            &saved_vertical,
            vertical_positions,
            self.default_waveform,
        );
        self.horizontal = build_family(
            backend,
            Orientation::Horizontal,
            horizontal_count,
            &saved_horizontal,
            horizontal_positions,
            self.default_waveform,
        );

        self.clamp_selection();
    }

    /// Releases every backend binding. Failures are reported per voice and
    /// never propagate, so teardown is safe against an already-gone backend.
    pub fn destroy_all(&mut self, backend: &mut BackendStack) {
        for voice in self.vertical.drain(..).chain(self.horizontal.drain(..)) {
            if let Some(handle) = voice.handle {
                if let Err(err) = backend.destroy(&handle) {
                    warn!(
                        orientation = %voice.orientation,
                        index = voice.index,
                        error = %err,
                        "voice teardown failed"
                    );
                }
            }
        }
    }

    /// Overwrites the stored positions for one orientation.
    pub fn set_positions(&mut self, orientation: Orientation, positions: &[f32]) {
        for (voice, position) in self.family_mut(orientation).iter_mut().zip(positions) {
            voice.position = *position;
        }
    }

    /// Re-sets the voice's frequency and restarts its envelope. Retriggering
    /// an already sounding voice is expected. Backend failures are reported
    /// and the engine-side state is updated regardless, so the instrument
    /// keeps tracking frequencies even with sound output unavailable.
    pub fn play(
        &mut self,
        orientation: Orientation,
        index: usize,
        hz: f32,
        backend: &mut BackendStack,
    ) {
        let Some(voice) = self.voice_mut(orientation, index) else {
            return;
        };
        if let Some(handle) = voice.handle {
            if let Err(err) = backend.set_frequency(&handle, hz) {
                warn!(orientation = %orientation, index, error = %err, "set_frequency failed");
            }
            if let Err(err) = backend.trigger_attack(&handle) {
                warn!(orientation = %orientation, index, error = %err, "trigger_attack failed");
            }
        }
        voice.frequency = hz;
        voice.active = true;
    }

    /// Releases the voice's envelope and marks it inactive.
    pub fn stop(&mut self, orientation: Orientation, index: usize, backend: &mut BackendStack) {
        let Some(voice) = self.voice_mut(orientation, index) else {
            return;
        };
        if voice.active {
            if let Some(handle) = voice.handle {
                if let Err(err) = backend.trigger_release(&handle) {
                    warn!(orientation = %orientation, index, error = %err, "trigger_release failed");
                }
            }
        }
        voice.active = false;
    }

    pub fn stop_all(&mut self, backend: &mut BackendStack) {
        for orientation in [Orientation::Vertical, Orientation::Horizontal] {
            for index in 0..self.count(orientation) {
                self.stop(orientation, index, backend);
            }
        }
    }

    /// Assigns a waveform to one voice and propagates it to the backend.
    pub fn set_waveform(
        &mut self,
        orientation: Orientation,
        index: usize,
        waveform: Waveform,
        backend: &mut BackendStack,
    ) -> Result<()> {
        let Some(voice) = self.voice_mut(orientation, index) else {
            return Err(FreqGridError::InvalidSlot { orientation, index });
        };
        voice.waveform = waveform;
        if let Some(handle) = voice.handle {
            backend.set_waveform(&handle, waveform)?;
        }
        Ok(())
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Returns the selected voice, or `None` if the pools are inconsistent.
    pub fn selected(&self) -> Option<&Voice> {
        self.voice(self.selection.orientation, self.selection.index)
    }

    /// Moves the selection to the next line of the given orientation,
    /// wrapping at the end. Switching orientation keeps the running index.
    pub fn select_next(&mut self, orientation: Orientation) {
        let count = self.count(orientation);
        if count == 0 {
            return;
        }
        self.selection.orientation = orientation;
        self.selection.index = (self.selection.index + 1) % count;
    }

    pub fn select_previous(&mut self, orientation: Orientation) {
        let count = self.count(orientation);
        if count == 0 {
            return;
        }
        self.selection.orientation = orientation;
        self.selection.index = (self.selection.index + count - 1) % count;
    }

    /// Switches the selection to the other orientation's first line.
    pub fn toggle_selection_orientation(&mut self) {
        self.selection.orientation = self.selection.orientation.opposite();
        self.selection.index = 0;
    }

    fn clamp_selection(&mut self) {
        let count = self.count(self.selection.orientation);
        if count > 0 && self.selection.index >= count {
            self.selection.index = count - 1;
        }
    }
}

fn save_family(voices: &[Voice]) -> Vec<SavedVoice> {
    voices
        .iter()
        .map(|voice| SavedVoice {
            waveform: voice.waveform,
            frequency: voice.frequency,
            active: voice.active,
        })
        .collect()
}

fn build_family(
    backend: &mut BackendStack,
    orientation: Orientation,
    count: usize,
    saved: &[SavedVoice],
    positions: &[f32],
    default_waveform: Waveform,
) -> Vec<Voice> {
    (0..count)
        .map(|index| {
            let previous = saved.get(index);
            let waveform = previous.map_or(default_waveform, |s| s.waveform);
            let handle = match backend.create_voice(waveform) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    warn!(
                        orientation = %orientation,
                        index,
                        error = %err,
                        "voice allocation failed; slot stays silent"
                    );
                    None
                }
            };
            Voice {
                orientation,
                index,
                frequency: previous.map_or(DEFAULT_FREQ_HZ, |s| s.frequency),
                active: previous.is_some_and(|s| s.active),
                waveform,
                position: positions.get(index).copied().unwrap_or(0.0),
                handle,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, NullBackend};

    fn stack() -> BackendStack {
        BackendStack::new(Box::new(NullBackend::new()), None)
    }

    fn rebuild(pool: &mut VoicePool, backend: &mut BackendStack, vertical: usize, horizontal: usize) {
        let v_positions: Vec<f32> = (0..vertical).map(|i| i as f32 * 80.0).collect();
        let h_positions: Vec<f32> = (0..horizontal).map(|i| i as f32 * 80.0).collect();
        pool.rebuild(backend, vertical, horizontal, &v_positions, &h_positions);
    }

    #[test]
    fn rebuild_keeps_counts_in_sync() {
        let mut backend = stack();
        let mut pool = VoicePool::new(Waveform::Sine);
        rebuild(&mut pool, &mut backend, 3, 1);
        assert_eq!(pool.count(Orientation::Vertical), 3);
        assert_eq!(pool.count(Orientation::Horizontal), 1);

        rebuild(&mut pool, &mut backend, 5, 2);
        assert_eq!(pool.count(Orientation::Vertical), 5);
        assert_eq!(pool.count(Orientation::Horizontal), 2);
    }

    #[test]
    fn surviving_slots_keep_their_attributes_across_resize() {
        let mut backend = stack();
        let mut pool = VoicePool::new(Waveform::Sine);
        rebuild(&mut pool, &mut backend, 3, 1);

        pool.set_waveform(Orientation::Vertical, 1, Waveform::Square, &mut backend)
            .unwrap();
        pool.play(Orientation::Vertical, 1, 523.25, &mut backend);

        rebuild(&mut pool, &mut backend, 5, 1);
        rebuild(&mut pool, &mut backend, 3, 1);

        let voice = pool.voice(Orientation::Vertical, 1).unwrap();
        assert_eq!(voice.waveform, Waveform::Square);
        assert!((voice.frequency - 523.25).abs() < 1e-3);
        assert!(voice.active);
    }

    #[test]
    fn shrinking_does_not_leak_attributes_into_new_slots() {
        let mut backend = stack();
        let mut pool = VoicePool::new(Waveform::Sine);
        rebuild(&mut pool, &mut backend, 4, 1);
        pool.set_waveform(Orientation::Vertical, 3, Waveform::Sawtooth, &mut backend)
            .unwrap();

        rebuild(&mut pool, &mut backend, 2, 1);
        rebuild(&mut pool, &mut backend, 4, 1);

        // Slot 3 was dropped at count 2, so it comes back with defaults.
        let voice = pool.voice(Orientation::Vertical, 3).unwrap();
        assert_eq!(voice.waveform, Waveform::Sine);
        assert!(!voice.active);
    }

    #[test]
    fn rebuild_destroys_every_previous_handle_once() {
        let primary = NullBackend::new();
        let log = primary.call_log();
        let mut backend = BackendStack::new(Box::new(primary), None);

        let mut pool = VoicePool::new(Waveform::Sine);
        rebuild(&mut pool, &mut backend, 2, 2);
        log.clear();
        rebuild(&mut pool, &mut backend, 3, 2);

        let destroys: Vec<_> = log
            .snapshot()
            .into_iter()
            .filter(|call| matches!(call, BackendCall::Destroy(_)))
            .collect();
        assert_eq!(destroys.len(), 4);
    }

    #[test]
    fn selection_clamps_when_its_orientation_shrinks() {
        let mut backend = stack();
        let mut pool = VoicePool::new(Waveform::Sine);
        rebuild(&mut pool, &mut backend, 6, 1);
        for _ in 0..5 {
            pool.select_next(Orientation::Vertical);
        }
        assert_eq!(pool.selection().index, 5);

        rebuild(&mut pool, &mut backend, 2, 1);
        assert_eq!(pool.selection().index, 1);
        assert!(pool.selected().is_some());
    }

    #[test]
    fn selection_navigation_wraps_and_toggles() {
        let mut backend = stack();
        let mut pool = VoicePool::new(Waveform::Sine);
        rebuild(&mut pool, &mut backend, 3, 2);

        pool.select_previous(Orientation::Vertical);
        assert_eq!(pool.selection().index, 2);
        pool.select_next(Orientation::Vertical);
        assert_eq!(pool.selection().index, 0);

        pool.toggle_selection_orientation();
        assert_eq!(pool.selection().orientation, Orientation::Horizontal);
        assert_eq!(pool.selection().index, 0);
    }

    #[test]
    fn waveform_edit_on_missing_slot_reports_invalid_slot() {
        let mut backend = stack();
        let mut pool = VoicePool::new(Waveform::Sine);
        rebuild(&mut pool, &mut backend, 1, 1);

        let err = pool
            .set_waveform(Orientation::Vertical, 9, Waveform::Square, &mut backend)
            .unwrap_err();
        assert!(matches!(err, FreqGridError::InvalidSlot { index: 9, .. }));
    }

    #[test]
    fn stop_only_releases_active_voices() {
        let mut backend = stack();
        let mut pool = VoicePool::new(Waveform::Sine);
        rebuild(&mut pool, &mut backend, 1, 1);

        pool.play(Orientation::Vertical, 0, 220.0, &mut backend);
        pool.stop_all(&mut backend);
        assert!(!pool.voice(Orientation::Vertical, 0).unwrap().active);
    }

    #[test]
    fn play_records_state_even_without_a_backend_binding() {
        let mut backend = stack();
        let mut pool = VoicePool::new(Waveform::Sine);
        rebuild(&mut pool, &mut backend, 1, 1);
        // Sever the binding to simulate a failed allocation.
        pool.vertical[0].handle = None;

        pool.play(Orientation::Vertical, 0, 660.0, &mut backend);
        let voice = pool.voice(Orientation::Vertical, 0).unwrap();
        assert!(voice.active);
        assert_eq!(voice.frequency, 660.0);
    }

    #[test]
    fn teardown_calls_reach_the_backend() {
        let primary = NullBackend::new();
        let log = primary.call_log();
        let mut backend = BackendStack::new(Box::new(primary), None);
        let mut pool = VoicePool::new(Waveform::Sine);
        rebuild(&mut pool, &mut backend, 2, 1);

        log.clear();
        pool.destroy_all(&mut backend);
        assert_eq!(pool.count(Orientation::Vertical), 0);
        assert_eq!(pool.count(Orientation::Horizontal), 0);
        assert_eq!(log.snapshot().len(), 3);
    }
}
