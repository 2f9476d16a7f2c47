use serde::{Deserialize, Serialize};

use crate::error::{FreqGridError, Result};

/// Pointer state observed by the engine on a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
    pub interacting: bool,
}

impl PointerState {
    pub fn new(x: f32, y: f32, interacting: bool) -> Self {
        Self { x, y, interacting }
    }
}

/// One captured pointer sample, timed relative to the recording start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureEvent {
    pub x: f32,
    pub y: f32,
    pub interacting: bool,
    pub time_offset_ms: u64,
}

/// Exclusive recorder state: recording and playback never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderMode {
    Idle,
    Recording,
    Playing,
}

/// Captures pointer gestures and replays them as a looping automation track.
///
/// The event list is append-only while recording and read-only while
/// playing. Playback is cyclic: reaching the final event resets the cursor
/// and the playback epoch, so a recorded gesture repeats until stopped.
#[derive(Debug, Default)]
pub struct GestureRecorder {
    mode: RecorderMode,
    events: Vec<GestureEvent>,
    cursor: usize,
    /// Recording start or playback epoch, depending on mode.
    epoch_ms: u64,
}

impl Default for RecorderMode {
    fn default() -> Self {
        RecorderMode::Idle
    }
}

impl GestureRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> RecorderMode {
        self.mode
    }

    pub fn is_recording(&self) -> bool {
        self.mode == RecorderMode::Recording
    }

    pub fn is_playing(&self) -> bool {
        self.mode == RecorderMode::Playing
    }

    pub fn events(&self) -> &[GestureEvent] {
        &self.events
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Starts a fresh recording, or stops the one in progress.
    ///
    /// Rejected while playback is active; the rejection is reported to the
    /// caller and leaves every piece of state untouched.
    pub fn toggle_recording(&mut self, now_ms: u64) -> Result<()> {
        match self.mode {
            RecorderMode::Playing => Err(FreqGridError::Recorder(
                "cannot start recording while playback is active",
            )),
            RecorderMode::Recording => {
                self.mode = RecorderMode::Idle;
                Ok(())
            }
            RecorderMode::Idle => {
                self.events.clear();
                self.epoch_ms = now_ms;
                self.mode = RecorderMode::Recording;
                Ok(())
            }
        }
    }

    /// Starts looping playback of the recorded gesture, or stops it.
    ///
    /// Rejected while recording, and rejected when nothing has been
    /// recorded; neither rejection changes any state.
    pub fn toggle_playback(&mut self, now_ms: u64) -> Result<()> {
        match self.mode {
            RecorderMode::Recording => Err(FreqGridError::Recorder(
                "cannot start playback while recording is active",
            )),
            RecorderMode::Playing => {
                self.mode = RecorderMode::Idle;
                self.cursor = 0;
                Ok(())
            }
            RecorderMode::Idle => {
                if self.events.is_empty() {
                    return Err(FreqGridError::Recorder("no recorded gesture to play"));
                }
                self.cursor = 0;
                self.epoch_ms = now_ms;
                self.mode = RecorderMode::Playing;
                Ok(())
            }
        }
    }

    /// Appends a pointer sample while recording; a no-op otherwise.
    pub fn record(&mut self, x: f32, y: f32, interacting: bool, now_ms: u64) {
        if self.mode != RecorderMode::Recording {
            return;
        }
        self.events.push(GestureEvent {
            x,
            y,
            interacting,
            time_offset_ms: now_ms.saturating_sub(self.epoch_ms),
        });
    }

    /// Advances playback and returns the replayed pointer state.
    ///
    /// When playback is inactive (or the track is empty) the live pointer
    /// position is passed through with `interacting` forced off, so callers
    /// can feed the result straight into the merge policy.
    pub fn playback(&mut self, live: PointerState, now_ms: u64) -> PointerState {
        if self.mode != RecorderMode::Playing || self.events.is_empty() {
            return PointerState::new(live.x, live.y, false);
        }

        let elapsed = now_ms.saturating_sub(self.epoch_ms);
        while self.cursor < self.events.len() - 1
            && self.events[self.cursor + 1].time_offset_ms <= elapsed
        {
            self.cursor += 1;
        }

        // Loop: past the final event the track restarts from its first one.
        if self.cursor >= self.events.len() - 1 {
            self.cursor = 0;
            self.epoch_ms = now_ms;
        }

        let event = self.events[self.cursor];
        PointerState::new(event.x, event.y, event.interacting)
    }
}

/// Resolves the effective pointer for a tick from live and replayed input.
///
/// Live interaction always wins for sound production; otherwise the
/// replayed state drives it. The returned flag is the `should_play`
/// decision for the tick.
pub fn merge(live: PointerState, played: PointerState) -> (PointerState, bool) {
    if live.interacting {
        (live, true)
    } else {
        (played, played.interacting)
    }
}
