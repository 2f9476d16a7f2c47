use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tracing::warn;

use crate::backend::{AudioBackend, BackendStack};
use crate::config::EngineConfig;
use crate::gesture::{merge, GestureRecorder, PointerState, RecorderMode};
use crate::scale::{Axis, Scale};
use crate::spacing::{self, RandomSpacingTable, SpacingContext, SpacingMode};
use crate::treatment::{self, Treatment};
use crate::voice::{Orientation, Selection, Voice, VoicePool, Waveform};

const DEFAULT_VERTICAL_LINES: usize = 3;
const DEFAULT_HORIZONTAL_LINES: usize = 1;
const TRANSPOSE_LIMIT: i32 = 24;

/// Discrete commands a host can issue against the instrument.
///
/// Hosts translate their own key maps or UI events into this closed set;
/// anything that does not fit is dropped at that boundary. Out-of-range
/// payload effects (line counts, transpose) are clamped here, never
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetScale(Scale),
    SetTreatment(Treatment),
    TransposeUp,
    TransposeDown,
    TransposeReset,
    AddLine(Orientation),
    RemoveLine(Orientation),
    CycleSpacingMode,
    /// Assigns a waveform to the currently selected voice.
    SetWaveform(Waveform),
    SelectNext(Orientation),
    SelectPrevious(Orientation),
    ToggleSelectionOrientation,
    ToggleRecording,
    TogglePlayback,
}

/// Renderer-facing view of one voice.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceView {
    pub orientation: Orientation,
    pub index: usize,
    pub frequency: f32,
    pub active: bool,
    pub waveform: Waveform,
    pub position: f32,
}

impl From<&Voice> for VoiceView {
    fn from(voice: &Voice) -> Self {
        Self {
            orientation: voice.orientation,
            index: voice.index,
            frequency: voice.frequency,
            active: voice.active,
            waveform: voice.waveform,
            position: voice.position,
        }
    }
}

/// Serializable bundle of everything a renderer reads per tick.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub scale: Scale,
    pub treatment: Treatment,
    pub transpose: i32,
    pub spacing_mode: SpacingMode,
    pub recorder: RecorderMode,
    pub recorded_events: usize,
    pub selection: Selection,
    pub vertical: Vec<VoiceView>,
    pub horizontal: Vec<VoiceView>,
}

/// The whole instrument as one owned aggregate.
///
/// All mutation flows through [`Instrument::on_pointer`],
/// [`Instrument::on_command`] and [`Instrument::tick`], called from a single
/// thread; input callbacks apply their state change fully before the next
/// tick observes it. Time is threaded in as milliseconds rather than read
/// from a clock, which keeps every behavior reproducible under test.
pub struct Instrument {
    config: EngineConfig,
    scale: Scale,
    treatment: Treatment,
    transpose: i32,
    spacing_mode: SpacingMode,
    spacing_table: RandomSpacingTable,
    pool: VoicePool,
    backend: BackendStack,
    recorder: GestureRecorder,
    live: PointerState,
    rng: StdRng,
}

impl Instrument {
    /// Creates an instrument with default configuration and OS-seeded
    /// randomness.
    pub fn new(primary: Box<dyn AudioBackend>, secondary: Option<Box<dyn AudioBackend>>) -> Self {
        Self::build(primary, secondary, EngineConfig::default(), StdRng::from_os_rng())
    }

    pub fn with_config(
        primary: Box<dyn AudioBackend>,
        secondary: Option<Box<dyn AudioBackend>>,
        config: EngineConfig,
    ) -> Self {
        Self::build(primary, secondary, config, StdRng::from_os_rng())
    }

    /// Creates an instrument whose stochastic behavior (random spacing,
    /// improvise treatment) is fully determined by `seed`.
    pub fn with_seed(
        primary: Box<dyn AudioBackend>,
        secondary: Option<Box<dyn AudioBackend>>,
        config: EngineConfig,
        seed: u64,
    ) -> Self {
        Self::build(primary, secondary, config, StdRng::seed_from_u64(seed))
    }

    fn build(
        primary: Box<dyn AudioBackend>,
        secondary: Option<Box<dyn AudioBackend>>,
        config: EngineConfig,
        rng: StdRng,
    ) -> Self {
        let live = PointerState::new(config.canvas_width / 2.0, config.canvas_height / 2.0, false);
        let mut instrument = Self {
            config,
            scale: Scale::Chromatic,
            treatment: Treatment::Chord,
            transpose: 0,
            spacing_mode: SpacingMode::Equal,
            spacing_table: RandomSpacingTable::default(),
            pool: VoicePool::new(Waveform::Sine),
            backend: BackendStack::new(primary, secondary),
            recorder: GestureRecorder::new(),
            live,
            rng,
        };
        instrument.rebuild_voices(DEFAULT_VERTICAL_LINES, DEFAULT_HORIZONTAL_LINES);
        instrument
    }

    /// Pointer input callback: position in canvas units plus the pressed or
    /// dragging state. Feeds an active recording and releases every voice
    /// when the interaction ends.
    pub fn on_pointer(&mut self, x: f32, y: f32, interacting: bool, now_ms: u64) {
        let was_interacting = self.live.interacting;
        self.live = PointerState::new(x, y, interacting);
        self.recorder.record(x, y, interacting, now_ms);
        if was_interacting && !interacting {
            self.pool.stop_all(&mut self.backend);
        }
    }

    /// Applies one discrete command. Never fails: rejected conditions are
    /// reported and dropped.
    pub fn on_command(&mut self, command: Command, now_ms: u64) {
        match command {
            Command::SetScale(scale) => self.scale = scale,
            Command::SetTreatment(treatment) => self.treatment = treatment,
            Command::TransposeUp => self.set_transpose(self.transpose + 1),
            Command::TransposeDown => self.set_transpose(self.transpose - 1),
            Command::TransposeReset => self.transpose = 0,
            Command::AddLine(orientation) => {
                let requested = self.pool.count(orientation) + 1;
                self.change_line_count(orientation, requested);
            }
            Command::RemoveLine(orientation) => {
                let requested = self.pool.count(orientation).saturating_sub(1);
                self.change_line_count(orientation, requested);
            }
            Command::CycleSpacingMode => {
                self.spacing_mode = self.spacing_mode.next();
                if self.spacing_mode == SpacingMode::Random {
                    self.regenerate_spacing_table();
                }
            }
            Command::SetWaveform(waveform) => {
                let selection = self.pool.selection();
                if let Err(err) = self.pool.set_waveform(
                    selection.orientation,
                    selection.index,
                    waveform,
                    &mut self.backend,
                ) {
                    warn!(error = %err, "waveform edit failed");
                }
            }
            Command::SelectNext(orientation) => self.pool.select_next(orientation),
            Command::SelectPrevious(orientation) => self.pool.select_previous(orientation),
            Command::ToggleSelectionOrientation => self.pool.toggle_selection_orientation(),
            Command::ToggleRecording => {
                if let Err(err) = self.recorder.toggle_recording(now_ms) {
                    warn!(error = %err, "recording toggle rejected");
                }
            }
            Command::TogglePlayback => {
                if let Err(err) = self.recorder.toggle_playback(now_ms) {
                    warn!(error = %err, "playback toggle rejected");
                }
            }
        }
    }

    /// One render-rate update: resolves the effective pointer from live and
    /// replayed input, repositions the grid lines and runs the active
    /// treatment. Safe to call regardless of backend health.
    pub fn tick(&mut self, now_ms: u64) {
        let played = self.recorder.playback(self.live, now_ms);
        let (effective, should_play) = merge(self.live, played);
        if !should_play {
            return;
        }

        let vertical = self.pool.count(Orientation::Vertical);
        let horizontal = self.pool.count(Orientation::Horizontal);
        let (v_pos, h_pos) = self.line_positions(effective, vertical, horizontal);
        self.pool.set_positions(Orientation::Vertical, &v_pos);
        self.pool.set_positions(Orientation::Horizontal, &h_pos);

        let (x_norm, y_norm) = self.normalized(effective.x, effective.y);
        let freq_x =
            self.scale
                .map_to_frequency(x_norm, Axis::X, self.config.axis(Axis::X), self.transpose);
        let freq_y =
            self.scale
                .map_to_frequency(y_norm, Axis::Y, self.config.axis(Axis::Y), self.transpose);

        treatment::apply(
            self.treatment,
            &mut self.pool,
            &mut self.backend,
            freq_x,
            freq_y,
            now_ms,
            &mut self.rng,
        );
    }

    /// Updates the canvas extent used to normalize pointer coordinates.
    pub fn set_canvas_size(&mut self, width: f32, height: f32) {
        self.config.canvas_width = width.max(1.0);
        self.config.canvas_height = height.max(1.0);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn treatment(&self) -> Treatment {
        self.treatment
    }

    pub fn transpose(&self) -> i32 {
        self.transpose
    }

    pub fn spacing_mode(&self) -> SpacingMode {
        self.spacing_mode
    }

    pub fn recorder(&self) -> &GestureRecorder {
        &self.recorder
    }

    pub fn pointer(&self) -> PointerState {
        self.live
    }

    pub fn voices(&self, orientation: Orientation) -> &[Voice] {
        self.pool.voices(orientation)
    }

    pub fn selection(&self) -> Selection {
        self.pool.selection()
    }

    pub fn selected_voice(&self) -> Option<&Voice> {
        self.pool.selected()
    }

    /// Captures the public state a renderer presents each frame.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            scale: self.scale,
            treatment: self.treatment,
            transpose: self.transpose,
            spacing_mode: self.spacing_mode,
            recorder: self.recorder.mode(),
            recorded_events: self.recorder.events().len(),
            selection: self.pool.selection(),
            vertical: self.pool.voices(Orientation::Vertical).iter().map(Into::into).collect(),
            horizontal: self
                .pool
                .voices(Orientation::Horizontal)
                .iter()
                .map(Into::into)
                .collect(),
        }
    }

    fn set_transpose(&mut self, semitones: i32) {
        self.transpose = semitones.clamp(-TRANSPOSE_LIMIT, TRANSPOSE_LIMIT);
    }

    fn change_line_count(&mut self, orientation: Orientation, requested: usize) {
        let clamped = self.config.clamp_line_count(requested);
        if clamped == self.pool.count(orientation) {
            return;
        }
        let (vertical, horizontal) = match orientation {
            Orientation::Vertical => (clamped, self.pool.count(Orientation::Horizontal)),
            Orientation::Horizontal => (self.pool.count(Orientation::Vertical), clamped),
        };
        self.rebuild_voices(vertical, horizontal);
    }

    /// Rebuilds the pool for new line counts. The random table is refreshed
    /// first because its length must track the combined line count.
    fn rebuild_voices(&mut self, vertical: usize, horizontal: usize) {
        self.spacing_table.regenerate(
            vertical + horizontal,
            self.config.min_random_gap,
            self.config.max_random_gap,
            &mut self.rng,
        );
        let (v_pos, h_pos) = self.line_positions(self.live, vertical, horizontal);
        self.pool
            .rebuild(&mut self.backend, vertical, horizontal, &v_pos, &h_pos);
    }

    fn regenerate_spacing_table(&mut self) {
        let total = self.pool.count(Orientation::Vertical) + self.pool.count(Orientation::Horizontal);
        self.spacing_table.regenerate(
            total,
            self.config.min_random_gap,
            self.config.max_random_gap,
            &mut self.rng,
        );
    }

    fn line_positions(
        &self,
        pointer: PointerState,
        vertical: usize,
        horizontal: usize,
    ) -> (Vec<f32>, Vec<f32>) {
        let (x_norm, y_norm) = self.normalized(pointer.x, pointer.y);
        let v_pos = spacing::positions(
            pointer.x,
            vertical,
            &SpacingContext {
                mode: self.spacing_mode,
                cross_axis_norm: y_norm,
                base_gap: self.config.base_gap,
                table: &self.spacing_table,
                table_offset: 0,
            },
        );
        let h_pos = spacing::positions(
            pointer.y,
            horizontal,
            &SpacingContext {
                mode: self.spacing_mode,
                cross_axis_norm: x_norm,
                base_gap: self.config.base_gap,
                table: &self.spacing_table,
                table_offset: vertical,
            },
        );
        (v_pos, h_pos)
    }

    fn normalized(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x / self.config.canvas_width).clamp(0.0, 1.0),
            (y / self.config.canvas_height).clamp(0.0, 1.0),
        )
    }
}

impl std::fmt::Debug for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("scale", &self.scale)
            .field("treatment", &self.treatment)
            .field("transpose", &self.transpose)
            .field("spacing_mode", &self.spacing_mode)
            .field("recorder", &self.recorder.mode())
            .finish()
    }
}
