use rand::Rng;
use serde::{Deserialize, Serialize};

/// Strategy for deriving line positions from a single pointer coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpacingMode {
    /// Fixed gap, lines centered symmetrically around the pointer.
    Equal,
    /// Gap compressed or stretched by the other axis's pointer position,
    /// producing contrary motion between the two orientations.
    Dynamic,
    /// Gaps drawn from a precomputed random table.
    Random,
}

impl SpacingMode {
    pub const ALL: [SpacingMode; 3] = [SpacingMode::Equal, SpacingMode::Dynamic, SpacingMode::Random];

    /// Next mode in registry order, wrapping.
    pub fn next(self) -> Self {
        match self {
            SpacingMode::Equal => SpacingMode::Dynamic,
            SpacingMode::Dynamic => SpacingMode::Random,
            SpacingMode::Random => SpacingMode::Equal,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SpacingMode::Equal => "Equal",
            SpacingMode::Dynamic => "Contrary Motion",
            SpacingMode::Random => "Random",
        }
    }
}

/// Precomputed gaps shared by both orientations in random mode.
///
/// One entry exists per line across both orientations combined; vertical
/// lines slice from offset 0, horizontal lines from the vertical count.
/// Reads never mutate the table: a table left stale by an asymmetric count
/// change is cycled to cover the requested slice instead of regenerated
/// mid-query or indexed out of bounds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RandomSpacingTable {
    gaps: Vec<f32>,
}

impl RandomSpacingTable {
    /// Replaces the table with freshly drawn gaps, one per line.
    pub fn regenerate(
        &mut self,
        total_lines: usize,
        min_gap: f32,
        max_gap: f32,
        rng: &mut impl Rng,
    ) {
        self.gaps.clear();
        for _ in 0..total_lines {
            self.gaps.push(rng.random_range(min_gap..max_gap));
        }
    }

    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    fn gap(&self, index: usize) -> Option<f32> {
        if self.gaps.is_empty() {
            None
        } else {
            Some(self.gaps[index % self.gaps.len()])
        }
    }
}

/// Layout inputs for one orientation's line positions.
#[derive(Debug, Clone, Copy)]
pub struct SpacingContext<'a> {
    pub mode: SpacingMode,
    /// Normalized pointer position on the *other* axis, consumed by
    /// [`SpacingMode::Dynamic`].
    pub cross_axis_norm: f32,
    /// Gap used by equal mode and as the dynamic mode baseline.
    pub base_gap: f32,
    pub table: &'a RandomSpacingTable,
    /// Offset of this orientation's slice into the combined random table.
    pub table_offset: usize,
}

/// Computes the ordered line positions for one orientation.
///
/// The returned list always has exactly `line_count` entries (empty for a
/// zero count, which callers rule out by clamping).
pub fn positions(pointer: f32, line_count: usize, ctx: &SpacingContext) -> Vec<f32> {
    if line_count == 0 {
        return Vec::new();
    }

    match ctx.mode {
        SpacingMode::Equal => uniform_positions(pointer, line_count, ctx.base_gap),
        SpacingMode::Dynamic => {
            let compression = 1.5 + ctx.cross_axis_norm.clamp(0.0, 1.0) * (0.3 - 1.5);
            uniform_positions(pointer, line_count, ctx.base_gap * compression)
        }
        SpacingMode::Random => random_positions(pointer, line_count, ctx),
    }
}

fn uniform_positions(pointer: f32, line_count: usize, gap: f32) -> Vec<f32> {
    let total_width = (line_count - 1) as f32 * gap;
    let start = pointer - total_width / 2.0;
    (0..line_count).map(|i| start + i as f32 * gap).collect()
}

fn random_positions(pointer: f32, line_count: usize, ctx: &SpacingContext) -> Vec<f32> {
    if ctx.table.is_empty() {
        return uniform_positions(pointer, line_count, ctx.base_gap);
    }

    let gap_at = |i: usize| ctx.table.gap(ctx.table_offset + i).unwrap_or(ctx.base_gap);
    let total_width: f32 = (0..line_count - 1).map(|i| gap_at(i)).sum();

    let mut current = pointer - total_width / 2.0;
    let mut result = Vec::with_capacity(line_count);
    result.push(current);
    for i in 0..line_count - 1 {
        current += gap_at(i);
        result.push(current);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn context(mode: SpacingMode, table: &RandomSpacingTable) -> SpacingContext<'_> {
        SpacingContext {
            mode,
            cross_axis_norm: 0.5,
            base_gap: 80.0,
            table,
            table_offset: 0,
        }
    }

    fn mean(values: &[f32]) -> f32 {
        values.iter().sum::<f32>() / values.len() as f32
    }

    #[test]
    fn equal_mode_centers_lines_on_pointer() {
        let table = RandomSpacingTable::default();
        for count in 1..=8 {
            let result = positions(400.0, count, &context(SpacingMode::Equal, &table));
            assert_eq!(result.len(), count);
            assert!((mean(&result) - 400.0).abs() < 1e-3);
        }
    }

    #[test]
    fn dynamic_mode_compresses_as_cross_axis_advances() {
        let table = RandomSpacingTable::default();
        let mut loose = context(SpacingMode::Dynamic, &table);
        loose.cross_axis_norm = 0.0;
        let mut tight = context(SpacingMode::Dynamic, &table);
        tight.cross_axis_norm = 1.0;

        let wide = positions(0.0, 4, &loose);
        let narrow = positions(0.0, 4, &tight);
        let span = |p: &[f32]| p[p.len() - 1] - p[0];
        assert!((span(&wide) - 3.0 * 80.0 * 1.5).abs() < 1e-3);
        assert!((span(&narrow) - 3.0 * 80.0 * 0.3).abs() < 1e-2);
    }

    #[test]
    fn random_mode_is_centered_and_increasing() {
        let mut table = RandomSpacingTable::default();
        let mut rng = StdRng::seed_from_u64(7);
        table.regenerate(6, 20.0, 150.0, &mut rng);

        let result = positions(500.0, 5, &context(SpacingMode::Random, &table));
        assert_eq!(result.len(), 5);
        for pair in result.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        let midpoint = (result[0] + result[result.len() - 1]) / 2.0;
        assert!((midpoint - 500.0).abs() < 1e-2);
    }

    #[test]
    fn short_table_cycles_instead_of_panicking() {
        let mut table = RandomSpacingTable::default();
        let mut rng = StdRng::seed_from_u64(7);
        table.regenerate(2, 20.0, 150.0, &mut rng);

        // Requested slice extends well past the stale two-entry table.
        let mut ctx = context(SpacingMode::Random, &table);
        ctx.table_offset = 5;
        let result = positions(0.0, 8, &ctx);
        assert_eq!(result.len(), 8);
    }

    #[test]
    fn empty_table_falls_back_to_equal_layout() {
        let table = RandomSpacingTable::default();
        let random = positions(100.0, 3, &context(SpacingMode::Random, &table));
        let equal = positions(100.0, 3, &context(SpacingMode::Equal, &table));
        assert_eq!(random, equal);
    }

    #[test]
    fn mode_cycle_visits_all_modes() {
        let mut mode = SpacingMode::Equal;
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(mode);
            mode = mode.next();
        }
        assert_eq!(mode, SpacingMode::Equal);
        assert_eq!(seen, SpacingMode::ALL);
    }
}
