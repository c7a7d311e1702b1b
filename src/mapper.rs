//! Command mapping
//!
//! Maps a mental state to a control vector through a declarative table. Each
//! state lists, per axis, either a fixed value or a uniform range to draw from.

use crate::error::PipelineError;
use crate::types::{Axis, ControlVector, MentalState};
use rand::Rng;

/// How one axis value is produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisDraw {
    /// Constant value; consumes no randomness
    Fixed(f64),
    /// Uniform draw in `[low, high)`
    Uniform { low: f64, high: f64 },
}

impl AxisDraw {
    pub const ZERO: AxisDraw = AxisDraw::Fixed(0.0);

    /// Smallest and largest value this draw can produce
    pub fn range(&self) -> (f64, f64) {
        match *self {
            AxisDraw::Fixed(v) => (v, v),
            AxisDraw::Uniform { low, high } => (low, high),
        }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            AxisDraw::Fixed(v) => v,
            AxisDraw::Uniform { low, high } => low + rng.gen::<f64>() * (high - low),
        }
    }
}

/// Per-axis draws for one state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandRanges {
    pub forward: AxisDraw,
    pub lateral: AxisDraw,
    pub vertical: AxisDraw,
}

impl CommandRanges {
    pub fn axis(&self, axis: Axis) -> &AxisDraw {
        match axis {
            Axis::Forward => &self.forward,
            Axis::Lateral => &self.lateral,
            Axis::Vertical => &self.vertical,
        }
    }
}

const fn uniform(low: f64, high: f64) -> AxisDraw {
    AxisDraw::Uniform { low, high }
}

/// Default state → range table
pub const DEFAULT_COMMAND_TABLE: [(MentalState, CommandRanges); 6] = [
    (
        MentalState::Forward,
        CommandRanges {
            forward: uniform(0.7, 1.0),
            lateral: AxisDraw::ZERO,
            vertical: AxisDraw::ZERO,
        },
    ),
    (
        MentalState::Reverse,
        CommandRanges {
            forward: uniform(-1.0, -0.7),
            lateral: AxisDraw::ZERO,
            vertical: AxisDraw::ZERO,
        },
    ),
    (
        MentalState::Left,
        CommandRanges {
            forward: AxisDraw::ZERO,
            lateral: uniform(-1.0, -0.7),
            vertical: AxisDraw::ZERO,
        },
    ),
    (
        MentalState::Right,
        CommandRanges {
            forward: AxisDraw::ZERO,
            lateral: uniform(0.7, 1.0),
            vertical: AxisDraw::ZERO,
        },
    ),
    (
        MentalState::Up,
        CommandRanges {
            forward: AxisDraw::ZERO,
            lateral: AxisDraw::ZERO,
            vertical: uniform(0.7, 1.0),
        },
    ),
    (
        MentalState::Neutral,
        CommandRanges {
            forward: uniform(-0.1, 0.1),
            lateral: uniform(-0.1, 0.1),
            vertical: uniform(0.0, 0.1),
        },
    ),
];

/// Validated state → range table
#[derive(Debug, Clone, PartialEq)]
pub struct CommandTable {
    /// Indexed by [`MentalState::index`]
    ranges: [CommandRanges; 6],
}

impl Default for CommandTable {
    fn default() -> Self {
        let mut ranges = [DEFAULT_COMMAND_TABLE[0].1; 6];
        for (state, r) in DEFAULT_COMMAND_TABLE {
            ranges[state.index()] = r;
        }
        Self { ranges }
    }
}

impl CommandTable {
    /// Build a custom table.
    ///
    /// Every state needs exactly one entry and every range must sit inside its
    /// axis bounds.
    pub fn new(entries: Vec<(MentalState, CommandRanges)>) -> Result<Self, PipelineError> {
        let mut ranges = [None; 6];

        for (state, r) in entries {
            for axis in Axis::ALL {
                let (lo, hi) = r.axis(axis).range();
                let (min, max) = axis.bounds();
                if !(lo <= hi && lo >= min && hi <= max) {
                    return Err(PipelineError::InvalidCommandTable(format!(
                        "{state}.{} range [{lo}, {hi}] outside [{min}, {max}]",
                        axis.as_str()
                    )));
                }
            }
            if ranges[state.index()].replace(r).is_some() {
                return Err(PipelineError::InvalidCommandTable(format!(
                    "duplicate entry for state {state}"
                )));
            }
        }

        let mut table = Self::default();
        for state in MentalState::ALL {
            match ranges[state.index()] {
                Some(r) => table.ranges[state.index()] = r,
                None => {
                    return Err(PipelineError::InvalidCommandTable(format!(
                        "missing entry for state {state}"
                    )))
                }
            }
        }
        Ok(table)
    }

    pub fn lookup(&self, state: MentalState) -> &CommandRanges {
        &self.ranges[state.index()]
    }

    /// Entries in [`MentalState::ALL`] order
    pub fn entries(&self) -> impl Iterator<Item = (MentalState, &CommandRanges)> + '_ {
        MentalState::ALL.into_iter().map(move |s| (s, self.lookup(s)))
    }
}

/// Maps states to control vectors using a [`CommandTable`]
#[derive(Debug, Clone, Default)]
pub struct CommandMapper {
    table: CommandTable,
}

impl CommandMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: CommandTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// Draw a control vector for `state`.
    ///
    /// Uniform axes draw in order forward, lateral, vertical; fixed axes draw nothing.
    pub fn map<R: Rng + ?Sized>(&self, state: MentalState, rng: &mut R) -> ControlVector {
        let ranges = self.table.lookup(state);
        let forward = ranges.forward.sample(rng);
        let lateral = ranges.lateral.sample(rng);
        let vertical = ranges.vertical.sample(rng);
        ControlVector::new(forward, lateral, vertical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Every `gen::<f64>()` from this rng returns exactly 0.5
    fn midpoint_rng() -> StepRng {
        StepRng::new(1 << 63, 0)
    }

    #[test]
    fn test_forward_midpoint() {
        let mapper = CommandMapper::new();
        let v = mapper.map(MentalState::Forward, &mut midpoint_rng());
        assert!((v.forward() - 0.85).abs() < 1e-12);
        assert_eq!(v.lateral(), 0.0);
        assert_eq!(v.vertical(), 0.0);
    }

    #[test]
    fn test_neutral_zero_draw() {
        let mapper = CommandMapper::new();
        let v = mapper.map(MentalState::Neutral, &mut StepRng::new(0, 0));
        assert_eq!(v, ControlVector::new(-0.1, -0.1, 0.0));
    }

    #[test]
    fn test_outputs_stay_in_state_ranges() {
        let mapper = CommandMapper::new();
        let mut rng = StdRng::seed_from_u64(21);

        for (state, ranges) in DEFAULT_COMMAND_TABLE {
            for _ in 0..500 {
                let v = mapper.map(state, &mut rng);
                for axis in Axis::ALL {
                    let value = v.get(axis);
                    let (lo, hi) = ranges.axis(axis).range();
                    let (min, max) = axis.bounds();
                    assert!(value >= lo && value <= hi, "{state} {value}");
                    assert!(value >= min && value <= max);
                }
            }
        }
    }

    #[test]
    fn test_fixed_axes_consume_no_draws() {
        let mapper = CommandMapper::new();
        let mut a = StdRng::seed_from_u64(4);
        let mut b = StdRng::seed_from_u64(4);

        mapper.map(MentalState::Up, &mut a);
        let _: f64 = b.gen();
        let next_a: u64 = a.gen();
        let next_b: u64 = b.gen();
        assert_eq!(next_a, next_b);
    }

    #[test]
    fn test_default_table_covers_every_state() {
        let table = CommandTable::new(DEFAULT_COMMAND_TABLE.to_vec()).unwrap();
        assert_eq!(table, CommandTable::default());
    }

    #[test]
    fn test_custom_table_validation() {
        let mut entries = DEFAULT_COMMAND_TABLE.to_vec();
        entries.pop();
        assert!(matches!(
            CommandTable::new(entries),
            Err(PipelineError::InvalidCommandTable(_))
        ));

        let mut entries = DEFAULT_COMMAND_TABLE.to_vec();
        entries[4].1.vertical = uniform(-0.5, 1.0);
        assert!(CommandTable::new(entries).is_err());
    }

    #[test]
    fn test_custom_table_is_consulted() {
        let mut entries = DEFAULT_COMMAND_TABLE.to_vec();
        entries[0].1.forward = AxisDraw::Fixed(0.5);
        let mapper = CommandMapper::with_table(CommandTable::new(entries).unwrap());

        let v = mapper.map(MentalState::Forward, &mut StepRng::new(0, 1));
        assert_eq!(v, ControlVector::new(0.5, 0.0, 0.0));
    }
}
