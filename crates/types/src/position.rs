//! Horizontal position mapping.
//!
//! Every tree position is mapped to a real number so that an in-order walk
//! of the tree visits positions in increasing value. The root owns the
//! interval `[0, (K / ceil(f/2)) * f]`; each child owns one of `f` equal
//! slices of its parent's interval. A node's value is not the midpoint of
//! its interval but the end of the first `ceil(f/2)` of `f` equal divisions,
//! which places the node between its `ceil(f/2)`-th and `ceil(f/2)+1`-th
//! child subtrees.
//!
//! The arithmetic order below must not be changed: nodes at deep levels are
//! numerically close and a different division order can swap them.

use crate::{ConfigurationError, Fanout, PositionValue, TreePosition};
use std::collections::HashMap;

/// Default scale constant K.
pub const DEFAULT_POSITION_SCALE: i64 = 100;

/// Interval owned by a position.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Interval {
    lower: f64,
    upper: f64,
}

/// Memoized mapping from tree positions to horizontal values.
///
/// One mapper serves exactly one `(fanout, K)` configuration; the cache is
/// owned by the instance, so values from two mappers never mix.
#[derive(Debug, Clone)]
pub struct PositionMapper {
    fanout: Fanout,
    scale: i64,
    ceiled_half_fanout: u16,
    intervals: HashMap<TreePosition, Interval>,
}

impl PositionMapper {
    /// Create a mapper for the given fanout and scale K.
    pub fn new(fanout: Fanout, scale: i64) -> Result<Self, ConfigurationError> {
        if fanout < 2 {
            return Err(ConfigurationError::InvalidFanout(fanout));
        }
        if scale < 0 {
            return Err(ConfigurationError::NegativeScale(scale));
        }

        Ok(Self {
            fanout,
            scale,
            ceiled_half_fanout: fanout.div_ceil(2),
            intervals: HashMap::new(),
        })
    }

    /// Create a mapper with [`DEFAULT_POSITION_SCALE`].
    pub fn with_default_scale(fanout: Fanout) -> Result<Self, ConfigurationError> {
        Self::new(fanout, DEFAULT_POSITION_SCALE)
    }

    pub fn fanout(&self) -> Fanout {
        self.fanout
    }

    pub fn scale(&self) -> i64 {
        self.scale
    }

    /// Number of memoized positions.
    pub fn cached(&self) -> usize {
        self.intervals.len()
    }

    /// Horizontal value of a position.
    pub fn value(&mut self, position: TreePosition) -> PositionValue {
        let interval = self.interval(position);
        let f = self.fanout as f64;
        PositionValue(
            interval.lower + ((interval.upper - interval.lower) / f) * self.ceiled_half_fanout as f64,
        )
    }

    fn interval(&mut self, position: TreePosition) -> Interval {
        if let Some(interval) = self.intervals.get(&position) {
            return *interval;
        }

        let f = self.fanout as f64;
        let interval = if position.level == 0 {
            Interval {
                lower: 0.0,
                upper: (self.scale as f64 / self.ceiled_half_fanout as f64) * f,
            }
        } else {
            let fanout = self.fanout as u64;
            let parent = self.interval(TreePosition::new(
                position.level - 1,
                position.number / fanout,
            ));
            // Width of each child slice of the parent.
            let width = (parent.upper - parent.lower) / f;
            let lower = parent.lower + width * (position.number % fanout) as f64;
            Interval {
                lower,
                upper: lower + width,
            }
        };

        self.intervals.insert(position, interval);
        interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-order walk of a perfect tree: subtree of children `0..ceil(f/2)`,
    /// then the node, then the remaining children.
    fn in_order(level: u32, number: u64, fanout: u16, height: u32, out: &mut Vec<TreePosition>) {
        let half = fanout.div_ceil(2) as u64;
        let f = fanout as u64;
        if level < height {
            for k in 0..half {
                in_order(level + 1, number * f + k, fanout, height, out);
            }
        }
        out.push(TreePosition::new(level, number));
        if level < height {
            for k in half..f {
                in_order(level + 1, number * f + k, fanout, height, out);
            }
        }
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        assert_eq!(
            PositionMapper::new(1, 100).unwrap_err(),
            ConfigurationError::InvalidFanout(1)
        );
        assert_eq!(
            PositionMapper::new(2, -1).unwrap_err(),
            ConfigurationError::NegativeScale(-1)
        );
        assert!(PositionMapper::new(2, 0).is_ok());
    }

    #[test]
    fn test_root_value() {
        // f = 2: upper = (100 / 1) * 2 = 200, center = (200 / 2) * 1 = 100
        let mut mapper = PositionMapper::new(2, 100).unwrap();
        assert_eq!(mapper.value(TreePosition::ROOT).get(), 100.0);

        // f = 3: upper = (100 / 2) * 3 = 150, center = (150 / 3) * 2 = 100
        let mut mapper = PositionMapper::new(3, 100).unwrap();
        assert_eq!(mapper.value(TreePosition::ROOT).get(), 100.0);
    }

    #[test]
    fn test_first_level_values_fanout_two() {
        let mut mapper = PositionMapper::new(2, 100).unwrap();
        // 1:0 owns [0, 100], center 50; 1:1 owns [100, 200], center 150.
        assert_eq!(mapper.value(TreePosition::new(1, 0)).get(), 50.0);
        assert_eq!(mapper.value(TreePosition::new(1, 1)).get(), 150.0);
        // 2:1 owns [50, 100], center 75.
        assert_eq!(mapper.value(TreePosition::new(2, 1)).get(), 75.0);
    }

    #[test]
    fn test_in_order_walk_is_strictly_increasing() {
        for fanout in 2..=5u16 {
            let height = if fanout == 2 { 6 } else { 4 };
            let mut walk = Vec::new();
            in_order(0, 0, fanout, height, &mut walk);

            let mut mapper = PositionMapper::new(fanout, 100).unwrap();
            let values: Vec<_> = walk.iter().map(|p| mapper.value(*p)).collect();
            for (i, pair) in values.windows(2).enumerate() {
                assert!(
                    pair[0] < pair[1],
                    "fanout {}: {} !< {}",
                    fanout,
                    walk[i],
                    walk[i + 1]
                );
            }
        }
    }

    #[test]
    fn test_memoization_is_idempotent() {
        let mut mapper = PositionMapper::new(3, 100).unwrap();
        let position = TreePosition::new(5, 200);
        let first = mapper.value(position);
        assert!(mapper.cached() >= 6);
        let second = mapper.value(position);
        assert_eq!(first.get().to_bits(), second.get().to_bits());

        let mut fresh = PositionMapper::new(3, 100).unwrap();
        assert_eq!(fresh.value(position).get().to_bits(), first.get().to_bits());
    }
}
