//! Adaptive Who-Is window planning.
//!
//! Windows tile the configured instance range with no gaps or overlaps.
//! Where a prior scan saw many devices the windows narrow, so fewer I-Am
//! responses collide on the wire; where it saw none, one full-width
//! broadcast covers the whole stretch.

use std::collections::BTreeSet;

use bacmap_core::DeviceInstance;
use bacmap_graph::TopologyGraph;

/// One inclusive Who-Is instance range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub low: DeviceInstance,
    pub high: DeviceInstance,
}

impl ScanWindow {
    pub fn width(&self) -> u32 {
        self.high.get() - self.low.get() + 1
    }
}

/// Plans windows from the prior scan's device density.
///
/// Callers guarantee `low <= high` and both step sizes >= 1; the scanner
/// validates this in its configuration gate before planning.
pub struct WindowPlanner {
    known: BTreeSet<u32>,
    low_limit: u32,
    high_limit: u32,
    empty_step_size: u32,
    full_step_size: u32,
}

impl WindowPlanner {
    pub fn new(
        prior: &TopologyGraph,
        low: DeviceInstance,
        high: DeviceInstance,
        empty_step_size: u32,
        full_step_size: u32,
    ) -> Self {
        Self {
            known: prior.device_instances(),
            low_limit: low.get(),
            high_limit: high.get(),
            empty_step_size,
            full_step_size,
        }
    }

    /// The end of the window starting at `cursor`: full width unless the
    /// prior graph holds `full_step_size` instances inside
    /// `[cursor, cursor + empty_step_size)`, in which case the window
    /// truncates at the instance where the count is reached.
    fn window_end(&self, cursor: u32) -> u32 {
        let probe_end = cursor.saturating_add(self.empty_step_size);
        let mut seen = 0u32;
        for &instance in self.known.range(cursor..probe_end) {
            seen += 1;
            if seen >= self.full_step_size {
                return instance.min(self.high_limit);
            }
        }
        probe_end.min(self.high_limit)
    }

    /// Windows tiling `[low_limit, high_limit]`, in order.
    pub fn windows(&self) -> impl Iterator<Item = ScanWindow> + '_ {
        let mut cursor = self.low_limit;
        std::iter::from_fn(move || {
            if cursor > self.high_limit {
                return None;
            }
            let end = self.window_end(cursor);
            let window = ScanWindow {
                low: DeviceInstance::new(cursor).expect("cursor within instance range"),
                high: DeviceInstance::new(end).expect("window end clamped to high limit"),
            };
            cursor = end + 1;
            Some(window)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner(known: &[u32], low: u32, high: u32, empty: u32, full: u32) -> WindowPlanner {
        WindowPlanner {
            known: known.iter().copied().collect(),
            low_limit: low,
            high_limit: high,
            empty_step_size: empty,
            full_step_size: full,
        }
    }

    fn assert_tiles(planner: &WindowPlanner) {
        let windows: Vec<ScanWindow> = planner.windows().collect();
        assert!(!windows.is_empty());
        assert_eq!(windows[0].low.get(), planner.low_limit);
        assert_eq!(windows.last().unwrap().high.get(), planner.high_limit);
        for pair in windows.windows(2) {
            // No gaps, no overlaps.
            assert_eq!(pair[1].low.get(), pair[0].high.get() + 1);
        }
        for w in &windows {
            assert!(w.low <= w.high);
        }
    }

    #[test]
    fn sparse_range_uses_full_width_windows() {
        let p = planner(&[], 0, 10_000, 1000, 100);
        let windows: Vec<_> = p.windows().collect();
        assert_tiles(&p);
        // First window covers [0, 1000] — end equals low + empty step.
        assert_eq!(windows[0].high.get(), 1000);
    }

    #[test]
    fn dense_range_narrows_windows() {
        // 100 known devices packed right at the start.
        let known: Vec<u32> = (0..100).collect();
        let p = planner(&known, 0, 10_000, 1000, 100);
        let windows: Vec<_> = p.windows().collect();
        assert_tiles(&p);
        // Truncated at the 100th known instance (99), strictly shorter
        // than the empty step size.
        assert_eq!(windows[0].high.get(), 99);
        assert!(windows[0].width() < 1000);
        // Past the dense area, windows return to full width.
        assert_eq!(windows[1].low.get(), 100);
        assert_eq!(windows[1].high.get(), 1100);
    }

    #[test]
    fn below_threshold_density_keeps_full_width() {
        let known: Vec<u32> = (0..99).collect();
        let p = planner(&known, 0, 10_000, 1000, 100);
        let first = p.windows().next().unwrap();
        assert_eq!(first.high.get(), 1000);
    }

    #[test]
    fn last_window_clamps_to_high_limit() {
        let p = planner(&[], 0, 2500, 1000, 100);
        let windows: Vec<_> = p.windows().collect();
        assert_tiles(&p);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2].low.get(), 2002);
        assert_eq!(windows[2].high.get(), 2500);
    }

    #[test]
    fn tiling_holds_across_parameter_grid() {
        let known: Vec<u32> = (0..4000).filter(|i| i % 7 == 0).collect();
        for (low, high) in [(0u32, 4095u32), (10, 10), (500, 3999)] {
            for empty in [1u32, 13, 1000] {
                for full in [1u32, 5, 100] {
                    let p = planner(&known, low, high, empty, full);
                    assert_tiles(&p);
                }
            }
        }
    }

    #[test]
    fn single_instance_range_yields_one_window() {
        let p = planner(&[42], 42, 42, 1000, 1);
        let windows: Vec<_> = p.windows().collect();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].low.get(), 42);
        assert_eq!(windows[0].high.get(), 42);
    }

    #[test]
    fn planner_reads_density_from_prior_graph() {
        use bacmap_graph::{NodeKey, Property, PropertyValue};

        let mut prior = TopologyGraph::new();
        for instance in 0..50u32 {
            let key = NodeKey::device(DeviceInstance::new(instance).unwrap());
            prior.set_property(
                &key,
                Property::DeviceInstance,
                PropertyValue::Integer(i64::from(instance)),
            );
        }

        let p = WindowPlanner::new(
            &prior,
            DeviceInstance::new(0).unwrap(),
            DeviceInstance::new(10_000).unwrap(),
            1000,
            50,
        );
        let first = p.windows().next().unwrap();
        assert_eq!(first.high.get(), 49);
    }
}
