//! Interval sweep over half-open `[from, to)` intervals
//!
//! Every interval contributes +1 at its start and -1 at its end. Deltas that
//! fall on the same instant are applied together, so an interval ending
//! exactly when another starts is not counted as overlapping.

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of concurrent intervals from `at` until the next step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyStep {
    pub at: Timestamp,
    pub count: usize,
}

/// Occupancy as a step function, one step per instant where the count changes
pub fn occupancy<I>(intervals: I) -> Vec<OccupancyStep>
where
    I: IntoIterator<Item = (Timestamp, Timestamp)>,
{
    let mut deltas: BTreeMap<Timestamp, i64> = BTreeMap::new();
    for (from, to) in intervals {
        *deltas.entry(from).or_insert(0) += 1;
        *deltas.entry(to).or_insert(0) -= 1;
    }

    let mut running: i64 = 0;
    let mut steps: Vec<OccupancyStep> = Vec::with_capacity(deltas.len());
    for (at, delta) in deltas {
        if delta == 0 {
            continue;
        }
        running += delta;
        steps.push(OccupancyStep {
            at,
            count: running.max(0) as usize,
        });
    }
    steps
}

/// Maximum number of intervals active at the same instant
pub fn peak_concurrency<I>(intervals: I) -> usize
where
    I: IntoIterator<Item = (Timestamp, Timestamp)>,
{
    occupancy(intervals)
        .iter()
        .map(|step| step.count)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2019, 12, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_nested_intervals() {
        assert_eq!(peak_concurrency(vec![(day(1), day(4)), (day(2), day(3))]), 2);
    }

    #[test]
    fn test_disjoint_intervals() {
        assert_eq!(peak_concurrency(vec![(day(1), day(2)), (day(3), day(4))]), 1);
    }

    #[test]
    fn test_touching_intervals_do_not_overlap() {
        assert_eq!(peak_concurrency(vec![(day(1), day(2)), (day(2), day(3))]), 1);
    }

    #[test]
    fn test_staggered_intervals() {
        let intervals = vec![
            (day(1), day(5)),
            (day(2), day(6)),
            (day(3), day(4)),
            (day(5), day(7)),
        ];
        assert_eq!(peak_concurrency(intervals), 3);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(peak_concurrency(Vec::new()), 0);
        assert!(occupancy(Vec::new()).is_empty());
    }

    #[test]
    fn test_occupancy_steps() {
        let steps = occupancy(vec![(day(1), day(4)), (day(2), day(3)), (day(4), day(5))]);
        let counts: Vec<(Timestamp, usize)> = steps.iter().map(|s| (s.at, s.count)).collect();

        // day 4: one interval ends while another starts
        assert_eq!(
            counts,
            vec![(day(1), 1), (day(2), 2), (day(3), 1), (day(5), 0)]
        );
    }
}
