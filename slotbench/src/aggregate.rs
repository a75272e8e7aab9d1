use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::{BenchError, Result},
    feeder::GroupId,
    pool::Harvest,
};

/// Nearest-rank percentile: the element at 1-based rank `ceil(n * p / 100)` of the
/// ascending order of `values`.
///
/// ```rust
/// use slotbench::aggregate::percentile;
///
/// let values = [5, 3, 1, 4, 2];
/// assert_eq!(percentile(&values, 50.0).unwrap(), 3);
/// assert_eq!(percentile(&values, 100.0).unwrap(), 5);
/// assert_eq!(percentile(&values, 20.0).unwrap(), 1);
/// ```
pub fn percentile<T: Copy + PartialOrd>(values: &[T], p: f64) -> Result<T> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    percentile_of_sorted(&sorted, p)
}

fn percentile_of_sorted<T: Copy>(sorted: &[T], p: f64) -> Result<T> {
    if !(p > 0.0 && p <= 100.0) {
        return Err(BenchError::PercentileOutOfRange(p));
    }
    if sorted.is_empty() {
        return Err(BenchError::EmptyResult);
    }
    let rank = (sorted.len() as f64 * p / 100.0).ceil() as usize;
    Ok(sorted[rank.clamp(1, sorted.len()) - 1])
}

/// Summary of a set of latencies. `median` is the run's target percentile, which is
/// the 50th unless configured otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: usize,
    pub median: Duration,
    pub average: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl LatencyStats {
    /// Sorts `latencies` in place and summarizes them.
    pub fn from_latencies(latencies: &mut [Duration], p: f64) -> Result<Self> {
        latencies.sort_unstable();
        let median = percentile_of_sorted(latencies, p)?;
        let total: Duration = latencies.iter().sum();
        let average = match u32::try_from(latencies.len()) {
            Ok(n) => total / n,
            Err(_) => total.div_f64(latencies.len() as f64),
        };
        Ok(Self {
            count: latencies.len(),
            median,
            average,
            min: latencies[0],
            max: latencies[latencies.len() - 1],
        })
    }
}

/// Latencies of one caller-defined bucket of requests, in harvest order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatencyGroup {
    pub id: GroupId,
    pub name: String,
    pub latencies: Vec<Duration>,
}

/// Finalized statistics of a group. `stats` is `None` when the group never received
/// a latency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub id: GroupId,
    pub name: String,
    pub stats: Option<LatencyStats>,
}

/// Collects the latencies harvested during a run.
///
/// Nothing is derived until [`finalize`](LatencyAggregate::finalize), which runs once
/// after the final drain.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyAggregate {
    latencies: Vec<Duration>,
    groups: Vec<LatencyGroup>,
    per_group: bool,
}

/// Output of [`LatencyAggregate::finalize`].
#[derive(Clone, Debug, PartialEq)]
pub struct FinalizedLatencies {
    /// Every recorded latency, ascending.
    pub sorted: Vec<Duration>,
    pub overall: LatencyStats,
    /// Empty unless per-group tracking was enabled.
    pub groups: Vec<GroupStats>,
}

impl LatencyAggregate {
    pub fn new(group_names: &[String], per_group: bool) -> Self {
        let groups = if per_group {
            group_names
                .iter()
                .enumerate()
                .map(|(id, name)| LatencyGroup {
                    id,
                    name: name.clone(),
                    latencies: Vec::new(),
                })
                .collect()
        } else {
            Vec::new()
        };
        Self {
            latencies: Vec::new(),
            groups,
            per_group,
        }
    }

    pub fn count(&self) -> usize {
        self.latencies.len()
    }

    pub fn latencies(&self) -> &[Duration] {
        &self.latencies
    }

    pub fn groups(&self) -> &[LatencyGroup] {
        &self.groups
    }

    pub fn consume(&mut self, latency: Duration, group: Option<GroupId>) -> Result<()> {
        if let (true, Some(id)) = (self.per_group, group) {
            let group = self
                .groups
                .get_mut(id)
                .ok_or_else(|| BenchError::Config(format!("unknown latency group {id}")))?;
            group.latencies.push(latency);
        }
        self.latencies.push(latency);
        Ok(())
    }

    pub fn consume_harvest(&mut self, harvest: &Harvest) -> Result<()> {
        self.consume(harvest.latency, harvest.group)
    }

    pub fn finalize(mut self, p: f64) -> Result<FinalizedLatencies> {
        let overall = LatencyStats::from_latencies(&mut self.latencies, p)?;
        let groups = self
            .groups
            .into_iter()
            .map(|mut group| {
                let stats = if group.latencies.is_empty() {
                    None
                } else {
                    Some(LatencyStats::from_latencies(&mut group.latencies, p)?)
                };
                Ok(GroupStats {
                    id: group.id,
                    name: group.name,
                    stats,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(FinalizedLatencies {
            sorted: self.latencies,
            overall,
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn nearest_rank_percentile() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 50.0).unwrap(), 3.0);
        assert_eq!(percentile(&values, 100.0).unwrap(), 5.0);
        assert_eq!(percentile(&values, 20.0).unwrap(), 1.0);
        assert_eq!(percentile(&values, 21.0).unwrap(), 2.0);
        assert_eq!(percentile(&values, 0.01).unwrap(), 1.0);
        assert_eq!(percentile(&[7], 90.0).unwrap(), 7);
    }

    #[test]
    fn percentile_sorts_first() {
        let values = [ms(40), ms(10), ms(30), ms(20)];
        assert_eq!(percentile(&values, 50.0).unwrap(), ms(20));
        assert_eq!(percentile(&values, 75.0).unwrap(), ms(30));
    }

    #[test]
    fn percentile_rejects_bad_input() {
        assert!(matches!(percentile::<u32>(&[], 50.0), Err(BenchError::EmptyResult)));
        assert!(matches!(
            percentile(&[1, 2], 0.0),
            Err(BenchError::PercentileOutOfRange(_))
        ));
        assert!(matches!(
            percentile(&[1, 2], 100.1),
            Err(BenchError::PercentileOutOfRange(_))
        ));
    }

    #[test]
    fn stats_of_latencies() {
        let mut values = vec![ms(30), ms(10), ms(20), ms(40)];
        let stats = LatencyStats::from_latencies(&mut values, 50.0).unwrap();
        assert_eq!(values, vec![ms(10), ms(20), ms(30), ms(40)]);
        assert_eq!(
            stats,
            LatencyStats {
                count: 4,
                median: ms(20),
                average: ms(25),
                min: ms(10),
                max: ms(40),
            }
        );
    }

    #[test]
    fn empty_aggregate_has_no_result() {
        let aggregate = LatencyAggregate::new(&[], false);
        assert!(matches!(aggregate.finalize(50.0), Err(BenchError::EmptyResult)));
    }

    #[test]
    fn groups_are_isolated() {
        let names = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let mut aggregate = LatencyAggregate::new(&names, true);
        aggregate.consume(ms(1), Some(0)).unwrap();
        aggregate.consume(ms(100), Some(1)).unwrap();
        aggregate.consume(ms(3), Some(0)).unwrap();
        aggregate.consume(ms(200), Some(1)).unwrap();
        aggregate.consume(ms(5), None).unwrap();

        let done = aggregate.finalize(100.0).unwrap();
        assert_eq!(done.sorted, vec![ms(1), ms(3), ms(5), ms(100), ms(200)]);
        assert_eq!(done.overall.count, 5);

        let a = done.groups[0].stats.unwrap();
        assert_eq!((a.count, a.min, a.max), (2, ms(1), ms(3)));
        let b = done.groups[1].stats.unwrap();
        assert_eq!((b.count, b.min, b.max), (2, ms(100), ms(200)));
        assert_eq!(done.groups[2].name, "C");
        assert_eq!(done.groups[2].stats, None);
    }

    #[test]
    fn group_tags_ignored_without_tracking() {
        let names = vec!["A".to_string()];
        let mut aggregate = LatencyAggregate::new(&names, false);
        aggregate.consume(ms(1), Some(0)).unwrap();
        aggregate.consume(ms(2), Some(9)).unwrap();
        assert!(aggregate.groups().is_empty());
        assert!(aggregate.finalize(50.0).unwrap().groups.is_empty());
    }

    #[test]
    fn unknown_group_is_an_error() {
        let names = vec!["A".to_string()];
        let mut aggregate = LatencyAggregate::new(&names, true);
        assert!(aggregate.consume(ms(1), Some(3)).is_err());
        assert_eq!(aggregate.count(), 0);
    }
}
