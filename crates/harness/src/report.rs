//! Completion-latency summaries for a finished run.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::step::StepResult;

/// Min/max/mean completion latency across passing nodes, relative to the
/// result window's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencyStats {
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
}

/// Computes latency statistics, or `None` when no node passed.
pub fn latency_stats(result: &StepResult) -> Option<LatencyStats> {
    let mut passes = result.passes.values();
    let first = passes.next()?.saturating_duration_since(result.started_at);
    let (min, max, sum, count) = passes.fold(
        (first, first, first.as_nanos(), 1u128),
        |(min, max, sum, count), pass| {
            let latency = pass.saturating_duration_since(result.started_at);
            (
                min.min(latency),
                max.max(latency),
                sum + latency.as_nanos(),
                count + 1,
            )
        },
    );
    Some(LatencyStats {
        min,
        max,
        mean: Duration::from_nanos((sum / count) as u64),
    })
}

/// Logs the run summary: pass count, result window, latency statistics and
/// the setup/shutdown phase durations bracketing the whole lifecycle.
pub fn report(result: &StepResult, started_at: Instant, finished_at: Instant) -> Option<LatencyStats> {
    tracing::info!(
        nodes = result.passes.len(),
        elapsed = ?result.window(),
        "simulation passed"
    );
    let stats = latency_stats(result);
    match &stats {
        Some(stats) => tracing::info!(
            min = ?stats.min,
            max = ?stats.max,
            mean = ?stats.mean,
            "completion latency"
        ),
        None => tracing::warn!("no nodes passed"),
    }
    tracing::info!(
        setup = ?result.started_at.saturating_duration_since(started_at),
        shutdown = ?finished_at.saturating_duration_since(result.finished_at),
        "phase durations"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;
    use std::collections::HashMap;

    fn result_with_offsets(offsets: &[u64]) -> StepResult {
        let started_at = Instant::now();
        let passes: HashMap<_, _> = offsets
            .iter()
            .map(|secs| {
                (
                    NodeId::random(),
                    started_at.checked_add(Duration::from_secs(*secs)).unwrap(),
                )
            })
            .collect();
        StepResult {
            started_at,
            finished_at: started_at.checked_add(Duration::from_secs(10)).unwrap(),
            passes,
        }
    }

    #[test]
    fn stats_are_exact() {
        let stats = latency_stats(&result_with_offsets(&[1, 2, 3])).unwrap();
        assert_eq!(stats.min, Duration::from_secs(1));
        assert_eq!(stats.max, Duration::from_secs(3));
        assert_eq!(stats.mean, Duration::from_secs(2));
    }

    #[test]
    fn single_pass_collapses_to_one_value() {
        let stats = latency_stats(&result_with_offsets(&[5])).unwrap();
        assert_eq!(stats.min, Duration::from_secs(5));
        assert_eq!(stats.max, Duration::from_secs(5));
        assert_eq!(stats.mean, Duration::from_secs(5));
    }

    #[test]
    fn zero_passes_yield_no_stats() {
        let result = result_with_offsets(&[]);
        assert!(latency_stats(&result).is_none());
        let finished = result.finished_at;
        assert!(report(&result, result.started_at, finished).is_none());
    }
}
