//! Max Pain strike over a filtered chain.

use crate::chain::StrikeRecord;
use crate::filter::cmp_f64;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// The strike minimising aggregate option-writer payout, with the payout at
/// that strike. Recomputed every cycle, never persisted.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct MaxPain {
    pub strike: f64,
    pub total_pain: f64,
}

/// Compute the Max Pain strike.
///
/// Candidate strikes are the ascending union of all strikes present in either
/// filtered side. For each candidate `p`:
///
/// ```text
/// call_pain(p) = sum over call rows of max(strike - p, 0) * volume
/// put_pain(p)  = sum over put rows of max(p - strike, 0) * volume
/// ```
///
/// The first minimum encountered in ascending-strike order wins, so ties
/// resolve to the lowest strike and repeated invocation on identical inputs
/// is deterministic. An empty candidate union returns `None` - a normal empty
/// result, not an error.
///
/// Deliberately a brute-force O(S*(C+P)) scan: the inputs are already
/// bounded by top-K filtering to tens of rows.
pub fn max_pain(calls: &[StrikeRecord], puts: &[StrikeRecord]) -> Option<MaxPain> {
    let candidates: Vec<f64> = calls
        .iter()
        .chain(puts)
        .map(|record| record.strike)
        .sorted_by(cmp_f64)
        .dedup()
        .collect();

    let mut best: Option<MaxPain> = None;
    for &candidate in &candidates {
        let call_pain: f64 = calls
            .iter()
            .map(|record| (record.strike - candidate).max(0.0) * record.volume as f64)
            .sum();
        let put_pain: f64 = puts
            .iter()
            .map(|record| (candidate - record.strike).max(0.0) * record.volume as f64)
            .sum();
        let total_pain = call_pain + put_pain;

        // Strictly-less keeps the first minimum in ascending order
        match best {
            Some(incumbent) if total_pain >= incumbent.total_pain => {}
            _ => {
                best = Some(MaxPain {
                    strike: candidate,
                    total_pain,
                })
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::StrikeRecord;

    fn record(strike: f64, volume: u64) -> StrikeRecord {
        StrikeRecord {
            volume,
            ..StrikeRecord::zeroed(strike)
        }
    }

    #[test]
    fn test_max_pain_scenario() {
        // pain(100) = call side max(110-100,0)*30 = 300, put side 0
        // pain(110) = call side 0, put side max(110-100,0)*40 = 400
        let calls = vec![record(100.0, 50), record(110.0, 30)];
        let puts = vec![record(100.0, 40), record(110.0, 60)];

        let result = max_pain(&calls, &puts).unwrap();
        assert_eq!(result.strike, 100.0);
        assert_eq!(result.total_pain, 300.0);
    }

    #[test]
    fn test_max_pain_is_deterministic() {
        let calls = vec![record(95.0, 12), record(100.0, 7), record(105.0, 3)];
        let puts = vec![record(95.0, 4), record(105.0, 19)];

        let first = max_pain(&calls, &puts).unwrap();
        let second = max_pain(&calls, &puts).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_max_pain_all_zero_volume_ties_to_lowest_strike() {
        // Every candidate's pain is 0.0; the first minimum in ascending order wins
        let calls = vec![record(120.0, 0), record(100.0, 0)];
        let puts = vec![record(110.0, 0)];

        let result = max_pain(&calls, &puts).unwrap();
        assert_eq!(result.strike, 100.0);
        assert_eq!(result.total_pain, 0.0);
    }

    #[test]
    fn test_max_pain_empty_candidates_unavailable() {
        assert_eq!(max_pain(&[], &[]), None);
    }

    #[test]
    fn test_max_pain_single_sided_chain() {
        // Candidates come from the union, so a one-sided chain still resolves
        let calls = vec![record(100.0, 10), record(110.0, 5)];

        let result = max_pain(&calls, &[]).unwrap();
        // pain(100) = 10*0 + 5*10 = 50; pain(110) = 0
        assert_eq!(result.strike, 110.0);
        assert_eq!(result.total_pain, 0.0);
    }
}
