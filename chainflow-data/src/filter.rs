//! Top-K-by-volume strike filtering.
//!
//! The full strike universe is reduced to the union of the K highest-volume
//! strikes independently selected from each side. All functions here are pure:
//! invoking them for several values of K against the same snapshot is safe and
//! cannot conflict.

use crate::chain::{ChainSnapshot, StrikeRecord};
use itertools::Itertools;
use std::cmp::Ordering;

/// A [`ChainSnapshot`] restricted to a top-K strike union.
///
/// Records for strikes in the union that are absent on one side are simply
/// omitted from that side - no zero rows are synthesised at this stage.
#[derive(Clone, Debug, Default)]
pub struct FilteredChain {
    /// Ascending, deduplicated union of the per-side top-K strikes.
    pub strikes: Vec<f64>,
    pub calls: Vec<StrikeRecord>,
    pub puts: Vec<StrikeRecord>,
}

impl FilteredChain {
    /// Restrict `snapshot` to the union of the top-`k` strikes by volume on
    /// each side.
    ///
    /// Ranking uses a stable sort, so volume ties keep their original chain
    /// order. If `k` exceeds the row count on a side, all of that side's
    /// strikes qualify. An empty side stays empty; downstream metrics treat
    /// that as "unavailable" rather than an error.
    pub fn top_k_union(snapshot: &ChainSnapshot, k: usize) -> Self {
        let strikes: Vec<f64> = top_strikes(&snapshot.calls, k)
            .chain(top_strikes(&snapshot.puts, k))
            .sorted_by(cmp_f64)
            .dedup()
            .collect();

        Self {
            calls: restrict(&snapshot.calls, &strikes),
            puts: restrict(&snapshot.puts, &strikes),
            strikes,
        }
    }
}

/// Strikes of the `k` highest-volume records, in rank order.
fn top_strikes(records: &[StrikeRecord], k: usize) -> impl Iterator<Item = f64> {
    let mut ranked: Vec<&StrikeRecord> = records.iter().collect();
    // sort_by is stable: equal volumes keep original chain order
    ranked.sort_by(|a, b| b.volume.cmp(&a.volume));
    ranked.into_iter().take(k).map(|record| record.strike)
}

fn restrict(records: &[StrikeRecord], strikes: &[f64]) -> Vec<StrikeRecord> {
    records
        .iter()
        .filter(|record| {
            strikes
                .binary_search_by(|strike| cmp_f64(strike, &record.strike))
                .is_ok()
        })
        .copied()
        .collect()
}

/// Total order over parsed strikes. Strikes are always finite, so the
/// incomparable arm is unreachable in practice.
pub(crate) fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// The `n` highest-volume records of one side, in rank order (stable on ties).
///
/// Used for the dashboard's top-5 tables, drawn from an already-filtered set.
pub fn top_by_volume(records: &[StrikeRecord], n: usize) -> Vec<StrikeRecord> {
    let mut ranked: Vec<StrikeRecord> = records.to_vec();
    ranked.sort_by(|a, b| b.volume.cmp(&a.volume));
    ranked.truncate(n);
    ranked
}
