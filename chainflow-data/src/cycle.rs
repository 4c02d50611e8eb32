//! One fetch-compute-render cycle.
//!
//! Data flows strictly forward: cache -> parse -> filter -> metrics ->
//! {history append, dashboard frame}. Nothing reads back from a downstream
//! stage except the full history series handed to the presentation layer
//! untouched.

use crate::cache::ChainCache;
use crate::chain::{ChainSnapshot, StrikeRecord};
use crate::client::{ChainClient, ChainKey};
use crate::error::DataError;
use crate::filter::{FilteredChain, top_by_volume};
use crate::history::{HistoryLog, PcrEntry};
use crate::metrics::{MaxPain, Pcr, PcrBasis, basis_sum, max_pain, pcr};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Top-K union the displayed metrics and tables are computed over.
pub const DISPLAY_TOP_K: usize = 20;

/// Top-K union of the persisted PCR series.
pub const HISTORY_TOP_K: usize = 10;

/// Rows per side in the dashboard tables.
pub const TABLE_ROWS: usize = 5;

/// Everything the presentation layer needs for one render.
#[derive(Clone, Debug)]
pub struct DashboardFrame {
    pub symbol: String,
    /// Spot price of the underlying, when the upstream reports it.
    pub underlying: Option<f64>,
    /// Upstream snapshot time, verbatim.
    pub chain_timestamp: Option<String>,
    pub generated_at: DateTime<Utc>,
    /// Displayed PCR: OI basis over the top-20 union, Volume basis when the
    /// chain carries no open interest at all.
    pub pcr_display: Option<Pcr>,
    /// The persisted series' value this cycle: OI basis over the top-10 union.
    pub pcr_top10: Option<Pcr>,
    pub max_pain: Option<MaxPain>,
    /// Top-5-by-volume call rows, drawn from the top-20 filtered set.
    pub top_calls: Vec<StrikeRecord>,
    /// Top-5-by-volume put rows, drawn from the top-20 filtered set.
    pub top_puts: Vec<StrikeRecord>,
    /// Full persisted PCR series, oldest first.
    pub pcr_series: Vec<PcrEntry>,
}

/// Run one full cycle for `key`.
///
/// Fetch failures and empty chains abort with an error; unavailable metrics
/// do not - they surface as `None` fields and the rest of the frame still
/// renders. A history append failure is logged and the cycle continues.
pub async fn run_cycle(
    client: &ChainClient,
    cache: &ChainCache,
    history: &mut dyn HistoryLog,
    key: &ChainKey,
) -> Result<DashboardFrame, DataError> {
    let document = cache.get_or_fetch(client, key).await?;

    let snapshot = ChainSnapshot::parse(&document);
    if snapshot.calls.is_empty() || snapshot.puts.is_empty() {
        return Err(DataError::EmptyChain(format!(
            "no option rows for {}",
            key.symbol
        )));
    }

    let display_set = FilteredChain::top_k_union(&snapshot, DISPLAY_TOP_K);
    if display_set.calls.is_empty() || display_set.puts.is_empty() {
        return Err(DataError::EmptyChain(format!(
            "no rows left for {} after top-{DISPLAY_TOP_K} filtering",
            key.symbol
        )));
    }
    debug!(
        strikes = display_set.strikes.len(),
        calls = display_set.calls.len(),
        puts = display_set.puts.len(),
        "filtered chain"
    );

    let pcr_display = display_pcr(&display_set);

    let history_set = FilteredChain::top_k_union(&snapshot, HISTORY_TOP_K);
    let pcr_top10 = pcr(
        &history_set.calls,
        &history_set.puts,
        PcrBasis::OpenInterest,
    );
    if let Some(found) = pcr_top10 {
        if let Err(error) = history.append(&PcrEntry::now(found.value)) {
            warn!(%error, "failed to append PCR history entry");
        }
    }

    let max_pain = max_pain(&display_set.calls, &display_set.puts);

    let pcr_series = history.read_all().unwrap_or_else(|error| {
        warn!(%error, "failed to read PCR history, charting an empty series");
        Vec::new()
    });

    Ok(DashboardFrame {
        symbol: key.symbol.clone(),
        underlying: snapshot.underlying,
        chain_timestamp: snapshot.timestamp,
        generated_at: Utc::now(),
        pcr_display,
        pcr_top10,
        max_pain,
        top_calls: top_by_volume(&display_set.calls, TABLE_ROWS),
        top_puts: top_by_volume(&display_set.puts, TABLE_ROWS),
        pcr_series,
    })
}

/// OI-basis PCR over the display set, recomputed on Volume basis only when
/// the chain carries no open interest on either side.
fn display_pcr(display_set: &FilteredChain) -> Option<Pcr> {
    match pcr(
        &display_set.calls,
        &display_set.puts,
        PcrBasis::OpenInterest,
    ) {
        Some(found) => Some(found),
        // None means the call-side OI sum is zero; fall back only when the
        // put side carries none either
        None if basis_sum(&display_set.puts, PcrBasis::OpenInterest) == 0 => {
            pcr(&display_set.calls, &display_set.puts, PcrBasis::Volume)
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistory;
    use serde_json::{Value, json};
    use std::time::Duration;

    fn entry(strike: f64, ce: Option<(u64, u64)>, pe: Option<(u64, u64)>) -> Value {
        let mut entry = json!({"strikePrice": strike});
        if let Some((volume, oi)) = ce {
            entry["CE"] = json!({"totalTradedVolume": volume, "openInterest": oi});
        }
        if let Some((volume, oi)) = pe {
            entry["PE"] = json!({"totalTradedVolume": volume, "openInterest": oi});
        }
        entry
    }

    fn seeded(document: Value) -> (ChainClient, ChainCache, ChainKey) {
        let cache = ChainCache::new(Duration::from_secs(3600));
        let key = ChainKey::index("NIFTY");
        cache.insert(key.clone(), document);
        // Unroutable host: the test fails loudly if anything tries the network
        let client = ChainClient::with_base_url("http://127.0.0.1:9").unwrap();
        (client, cache, key)
    }

    #[tokio::test]
    async fn test_cycle_happy_path() {
        let document = json!({
            "records": {"underlyingValue": 22450.35, "timestamp": "07-Aug-2026 15:30:00"},
            "filtered": {"data": [
                entry(100.0, Some((50, 200)), Some((40, 150))),
                entry(110.0, Some((30, 100)), Some((60, 300))),
            ]},
        });
        let (client, cache, key) = seeded(document);
        let mut history = MemoryHistory::default();

        let frame = run_cycle(&client, &cache, &mut history, &key)
            .await
            .unwrap();

        assert_eq!(frame.symbol, "NIFTY");
        assert_eq!(frame.underlying, Some(22450.35));

        let display = frame.pcr_display.unwrap();
        assert_eq!(display.basis, PcrBasis::OpenInterest);
        assert_eq!(display.value, 1.5);

        let max_pain = frame.max_pain.unwrap();
        assert_eq!(max_pain.strike, 100.0);
        assert_eq!(max_pain.total_pain, 300.0);

        // Top-10 OI PCR was available, so exactly one entry was persisted
        assert_eq!(frame.pcr_series.len(), 1);
        assert_eq!(frame.pcr_series[0].value, 1.5);

        assert_eq!(frame.top_calls.len(), 2);
        assert_eq!(frame.top_calls[0].strike, 100.0);
        assert_eq!(frame.top_puts[0].strike, 110.0);
    }

    #[tokio::test]
    async fn test_cycle_volume_fallback_when_chain_has_no_oi() {
        let document = json!({
            "data": [
                entry(100.0, Some((50, 0)), Some((40, 0))),
                entry(110.0, Some((30, 0)), Some((60, 0))),
            ],
        });
        let (client, cache, key) = seeded(document);
        let mut history = MemoryHistory::default();

        let frame = run_cycle(&client, &cache, &mut history, &key)
            .await
            .unwrap();

        let display = frame.pcr_display.unwrap();
        assert_eq!(display.basis, PcrBasis::Volume);
        assert_eq!(display.value, 100.0 / 80.0);

        // The persisted series is OI-only: nothing was appended
        assert!(frame.pcr_top10.is_none());
        assert!(frame.pcr_series.is_empty());
    }

    #[tokio::test]
    async fn test_cycle_no_fallback_when_only_call_oi_is_zero() {
        let document = json!({
            "data": [entry(100.0, Some((50, 0)), Some((40, 150)))],
        });
        let (client, cache, key) = seeded(document);
        let mut history = MemoryHistory::default();

        let frame = run_cycle(&client, &cache, &mut history, &key)
            .await
            .unwrap();

        // Division by zero is never approximated: PCR is simply unavailable,
        // and the rest of the frame still renders
        assert!(frame.pcr_display.is_none());
        assert!(frame.pcr_top10.is_none());
        assert!(frame.max_pain.is_some());
    }

    #[tokio::test]
    async fn test_cycle_all_zero_chain_keeps_rendering() {
        let document = json!({
            "data": [
                entry(100.0, Some((0, 0)), Some((0, 0))),
                entry(110.0, Some((0, 0)), Some((0, 0))),
            ],
        });
        let (client, cache, key) = seeded(document);
        let mut history = MemoryHistory::default();

        let frame = run_cycle(&client, &cache, &mut history, &key)
            .await
            .unwrap();

        // PCR is unavailable on both bases, but the cycle does not abort
        assert!(frame.pcr_display.is_none());
        assert!(frame.pcr_series.is_empty());

        // All pain values are zero; the tie resolves to the lowest strike
        let max_pain = frame.max_pain.unwrap();
        assert_eq!(max_pain.strike, 100.0);
        assert_eq!(max_pain.total_pain, 0.0);
    }

    #[tokio::test]
    async fn test_cycle_empty_chain_aborts() {
        let document = json!({"records": {"underlyingValue": 1.0}});
        let (client, cache, key) = seeded(document);
        let mut history = MemoryHistory::default();

        let error = run_cycle(&client, &cache, &mut history, &key)
            .await
            .unwrap_err();
        assert!(matches!(error, DataError::EmptyChain(_)));
        assert!(error.is_cycle_abort());
    }

    #[tokio::test]
    async fn test_cycle_history_accumulates_across_cycles() {
        let document = json!({
            "data": [entry(100.0, Some((50, 200)), Some((40, 100)))],
        });
        let (client, cache, key) = seeded(document);
        let mut history = MemoryHistory::default();

        run_cycle(&client, &cache, &mut history, &key).await.unwrap();
        let frame = run_cycle(&client, &cache, &mut history, &key)
            .await
            .unwrap();

        assert_eq!(frame.pcr_series.len(), 2);
        assert_eq!(frame.pcr_series[0].value, 0.5);
    }
}
