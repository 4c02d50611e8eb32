//! Normalised option-chain models and the raw-document parser.
//!
//! The upstream document nests per-strike entries under either a
//! `filtered.data` or a top-level `data` path, each entry optionally carrying
//! a `CE` (call) and/or `PE` (put) side. [`ChainSnapshot::parse`] flattens
//! that into two strike-aligned [`StrikeRecord`] collections.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub mod de;

/// Subset of the per-side (`CE`/`PE`) upstream fields required to build a
/// [`StrikeRecord`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawSide {
    #[serde(rename = "lastPrice", default, deserialize_with = "de::price_lenient")]
    pub last_price: Option<f64>,

    #[serde(
        rename = "totalTradedVolume",
        default,
        deserialize_with = "de::count_lenient"
    )]
    pub total_traded_volume: u64,

    #[serde(
        rename = "openInterest",
        default,
        deserialize_with = "de::opt_count_lenient"
    )]
    pub open_interest: Option<u64>,

    #[serde(
        rename = "openInterestQty",
        default,
        deserialize_with = "de::opt_count_lenient"
    )]
    pub open_interest_qty: Option<u64>,

    #[serde(
        rename = "totalBuyQuantity",
        default,
        deserialize_with = "de::count_lenient"
    )]
    pub total_buy_quantity: u64,

    #[serde(
        rename = "totalSellQuantity",
        default,
        deserialize_with = "de::count_lenient"
    )]
    pub total_sell_quantity: u64,
}

/// One per-strike entry of the upstream chain.
#[derive(Clone, Debug, Deserialize)]
pub struct RawEntry {
    #[serde(
        rename = "strikePrice",
        default,
        deserialize_with = "de::price_lenient"
    )]
    pub strike_price: Option<f64>,

    #[serde(rename = "CE", default)]
    pub call: Option<RawSide>,

    #[serde(rename = "PE", default)]
    pub put: Option<RawSide>,
}

/// Chain-level metadata from the upstream `records` block.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawRecords {
    #[serde(
        rename = "underlyingValue",
        default,
        deserialize_with = "de::price_lenient"
    )]
    pub underlying_value: Option<f64>,

    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Normalised per-strike, per-side market state.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Deserialize, Serialize)]
pub struct StrikeRecord {
    /// Contract exercise price. Always present and numeric.
    pub strike: f64,
    /// Last traded premium, absent when the side never traded.
    pub last_traded_price: Option<f64>,
    /// Contracts traded today.
    pub volume: u64,
    /// Outstanding contracts at this strike.
    pub open_interest: u64,
    /// Pending buy quantity.
    pub total_buy_qty: u64,
    /// Pending sell quantity.
    pub total_sell_qty: u64,
    /// `total_buy_qty / total_sell_qty` to 2 decimal places.
    ///
    /// Absent whenever `total_sell_qty == 0` - never zero, never infinite.
    pub buy_sell_ratio: Option<f64>,
}

impl StrikeRecord {
    /// Zero-filled record for a strike quoted only on the opposite side,
    /// preserving strike alignment between calls and puts.
    pub fn zeroed(strike: f64) -> Self {
        Self {
            strike,
            last_traded_price: None,
            volume: 0,
            open_interest: 0,
            total_buy_qty: 0,
            total_sell_qty: 0,
            buy_sell_ratio: None,
        }
    }

    fn from_side(strike: f64, side: Option<&RawSide>) -> Self {
        let Some(side) = side else {
            return Self::zeroed(strike);
        };

        let buy_sell_ratio = (side.total_sell_quantity > 0).then(|| {
            round2(side.total_buy_quantity as f64 / side.total_sell_quantity as f64)
        });

        Self {
            strike,
            last_traded_price: side.last_price,
            volume: side.total_traded_volume,
            open_interest: side
                .open_interest
                .or(side.open_interest_qty)
                .unwrap_or(0),
            total_buy_qty: side.total_buy_quantity,
            total_sell_qty: side.total_sell_quantity,
            buy_sell_ratio,
        }
    }
}

/// One parsed option-chain snapshot: strike-aligned call and put records plus
/// chain-level metadata. Lives for a single fetch-compute-render cycle.
#[derive(Clone, Debug, Default)]
pub struct ChainSnapshot {
    pub calls: Vec<StrikeRecord>,
    pub puts: Vec<StrikeRecord>,
    /// Spot price of the underlying, when the upstream reports it.
    pub underlying: Option<f64>,
    /// Upstream snapshot time, verbatim.
    pub timestamp: Option<String>,
}

impl ChainSnapshot {
    /// Parse a raw upstream document.
    ///
    /// The entry collection is resolved from `filtered.data` first, then the
    /// top-level `data` path. Neither present yields two empty collections,
    /// not an error. Entries without a numeric `strikePrice` are dropped;
    /// entries missing one side produce a zero-filled record on that side.
    pub fn parse(document: &Value) -> Self {
        let records = document
            .get("records")
            .and_then(|records| RawRecords::deserialize(records).ok())
            .unwrap_or_default();

        let entries = document
            .get("filtered")
            .and_then(|filtered| filtered.get("data"))
            .and_then(Value::as_array)
            .or_else(|| document.get("data").and_then(Value::as_array));

        let Some(entries) = entries else {
            return Self {
                underlying: records.underlying_value,
                timestamp: records.timestamp,
                ..Self::default()
            };
        };

        let mut calls = Vec::with_capacity(entries.len());
        let mut puts = Vec::with_capacity(entries.len());

        for entry in entries {
            let entry = match RawEntry::deserialize(entry) {
                Ok(entry) => entry,
                Err(error) => {
                    debug!(%error, "skipping malformed chain entry");
                    continue;
                }
            };

            let Some(strike) = entry.strike_price else {
                debug!("skipping chain entry without a numeric strikePrice");
                continue;
            };

            calls.push(StrikeRecord::from_side(strike, entry.call.as_ref()));
            puts.push(StrikeRecord::from_side(strike, entry.put.as_ref()));
        }

        Self {
            calls,
            puts,
            underlying: records.underlying_value,
            timestamp: records.timestamp,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn side(volume: u64, oi: u64, buy: u64, sell: u64) -> Value {
        json!({
            "lastPrice": 10.5,
            "totalTradedVolume": volume,
            "openInterest": oi,
            "totalBuyQuantity": buy,
            "totalSellQuantity": sell,
        })
    }

    #[test]
    fn test_parse_prefers_filtered_data_path() {
        let document = json!({
            "filtered": {
                "data": [{"strikePrice": 100.0, "CE": side(10, 5, 1, 1), "PE": side(20, 8, 1, 1)}]
            },
            "data": [
                {"strikePrice": 200.0, "CE": side(1, 1, 1, 1), "PE": side(1, 1, 1, 1)},
                {"strikePrice": 210.0, "CE": side(1, 1, 1, 1), "PE": side(1, 1, 1, 1)}
            ],
        });

        let snapshot = ChainSnapshot::parse(&document);
        assert_eq!(snapshot.calls.len(), 1);
        assert_eq!(snapshot.calls[0].strike, 100.0);
    }

    #[test]
    fn test_parse_falls_back_to_top_level_data() {
        let document = json!({
            "data": [{"strikePrice": 200.0, "CE": side(3, 2, 1, 1), "PE": side(4, 6, 1, 1)}],
        });

        let snapshot = ChainSnapshot::parse(&document);
        assert_eq!(snapshot.calls.len(), 1);
        assert_eq!(snapshot.puts.len(), 1);
        assert_eq!(snapshot.puts[0].volume, 4);
    }

    #[test]
    fn test_parse_no_entry_path_yields_empty_collections() {
        let document = json!({
            "records": {"underlyingValue": 22450.35, "timestamp": "07-Aug-2026 15:30:00"},
        });

        let snapshot = ChainSnapshot::parse(&document);
        assert!(snapshot.calls.is_empty());
        assert!(snapshot.puts.is_empty());
        assert_eq!(snapshot.underlying, Some(22450.35));
        assert_eq!(snapshot.timestamp.as_deref(), Some("07-Aug-2026 15:30:00"));
    }

    #[test]
    fn test_parse_missing_side_is_zero_filled() {
        let document = json!({
            "data": [{"strikePrice": 150.0, "CE": side(9, 7, 2, 1)}],
        });

        let snapshot = ChainSnapshot::parse(&document);
        assert_eq!(snapshot.calls[0].volume, 9);
        // Strike alignment preserved: the absent PE side still yields a record
        assert_eq!(snapshot.puts.len(), 1);
        assert_eq!(snapshot.puts[0], StrikeRecord::zeroed(150.0));
    }

    #[test]
    fn test_parse_drops_entry_without_numeric_strike() {
        let document = json!({
            "data": [
                {"CE": side(9, 7, 2, 1), "PE": side(1, 1, 1, 1)},
                {"strikePrice": "oops", "CE": side(9, 7, 2, 1)},
                {"strikePrice": 175.0, "CE": side(4, 2, 1, 1), "PE": side(6, 3, 1, 1)}
            ],
        });

        let snapshot = ChainSnapshot::parse(&document);
        assert_eq!(snapshot.calls.len(), 1);
        assert_eq!(snapshot.calls[0].strike, 175.0);
    }

    #[test]
    fn test_parse_open_interest_falls_back_to_qty_field() {
        let document = json!({
            "data": [{
                "strikePrice": 100.0,
                "CE": {"totalTradedVolume": 5, "openInterestQty": 42},
                "PE": {"totalTradedVolume": 5, "openInterest": 17, "openInterestQty": 99}
            }],
        });

        let snapshot = ChainSnapshot::parse(&document);
        assert_eq!(snapshot.calls[0].open_interest, 42);
        // openInterest wins over openInterestQty when both are present
        assert_eq!(snapshot.puts[0].open_interest, 17);
    }

    #[test]
    fn test_parse_coerces_string_numerics() {
        let document = json!({
            "data": [{
                "strikePrice": "125.5",
                "CE": {
                    "lastPrice": "3.85",
                    "totalTradedVolume": "1200",
                    "openInterest": "junk",
                    "totalBuyQuantity": "50",
                    "totalSellQuantity": "not-a-number"
                }
            }],
        });

        let snapshot = ChainSnapshot::parse(&document);
        let call = &snapshot.calls[0];
        assert_eq!(call.strike, 125.5);
        assert_eq!(call.last_traded_price, Some(3.85));
        assert_eq!(call.volume, 1200);
        assert_eq!(call.open_interest, 0);
        assert_eq!(call.total_sell_qty, 0);
        assert_eq!(call.buy_sell_ratio, None);
    }

    #[test]
    fn test_buy_sell_ratio() {
        struct TestCase {
            buy: u64,
            sell: u64,
            expected: Option<f64>,
        }

        let tests = vec![
            TestCase {
                // TC0: absent on zero sell quantity, never zero or infinite
                buy: 500,
                sell: 0,
                expected: None,
            },
            TestCase {
                // TC1: absent when both sides are zero
                buy: 0,
                sell: 0,
                expected: None,
            },
            TestCase {
                // TC2: rounded to 2 decimal places
                buy: 10,
                sell: 3,
                expected: Some(3.33),
            },
            TestCase {
                // TC3: zero buy against live sell quantity is a real 0.0
                buy: 0,
                sell: 40,
                expected: Some(0.0),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let document = json!({
                "data": [{"strikePrice": 100.0, "CE": side(1, 1, test.buy, test.sell)}],
            });
            let snapshot = ChainSnapshot::parse(&document);
            assert_eq!(
                snapshot.calls[0].buy_sell_ratio, test.expected,
                "TC{} failed",
                index
            );
        }
    }
}
