//! Lenient deserializers for upstream numeric fields.
//!
//! The upstream feed is inconsistent about numeric encoding: counts and prices
//! arrive as JSON numbers or as numeric strings, and occasionally as junk.
//! Count fields degrade to `0` and price fields to `None` rather than failing
//! the whole document.

use serde::Deserialize;
use serde_json::Value;

/// Deserialize a count field (volume, open interest, buy/sell quantity).
///
/// Absent, null, or uncoercible values become `0`.
pub fn count_lenient<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(coerce_count).unwrap_or(0))
}

/// Deserialize a count field, preserving absence.
///
/// `None` marks a missing or null field so callers can apply their own
/// fallback chain; present-but-uncoercible values still become `Some(0)`.
pub fn opt_count_lenient<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(value) => Some(coerce_count(&value)),
    })
}

/// Deserialize a price field. Absent, null, or uncoercible values become `None`.
pub fn price_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_price))
}

fn coerce_count(value: &Value) -> u64 {
    match value {
        // Float-to-int `as` casts saturate, so negatives and NaN land on 0
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f as u64))
            .unwrap_or(0),
        Value::String(raw) => raw.trim().parse::<f64>().map(|f| f as u64).unwrap_or(0),
        _ => 0,
    }
}

fn coerce_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(raw) if !raw.trim().is_empty() => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_count() {
        struct TestCase {
            input: Value,
            expected: u64,
        }

        let tests = vec![
            TestCase {
                // TC0: plain integer
                input: json!(1200),
                expected: 1200,
            },
            TestCase {
                // TC1: float truncates
                input: json!(55.9),
                expected: 55,
            },
            TestCase {
                // TC2: numeric string parses
                input: json!("340"),
                expected: 340,
            },
            TestCase {
                // TC3: negative saturates to zero
                input: json!(-15),
                expected: 0,
            },
            TestCase {
                // TC4: junk string degrades to zero
                input: json!("n/a"),
                expected: 0,
            },
            TestCase {
                // TC5: wrong type degrades to zero
                input: json!({"nested": true}),
                expected: 0,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(coerce_count(&test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_coerce_price() {
        assert_eq!(coerce_price(&json!(101.55)), Some(101.55));
        assert_eq!(coerce_price(&json!("101.55")), Some(101.55));
        assert_eq!(coerce_price(&json!("")), None);
        assert_eq!(coerce_price(&json!("junk")), None);
        assert_eq!(coerce_price(&Value::Null), None);
    }
}
