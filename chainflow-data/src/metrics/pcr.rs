//! Put/Call Ratio over a filtered chain.

use crate::chain::StrikeRecord;
use serde::{Deserialize, Serialize};

/// Aggregation basis for the Put/Call Ratio.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, Serialize,
)]
pub enum PcrBasis {
    #[default]
    OpenInterest,
    Volume,
}

impl PcrBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            PcrBasis::OpenInterest => "OI",
            PcrBasis::Volume => "Volume",
        }
    }
}

impl std::fmt::Display for PcrBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory positioning read derived from a PCR value. Display text only,
/// never a control value.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub enum Sentiment {
    /// PCR < 1: more calls than puts.
    CallHeavy,
    /// PCR > 1: more puts than calls.
    PutHeavy,
    /// PCR == 1.
    Balanced,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::CallHeavy => "PCR < 1: more Calls than Puts (generally bearish)",
            Sentiment::PutHeavy => "PCR > 1: more Puts than Calls (generally bullish)",
            Sentiment::Balanced => "PCR = 1: balanced positioning",
        }
    }
}

/// A computed Put/Call Ratio and the basis it was aggregated on.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct Pcr {
    pub value: f64,
    pub basis: PcrBasis,
}

impl Pcr {
    pub fn sentiment(&self) -> Sentiment {
        if self.value < 1.0 {
            Sentiment::CallHeavy
        } else if self.value > 1.0 {
            Sentiment::PutHeavy
        } else {
            Sentiment::Balanced
        }
    }
}

/// Sum the chosen basis field across one side's rows.
pub fn basis_sum(records: &[StrikeRecord], basis: PcrBasis) -> u64 {
    records
        .iter()
        .map(|record| match basis {
            PcrBasis::OpenInterest => record.open_interest,
            PcrBasis::Volume => record.volume,
        })
        .sum()
}

/// Compute `sum(puts) / sum(calls)` on the chosen basis.
///
/// Returns `None` exactly when the call-side sum is zero (which covers the
/// both-sides-zero case): division by zero is never approximated as infinity
/// or a clamped ratio. Each invocation is independent - callers may compute
/// several PCRs per cycle over differently filtered sets.
pub fn pcr(calls: &[StrikeRecord], puts: &[StrikeRecord], basis: PcrBasis) -> Option<Pcr> {
    let sum_calls = basis_sum(calls, basis);
    if sum_calls == 0 {
        return None;
    }

    let sum_puts = basis_sum(puts, basis);
    Some(Pcr {
        value: sum_puts as f64 / sum_calls as f64,
        basis,
    })
}
