use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `chainflow-data`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("failed to fetch option chain: {0}")]
    Fetch(String),

    #[error("option chain empty: {0}")]
    EmptyChain(String),

    #[error("history log error: {0}")]
    History(String),
}

impl DataError {
    /// Determine if an error aborted the cycle before any metrics were computed.
    ///
    /// Fetch and empty-chain failures abort the whole cycle; history failures are
    /// logged and the remaining metrics still render.
    pub fn is_cycle_abort(&self) -> bool {
        match self {
            DataError::Fetch(_) | DataError::EmptyChain(_) => true,
            DataError::History(_) => false,
        }
    }

    /// Short label used by the dashboard error panel.
    pub fn label(&self) -> &'static str {
        match self {
            DataError::Fetch(_) => "FETCH FAILED",
            DataError::EmptyChain(_) => "NO DATA",
            DataError::History(_) => "HISTORY",
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(value: reqwest::Error) -> Self {
        Self::Fetch(value.to_string())
    }
}

impl From<std::io::Error> for DataError {
    fn from(value: std::io::Error) -> Self {
        Self::History(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_is_cycle_abort() {
        struct TestCase {
            input: DataError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: aborts w/ DataError::Fetch
                input: DataError::Fetch("request timed out".to_string()),
                expected: true,
            },
            TestCase {
                // TC1: aborts w/ DataError::EmptyChain
                input: DataError::EmptyChain("no option rows for NIFTY".to_string()),
                expected: true,
            },
            TestCase {
                // TC2: does not abort w/ DataError::History
                input: DataError::History("permission denied".to_string()),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_cycle_abort();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_io_error_maps_to_history() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = DataError::from(io);
        assert!(matches!(error, DataError::History(_)));
        assert_eq!(error.label(), "HISTORY");
    }
}
