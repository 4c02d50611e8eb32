//! Sentiment metrics computed over a filtered option chain.
//!
//! Every metric is a stateless pure function of the rows it is given.
//! "Unavailable" results are `None`, never errors: a cycle with one
//! unavailable metric still renders the rest.

pub mod max_pain;
pub mod pcr;

pub use max_pain::{MaxPain, max_pain};
pub use pcr::{Pcr, PcrBasis, Sentiment, basis_sum, pcr};
