//! Ingestion pipeline: time bucketing, provider payload normalization and the
//! pure bucket merge rule.
//!
//! Everything here is side-effect free; the store layer ([`crate::db`]) wires
//! these functions into the persisted weekly buckets.

mod merge;
mod normalize;
mod period;

pub use merge::*;
pub use normalize::*;
pub use period::*;
