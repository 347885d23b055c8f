//! Aggregation: the rollup pipeline over weekly bucket documents and the
//! cross-series reconciler built on top of it.
//!
//! The store layer only performs pipeline step 1 (bucket-overlap selection);
//! every stage after that is a pure function here, so the whole engine is
//! testable without a running store.

mod reconcile;
mod rollup;

pub use reconcile::*;
pub use rollup::*;
