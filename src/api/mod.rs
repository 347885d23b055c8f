//! Clients for the upstream providers.
//!
//! Includes:
//! - `darksky`: weather time-machine client (historical and forecast days).
//! - `openaq`: pollution measurements and the paged location directory.
//! - `mock`: random data provider used as API-failure fallback and in tests.

mod darksky;
mod mock;
mod openaq;

pub use darksky::*;
pub use mock::*;
pub use openaq::*;
