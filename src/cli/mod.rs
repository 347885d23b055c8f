//! Command-line interface: argument definitions and the `App` orchestrating
//! store, provider clients and output rendering.

mod commands;

pub use commands::*;
