//! Defines the data structures and models used throughout the application.
//!
//! Includes city identity and location records, the measurement value model
//! shared by ingestion and aggregation, user records for the moderation
//! operations, and the deserialization structs for upstream provider payloads.

mod city;
mod measure;
mod provider;
mod user;

pub use city::*;
pub use measure::*;
pub use provider::*;
pub use user::*;
