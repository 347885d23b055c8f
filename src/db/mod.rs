//! PostgreSQL-backed store for weekly measurement buckets, the location
//! directory and user records, built on `sqlx`.
//!
//! Split by collection: `store` owns the pool and schema lifecycle,
//! `measures` the bucket merge/rollup operations, `locations` the directory
//! and voting/moderation operations, `users` the account operations.

mod locations;
mod measures;
mod store;
mod users;

pub use store::Store;
pub use users::Page;
