//! PostgreSQL Repository Implementations

mod durable_store;

pub use durable_store::PgDurableMemoryStore;
