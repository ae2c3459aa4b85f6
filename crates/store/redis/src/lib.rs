//! Redis data store backend for Goblin.
//!
//! This crate provides a Redis-backed implementation of the [`DataStore`]
//! trait from `goblin-store`, together with the connection pool it runs on.
//!
//! # Features
//!
//! - **Blob storage**: payload, metadata and token mapping written with a
//!   single `MSETNX`, so a write either fully applies or is refused.
//! - **Soft delete**: keys are renamed into a `deleted` namespace and given a
//!   grace TTL by a Lua script, so lookups fail immediately while the content
//!   stays recoverable.
//! - **Bounded append**: a Lua script keeps at most `max_object_size` bytes,
//!   dropping the oldest ones first.
//! - **Connection pooling**: a single coordinator task owns the idle set.
//!   Connections are tagged with the generation of the endpoint they were
//!   dialed against and discarded once the pool is pointed elsewhere.
//!
//! # TTL arming
//!
//! By default the lifetime of a gob is armed by a spawned task after the
//! write returns, and failures are only logged. Set
//! [`RedisConfig::sync_ttl`] to arm it before returning instead.
//!
//! # Example
//!
//! ```ignore
//! use goblin_store_redis::{RedisConfig, RedisDataStore};
//!
//! let config = RedisConfig::default();
//! let store = RedisDataStore::new(&config);
//! ```
//!
//! [`DataStore`]: goblin_store::DataStore

mod config;
mod key_render;
pub mod pool;
mod scripts;
mod store;

pub use config::RedisConfig;
pub use pool::{
    Connector, Endpoint, Pool, PoolError, PooledConnection, RedisConnector, Transport,
};
pub use store::RedisDataStore;
