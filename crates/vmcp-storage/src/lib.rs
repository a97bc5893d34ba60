//! Pluggable storage for persisted session metadata: the `Storage` trait
//! plus an in-memory implementation for single-instance deployments and an
//! optional Redis-backed implementation for multi-instance ones.

#![forbid(unsafe_code)]

pub mod memory;
pub mod storage;

#[cfg(feature = "redis-backend")]
pub mod redis_backend;

pub use memory::InMemoryStorage;
pub use storage::{Storage, StorageError};

#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisStorage;
