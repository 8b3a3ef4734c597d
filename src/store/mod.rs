//! The key-value store contract the coordinator depends on. Two
//! implementations: an in-process map for development and tests, and a
//! redis-backed store for production.
//!
//! All values are strings addressed by `(key, field)`. Field names encode the
//! schema: `u` usage counter, `n` display name, `c` completed mission IDs,
//! `p|<name>` plan JSON, `a|<name>` active mission IDs for a plan, and any
//! other field is a mission ID holding mission JSON.

pub mod local;
pub mod redis;

pub use self::local::LocalStore;
pub use self::redis::RedisStore;

use crate::error::Result;
use async_trait::async_trait;

/// A single-field read-modify-write closure. The store reads the current
/// value, applies the closure, and commits the returned value atomically;
/// returning an error aborts without writing.
pub type TxnFn<'a> = &'a mut (dyn FnMut(&str) -> Result<String> + Send);

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Liveness probe.
    async fn ping(&self) -> Result<()>;

    /// Create a namespace. Idempotent; an existing namespace is untouched.
    async fn create_key(&self, key: &str) -> Result<()>;

    /// Remove a namespace and every field under it.
    async fn delete_key(&self, key: &str) -> Result<()>;

    /// Enumerate all namespaces.
    async fn list_keys(&self) -> Result<Vec<String>>;

    async fn set(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Returns the value, or `None` when the key or field does not exist.
    async fn get(&self, key: &str, field: &str) -> Option<String>;

    /// Returns true if the field was deleted or did not exist.
    async fn delete(&self, key: &str, field: &str) -> bool;

    /// All fields under `key` starting with `prefix`. Returned strings are
    /// full field names, prefix included.
    async fn list(&self, key: &str, prefix: &str) -> Result<Vec<String>>;

    /// Atomically read `key.field`, apply `f`, and write the result. Fails
    /// with [`crate::HoustonError::TransactionFailed`] when another writer
    /// touched the field in between, and with
    /// [`crate::HoustonError::KeyNotFound`] when the field does not exist.
    async fn do_transaction(&self, key: &str, field: &str, f: TxnFn<'_>) -> Result<()>;

    /// Resource check; returns [`crate::HoustonError::MemoryUsage`] when the
    /// store is over its configured budget.
    async fn health(&self) -> Result<()>;
}
