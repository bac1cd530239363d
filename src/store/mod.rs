//! Key/value persistence behind the repositories.
//!
//! Keys are `/`-joined paths (`pods/<namespace>/<name>`, `nodes/<name>`, ...).
//! Values are untyped JSON blobs; the repositories own the typed decoding.
//! There are no transactions and no atomicity across keys.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

pub mod memory;
pub mod surreal;

pub use memory::MemoryStore;
pub use surreal::SurrealStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or overwrite the value at `key`.
    async fn put(&self, key: &str, value: Value) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// All entries whose key starts with `prefix`, ordered by key.
    async fn list(&self, prefix: &str) -> Result<BTreeMap<String, Value>>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
