//! Key/value persistence surface for the serialized cache blobs.
//!
//! The cache service stores two independent JSON blobs (see [`SHELTER_CACHE_KEY`]
//! and [`SESSION_MAPPING_KEY`]). Any backend that can load and save a string by
//! key can act as the store.

pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;

/// Blob key for the fingerprint → raw payload cache.
pub const SHELTER_CACHE_KEY: &str = "shelter_data_cache";

/// Blob key for the chat → result-set mapping and the result sets.
pub const SESSION_MAPPING_KEY: &str = "chat_shelter_mapping";

/// Durable key/value storage for serialized blobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Load a blob. A missing key is `Ok(None)`, not an error.
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Save a blob, replacing any previous value.
    async fn save(&self, key: &str, blob: &str) -> Result<()>;

    /// Remove a blob. No-op if the key is absent.
    async fn remove(&self, key: &str) -> Result<()>;
}
