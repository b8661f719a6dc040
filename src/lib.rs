//! Shelter-data cache and chat-session mapping.
//!
//! Chat responses from the disaster-assistance backend carry shelter records
//! in loosely typed "cards". This crate normalizes those records, deduplicates
//! them by content fingerprint, persists them, and remembers which chat turn
//! produced which ordered list of shelters, so a past conversation can be
//! reopened without re-fetching anything.
//!
//! The entry point is [`ShelterCacheService`]; persistence goes through any
//! [`BlobStore`] ([`FileBlobStore`] on disk, [`MemoryBlobStore`] in memory).

pub mod config;
pub mod error;
pub mod persistence;
pub mod service;
pub mod shelter;
pub mod store;

pub use config::CacheConfig;
pub use error::{Result, ShelterError};
pub use persistence::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use service::{
    CacheStats, DebugSnapshot, IngestedBatch, ServiceState, ServiceStatus, ShelterCacheService,
};
pub use shelter::{
    fingerprint, normalize_shelter, CacheKey, CanonicalShelterRecord, RawShelterPayload,
    ShelterDetails,
};
pub use store::ResultSetId;
