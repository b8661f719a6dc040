//! In-memory stores owned by the cache service.

pub mod session_map;
pub mod shelter_cache;

pub use session_map::{ResultSetId, SessionMappingStore};
pub use shelter_cache::ShelterCacheStore;
