//! Content fingerprints used as shelter cache keys.
//!
//! The key is the first 16 hex characters of a SHA-256 digest of
//! `"<name>_<latitude>_<longitude>"`. It is a dedup heuristic, not a unique
//! id: collisions are tolerated.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{Result, ShelterError};

use super::fields::{self, LATITUDE_ALIASES, LONGITUDE_ALIASES, NAME_ALIASES};
use super::normalize::json_kind;
use super::RawShelterPayload;

/// Shelter cache key.
pub type CacheKey = String;

const UNKNOWN_NAME: &str = "unknown";
const MISSING_COORDINATE: &str = "0";

static FALLBACK_SEQ: AtomicU64 = AtomicU64::new(0);

/// Derive the cache key for a payload.
///
/// Falls back to a timestamp-based key when the payload cannot be
/// fingerprinted, which leaves that record un-deduplicated.
pub fn fingerprint(payload: &RawShelterPayload) -> CacheKey {
    match try_fingerprint(payload) {
        Ok(key) => key,
        Err(e) => {
            let key = fallback_key();
            warn!(error = %e, key = %key, "Fingerprint failed, using fallback key");
            key
        }
    }
}

/// Derive the cache key, reporting payloads whose coordinates are not
/// scalar values.
pub fn try_fingerprint(payload: &RawShelterPayload) -> Result<CacheKey> {
    let sources = sources(payload);

    let name = sources
        .iter()
        .find_map(|src| fields::first_string(src, NAME_ALIASES))
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());
    let lat = coordinate(&sources, LATITUDE_ALIASES)?;
    let lng = coordinate(&sources, LONGITUDE_ALIASES)?;

    Ok(digest(&format!("{}_{}_{}", name, lat, lng)))
}

/// Lookup order: nested `location`, nested `data`, then the payload itself.
fn sources(payload: &RawShelterPayload) -> Vec<&Map<String, Value>> {
    let mut sources = Vec::with_capacity(3);
    if let Some(location) = fields::nested(payload, "location") {
        sources.push(location);
    }
    if let Some(data) = fields::nested(payload, "data") {
        sources.push(data);
    }
    sources.push(payload);
    sources
}

fn coordinate(sources: &[&Map<String, Value>], aliases: &[&str]) -> Result<String> {
    for src in sources {
        let Some(value) = fields::first_present(src, aliases) else {
            continue;
        };
        match value {
            Value::Number(_) => {
                if let Some(n) = fields::as_f64(value) {
                    return Ok(n.to_string());
                }
            }
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    continue;
                }
                // "35.0" and 35 should agree.
                return Ok(match fields::as_f64(value) {
                    Some(n) => n.to_string(),
                    None => s.to_string(),
                });
            }
            other => {
                return Err(ShelterError::Fingerprint(format!(
                    "coordinate is a {}, expected a number",
                    json_kind(other)
                )))
            }
        }
    }
    Ok(MISSING_COORDINATE.to_string())
}

fn digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

fn fallback_key() -> CacheKey {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| super::now_millis().saturating_mul(1_000_000));
    let seq = FALLBACK_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("fp_{}_{}", nanos, seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fp(v: Value) -> CacheKey {
        fingerprint(v.as_object().unwrap())
    }

    #[test]
    fn test_deterministic() {
        let payload = json!({"title": "Central Gym", "latitude": 35.0, "longitude": 139.0});
        assert_eq!(fp(payload.clone()), fp(payload));
    }

    #[test]
    fn test_key_shape() {
        let key = fp(json!({"name": "Hall"}));
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_alias_permutations_agree() {
        let nested = fp(json!({
            "title": "Central Gym",
            "location": {"latitude": 35.0, "longitude": 139.0}
        }));
        let flat = fp(json!({
            "shelter_name": "Central Gym",
            "shelter_latitude": 35,
            "shelter_longitude": "139.0"
        }));
        let data = fp(json!({
            "data": {"name": "Central Gym", "lat": "35", "lng": 139}
        }));
        assert_eq!(nested, flat);
        assert_eq!(nested, data);
    }

    #[test]
    fn test_distinguishes_name_and_location() {
        let a = fp(json!({"name": "A", "latitude": 35.0, "longitude": 139.0}));
        let b = fp(json!({"name": "B", "latitude": 35.0, "longitude": 139.0}));
        let c = fp(json!({"name": "A", "latitude": 35.1, "longitude": 139.0}));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let empty = fp(json!({}));
        assert_eq!(empty, digest("unknown_0_0"));
    }

    #[test]
    fn test_location_wins_over_flat() {
        let key = fp(json!({
            "name": "Hall",
            "location": {"latitude": 1.0, "longitude": 2.0},
            "latitude": 9.0,
            "longitude": 9.0
        }));
        assert_eq!(key, digest("Hall_1_2"));
    }

    #[test]
    fn test_non_scalar_coordinate_errors() {
        let payload = json!({"name": "Hall", "latitude": {"deg": 35}, "longitude": 139.0});
        let err = try_fingerprint(payload.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, ShelterError::Fingerprint(_)));
    }

    #[test]
    fn test_fallback_keys_are_distinct() {
        let payload = json!({"name": "Hall", "latitude": [35], "longitude": 139.0});
        let a = fp(payload.clone());
        let b = fp(payload);
        assert!(a.starts_with("fp_"));
        assert_ne!(a, b);
    }
}
