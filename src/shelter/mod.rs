//! Shelter data model, normalization and fingerprinting.
//!
//! Shelter records arrive as loosely typed JSON objects whose field names vary
//! between producers. [`normalize_shelter`] turns one of them into a
//! [`CanonicalShelterRecord`]; [`fingerprint`] derives the cache key used to
//! deduplicate them.

pub mod fields;
pub mod fingerprint;
pub mod normalize;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use fingerprint::{fingerprint, try_fingerprint, CacheKey};
pub use normalize::{as_payload, normalize_shelter, normalize_value};

/// Untyped shelter object as received from the network.
pub type RawShelterPayload = Map<String, Value>;

/// Name used when a payload carries none of the known name aliases.
pub const UNKNOWN_SHELTER_NAME: &str = "Unknown Shelter";

/// Status used when a payload carries no status.
pub const DEFAULT_STATUS: &str = "Available";

/// Normalized, UI-ready shelter record.
///
/// `latitude` and `longitude` are either both `Some` or both `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalShelterRecord {
    pub id: String,
    pub name: String,
    pub status: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub extra: ShelterDetails,
}

impl CanonicalShelterRecord {
    /// `(latitude, longitude)` when the record has a location.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}

/// Passthrough fields the listing UI shows alongside a shelter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelterDetails {
    pub address: String,
    #[serde(rename = "type")]
    pub shelter_type: String,
    pub capacity: Option<u64>,
    /// Distance from the user as reported by the server (km).
    pub distance: Option<f64>,
    pub phone: String,
    pub facilities: Vec<String>,
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(lat: Option<f64>, lng: Option<f64>) -> CanonicalShelterRecord {
        CanonicalShelterRecord {
            id: "s1".into(),
            name: "Central Gym".into(),
            status: DEFAULT_STATUS.into(),
            latitude: lat,
            longitude: lng,
            extra: ShelterDetails::default(),
        }
    }

    #[test]
    fn test_coordinates() {
        assert_eq!(
            record(Some(35.0), Some(139.0)).coordinates(),
            Some((35.0, 139.0))
        );
        assert_eq!(record(Some(35.0), None).coordinates(), None);
    }

    #[test]
    fn test_record_serde_uses_type_key() {
        let mut rec = record(Some(35.0), Some(139.0));
        rec.extra.shelter_type = "school".into();
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["extra"]["type"], "school");

        let back: CanonicalShelterRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn test_record_deserialize_without_extra() {
        let json = r#"{"id":"a","name":"b","status":"Full","latitude":null,"longitude":null}"#;
        let rec: CanonicalShelterRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.extra, ShelterDetails::default());
    }
}
