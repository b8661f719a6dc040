//! Conversion of raw shelter payloads into [`CanonicalShelterRecord`]s.

use serde_json::Value;
use tracing::warn;

use crate::error::{Result, ShelterError};

use super::fields::{
    self, ADDRESS_ALIASES, CAPACITY_ALIASES, DISTANCE_ALIASES, FACILITIES_ALIASES, ID_ALIASES,
    LATITUDE_ALIASES, LONGITUDE_ALIASES, NAME_ALIASES, PHONE_ALIASES, STATUS_ALIASES,
    TYPE_ALIASES,
};
use super::{
    now_millis, CanonicalShelterRecord, RawShelterPayload, ShelterDetails, DEFAULT_STATUS,
    UNKNOWN_SHELTER_NAME,
};

/// Normalize one raw shelter payload. Never fails; unknown or malformed
/// fields fall back to their defaults.
pub fn normalize_shelter(payload: &RawShelterPayload) -> CanonicalShelterRecord {
    let name =
        fields::first_string(payload, NAME_ALIASES).unwrap_or_else(|| UNKNOWN_SHELTER_NAME.into());
    let id = fields::first_id(payload, ID_ALIASES)
        .unwrap_or_else(|| format!("unknown_{}", now_millis()));
    let status =
        fields::first_string(payload, STATUS_ALIASES).unwrap_or_else(|| DEFAULT_STATUS.into());

    let (latitude, longitude) = match extract_coordinates(payload) {
        Some((lat, lng)) => (Some(lat), Some(lng)),
        None => {
            let payload_json = Value::Object(payload.clone());
            warn!(
                shelter = %name,
                id = %id,
                payload = %payload_json,
                "Shelter payload has no usable coordinates"
            );
            (None, None)
        }
    };

    CanonicalShelterRecord {
        id,
        name,
        status,
        latitude,
        longitude,
        extra: extract_details(payload),
    }
}

/// Normalize a shelter given as an arbitrary JSON value.
///
/// Returns [`ShelterError::InvalidShelter`] when the value is not an object.
pub fn normalize_value(value: &Value) -> Result<CanonicalShelterRecord> {
    as_payload(value).map(normalize_shelter)
}

/// View a JSON value as a shelter payload.
pub fn as_payload(value: &Value) -> Result<&RawShelterPayload> {
    value.as_object().ok_or_else(|| {
        ShelterError::InvalidShelter(format!("expected an object, got {}", json_kind(value)))
    })
}

/// A nested `location` object is authoritative when present: flat aliases
/// are only consulted when there is no such object. A lone coordinate is
/// discarded.
fn extract_coordinates(payload: &RawShelterPayload) -> Option<(f64, f64)> {
    let (lat, lng) = match fields::nested(payload, "location") {
        Some(location) => (
            location.get(fields::LOCATION_LATITUDE).and_then(fields::as_f64),
            location.get(fields::LOCATION_LONGITUDE).and_then(fields::as_f64),
        ),
        None => (
            fields::first_f64(payload, LATITUDE_ALIASES),
            fields::first_f64(payload, LONGITUDE_ALIASES),
        ),
    };
    Some((lat?, lng?))
}

fn extract_details(payload: &RawShelterPayload) -> ShelterDetails {
    ShelterDetails {
        address: fields::first_string(payload, ADDRESS_ALIASES).unwrap_or_default(),
        shelter_type: fields::first_string(payload, TYPE_ALIASES).unwrap_or_default(),
        capacity: fields::first_u64(payload, CAPACITY_ALIASES),
        distance: fields::first_f64(payload, DISTANCE_ALIASES),
        phone: fields::first_string(payload, PHONE_ALIASES).unwrap_or_default(),
        facilities: fields::first_string_list(payload, FACILITIES_ALIASES).unwrap_or_default(),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize(v: Value) -> CanonicalShelterRecord {
        normalize_value(&v).unwrap()
    }

    #[test]
    fn test_nested_location() {
        let rec = normalize(json!({
            "title": "Central Gym",
            "location": {"latitude": 35.0, "longitude": 139.0}
        }));
        assert_eq!(rec.name, "Central Gym");
        assert_eq!(rec.status, "Available");
        assert_eq!(rec.latitude, Some(35.0));
        assert_eq!(rec.longitude, Some(139.0));
    }

    #[test]
    fn test_flat_aliases() {
        let rec = normalize(json!({
            "shelter_name": "Riverside School",
            "shelter_latitude": "35.68",
            "shelter_longitude": 139.76
        }));
        assert_eq!(rec.name, "Riverside School");
        assert_eq!(rec.coordinates(), Some((35.68, 139.76)));
    }

    #[test]
    fn test_location_object_blocks_flat_fallback() {
        let rec = normalize(json!({
            "name": "Hall",
            "location": {"address": "1-2-3"},
            "shelter_latitude": 35.0,
            "shelter_longitude": 139.0
        }));
        assert_eq!(rec.latitude, None);
        assert_eq!(rec.longitude, None);
    }

    #[test]
    fn test_missing_coordinates_are_both_none() {
        let rec = normalize(json!({"name": "Hall"}));
        assert_eq!((rec.latitude, rec.longitude), (None, None));
    }

    #[test]
    fn test_partial_coordinates_are_dropped() {
        let rec = normalize(json!({"name": "Hall", "latitude": 35.0}));
        assert_eq!((rec.latitude, rec.longitude), (None, None));

        let rec = normalize(json!({
            "name": "Hall",
            "location": {"longitude": 139.0}
        }));
        assert_eq!((rec.latitude, rec.longitude), (None, None));
    }

    #[test]
    fn test_name_precedence_and_default() {
        let rec = normalize(json!({"name": "B", "title": "A"}));
        assert_eq!(rec.name, "A");
        let rec = normalize(json!({"title": ""}));
        assert_eq!(rec.name, "Unknown Shelter");
    }

    #[test]
    fn test_id_precedence_and_fallback() {
        let rec = normalize(json!({"card_id": "card-9", "id": "s-1"}));
        assert_eq!(rec.id, "card-9");
        let rec = normalize(json!({"id": 17}));
        assert_eq!(rec.id, "17");
        let rec = normalize(json!({}));
        assert!(rec.id.starts_with("unknown_"));
        assert!(rec.id["unknown_".len()..].parse::<i64>().is_ok());
    }

    #[test]
    fn test_status_default_and_passthrough() {
        assert_eq!(normalize(json!({"status": "  "})).status, "Available");
        assert_eq!(normalize(json!({"status": "Full"})).status, "Full");
    }

    #[test]
    fn test_details_passthrough() {
        let rec = normalize(json!({
            "name": "Hall",
            "address": "1-2-3 Chiyoda",
            "shelter_type": "school",
            "capacity": 300,
            "distance_km": "1.2",
            "phone_number": "03-0000-0000",
            "facilities": ["water", "power"]
        }));
        assert_eq!(rec.extra.address, "1-2-3 Chiyoda");
        assert_eq!(rec.extra.shelter_type, "school");
        assert_eq!(rec.extra.capacity, Some(300));
        assert_eq!(rec.extra.distance, Some(1.2));
        assert_eq!(rec.extra.phone, "03-0000-0000");
        assert_eq!(rec.extra.facilities, vec!["water", "power"]);
    }

    #[test]
    fn test_details_default_when_absent() {
        let rec = normalize(json!({"name": "Hall"}));
        assert_eq!(rec.extra, ShelterDetails::default());
    }

    #[test]
    fn test_non_object_rejected() {
        let err = normalize_value(&json!("Central Gym")).unwrap_err();
        assert!(matches!(err, ShelterError::InvalidShelter(_)));
        assert!(err.to_string().contains("string"));
    }
}
