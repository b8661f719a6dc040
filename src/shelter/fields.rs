//! Ordered alias tables and extractors for loosely typed shelter payloads.
//!
//! Each field is resolved by walking its alias table in order and taking the
//! first usable value. The tables are the single source of precedence for the
//! normalizer and the fingerprint function.

use serde_json::{Map, Value};

pub const NAME_ALIASES: &[&str] = &["title", "name", "shelter_name"];
pub const ID_ALIASES: &[&str] = &["card_id", "id"];
pub const STATUS_ALIASES: &[&str] = &["status"];

/// Keys read from a nested `location` object.
pub const LOCATION_LATITUDE: &str = "latitude";
pub const LOCATION_LONGITUDE: &str = "longitude";

/// Flat coordinate aliases, used when there is no `location` object.
pub const LATITUDE_ALIASES: &[&str] = &["shelter_latitude", "latitude", "lat"];
pub const LONGITUDE_ALIASES: &[&str] = &["shelter_longitude", "longitude", "lng", "lon"];

pub const ADDRESS_ALIASES: &[&str] = &["address", "shelter_address"];
pub const TYPE_ALIASES: &[&str] = &["type", "shelter_type"];
pub const CAPACITY_ALIASES: &[&str] = &["capacity"];
pub const DISTANCE_ALIASES: &[&str] = &["distance", "distance_km"];
pub const PHONE_ALIASES: &[&str] = &["phone", "phone_number"];
pub const FACILITIES_ALIASES: &[&str] = &["facilities"];

/// Nested object under `key`, if that key holds an object.
pub fn nested<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    map.get(key).and_then(Value::as_object)
}

/// First alias whose value is present and not `null`.
pub fn first_present<'a>(map: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|alias| map.get(*alias))
        .find(|v| !v.is_null())
}

/// First alias holding a non-blank string.
pub fn first_string(map: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| {
        map.get(*alias)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// First alias holding a non-blank string or an integer.
pub fn first_id(map: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| match map.get(*alias)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First alias holding a finite number or a numeric string.
pub fn first_f64(map: &Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    aliases
        .iter()
        .find_map(|alias| map.get(*alias).and_then(as_f64))
}

/// First alias holding a non-negative integer (or an integer string).
pub fn first_u64(map: &Map<String, Value>, aliases: &[&str]) -> Option<u64> {
    aliases.iter().find_map(|alias| match map.get(*alias)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// First alias holding a list of strings or a comma separated string.
pub fn first_string_list(map: &Map<String, Value>, aliases: &[&str]) -> Option<Vec<String>> {
    aliases.iter().find_map(|alias| match map.get(*alias)? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    })
}

/// Interpret a JSON value as a finite `f64`.
pub fn as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}
