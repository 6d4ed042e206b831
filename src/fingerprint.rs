use serde_json::Value;

use crate::config::SimulationRequest;
use crate::error::EngineResult;

/// Strip nulls recursively. Absent and explicit-null optional fields end
/// up identical, so they cannot split the cache key.
fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

/// Canonical serialization of a request: stable key order (serde_json maps
/// are ordered), nulls stripped, floats in their shortest round-trip form.
/// This string is part of the public surface — changing it invalidates
/// every cached fingerprint.
pub fn canonical_string(request: &SimulationRequest) -> EngineResult<String> {
    let value = serde_json::to_value(request)?;
    Ok(strip_nulls(value).to_string())
}

/// Cache key: blake3 over a job-kind tag and the canonical serialization.
/// The tag keeps a single-run submission and a Monte-Carlo submission of
/// the same payload from colliding.
pub fn fingerprint(request: &SimulationRequest, kind_tag: &str) -> EngineResult<String> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind_tag.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_string(request)?.as_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}
