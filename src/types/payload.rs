use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The weather provider's decoded JSON response, kept opaque.
///
/// The payload is written to disk exactly as received and never mutated; all
/// schema validation is deferred to the cleaning stage, which is the boundary
/// that actually depends on the shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawWeatherPayload(Value);

impl RawWeatherPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// A named top-level section (`daily`, `hourly`, ...) as a JSON object,
    /// if present.
    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.0.get(name)?.as_object()
    }

    /// The `daily` section of parallel arrays, if present.
    pub fn daily(&self) -> Option<&Map<String, Value>> {
        self.section("daily")
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}
