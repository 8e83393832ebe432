//! Typed access to resource state.
//!
//! The host hands states over as JSON objects. [`ResourceData`] wraps one and
//! offers the accessors the resource implementations need: typed getters,
//! `get_ok` for "set and non-empty", setters, and the resource ID. A state
//! whose ID has been cleared converts back to `null`, which tells the host
//! the resource no longer exists.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ProviderError;

/// Name of the identifier attribute.
pub const ID_ATTRIBUTE: &str = "id";

/// Mutable view over one resource's state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    id: String,
    attributes: Map<String, Value>,
}

impl ResourceData {
    /// Create empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create state holding only an identifier, as an import does.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Map::new(),
        }
    }

    /// Wrap a JSON state. `null` yields empty state.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        let mut attributes = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ProviderError::InvalidRequest(format!(
                    "expected state to be an object, got {}",
                    type_name(&other)
                )))
            },
        };

        let id = match attributes.remove(ID_ATTRIBUTE) {
            Some(Value::String(id)) => id,
            None | Some(Value::Null) => String::new(),
            Some(other) => {
                return Err(ProviderError::InvalidRequest(format!(
                    "expected '{}' to be a string, got {}",
                    ID_ATTRIBUTE,
                    type_name(&other)
                )))
            },
        };

        Ok(Self { id, attributes })
    }

    /// Convert back into JSON; `null` when the ID has been cleared.
    pub fn into_value(self) -> Value {
        if self.id.is_empty() {
            return Value::Null;
        }
        let mut attributes = self.attributes;
        attributes.insert(ID_ATTRIBUTE.to_string(), Value::String(self.id));
        Value::Object(attributes)
    }

    /// The resource ID; empty when unknown or cleared.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Set the resource ID.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Forget the resource ID, marking the resource as gone.
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    /// Raw attribute value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Attribute value when it is set to something other than its zero value.
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        match self.attributes.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(value) => Some(value),
        }
    }

    /// Set an attribute.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// String attribute, empty when unset.
    pub fn get_str(&self, key: &str) -> &str {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// String attribute when set and non-empty.
    pub fn get_string_opt(&self, key: &str) -> Option<&str> {
        self.get_ok(key).and_then(Value::as_str)
    }

    /// A string attribute that must be present.
    pub fn require_str(&self, key: &str) -> Result<&str, ProviderError> {
        match self.get_ok(key) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(ProviderError::Validation(format!(
                "expected type of {} to be string, got {}",
                key,
                type_name(other)
            ))),
            None => Err(ProviderError::Validation(format!(
                "missing required attribute '{}'",
                key
            ))),
        }
    }

    /// Boolean attribute, `false` when unset.
    pub fn get_bool(&self, key: &str) -> bool {
        self.attributes
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Non-negative integer attribute.
    pub fn get_u64(&self, key: &str) -> Result<u64, ProviderError> {
        match self.attributes.get(key) {
            None | Some(Value::Null) => Ok(0),
            Some(value) => value.as_u64().ok_or_else(|| {
                ProviderError::Validation(format!(
                    "expected {} to be a non-negative integer, got {}",
                    key, value
                ))
            }),
        }
    }

    /// List of non-negative integers.
    pub fn get_u64_list(&self, key: &str) -> Result<Vec<u64>, ProviderError> {
        self.list(key)?
            .iter()
            .map(|v| {
                v.as_u64().ok_or_else(|| {
                    ProviderError::Validation(format!(
                        "expected every element of {} to be a non-negative integer, got {}",
                        key, v
                    ))
                })
            })
            .collect()
    }

    /// List of strings.
    pub fn get_string_list(&self, key: &str) -> Result<Vec<String>, ProviderError> {
        self.list(key)?
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    ProviderError::Validation(format!(
                        "expected every element of {} to be a string, got {}",
                        key, v
                    ))
                })
            })
            .collect()
    }

    /// Map of strings; empty when unset.
    pub fn get_string_map(&self, key: &str) -> Result<BTreeMap<String, String>, ProviderError> {
        match self.attributes.get(key) {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), s.clone())),
                    other => Err(ProviderError::Validation(format!(
                        "expected {}.{} to be a string, got {}",
                        key,
                        k,
                        type_name(other)
                    ))),
                })
                .collect(),
            Some(other) => Err(ProviderError::Validation(format!(
                "expected {} to be a map, got {}",
                key,
                type_name(other)
            ))),
        }
    }

    fn list(&self, key: &str) -> Result<&[Value], ProviderError> {
        match self.attributes.get(key) {
            None | Some(Value::Null) => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(ProviderError::Validation(format!(
                "expected {} to be a list, got {}",
                key,
                type_name(other)
            ))),
        }
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_through_json() {
        let data = ResourceData::from_value(json!({
            "id": "acme.web.API_KEY",
            "project": "web",
            "name": "API_KEY"
        }))
        .unwrap();

        assert_eq!(data.id(), "acme.web.API_KEY");
        assert_eq!(data.get_str("project"), "web");
        assert!(data.get("id").is_none());

        let value = data.into_value();
        assert_eq!(value["id"], "acme.web.API_KEY");
        assert_eq!(value["name"], "API_KEY");
    }

    #[test]
    fn test_cleared_id_becomes_null() {
        let mut data = ResourceData::with_id("ctx-id");
        data.set("name", "deploy");
        data.clear_id();
        assert!(data.into_value().is_null());
    }

    #[test]
    fn test_get_ok_ignores_zero_values() {
        let data = ResourceData::from_value(json!({
            "organization": "",
            "project": "web",
            "description": null
        }))
        .unwrap();

        assert!(data.get_ok("organization").is_none());
        assert!(data.get_ok("description").is_none());
        assert!(data.get_ok("missing").is_none());
        assert_eq!(data.get_string_opt("project"), Some("web"));
    }

    #[test]
    fn test_typed_getters() {
        let data = ResourceData::from_value(json!({
            "per_hour": 2,
            "hours_of_day": [1, 13],
            "days_of_week": ["MON", "FRI"],
            "use_scheduling_system": true,
            "parameters": {"branch": "main"}
        }))
        .unwrap();

        assert_eq!(data.get_u64("per_hour").unwrap(), 2);
        assert_eq!(data.get_u64_list("hours_of_day").unwrap(), vec![1, 13]);
        assert_eq!(data.get_string_list("days_of_week").unwrap(), vec!["MON", "FRI"]);
        assert!(data.get_bool("use_scheduling_system"));
        assert_eq!(data.get_string_map("parameters").unwrap()["branch"], "main");
        assert!(data.get_string_map("missing").unwrap().is_empty());
    }

    #[test]
    fn test_typed_getter_errors() {
        let data = ResourceData::from_value(json!({
            "per_hour": -1,
            "hours_of_day": "noon",
            "parameters": {"branch": 1}
        }))
        .unwrap();

        assert!(data.get_u64("per_hour").is_err());
        assert!(data.get_u64_list("hours_of_day").is_err());
        assert!(data.get_string_map("parameters").is_err());
        assert!(data.require_str("project").is_err());
    }

    #[test]
    fn test_rejects_non_object_state() {
        assert!(ResourceData::from_value(json!(["not", "an", "object"])).is_err());
        assert!(ResourceData::from_value(json!({"id": 42})).is_err());
        assert_eq!(ResourceData::from_value(Value::Null).unwrap(), ResourceData::new());
    }
}
