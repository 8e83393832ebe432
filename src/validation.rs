//! Validation of configuration values.
//!
//! [`validate`] checks a JSON object against a flat [`Schema`]: required
//! attributes, attribute types and list or map element types. The remaining
//! functions are the domain validators the resources apply before talking to
//! CircleCI.
//!
//! # Example
//!
//! ```
//! use circleci_provider::schema::{Attribute, Schema};
//! use circleci_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("project", Attribute::required_string())
//!     .with_attribute("name", Attribute::required_string());
//!
//! let diagnostics = validate(&schema, &json!({"project": "web", "name": "API_KEY"}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"project": 42}));
//! assert_eq!(diagnostics.len(), 2);
//! ```

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::client::schedule::DayOfWeek;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use crate::state::type_name;

static LEADING_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]").expect("valid regex"));

static NAME_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid regex"));

/// Highest hour accepted in `hours_of_day`.
pub const MAX_HOUR_OF_DAY: u64 = 23;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed-only attributes are skipped
/// - Attribute types must match the schema
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return diagnostics,
        other => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", type_name(other))),
            );
            return diagnostics;
        },
    };

    for (name, attr) in &schema.attributes {
        validate_attribute(attr, obj.get(name), name, &mut diagnostics);
    }
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Check an environment variable name.
///
/// Returns one message per violated rule; an empty list means the name is
/// acceptable.
pub fn validate_environment_variable_name(name: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if !LEADING_LETTER.is_match(name) {
        errors.push("environment variables may only begin with a letter".to_string());
    }
    if !NAME_CHARACTERS.is_match(name) {
        errors.push(
            "environment variable names may only contain letters (uppercase and lowercase), \
             digits, and underscores"
                .to_string(),
        );
    }
    errors
}

/// Like [`validate_environment_variable_name`], folded into a single error.
pub fn check_environment_variable_name(name: &str) -> Result<(), ProviderError> {
    let errors = validate_environment_variable_name(name);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::Validation(format!(
            "invalid environment variable name '{}': {}",
            name,
            errors.join("; ")
        )))
    }
}

/// Parse the configured days of a schedule.
pub fn validate_days_of_week<S: AsRef<str>>(days: &[S]) -> Result<Vec<DayOfWeek>, ProviderError> {
    days.iter()
        .map(|day| DayOfWeek::from_str(day.as_ref()))
        .collect()
}

/// Check that every hour lies within a day.
pub fn validate_hours_of_day(hours: &[u64]) -> Result<(), ProviderError> {
    match hours.iter().find(|hour| **hour > MAX_HOUR_OF_DAY) {
        Some(hour) => Err(ProviderError::Validation(format!(
            "Invalid hour specified: {} (expected 0 to {})",
            hour, MAX_HOUR_OF_DAY
        ))),
        None => Ok(()),
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => validate_attribute_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if value.as_i64().is_none() {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, item, &item_path, diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "list", value)),
        },
        AttributeType::Map(value_type) => match value.as_object() {
            Some(entries) => {
                for (key, entry) in entries {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, entry, &key_path, diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "map", value)),
        },
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "deploy"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        let diagnostics = validate(&schema, &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("id", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"id": 123})).is_empty());
    }

    #[test]
    fn test_validate_optional_computed_checked_when_set() {
        let organization = Attribute::optional_string().with_computed();
        let schema = Schema::v0().with_attribute("organization", organization);

        assert!(validate(&schema, &json!({})).is_empty());
        assert_eq!(validate(&schema, &json!({"organization": false})).len(), 1);
    }

    #[test]
    fn test_validate_list_elements() {
        let schema = Schema::v0().with_attribute(
            "hours_of_day",
            Attribute::required(AttributeType::list(AttributeType::Int64)),
        );

        assert!(validate(&schema, &json!({"hours_of_day": [0, 12, 23]})).is_empty());

        let diagnostics = validate(&schema, &json!({"hours_of_day": [1, "two"]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("hours_of_day.1".to_string()));

        let diagnostics = validate(&schema, &json!({"hours_of_day": 3}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_validate_map_values() {
        let schema = Schema::v0().with_attribute(
            "parameters",
            Attribute::optional(AttributeType::map(AttributeType::String)),
        );

        assert!(validate(&schema, &json!({"parameters": {"branch": "main"}})).is_empty());

        let diagnostics = validate(&schema, &json!({"parameters": {"branch": 1}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("parameters.branch".to_string()));
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
    }

    #[test]
    fn test_validate_helpers() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(is_valid(&schema, &json!({"name": "x"})));
        assert!(!is_valid(&schema, &json!({})));
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }

    #[test]
    fn test_environment_variable_names() {
        let cases = [
            ("valid", true),
            ("VALID", true),
            ("VALID_UNDERSCORE_", true),
            ("VALID_DIGIT_1", true),
            ("invalid-dashed", false),
            ("1_leads_with_digit", false),
            ("_leads_with_underscore", false),
            ("", false),
        ];

        for (name, valid) in cases {
            let errors = validate_environment_variable_name(name);
            assert_eq!(errors.is_empty(), valid, "name {:?}: {:?}", name, errors);
            assert_eq!(check_environment_variable_name(name).is_ok(), valid);
        }
    }

    #[test]
    fn test_environment_variable_name_messages() {
        assert_eq!(
            validate_environment_variable_name("invalid-dashed"),
            vec![
                "environment variable names may only contain letters (uppercase and lowercase), \
                 digits, and underscores"
                    .to_string()
            ]
        );

        // both rules fail for a leading dash
        assert_eq!(validate_environment_variable_name("-x").len(), 2);
    }

    #[test]
    fn test_days_of_week() {
        let days = validate_days_of_week(&["MON", "FRI"]).unwrap();
        assert_eq!(days, vec![DayOfWeek::Mon, DayOfWeek::Fri]);

        let err = validate_days_of_week(&["MON", "FUNDAY"]).unwrap_err();
        assert_eq!(err.message(), "Invalid day specified: FUNDAY");
    }

    #[test]
    fn test_hours_of_day() {
        assert!(validate_hours_of_day(&[0, 11, 23]).is_ok());
        assert!(validate_hours_of_day(&[]).is_ok());

        let err = validate_hours_of_day(&[9, 24]).unwrap_err();
        assert!(err.to_string().contains("Invalid hour specified: 24"));
    }
}
