//! Plan computation and the value types exchanged with the host.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::masking::MaskStrategy;
use crate::schema::{Attribute, Schema};

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<Value>,
    /// The value after the change (None if deleting).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether applying the plan changes anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Diff a prior state against the proposed configuration.
///
/// A null proposal plans a destroy. Computed attributes the configuration
/// leaves unset keep their prior value. Masked attributes are compared
/// through their digest. An unchanged secret is planned as its digest unless
/// the resource is replaced, in which case create needs the clear value. Any
/// change to a `force_new` attribute requires replacement.
pub fn plan_resource(
    schema: &Schema,
    prior: Option<&Value>,
    proposed: &Value,
) -> Result<PlanResult, ProviderError> {
    let prior = match prior {
        Some(Value::Null) | None => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            return Err(ProviderError::InvalidRequest(
                "prior state must be an object".to_string(),
            ))
        },
    };
    let proposed = match proposed {
        Value::Null => return Ok(plan_destroy(prior)),
        Value::Object(map) => map,
        _ => {
            return Err(ProviderError::InvalidRequest(
                "proposed state must be an object".to_string(),
            ))
        },
    };

    let Some(prior) = prior else {
        return Ok(plan_create(schema, proposed));
    };

    let mut planned = proposed.clone();
    let mut changes = Vec::new();
    let mut requires_replace = false;
    let mut kept_secrets = Vec::new();

    for (name, attr) in &schema.attributes {
        let before = prior.get(name).cloned().unwrap_or(Value::Null);
        let after = proposed.get(name).cloned().unwrap_or(Value::Null);

        if attr.computed && after.is_null() {
            if !before.is_null() {
                planned.insert(name.clone(), before);
            }
            continue;
        }
        if !differs(attr, &before, &after) {
            if attr.masked && !before.is_null() {
                kept_secrets.push((name.clone(), before));
            }
            continue;
        }

        requires_replace |= attr.force_new;
        changes.push(match (before.is_null(), after.is_null()) {
            (true, _) => AttributeChange::added(name, presented(attr, after)),
            (false, true) => AttributeChange::removed(name, before),
            (false, false) => AttributeChange::modified(name, before, presented(attr, after)),
        });
    }

    // A replacement creates the resource again and needs the clear value.
    if !requires_replace {
        planned.extend(kept_secrets);
    }
    if changes.is_empty() {
        return Ok(PlanResult::no_change(Value::Object(planned)));
    }
    Ok(PlanResult::with_changes(
        Value::Object(planned),
        changes,
        requires_replace,
    ))
}

fn plan_create(schema: &Schema, proposed: &Map<String, Value>) -> PlanResult {
    let changes = proposed
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| {
            let value = match schema.attribute(name) {
                Some(attr) => presented(attr, value.clone()),
                None => value.clone(),
            };
            AttributeChange::added(name, value)
        })
        .collect();
    PlanResult::with_changes(Value::Object(proposed.clone()), changes, false)
}

fn plan_destroy(prior: Option<&Map<String, Value>>) -> PlanResult {
    let changes = prior
        .into_iter()
        .flatten()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| AttributeChange::removed(name, value.clone()))
        .collect();
    PlanResult::with_changes(Value::Null, changes, false)
}

fn differs(attr: &Attribute, before: &Value, after: &Value) -> bool {
    if attr.masked {
        if let Value::String(clear) = after {
            return before.as_str() != Some(clear.as_str())
                && before.as_str() != Some(MaskStrategy::Digest.apply(clear).as_str());
        }
    }
    before != after
}

/// What a change shows for `value`: the digest for masked attributes.
fn presented(attr: &Attribute, value: Value) -> Value {
    match (&value, attr.masked) {
        (Value::String(clear), true) => Value::String(MaskStrategy::Digest.apply(clear)),
        _ => value,
    }
}
