//! Versioned state migrations.
//!
//! A [`MigrationTable`] maps each historical schema version to the step that
//! lifts a state one version up. Upgrades apply the steps in order until the
//! current version is reached.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::error::ProviderError;
use crate::state::ResourceData;

/// Provider settings a migration step may need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeContext {
    /// Organization configured on the provider.
    pub default_organization: Option<String>,
}

/// Lifts a state from version `n` to `n + 1`.
pub type MigrationStep = fn(ResourceData, &UpgradeContext) -> Result<ResourceData, ProviderError>;

/// Migration steps of one resource type.
#[derive(Debug, Clone)]
pub struct MigrationTable {
    current_version: u64,
    steps: BTreeMap<u64, MigrationStep>,
}

impl MigrationTable {
    /// A table without steps; only `current_version` states are accepted.
    pub fn new(current_version: u64) -> Self {
        Self {
            current_version,
            steps: BTreeMap::new(),
        }
    }

    /// Register the step upgrading states of version `from`.
    pub fn with_step(mut self, from: u64, step: MigrationStep) -> Self {
        self.steps.insert(from, step);
        self
    }

    /// Version states are upgraded to.
    pub fn current_version(&self) -> u64 {
        self.current_version
    }

    /// Upgrade a state persisted at `version`.
    pub fn upgrade(
        &self,
        version: u64,
        state: Value,
        context: &UpgradeContext,
    ) -> Result<Value, ProviderError> {
        if version > self.current_version {
            return Err(ProviderError::Validation(format!(
                "state version {} is newer than the supported version {}",
                version, self.current_version
            )));
        }
        if state.is_null() || version == self.current_version {
            return Ok(state);
        }

        let mut data = ResourceData::from_value(state)?;
        for from in version..self.current_version {
            let step = self.steps.get(&from).ok_or_else(|| {
                ProviderError::Validation(format!("no state migration from version {}", from))
            })?;
            debug!(from, to = from + 1, "migrating state");
            data = step(data, context)?;
        }
        Ok(data.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_marker(
        mut data: ResourceData,
        _: &UpgradeContext,
    ) -> Result<ResourceData, ProviderError> {
        let count = data.get_u64("marker")?;
        data.set("marker", count + 1);
        Ok(data)
    }

    #[test]
    fn test_steps_apply_in_sequence() {
        let table = MigrationTable::new(3)
            .with_step(0, add_marker)
            .with_step(1, add_marker)
            .with_step(2, add_marker);
        let context = UpgradeContext::default();

        let upgraded = table.upgrade(0, json!({"id": "a"}), &context).unwrap();
        assert_eq!(upgraded["marker"], 3);

        let upgraded = table.upgrade(2, json!({"id": "a"}), &context).unwrap();
        assert_eq!(upgraded["marker"], 1);
    }

    #[test]
    fn test_current_and_null_states_pass_through() {
        let table = MigrationTable::new(1);
        let context = UpgradeContext::default();
        let state = json!({"id": "a", "x": 1});

        assert_eq!(table.upgrade(1, state.clone(), &context).unwrap(), state);
        assert_eq!(table.upgrade(0, Value::Null, &context).unwrap(), Value::Null);
    }

    #[test]
    fn test_missing_step_and_future_version() {
        let table = MigrationTable::new(2).with_step(1, add_marker);
        let context = UpgradeContext::default();

        let err = table.upgrade(0, json!({"id": "a"}), &context).unwrap_err();
        assert_eq!(err.message(), "no state migration from version 0");

        let err = table.upgrade(3, json!({"id": "a"}), &context).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }
}
