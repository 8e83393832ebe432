//! Test harness for driving a [`ProviderService`] the way a host would.
//!
//! # Example
//!
//! ```ignore
//! use circleci_provider::testing::{assert_state_masks, ProviderTester};
//! use circleci_provider::CircleCiProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_variable() {
//!     let tester = ProviderTester::new(CircleCiProvider::new());
//!     tester.configure(json!({"api_token": "t", "organization": "acme"})).await.unwrap();
//!
//!     let state = tester
//!         .lifecycle_create(
//!             "circleci_environment_variable",
//!             json!({"project": "web", "name": "API_KEY", "value": "s3cr3t"}),
//!         )
//!         .await
//!         .unwrap();
//!     assert_state_masks(&state, "value", "s3cr3t");
//! }
//! ```

use crate::error::ProviderError;
use crate::masking::hash_value;
use crate::plan::{ImportedResource, PlanResult};
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use serde_json::Value;

/// Wraps a provider and sequences host calls for tests.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Schemas of the provider, its resources and data sources.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Names of the managed resource types.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Names of the data source types.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate a provider block; error diagnostics become [`TestError::Diagnostics`].
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider once. Error diagnostics fail the call.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Plan a resource that has no prior state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan `proposed_state` against a stored state.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a destroy.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Apply a planned create.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a stored state. A gone resource reads as `Value::Null`.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Apply an in-place update.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import by the ID a user would type.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Look up a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Plan, create, then read back. Returns the state after the read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Plan an update and apply it the way a host would: in place when the
    /// plan allows it, otherwise by deleting and creating again. Returns the
    /// state after the final read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        if !plan.has_changes() {
            return self.read(resource_type, prior_state).await;
        }

        let applied = if plan.requires_replace {
            self.delete(resource_type, prior_state).await?;
            self.create(resource_type, plan.planned_state).await?
        } else {
            self.update(resource_type, prior_state, plan.planned_state)
                .await?
        };
        self.read(resource_type, applied).await
    }

    /// Plan a destroy, delete, then read. The final read must report the
    /// resource as gone.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state.clone()).await?;

        let after = self.read(resource_type, current_state).await?;
        if after.is_null() {
            Ok(())
        } else {
            Err(ProviderError::InvalidRequest(format!(
                "{} still exists after delete",
                resource_type
            )))
        }
    }

}

/// Failure of a tester call: error diagnostics or a provider error.
#[derive(Debug)]
pub enum TestError {
    /// Error diagnostics returned by the provider.
    Diagnostics(Vec<Diagnostic>),
    /// The provider call itself failed.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

/// Keep only error diagnostics; any left fail the call.
fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Assert the plan creates a resource from nothing.
///
/// # Panics
///
/// Panics when the plan is empty or replaces an existing resource.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(plan.has_changes(), "create plan is empty");
    assert!(
        !plan.requires_replace,
        "create plan unexpectedly replaces: {:?}",
        changed_paths(plan)
    );
}

/// Assert the plan leaves the resource alone.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "plan should be empty but changes {:?}",
        changed_paths(plan)
    );
}

/// Assert the plan changes at least one attribute.
pub fn assert_plan_has_changes(plan: &PlanResult) {
    assert!(plan.has_changes(), "plan should change something");
}

/// Assert the plan destroys and recreates the resource.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "plan should replace, changes {:?}",
        changed_paths(plan)
    );
}

/// Assert the plan updates in place.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "plan should update in place, changes {:?}",
        changed_paths(plan)
    );
}

/// Assert `path` is among the planned changes.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let changed = changed_paths(plan);
    assert!(changed.contains(&path), "'{}' not in changes {:?}", path, changed);
}

/// Assert `path` is not among the planned changes.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    let changed = changed_paths(plan);
    assert!(!changed.contains(&path), "'{}' unexpectedly changes", path);
}

/// Assert that `attribute` holds the digest of `clear`, never the clear value.
///
/// # Panics
///
/// Panics if the state stores anything else.
pub fn assert_state_masks(state: &Value, attribute: &str, clear: &str) {
    let stored = state.get(attribute).and_then(Value::as_str);
    assert_ne!(
        stored,
        Some(clear),
        "Expected '{}' to be masked, but state holds the clear value",
        attribute
    );
    assert_eq!(
        stored,
        Some(hash_value(clear).as_str()),
        "Expected '{}' to hold the digest of the configured value",
        attribute
    );
}

/// Assert that a read reported the resource as gone.
pub fn assert_state_absent(state: &Value) {
    assert!(
        state.is_null(),
        "Expected the resource to be gone, but read returned {}",
        state
    );
}

/// Assert some error diagnostic mentions `substring` in its summary.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let errors: Vec<&str> = diagnostics
        .iter()
        .filter(|d| d.severity == DiagnosticSeverity::Error)
        .map(|d| d.summary.as_str())
        .collect();
    assert!(
        errors.iter().any(|summary| summary.contains(substring)),
        "no error mentions '{}': {:?}",
        substring,
        errors
    );
}
