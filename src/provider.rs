//! [`CircleCiProvider`]: the [`ProviderService`] for CircleCI.
//!
//! The provider owns the API client once configured and routes every host
//! request to the module of the addressed resource type.

use std::sync::OnceLock;

use serde_json::Value;
use tracing::{debug, info};

use crate::client::Client;
use crate::config::{process_env, EnvLookup, ProviderConfig};
use crate::error::ProviderError;
use crate::migration::{MigrationTable, UpgradeContext};
use crate::plan::{plan_resource, ImportedResource, PlanResult};
use crate::resources::{
    context, context_data_source, context_environment_variable, environment_variable, schedule,
    ResourceKind,
};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::state::ResourceData;
use crate::validation::{
    validate, validate_days_of_week, validate_environment_variable_name, validate_hours_of_day,
};

/// Provider managing CircleCI resources.
pub struct CircleCiProvider {
    client: OnceLock<Client>,
    env: EnvLookup,
}

impl CircleCiProvider {
    /// Provider reading environment defaults from the process environment.
    pub fn new() -> Self {
        Self::with_env_lookup(process_env())
    }

    /// Provider resolving environment defaults through `env`.
    pub fn with_env_lookup(env: EnvLookup) -> Self {
        Self {
            client: OnceLock::new(),
            env,
        }
    }

    /// The configured client.
    pub fn client(&self) -> Result<&Client, ProviderError> {
        self.client.get().ok_or_else(|| {
            ProviderError::Configuration("provider has not been configured".to_string())
        })
    }

    /// Whether the resource described by `state` exists remotely.
    pub async fn exists(&self, resource_type: &str, state: Value) -> Result<bool, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let client = self.client()?;
        let mut data = ResourceData::from_value(state)?;
        if data.id().is_empty() {
            return Ok(false);
        }

        match kind {
            ResourceKind::EnvironmentVariable => {
                environment_variable::exists(client, &mut data).await
            },
            ResourceKind::Context => context::exists(client, &data).await,
            ResourceKind::ContextEnvironmentVariable => {
                context_environment_variable::exists(client, &data).await
            },
            ResourceKind::Schedule => schedule::exists(client, &data).await,
        }
    }

    fn upgrade_context(&self) -> UpgradeContext {
        UpgradeContext {
            default_organization: self
                .client
                .get()
                .and_then(|client| client.default_organization())
                .map(str::to_string),
        }
    }
}

impl Default for CircleCiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CircleCiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircleCiProvider")
            .field("client", &self.client.get())
            .finish_non_exhaustive()
    }
}

/// Diagnostics for the values only the API would otherwise reject.
fn domain_diagnostics(kind: ResourceKind, config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let name_attribute = match kind {
        ResourceKind::EnvironmentVariable => Some("name"),
        ResourceKind::ContextEnvironmentVariable => Some("variable"),
        ResourceKind::Context | ResourceKind::Schedule => None,
    };

    if let Some(attribute) = name_attribute {
        if let Some(name) = config.get(attribute).and_then(Value::as_str) {
            for message in validate_environment_variable_name(name) {
                diagnostics.push(Diagnostic::error(message).with_attribute(attribute));
            }
        }
    }

    if kind == ResourceKind::Schedule {
        let data = match ResourceData::from_value(config.clone()) {
            Ok(data) => data,
            Err(_) => return diagnostics,
        };
        if let Ok(days) = data.get_string_list("days_of_week") {
            if let Err(err) = validate_days_of_week(&days) {
                diagnostics.push(Diagnostic::error(err.message()).with_attribute("days_of_week"));
            }
        }
        if let Ok(hours) = data.get_u64_list("hours_of_day") {
            if let Err(err) = validate_hours_of_day(&hours) {
                diagnostics.push(Diagnostic::error(err.message()).with_attribute("hours_of_day"));
            }
        }
    }
    diagnostics
}

#[async_trait::async_trait]
impl ProviderService for CircleCiProvider {
    fn schema(&self) -> ProviderSchema {
        ResourceKind::ALL.into_iter().fold(
            ProviderSchema::new()
                .with_provider_config(ProviderConfig::schema())
                .with_data_source(context_data_source::TYPE_NAME, context_data_source::schema()),
            |schema, kind| schema.with_resource(kind.type_name(), kind.schema()),
        )
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&ProviderConfig::schema(), &config);
        if diagnostics.is_empty() {
            if let Err(err) = ProviderConfig::from_value(&config, &self.env) {
                diagnostics.push(err.into());
            }
        }
        Ok(diagnostics)
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = ProviderConfig::from_value(&config, &self.env)?;
        let client = Client::new(&config)?;
        self.client.set(client).map_err(|_| {
            ProviderError::Configuration("provider is already configured".to_string())
        })?;

        info!(
            url = %config.url,
            vcs_type = %config.vcs_type,
            organization = config.organization.as_deref().unwrap_or("<unset>"),
            "configured CircleCI provider"
        );
        Ok(vec![])
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let mut diagnostics = validate(&kind.schema(), &config);
        diagnostics.extend(domain_diagnostics(kind, &config));
        Ok(diagnostics)
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let table = match kind {
            ResourceKind::EnvironmentVariable => environment_variable::migrations(),
            other => MigrationTable::new(other.schema().version),
        };
        debug!(resource_type, from = version, to = table.current_version(), "upgrading state");
        table.upgrade(version, state, &self.upgrade_context())
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        plan_resource(&kind.schema(), prior_state.as_ref(), &proposed_state)
    }

    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let client = self.client()?;
        let mut data = ResourceData::from_value(planned_state)?;

        match kind {
            ResourceKind::EnvironmentVariable => {
                environment_variable::create(client, &mut data).await?
            },
            ResourceKind::Context => context::create(client, &mut data).await?,
            ResourceKind::ContextEnvironmentVariable => {
                context_environment_variable::create(client, &mut data).await?
            },
            ResourceKind::Schedule => schedule::create(client, &mut data).await?,
        }
        Ok(data.into_value())
    }

    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let client = self.client()?;
        let mut data = ResourceData::from_value(current_state)?;
        if data.id().is_empty() {
            return Ok(Value::Null);
        }

        match kind {
            ResourceKind::EnvironmentVariable => {
                environment_variable::read(client, &mut data).await?
            },
            ResourceKind::Context => context::read(client, &mut data).await?,
            ResourceKind::ContextEnvironmentVariable => {
                context_environment_variable::read(client, &mut data).await?
            },
            ResourceKind::Schedule => schedule::read(client, &mut data).await?,
        }
        Ok(data.into_value())
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        if kind != ResourceKind::Schedule {
            return Err(ProviderError::Unimplemented(format!(
                "{} cannot be updated in place; every attribute forces replacement",
                kind
            )));
        }

        let client = self.client()?;
        let prior = ResourceData::from_value(prior_state)?;
        let mut data = ResourceData::from_value(planned_state)?;
        if data.id().is_empty() {
            data.set_id(prior.id());
        }
        schedule::update(client, &mut data).await?;
        Ok(data.into_value())
    }

    async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let client = self.client()?;
        let mut data = ResourceData::from_value(current_state)?;

        match kind {
            ResourceKind::EnvironmentVariable => {
                environment_variable::delete(client, &mut data).await
            },
            ResourceKind::Context => context::delete(client, &mut data).await,
            ResourceKind::ContextEnvironmentVariable => {
                context_environment_variable::delete(client, &mut data).await
            },
            ResourceKind::Schedule => schedule::delete(client, &mut data).await,
        }
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let client = self.client()?;
        let mut data = ResourceData::with_id(id);

        match kind {
            ResourceKind::EnvironmentVariable => {
                environment_variable::import(client, &mut data).await?
            },
            ResourceKind::Context => context::import(client, &mut data).await?,
            ResourceKind::ContextEnvironmentVariable => {
                context_environment_variable::import(client, &mut data, &self.env).await?
            },
            ResourceKind::Schedule => schedule::import(client, &mut data).await?,
        }
        info!(resource_type, id, "imported resource");
        Ok(vec![ImportedResource::new(resource_type, data.into_value())])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        if data_source_type != context_data_source::TYPE_NAME {
            return Err(ProviderError::UnknownResource(format!(
                "Unknown data source type: {}",
                data_source_type
            )));
        }
        Ok(validate(&context_data_source::schema(), &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        if data_source_type != context_data_source::TYPE_NAME {
            return Err(ProviderError::UnknownResource(format!(
                "Unknown data source type: {}",
                data_source_type
            )));
        }

        let client = self.client()?;
        let mut data = ResourceData::from_value(config)?;
        context_data_source::read(client, &mut data).await?;
        Ok(data.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn provider_with(vars: &[(&str, &str)]) -> CircleCiProvider {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CircleCiProvider::with_env_lookup(Arc::new(move |key| vars.get(key).cloned()))
    }

    #[test]
    fn test_schema_lists_everything() {
        let provider = provider_with(&[]);
        let metadata = provider.metadata();
        assert_eq!(metadata.resources.len(), 4);
        assert!(metadata
            .resources
            .contains(&"circleci_context_environment_variable".to_string()));
        assert_eq!(metadata.data_sources, vec!["circleci_context".to_string()]);
        assert_eq!(provider.schema().resources["circleci_environment_variable"].version, 1);
    }

    #[tokio::test]
    async fn test_configure_once() {
        let provider = provider_with(&[("CIRCLECI_TOKEN", "t")]);
        assert!(provider.client().is_err());

        provider.configure(json!({"organization": "acme"})).await.unwrap();
        assert_eq!(provider.client().unwrap().default_organization(), Some("acme"));

        let err = provider.configure(json!({})).await.unwrap_err();
        assert_eq!(err.message(), "provider is already configured");
    }

    #[tokio::test]
    async fn test_validate_provider_config_reports_missing_token() {
        let provider = provider_with(&[]);
        let diagnostics = provider.validate_provider_config(json!({})).await.unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .is_some_and(|detail| detail.contains("CIRCLECI_TOKEN")));
    }

    #[tokio::test]
    async fn test_validate_resource_config_domain_rules() {
        let provider = provider_with(&[]);

        let diagnostics = provider
            .validate_resource_config(
                "circleci_environment_variable",
                json!({"project": "web", "name": "1BAD-NAME", "value": "x"}),
            )
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("name"));

        let diagnostics = provider
            .validate_resource_config(
                "circleci_schedule",
                json!({
                    "project": "web",
                    "name": "nightly",
                    "per_hour": 1,
                    "hours_of_day": [25],
                    "days_of_week": ["MON", "SOMEDAY"],
                    "use_scheduling_system": false
                }),
            )
            .await
            .unwrap();
        let summaries: Vec<_> = diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert!(summaries.contains(&"Invalid day specified: SOMEDAY"));
        assert_eq!(diagnostics.len(), 2);
    }

    #[tokio::test]
    async fn test_upgrade_uses_provider_organization() {
        let provider = provider_with(&[("CIRCLECI_TOKEN", "t"), ("CIRCLECI_ORGANIZATION", "acme")]);
        provider.configure(Value::Null).await.unwrap();

        let upgraded = provider
            .upgrade_resource_state(
                "circleci_environment_variable",
                0,
                json!({"id": "API_KEY", "project": "web", "name": "API_KEY"}),
            )
            .await
            .unwrap();
        assert_eq!(upgraded["id"], "acme.web.API_KEY");

        let state = json!({"id": "ctx", "name": "deploy"});
        let same = provider
            .upgrade_resource_state("circleci_context", 0, state.clone())
            .await
            .unwrap();
        assert_eq!(same, state);
    }

    #[tokio::test]
    async fn test_update_only_for_schedules() {
        let provider = provider_with(&[("CIRCLECI_TOKEN", "t")]);
        provider.configure(json!({})).await.unwrap();

        let err = provider
            .update("circleci_context", json!({"id": "a"}), json!({"id": "a"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unimplemented(_)));

        let err = provider
            .create("circleci_project", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_operations_require_configuration() {
        let provider = provider_with(&[]);
        let err = provider
            .read("circleci_context", json!({"id": "a"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));

        let err = provider
            .read_data_source("circleci_project", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }
}
