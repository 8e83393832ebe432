//! `circleci_context_environment_variable`: a variable stored in a context.
//!
//! The state ID is the variable name; the variable is addressed by
//! `(context_id, variable)`. Values are stored as digests.

use tracing::info;

use super::ORGANIZATION;
use crate::client::Client;
use crate::codec::ContextVariableImportPath;
use crate::config::{EnvLookup, ENV_VALUE_ENV};
use crate::error::ProviderError;
use crate::masking::{censor, hash_value};
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;
use crate::validation::check_environment_variable_name;

/// Resource type name.
pub const TYPE_NAME: &str = "circleci_context_environment_variable";

/// Schema of the resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Manages an environment variable of a CircleCI context")
        .with_attribute(
            "variable",
            Attribute::required_string()
                .with_force_new()
                .with_description("The name of the environment variable"),
        )
        .with_attribute(
            "value",
            Attribute::required_string()
                .masked()
                .with_force_new()
                .with_description("The value that will be set for the environment variable."),
        )
        .with_attribute(
            "context_id",
            Attribute::required_string()
                .with_force_new()
                .with_description("ID of the context holding the environment variable"),
        )
        .with_attribute(
            ORGANIZATION,
            Attribute::optional_string()
                .with_force_new()
                .with_description("The organization where the context is defined"),
        )
        .with_attribute("id", Attribute::computed_string())
}

fn key(data: &ResourceData) -> Result<(String, String), ProviderError> {
    let context_id = data.require_str("context_id")?.to_string();
    let variable = match data.get_string_opt("variable") {
        Some(variable) => variable.to_string(),
        None if !data.id().is_empty() => data.id().to_string(),
        None => data.require_str("variable")?.to_string(),
    };
    Ok((context_id, variable))
}

/// Create the variable, failing if the context already defines it.
pub async fn create(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    let (context_id, variable) = key(data)?;
    check_environment_variable_name(&variable)?;
    let value = data.get_str("value").to_string();
    let retry = client.retry_policy();

    let exists = retry
        .run("check context environment variable", || {
            client.has_context_environment_variable(&context_id, &variable)
        })
        .await?;
    if exists {
        return Err(ProviderError::AlreadyExists(format!(
            "environment variable '{}' already exists in context '{}'",
            variable, context_id
        )));
    }

    retry
        .run("store context environment variable", || {
            client.put_context_environment_variable(&context_id, &variable, &value)
        })
        .await?;

    info!(
        context_id = %context_id,
        variable = %variable,
        value = %censor(&value),
        "stored context environment variable"
    );
    data.set_id(variable.clone());
    data.set("value", hash_value(&value));

    read(client, data).await
}

/// Refresh the variable; clears the ID when it or its context is gone.
pub async fn read(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    if exists(client, data).await? {
        return Ok(());
    }
    info!(id = %data.id(), "context environment variable no longer exists");
    data.clear_id();
    Ok(())
}

/// Whether the variable exists. A missing context counts as missing.
pub async fn exists(client: &Client, data: &ResourceData) -> Result<bool, ProviderError> {
    let (context_id, variable) = key(data)?;
    client
        .retry_policy()
        .run("check context environment variable", || {
            client.has_context_environment_variable(&context_id, &variable)
        })
        .await
}

/// Delete the variable.
pub async fn delete(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    let (context_id, variable) = key(data)?;
    client
        .retry_policy()
        .run("delete context environment variable", || {
            client.delete_context_environment_variable(&context_id, &variable)
        })
        .await?;

    info!(context_id = %context_id, variable = %variable, "deleted context environment variable");
    data.clear_id();
    Ok(())
}

/// Import by `organization/context/variable`.
///
/// The API never returns values, so the value to record is read from
/// `CIRCLECI_ENV_VALUE`.
pub async fn import(
    client: &Client,
    data: &mut ResourceData,
    env: &EnvLookup,
) -> Result<(), ProviderError> {
    let value = env(ENV_VALUE_ENV).filter(|v| !v.is_empty()).ok_or_else(|| {
        ProviderError::Configuration(format!(
            "{} is required to import a context environment variable",
            ENV_VALUE_ENV
        ))
    })?;
    let path = ContextVariableImportPath::parse(data.id())?;

    let context = client
        .retry_policy()
        .run("look up context", || {
            client.get_context_by_id_or_name(&path.organization, &path.context)
        })
        .await?
        .ok_or_else(|| {
            ProviderError::NotFound(format!(
                "context '{}' not found in organization '{}'",
                path.context, path.organization
            ))
        })?;

    data.set_id(path.variable.clone());
    data.set("variable", path.variable.clone());
    data.set("context_id", context.id);
    data.set(ORGANIZATION, path.organization.clone());
    data.set("value", hash_value(&value));

    read(client, data).await?;
    if data.id().is_empty() {
        return Err(ProviderError::NotFound(format!(
            "environment variable '{}' not found in context '{}'",
            path.variable, path.context
        )));
    }
    Ok(())
}
