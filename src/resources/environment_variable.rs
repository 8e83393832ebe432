//! `circleci_environment_variable`: a project environment variable.
//!
//! CircleCI has no identifier for project variables, so the state ID is the
//! composite `organization.project.name`. The value is write-only: state keeps
//! its digest, and every attribute forces replacement.

use tracing::info;

use super::{configured_organization, ORGANIZATION};
use crate::client::Client;
use crate::codec::{EnvironmentVariableId, ProjectSlug};
use crate::error::ProviderError;
use crate::masking::{censor, hash_value};
use crate::migration::{MigrationTable, UpgradeContext};
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;
use crate::validation::check_environment_variable_name;

/// Resource type name.
pub const TYPE_NAME: &str = "circleci_environment_variable";

/// Current schema version.
pub const SCHEMA_VERSION: u64 = 1;

fn attributes(schema: Schema) -> Schema {
    schema
        .with_attribute(
            ORGANIZATION,
            Attribute::optional_string()
                .with_force_new()
                .with_description("The CircleCI organization."),
        )
        .with_attribute(
            "project",
            Attribute::required_string()
                .with_force_new()
                .with_description("The name of the CircleCI project to create the variable in"),
        )
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_force_new()
                .with_description("The name of the environment variable"),
        )
        .with_attribute(
            "value",
            Attribute::required_string()
                .masked()
                .with_force_new()
                .with_description("The value of the environment variable"),
        )
        .with_attribute("id", Attribute::computed_string())
}

/// Schema of the resource.
pub fn schema() -> Schema {
    attributes(Schema::new(SCHEMA_VERSION))
        .with_description("Manages an environment variable of a CircleCI project")
}

/// Schema of version 0 states, which carried no composite ID.
pub fn schema_v0() -> Schema {
    attributes(Schema::v0())
}

/// Migrations of persisted states up to [`SCHEMA_VERSION`].
pub fn migrations() -> MigrationTable {
    MigrationTable::new(SCHEMA_VERSION).with_step(0, upgrade_v0)
}

/// Version 0 states were keyed by name alone; compute the composite ID.
fn upgrade_v0(
    mut data: ResourceData,
    context: &UpgradeContext,
) -> Result<ResourceData, ProviderError> {
    let project = data.require_str("project")?.to_string();
    let name = data.require_str("name")?.to_string();
    let organization = configured_organization(&data)
        .map(str::to_string)
        .or_else(|| context.default_organization.clone())
        .filter(|o| !o.is_empty())
        .ok_or_else(|| {
            ProviderError::Configuration(format!(
                "organization has not been set for environment variable {} in project {}",
                name, project
            ))
        })?;

    data.set_id(EnvironmentVariableId::new(organization, project, name).encode());
    Ok(data)
}

/// Fill organization, project and name from the ID when the state only has
/// an ID, as after an import.
fn hydrate_from_id(data: &mut ResourceData) -> Result<(), ProviderError> {
    if data.get_ok("name").is_some() {
        return Ok(());
    }
    let id = EnvironmentVariableId::decode(data.id())?;
    data.set(ORGANIZATION, id.organization);
    data.set("project", id.project);
    data.set("name", id.name);
    Ok(())
}

fn target(client: &Client, data: &ResourceData) -> Result<(ProjectSlug, String), ProviderError> {
    let project = data.require_str("project")?;
    let name = data.require_str("name")?;
    let slug = client
        .project_slug(configured_organization(data), project)
        .map_err(|_| {
            ProviderError::Configuration(format!(
                "organization has not been set for environment variable {} in project {}",
                name, project
            ))
        })?;
    Ok((slug, name.to_string()))
}

/// Create the variable, failing if it already exists.
pub async fn create(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    let (slug, name) = target(client, data)?;
    check_environment_variable_name(&name)?;
    let value = data.get_str("value").to_string();
    let retry = client.retry_policy();

    let exists = retry
        .run("check environment variable", || {
            client.has_project_environment_variable(&slug, &name)
        })
        .await?;
    if exists {
        return Err(ProviderError::AlreadyExists(format!(
            "environment variable '{}' already exists for project '{}'",
            name, slug.project
        )));
    }

    retry
        .run("create environment variable", || {
            client.create_project_environment_variable(&slug, &name, &value)
        })
        .await?;

    let id = EnvironmentVariableId::new(&slug.organization, &slug.project, &name);
    info!(id = %id, value = %censor(&value), "created environment variable");
    data.set_id(id.encode());
    data.set("value", hash_value(&value));

    read(client, data).await
}

/// Refresh the variable; clears the ID when it no longer exists.
pub async fn read(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    hydrate_from_id(data)?;
    let (slug, name) = target(client, data)?;

    let variable = client
        .retry_policy()
        .run("read environment variable", || {
            client.get_project_environment_variable(&slug, &name)
        })
        .await?;

    match variable {
        Some(variable) => data.set("name", variable.name),
        None => {
            info!(id = %data.id(), "environment variable no longer exists");
            data.clear_id();
        },
    }
    Ok(())
}

/// Whether the variable exists.
pub async fn exists(client: &Client, data: &mut ResourceData) -> Result<bool, ProviderError> {
    hydrate_from_id(data)?;
    let (slug, name) = target(client, data)?;

    client
        .retry_policy()
        .run("check environment variable", || {
            client.has_project_environment_variable(&slug, &name)
        })
        .await
}

/// Delete the variable.
pub async fn delete(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    hydrate_from_id(data)?;
    let (slug, name) = target(client, data)?;

    client
        .retry_policy()
        .run("delete environment variable", || {
            client.delete_project_environment_variable(&slug, &name)
        })
        .await?;

    info!(id = %data.id(), "deleted environment variable");
    data.clear_id();
    Ok(())
}

/// Import by composite ID `organization.project.name`.
///
/// The value cannot be recovered, so it stays unset.
pub async fn import(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    EnvironmentVariableId::decode(data.id())?;
    let id = data.id().to_string();

    read(client, data).await?;
    if data.id().is_empty() {
        return Err(ProviderError::NotFound(format!(
            "environment variable '{}' does not exist",
            id
        )));
    }
    Ok(())
}
