//! `circleci_context`: a named context owned by an organization.

use tracing::info;

use super::{configured_organization, ORGANIZATION};
use crate::client::Client;
use crate::codec::ContextImportPath;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;

/// Resource type name.
pub const TYPE_NAME: &str = "circleci_context";

/// Schema of the resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Manages a CircleCI context")
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_force_new()
                .with_description("The name of the context"),
        )
        .with_attribute(
            ORGANIZATION,
            Attribute::optional_string()
                .with_force_new()
                .with_description("The organization where the context will be created"),
        )
        .with_attribute("id", Attribute::computed_string())
}

/// Create the context, failing if the organization already has one by
/// that name.
pub async fn create(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    let name = data.require_str("name")?.to_string();
    let organization = client.organization(configured_organization(data))?;
    let retry = client.retry_policy();

    let existing = retry
        .run("look up context", || {
            client.find_context_by_name(&organization, &name)
        })
        .await?;
    if existing.is_some() {
        return Err(ProviderError::AlreadyExists(format!(
            "context '{}' already exists in organization '{}'",
            name, organization
        )));
    }

    let context = retry
        .run("create context", || client.create_context(&organization, &name))
        .await?;

    info!(id = %context.id, name = %name, organization = %organization, "created context");
    data.set_id(context.id);
    read(client, data).await
}

/// Refresh the context; clears the ID when it no longer exists.
pub async fn read(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    let id = data.id().to_string();
    let context = client
        .retry_policy()
        .run("read context", || client.get_context(&id))
        .await?;

    match context {
        Some(context) => data.set("name", context.name),
        None => {
            info!(id = %id, "context no longer exists");
            data.clear_id();
        },
    }
    Ok(())
}

/// Whether the context exists.
pub async fn exists(client: &Client, data: &ResourceData) -> Result<bool, ProviderError> {
    let id = data.id();
    let context = client
        .retry_policy()
        .run("read context", || client.get_context(id))
        .await?;
    Ok(context.is_some())
}

/// Delete the context.
pub async fn delete(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    let id = data.id().to_string();
    client
        .retry_policy()
        .run("delete context", || client.delete_context(&id))
        .await?;

    info!(id = %id, "deleted context");
    data.clear_id();
    Ok(())
}

/// Import by `organization/context`, where `context` is a UUID or a name.
pub async fn import(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    let path = ContextImportPath::parse(data.id())?;
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

    data.set_id(context.id);
    data.set("name", context.name);
    data.set(ORGANIZATION, path.organization);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RetryPolicy;
    use crate::config::ProviderConfig;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CONTEXT_ID: &str = "0b6d3c9e-93b2-4c35-9d1e-51b5f2c7a0aa";

    async fn setup() -> (MockServer, Client) {
        let server = MockServer::start().await;
        let config = ProviderConfig::new("t")
            .unwrap()
            .with_url(&server.uri())
            .unwrap()
            .with_organization("acme");
        let client = Client::new(&config).unwrap().with_retry_policy(
            RetryPolicy::with_timeout(Duration::from_secs(2))
                .with_backoff(Duration::from_millis(1), Duration::from_millis(5)),
        );
        (server, client)
    }

    async fn mount_listing(server: &MockServer, items: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/context"))
            .and(query_param("owner-slug", "github/acme"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"items": items, "next_page_token": null})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let (server, client) = setup().await;
        mount_listing(&server, json!([])).await;
        Mock::given(method("POST"))
            .and(path("/context"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": CONTEXT_ID, "name": "deploy"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/context/{}", CONTEXT_ID)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": CONTEXT_ID, "name": "deploy"})),
            )
            .mount(&server)
            .await;

        let mut data = ResourceData::from_value(json!({"name": "deploy"})).unwrap();
        create(&client, &mut data).await.unwrap();
        assert_eq!(data.id(), CONTEXT_ID);
        assert_eq!(data.get_str("name"), "deploy");
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let (server, client) = setup().await;
        mount_listing(&server, json!([{"id": CONTEXT_ID, "name": "deploy"}])).await;

        let mut data = ResourceData::from_value(json!({"name": "deploy"})).unwrap();
        let err = create(&client, &mut data).await.unwrap_err();
        assert_eq!(
            err.message(),
            "context 'deploy' already exists in organization 'acme'"
        );
    }

    #[tokio::test]
    async fn test_read_and_delete() {
        let (server, client) = setup().await;
        Mock::given(method("DELETE"))
            .and(path(format!("/context/{}", CONTEXT_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut gone = ResourceData::with_id(CONTEXT_ID);
        read(&client, &mut gone).await.unwrap();
        assert!(gone.id().is_empty());

        let mut data = ResourceData::with_id(CONTEXT_ID);
        delete(&client, &mut data).await.unwrap();
        assert!(data.id().is_empty());
        assert!(!exists(&client, &ResourceData::with_id(CONTEXT_ID)).await.unwrap());
    }

    #[tokio::test]
    async fn test_import_by_name_and_id() {
        let (server, client) = setup().await;
        mount_listing(&server, json!([{"id": CONTEXT_ID, "name": "deploy"}])).await;
        Mock::given(method("GET"))
            .and(path(format!("/context/{}", CONTEXT_ID)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": CONTEXT_ID, "name": "deploy"})),
            )
            .mount(&server)
            .await;

        let mut by_name = ResourceData::with_id("acme/deploy");
        import(&client, &mut by_name).await.unwrap();
        assert_eq!(by_name.id(), CONTEXT_ID);
        assert_eq!(by_name.get_str("organization"), "acme");

        let mut by_id = ResourceData::with_id(format!("acme/{}", CONTEXT_ID));
        import(&client, &mut by_id).await.unwrap();
        assert_eq!(by_id, by_name);
    }

    #[tokio::test]
    async fn test_import_errors() {
        let (server, client) = setup().await;
        mount_listing(&server, json!([])).await;

        let err = import(&client, &mut ResourceData::with_id("deploy"))
            .await
            .unwrap_err();
        assert!(err.message().contains("$organization/$context"));

        let err = import(&client, &mut ResourceData::with_id("acme/deploy"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
