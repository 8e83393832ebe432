//! `circleci_context` data source: looks up a context by name.

use super::{configured_organization, ORGANIZATION};
use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;

/// Data source type name.
pub const TYPE_NAME: &str = "circleci_context";

/// Schema of the data source.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Looks up a CircleCI context by name")
        .with_attribute(
            "name",
            Attribute::required_string().with_description("The name of the context"),
        )
        .with_attribute(
            ORGANIZATION,
            Attribute::optional_string()
                .with_description("The organization where the context is defined"),
        )
        .with_attribute("id", Attribute::computed_string())
}

/// Resolve the context. An unknown name leaves the ID empty.
pub async fn read(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    let name = data.require_str("name")?.to_string();
    let organization = client.organization(configured_organization(data))?;

    let context = client
        .retry_policy()
        .run("look up context", || {
            client.find_context_by_name(&organization, &name)
        })
        .await?;

    match context {
        Some(context) => {
            data.set_id(context.id);
            data.set(ORGANIZATION, organization);
        },
        None => data.clear_id(),
    }
    Ok(())
}
