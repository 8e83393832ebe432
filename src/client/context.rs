//! Contexts and their environment variables.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::{ApiRequest, Client, Page, PAGE_TOKEN_PARAM};
use crate::error::ProviderError;

/// A context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Context UUID.
    pub id: String,
    /// Context name, unique within its owner.
    pub name: String,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A variable stored in a context. Values are never returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEnvironmentVariable {
    /// Variable name.
    pub variable: String,
    /// Owning context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Client {
    /// Fetch a context by UUID; `None` on 404.
    pub async fn get_context(&self, id: &str) -> Result<Option<Context>, ProviderError> {
        match self
            .transport()
            .call(&ApiRequest::get(["context", id]))
            .await
        {
            Ok(context) => Ok(Some(context)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Find a context of `organization` by name.
    pub async fn find_context_by_name(
        &self,
        organization: &str,
        name: &str,
    ) -> Result<Option<Context>, ProviderError> {
        let request = ApiRequest::get(["context"])
            .with_query("owner-slug", self.owner_slug(organization))
            .with_query("owner-type", "organization");
        let contexts: Vec<Context> = self.list_all(request).await?;
        Ok(contexts.into_iter().find(|c| c.name == name))
    }

    /// Resolve a context given either its UUID or its name.
    pub async fn get_context_by_id_or_name(
        &self,
        organization: &str,
        id_or_name: &str,
    ) -> Result<Option<Context>, ProviderError> {
        if Uuid::parse_str(id_or_name).is_ok() {
            self.get_context(id_or_name).await
        } else {
            self.find_context_by_name(organization, id_or_name).await
        }
    }

    /// Create a context owned by `organization`.
    pub async fn create_context(
        &self,
        organization: &str,
        name: &str,
    ) -> Result<Context, ProviderError> {
        let request = ApiRequest::post(["context"]).with_body(json!({
            "name": name,
            "owner": {
                "slug": self.owner_slug(organization),
                "type": "organization",
            },
        }));
        self.transport().call(&request).await
    }

    /// Delete a context and everything in it.
    pub async fn delete_context(&self, id: &str) -> Result<(), ProviderError> {
        self.transport()
            .call_empty(&ApiRequest::delete(["context", id]))
            .await
    }

    /// All variables of a context.
    pub async fn list_context_environment_variables(
        &self,
        context_id: &str,
    ) -> Result<Vec<ContextEnvironmentVariable>, ProviderError> {
        self.list_all(ApiRequest::get(["context", context_id, "environment-variable"]))
            .await
    }

    /// Whether `variable` is defined in the context.
    ///
    /// A missing context counts as a missing variable.
    pub async fn has_context_environment_variable(
        &self,
        context_id: &str,
        variable: &str,
    ) -> Result<bool, ProviderError> {
        match self.list_context_environment_variables(context_id).await {
            Ok(variables) => Ok(variables.iter().any(|v| v.variable == variable)),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Create or overwrite a context variable.
    pub async fn put_context_environment_variable(
        &self,
        context_id: &str,
        variable: &str,
        value: &str,
    ) -> Result<(), ProviderError> {
        let request = ApiRequest::put(["context", context_id, "environment-variable", variable])
            .with_body(json!({"value": value}));
        self.transport().call_empty(&request).await
    }

    /// Delete a context variable.
    pub async fn delete_context_environment_variable(
        &self,
        context_id: &str,
        variable: &str,
    ) -> Result<(), ProviderError> {
        let request =
            ApiRequest::delete(["context", context_id, "environment-variable", variable]);
        self.transport().call_empty(&request).await
    }

    /// Follow `next_page_token` until the listing is exhausted.
    async fn list_all<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Vec<T>, ProviderError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut page_request = request.clone();
            if let Some(token) = &page_token {
                page_request = page_request.with_query(PAGE_TOKEN_PARAM, token.clone());
            }

            let page: Page<T> = self.transport().call(&page_request).await?;
            debug!(path = %request.path(), items = page.items.len(), "fetched page");
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() && page_token.as_ref() != Some(&token) => {
                    page_token = Some(token);
                },
                _ => return Ok(items),
            }
        }
    }
}
