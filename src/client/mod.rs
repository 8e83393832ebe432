//! CircleCI v2 REST client.
//!
//! [`Client`] is built once from the provider configuration and is immutable
//! afterwards. It knows the VCS type and the default organization, so
//! resources only pass the values they configure themselves. Each method
//! performs a single request; callers wrap them in [`Client::retry_policy`].

pub mod context;
pub mod project;
pub mod retry;
pub mod schedule;
pub mod transport;

use serde::Deserialize;

use crate::codec::ProjectSlug;
use crate::config::ProviderConfig;
use crate::error::ProviderError;

pub use context::{Context, ContextEnvironmentVariable};
pub use project::ProjectEnvironmentVariable;
pub use retry::RetryPolicy;
pub use schedule::{
    Actor, AttributionActor, DayOfWeek, Schedule, ScheduleSpec, Timetable,
    SCHEDULING_SYSTEM_ACTOR_ID,
};
pub use transport::{ApiRequest, Transport};

/// Query parameter selecting the next page of a listing.
pub const PAGE_TOKEN_PARAM: &str = "page-token";

/// One page of a paginated listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct Page<T> {
    /// Items on this page.
    #[serde(default)]
    pub items: Vec<T>,
    /// Token of the next page; absent on the last page.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Client for the CircleCI API.
#[derive(Debug, Clone)]
pub struct Client {
    transport: Transport,
    vcs: String,
    organization: Option<String>,
    retry: RetryPolicy,
}

impl Client {
    /// Build a client from the provider configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            transport: Transport::new(config)?,
            vcs: config.vcs_type.clone(),
            organization: config.organization.clone(),
            retry: RetryPolicy::with_timeout(config.retry_timeout),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The retry policy resources run their calls under.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The configured VCS type.
    pub fn vcs(&self) -> &str {
        &self.vcs
    }

    /// The provider-level default organization, if any.
    pub fn default_organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    /// Organization for a request.
    ///
    /// A non-empty `organization` wins, then the provider default.
    pub fn organization(&self, organization: Option<&str>) -> Result<String, ProviderError> {
        organization
            .filter(|o| !o.is_empty())
            .or(self.default_organization())
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Configuration("organization is required".to_string()))
    }

    /// Slug of a project in the configured VCS.
    pub fn project_slug(
        &self,
        organization: Option<&str>,
        project: &str,
    ) -> Result<ProjectSlug, ProviderError> {
        Ok(ProjectSlug::new(
            self.vcs.clone(),
            self.organization(organization)?,
            project,
        ))
    }

    /// Owner slug of an organization: `vcs/organization`.
    pub fn owner_slug(&self, organization: &str) -> String {
        format!("{}/{}", self.vcs, organization)
    }
}

/// Path segments addressing a project.
pub(crate) fn project_segments(slug: &ProjectSlug) -> Vec<String> {
    vec![
        "project".to_string(),
        slug.vcs.clone(),
        slug.organization.clone(),
        slug.project.clone(),
    ]
}
