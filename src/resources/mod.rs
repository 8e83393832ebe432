//! Resource and data source implementations.
//!
//! Every resource module exposes its type name, its schema and async
//! lifecycle functions taking the configured [`Client`](crate::client::Client)
//! and the resource's [`ResourceData`](crate::state::ResourceData). Each API
//! call runs under the client's retry policy.

pub mod context;
pub mod context_data_source;
pub mod context_environment_variable;
pub mod environment_variable;
pub mod schedule;

use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;
use crate::schema::Schema;
use crate::state::ResourceData;

/// Name of the optional organization attribute shared by every resource.
pub const ORGANIZATION: &str = "organization";

/// The organization a resource configures, if any.
pub(crate) fn configured_organization(data: &ResourceData) -> Option<&str> {
    data.get_string_opt(ORGANIZATION)
}

/// A managed resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `circleci_environment_variable`.
    EnvironmentVariable,
    /// `circleci_context`.
    Context,
    /// `circleci_context_environment_variable`.
    ContextEnvironmentVariable,
    /// `circleci_schedule`.
    Schedule,
}

impl ResourceKind {
    /// Every managed resource type.
    pub const ALL: [ResourceKind; 4] = [
        Self::EnvironmentVariable,
        Self::Context,
        Self::ContextEnvironmentVariable,
        Self::Schedule,
    ];

    /// Name the host addresses the type by.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::EnvironmentVariable => environment_variable::TYPE_NAME,
            Self::Context => context::TYPE_NAME,
            Self::ContextEnvironmentVariable => context_environment_variable::TYPE_NAME,
            Self::Schedule => schedule::TYPE_NAME,
        }
    }

    /// Current schema of the type.
    pub fn schema(&self) -> Schema {
        match self {
            Self::EnvironmentVariable => environment_variable::schema(),
            Self::Context => context::schema(),
            Self::ContextEnvironmentVariable => context_environment_variable::schema(),
            Self::Schedule => schedule::schema(),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for ResourceKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.type_name() == s)
            .ok_or_else(|| ProviderError::UnknownResource(format!("Unknown resource type: {}", s)))
    }
}
