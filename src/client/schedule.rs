//! Scheduled pipelines.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{project_segments, ApiRequest, Client};
use crate::codec::ProjectSlug;
use crate::error::ProviderError;

/// Actor CircleCI reports for schedules attributed to the scheduling system.
pub const SCHEDULING_SYSTEM_ACTOR_ID: &str = "d9b3fcaa-6032-405a-8c75-40079ce33c3e";

/// A day on which a schedule triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayOfWeek {
    /// Monday.
    Mon,
    /// Tuesday.
    Tue,
    /// Wednesday.
    Wed,
    /// Thursday.
    Thu,
    /// Friday.
    Fri,
    /// Saturday.
    Sat,
    /// Sunday.
    Sun,
}

impl DayOfWeek {
    /// Every day, Monday first.
    pub const ALL: [DayOfWeek; 7] = [
        Self::Mon,
        Self::Tue,
        Self::Wed,
        Self::Thu,
        Self::Fri,
        Self::Sat,
        Self::Sun,
    ];

    /// Three-letter upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mon => "MON",
            Self::Tue => "TUE",
            Self::Wed => "WED",
            Self::Thu => "THU",
            Self::Fri => "FRI",
            Self::Sat => "SAT",
            Self::Sun => "SUN",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|day| day.as_str() == s)
            .ok_or_else(|| ProviderError::Validation(format!("Invalid day specified: {}", s)))
    }
}

/// When a schedule triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Timetable {
    /// Triggers per hour.
    pub per_hour: u64,
    /// Hours of the day, 0 to 23.
    pub hours_of_day: Vec<u64>,
    /// Days of the week.
    pub days_of_week: Vec<DayOfWeek>,
}

/// Who pipelines triggered by a schedule are attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributionActor {
    /// The scheduling system actor.
    System,
    /// The user owning the API token.
    Current,
}

impl AttributionActor {
    /// Actor for the `use_scheduling_system` flag.
    pub fn from_scheduling_system(use_scheduling_system: bool) -> Self {
        if use_scheduling_system {
            Self::System
        } else {
            Self::Current
        }
    }
}

/// Actor reported on a schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor UUID.
    #[serde(default)]
    pub id: String,
    /// Login name.
    #[serde(default)]
    pub login: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

impl Actor {
    /// Whether this is the scheduling system actor.
    pub fn is_scheduling_system(&self) -> bool {
        self.id == SCHEDULING_SYSTEM_ACTOR_ID
    }
}

/// A schedule as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Schedule {
    /// Schedule UUID.
    pub id: String,
    /// `vcs/organization/project`.
    pub project_slug: String,
    /// Schedule name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Trigger times.
    pub timetable: Timetable,
    /// Attribution of triggered pipelines.
    #[serde(default)]
    pub actor: Actor,
    /// Pipeline parameters.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl Schedule {
    /// Parameters rendered as strings.
    pub fn string_parameters(&self) -> BTreeMap<String, String> {
        self.parameters
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }
}

/// Desired state of a schedule, sent on create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScheduleSpec {
    /// Schedule name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Attribution of triggered pipelines.
    pub attribution_actor: AttributionActor,
    /// Pipeline parameters.
    pub parameters: BTreeMap<String, String>,
    /// Trigger times.
    pub timetable: Timetable,
}

impl Client {
    /// Fetch a schedule by UUID; `None` on 404.
    pub async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, ProviderError> {
        match self
            .transport()
            .call(&ApiRequest::get(["schedule", id]))
            .await
        {
            Ok(schedule) => Ok(Some(schedule)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Create a schedule for a project.
    pub async fn create_schedule(
        &self,
        slug: &ProjectSlug,
        spec: &ScheduleSpec,
    ) -> Result<Schedule, ProviderError> {
        let mut segments = project_segments(slug);
        segments.push("schedule".to_string());
        let request = ApiRequest::post(segments).with_body(serde_json::to_value(spec)?);
        self.transport().call(&request).await
    }

    /// Replace every mutable field of a schedule.
    pub async fn update_schedule(
        &self,
        id: &str,
        spec: &ScheduleSpec,
    ) -> Result<Schedule, ProviderError> {
        let request = ApiRequest::patch(["schedule", id]).with_body(serde_json::to_value(spec)?);
        self.transport().call(&request).await
    }

    /// Delete a schedule.
    pub async fn delete_schedule(&self, id: &str) -> Result<(), ProviderError> {
        self.transport()
            .call_empty(&ApiRequest::delete(["schedule", id]))
            .await
    }
}
