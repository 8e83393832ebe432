//! `circleci_schedule`: a scheduled pipeline trigger of a project.

use serde_json::Value;
use tracing::info;

use super::{configured_organization, ORGANIZATION};
use crate::client::{AttributionActor, Client, Schedule, ScheduleSpec, Timetable};
use crate::codec::ProjectSlug;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::state::ResourceData;
use crate::validation::{validate_days_of_week, validate_hours_of_day};

/// Resource type name.
pub const TYPE_NAME: &str = "circleci_schedule";

/// Schema of the resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Manages a scheduled pipeline of a CircleCI project")
        .with_attribute(
            ORGANIZATION,
            Attribute::optional_string()
                .with_computed()
                .with_force_new()
                .with_description("The organization where the schedule will be created"),
        )
        .with_attribute(
            "project",
            Attribute::required_string()
                .with_force_new()
                .with_description("The name of the CircleCI project to create the schedule in"),
        )
        .with_attribute(
            "name",
            Attribute::required_string().with_description("The name of the schedule"),
        )
        .with_attribute(
            "description",
            Attribute::optional_string().with_description("The description of the schedule"),
        )
        .with_attribute(
            "per_hour",
            Attribute::required(AttributeType::Int64)
                .with_description("How often per hour to trigger a pipeline"),
        )
        .with_attribute(
            "hours_of_day",
            Attribute::required(AttributeType::list(AttributeType::Int64))
                .with_description("Which hours of the day to trigger a pipeline"),
        )
        .with_attribute(
            "days_of_week",
            Attribute::required(AttributeType::list(AttributeType::String))
                .with_description("Days of the week (\"MON\" .. \"SUN\") to trigger on"),
        )
        .with_attribute(
            "use_scheduling_system",
            Attribute::required(AttributeType::Bool)
                .with_description("Use the scheduled system actor for attribution"),
        )
        .with_attribute(
            "parameters",
            Attribute::optional(AttributeType::map(AttributeType::String))
                .with_description("Pipeline parameters to pass to created pipelines"),
        )
        .with_attribute("id", Attribute::computed_string())
}

/// Desired schedule described by the resource's attributes.
pub fn schedule_spec(data: &ResourceData) -> Result<ScheduleSpec, ProviderError> {
    let days_of_week = validate_days_of_week(&data.get_string_list("days_of_week")?)?;
    let hours_of_day = data.get_u64_list("hours_of_day")?;
    validate_hours_of_day(&hours_of_day)?;

    Ok(ScheduleSpec {
        name: data.require_str("name")?.to_string(),
        description: data.get_str("description").to_string(),
        attribution_actor: AttributionActor::from_scheduling_system(
            data.get_bool("use_scheduling_system"),
        ),
        parameters: data.get_string_map("parameters")?,
        timetable: Timetable {
            per_hour: data.get_u64("per_hour")?,
            hours_of_day,
            days_of_week,
        },
    })
}

/// Create the schedule.
pub async fn create(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    let project = data.require_str("project")?.to_string();
    let slug = client.project_slug(configured_organization(data), &project)?;
    let spec = schedule_spec(data)?;

    let schedule = client
        .retry_policy()
        .run("create schedule", || client.create_schedule(&slug, &spec))
        .await?;

    info!(id = %schedule.id, project = %slug, name = %spec.name, "created schedule");
    data.set_id(schedule.id);
    read(client, data).await
}

/// Refresh every attribute from the API; clears the ID when the schedule
/// no longer exists.
pub async fn read(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    let id = data.id().to_string();
    let schedule = client
        .retry_policy()
        .run("read schedule", || client.get_schedule(&id))
        .await?;

    match schedule {
        Some(schedule) => apply(data, &schedule),
        None => {
            info!(id = %id, "schedule no longer exists");
            data.clear_id();
            Ok(())
        },
    }
}

/// Whether the schedule exists.
pub async fn exists(client: &Client, data: &ResourceData) -> Result<bool, ProviderError> {
    let id = data.id();
    let schedule = client
        .retry_policy()
        .run("read schedule", || client.get_schedule(id))
        .await?;
    Ok(schedule.is_some())
}

/// Push the configured attributes to the existing schedule.
pub async fn update(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    let id = data.id().to_string();
    let spec = schedule_spec(data)?;

    client
        .retry_policy()
        .run("update schedule", || client.update_schedule(&id, &spec))
        .await?;

    info!(id = %id, name = %spec.name, "updated schedule");
    read(client, data).await
}

/// Delete the schedule.
pub async fn delete(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    let id = data.id().to_string();
    client
        .retry_policy()
        .run("delete schedule", || client.delete_schedule(&id))
        .await?;

    info!(id = %id, "deleted schedule");
    data.clear_id();
    Ok(())
}

/// Import by schedule UUID.
pub async fn import(client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
    read(client, data).await?;
    if data.id().is_empty() {
        return Err(ProviderError::NotFound("schedule not found".to_string()));
    }
    Ok(())
}

fn apply(data: &mut ResourceData, schedule: &Schedule) -> Result<(), ProviderError> {
    let slug = ProjectSlug::parse(&schedule.project_slug)?;
    let days: Vec<Value> = schedule
        .timetable
        .days_of_week
        .iter()
        .map(|day| Value::from(day.as_str()))
        .collect();

    data.set(ORGANIZATION, slug.organization);
    data.set("project", slug.project);
    data.set("name", schedule.name.clone());
    data.set("description", schedule.description.clone());
    data.set("per_hour", schedule.timetable.per_hour);
    data.set("hours_of_day", schedule.timetable.hours_of_day.clone());
    data.set("days_of_week", days);
    data.set(
        "parameters",
        serde_json::to_value(schedule.string_parameters())?,
    );
    data.set(
        "use_scheduling_system",
        schedule.actor.is_scheduling_system(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{RetryPolicy, SCHEDULING_SYSTEM_ACTOR_ID};
    use crate::config::ProviderConfig;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SCHEDULE_ID: &str = "5c1d2e3f-4a5b-4c6d-8e7f-9a0b1c2d3e4f";

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

    fn config() -> ResourceData {
        ResourceData::from_value(json!({
            "project": "web",
            "name": "nightly",
            "description": "nightly build",
            "per_hour": 1,
            "hours_of_day": [2, 14],
            "days_of_week": ["MON", "FRI"],
            "use_scheduling_system": true,
            "parameters": {"branch": "main"}
        }))
        .unwrap()
    }

    fn body(name: &str, actor_id: &str) -> Value {
        json!({
            "id": SCHEDULE_ID,
            "project-slug": "github/acme/web",
            "name": name,
            "description": "nightly build",
            "timetable": {"per-hour": 1, "hours-of-day": [2, 14], "days-of-week": ["MON", "FRI"]},
            "actor": {"id": actor_id, "login": "someone", "name": "Someone"},
            "parameters": {"branch": "main"}
        })
    }

    #[test]
    fn test_schedule_spec_validation() {
        let spec = schedule_spec(&config()).unwrap();
        assert_eq!(spec.attribution_actor, AttributionActor::System);
        assert_eq!(spec.timetable.hours_of_day, vec![2, 14]);
        assert_eq!(spec.parameters["branch"], "main");

        let mut bad_day = config();
        bad_day.set("days_of_week", json!(["MON", "FUN"]));
        assert_eq!(
            schedule_spec(&bad_day).unwrap_err().message(),
            "Invalid day specified: FUN"
        );

        let mut bad_hour = config();
        bad_hour.set("hours_of_day", json!([24]));
        assert!(schedule_spec(&bad_hour).is_err());
    }

    #[tokio::test]
    async fn test_create_reads_back_attribution() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/project/github/acme/web/schedule"))
            .and(body_partial_json(json!({"attribution-actor": "system"})))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(body("nightly", SCHEDULING_SYSTEM_ACTOR_ID)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/schedule/{}", SCHEDULE_ID)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(body("nightly", SCHEDULING_SYSTEM_ACTOR_ID)),
            )
            .mount(&server)
            .await;

        let mut data = config();
        create(&client, &mut data).await.unwrap();

        assert_eq!(data.id(), SCHEDULE_ID);
        assert_eq!(data.get_str("organization"), "acme");
        assert!(data.get_bool("use_scheduling_system"));
        assert_eq!(data.get("days_of_week"), Some(&json!(["MON", "FRI"])));
    }

    #[tokio::test]
    async fn test_update_then_read() {
        let (server, client) = setup().await;
        Mock::given(method("PATCH"))
            .and(path(format!("/schedule/{}", SCHEDULE_ID)))
            .and(body_partial_json(json!({"name": "weekly", "attribution-actor": "current"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(body("weekly", "someone-else")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/schedule/{}", SCHEDULE_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body("weekly", "someone-else")))
            .mount(&server)
            .await;

        let mut data = config();
        data.set_id(SCHEDULE_ID);
        data.set("name", "weekly");
        data.set("use_scheduling_system", false);
        update(&client, &mut data).await.unwrap();

        assert_eq!(data.get_str("name"), "weekly");
        assert!(!data.get_bool("use_scheduling_system"));
    }

    #[tokio::test]
    async fn test_malformed_project_slug() {
        let (server, client) = setup().await;
        let mut broken = body("nightly", SCHEDULING_SYSTEM_ACTOR_ID);
        broken["project-slug"] = json!("github/acme");
        Mock::given(method("GET"))
            .and(path(format!("/schedule/{}", SCHEDULE_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(broken))
            .mount(&server)
            .await;

        let mut data = ResourceData::with_id(SCHEDULE_ID);
        let err = read(&client, &mut data).await.unwrap_err();
        assert!(err.message().contains("extracting vcs, org, project"));
    }

    #[tokio::test]
    async fn test_delete_and_import_missing() {
        let (server, client) = setup().await;
        Mock::given(method("DELETE"))
            .and(path(format!("/schedule/{}", SCHEDULE_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut data = ResourceData::with_id(SCHEDULE_ID);
        delete(&client, &mut data).await.unwrap();
        assert!(data.id().is_empty());
        assert!(!exists(&client, &ResourceData::with_id(SCHEDULE_ID)).await.unwrap());

        let err = import(&client, &mut ResourceData::with_id(SCHEDULE_ID))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
