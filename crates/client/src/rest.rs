//! JSON-over-HTTP implementation of the service contracts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use keyareas_core::normalize::Record;
use keyareas_core::services::strip_assignee;
use keyareas_core::{
    Activity, ActivityFilter, ActivityService, AppConfig, Goal, GoalService, ServiceError, Task,
    TaskFilter, TaskService, User, UsersService,
};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde_json::Value;

const ENVELOPE_KEYS: [&str; 3] = ["data", "items", "results"];
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl RestBackend {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("keyareas/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        let base_url = Url::parse(config.api_url())
            .with_context(|| format!("invalid API URL '{}'", config.api_url()))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("API URL '{}' cannot carry a path", config.api_url());
        }
        Ok(Self {
            client,
            base_url,
            token: config.token().map(str::to_string),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Appends `segments` to the base path, percent-encoding each one.
    pub(crate) fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.client.request(method, self.url(segments));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends the request and returns the decoded body, `Value::Null` when empty.
    async fn send(&self, endpoint: &str, builder: RequestBuilder) -> Result<Value, ServiceError> {
        tracing::debug!(endpoint, "sending request");
        let response = builder.send().await.map_err(|err| ServiceError::Transport {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|err| ServiceError::Transport {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        })?;

        if !status.is_success() {
            tracing::warn!(endpoint, status = status.as_u16(), "request rejected");
            return Err(ServiceError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: truncate(&body),
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|err| ServiceError::Decode {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        })
    }

    async fn fetch_records(
        &self,
        endpoint: &str,
        builder: RequestBuilder,
    ) -> Result<Vec<Record>, ServiceError> {
        let body = self.send(endpoint, builder).await?;
        records_from(body).ok_or_else(|| ServiceError::Decode {
            endpoint: endpoint.to_string(),
            message: "expected a list of records".into(),
        })
    }

    async fn fetch_record(&self, endpoint: &str, builder: RequestBuilder) -> Result<Record, ServiceError> {
        let body = self.send(endpoint, builder).await?;
        Ok(record_from(body))
    }
}

/// Query string for a task listing.
pub(crate) fn task_query(filter: &TaskFilter) -> Vec<(&'static str, String)> {
    match filter {
        TaskFilter::All => Vec::new(),
        TaskFilter::DontForget => vec![("withoutKeyArea", "true".to_string())],
        TaskFilter::KeyArea(id) => vec![("keyAreaId", id.clone())],
        TaskFilter::Goal(id) => vec![("goalId", id.clone())],
    }
}

pub(crate) fn activity_query(filter: &ActivityFilter) -> Vec<(&'static str, String)> {
    match filter {
        ActivityFilter::All => Vec::new(),
        ActivityFilter::Task(id) => vec![("taskId", id.clone())],
    }
}

/// Unwraps a list response: a bare array or one wrapped in a
/// `data`/`items`/`results` envelope. `None` when neither shape fits.
pub(crate) fn records_from(body: Value) -> Option<Vec<Record>> {
    match body {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(record) => Some(record),
                    _ => None,
                })
                .collect(),
        ),
        Value::Null => Some(Vec::new()),
        Value::Object(mut map) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| map.remove(*key))
            .and_then(records_from),
        _ => None,
    }
}

/// Unwraps a single-record response. Anything unrecognizable becomes an
/// empty record, which callers read as "no confirmed copy".
pub(crate) fn record_from(body: Value) -> Record {
    match body {
        Value::Object(mut map) => {
            for key in ENVELOPE_KEYS {
                if matches!(map.get(key), Some(Value::Object(_))) {
                    if let Some(Value::Object(inner)) = map.remove(key) {
                        return inner;
                    }
                }
            }
            map
        }
        _ => Record::new(),
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((index, _)) => format!("{}...", &trimmed[..index]),
        None => trimmed.to_string(),
    }
}

#[async_trait]
impl TaskService for RestBackend {
    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, ServiceError> {
        let builder = self.request(Method::GET, &["tasks"]).query(&task_query(filter));
        let records = self.fetch_records("tasks.list", builder).await?;
        Ok(records.iter().map(Task::from_record).collect())
    }

    async fn create(&self, fields: Record) -> Result<Task, ServiceError> {
        let builder = self.request(Method::POST, &["tasks"]).json(&fields);
        Ok(Task::from_record(&self.fetch_record("tasks.create", builder).await?))
    }

    async fn update(&self, id: &str, fields: Record) -> Result<Task, ServiceError> {
        let builder = self.request(Method::PUT, &["tasks", id]).json(&fields);
        Ok(Task::from_record(&self.fetch_record("tasks.update", builder).await?))
    }

    async fn remove(&self, id: &str) -> Result<(), ServiceError> {
        let builder = self.request(Method::DELETE, &["tasks", id]);
        self.send("tasks.remove", builder).await.map(|_| ())
    }
}

#[async_trait]
impl ActivityService for RestBackend {
    async fn list(&self, filter: &ActivityFilter) -> Result<Vec<Activity>, ServiceError> {
        let builder = self
            .request(Method::GET, &["activities"])
            .query(&activity_query(filter));
        let records = self.fetch_records("activities.list", builder).await?;
        Ok(records.iter().map(Activity::from_record).collect())
    }

    async fn create(&self, fields: Record) -> Result<Activity, ServiceError> {
        let builder = self.request(Method::POST, &["activities"]).json(&fields);
        Ok(Activity::from_record(
            &self.fetch_record("activities.create", builder).await?,
        ))
    }

    async fn update(&self, id: &str, mut fields: Record) -> Result<Activity, ServiceError> {
        strip_assignee(&mut fields);
        let builder = self
            .request(Method::PUT, &["activities", id])
            .json(&fields);
        Ok(Activity::from_record(
            &self.fetch_record("activities.update", builder).await?,
        ))
    }

    async fn remove(&self, id: &str) -> Result<(), ServiceError> {
        let builder = self.request(Method::DELETE, &["activities", id]);
        self.send("activities.remove", builder).await.map(|_| ())
    }
}

#[async_trait]
impl UsersService for RestBackend {
    async fn list(&self) -> Result<Vec<User>, ServiceError> {
        let builder = self.request(Method::GET, &["users"]);
        let records = self.fetch_records("users.list", builder).await?;
        Ok(records.iter().map(User::from_record).collect())
    }
}

#[async_trait]
impl GoalService for RestBackend {
    async fn get_goals(&self) -> Result<Vec<Goal>, ServiceError> {
        let builder = self.request(Method::GET, &["goals"]);
        let records = self.fetch_records("goals.list", builder).await?;
        Ok(records.iter().map(Goal::from_record).collect())
    }

    async fn get_goal_by_id(&self, id: &str) -> Result<Option<Goal>, ServiceError> {
        let builder = self.request(Method::GET, &["goals", id]);
        match self.fetch_record("goals.get", builder).await {
            Ok(record) if record.is_empty() => Ok(None),
            Ok(record) => Ok(Some(Goal::from_record(&record))),
            Err(ServiceError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
