//! Platform management API client.
//!
//! Every method issues exactly one request. Operations that mutate the
//! platform report a plain `bool`; the caller decides whether a `false`
//! is fatal. Reads return `Result` so that "nothing there" stays distinct
//! from "could not ask".

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::PlatformError;
use crate::transport::{PlatformRequest, PlatformResponse, Transport};

/// Application document returned by `GET /apps/{app}`.
#[derive(Debug, Deserialize)]
struct AppInfo {
    #[serde(default)]
    cname: Option<Vec<String>>,
}

/// Entry in the `GET /apps/{app}/env` response.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvEntry {
    pub name: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub value: Option<String>,
}

/// Shape of an env lookup before it is collapsed to a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvLookup {
    /// A matching entry carried a value.
    Value(String),
    /// The response was an empty list, or no entry matched with a value.
    Empty,
    /// The response body was JSON `null`.
    Null,
}

impl EnvLookup {
    /// Decode an env response body for `key`.
    pub fn parse(body: &str, key: &str, path: &str) -> Result<Self, PlatformError> {
        let entries: Option<Vec<EnvEntry>> =
            serde_json::from_str(body).map_err(|e| PlatformError::decode(path, e))?;

        let Some(entries) = entries else {
            return Ok(EnvLookup::Null);
        };

        Ok(entries
            .into_iter()
            .filter(|entry| entry.name == key)
            .find_map(|entry| entry.value)
            .map_or(EnvLookup::Empty, EnvLookup::Value))
    }

    pub fn into_value(self) -> Option<String> {
        match self {
            EnvLookup::Value(value) => Some(value),
            EnvLookup::Empty | EnvLookup::Null => None,
        }
    }
}

/// Client for the platform's per-application management endpoints.
#[derive(Debug, Clone)]
pub struct PlatformClient<T> {
    transport: T,
}

impl<T: Transport> PlatformClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Cnames bound to `app`, or `None` when it has none.
    pub async fn get_cname(&self, app: &str) -> Result<Option<Vec<String>>, PlatformError> {
        let path = app_path(app);
        let response = self
            .transport
            .send(PlatformRequest::new(Method::GET, &path))
            .await?;
        let response = require_success(response)?;

        let info: AppInfo = response.json(&path)?;
        Ok(info.cname.filter(|cnames| !cnames.is_empty()))
    }

    /// Bind `cnames` to `app`.
    pub async fn set_cname(&self, app: &str, cnames: &[String]) -> bool {
        let request =
            PlatformRequest::new(Method::POST, format!("{}/cname", app_path(app))).json(json!(cnames));
        self.execute(app, "set cname", request).await
    }

    /// Unbind `cnames` from `app`.
    pub async fn remove_cname(&self, app: &str, cnames: &[String]) -> bool {
        let request = PlatformRequest::new(Method::DELETE, format!("{}/cname", app_path(app)))
            .json(json!(cnames));
        self.execute(app, "remove cname", request).await
    }

    /// Set one environment variable on `app`.
    pub async fn env_set(&self, app: &str, key: &str, value: &str) -> bool {
        let mut body = serde_json::Map::new();
        body.insert(key.to_string(), json!(value));
        let request = PlatformRequest::new(Method::POST, format!("{}/env", app_path(app)))
            .json(serde_json::Value::Object(body));
        self.execute(app, "set env", request).await
    }

    /// Value of environment variable `key` on `app`, if set.
    ///
    /// The response status is not consulted; the body alone decides.
    pub async fn env_get(&self, app: &str, key: &str) -> Result<Option<String>, PlatformError> {
        let path = format!("{}/env", app_path(app));
        let response = self
            .transport
            .send(PlatformRequest::new(Method::GET, &path).json(json!([key])))
            .await?;

        let lookup = EnvLookup::parse(&response.body, key, &path)?;
        debug!(app = %app, key = %key, lookup = ?lookup, "env lookup");
        Ok(lookup.into_value())
    }

    /// Number of units currently running for `app`.
    ///
    /// The platform may report inventory alongside an error status, so the
    /// status is ignored. A body without a `units` field is a decode error.
    pub async fn total_units(&self, app: &str) -> Result<usize, PlatformError> {
        let path = app_path(app);
        let response = self
            .transport
            .send(PlatformRequest::new(Method::GET, &path))
            .await?;

        if !response.is_success() {
            debug!(app = %app, status = response.status, "reading units from error response");
        }

        let info: serde_json::Value = response.json(&path)?;
        match info.get("units") {
            Some(serde_json::Value::Array(units)) => Ok(units.len()),
            Some(serde_json::Value::Null) => Ok(0),
            Some(other) => Err(PlatformError::decode(
                &path,
                format!("expected `units` to be a list, got {}", other),
            )),
            None => Err(PlatformError::decode(&path, "missing `units` field")),
        }
    }

    /// Ask the platform for `units` more units on `app`.
    pub async fn add_units(&self, app: &str, units: usize) -> bool {
        let request = PlatformRequest::new(Method::PUT, format!("{}/units", app_path(app)))
            .query("units", units);
        self.execute(app, "add units", request).await
    }

    /// Ask the platform to remove `units` units from `app`.
    pub async fn remove_units(&self, app: &str, units: usize) -> bool {
        let request = PlatformRequest::new(Method::DELETE, format!("{}/units", app_path(app)))
            .query("units", units);
        self.execute(app, "remove units", request).await
    }

    /// Send a mutating request and collapse the result to success or failure.
    async fn execute(&self, app: &str, operation: &str, request: PlatformRequest) -> bool {
        match self.transport.send(request).await {
            Ok(response) if response.is_success() => {
                debug!(app = %app, operation, status = response.status, "platform call succeeded");
                true
            }
            Ok(response) => {
                warn!(
                    app = %app,
                    operation,
                    status = response.status,
                    body = %response.body,
                    "platform rejected request"
                );
                false
            }
            Err(e) => {
                warn!(app = %app, operation, error = %e, "platform request failed");
                false
            }
        }
    }
}

fn app_path(app: &str) -> String {
    format!("/apps/{}", app)
}

fn require_success(response: PlatformResponse) -> Result<PlatformResponse, PlatformError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(PlatformError::Status {
            status: response.status,
            body: response.body,
        })
    }
}
