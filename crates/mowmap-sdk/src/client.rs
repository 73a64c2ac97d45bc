//! HTTP client for the mower backend: settings, config keys and map persistence.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use mowmap_core::geo::{Datum, Offsets};
use mowmap_core::models::{AddMowingAreaRequest, SetDockingPointRequest};

use crate::stream::{Topic, TopicStream};

pub const OFFSET_X_KEY: &str = "gui.map.offset.x";
pub const OFFSET_Y_KEY: &str = "gui.map.offset.y";

/// Client for the backend REST API under `/api`.
#[derive(Debug, Clone)]
pub struct MowerClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SettingsResponse {
    #[serde(default)]
    settings: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl MowerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    // ========== SETTINGS ==========

    /// All backend settings with values rendered as strings.
    pub async fn settings(&self) -> Result<HashMap<String, String>> {
        let response = self.client.get(self.url("/settings")).send().await?;
        let response = check(response, "fetch settings").await?;
        let body: SettingsResponse = response.json().await.context("decoding settings")?;

        Ok(body
            .settings
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect())
    }

    /// Datum from `OM_DATUM_LONG` / `OM_DATUM_LAT`.
    pub async fn datum(&self) -> Result<Datum> {
        let settings = self.settings().await?;
        Ok(Datum::from_settings(&settings)?)
    }

    // ========== CONFIG KEYS ==========

    pub async fn get_config_keys(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let request: HashMap<&str, &str> = keys.iter().map(|k| (*k, "")).collect();
        let response = self
            .client
            .post(self.url("/config/keys/get"))
            .json(&request)
            .send()
            .await?;
        let response = check(response, "read config keys").await?;
        let values: HashMap<String, Value> = response.json().await.context("decoding config keys")?;
        Ok(values
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect())
    }

    pub async fn set_config_keys(&self, values: &HashMap<String, String>) -> Result<()> {
        let response = self
            .client
            .post(self.url("/config/keys/set"))
            .json(values)
            .send()
            .await?;
        check(response, "write config keys").await?;
        Ok(())
    }

    /// Map offsets; missing or unparsable values read as zero.
    pub async fn offsets(&self) -> Result<Offsets> {
        let values = self.get_config_keys(&[OFFSET_X_KEY, OFFSET_Y_KEY]).await?;
        Ok(parse_offsets(&values))
    }

    pub async fn set_offsets(&self, offsets: Offsets) -> Result<()> {
        let mut values = HashMap::new();
        values.insert(OFFSET_X_KEY.to_string(), offsets.x.to_string());
        values.insert(OFFSET_Y_KEY.to_string(), offsets.y.to_string());
        self.set_config_keys(&values).await
    }

    // ========== MAP PERSISTENCE ==========

    pub async fn add_area(&self, request: &AddMowingAreaRequest) -> Result<()> {
        let response = self
            .client
            .post(self.url("/openmower/map/area/add"))
            .json(request)
            .send()
            .await?;
        check(response, "add map area").await?;
        Ok(())
    }

    pub async fn delete_area(&self, index: usize) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/openmower/map/area/{index}")))
            .send()
            .await?;
        check(response, "delete map area").await?;
        Ok(())
    }

    pub async fn set_docking_point(&self, request: &SetDockingPointRequest) -> Result<()> {
        let response = self
            .client
            .post(self.url("/openmower/map/docking"))
            .json(request)
            .send()
            .await?;
        check(response, "set docking point").await?;
        Ok(())
    }

    // ========== STREAMS ==========

    pub async fn subscribe(&self, topic: Topic) -> Result<TopicStream> {
        let url = build_ws_url(&self.base_url, &format!("/api/openmower/subscribe/{}", topic.as_str()))?;
        TopicStream::connect(url, topic).await
    }
}

fn parse_offsets(values: &HashMap<String, String>) -> Offsets {
    let read = |key: &str| {
        values
            .get(key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    };
    Offsets::new(read(OFFSET_X_KEY), read(OFFSET_Y_KEY))
}

/// Turn a non-success status into an error carrying the backend's message.
async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    anyhow::bail!("Failed to {}: {} {}", action, status, message.trim());
}

pub(crate) fn build_ws_url(base: &str, path: &str) -> Result<Url> {
    let mut url = Url::parse(base)?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => other,
    }
    .to_string();

    url.set_scheme(&scheme)
        .map_err(|_| anyhow::anyhow!("Invalid base URL scheme"))?;
    url.set_path(path);
    Ok(url)
}
