use anyhow::{Context, anyhow};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{MqttConfig, Secret};

const DEFAULT_ENDPOINT: &str = "http://supervisor";

/// Broker address and credentials actually used for the MQTT session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<Secret>,
}

impl BrokerSettings {
    pub fn from_config(config: &MqttConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone().filter(|u| !u.is_empty()),
            password: config.password.clone().filter(|p| !p.is_empty()),
        }
    }

    fn overlay(mut self, service: &Value) -> Self {
        if let Some(host) = service.get("host").and_then(Value::as_str)
            && !host.is_empty()
        {
            self.host = host.to_string();
        }
        if let Some(port) = service.get("port").and_then(port_value) {
            self.port = port;
        }
        if let Some(username) = service.get("username").and_then(Value::as_str) {
            self.username = Some(username.to_string());
        }
        if let Some(password) = service.get("password").and_then(Value::as_str) {
            self.password = Some(Secret::new(password));
        }
        self
    }
}

fn port_value(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Asks the Home Assistant supervisor for the MQTT service description.
pub async fn fetch_mqtt_service(endpoint: &str, token: &str) -> anyhow::Result<Value> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let url = format!("{}/services/mqtt", endpoint.trim_end_matches('/'));
    let response = client
        .get(&url)
        .bearer_auth(token)
        .send()
        .await
        .with_context(|| format!("GET {}", url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("supervisor answered {} for {}", status, url));
    }

    let body: Value = response.json().await.context("supervisor body is not JSON")?;
    let service = match body.get("data") {
        Some(data) if data.is_object() => data.clone(),
        _ => body,
    };
    if service.get("host").and_then(Value::as_str).is_none() {
        return Err(anyhow!("supervisor MQTT service has no host"));
    }
    Ok(service)
}

/// Resolves the broker from the supervisor when running as an add-on, falling
/// back to the static configuration on any failure.
pub async fn resolve_broker(config: &MqttConfig) -> BrokerSettings {
    let fallback = BrokerSettings::from_config(config);
    if !config.use_supervisor {
        return fallback;
    }
    let Ok(token) = std::env::var("SUPERVISOR_TOKEN") else {
        return fallback;
    };
    let endpoint =
        std::env::var("SUPERVISOR_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());

    match fetch_mqtt_service(&endpoint, &token).await {
        Ok(service) => {
            let settings = fallback.overlay(&service);
            info!(
                "Using supervisor MQTT service at {}:{}",
                settings.host, settings.port
            );
            settings
        }
        Err(e) => {
            warn!(
                "Supervisor MQTT lookup failed, using {}:{} from config: {:?}",
                fallback.host, fallback.port, e
            );
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn nested_service_description_is_used() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/services/mqtt")
            .match_header("authorization", "Bearer super-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "result": "ok",
                    "data": {"host": "core-mosquitto", "port": 1884, "username": "addons", "password": "pw"}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let service = fetch_mqtt_service(&server.url(), "super-token").await.unwrap();
        let settings = BrokerSettings::from_config(&MqttConfig::default()).overlay(&service);
        assert_eq!(settings.host, "core-mosquitto");
        assert_eq!(settings.port, 1884);
        assert_eq!(settings.username.as_deref(), Some("addons"));
        assert_eq!(settings.password.as_ref().map(Secret::expose), Some("pw"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn top_level_description_and_string_port_are_accepted() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/services/mqtt")
            .match_header("authorization", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"host": "10.0.0.2", "port": "8883"}"#)
            .create_async()
            .await;

        let service = fetch_mqtt_service(&format!("{}/", server.url()), "t").await.unwrap();
        let settings = BrokerSettings::from_config(&MqttConfig::default()).overlay(&service);
        assert_eq!(settings.host, "10.0.0.2");
        assert_eq!(settings.port, 8883);
        assert_eq!(settings.username, None);
    }

    #[tokio::test]
    async fn refused_lookup_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/services/mqtt")
            .with_status(401)
            .with_body("401: Unauthorized")
            .create_async()
            .await;

        assert!(fetch_mqtt_service(&server.url(), "bad").await.is_err());
    }

    #[tokio::test]
    async fn supervisor_is_skipped_when_disabled() {
        let config = MqttConfig {
            host: "broker.lan".to_string(),
            use_supervisor: false,
            ..MqttConfig::default()
        };
        let settings = resolve_broker(&config).await;
        assert_eq!(settings.host, "broker.lan");
        assert_eq!(settings.port, 1883);
    }

    #[test]
    fn empty_static_credentials_are_dropped() {
        let config = MqttConfig {
            username: Some(String::new()),
            password: Some(Secret::new("")),
            ..MqttConfig::default()
        };
        let settings = BrokerSettings::from_config(&config);
        assert_eq!(settings.username, None);
        assert!(settings.password.is_none());
    }
}
