use crate::domain::commands::Command;
use crate::domain::light::Light;
use crate::domain::light_api::{LightApi, LightApiError};
use crate::hue::domain::{ApiEntry, ApiError, LightGet, StateRequest};
use crate::hue::map_lights::{map_light, map_lights};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, instrument};

/// A Hue bridge, spoken to through API v1 (`http://{host}/api/{uid}`).
#[derive(Debug)]
pub struct HueBridge {
    client: Client,
    api_url: String,
}

impl HueBridge {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        HueBridge {
            client,
            api_url: api_url.into(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, light_id: Option<u32>) -> Result<T, BridgeError> {
        let body = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_body(&body, light_id)
    }

    #[instrument(skip(self))]
    pub async fn fetch_lights(&self) -> Result<Vec<Light>, BridgeError> {
        let lights = self.get::<HashMap<String, LightGet>>("/lights", None).await?;
        map_lights(lights)
    }

    #[instrument(skip(self))]
    pub async fn fetch_light(&self, light_id: u32) -> Result<Light, BridgeError> {
        let light = self.get::<LightGet>(&format!("/lights/{}", light_id), Some(light_id)).await?;
        Ok(map_light(light_id, light))
    }

    #[instrument(skip_all, fields(light_id = command.light_id()))]
    pub async fn send(&self, command: &Command) -> Result<(), BridgeError> {
        match command {
            Command::SetOn { light_id, on } => {
                let body = self
                    .client
                    .put(format!("{}/lights/{}/state", self.api_url, light_id))
                    .json(&StateRequest { on: *on })
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?;

                debug!(response = body.trim(), "Bridge answered command {:?}", command);
                acknowledge(serde_json::from_str(&body)?, Some(*light_id))
            }
        }
    }
}

#[async_trait]
impl LightApi for HueBridge {
    async fn lights(&self) -> Result<Vec<Light>, LightApiError> {
        Ok(self.fetch_lights().await?)
    }

    async fn light(&self, light_id: u32) -> Result<Light, LightApiError> {
        Ok(self.fetch_light(light_id).await?)
    }

    async fn execute(&self, command: &Command) -> Result<(), LightApiError> {
        Ok(self.send(command).await?)
    }
}

/// Reads are answered with the resource itself, or with an array of errors when they fail.
fn parse_body<T: DeserializeOwned>(body: &str, light_id: Option<u32>) -> Result<T, BridgeError> {
    let value = serde_json::from_str::<serde_json::Value>(body)?;
    if value.is_array() {
        let entries = serde_json::from_value::<Vec<ApiEntry>>(value)?;
        return match entries.into_iter().find_map(into_error) {
            Some(error) => Err(BridgeError::from_api_error(error, light_id)),
            None => Err(BridgeError::NotAResource),
        };
    }

    Ok(serde_json::from_value(value)?)
}

fn acknowledge(entries: Vec<ApiEntry>, light_id: Option<u32>) -> Result<(), BridgeError> {
    if entries.iter().any(|entry| matches!(entry, ApiEntry::Success(_))) {
        return Ok(());
    }

    match entries.into_iter().find_map(into_error) {
        Some(error) => Err(BridgeError::from_api_error(error, light_id)),
        None => Err(BridgeError::Unacknowledged),
    }
}

fn into_error(entry: ApiEntry) -> Option<ApiError> {
    match entry {
        ApiEntry::Error(error) => Some(error),
        ApiEntry::Success(_) => None,
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unknown light '{light_id}'")]
    UnknownLight { light_id: u32 },
    #[error("bridge error {kind} at '{address}': {description}")]
    Api { kind: u16, address: String, description: String },
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("invalid light id '{id}'")]
    InvalidLightId { id: String },
    #[error("the bridge did not acknowledge the command")]
    Unacknowledged,
    #[error("expected a resource, the bridge answered with a list without errors")]
    NotAResource,
}

impl BridgeError {
    fn from_api_error(error: ApiError, light_id: Option<u32>) -> Self {
        match light_id {
            Some(light_id) if error.kind == ApiError::RESOURCE_NOT_AVAILABLE => BridgeError::UnknownLight { light_id },
            _ => BridgeError::Api {
                kind: error.kind,
                address: error.address,
                description: error.description,
            },
        }
    }

    /// Whether the bridge could not be reached at all, as opposed to answering with an error.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, BridgeError::Request(e) if e.is_connect() || e.is_timeout())
    }
}

impl From<BridgeError> for LightApiError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::UnknownLight { light_id } => LightApiError::UnknownLight { light_id },
            error if error.is_unreachable() => LightApiError::Unreachable(Box::new(error)),
            error => LightApiError::Failed(Box::new(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::light::LightState;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn bridge(server: &mockito::Server) -> HueBridge {
        HueBridge::new(Client::new(), format!("{}/api/uid", server.url()))
    }

    #[tokio::test]
    async fn light_returns_the_mapped_light() -> Result<(), BridgeError> {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/api/uid/lights/2")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(include_str!("../../tests/resources/light_response.json"))
            .create_async()
            .await;

        let light = bridge(&server).fetch_light(2).await?;

        mock.assert();
        assert_eq!(
            light,
            Light {
                id: 2,
                name: "Hallway".to_string(),
                model_id: Some("LWA004".to_string()),
                state: LightState {
                    on: true,
                    reachable: true,
                    brightness: Some(144),
                },
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn light_treats_a_missing_reachable_flag_as_unreachable() -> Result<(), BridgeError> {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", "/api/uid/lights/7")
            .with_status(200)
            .with_body(r#"{"name": "Plug", "state": {"on": false}}"#)
            .create_async()
            .await;

        let light = bridge(&server).fetch_light(7).await?;

        assert!(!light.state.reachable);
        assert_eq!(light.state.brightness, None);
        Ok(())
    }

    #[tokio::test]
    async fn light_maps_an_unavailable_resource_to_an_unknown_light() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", "/api/uid/lights/42")
            .with_status(200)
            .with_body(include_str!("../../tests/resources/unknown_light_response.json"))
            .create_async()
            .await;

        let result = bridge(&server).fetch_light(42).await;

        assert!(matches!(result, Err(BridgeError::UnknownLight { light_id: 42 })));
    }

    #[tokio::test]
    async fn light_maps_other_bridge_errors() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", "/api/uid/lights/2")
            .with_status(200)
            .with_body(include_str!("../../tests/resources/unauthorized_response.json"))
            .create_async()
            .await;

        let result = bridge(&server).fetch_light(2).await;

        match result {
            Err(BridgeError::Api { kind, address, description }) => {
                assert_eq!(kind, 1);
                assert_eq!(address, "/");
                assert_eq!(description, "unauthorized user");
            }
            other => panic!("expected an API error, found {:?}", other),
        }
    }

    #[tokio::test]
    async fn light_reports_a_malformed_response() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", "/api/uid/lights/2")
            .with_status(200)
            .with_body("<html>not a bridge</html>")
            .create_async()
            .await;

        let result = bridge(&server).fetch_light(2).await;

        assert!(matches!(result, Err(BridgeError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn light_reports_a_failed_request() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server.mock("GET", "/api/uid/lights/2").with_status(500).create_async().await;

        let result = bridge(&server).fetch_light(2).await;

        match result {
            Err(error @ BridgeError::Request(_)) => assert!(!error.is_unreachable()),
            other => panic!("expected a request error, found {:?}", other),
        }
    }

    #[tokio::test]
    async fn light_reports_an_unreachable_bridge() {
        // Nothing listens on the discard port
        let bridge = HueBridge::new(Client::new(), "http://127.0.0.1:9/api/uid");

        let result = bridge.fetch_light(2).await;

        assert!(result.is_err_and(|e| e.is_unreachable()));
    }

    #[tokio::test]
    async fn lights_returns_all_lights_ordered_by_id() -> Result<(), BridgeError> {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/api/uid/lights")
            .with_status(200)
            .with_body(include_str!("../../tests/resources/lights_response.json"))
            .create_async()
            .await;

        let lights = bridge(&server).fetch_lights().await?;

        mock.assert();
        let summary = lights
            .iter()
            .map(|light| (light.id, light.name.as_str(), light.state.reachable))
            .collect::<Vec<_>>();
        assert_eq!(summary, vec![(1, "Porch", false), (2, "Hallway", true)]);
        Ok(())
    }

    #[tokio::test]
    async fn execute_puts_the_new_state() -> Result<(), BridgeError> {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("PUT", "/api/uid/lights/2/state")
            .match_body(Matcher::Json(json!({ "on": true })))
            .with_status(200)
            .with_body(include_str!("../../tests/resources/set_state_response.json"))
            .create_async()
            .await;

        bridge(&server).send(&Command::SetOn { light_id: 2, on: true }).await?;

        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn execute_reports_a_rejected_command() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("PUT", "/api/uid/lights/2/state")
            .with_status(200)
            .with_body(include_str!("../../tests/resources/set_state_error_response.json"))
            .create_async()
            .await;

        let result = bridge(&server).send(&Command::SetOn { light_id: 2, on: false }).await;

        assert!(matches!(result, Err(BridgeError::Api { kind: 901, .. })));
    }

    #[tokio::test]
    async fn execute_maps_an_unavailable_resource_to_an_unknown_light() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("PUT", "/api/uid/lights/42/state")
            .with_status(200)
            .with_body(include_str!("../../tests/resources/unknown_light_response.json"))
            .create_async()
            .await;

        let result = bridge(&server).send(&Command::SetOn { light_id: 42, on: true }).await;

        assert!(matches!(result, Err(BridgeError::UnknownLight { light_id: 42 })));
    }

    #[tokio::test]
    async fn execute_requires_an_acknowledgement() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("PUT", "/api/uid/lights/2/state")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let result = bridge(&server).send(&Command::SetOn { light_id: 2, on: true }).await;

        assert!(matches!(result, Err(BridgeError::Unacknowledged)));
    }

    #[rstest]
    #[case("[]")]
    #[case(r#"[{"success": {"/lights/2/state/on": true}}]"#)]
    #[tokio::test]
    async fn light_rejects_a_list_without_errors(#[case] body: &str) {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", "/api/uid/lights/2")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let result = bridge(&server).fetch_light(2).await;

        assert!(matches!(result, Err(BridgeError::NotAResource)));
    }

    #[tokio::test]
    async fn light_api_maps_bridge_errors_to_light_api_errors() {
        let mut server = mockito::Server::new_async().await;

        let _unknown = server
            .mock("GET", "/api/uid/lights/42")
            .with_status(200)
            .with_body(include_str!("../../tests/resources/unknown_light_response.json"))
            .create_async()
            .await;
        let _unauthorized = server
            .mock("GET", "/api/uid/lights")
            .with_status(200)
            .with_body(include_str!("../../tests/resources/unauthorized_response.json"))
            .create_async()
            .await;
        let api: &dyn LightApi = &bridge(&server);

        assert!(matches!(api.light(42).await, Err(LightApiError::UnknownLight { light_id: 42 })));
        match api.lights().await {
            Err(error @ LightApiError::Failed(_)) => assert_eq!(error.to_string(), "bridge error 1 at '/': unauthorized user"),
            other => panic!("expected a failure, found {:?}", other),
        }

        let unreachable = HueBridge::new(Client::new(), "http://127.0.0.1:9/api/uid");
        let result = LightApi::execute(&unreachable, &Command::SetOn { light_id: 2, on: true }).await;
        assert!(result.is_err_and(|e| e.is_unreachable()));
    }
}
