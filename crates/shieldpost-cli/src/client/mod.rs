//! HTTP clients for the service gateways. Each implements one of the
//! collaborator traits from `shieldpost_core` on top of [`GatewayClient`].

mod account;
mod protector;
mod relay;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shieldpost_core::{
    AccountService, Collaborator, CoreError, DataProtector, MessageRelay, Result, ServiceKind,
};
use url::Url;

use crate::config::Settings;

pub use account::HttpAccountService;
pub use protector::HttpDataProtector;
pub use relay::HttpMessageRelay;

/// JSON client for one gateway endpoint
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    collaborator: Collaborator,
}

impl GatewayClient {
    pub fn new(base_url: &Url, api_key: &str, collaborator: Collaborator) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            collaborator,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.url(path);
        let resp = self
            .request(reqwest::Method::GET, &url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.connect_error(&url, e))?;
        self.handle_response(resp).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        let resp = self
            .request(reqwest::Method::POST, &url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.connect_error(&url, e))?;
        self.handle_response(resp).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        let resp = self
            .request(reqwest::Method::DELETE, &url)
            .send()
            .await
            .map_err(|e| self.connect_error(&url, e))?;
        let _: Value = self.handle_response(resp).await?;
        Ok(())
    }

    fn connect_error(&self, url: &str, err: reqwest::Error) -> CoreError {
        CoreError::collaborator_with_source(
            self.collaborator,
            format!("failed to reach {url}"),
            err,
        )
    }

    async fn handle_response<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            CoreError::collaborator_with_source(
                self.collaborator,
                format!("failed to read response body (HTTP {})", status.as_u16()),
                e,
            )
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|json| error_message(&json))
                .unwrap_or(body);
            return Err(CoreError::collaborator(
                self.collaborator,
                format!("HTTP {}: {message}", status.as_u16()),
            ));
        }

        let body = if body.is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| {
            CoreError::collaborator_with_source(self.collaborator, "unexpected response body", e)
        })
    }
}

/// Pull a human-readable message out of a JSON error body
fn error_message(json: &Value) -> Option<String> {
    ["error", "message", "detail"]
        .iter()
        .find_map(|key| match json.get(*key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(obj)) => obj
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
            _ => None,
        })
}

/// Collaborator clients built from resolved settings
pub struct Gateways {
    settings: Settings,
}

impl Gateways {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn protector(&self) -> Arc<dyn DataProtector> {
        Arc::new(HttpDataProtector::new(GatewayClient::new(
            &self.settings.endpoints.protector,
            &self.settings.api_key,
            Collaborator::DataProtector,
        )))
    }

    pub fn relay(&self, kind: ServiceKind) -> Arc<dyn MessageRelay> {
        Arc::new(HttpMessageRelay::new(GatewayClient::new(
            self.settings.endpoints.relay(kind),
            &self.settings.api_key,
            Collaborator::MessageRelay,
        )))
    }

    pub fn accounts(&self) -> Arc<dyn AccountService> {
        Arc::new(HttpAccountService::new(GatewayClient::new(
            &self.settings.endpoints.account,
            &self.settings.api_key,
            Collaborator::AccountService,
        )))
    }
}
