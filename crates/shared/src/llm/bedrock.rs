use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::auth::BedrockAuth;
use super::gateway::{
    GatewayError, GenerationParams, InvokeModelPayload, ModelGateway, ModelGatewayFuture,
};
use crate::config::ServiceConfig;
use crate::models::Message;

#[derive(Debug, Clone)]
pub struct BedrockGatewayConfig {
    pub runtime_url: String,
    pub model_id: String,
    pub timeout_ms: u64,
    pub params: GenerationParams,
}

impl BedrockGatewayConfig {
    pub fn from_service_config(config: &ServiceConfig) -> Self {
        Self {
            runtime_url: config.runtime_url.clone(),
            model_id: config.model_id.clone(),
            timeout_ms: config.gateway_timeout_ms,
            params: GenerationParams::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BedrockConfigError {
    #[error("invalid bedrock runtime url: {0}")]
    InvalidRuntimeUrl(String),
    #[error("failed to build bedrock http client: {0}")]
    HttpClient(String),
}

const JSON_CONTENT_TYPE: &str = "application/json";

/// Calls `InvokeModel` on the Bedrock Runtime REST endpoint.
pub struct BedrockGateway {
    client: reqwest::Client,
    invoke_url: Url,
    config: BedrockGatewayConfig,
    auth: BedrockAuth,
}

impl BedrockGateway {
    pub fn new(
        config: BedrockGatewayConfig,
        auth: BedrockAuth,
    ) -> Result<Self, BedrockConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| BedrockConfigError::HttpClient(err.to_string()))?;
        let invoke_url = invoke_url(&config.runtime_url, &config.model_id)?;

        Ok(Self {
            client,
            invoke_url,
            config,
            auth,
        })
    }

    pub fn invoke_url(&self) -> &Url {
        &self.invoke_url
    }

    async fn send(&self, history: &[Message]) -> Result<Vec<u8>, GatewayError> {
        let payload = InvokeModelPayload::from_history(&self.config.params, history);
        let body = serde_json::to_vec(&payload).map_err(|err| {
            GatewayError::InvalidProviderPayload(format!("request_encode_failed: {err}"))
        })?;

        let mut request = self
            .client
            .post(self.invoke_url.clone())
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        match &self.auth {
            BedrockAuth::Bearer(token) => request = request.bearer_auth(token),
            BedrockAuth::SigV4(signer) => {
                let signed_headers = signer
                    .sign(
                        "POST",
                        self.invoke_url.as_str(),
                        &[
                            ("accept", JSON_CONTENT_TYPE),
                            ("content-type", JSON_CONTENT_TYPE),
                        ],
                        &body,
                    )
                    .await
                    .map_err(|err| {
                        GatewayError::ProviderFailure(format!("request_signing_failed: {err}"))
                    })?;
                for (name, value) in signed_headers {
                    request = request.header(name, value);
                }
            }
        }

        let response = request.body(body).send().await.map_err(|err| {
            if err.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::ProviderFailure(format!("request_unavailable: {err}"))
            }
        })?;

        let status = response.status();
        let request_id = header_value(response.headers(), "x-amzn-requestid");
        let error_type = header_value(response.headers(), "x-amzn-errortype");
        let body = response.bytes().await.map_err(|err| {
            if err.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::InvalidProviderPayload("response_body_read_failed".to_string())
            }
        })?;

        if !status.is_success() {
            let message = parse_provider_error_message(&body);
            return Err(GatewayError::ProviderFailure(format!(
                "status={} type={} message={message}",
                status.as_u16(),
                error_type.as_deref().unwrap_or("unknown"),
            )));
        }

        debug!(
            request_id = request_id.as_deref().unwrap_or("none"),
            bytes = body.len(),
            history_len = history.len(),
            "bedrock invoke succeeded"
        );

        Ok(body.to_vec())
    }
}

impl ModelGateway for BedrockGateway {
    fn invoke<'a>(&'a self, history: &'a [Message]) -> ModelGatewayFuture<'a> {
        Box::pin(self.send(history))
    }
}

/// `{runtime_url}/model/{model_id}/invoke`, with the model id kept as a
/// single percent-encoded segment so inference-profile ARNs survive.
pub fn invoke_url(runtime_url: &str, model_id: &str) -> Result<Url, BedrockConfigError> {
    let mut url = Url::parse(runtime_url)
        .map_err(|err| BedrockConfigError::InvalidRuntimeUrl(err.to_string()))?;

    url.path_segments_mut()
        .map_err(|_| BedrockConfigError::InvalidRuntimeUrl(runtime_url.to_string()))?
        .pop_if_empty()
        .push("model")
        .push(model_id)
        .push("invoke");

    Ok(url)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

fn parse_provider_error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        message: Option<String>,
        #[serde(rename = "Message")]
        upper_message: Option<String>,
    }

    serde_json::from_slice::<ProviderErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.message.or(envelope.upper_message))
        .unwrap_or_else(|| "unknown".to_string())
}
