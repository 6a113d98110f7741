use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use thiserror::Error;

use crate::models::{Message, Role};

pub const ANTHROPIC_BEDROCK_VERSION: &str = "bedrock-2023-05-31";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Raw response body from the provider.
pub type ModelGatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<u8>, GatewayError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f64,
    pub anthropic_version: &'static str,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            anthropic_version: ANTHROPIC_BEDROCK_VERSION,
        }
    }
}

/// Anthropic Messages body accepted by Bedrock `InvokeModel`.
#[derive(Debug, Serialize)]
pub struct InvokeModelPayload<'a> {
    pub anthropic_version: &'a str,
    pub max_tokens: u32,
    pub temperature: f64,
    pub messages: Vec<PayloadMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub struct PayloadMessage<'a> {
    pub role: Role,
    pub content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock<'a> {
    Text { text: &'a str },
}

impl<'a> InvokeModelPayload<'a> {
    pub fn from_history(params: &'a GenerationParams, history: &'a [Message]) -> Self {
        Self {
            anthropic_version: params.anthropic_version,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            messages: history
                .iter()
                .map(|message| PayloadMessage {
                    role: message.role,
                    content: vec![ContentBlock::Text {
                        text: &message.content,
                    }],
                })
                .collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("model provider request timed out")]
    Timeout,
    #[error("model provider request failed: {0}")]
    ProviderFailure(String),
    #[error("model provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
}

pub trait ModelGateway: Send + Sync {
    /// Sends the full ordered history and returns the provider's response body.
    fn invoke<'a>(&'a self, history: &'a [Message]) -> ModelGatewayFuture<'a>;
}
