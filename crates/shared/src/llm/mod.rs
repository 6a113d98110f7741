pub mod auth;
pub mod bedrock;
pub mod extract;
pub mod gateway;

pub use auth::{AuthError, BedrockAuth, SigV4Signer};
pub use bedrock::{BedrockConfigError, BedrockGateway, BedrockGatewayConfig};
pub use extract::{Extraction, REPLY_SHAPES, ReplyShape, extract_reply, extract_reply_bytes};
pub use gateway::{
    GatewayError, GenerationParams, InvokeModelPayload, ModelGateway, ModelGatewayFuture,
};
