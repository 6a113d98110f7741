use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningParams, SigningSettings, sign};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use thiserror::Error;
use tracing::debug;

use crate::config::ServiceConfig;

const SIGNING_NAME: &str = "bedrock";
const REFRESH_BEFORE_EXPIRY: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no aws credentials resolved: {0}")]
    MissingCredentials(String),
    #[error("failed to sign bedrock request: {0}")]
    Signing(String),
}

/// How requests to the Bedrock runtime are authenticated.
pub enum BedrockAuth {
    /// Bedrock API key sent as `Authorization: Bearer`.
    Bearer(String),
    /// SigV4 with credentials from an AWS credential provider.
    SigV4(SigV4Signer),
}

impl BedrockAuth {
    /// A configured bearer token wins. Otherwise the default AWS credential
    /// chain is loaded and must yield credentials now, not on the first call.
    pub async fn resolve(config: &ServiceConfig) -> Result<Self, AuthError> {
        if let Some(token) = config.bearer_token.as_deref() {
            return Ok(Self::Bearer(token.to_string()));
        }

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;
        let provider = sdk_config.credentials_provider().ok_or_else(|| {
            AuthError::MissingCredentials("no credentials provider configured".to_string())
        })?;

        let signer = SigV4Signer::new(config.region.clone(), provider);
        signer.verify().await?;
        Ok(Self::SigV4(signer))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bearer(_) => "bearer",
            Self::SigV4(_) => "sigv4",
        }
    }
}

pub struct SigV4Signer {
    region: String,
    provider: SharedCredentialsProvider,
    cached: RwLock<Option<Credentials>>,
}

impl SigV4Signer {
    pub fn new(region: impl Into<String>, provider: SharedCredentialsProvider) -> Self {
        Self {
            region: region.into(),
            provider,
            cached: RwLock::new(None),
        }
    }

    pub async fn verify(&self) -> Result<(), AuthError> {
        self.credentials().await.map(|_| ())
    }

    /// Headers to add to a request that carries exactly `headers` and `body`.
    pub async fn sign(
        &self,
        method: &str,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<Vec<(String, String)>, AuthError> {
        let identity: Identity = self.credentials().await?.into();
        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(SIGNING_NAME)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|err| AuthError::Signing(err.to_string()))?
            .into();

        let request = SignableRequest::new(
            method,
            url,
            headers.iter().copied(),
            SignableBody::Bytes(body),
        )
        .map_err(|err| AuthError::Signing(err.to_string()))?;
        let (instructions, _signature) = sign(request, &params)
            .map_err(|err| AuthError::Signing(err.to_string()))?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }

    async fn credentials(&self) -> Result<Credentials, AuthError> {
        let cached = self
            .cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(credentials) = cached.filter(is_fresh) {
            return Ok(credentials);
        }

        let credentials = self
            .provider
            .provide_credentials()
            .await
            .map_err(|err| AuthError::MissingCredentials(err.to_string()))?;
        debug!(
            expires = credentials.expiry().is_some(),
            "resolved aws credentials"
        );

        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(credentials.clone());
        Ok(credentials)
    }
}

fn is_fresh(credentials: &Credentials) -> bool {
    match credentials.expiry() {
        Some(expiry) => expiry > SystemTime::now() + REFRESH_BEFORE_EXPIRY,
        None => true,
    }
}
