//! OAuth access tokens for Google APIs.
//!
//! `ServiceAccountTokenSource` implements the JWT-bearer grant: a claim set
//! signed with the service account's RSA key is exchanged at the token
//! endpoint for a short-lived bearer token, which is cached until shortly
//! before it expires.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use vaxline_core::config::ServiceAccountKey;
use vaxline_core::errors::ResolverError;

pub const DIALOGFLOW_SCOPE: &str = "https://www.googleapis.com/auth/dialogflow";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<SecretString, ResolverError>;
}

/// Fixed token, for emulators and tests.
pub struct StaticTokenSource {
    token: SecretString,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: SecretString::from(token.into()) }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<SecretString, ResolverError> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

pub struct ServiceAccountTokenSource {
    client: Client,
    client_email: String,
    signing_key: EncodingKey,
    token_url: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(
        client: Client,
        key: &ServiceAccountKey,
        token_url: impl Into<String>,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())?;
        Ok(Self {
            client,
            client_email: key.client_email.clone(),
            signing_key,
            token_url: token_url.into(),
            scope: DIALOGFLOW_SCOPE.to_string(),
            cached: Mutex::new(None),
        })
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, ResolverError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: &self.scope,
            aud: &self.token_url,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|error| ResolverError::auth(format!("could not sign token assertion: {error}")))
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken, ResolverError> {
        let assertion = self.assertion(now)?;
        let response = self
            .client
            .post(&self.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    ResolverError::timeout(format!("token endpoint timed out: {error}"))
                } else {
                    ResolverError::network(format!("token endpoint unreachable: {error}"))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            ResolverError::network(format!("failed to read token response: {error}"))
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|error| match error.error_description {
                    Some(description) => format!("{}: {description}", error.error),
                    None => error.error,
                })
                .unwrap_or(body);
            return Err(if status.is_server_error() {
                ResolverError::server_error(format!("token endpoint HTTP {status}: {detail}"))
            } else {
                ResolverError::auth(format!("token exchange rejected (HTTP {status}): {detail}"))
            });
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|error| {
            ResolverError::decode(format!("malformed token response: {error}"))
        })?;
        // Google never issues tokens outliving the assertion that minted them.
        let lifetime =
            token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS).clamp(0, ASSERTION_LIFETIME_SECS);

        debug!(
            event_name = "nlu.token.refreshed",
            client_email = %self.client_email,
            expires_in_secs = lifetime,
            "obtained access token"
        );

        Ok(CachedToken {
            token: SecretString::from(token.access_token),
            expires_at: now + chrono::Duration::seconds(lifetime),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<SecretString, ResolverError> {
        // Held across the exchange so concurrent callers share one refresh.
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(current) = cached.as_ref() {
            if current.expires_at - chrono::Duration::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(current.token.clone());
            }
        }

        let fresh = self.exchange(now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

/// Default HTTP client for Google endpoints with a per-request deadline.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}
