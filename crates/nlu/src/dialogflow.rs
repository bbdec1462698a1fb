//! Dialogflow ES `detectIntent` client.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use vaxline_core::config::{ConfigError, DialogflowConfig};
use vaxline_core::domain::intent::{IntentResult, ParamValue};
use vaxline_core::domain::message::SenderId;
use vaxline_core::errors::ResolverError;
use vaxline_core::ports::IntentResolver;

use crate::auth::{http_client, ServiceAccountTokenSource, TokenSource};

#[derive(Debug, Error)]
pub enum NluSetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service-account private key is not a usable RSA key: {0}")]
    SigningKey(#[from] jsonwebtoken::errors::Error),
}

pub struct DialogflowResolver {
    client: Client,
    tokens: Arc<dyn TokenSource>,
    base_url: String,
    project_id: String,
    language_code: String,
}

impl DialogflowResolver {
    pub fn new(
        client: Client,
        tokens: Arc<dyn TokenSource>,
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        language_code: impl Into<String>,
    ) -> Self {
        Self {
            client,
            tokens,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            language_code: language_code.into(),
        }
    }

    /// Builds the resolver and its service-account token source from config.
    pub fn from_config(config: &DialogflowConfig) -> Result<Self, NluSetupError> {
        let key = config.service_account()?;
        let client = http_client(std::time::Duration::from_secs(config.timeout_secs))?;
        let tokens = ServiceAccountTokenSource::new(client.clone(), &key, &config.token_url)?;

        Ok(Self::new(
            client,
            Arc::new(tokens),
            &config.base_url,
            &config.project_id,
            &config.language_code,
        ))
    }

    pub fn session_url(&self, session: &SenderId) -> String {
        format!(
            "{}/v2/projects/{}/agent/sessions/{}:detectIntent",
            self.base_url,
            self.project_id,
            session.session_key()
        )
    }
}

#[async_trait]
impl IntentResolver for DialogflowResolver {
    async fn resolve(&self, session: &SenderId, text: &str) -> Result<IntentResult, ResolverError> {
        let token = self.tokens.access_token().await?;
        let request = DetectIntentRequest {
            query_input: QueryInput {
                text: TextInput { text, language_code: &self.language_code },
            },
        };

        let response = self
            .client
            .post(self.session_url(session))
            .bearer_auth(token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    ResolverError::timeout(format!("detectIntent timed out: {error}"))
                } else {
                    ResolverError::network(format!("detectIntent request failed: {error}"))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            ResolverError::network(format!("failed to read detectIntent response: {error}"))
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<GoogleErrorResponse>(&body)
                .map(|error| error.error.message)
                .unwrap_or(body);
            return Err(match status.as_u16() {
                400 | 404 => ResolverError::invalid_request(format!("HTTP {status}: {message}")),
                401 | 403 => ResolverError::auth(format!("HTTP {status}: {message}")),
                408 | 504 => ResolverError::timeout(format!("HTTP {status}: {message}")),
                500..=599 => ResolverError::server_error(format!("HTTP {status}: {message}")),
                _ => ResolverError::server_error(format!("unexpected HTTP {status}: {message}")),
            });
        }

        let decoded: DetectIntentResponse = serde_json::from_str(&body).map_err(|error| {
            ResolverError::decode(format!("malformed detectIntent response: {error}"))
        })?;
        let response_id = decoded.response_id.clone().unwrap_or_default();
        let confidence = decoded
            .query_result
            .as_ref()
            .and_then(|result| result.intent_detection_confidence)
            .unwrap_or_default();
        let intent = intent_from_response(decoded);

        debug!(
            event_name = "nlu.detect_intent.completed",
            response_id = %response_id,
            intent = %intent.intent_name,
            confidence,
            parameter_count = intent.parameters.len(),
            "detectIntent answered"
        );

        Ok(intent)
    }
}

/// Flattens a `detectIntent` response into the router's view of it.
///
/// A response with no matched intent yields an empty intent name.
pub fn intent_from_response(response: DetectIntentResponse) -> IntentResult {
    let Some(result) = response.query_result else {
        return IntentResult::default();
    };

    let parameters: BTreeMap<String, ParamValue> = result
        .parameters
        .iter()
        .map(|(name, value)| (name.clone(), ParamValue::from_json(value)))
        .collect();

    IntentResult {
        intent_name: result.intent.map(|intent| intent.display_name).unwrap_or_default(),
        parameters,
        default_text: result.fulfillment_text.unwrap_or_default(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentRequest<'a> {
    query_input: QueryInput<'a>,
}

#[derive(Debug, Serialize)]
struct QueryInput<'a> {
    text: TextInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextInput<'a> {
    text: &'a str,
    language_code: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectIntentResponse {
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub query_result: Option<QueryResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
    #[serde(default)]
    pub fulfillment_text: Option<String>,
    #[serde(default)]
    pub intent: Option<MatchedIntent>,
    #[serde(default)]
    pub intent_detection_confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedIntent {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    message: String,
}
