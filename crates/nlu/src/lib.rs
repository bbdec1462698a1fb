pub mod auth;
pub mod dialogflow;

pub use auth::{ServiceAccountTokenSource, StaticTokenSource, TokenSource, DIALOGFLOW_SCOPE};
pub use dialogflow::{intent_from_response, DetectIntentResponse, DialogflowResolver, NluSetupError};
