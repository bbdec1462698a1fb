pub mod bootstrap;
pub mod health;
pub mod webhook;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use vaxline_sms::TwimlReplyChannel;

use crate::bootstrap::Application;
use crate::health::HealthState;
use crate::webhook::WebhookState;

/// Full HTTP surface: the SMS webhook at the configured path plus `/health`.
pub fn router(app: &Application) -> Router {
    let webhook = webhook::router(
        &app.config.server.webhook_path,
        WebhookState {
            conversation: app.conversation.clone(),
            channel: Arc::new(TwimlReplyChannel),
        },
    );
    let health = health::router(HealthState {
        db_pool: app.db_pool.clone(),
        conversation: app.conversation.clone(),
    });

    webhook.merge(health).layer(TraceLayer::new_for_http())
}
