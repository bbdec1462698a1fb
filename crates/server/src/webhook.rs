//! Inbound SMS webhook.
//!
//! Twilio POSTs an `application/x-www-form-urlencoded` body and expects the
//! reply as TwiML in the response. The route answers `200` with exactly one
//! `<Message>` for every request it receives, including ones it cannot parse.

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use vaxline_core::conversation::{ConversationService, APOLOGY_TEXT};
use vaxline_core::domain::message::OutboundMessage;
use vaxline_sms::{ReplyChannel, TwilioInbound};

#[derive(Clone)]
pub struct WebhookState {
    pub conversation: Arc<ConversationService>,
    pub channel: Arc<dyn ReplyChannel>,
}

pub fn router(path: &str, state: WebhookState) -> Router {
    let channel = state.channel.clone();
    Router::new()
        .route(path, post(receive_message))
        .with_state(state)
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
            apology_after_panic(channel.as_ref(), panic.as_ref())
        }))
}

/// A panicking handler still owes the carrier its one reply.
fn apology_after_panic(channel: &dyn ReplyChannel, panic: &(dyn Any + Send)) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    error!(event_name = "webhook.message.panicked", detail = %detail, "webhook handler panicked");
    render(channel, &OutboundMessage::new(APOLOGY_TEXT))
}

pub async fn receive_message(
    State(state): State<WebhookState>,
    form: Result<Form<TwilioInbound>, FormRejection>,
) -> Response {
    let inbound = match form {
        Ok(Form(inbound)) => inbound,
        Err(rejection) => {
            let correlation_id = Uuid::new_v4().to_string();
            warn!(
                event_name = "webhook.message.rejected",
                correlation_id = %correlation_id,
                reason = %rejection.body_text(),
                "inbound webhook body could not be decoded"
            );
            return reply(&state, &OutboundMessage::new(APOLOGY_TEXT));
        }
    };

    let correlation_id = inbound
        .correlation_id()
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let message = match inbound.to_inbound_message() {
        Ok(message) => message,
        Err(error) => {
            warn!(
                event_name = "webhook.message.rejected",
                correlation_id = %correlation_id,
                reason = %error,
                "inbound webhook rejected"
            );
            return reply(&state, &OutboundMessage::new(APOLOGY_TEXT));
        }
    };

    info!(
        event_name = "webhook.message.received",
        correlation_id = %correlation_id,
        sender_id = %message.sender_id,
        body_chars = message.text.chars().count(),
        "inbound message received"
    );

    let outbound = state.conversation.respond(&message, &correlation_id).await;
    reply(&state, &outbound)
}

fn reply(state: &WebhookState, outbound: &OutboundMessage) -> Response {
    render(state.channel.as_ref(), outbound)
}

fn render(channel: &dyn ReplyChannel, outbound: &OutboundMessage) -> Response {
    let rendered = channel.render(outbound);
    (StatusCode::OK, [(header::CONTENT_TYPE, rendered.content_type)], rendered.body).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use tower::ServiceExt;

    use vaxline_core::config::AppConfig;
    use vaxline_core::conversation::APOLOGY_TEXT;
    use vaxline_core::domain::intent::{IntentResult, ParamValue};
    use vaxline_core::domain::knowledge::KnowledgeEntry;
    use vaxline_core::domain::message::SenderId;
    use vaxline_core::errors::ResolverError;
    use vaxline_core::fulfillment::REMINDER_CONFIRMATION_TEXT;
    use vaxline_core::ports::IntentResolver;
    use vaxline_db::repositories::{KnowledgeRepository, ReminderRepository};
    use vaxline_db::{DbPool, SqlKnowledgeRepository, SqlReminderRepository};
    use vaxline_sms::TwimlReplyChannel;

    use super::{router, WebhookState};
    use crate::bootstrap::assemble;
    use crate::testing::ScriptedResolver;

    async fn app(resolver: Arc<dyn IntentResolver>) -> (Router, DbPool) {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        config.database.max_connections = 1;
        let application = assemble(config, resolver).await.expect("assemble application");

        let state = WebhookState {
            conversation: application.conversation.clone(),
            channel: Arc::new(TwimlReplyChannel),
        };
        (router("/sms", state), application.db_pool)
    }

    async fn post_form(app: Router, body: &str) -> (StatusCode, String, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sms")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, content_type, String::from_utf8(bytes.to_vec()).expect("utf8 body"))
    }

    #[tokio::test]
    async fn health_topic_question_is_answered_from_the_knowledge_base() {
        let resolver = Arc::new(ScriptedResolver::default_text("Sorry?").on(
            "Tell me about measles",
            IntentResult::new("query_health_database", "Which disease?")
                .with_parameter("health_topic", ParamValue::text("Measles")),
        ));
        let (app, pool) = app(resolver.clone()).await;
        SqlKnowledgeRepository::new(pool.clone())
            .save(KnowledgeEntry::new("kb-measles", ["measles", "mmr"], "Measles info & advice"))
            .await
            .expect("seed entry");

        let (status, content_type, body) = post_form(
            app,
            "Body=Tell+me+about+measles&From=%2B15551234567&MessageSid=SM123&NumMedia=0",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/xml");
        assert!(body.contains("<Message>Measles info &amp; advice</Message>"), "body: {body}");
        assert_eq!(resolver.sessions(), vec![SenderId("+15551234567".to_string())]);
    }

    #[tokio::test]
    async fn reminder_subscription_is_stored_and_confirmed() {
        let resolver = Arc::new(ScriptedResolver::default_text("Sorry?").on(
            "remind me",
            IntentResult::new("subscribe_vaccination_reminder", "When was your child born?")
                .with_parameter("child-dob", ParamValue::text("2020-01-01T12:00:00-05:00")),
        ));
        let (app, pool) = app(resolver).await;

        let (status, _, body) = post_form(app, "Body=remind+me&From=%2B15550001111").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(REMINDER_CONFIRMATION_TEXT));
        let stored = SqlReminderRepository::new(pool)
            .find_by_subscriber(&SenderId("+15550001111".to_string()))
            .await
            .expect("lookup")
            .expect("subscription stored");
        assert_eq!(stored.child_birth_date.to_string(), "2020-01-01");
    }

    #[tokio::test]
    async fn resolver_failure_still_returns_one_apology_message() {
        let resolver = Arc::new(ScriptedResolver::failing(ResolverError::network("reset")));
        let (app, _pool) = app(resolver).await;

        let (status, content_type, body) =
            post_form(app, "Body=hello&From=%2B15551234567").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/xml");
        assert_eq!(body.matches("<Message>").count(), 1);
        assert!(body.contains("trouble right now"));
    }

    #[tokio::test]
    async fn blank_sender_gets_apology_without_calling_resolver() {
        let resolver = Arc::new(ScriptedResolver::default_text("Hello!"));
        let (app, _pool) = app(resolver.clone()).await;

        let (status, _, body) = post_form(app, "Body=hello&From=").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(&APOLOGY_TEXT.replace('\'', "&apos;")));
        assert!(resolver.sessions().is_empty());
    }

    #[tokio::test]
    async fn punctuation_only_sender_gets_apology_without_calling_resolver() {
        let resolver = Arc::new(ScriptedResolver::default_text("Hello!"));
        let (app, _pool) = app(resolver.clone()).await;

        let (status, _, body) = post_form(app, "Body=hello&From=%2B%2B%2B").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(&APOLOGY_TEXT.replace('\'', "&apos;")));
        assert!(resolver.sessions().is_empty());
    }

    #[tokio::test]
    async fn panicking_pipeline_still_answers_with_apology() {
        let resolver = Arc::new(ScriptedResolver::panicking());
        let (app, _pool) = app(resolver.clone()).await;

        let (status, content_type, body) = post_form(app, "Body=hello&From=%2B15551234567").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/xml");
        assert_eq!(body.matches("<Message>").count(), 1);
        assert!(body.contains(&APOLOGY_TEXT.replace('\'', "&apos;")));
    }

    #[tokio::test]
    async fn undecodable_body_gets_apology_with_ok_status() {
        let resolver = Arc::new(ScriptedResolver::default_text("Hello!"));
        let (app, _pool) = app(resolver.clone()).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sms")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"Body\":\"hi\"}"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert!(String::from_utf8_lossy(&bytes).contains("trouble right now"));
        assert!(resolver.sessions().is_empty());
    }

    #[tokio::test]
    async fn empty_body_is_passed_to_the_resolver() {
        let resolver = Arc::new(ScriptedResolver::default_text("How can I help?"));
        let (app, _pool) = app(resolver.clone()).await;

        let (_, _, body) = post_form(app, "Body=&From=%2B15551234567").await;

        assert!(body.contains("<Message>How can I help?</Message>"));
        assert_eq!(resolver.sessions().len(), 1);
    }
}
