//! Intent routing and fulfillment.
//!
//! The router is an open registry keyed by intent label. Each handler decides
//! whether its intent is fully specified, performs at most one store call and
//! picks the reply text. Labels without a handler, and handlers whose required
//! parameter is missing, answer with the NLU default text.

pub mod health_topic;
pub mod vaccination_reminder;

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::intent::IntentResult;
use crate::domain::message::{OutboundMessage, SenderId};
use crate::errors::StoreError;
use crate::ports::{KnowledgeStore, ReminderStore};

pub use health_topic::{HealthTopicQueryHandler, HEALTH_TOPIC_PARAM, QUERY_HEALTH_DATABASE};
pub use vaccination_reminder::{
    ReminderSubscriptionHandler, CHILD_DOB_PARAM, REMINDER_CONFIRMATION_TEXT,
    SUBSCRIBE_VACCINATION_REMINDER,
};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// The single store interaction a routed message caused, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SideEffect {
    KnowledgeLookup { tag: String, matched: bool },
    ReminderUpserted { subscriber_id: SenderId },
}

impl SideEffect {
    pub fn label(&self) -> &'static str {
        match self {
            Self::KnowledgeLookup { .. } => "knowledge_lookup",
            Self::ReminderUpserted { .. } => "reminder_upserted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fulfillment {
    pub message: OutboundMessage,
    pub side_effect: Option<SideEffect>,
}

impl Fulfillment {
    pub fn reply(text: impl Into<String>, side_effect: SideEffect) -> Self {
        Self { message: OutboundMessage::new(text), side_effect: Some(side_effect) }
    }

    /// NLU default text verbatim, no store call.
    pub fn default_text(intent: &IntentResult) -> Self {
        Self { message: OutboundMessage::new(intent.default_text.clone()), side_effect: None }
    }
}

#[derive(Clone, Debug)]
pub struct FulfillmentContext {
    pub subscriber_id: SenderId,
    pub received_at: DateTime<Utc>,
    pub store_timeout: Duration,
}

impl FulfillmentContext {
    /// Runs one store call under the configured deadline.
    pub async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::timeout(format!(
                "{operation} did not complete within {}ms",
                self.store_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
pub trait IntentHandler: Send + Sync {
    /// Intent label this handler is registered under (exact match).
    fn intent_name(&self) -> &'static str;

    async fn fulfill(
        &self,
        intent: &IntentResult,
        ctx: &FulfillmentContext,
    ) -> Result<Fulfillment, StoreError>;
}

pub struct FulfillmentRouter {
    handlers: HashMap<&'static str, Arc<dyn IntentHandler>>,
    store_timeout: Duration,
}

impl Default for FulfillmentRouter {
    fn default() -> Self {
        Self { handlers: HashMap::new(), store_timeout: DEFAULT_STORE_TIMEOUT }
    }
}

impl FulfillmentRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Registers `handler` under its intent label, replacing any previous one.
    pub fn register<H>(&mut self, handler: H)
    where
        H: IntentHandler + 'static,
    {
        self.handlers.insert(handler.intent_name(), Arc::new(handler));
    }

    pub fn handles(&self, intent_name: &str) -> bool {
        self.handlers.contains_key(intent_name)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub async fn route(
        &self,
        intent: &IntentResult,
        subscriber_id: &SenderId,
    ) -> Result<Fulfillment, StoreError> {
        let Some(handler) = self.handlers.get(intent.intent_name.as_str()) else {
            debug!(
                event_name = "fulfillment.intent.unrecognized",
                intent = %intent.intent_name,
                "no handler registered; using default fulfillment text"
            );
            return Ok(Fulfillment::default_text(intent));
        };

        let ctx = FulfillmentContext {
            subscriber_id: subscriber_id.clone(),
            received_at: Utc::now(),
            store_timeout: self.store_timeout,
        };
        handler.fulfill(intent, &ctx).await
    }
}

/// Router with the health-topic and reminder intents wired to the given stores.
pub fn default_router(
    knowledge: Arc<dyn KnowledgeStore>,
    reminders: Arc<dyn ReminderStore>,
) -> FulfillmentRouter {
    let mut router = FulfillmentRouter::new();
    router.register(HealthTopicQueryHandler::new(knowledge));
    router.register(ReminderSubscriptionHandler::new(reminders));
    router
}
