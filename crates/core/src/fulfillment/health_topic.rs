use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Fulfillment, FulfillmentContext, IntentHandler, SideEffect};
use crate::domain::intent::IntentResult;
use crate::domain::knowledge::normalize_tag;
use crate::errors::StoreError;
use crate::ports::KnowledgeStore;

pub const QUERY_HEALTH_DATABASE: &str = "query_health_database";
pub const HEALTH_TOPIC_PARAM: &str = "health_topic";

/// Answers "tell me about X" from the knowledge base.
pub struct HealthTopicQueryHandler {
    knowledge: Arc<dyn KnowledgeStore>,
}

impl HealthTopicQueryHandler {
    pub fn new(knowledge: Arc<dyn KnowledgeStore>) -> Self {
        Self { knowledge }
    }
}

pub fn unknown_topic_text(topic: &str) -> String {
    format!("Sorry, I don't have information about {topic} yet.")
}

#[async_trait]
impl IntentHandler for HealthTopicQueryHandler {
    fn intent_name(&self) -> &'static str {
        QUERY_HEALTH_DATABASE
    }

    async fn fulfill(
        &self,
        intent: &IntentResult,
        ctx: &FulfillmentContext,
    ) -> Result<Fulfillment, StoreError> {
        let Some(topic) = intent.text_parameter(HEALTH_TOPIC_PARAM) else {
            debug!(
                event_name = "fulfillment.intent.underspecified",
                intent = QUERY_HEALTH_DATABASE,
                parameter = HEALTH_TOPIC_PARAM,
                "health topic missing; using default fulfillment text"
            );
            return Ok(Fulfillment::default_text(intent));
        };

        let tag = normalize_tag(topic);
        let entry = ctx.bounded("knowledge lookup", self.knowledge.find_by_tag(&tag)).await?;

        Ok(match entry {
            Some(entry) => Fulfillment::reply(
                entry.response_text,
                SideEffect::KnowledgeLookup { tag, matched: true },
            ),
            None => Fulfillment::reply(
                unknown_topic_text(topic.trim()),
                SideEffect::KnowledgeLookup { tag, matched: false },
            ),
        })
    }
}
