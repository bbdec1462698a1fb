use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Fulfillment, FulfillmentContext, IntentHandler, SideEffect};
use crate::domain::intent::IntentResult;
use crate::domain::reminder::ReminderSubscription;
use crate::errors::StoreError;
use crate::ports::ReminderStore;

pub const SUBSCRIBE_VACCINATION_REMINDER: &str = "subscribe_vaccination_reminder";
pub const CHILD_DOB_PARAM: &str = "child-dob";
pub const REMINDER_CONFIRMATION_TEXT: &str =
    "Thank you! You are now subscribed to vaccination reminders.";

/// Registers the sender for vaccination reminders keyed by the child's birth date.
pub struct ReminderSubscriptionHandler {
    reminders: Arc<dyn ReminderStore>,
}

impl ReminderSubscriptionHandler {
    pub fn new(reminders: Arc<dyn ReminderStore>) -> Self {
        Self { reminders }
    }
}

#[async_trait]
impl IntentHandler for ReminderSubscriptionHandler {
    fn intent_name(&self) -> &'static str {
        SUBSCRIBE_VACCINATION_REMINDER
    }

    async fn fulfill(
        &self,
        intent: &IntentResult,
        ctx: &FulfillmentContext,
    ) -> Result<Fulfillment, StoreError> {
        let Some(raw) = intent.parameter(CHILD_DOB_PARAM) else {
            debug!(
                event_name = "fulfillment.intent.underspecified",
                intent = SUBSCRIBE_VACCINATION_REMINDER,
                parameter = CHILD_DOB_PARAM,
                "birth date missing; using default fulfillment text"
            );
            return Ok(Fulfillment::default_text(intent));
        };

        let Some(child_birth_date) = raw.as_date() else {
            warn!(
                event_name = "fulfillment.intent.unparseable_parameter",
                intent = SUBSCRIBE_VACCINATION_REMINDER,
                parameter = CHILD_DOB_PARAM,
                value = ?raw,
                "birth date is not a calendar date; using default fulfillment text"
            );
            return Ok(Fulfillment::default_text(intent));
        };

        let subscription = ReminderSubscription {
            subscriber_id: ctx.subscriber_id.clone(),
            child_birth_date,
            subscribed_at: ctx.received_at,
        };
        ctx.bounded("reminder upsert", self.reminders.upsert(subscription)).await?;

        Ok(Fulfillment::reply(
            REMINDER_CONFIRMATION_TEXT,
            SideEffect::ReminderUpserted { subscriber_id: ctx.subscriber_id.clone() },
        ))
    }
}
