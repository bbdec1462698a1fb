//! One inbound message in, exactly one outbound message out.
//!
//! `ConversationService::respond` is the only place where resolver and store
//! failures are caught. They are logged and counted under separate labels and
//! replaced by a fixed apology, so the transport layer always has a reply.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::domain::message::{InboundMessage, OutboundMessage};
use crate::errors::{FulfillmentError, ResolverError};
use crate::fulfillment::{Fulfillment, FulfillmentRouter};
use crate::ports::IntentResolver;

pub const APOLOGY_TEXT: &str = "Sorry, I'm having trouble right now. Please try again later.";
pub const DEFAULT_RESOLVER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct ConversationCounters {
    handled: AtomicU64,
    routed: AtomicU64,
    resolver_failures: AtomicU64,
    store_failures: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversationStats {
    pub handled: u64,
    pub routed: u64,
    pub resolver_failures: u64,
    pub store_failures: u64,
}

pub struct ConversationService {
    resolver: Arc<dyn IntentResolver>,
    router: FulfillmentRouter,
    resolver_timeout: Duration,
    counters: ConversationCounters,
}

impl ConversationService {
    pub fn new(resolver: Arc<dyn IntentResolver>, router: FulfillmentRouter) -> Self {
        Self {
            resolver,
            router,
            resolver_timeout: DEFAULT_RESOLVER_TIMEOUT,
            counters: ConversationCounters::default(),
        }
    }

    pub fn with_resolver_timeout(mut self, resolver_timeout: Duration) -> Self {
        self.resolver_timeout = resolver_timeout;
        self
    }

    /// Resolves and routes `message`, surfacing failures to the caller.
    pub async fn fulfill(&self, message: &InboundMessage) -> Result<Fulfillment, FulfillmentError> {
        let resolution = tokio::time::timeout(
            self.resolver_timeout,
            self.resolver.resolve(&message.sender_id, &message.text),
        )
        .await;
        let intent = match resolution {
            Ok(result) => result?,
            Err(_) => {
                return Err(ResolverError::timeout(format!(
                    "no answer within {}ms",
                    self.resolver_timeout.as_millis()
                ))
                .into())
            }
        };

        debug!(
            event_name = "fulfillment.intent.resolved",
            intent = %intent.intent_name,
            parameter_count = intent.parameters.len(),
            "intent resolved"
        );

        Ok(self.router.route(&intent, &message.sender_id).await?)
    }

    /// Always produces a reply: the routed text, or the apology on any failure.
    pub async fn respond(&self, message: &InboundMessage, correlation_id: &str) -> OutboundMessage {
        self.counters.handled.fetch_add(1, Ordering::Relaxed);

        match self.fulfill(message).await {
            Ok(fulfillment) => {
                self.counters.routed.fetch_add(1, Ordering::Relaxed);
                info!(
                    event_name = "fulfillment.routed",
                    correlation_id,
                    sender_id = %message.sender_id,
                    side_effect = fulfillment.side_effect.as_ref().map(|effect| effect.label()).unwrap_or("none"),
                    "message fulfilled"
                );
                fulfillment.message
            }
            Err(failure) => {
                let counter = match failure {
                    FulfillmentError::Resolver(_) => &self.counters.resolver_failures,
                    FulfillmentError::Store(_) => &self.counters.store_failures,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                error!(
                    event_name = "fulfillment.failed",
                    correlation_id,
                    sender_id = %message.sender_id,
                    failure_kind = failure.kind(),
                    failure_detail = failure.detail(),
                    error = %failure,
                    "fulfillment failed; replying with apology"
                );
                OutboundMessage::new(APOLOGY_TEXT)
            }
        }
    }

    pub fn stats(&self) -> ConversationStats {
        ConversationStats {
            handled: self.counters.handled.load(Ordering::Relaxed),
            routed: self.counters.routed.load(Ordering::Relaxed),
            resolver_failures: self.counters.resolver_failures.load(Ordering::Relaxed),
            store_failures: self.counters.store_failures.load(Ordering::Relaxed),
        }
    }
}
