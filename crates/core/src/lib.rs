pub mod config;
pub mod conversation;
pub mod domain;
pub mod errors;
pub mod fulfillment;
pub mod ports;

#[cfg(test)]
mod fakes;

pub use conversation::{ConversationService, ConversationStats, APOLOGY_TEXT};
pub use domain::intent::{IntentResult, ParamValue};
pub use domain::knowledge::{KnowledgeEntry, KnowledgeEntryId};
pub use domain::message::{InboundMessage, OutboundMessage, SenderId};
pub use domain::reminder::ReminderSubscription;
pub use errors::{FulfillmentError, ResolverError, ResolverErrorKind, StoreError, StoreErrorKind};
pub use fulfillment::{default_router, Fulfillment, FulfillmentRouter, IntentHandler, SideEffect};
pub use ports::{IntentResolver, KnowledgeStore, ReminderStore};
