//! Collaborator boundaries the fulfillment core talks to.
//!
//! Implementations live in `vaxline-nlu` (intent resolution) and `vaxline-db`
//! (knowledge base and reminders); tests use in-memory fakes.

use async_trait::async_trait;

use crate::domain::intent::IntentResult;
use crate::domain::knowledge::KnowledgeEntry;
use crate::domain::message::SenderId;
use crate::domain::reminder::ReminderSubscription;
use crate::errors::{ResolverError, StoreError};

#[async_trait]
pub trait IntentResolver: Send + Sync {
    /// Classifies `text` within the conversation scoped by `session`.
    async fn resolve(&self, session: &SenderId, text: &str) -> Result<IntentResult, ResolverError>;
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Some entry whose keywords contain `tag` (already lower-cased).
    ///
    /// When several entries share the tag, which one is returned is up to the
    /// store; callers must not rely on a particular tie-break.
    async fn find_by_tag(&self, tag: &str) -> Result<Option<KnowledgeEntry>, StoreError>;
}

#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Inserts or fully overwrites the subscription keyed by its subscriber.
    async fn upsert(&self, subscription: ReminderSubscription) -> Result<(), StoreError>;
}
