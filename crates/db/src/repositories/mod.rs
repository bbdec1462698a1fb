use async_trait::async_trait;
use thiserror::Error;

use vaxline_core::domain::knowledge::{KnowledgeEntry, KnowledgeEntryId};
use vaxline_core::domain::message::SenderId;
use vaxline_core::domain::reminder::ReminderSubscription;
use vaxline_core::errors::StoreError;

pub mod knowledge;
pub mod memory;
pub mod reminder;

pub use knowledge::SqlKnowledgeRepository;
pub use memory::{InMemoryKnowledgeRepository, InMemoryReminderRepository};
pub use reminder::SqlReminderRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(source) => StoreError::unavailable(source.to_string()),
            RepositoryError::Decode(message) => StoreError::decode(message),
        }
    }
}

/// Administrative access to the knowledge base (seeding, inspection).
///
/// The fulfillment path only needs `KnowledgeStore::find_by_tag`.
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &KnowledgeEntryId,
    ) -> Result<Option<KnowledgeEntry>, RepositoryError>;
    /// Every entry tagged with `tag`, oldest first.
    async fn find_all_by_tag(&self, tag: &str) -> Result<Vec<KnowledgeEntry>, RepositoryError>;
    async fn save(&self, entry: KnowledgeEntry) -> Result<(), RepositoryError>;
    async fn count(&self) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait ReminderRepository: Send + Sync {
    async fn find_by_subscriber(
        &self,
        subscriber_id: &SenderId,
    ) -> Result<Option<ReminderSubscription>, RepositoryError>;
    async fn save(&self, subscription: ReminderSubscription) -> Result<(), RepositoryError>;
    async fn count(&self) -> Result<u64, RepositoryError>;
}

/// Picks the first of possibly several tagged entries, warning when the
/// choice was not unique.
pub(crate) fn first_match(tag: &str, matches: Vec<KnowledgeEntry>) -> Option<KnowledgeEntry> {
    if matches.len() > 1 {
        tracing::warn!(
            event_name = "knowledge.lookup.ambiguous",
            tag,
            match_count = matches.len(),
            chosen_id = %matches[0].id.0,
            "several knowledge entries share this tag; using the first"
        );
    }
    matches.into_iter().next()
}
