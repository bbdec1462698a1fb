use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use vaxline_core::domain::knowledge::{normalize_tag, KnowledgeEntry, KnowledgeEntryId};
use vaxline_core::domain::message::SenderId;
use vaxline_core::domain::reminder::ReminderSubscription;
use vaxline_core::errors::StoreError;
use vaxline_core::ports::{KnowledgeStore, ReminderStore};

use super::{first_match, KnowledgeRepository, ReminderRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryKnowledgeRepository {
    entries: RwLock<BTreeMap<String, KnowledgeEntry>>,
}

impl InMemoryKnowledgeRepository {
    pub fn with_entries(entries: impl IntoIterator<Item = KnowledgeEntry>) -> Self {
        let entries = entries.into_iter().map(|entry| (entry.id.0.clone(), entry)).collect();
        Self { entries: RwLock::new(entries) }
    }
}

#[async_trait::async_trait]
impl KnowledgeRepository for InMemoryKnowledgeRepository {
    async fn find_by_id(
        &self,
        id: &KnowledgeEntryId,
    ) -> Result<Option<KnowledgeEntry>, RepositoryError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&id.0).cloned())
    }

    async fn find_all_by_tag(&self, tag: &str) -> Result<Vec<KnowledgeEntry>, RepositoryError> {
        let tag = normalize_tag(tag);
        let entries = self.entries.read().await;
        Ok(entries.values().filter(|entry| entry.keywords.contains(&tag)).cloned().collect())
    }

    async fn save(&self, entry: KnowledgeEntry) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.id.0.clone(), entry);
        Ok(())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.entries.read().await.len() as u64)
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for InMemoryKnowledgeRepository {
    async fn find_by_tag(&self, tag: &str) -> Result<Option<KnowledgeEntry>, StoreError> {
        let matches = self.find_all_by_tag(tag).await?;
        Ok(first_match(tag, matches))
    }
}

#[derive(Default)]
pub struct InMemoryReminderRepository {
    subscriptions: RwLock<HashMap<String, ReminderSubscription>>,
}

#[async_trait::async_trait]
impl ReminderRepository for InMemoryReminderRepository {
    async fn find_by_subscriber(
        &self,
        subscriber_id: &SenderId,
    ) -> Result<Option<ReminderSubscription>, RepositoryError> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions.get(subscriber_id.as_str()).cloned())
    }

    async fn save(&self, subscription: ReminderSubscription) -> Result<(), RepositoryError> {
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.insert(subscription.subscriber_id.0.clone(), subscription);
        Ok(())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.subscriptions.read().await.len() as u64)
    }
}

#[async_trait::async_trait]
impl ReminderStore for InMemoryReminderRepository {
    async fn upsert(&self, subscription: ReminderSubscription) -> Result<(), StoreError> {
        Ok(ReminderRepository::save(self, subscription).await?)
    }
}
