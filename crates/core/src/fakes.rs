use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::intent::IntentResult;
use crate::domain::knowledge::KnowledgeEntry;
use crate::domain::message::SenderId;
use crate::domain::reminder::ReminderSubscription;
use crate::errors::{ResolverError, StoreError};
use crate::ports::{IntentResolver, KnowledgeStore, ReminderStore};

#[derive(Default)]
pub struct FakeKnowledgeStore {
    entries: Vec<KnowledgeEntry>,
    fail: bool,
    delay: Option<Duration>,
    lookups: AtomicUsize,
    last_tag: Mutex<Option<String>>,
}

impl FakeKnowledgeStore {
    pub fn with_entry<const N: usize>(id: &str, keywords: [&str; N], response_text: &str) -> Self {
        Self {
            entries: vec![KnowledgeEntry::new(id, keywords, response_text)],
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn last_tag(&self) -> Option<String> {
        self.last_tag.lock().expect("last_tag lock").clone()
    }
}

#[async_trait]
impl KnowledgeStore for FakeKnowledgeStore {
    async fn find_by_tag(&self, tag: &str) -> Result<Option<KnowledgeEntry>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        *self.last_tag.lock().expect("last_tag lock") = Some(tag.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(StoreError::unavailable("fake knowledge store is down"));
        }
        Ok(self.entries.iter().find(|entry| entry.keywords.contains(tag)).cloned())
    }
}

#[derive(Default)]
pub struct FakeReminderStore {
    fail: bool,
    records: Mutex<HashMap<SenderId, ReminderSubscription>>,
    writes: AtomicUsize,
}

impl FakeReminderStore {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("records lock").len()
    }

    pub fn get(&self, subscriber_id: &SenderId) -> Option<ReminderSubscription> {
        self.records.lock().expect("records lock").get(subscriber_id).cloned()
    }
}

#[async_trait]
impl ReminderStore for FakeReminderStore {
    async fn upsert(&self, subscription: ReminderSubscription) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::unavailable("fake reminder store is down"));
        }
        self.records
            .lock()
            .expect("records lock")
            .insert(subscription.subscriber_id.clone(), subscription);
        Ok(())
    }
}

pub struct FakeResolver {
    outcome: Result<IntentResult, ResolverError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_session: Mutex<Option<SenderId>>,
}

impl FakeResolver {
    pub fn answering(intent: IntentResult) -> Self {
        Self {
            outcome: Ok(intent),
            delay: None,
            calls: AtomicUsize::new(0),
            last_session: Mutex::new(None),
        }
    }

    pub fn failing(error: ResolverError) -> Self {
        Self { outcome: Err(error), ..Self::answering(IntentResult::default()) }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_session(&self) -> Option<SenderId> {
        self.last_session.lock().expect("session lock").clone()
    }
}

#[async_trait]
impl IntentResolver for FakeResolver {
    async fn resolve(&self, session: &SenderId, _text: &str) -> Result<IntentResult, ResolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_session.lock().expect("session lock") = Some(session.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}
