use chrono::{NaiveDate, TimeZone, Utc};

use vaxline_core::domain::knowledge::KnowledgeEntry;
use vaxline_core::domain::message::SenderId;
use vaxline_core::domain::reminder::ReminderSubscription;
use vaxline_core::ports::{KnowledgeStore, ReminderStore};
use vaxline_db::repositories::{KnowledgeRepository, ReminderRepository};
use vaxline_db::{
    connect_with_settings, migrations, DbPool, InMemoryKnowledgeRepository,
    InMemoryReminderRepository, KnowledgeBaseSeed, SqlKnowledgeRepository, SqlReminderRepository,
};

type ContractResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

async fn sqlite_pool() -> ContractResult<DbPool> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| format!("connect: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrate: {error}"))?;
    Ok(pool)
}

/// Both knowledge stores must agree on lookup semantics.
async fn check_knowledge_store<S>(store: &S) -> ContractResult
where
    S: KnowledgeStore + KnowledgeRepository,
{
    for entry in KnowledgeBaseSeed::entries() {
        store.save(entry).await.map_err(|error| format!("save: {error}"))?;
    }

    let measles = store
        .find_by_tag("measles")
        .await
        .map_err(|error| format!("lookup: {error}"))?
        .ok_or_else(|| "measles should be seeded".to_string())?;
    require_eq!(measles.id.0.as_str(), "kb-measles");

    let multi_word = store
        .find_by_tag("whooping cough")
        .await
        .map_err(|error| format!("lookup: {error}"))?;
    require!(multi_word.is_some(), "multi-word keywords are matched whole");

    let missing = store.find_by_tag("ebola").await.map_err(|error| format!("lookup: {error}"))?;
    require!(missing.is_none(), "unknown tag must be absent, not an error");

    let partial = store.find_by_tag("measle").await.map_err(|error| format!("lookup: {error}"))?;
    require!(partial.is_none(), "tags match whole keywords only");

    store
        .save(KnowledgeEntry::new("kb-extra", ["measles"], "second measles entry"))
        .await
        .map_err(|error| format!("save: {error}"))?;
    let ambiguous = store
        .find_by_tag("measles")
        .await
        .map_err(|error| format!("lookup: {error}"))?
        .ok_or_else(|| "ambiguous tag should still match".to_string())?;
    require!(
        ambiguous.id.0 == "kb-measles" || ambiguous.id.0 == "kb-extra",
        "ambiguous lookup returned an unrelated entry: {}",
        ambiguous.id.0
    );
    Ok(())
}

async fn check_reminder_store<S>(store: &S) -> ContractResult
where
    S: ReminderStore + ReminderRepository,
{
    let sender = SenderId("+15551234567".to_string());
    let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).single().ok_or("timestamp")?;
    let later = Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).single().ok_or("timestamp")?;

    for (dob, subscribed_at) in [((2020, 1, 1), earlier), ((2020, 5, 5), later)] {
        let child_birth_date =
            NaiveDate::from_ymd_opt(dob.0, dob.1, dob.2).ok_or_else(|| "date".to_string())?;
        store
            .upsert(ReminderSubscription {
                subscriber_id: sender.clone(),
                child_birth_date,
                subscribed_at,
            })
            .await
            .map_err(|error| format!("upsert: {error}"))?;
    }

    require_eq!(ReminderRepository::count(store).await.map_err(|error| error.to_string())?, 1);
    let stored = store
        .find_by_subscriber(&sender)
        .await
        .map_err(|error| error.to_string())?
        .ok_or_else(|| "subscription should exist".to_string())?;
    require_eq!(stored.subscribed_at, later);
    require_eq!(stored.child_birth_date, NaiveDate::from_ymd_opt(2020, 5, 5).ok_or("date")?);
    Ok(())
}

#[tokio::test]
async fn sqlite_knowledge_store_meets_contract() -> ContractResult {
    let pool = sqlite_pool().await?;
    check_knowledge_store(&SqlKnowledgeRepository::new(pool)).await
}

#[tokio::test]
async fn in_memory_knowledge_store_meets_contract() -> ContractResult {
    check_knowledge_store(&InMemoryKnowledgeRepository::default()).await
}

#[tokio::test]
async fn sqlite_reminder_store_meets_contract() -> ContractResult {
    let pool = sqlite_pool().await?;
    check_reminder_store(&SqlReminderRepository::new(pool)).await
}

#[tokio::test]
async fn in_memory_reminder_store_meets_contract() -> ContractResult {
    check_reminder_store(&InMemoryReminderRepository::default()).await
}
