use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use vaxline_core::domain::message::SenderId;
use vaxline_core::domain::reminder::ReminderSubscription;
use vaxline_core::errors::StoreError;
use vaxline_core::ports::ReminderStore;

use super::{ReminderRepository, RepositoryError};
use crate::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqlReminderRepository {
    pool: DbPool,
}

impl SqlReminderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_subscription(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ReminderSubscription, RepositoryError> {
    let subscriber_id: String =
        row.try_get("subscriber_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let child_dob: String =
        row.try_get("child_dob").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let subscribed_on: String =
        row.try_get("subscribed_on").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let child_birth_date = NaiveDate::parse_from_str(&child_dob, DATE_FORMAT)
        .map_err(|e| RepositoryError::Decode(format!("invalid child_dob `{child_dob}`: {e}")))?;
    let subscribed_at = DateTime::parse_from_rfc3339(&subscribed_on)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            RepositoryError::Decode(format!("invalid subscribed_on `{subscribed_on}`: {e}"))
        })?;

    Ok(ReminderSubscription {
        subscriber_id: SenderId(subscriber_id),
        child_birth_date,
        subscribed_at,
    })
}

#[async_trait::async_trait]
impl ReminderRepository for SqlReminderRepository {
    async fn find_by_subscriber(
        &self,
        subscriber_id: &SenderId,
    ) -> Result<Option<ReminderSubscription>, RepositoryError> {
        let row = sqlx::query(
            "SELECT subscriber_id, child_dob, subscribed_on FROM reminders WHERE subscriber_id = ?",
        )
        .bind(subscriber_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_subscription(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, subscription: ReminderSubscription) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO reminders (subscriber_id, child_dob, subscribed_on)
             VALUES (?, ?, ?)
             ON CONFLICT(subscriber_id) DO UPDATE SET
                 child_dob = excluded.child_dob,
                 subscribed_on = excluded.subscribed_on",
        )
        .bind(subscription.subscriber_id.as_str())
        .bind(subscription.child_birth_date.format(DATE_FORMAT).to_string())
        .bind(subscription.subscribed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM reminders")
            .fetch_one(&self.pool)
            .await?
            .try_get("count")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait::async_trait]
impl ReminderStore for SqlReminderRepository {
    async fn upsert(&self, subscription: ReminderSubscription) -> Result<(), StoreError> {
        Ok(ReminderRepository::save(self, subscription).await?)
    }
}
