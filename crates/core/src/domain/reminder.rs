use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::message::SenderId;

/// Vaccination reminder registration, one per sender. A newer subscription
/// replaces the previous one entirely.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSubscription {
    pub subscriber_id: SenderId,
    pub child_birth_date: NaiveDate,
    pub subscribed_at: DateTime<Utc>,
}
