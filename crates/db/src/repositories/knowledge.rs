use chrono::Utc;
use sqlx::Row;

use vaxline_core::domain::knowledge::{normalize_tag, KnowledgeEntry, KnowledgeEntryId};
use vaxline_core::errors::StoreError;
use vaxline_core::ports::KnowledgeStore;

use super::{first_match, KnowledgeRepository, RepositoryError};
use crate::DbPool;

const SELECT_BY_TAG: &str = "SELECT id, keywords, response_text
     FROM knowledge_entry
     WHERE EXISTS (SELECT 1 FROM json_each(knowledge_entry.keywords) WHERE json_each.value = ?)
     ORDER BY created_at ASC, id ASC
     LIMIT ?";

pub struct SqlKnowledgeRepository {
    pool: DbPool,
}

impl SqlKnowledgeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn tagged(&self, tag: &str, limit: i64) -> Result<Vec<KnowledgeEntry>, RepositoryError> {
        let rows = sqlx::query(SELECT_BY_TAG)
            .bind(normalize_tag(tag))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_entry).collect()
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<KnowledgeEntry, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let keywords_json: String =
        row.try_get("keywords").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let response_text: String =
        row.try_get("response_text").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let keywords: Vec<String> = serde_json::from_str(&keywords_json).map_err(|e| {
        RepositoryError::Decode(format!("knowledge entry `{id}` has malformed keywords: {e}"))
    })?;

    Ok(KnowledgeEntry::new(id, keywords, response_text))
}

#[async_trait::async_trait]
impl KnowledgeRepository for SqlKnowledgeRepository {
    async fn find_by_id(
        &self,
        id: &KnowledgeEntryId,
    ) -> Result<Option<KnowledgeEntry>, RepositoryError> {
        let row = sqlx::query("SELECT id, keywords, response_text FROM knowledge_entry WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_entry(r)?)),
            None => Ok(None),
        }
    }

    async fn find_all_by_tag(&self, tag: &str) -> Result<Vec<KnowledgeEntry>, RepositoryError> {
        self.tagged(tag, -1).await
    }

    async fn save(&self, entry: KnowledgeEntry) -> Result<(), RepositoryError> {
        let keywords = serde_json::to_string(&entry.keywords)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO knowledge_entry (id, keywords, response_text, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 keywords = excluded.keywords,
                 response_text = excluded.response_text",
        )
        .bind(&entry.id.0)
        .bind(keywords)
        .bind(&entry.response_text)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM knowledge_entry")
            .fetch_one(&self.pool)
            .await?
            .try_get("count")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for SqlKnowledgeRepository {
    async fn find_by_tag(&self, tag: &str) -> Result<Option<KnowledgeEntry>, StoreError> {
        // Two rows are enough to tell a unique match from an ambiguous one.
        let matches = self.tagged(tag, 2).await?;
        Ok(first_match(tag, matches))
    }
}

#[cfg(test)]
mod tests {
    use vaxline_core::domain::knowledge::{KnowledgeEntry, KnowledgeEntryId};
    use vaxline_core::errors::StoreErrorKind;
    use vaxline_core::ports::KnowledgeStore;

    use super::SqlKnowledgeRepository;
    use crate::repositories::KnowledgeRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn find_by_tag_matches_any_keyword() {
        let repo = SqlKnowledgeRepository::new(setup().await);
        repo.save(KnowledgeEntry::new(
            "kb-measles",
            ["measles", "rubeola"],
            "Measles is a highly contagious virus.",
        ))
        .await
        .expect("save");

        let by_first = repo.find_by_tag("measles").await.expect("lookup").expect("entry");
        let by_second = repo.find_by_tag("rubeola").await.expect("lookup").expect("entry");

        assert_eq!(by_first.id, KnowledgeEntryId("kb-measles".to_string()));
        assert_eq!(by_second.response_text, "Measles is a highly contagious virus.");
    }

    #[tokio::test]
    async fn find_by_tag_is_exact_not_substring() {
        let repo = SqlKnowledgeRepository::new(setup().await);
        repo.save(KnowledgeEntry::new("kb-polio", ["polio"], "Polio info.")).await.expect("save");

        assert!(repo.find_by_tag("pol").await.expect("lookup").is_none());
        assert!(repo.find_by_tag("poliovirus").await.expect("lookup").is_none());
        assert!(repo.find_by_tag("polio").await.expect("lookup").is_some());
    }

    #[tokio::test]
    async fn unknown_tag_is_absent_not_an_error() {
        let repo = SqlKnowledgeRepository::new(setup().await);

        let result = repo.find_by_tag("ebola").await.expect("lookup should succeed");

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn ambiguous_tag_returns_one_of_the_matches() {
        let repo = SqlKnowledgeRepository::new(setup().await);
        repo.save(KnowledgeEntry::new("kb-a", ["vaccine"], "A")).await.expect("save a");
        repo.save(KnowledgeEntry::new("kb-b", ["vaccine", "schedule"], "B"))
            .await
            .expect("save b");

        let entry = repo.find_by_tag("vaccine").await.expect("lookup").expect("entry");
        let all = repo.find_all_by_tag("vaccine").await.expect("all");

        assert!(entry.id.0 == "kb-a" || entry.id.0 == "kb-b");
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn save_overwrites_existing_entry() {
        let repo = SqlKnowledgeRepository::new(setup().await);
        repo.save(KnowledgeEntry::new("kb-1", ["hpv"], "old")).await.expect("save");
        repo.save(KnowledgeEntry::new("kb-1", ["hpv", "cervical"], "new")).await.expect("resave");

        let entry = repo
            .find_by_id(&KnowledgeEntryId("kb-1".to_string()))
            .await
            .expect("find")
            .expect("entry");

        assert_eq!(entry.response_text, "new");
        assert!(entry.has_tag("cervical"));
        assert_eq!(repo.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn malformed_keywords_surface_as_decode_failure() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO knowledge_entry (id, keywords, response_text, created_at)
             VALUES ('kb-bad', '{\"tag\":\"tetanus\"}', 'x', '2024-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert raw row");
        let repo = SqlKnowledgeRepository::new(pool);

        let store_error = match repo.find_by_id(&KnowledgeEntryId("kb-bad".to_string())).await {
            Err(error) => vaxline_core::errors::StoreError::from(error),
            Ok(_) => panic!("expected decode failure"),
        };
        assert_eq!(store_error.kind, StoreErrorKind::Decode);

        let lookup = repo.find_by_tag("tetanus").await.expect_err("decode failure");
        assert_eq!(lookup.kind, StoreErrorKind::Decode);
    }
}
