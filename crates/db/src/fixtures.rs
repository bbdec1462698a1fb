use vaxline_core::domain::knowledge::{KnowledgeEntry, KnowledgeEntryId};

use crate::connection::DbPool;
use crate::repositories::{KnowledgeRepository, RepositoryError, SqlKnowledgeRepository};

struct SeedEntryContract {
    id: &'static str,
    keywords: &'static [&'static str],
    response_text: &'static str,
}

/// Starter knowledge base shipped with `vaxline seed`.
const SEED_ENTRIES: &[SeedEntryContract] = &[
    SeedEntryContract {
        id: "kb-measles",
        keywords: &["measles", "rubeola"],
        response_text: "Measles is a highly contagious virus spread through the air. Two doses of MMR vaccine, at 12-15 months and 4-6 years, protect about 97% of children.",
    },
    SeedEntryContract {
        id: "kb-polio",
        keywords: &["polio", "ipv", "opv"],
        response_text: "Polio can cause lifelong paralysis. Children need 4 doses of polio vaccine: at 2 months, 4 months, 6-18 months and 4-6 years.",
    },
    SeedEntryContract {
        id: "kb-mmr",
        keywords: &["mmr", "mumps", "rubella"],
        response_text: "The MMR vaccine protects against measles, mumps and rubella. The first dose is given at 12-15 months and the second at 4-6 years.",
    },
    SeedEntryContract {
        id: "kb-schedule",
        keywords: &["schedule", "vaccine schedule", "vaccines", "immunization"],
        response_text: "Routine childhood vaccines start at birth (hepatitis B) and continue at 2, 4, 6, 12-18 months and 4-6 years. Reply REMIND with your child's birth date to get reminders.",
    },
    SeedEntryContract {
        id: "kb-dtap",
        keywords: &["dtap", "tetanus", "diphtheria", "whooping cough", "pertussis"],
        response_text: "DTaP protects against diphtheria, tetanus and whooping cough. Five doses are given at 2, 4, 6, 15-18 months and 4-6 years.",
    },
    SeedEntryContract {
        id: "kb-side-effects",
        keywords: &["side effects", "fever", "reaction"],
        response_text: "Mild fever, soreness or fussiness for a day or two after a vaccine is normal. Seek care right away for high fever, trouble breathing or swelling of the face.",
    },
];

pub struct KnowledgeBaseSeed;

impl KnowledgeBaseSeed {
    pub fn entries() -> Vec<KnowledgeEntry> {
        SEED_ENTRIES
            .iter()
            .map(|seed| KnowledgeEntry::new(seed.id, seed.keywords.iter(), seed.response_text))
            .collect()
    }

    /// Upserts every starter entry; running it again leaves one row per entry.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let repository = SqlKnowledgeRepository::new(pool.clone());
        let mut entries_seeded = Vec::with_capacity(SEED_ENTRIES.len());

        for entry in Self::entries() {
            entries_seeded.push(entry.id.0.clone());
            repository.save(entry).await?;
        }

        Ok(SeedResult { entries_seeded })
    }

    /// Checks that each starter entry exists and is reachable through every keyword.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let repository = SqlKnowledgeRepository::new(pool.clone());
        let mut checks = Vec::new();

        for seed in SEED_ENTRIES {
            let stored = repository.find_by_id(&KnowledgeEntryId(seed.id.to_string())).await?;
            checks.push((seed.id.to_string(), stored.is_some()));

            for keyword in seed.keywords {
                let tagged = repository.find_all_by_tag(keyword).await?;
                let reachable = tagged.iter().any(|entry| entry.id.0 == seed.id);
                checks.push((format!("{}#{keyword}", seed.id), reachable));
            }
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for seed in SEED_ENTRIES {
            sqlx::query("DELETE FROM knowledge_entry WHERE id = ?")
                .bind(seed.id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub entries_seeded: Vec<String>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

#[cfg(test)]
mod tests {
    use vaxline_core::ports::KnowledgeStore;

    use super::KnowledgeBaseSeed;
    use crate::repositories::{KnowledgeRepository, SqlKnowledgeRepository};
    use crate::{connect_with_settings, migrations};

    #[test]
    fn seed_keywords_are_unique_across_entries() {
        let entries = KnowledgeBaseSeed::entries();
        let mut seen = std::collections::HashSet::new();

        for entry in &entries {
            for keyword in &entry.keywords {
                assert!(seen.insert(keyword.clone()), "keyword `{keyword}` is seeded twice");
            }
        }
    }

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let before = KnowledgeBaseSeed::verify(&pool).await.expect("verify empty");
        assert!(!before.all_present);

        let first = KnowledgeBaseSeed::load(&pool).await.expect("first load");
        KnowledgeBaseSeed::load(&pool).await.expect("second load");

        let after = KnowledgeBaseSeed::verify(&pool).await.expect("verify seeded");
        assert!(after.all_present, "failed checks: {:?}", after.checks);

        let repository = SqlKnowledgeRepository::new(pool.clone());
        assert_eq!(repository.count().await.expect("count"), first.entries_seeded.len() as u64);

        let measles = repository.find_by_tag("measles").await.expect("lookup").expect("entry");
        assert_eq!(measles.id.0, "kb-measles");

        KnowledgeBaseSeed::clean(&pool).await.expect("clean");
        assert_eq!(repository.count().await.expect("count after clean"), 0);
    }
}
