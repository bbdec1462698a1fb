use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnowledgeEntryId(pub String);

/// A canned answer reachable through any of its keywords.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: KnowledgeEntryId,
    pub keywords: BTreeSet<String>,
    pub response_text: String,
}

impl KnowledgeEntry {
    pub fn new<I, S>(id: impl Into<String>, keywords: I, response_text: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id: KnowledgeEntryId(id.into()),
            keywords: keywords.into_iter().map(|keyword| normalize_tag(keyword.as_ref())).collect(),
            response_text: response_text.into(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.keywords.contains(&normalize_tag(tag))
    }
}

/// Tags are matched case-insensitively; both sides go through this.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}
