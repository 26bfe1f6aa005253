// Journal domain types
//
// Per-user care journal entries, optionally tied to a pet. Newest first,
// paginated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SyncOptions;
use crate::entity::{Entity, OwnerId};
use crate::pet::non_blank;
use crate::query::Query;
use crate::sync::EntitySync;

pub const DEFAULT_JOURNAL_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub id: Uuid,
    pub owner_id: OwnerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Journal {
    type Id = Uuid;
    const COLLECTION: &'static str = "journals";

    fn id(&self) -> &Uuid {
        &self.id
    }

    fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    fn sync_options() -> SyncOptions {
        SyncOptions::feed(DEFAULT_JOURNAL_PAGE_SIZE)
    }
}

pub type JournalsSync = EntitySync<Journal>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_JOURNAL_PAGE_SIZE
}

impl Default for JournalFilters {
    fn default() -> Self {
        Self {
            pet_id: None,
            limit: DEFAULT_JOURNAL_PAGE_SIZE,
        }
    }
}

impl JournalFilters {
    pub fn for_pet(pet_id: Uuid) -> Self {
        Self {
            pet_id: Some(pet_id),
            ..Default::default()
        }
    }
}

impl From<JournalFilters> for Query {
    fn from(filters: JournalFilters) -> Self {
        Query::new()
            .filter_opt("pet_id", filters.pet_id)
            .limit(filters.limit.max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalDraft {
    #[serde(default)]
    pub pet_id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub mood: Option<String>,
}

impl JournalDraft {
    pub fn into_journal(self, owner: OwnerId) -> Journal {
        let now = Utc::now();
        Journal {
            id: Uuid::now_v7(),
            owner_id: owner,
            pet_id: self.pet_id,
            title: self.title.trim().to_string(),
            body: self.body,
            mood: non_blank(self.mood),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_into_query() {
        let pet_id = Uuid::now_v7();
        let query: Query = JournalFilters::for_pet(pet_id).into();
        assert_eq!(query.filters.get("pet_id"), Some(&pet_id.to_string()));
        assert_eq!(query.limit, Some(DEFAULT_JOURNAL_PAGE_SIZE));
    }

    #[test]
    fn test_draft_into_journal() {
        let journal = JournalDraft {
            title: " Vaccination ".to_string(),
            body: "Rabies booster".to_string(),
            mood: Some(String::new()),
            ..Default::default()
        }
        .into_journal(OwnerId::from("U1"));

        assert_eq!(journal.title, "Vaccination");
        assert_eq!(journal.mood, None);
    }
}
