// Sync hook configuration
//
// SyncOptions describes how one domain's hook orders and pages its list.
// Each domain module provides a preset; tests and callers can build their own.

use serde::{Deserialize, Serialize};

/// Where newly inserted entities land in the local list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrdering {
    /// Feed-like: inserts go to the head (most recent first)
    NewestFirst,
    /// Order is whatever the last fetch returned; inserts go to the tail
    #[default]
    AsFetched,
}

/// Configuration for an entity sync hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Local list ordering policy
    #[serde(default)]
    pub ordering: ListOrdering,

    /// Page size for paginated domains. `None` disables pagination:
    /// every refetch replaces the whole list.
    #[serde(default)]
    pub page_size: Option<usize>,

    /// Field the gateway sorts by, if any
    #[serde(default)]
    pub sort_field: Option<String>,

    /// Open a change feed on activation. When false the hook only fetches,
    /// which suits one-shot listings.
    #[serde(default = "default_live")]
    pub live: bool,
}

fn default_live() -> bool {
    true
}

impl SyncOptions {
    /// Create options for a non-paginated domain kept in fetch order
    pub fn new() -> Self {
        Self {
            ordering: ListOrdering::AsFetched,
            page_size: None,
            sort_field: None,
            live: true,
        }
    }

    /// Preset for feed-like domains: newest first, paged, sorted by creation time
    pub fn feed(page_size: usize) -> Self {
        Self {
            ordering: ListOrdering::NewestFirst,
            page_size: Some(page_size),
            sort_field: Some("created_at".to_string()),
            live: true,
        }
    }

    pub fn with_ordering(mut self, ordering: ListOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_sort_field(mut self, field: impl Into<String>) -> Self {
        self.sort_field = Some(field.into());
        self
    }

    /// Fetch only; never subscribe to the change feed
    pub fn without_live_updates(mut self) -> Self {
        self.live = false;
        self
    }

    pub fn is_paginated(&self) -> bool {
        self.page_size.is_some()
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for SyncOptions with fluent API
pub struct SyncOptionsBuilder {
    options: SyncOptions,
}

impl SyncOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: SyncOptions::default(),
        }
    }

    pub fn ordering(mut self, ordering: ListOrdering) -> Self {
        self.options.ordering = ordering;
        self
    }

    /// Enable pagination with the given page size
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.options.page_size = Some(page_size);
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>) -> Self {
        self.options.sort_field = Some(field.into());
        self
    }

    pub fn live(mut self, live: bool) -> Self {
        self.options.live = live;
        self
    }

    pub fn build(self) -> SyncOptions {
        self.options
    }
}

impl Default for SyncOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
