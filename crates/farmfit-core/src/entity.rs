// Entity abstraction shared by every synced domain
//
// Pets, posts, journals and user profiles are structurally interchangeable
// for sync purposes: each has a stable id, an owner reference, and lives in
// a named backend collection.

use crate::config::SyncOptions;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Subject identifier of the signed-in principal.
///
/// Keys every per-user fetch and subscription. An empty owner means
/// "nobody is signed in".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whitespace-only identities count as empty.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A record that can be fetched, subscribed to and reconciled by id.
pub trait Entity: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Primary key type. Immutable after creation.
    type Id: Clone
        + Eq
        + Hash
        + Debug
        + Display
        + Send
        + Sync
        + Serialize
        + DeserializeOwned
        + 'static;

    /// Backend collection (table) name
    const COLLECTION: &'static str;

    /// Column holding the owner reference
    const OWNER_FIELD: &'static str = "owner_id";

    fn id(&self) -> &Self::Id;

    fn owner_id(&self) -> &OwnerId;

    /// How a sync hook for this entity orders and pages its list
    fn sync_options() -> SyncOptions {
        SyncOptions::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_id_empty() {
        assert!(OwnerId::default().is_empty());
        assert!(OwnerId::from("   ").is_empty());
        assert!(!OwnerId::from("auth0|abc").is_empty());
    }

    #[test]
    fn test_owner_id_serializes_as_plain_string() {
        let owner = OwnerId::from("auth0|abc");
        assert_eq!(serde_json::to_string(&owner).unwrap(), "\"auth0|abc\"");
    }
}
