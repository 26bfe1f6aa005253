// Core traits for pluggable backends
//
// These traits allow the sync hooks to be used with different backends:
// - In-memory implementations for examples and testing
// - HTTP implementations for the hosted datastore and Auth0
// - File-backed token storage for the CLI

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::change::ChangeEvent;
use crate::entity::{Entity, OwnerId};
use crate::error::Result;
use crate::query::Query;
use crate::session::{Credential, Principal};

/// Change feed for one (collection, owner) pair.
///
/// Dropping the stream closes the subscription.
pub type ChangeStream<E> = Pin<Box<dyn Stream<Item = Result<ChangeEvent<E>>> + Send>>;

// ============================================================================
// DataGateway - Remote source of truth for one entity type
// ============================================================================

/// Read side of the remote datastore
///
/// Implementations can:
/// - Query a hosted REST endpoint and stream server-sent change events
/// - Serve from an in-memory table for tests
#[async_trait]
pub trait DataGateway<E: Entity>: Send + Sync {
    /// Fetch the owner's entities matching the query
    async fn fetch(&self, owner: &OwnerId, query: &Query) -> Result<Vec<E>>;

    /// Open a change feed for the owner's entities
    async fn subscribe(&self, owner: &OwnerId) -> Result<ChangeStream<E>>;
}

// ============================================================================
// EntityWriter - Writes against the remote datastore
// ============================================================================

/// Write side of the remote datastore
///
/// Callers that perform a write and already hold its authoritative result
/// can feed it to a sync hook's optimistic mutators instead of waiting for
/// the change event round trip.
#[async_trait]
pub trait EntityWriter<E: Entity>: Send + Sync {
    /// Insert a new entity, returning the stored record
    async fn insert(&self, entity: &E) -> Result<E>;

    /// Replace an existing entity, returning the stored record
    async fn update(&self, entity: &E) -> Result<E>;

    /// Delete an entity by id
    async fn delete(&self, id: &E::Id) -> Result<()>;
}

// ============================================================================
// IdentityProvider - Establishes who the user is
// ============================================================================

/// Identity provider contract (Auth0 in production)
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the interactive login flow.
    ///
    /// Returns `None` when the user cancels or denies access.
    async fn login(&self) -> Result<Option<Credential>>;

    /// Resolve an access token to a principal; `None` when the token is
    /// not (or no longer) accepted.
    async fn get_user_info(&self, access_token: &str) -> Result<Option<Principal>>;

    /// End the provider-side session
    async fn logout(&self) -> Result<()>;
}

// ============================================================================
// TokenStore - Scoped secret persistence
// ============================================================================

/// Key/value persistence for credentials
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}
