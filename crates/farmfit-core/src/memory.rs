// In-memory implementations for demos and testing
//
// These implementations keep all data in memory, making them useful for:
// - Unit and integration tests of the sync hooks
// - Running the CLI without a backend
// - Scripting race scenarios (delayed fetches, failing feeds)

use async_trait::async_trait;
use futures::StreamExt;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use crate::change::ChangeEvent;
use crate::entity::{Entity, OwnerId};
use crate::error::{Result, SyncError};
use crate::query::Query;
use crate::session::{Credential, Principal};
use crate::traits::{ChangeStream, DataGateway, EntityWriter, IdentityProvider, TokenStore};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// InMemoryGateway - Table plus change feed for one entity type
// ============================================================================

/// In-memory data gateway
///
/// Holds one table in insertion order and broadcasts every write to the
/// subscribers of the affected owner. Writes made through `seed` are silent.
pub struct InMemoryGateway<E: Entity> {
    rows: Arc<RwLock<Vec<E>>>,
    changes: broadcast::Sender<(OwnerId, ChangeEvent<E>)>,
    fetch_calls: Arc<AtomicUsize>,
    subscribe_calls: Arc<AtomicUsize>,
    fail_fetch: Arc<AtomicBool>,
    fail_subscribe: Arc<AtomicBool>,
    fetch_delays: Arc<Mutex<HashMap<OwnerId, Duration>>>,
}

impl<E: Entity> Clone for InMemoryGateway<E> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            changes: self.changes.clone(),
            fetch_calls: self.fetch_calls.clone(),
            subscribe_calls: self.subscribe_calls.clone(),
            fail_fetch: self.fail_fetch.clone(),
            fail_subscribe: self.fail_subscribe.clone(),
            fetch_delays: self.fetch_delays.clone(),
        }
    }
}

impl<E: Entity> Default for InMemoryGateway<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> InMemoryGateway<E> {
    /// Create an empty gateway
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
            changes,
            fetch_calls: Arc::new(AtomicUsize::new(0)),
            subscribe_calls: Arc::new(AtomicUsize::new(0)),
            fail_fetch: Arc::new(AtomicBool::new(false)),
            fail_subscribe: Arc::new(AtomicBool::new(false)),
            fetch_delays: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Pre-populate the table without emitting change events
    pub async fn seed(&self, entities: impl IntoIterator<Item = E>) {
        self.rows.write().await.extend(entities);
    }

    /// Current table contents
    pub async fn rows(&self) -> Vec<E> {
        self.rows.read().await.clone()
    }

    /// Deliver a change event to the owner's subscribers without touching
    /// the table
    pub fn emit(&self, owner: &OwnerId, event: ChangeEvent<E>) {
        // No receivers is fine; nobody is listening.
        let _ = self.changes.send((owner.clone(), event));
    }

    /// Number of fetches served so far
    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of subscriptions opened so far
    pub fn subscribe_count(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Number of change feeds currently open
    pub fn active_subscriptions(&self) -> usize {
        self.changes.receiver_count()
    }

    /// Make every subsequent fetch fail with a network error
    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent subscribe fail
    pub fn fail_subscribes(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Delay fetches for `owner` by `delay`
    pub fn delay_fetches_for(&self, owner: impl Into<OwnerId>, delay: Duration) {
        let mut delays = self
            .fetch_delays
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        delays.insert(owner.into(), delay);
    }

    fn fetch_delay(&self, owner: &OwnerId) -> Option<Duration> {
        self.fetch_delays
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(owner)
            .copied()
    }
}

fn compare_json(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> CmpOrdering {
    use serde_json::Value;
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => CmpOrdering::Equal,
        (None | Some(Value::Null), Some(_)) => CmpOrdering::Greater,
        (Some(_), None | Some(Value::Null)) => CmpOrdering::Less,
        _ => CmpOrdering::Equal,
    }
}

#[async_trait]
impl<E: Entity> DataGateway<E> for InMemoryGateway<E> {
    async fn fetch(&self, owner: &OwnerId, query: &Query) -> Result<Vec<E>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.fetch_delay(owner) {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(SyncError::network("in-memory gateway: fetch failure injected"));
        }

        let rows = self.rows.read().await.clone();
        let mut matched: Vec<(serde_json::Value, E)> = Vec::new();
        for entity in rows {
            if entity.owner_id() != owner {
                continue;
            }
            let record = serde_json::to_value(&entity)?;
            if query.matches(&record) {
                matched.push((record, entity));
            }
        }

        if let Some(order) = &query.order {
            matched.sort_by(|(a, _), (b, _)| {
                let ord = compare_json(a.get(&order.field), b.get(&order.field));
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let page: Vec<E> = matched
            .into_iter()
            .map(|(_, entity)| entity)
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();

        debug!(
            collection = E::COLLECTION,
            owner = %owner,
            count = page.len(),
            "In-memory fetch"
        );
        Ok(page)
    }

    async fn subscribe(&self, owner: &OwnerId) -> Result<ChangeStream<E>> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(SyncError::subscription(
                "in-memory gateway: subscribe failure injected",
            ));
        }

        let owner = owner.clone();
        let stream = BroadcastStream::new(self.changes.subscribe()).filter_map(move |item| {
            let owner = owner.clone();
            async move {
                match item {
                    Ok((event_owner, event)) if event_owner == owner => Some(Ok(event)),
                    Ok(_) => None,
                    Err(e) => Some(Err(SyncError::subscription(e.to_string()))),
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl<E: Entity> EntityWriter<E> for InMemoryGateway<E> {
    async fn insert(&self, entity: &E) -> Result<E> {
        {
            let mut rows = self.rows.write().await;
            if rows.iter().any(|e| e.id() == entity.id()) {
                return Err(SyncError::validation(format!(
                    "{} {} already exists",
                    E::COLLECTION,
                    entity.id()
                )));
            }
            rows.push(entity.clone());
        }
        self.emit(entity.owner_id(), ChangeEvent::Inserted(entity.clone()));
        Ok(entity.clone())
    }

    async fn update(&self, entity: &E) -> Result<E> {
        {
            let mut rows = self.rows.write().await;
            let slot = rows
                .iter_mut()
                .find(|e| e.id() == entity.id())
                .ok_or_else(|| {
                    SyncError::not_found(format!("{} {}", E::COLLECTION, entity.id()))
                })?;
            *slot = entity.clone();
        }
        self.emit(entity.owner_id(), ChangeEvent::Updated(entity.clone()));
        Ok(entity.clone())
    }

    async fn delete(&self, id: &E::Id) -> Result<()> {
        let removed = {
            let mut rows = self.rows.write().await;
            let index = rows
                .iter()
                .position(|e| e.id() == id)
                .ok_or_else(|| SyncError::not_found(format!("{} {}", E::COLLECTION, id)))?;
            rows.remove(index)
        };
        self.emit(removed.owner_id(), ChangeEvent::Deleted(id.clone()));
        Ok(())
    }
}

// ============================================================================
// InMemoryIdentityProvider - Scripted identity provider
// ============================================================================

/// Identity provider backed by a token -> principal table
///
/// `login` returns the scripted credentials in order, then `None`
/// (a cancelled login).
#[derive(Debug, Default, Clone)]
pub struct InMemoryIdentityProvider {
    principals: Arc<RwLock<HashMap<String, Principal>>>,
    logins: Arc<RwLock<VecDeque<Option<Credential>>>>,
    fail_logout: Arc<AtomicBool>,
    logout_calls: Arc<AtomicUsize>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as identifying `principal`
    pub async fn register(&self, token: impl Into<String>, principal: Principal) {
        self.principals.write().await.insert(token.into(), principal);
    }

    /// Revoke a token
    pub async fn revoke(&self, token: &str) {
        self.principals.write().await.remove(token);
    }

    /// Queue the result of the next `login` call
    pub async fn next_login(&self, credential: Option<Credential>) {
        self.logins.write().await.push_back(credential);
    }

    pub fn fail_logout(&self, fail: bool) {
        self.fail_logout.store(fail, Ordering::SeqCst);
    }

    pub fn logout_count(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn login(&self) -> Result<Option<Credential>> {
        Ok(self.logins.write().await.pop_front().flatten())
    }

    async fn get_user_info(&self, access_token: &str) -> Result<Option<Principal>> {
        Ok(self.principals.read().await.get(access_token).cloned())
    }

    async fn logout(&self) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(SyncError::auth("in-memory provider: logout failure injected"));
        }
        Ok(())
    }
}

// ============================================================================
// InMemoryTokenStore - Volatile token storage
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct InMemoryTokenStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pet::{Pet, PetDraft, Species};

    fn pet(owner: &str, name: &str, species: &str) -> Pet {
        PetDraft::new(name, species).into_pet(OwnerId::from(owner))
    }

    #[tokio::test]
    async fn test_fetch_filters_by_owner_and_query() {
        let gateway = InMemoryGateway::new();
        gateway
            .seed(vec![
                pet("U1", "Rex", "dog"),
                pet("U1", "Tom", "cat"),
                pet("U2", "Fido", "dog"),
            ])
            .await;

        let owner = OwnerId::from("U1");
        let all = gateway.fetch(&owner, &Query::new()).await.unwrap();
        assert_eq!(all.len(), 2);

        let dogs = gateway
            .fetch(&owner, &Query::new().filter("species", Species::Dog))
            .await
            .unwrap();
        assert_eq!(dogs.len(), 1);
        assert_eq!(dogs[0].name, "Rex");
        assert_eq!(gateway.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_orders_and_pages() {
        let gateway = InMemoryGateway::new();
        gateway
            .seed(vec![
                pet("U1", "Bella", "cow"),
                pet("U1", "Ace", "horse"),
                pet("U1", "Cleo", "goat"),
            ])
            .await;

        let page = gateway
            .fetch(
                &OwnerId::from("U1"),
                &Query::new().order_by_asc("name").offset(1).limit(1),
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "Bella");
    }

    #[tokio::test]
    async fn test_writes_reach_only_the_owners_feed() {
        let gateway = InMemoryGateway::new();
        let mut feed = gateway.subscribe(&OwnerId::from("U1")).await.unwrap();

        gateway.insert(&pet("U2", "Other", "dog")).await.unwrap();
        let mine = pet("U1", "Rex", "dog");
        gateway.insert(&mine).await.unwrap();

        let event = feed.next().await.unwrap().unwrap();
        assert_eq!(event, ChangeEvent::Inserted(mine));
        assert_eq!(gateway.active_subscriptions(), 1);

        drop(feed);
        assert_eq!(gateway.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let gateway = InMemoryGateway::new();
        let err = gateway.update(&pet("U1", "Ghost", "cat")).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_token_store() {
        let store = InMemoryTokenStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert!(store.is_empty().await);
    }
}
