// Entity sync hook
//
// EntitySync keeps a local, ordered copy of one owner's entities in step
// with the remote datastore:
// - activate(owner, filters): fresh session, one subscription, initial fetch
// - change events are reconciled into the list by id
// - refetch(reset) re-runs the fetch, replacing or appending a page
// - optimistic mutators patch the list without a round trip
//
// Every activation and refetch takes a new generation. Responses and events
// tagged with a superseded generation are dropped, so a slow response for an
// old identity can never overwrite state produced for a newer one.
//
// Events that arrive while any fetch is in flight (initial, replacing or
// appending a page) are buffered and replayed on top of the fetch result; the
// final list therefore does not depend on whether an event beat the fetch.
//
// The state lock is a plain mutex and is never held across an await.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::change::ChangeEvent;
use crate::config::{ListOrdering, SyncOptions};
use crate::entity::{Entity, OwnerId};
use crate::entity_list::EntityList;
use crate::error::{Result, SyncError};
use crate::query::Query;
use crate::session::IdentitySession;
use crate::subscription::SubscriptionHandle;
use crate::traits::{ChangeStream, DataGateway};

/// Lifecycle phase of a sync hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    /// No owner identity
    #[default]
    Idle,
    /// Fetch in flight
    Loading,
    /// List populated, subscription open
    Ready,
    /// Explicitly deactivated
    Closed,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPhase::Idle => write!(f, "idle"),
            SyncPhase::Loading => write!(f, "loading"),
            SyncPhase::Ready => write!(f, "ready"),
            SyncPhase::Closed => write!(f, "closed"),
        }
    }
}

/// Observable state of a sync hook at one point in time
#[derive(Debug, Clone, Serialize)]
pub struct SyncSnapshot<E> {
    pub entities: Vec<E>,
    pub is_loading: bool,
    /// Last user-facing failure, cleared by a successful fetch
    pub error: Option<String>,
    /// Another page is likely available (paginated domains only)
    pub has_more: bool,
    /// Offset of the next page (paginated domains only)
    pub cursor: usize,
    pub phase: SyncPhase,
    pub owner: Option<OwnerId>,
}

impl<E> Default for SyncSnapshot<E> {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            is_loading: false,
            error: None,
            has_more: false,
            cursor: 0,
            phase: SyncPhase::Idle,
            owner: None,
        }
    }
}

struct SyncState<E: Entity> {
    /// Bumped by activate/deactivate; tags the change feed
    session_generation: u64,
    /// Bumped by every fetch; only the latest fetch may land
    fetch_generation: u64,
    owner: Option<OwnerId>,
    filters: Query,
    list: EntityList<E>,
    phase: SyncPhase,
    error: Option<String>,
    subscription_error: Option<String>,
    cursor: usize,
    has_more: bool,
    /// Some while a fetch is in flight
    pending: Option<Vec<ChangeEvent<E>>>,
    subscription: Option<SubscriptionHandle>,
    binding: Option<SubscriptionHandle>,
}

impl<E: Entity> SyncState<E> {
    fn new(ordering: ListOrdering) -> Self {
        Self {
            session_generation: 0,
            fetch_generation: 0,
            owner: None,
            filters: Query::default(),
            list: EntityList::new(ordering),
            phase: SyncPhase::Idle,
            error: None,
            subscription_error: None,
            cursor: 0,
            has_more: false,
            pending: None,
            subscription: None,
            binding: None,
        }
    }

    fn snapshot(&self) -> SyncSnapshot<E> {
        SyncSnapshot {
            entities: self.list.to_vec(),
            is_loading: self.phase == SyncPhase::Loading,
            error: self.error.clone(),
            has_more: self.has_more,
            cursor: self.cursor,
            phase: self.phase,
            owner: self.owner.clone(),
        }
    }

    fn replay_pending(&mut self) {
        if let Some(events) = self.pending.take() {
            let count = events.len();
            for event in events {
                self.list.apply(event);
            }
            if count > 0 {
                debug!(collection = E::COLLECTION, count, "Replayed buffered change events");
            }
        }
    }

    fn subscription_active(&self) -> bool {
        self.subscription.as_ref().is_some_and(|s| s.is_active())
    }
}

struct Inner<E: Entity> {
    gateway: Arc<dyn DataGateway<E>>,
    options: SyncOptions,
    state: Mutex<SyncState<E>>,
    snapshot_tx: watch::Sender<SyncSnapshot<E>>,
}

impl<E: Entity> Inner<E> {
    fn lock(&self) -> MutexGuard<'_, SyncState<E>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, state: &SyncState<E>) {
        self.snapshot_tx.send_replace(state.snapshot());
    }

    /// Page size in effect for the given filters
    fn page_size(&self, filters: &Query) -> Option<usize> {
        if self.options.is_paginated() {
            filters.limit.or(self.options.page_size)
        } else {
            None
        }
    }

    fn build_query(&self, filters: &Query, offset: usize) -> Query {
        let mut query = filters.clone();
        query.limit = self.page_size(filters);
        query.offset = offset;
        if query.order.is_none() {
            if let Some(field) = &self.options.sort_field {
                query = match self.options.ordering {
                    ListOrdering::NewestFirst => query.order_by_desc(field.clone()),
                    ListOrdering::AsFetched => query.order_by_asc(field.clone()),
                };
            }
        }
        query
    }

    /// Apply a change event delivered by the feed of `generation`
    fn apply_remote(&self, generation: u64, event: ChangeEvent<E>) {
        let mut state = self.lock();
        if state.session_generation != generation {
            debug!(collection = E::COLLECTION, "Dropping change event from closed subscription");
            return;
        }

        debug!(
            collection = E::COLLECTION,
            id = %event.entity_id(),
            kind = %event.kind(),
            "Change event received"
        );

        if let Some(pending) = state.pending.as_mut() {
            pending.push(event);
            return;
        }

        if state.list.apply(event).changed() {
            self.publish(&state);
        }
    }

    fn record_subscription_error(&self, generation: u64, err: &SyncError) {
        let mut state = self.lock();
        if state.session_generation != generation {
            return;
        }
        warn!(collection = E::COLLECTION, error = %err, "Change feed failed");
        let message = err.user_message();
        state.subscription_error = Some(message.clone());
        state.error = Some(message);
        self.publish(&state);
    }
}

/// Cache-and-subscription adapter for one entity type.
///
/// Cloning yields another handle to the same hook. The hook (and its
/// subscription) is released when the last handle is dropped.
pub struct EntitySync<E: Entity> {
    inner: Arc<Inner<E>>,
}

impl<E: Entity> Clone for EntitySync<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Entity> EntitySync<E> {
    /// Create an idle hook over a gateway
    pub fn new(gateway: Arc<dyn DataGateway<E>>, options: SyncOptions) -> Self {
        let (snapshot_tx, _rx) = watch::channel(SyncSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                gateway,
                state: Mutex::new(SyncState::new(options.ordering)),
                options,
                snapshot_tx,
            }),
        }
    }

    /// Create an idle hook using the entity's own ordering and paging
    pub fn for_entity(gateway: Arc<dyn DataGateway<E>>) -> Self {
        Self::new(gateway, E::sync_options())
    }

    pub fn options(&self) -> &SyncOptions {
        &self.inner.options
    }

    /// Current observable state
    pub fn snapshot(&self) -> SyncSnapshot<E> {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Receiver that wakes on every state change
    pub fn watch(&self) -> watch::Receiver<SyncSnapshot<E>> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn entities(&self) -> Vec<E> {
        self.inner.lock().list.to_vec()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().phase == SyncPhase::Loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.lock().error.clone()
    }

    pub fn phase(&self) -> SyncPhase {
        self.inner.lock().phase
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.inner.lock().owner.clone()
    }

    /// Generation of the current fetch
    pub fn generation(&self) -> u64 {
        self.inner.lock().fetch_generation
    }

    /// True while a change feed is being drained
    pub fn is_subscribed(&self) -> bool {
        self.inner.lock().subscription_active()
    }

    /// Begin a fresh session for `owner`.
    ///
    /// Discards the previous list and subscription. Hooks built without live
    /// updates skip the subscription and only fetch. An empty owner resets
    /// the hook to an empty, idle state without contacting the gateway.
    /// Failures are recorded in the snapshot and also returned.
    pub async fn activate(&self, owner: impl Into<OwnerId>, filters: Query) -> Result<()> {
        let owner = owner.into();
        let inner = &self.inner;

        let (session_generation, fetch_generation, previous) = {
            let mut state = inner.lock();
            state.session_generation += 1;
            state.fetch_generation += 1;
            let previous = state.subscription.take();
            state.list.clear();
            state.cursor = 0;
            state.has_more = false;
            state.error = None;
            state.subscription_error = None;
            state.filters = filters;

            if owner.is_empty() {
                state.owner = None;
                state.phase = SyncPhase::Idle;
                state.pending = None;
            } else {
                state.owner = Some(owner.clone());
                state.phase = SyncPhase::Loading;
                state.pending = Some(Vec::new());
            }
            inner.publish(&state);
            (state.session_generation, state.fetch_generation, previous)
        };
        drop(previous);

        if owner.is_empty() {
            debug!(collection = E::COLLECTION, "No owner identity, hook idle");
            return Ok(());
        }

        info!(
            collection = E::COLLECTION,
            owner = %owner,
            generation = fetch_generation,
            "Activating sync hook"
        );

        // Subscribe before fetching so no change falls between the two.
        if inner.options.live {
            self.open_subscription(&owner, session_generation).await;
        }

        let filters = inner.lock().filters.clone();
        let query = inner.build_query(&filters, 0);
        let page_size = query.limit;
        let result = inner.gateway.fetch(&owner, &query).await;

        self.finish_fetch(fetch_generation, true, page_size, result)
    }

    /// Re-run the fetch for the current owner.
    ///
    /// `reset_pagination = true` replaces the list and cursor; `false`
    /// appends the next page and advances the cursor by its length.
    /// Non-paginated domains always replace. A closed or failed
    /// subscription is re-opened.
    pub async fn refetch(&self, reset_pagination: bool) -> Result<()> {
        let inner = &self.inner;

        let (owner, session_generation, fetch_generation, query, replace, resubscribe) = {
            let mut state = inner.lock();
            let Some(owner) = state.owner.clone() else {
                debug!(collection = E::COLLECTION, "Refetch ignored, hook idle");
                return Ok(());
            };

            let replace = reset_pagination || !inner.options.is_paginated();
            state.fetch_generation += 1;
            if state.pending.is_none() {
                state.pending = Some(Vec::new());
            }
            state.phase = SyncPhase::Loading;
            inner.publish(&state);

            let offset = if replace { 0 } else { state.cursor };
            let query = inner.build_query(&state.filters, offset);
            (
                owner,
                state.session_generation,
                state.fetch_generation,
                query,
                replace,
                inner.options.live && !state.subscription_active(),
            )
        };

        debug!(
            collection = E::COLLECTION,
            owner = %owner,
            generation = fetch_generation,
            offset = query.offset,
            replace,
            "Refetching"
        );

        if resubscribe {
            self.open_subscription(&owner, session_generation).await;
        }

        let page_size = query.limit;
        let result = inner.gateway.fetch(&owner, &query).await;
        self.finish_fetch(fetch_generation, replace, page_size, result)
    }

    /// Release the subscription and discard the list
    pub fn deactivate(&self) {
        let previous = {
            let mut state = self.inner.lock();
            state.session_generation += 1;
            state.fetch_generation += 1;
            state.owner = None;
            state.list.clear();
            state.cursor = 0;
            state.has_more = false;
            state.error = None;
            state.subscription_error = None;
            state.pending = None;
            state.phase = SyncPhase::Closed;
            self.inner.publish(&state);
            state.subscription.take()
        };
        drop(previous);
        info!(collection = E::COLLECTION, "Sync hook deactivated");
    }

    /// Insert (or replace by id) without contacting the gateway
    pub fn add_local(&self, entity: E) {
        let mut state = self.inner.lock();
        if let Some(pending) = state.pending.as_mut() {
            pending.push(ChangeEvent::Inserted(entity.clone()));
        }
        state.list.upsert(entity);
        self.inner.publish(&state);
    }

    /// Patch an entity in place; returns false when the id is not loaded
    pub fn update_local<F>(&self, id: &E::Id, patch: F) -> bool
    where
        F: FnOnce(&mut E),
    {
        let mut state = self.inner.lock();
        if !state.list.update_with(id, patch).changed() {
            return false;
        }
        if let Some(updated) = state.list.get(id).cloned() {
            if let Some(pending) = state.pending.as_mut() {
                pending.push(ChangeEvent::Updated(updated));
            }
        }
        self.inner.publish(&state);
        true
    }

    /// Remove an entity; returns it when it was loaded
    pub fn remove_local(&self, id: &E::Id) -> Option<E> {
        let mut state = self.inner.lock();
        if let Some(pending) = state.pending.as_mut() {
            pending.push(ChangeEvent::Deleted(id.clone()));
        }
        let removed = state.list.remove(id);
        if removed.is_some() {
            self.inner.publish(&state);
        }
        removed
    }

    /// Follow an identity session.
    ///
    /// Every identity change re-activates the hook with the new owner (or
    /// the empty owner when the session closes). A switch that happens while
    /// an activation is still in flight abandons that activation. Binding
    /// again replaces the previous binding.
    pub fn bind(&self, session: &IdentitySession, filters: Query) {
        let mut rx = session.watch();
        let weak: Weak<Inner<E>> = Arc::downgrade(&self.inner);

        let binding = SubscriptionHandle::spawn(format!("{}:identity", E::COLLECTION), async move {
            loop {
                let owner = rx
                    .borrow_and_update()
                    .as_ref()
                    .map(|p| p.subject.clone())
                    .unwrap_or_default();

                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let sync = EntitySync { inner };

                let switched = tokio::select! {
                    result = sync.activate(owner, filters.clone()) => {
                        if let Err(e) = result {
                            warn!(collection = E::COLLECTION, error = %e, "Activation after identity change failed");
                        }
                        false
                    }
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        true
                    }
                };
                drop(sync);

                if !switched && rx.changed().await.is_err() {
                    return;
                }
            }
        });

        let previous = self.inner.lock().binding.replace(binding);
        drop(previous);
    }

    /// Stop following the identity session (the current state is kept)
    pub fn unbind(&self) {
        let previous = self.inner.lock().binding.take();
        drop(previous);
    }

    async fn open_subscription(&self, owner: &OwnerId, generation: u64) {
        let inner = &self.inner;
        match inner.gateway.subscribe(owner).await {
            Ok(stream) => {
                let mut state = inner.lock();
                if state.session_generation != generation {
                    debug!(collection = E::COLLECTION, "Discarding subscription for superseded session");
                    return;
                }
                state.subscription_error = None;
                let handle = spawn_feed(Arc::downgrade(inner), generation, stream);
                let previous = state.subscription.replace(handle);
                drop(state);
                drop(previous);
            }
            Err(e) => {
                warn!(
                    collection = E::COLLECTION,
                    owner = %owner,
                    error = %e,
                    "Failed to open change feed"
                );
                let mut state = inner.lock();
                if state.session_generation == generation {
                    let message = e.user_message();
                    state.subscription_error = Some(message.clone());
                    state.error = Some(message);
                    inner.publish(&state);
                }
            }
        }
    }

    fn finish_fetch(
        &self,
        generation: u64,
        replace: bool,
        page_size: Option<usize>,
        result: Result<Vec<E>>,
    ) -> Result<()> {
        let inner = &self.inner;
        let mut state = inner.lock();

        if state.fetch_generation != generation {
            debug!(
                collection = E::COLLECTION,
                generation,
                current = state.fetch_generation,
                "Discarding stale fetch response"
            );
            return Ok(());
        }

        let outcome = match result {
            Ok(items) => {
                let fetched = items.len();
                if replace {
                    state.list.replace_all(items);
                    state.cursor = fetched;
                } else {
                    state.list.append_page(items);
                    state.cursor += fetched;
                }
                state.has_more = page_size.is_some_and(|size| fetched >= size && size > 0);
                state.error = state.subscription_error.clone();
                debug!(
                    collection = E::COLLECTION,
                    fetched,
                    cursor = state.cursor,
                    has_more = state.has_more,
                    "Fetch complete"
                );
                Ok(())
            }
            Err(e) => {
                warn!(collection = E::COLLECTION, error = %e, "Fetch failed");
                state.error = Some(e.user_message());
                Err(e)
            }
        };

        state.replay_pending();
        state.phase = SyncPhase::Ready;
        inner.publish(&state);
        outcome
    }
}

fn spawn_feed<E: Entity>(
    inner: Weak<Inner<E>>,
    generation: u64,
    mut stream: ChangeStream<E>,
) -> SubscriptionHandle {
    SubscriptionHandle::spawn(format!("{}:changes", E::COLLECTION), async move {
        while let Some(item) = stream.next().await {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            match item {
                Ok(event) => inner.apply_remote(generation, event),
                Err(e) => {
                    inner.record_subscription_error(generation, &e);
                    return;
                }
            }
        }
        if let Some(inner) = inner.upgrade() {
            let closed = SyncError::subscription("change feed closed");
            inner.record_subscription_error(generation, &closed);
        }
    })
}

impl<E: Entity> std::fmt::Debug for EntitySync<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("EntitySync")
            .field("collection", &E::COLLECTION)
            .field("owner", &state.owner)
            .field("phase", &state.phase)
            .field("len", &state.list.len())
            .finish()
    }
}
