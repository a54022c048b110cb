//! Entity stores: the collaborator boundary behind every list view.
//!
//! A store owns the current collection for one entity type together with its
//! `loading` / `error` flags. Mutations refresh the collection themselves, so
//! views only ever read.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{Entity, EntityId, Payload};

/// What a list view renders: rows plus the flags observed alongside them.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot<E> {
    pub items: Vec<E>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<E> Default for StoreSnapshot<E> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// Collection state shared by the store implementations.
pub(crate) struct StoreState<E> {
    inner: Mutex<StoreSnapshot<E>>,
}

impl<E: Clone> StoreState<E> {
    pub(crate) fn new(items: Vec<E>) -> Self {
        Self {
            inner: Mutex::new(StoreSnapshot {
                items,
                loading: false,
                error: None,
            }),
        }
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut StoreSnapshot<E>) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub(crate) fn snapshot(&self) -> StoreSnapshot<E> {
        self.update(|state| state.clone())
    }
}

/// Create/update/remove for one entity type, with an observable list.
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    fn list(&self) -> Vec<E>;

    fn loading(&self) -> bool;

    fn error(&self) -> Option<String>;

    fn snapshot(&self) -> StoreSnapshot<E> {
        StoreSnapshot {
            items: self.list(),
            loading: self.loading(),
            error: self.error(),
        }
    }

    /// Reload the collection from its source.
    async fn refresh(&self) -> Result<(), StoreError>;

    async fn create(&self, payload: E::Payload) -> Result<E, StoreError>;

    async fn update(&self, payload: E::Payload) -> Result<E, StoreError>;

    async fn remove(&self, id: EntityId) -> Result<(), StoreError>;
}

/// In-process store. Ids are assigned sequentially starting after the
/// largest seeded id.
pub struct MemoryStore<E> {
    state: StoreState<E>,
    next_id: Mutex<EntityId>,
}

impl<E: Entity> MemoryStore<E> {
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    pub fn with_items(items: Vec<E>) -> Self {
        let next_id = items.iter().filter_map(|e| e.id()).max().unwrap_or(0) + 1;
        Self {
            state: StoreState::new(items),
            next_id: Mutex::new(next_id),
        }
    }

    fn allocate_id(&self) -> EntityId {
        let mut next = self.next_id.lock().unwrap_or_else(|e| e.into_inner());
        let id = *next;
        *next += 1;
        id
    }
}

impl<E: Entity> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for MemoryStore<E> {
    fn list(&self) -> Vec<E> {
        self.state.update(|state| state.items.clone())
    }

    fn loading(&self) -> bool {
        false
    }

    fn error(&self) -> Option<String> {
        self.state.update(|state| state.error.clone())
    }

    fn snapshot(&self) -> StoreSnapshot<E> {
        self.state.snapshot()
    }

    async fn refresh(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create(&self, payload: E::Payload) -> Result<E, StoreError> {
        let id = self.allocate_id();
        let record = E::from_payload(payload, id);
        self.state.update(|state| state.items.push(record.clone()));
        info!(kind = %E::KIND, id, "created");
        Ok(record)
    }

    async fn update(&self, payload: E::Payload) -> Result<E, StoreError> {
        let id = payload.id().ok_or(StoreError::MissingId { kind: E::KIND })?;
        let record = E::from_payload(payload, id);
        self.state.update(|state| {
            let slot = state
                .items
                .iter_mut()
                .find(|item| item.id() == Some(id))
                .ok_or(StoreError::NotFound { kind: E::KIND, id })?;
            *slot = record.clone();
            Ok::<_, StoreError>(())
        })?;
        info!(kind = %E::KIND, id, "updated");
        Ok(record)
    }

    async fn remove(&self, id: EntityId) -> Result<(), StoreError> {
        let removed = self.state.update(|state| {
            let before = state.items.len();
            state.items.retain(|item| item.id() != Some(id));
            before != state.items.len()
        });
        if !removed {
            return Err(StoreError::NotFound { kind: E::KIND, id });
        }
        debug!(kind = %E::KIND, id, "removed");
        Ok(())
    }
}
