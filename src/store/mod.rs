//! Per-user in-memory collections kept in step with the remote tables.
//!
//! Every mutation is server-confirmed: the remote call completes first and
//! only its returned row is applied locally. A failed call leaves the local
//! collection exactly as it was.

pub mod folders;
pub mod items;

pub use folders::FolderStore;
pub use items::{FolderFilter, ItemStore, StatusCounts};

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::model::ItemStatus;
use crate::remote::{RemoteError, RemoteTable};

/// A row type owned by one user and kept in an [`EntityStore`]
pub trait Entity: DeserializeOwned + Clone + Send + Sync + 'static {
    /// Remote table holding the rows
    const TABLE: &'static str;

    /// Insert payload (everything but id and timestamps)
    type Draft: Serialize + Send + Sync;

    /// Sparse update payload
    type Patch: Serialize + Send + Sync;

    fn id(&self) -> Uuid;

    fn owner(&self) -> Uuid;

    /// Required-field checks on a draft, run before any network call
    fn check_draft(draft: &Self::Draft) -> Result<(), StoreError>;

    /// Required-field checks on a patch, run before any network call
    fn check_patch(patch: &Self::Patch) -> Result<(), StoreError>;
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Invalid input: {0}")]
    Invalid(&'static str),

    #[error("No row with id {id} in the local collection")]
    NotLoaded { id: Uuid },

    #[error("Cannot move item from {from} to {to}")]
    InvalidTransition { from: ItemStatus, to: ItemStatus },
}

struct State<E> {
    owner: Option<Uuid>,
    rows: Vec<E>,
    loading: bool,
    /// Bumped on every rebind; results started under an older generation are dropped
    generation: u64,
    /// Bumped on every fetch; only the latest fetch may commit
    fetch_seq: u64,
}

/// In-memory collection of one user's rows of one table, newest first.
///
/// Clones share the same collection.
#[derive(Clone)]
pub struct EntityStore<E: Entity> {
    remote: Arc<dyn RemoteTable>,
    state: Arc<RwLock<State<E>>>,
}

impl<E: Entity> EntityStore<E> {
    /// Unbound store: empty, not loading, fetches are no-ops until [`bind`](Self::bind)
    pub fn new(remote: Arc<dyn RemoteTable>) -> Self {
        Self {
            remote,
            state: Arc::new(RwLock::new(State {
                owner: None,
                rows: Vec::new(),
                loading: false,
                generation: 0,
                fetch_seq: 0,
            })),
        }
    }

    /// Reset the collection for a new identity.
    ///
    /// Drops all rows and invalidates every in-flight call. Loading is set
    /// when an owner is given, until the next fetch resolves.
    pub fn bind(&self, owner: Option<Uuid>) {
        let mut state = self.state.write();
        state.owner = owner;
        state.rows.clear();
        state.loading = owner.is_some();
        state.generation += 1;
        debug!(table = E::TABLE, owner = ?owner, generation = state.generation, "Store rebound");
    }

    pub fn owner(&self) -> Option<Uuid> {
        self.state.read().owner
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    /// Snapshot of the collection in display order
    pub fn rows(&self) -> Vec<E> {
        self.state.read().rows.clone()
    }

    pub fn get(&self, id: Uuid) -> Option<E> {
        self.state.read().rows.iter().find(|row| row.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().rows.is_empty()
    }

    /// Run `f` over the current rows without cloning the collection
    pub(crate) fn with_rows<R>(&self, f: impl FnOnce(&[E]) -> R) -> R {
        f(&self.state.read().rows)
    }

    /// Replace the collection with the owner's rows from the server.
    ///
    /// Failures are logged and swallowed: the last-known rows stay in place
    /// and loading is cleared. A result is dropped if the store was rebound
    /// or another fetch started meanwhile. Returns whether the result was
    /// committed.
    pub async fn fetch_all(&self) -> bool {
        let (owner, generation, seq) = {
            let mut state = self.state.write();
            let Some(owner) = state.owner else {
                state.loading = false;
                return false;
            };
            state.fetch_seq += 1;
            state.loading = true;
            (owner, state.generation, state.fetch_seq)
        };

        let result = match self.remote.select_owned(E::TABLE, owner).await {
            Ok(rows) => decode_rows::<E>(rows),
            Err(e) => Err(e),
        };

        let mut state = self.state.write();
        if state.generation != generation || state.fetch_seq != seq {
            debug!(table = E::TABLE, user_id = %owner, "Discarding superseded fetch");
            return false;
        }
        state.loading = false;

        match result {
            Ok(rows) => {
                info!(table = E::TABLE, user_id = %owner, count = rows.len(), "Fetched rows");
                state.rows = rows;
                true
            }
            Err(e) => {
                warn!(table = E::TABLE, user_id = %owner, error = %e, "Fetch failed, keeping last-known rows");
                false
            }
        }
    }

    /// Insert a row and prepend the server's copy to the collection
    pub async fn add(&self, draft: E::Draft) -> Result<E, StoreError> {
        E::check_draft(&draft)?;

        let generation = self.state.read().generation;
        let body = serde_json::to_value(&draft).map_err(RemoteError::from)?;

        let row = self.remote.insert(E::TABLE, body).await.map_err(|e| {
            warn!(table = E::TABLE, error = %e, "Insert failed");
            e
        })?;
        let entity: E = serde_json::from_value(row).map_err(RemoteError::from)?;

        let mut state = self.state.write();
        if state.generation == generation && state.owner == Some(entity.owner()) {
            // A fetch that raced the insert may already hold the row
            match state.rows.iter_mut().find(|row| row.id() == entity.id()) {
                Some(slot) => *slot = entity.clone(),
                None => state.rows.insert(0, entity.clone()),
            }
        }
        drop(state);

        info!(table = E::TABLE, id = %entity.id(), "Row added");
        Ok(entity)
    }

    /// Apply a sparse update (stamping `updated_at`) and replace the local
    /// row in place with the server's copy
    pub async fn update(&self, id: Uuid, patch: E::Patch) -> Result<E, StoreError> {
        E::check_patch(&patch)?;

        let generation = self.state.read().generation;
        let mut body = serde_json::to_value(&patch).map_err(RemoteError::from)?;
        if let Value::Object(fields) = &mut body {
            fields.insert(
                "updated_at".to_string(),
                serde_json::to_value(Utc::now()).map_err(RemoteError::from)?,
            );
        }

        let row = self.remote.update(E::TABLE, id, body).await.map_err(|e| {
            warn!(table = E::TABLE, id = %id, error = %e, "Update failed");
            e
        })?;
        let entity: E = serde_json::from_value(row).map_err(RemoteError::from)?;

        let mut state = self.state.write();
        if state.generation == generation {
            if let Some(slot) = state.rows.iter_mut().find(|row| row.id() == id) {
                *slot = entity.clone();
            }
        }
        drop(state);

        debug!(table = E::TABLE, id = %id, "Row updated");
        Ok(entity)
    }

    /// Delete a row remotely, then drop it from the collection
    pub async fn remove(&self, id: Uuid) -> Result<(), StoreError> {
        let generation = self.state.read().generation;

        self.remote.delete(E::TABLE, id).await.map_err(|e| {
            warn!(table = E::TABLE, id = %id, error = %e, "Delete failed");
            e
        })?;

        let mut state = self.state.write();
        if state.generation == generation {
            state.rows.retain(|row| row.id() != id);
        }
        drop(state);

        info!(table = E::TABLE, id = %id, "Row removed");
        Ok(())
    }
}

fn decode_rows<E: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<E>, RemoteError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(RemoteError::from))
        .collect()
}
