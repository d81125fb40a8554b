//! Shopping item store with status and folder views

use std::ops::Deref;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::{Entity, EntityStore, StoreError};
use crate::model::{ItemPatch, ItemStatus, NewItem, ShoppingItem};
use crate::remote::{RemoteTable, ITEMS_TABLE};

impl Entity for ShoppingItem {
    const TABLE: &'static str = ITEMS_TABLE;
    type Draft = NewItem;
    type Patch = ItemPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Uuid {
        self.user_id
    }

    fn check_draft(draft: &NewItem) -> Result<(), StoreError> {
        if draft.name.trim().is_empty() {
            return Err(StoreError::Invalid("item name is required"));
        }
        Ok(())
    }

    fn check_patch(patch: &ItemPatch) -> Result<(), StoreError> {
        match &patch.name {
            Some(name) if name.trim().is_empty() => Err(StoreError::Invalid("item name is required")),
            _ => Ok(()),
        }
    }
}

/// Which folder assignment an item view selects.
///
/// "No folder selected" in a UI can mean either [`All`](Self::All) or
/// [`Unfiled`](Self::Unfiled); callers pick one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderFilter {
    /// Every item, regardless of folder
    All,
    /// Only items without a folder
    Unfiled,
    /// Only items referencing this folder (which may no longer exist)
    Folder(Uuid),
}

impl FolderFilter {
    pub fn matches(&self, folder_id: Option<Uuid>) -> bool {
        match self {
            Self::All => true,
            Self::Unfiled => folder_id.is_none(),
            Self::Folder(id) => folder_id == Some(*id),
        }
    }
}

/// Number of items per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.completed + self.cancelled
    }
}

/// The signed-in user's shopping items
#[derive(Clone)]
pub struct ItemStore {
    inner: EntityStore<ShoppingItem>,
}

impl ItemStore {
    pub fn new(remote: Arc<dyn RemoteTable>) -> Self {
        Self {
            inner: EntityStore::new(remote),
        }
    }

    /// Items with the given status, in collection order
    pub fn by_status(&self, status: ItemStatus) -> Vec<ShoppingItem> {
        self.filtered(FolderFilter::All, Some(status))
    }

    /// Items matching the folder filter, in collection order
    pub fn by_folder(&self, filter: FolderFilter) -> Vec<ShoppingItem> {
        self.filtered(filter, None)
    }

    /// Items matching both the folder filter and, when given, the status
    pub fn filtered(&self, folder: FolderFilter, status: Option<ItemStatus>) -> Vec<ShoppingItem> {
        self.inner.with_rows(|rows| {
            rows.iter()
                .filter(|item| folder.matches(item.folder_id))
                .filter(|item| status.map_or(true, |s| item.status == s))
                .cloned()
                .collect()
        })
    }

    pub fn status_counts(&self, folder: FolderFilter) -> StatusCounts {
        self.inner.with_rows(|rows| {
            rows.iter()
                .filter(|item| folder.matches(item.folder_id))
                .fold(StatusCounts::default(), |mut counts, item| {
                    match item.status {
                        ItemStatus::Pending => counts.pending += 1,
                        ItemStatus::Completed => counts.completed += 1,
                        ItemStatus::Cancelled => counts.cancelled += 1,
                    }
                    counts
                })
        })
    }

    /// Move an item to `status` through the allowed transitions.
    ///
    /// The check runs against the local copy; the generic
    /// [`update`](EntityStore::update) path performs no such check.
    pub async fn set_status(&self, id: Uuid, status: ItemStatus) -> Result<ShoppingItem, StoreError> {
        let current = self
            .inner
            .get(id)
            .ok_or(StoreError::NotLoaded { id })?
            .status;

        if !current.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        let item = self.inner.update(id, ItemPatch::status(status)).await?;
        info!(id = %id, from = %current, to = %status, "Item status changed");
        Ok(item)
    }

    pub async fn complete(&self, id: Uuid) -> Result<ShoppingItem, StoreError> {
        self.set_status(id, ItemStatus::Completed).await
    }

    pub async fn cancel(&self, id: Uuid) -> Result<ShoppingItem, StoreError> {
        self.set_status(id, ItemStatus::Cancelled).await
    }

    /// Bring a completed or cancelled item back to pending
    pub async fn restore(&self, id: Uuid) -> Result<ShoppingItem, StoreError> {
        self.set_status(id, ItemStatus::Pending).await
    }
}

impl Deref for ItemStore {
    type Target = EntityStore<ShoppingItem>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
