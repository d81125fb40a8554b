//! Folder store

use std::ops::Deref;
use std::sync::Arc;

use uuid::Uuid;

use super::{Entity, EntityStore, StoreError};
use crate::model::{Folder, FolderPatch, NewFolder};
use crate::remote::{RemoteTable, FOLDERS_TABLE};

impl Entity for Folder {
    const TABLE: &'static str = FOLDERS_TABLE;
    type Draft = NewFolder;
    type Patch = FolderPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Uuid {
        self.user_id
    }

    fn check_draft(draft: &NewFolder) -> Result<(), StoreError> {
        if draft.name.trim().is_empty() {
            return Err(StoreError::Invalid("folder name is required"));
        }
        Ok(())
    }

    fn check_patch(patch: &FolderPatch) -> Result<(), StoreError> {
        match &patch.name {
            Some(name) if name.trim().is_empty() => Err(StoreError::Invalid("folder name is required")),
            _ => Ok(()),
        }
    }
}

/// The signed-in user's folders
#[derive(Clone)]
pub struct FolderStore {
    inner: EntityStore<Folder>,
}

impl FolderStore {
    pub fn new(remote: Arc<dyn RemoteTable>) -> Self {
        Self {
            inner: EntityStore::new(remote),
        }
    }

    /// First folder whose name matches, ignoring case and surrounding whitespace
    pub fn find_by_name(&self, name: &str) -> Option<Folder> {
        let name = name.trim();
        self.inner.with_rows(|rows| {
            rows.iter()
                .find(|folder| folder.name.eq_ignore_ascii_case(name))
                .cloned()
        })
    }
}

impl Deref for FolderStore {
    type Target = EntityStore<Folder>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_add_then_delete_groceries() {
        let store = FolderStore::new(Arc::new(MemoryRemote::new()));
        let user = Uuid::new_v4();
        store.bind(Some(user));
        store.fetch_all().await;
        assert!(store.is_empty());

        let folder = assert_ok!(store.add(NewFolder::new(user, "Groceries").with_color("#3B82F6")).await);
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Groceries");
        assert_eq!(rows[0].color, "#3B82F6");
        assert_eq!(rows[0].id, folder.id);

        assert_ok!(store.remove(folder.id).await);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_name() {
        let store = FolderStore::new(Arc::new(MemoryRemote::new()));
        let user = Uuid::new_v4();
        store.bind(Some(user));
        let folder = store.add(NewFolder::new(user, "Hardware")).await.unwrap();

        assert_eq!(store.find_by_name(" hardware ").map(|f| f.id), Some(folder.id));
        assert!(store.find_by_name("Garden").is_none());
    }

    #[tokio::test]
    async fn test_recolor_keeps_position() {
        let store = FolderStore::new(Arc::new(MemoryRemote::new()));
        let user = Uuid::new_v4();
        store.bind(Some(user));
        let first = store.add(NewFolder::new(user, "first")).await.unwrap();
        let second = store.add(NewFolder::new(user, "second")).await.unwrap();

        let recolored = store.update(first.id, FolderPatch::recolor("#EF4444")).await.unwrap();
        assert_eq!(recolored.color, "#EF4444");
        assert_eq!(recolored.name, "first");
        let order: Vec<_> = store.rows().into_iter().map(|f| f.id).collect();
        assert_eq!(order, [second.id, first.id]);
    }
}
