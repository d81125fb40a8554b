//! Item and folder stores bound to the current identity

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AuthState, Identity};
use crate::remote::RemoteTable;
use crate::store::{FolderStore, ItemStore};

/// Both stores of one signed-in user.
///
/// The stores are reset and refetched whenever the identity changes; rows
/// of a previous identity are never merged into the next one.
#[derive(Clone)]
pub struct ShoppingSession {
    pub items: ItemStore,
    pub folders: FolderStore,
}

impl ShoppingSession {
    pub fn new(remote: Arc<dyn RemoteTable>) -> Self {
        Self {
            items: ItemStore::new(remote.clone()),
            folders: FolderStore::new(remote),
        }
    }

    /// Identity the stores are currently bound to
    pub fn owner(&self) -> Option<Uuid> {
        self.items.owner()
    }

    pub fn is_loading(&self) -> bool {
        self.items.is_loading() || self.folders.is_loading()
    }

    /// Rebind both stores to `identity` and load them concurrently.
    /// Without an identity the stores are emptied and nothing is fetched.
    pub async fn activate(&self, identity: Option<&Identity>) {
        self.bind(identity);
        if identity.is_some() {
            self.load().await;
        }
    }

    fn bind(&self, identity: Option<&Identity>) {
        let owner = identity.map(|i| i.id);
        self.items.bind(owner);
        self.folders.bind(owner);
        if let Some(owner) = owner {
            info!(user_id = %owner, "Activating session");
        }
    }

    async fn load(&self) {
        futures::join!(self.items.fetch_all(), self.folders.fetch_all());
    }

    /// Keep the stores in step with the published auth state until the
    /// sender goes away. Nothing happens while auth is still loading, and
    /// only an identity change triggers a reset and refetch.
    ///
    /// Stores are rebound as soon as the change is seen. Loading runs in its
    /// own task so a slow fetch never holds back the next change; the load
    /// of a replaced identity is aborted.
    pub async fn follow(self, mut auth: watch::Receiver<AuthState>) {
        let mut active: Option<Option<Uuid>> = None;
        let mut pending: Option<JoinHandle<()>> = None;

        loop {
            let state = auth.borrow_and_update().clone();
            if !state.loading {
                let next = state.identity.as_ref().map(|i| i.id);
                if active != Some(next) {
                    active = Some(next);
                    if let Some(task) = pending.take() {
                        task.abort();
                    }
                    self.bind(state.identity.as_ref());
                    if next.is_some() {
                        let session = self.clone();
                        pending = Some(tokio::spawn(async move { session.load().await }));
                    }
                }
            }

            if auth.changed().await.is_err() {
                break;
            }
        }
    }

    pub fn spawn_follow(&self, auth: watch::Receiver<AuthState>) -> JoinHandle<()> {
        tokio::spawn(self.clone().follow(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewFolder, NewItem};
    use crate::remote::MemoryRemote;
    use std::time::Duration;

    fn identity(id: Uuid) -> Identity {
        Identity {
            id,
            email: None,
        }
    }

    async fn settle(session: &ShoppingSession, owner: Option<Uuid>) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while session.owner() != owner || session.is_loading() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("session did not settle");
    }

    #[tokio::test]
    async fn test_activate_loads_both_stores() {
        let remote = MemoryRemote::new();
        let session = ShoppingSession::new(Arc::new(remote.clone()));
        let user = Uuid::new_v4();

        let seed = ShoppingSession::new(Arc::new(remote.clone()));
        seed.activate(Some(&identity(user))).await;
        seed.items.add(NewItem::new(user, "Apples")).await.unwrap();
        seed.folders.add(NewFolder::new(user, "Fruit")).await.unwrap();

        session.activate(Some(&identity(user))).await;
        assert!(!session.is_loading());
        assert_eq!(session.items.len(), 1);
        assert_eq!(session.folders.len(), 1);

        session.activate(None).await;
        assert!(session.items.is_empty());
        assert!(session.folders.is_empty());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_follow_tracks_identity_changes() {
        let remote = MemoryRemote::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let seed = ShoppingSession::new(Arc::new(remote.clone()));
        seed.activate(Some(&identity(alice))).await;
        seed.items.add(NewItem::new(alice, "Alice's bread")).await.unwrap();

        let session = ShoppingSession::new(Arc::new(remote.clone()));
        let (tx, rx) = watch::channel(AuthState::default());
        let baseline = remote.calls();
        let handle = session.spawn_follow(rx);

        // Still resolving: nothing fetched
        tokio::task::yield_now().await;
        assert_eq!(remote.calls(), baseline);

        tx.send_replace(AuthState::resolved(Some(identity(alice))));
        settle(&session, Some(alice)).await;
        assert_eq!(session.items.rows()[0].name, "Alice's bread");

        tx.send_replace(AuthState::resolved(Some(identity(bob))));
        settle(&session, Some(bob)).await;
        assert!(session.items.is_empty());

        tx.send_replace(AuthState::resolved(None));
        settle(&session, None).await;

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sign_out_is_not_held_back_by_a_hung_fetch() {
        let remote = MemoryRemote::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let seed = ShoppingSession::new(Arc::new(remote.clone()));
        seed.activate(Some(&identity(alice))).await;
        seed.items.add(NewItem::new(alice, "Alice's bread")).await.unwrap();

        let session = ShoppingSession::new(Arc::new(remote.clone()));
        let (tx, rx) = watch::channel(AuthState::resolved(Some(identity(alice))));
        let handle = session.spawn_follow(rx);
        settle(&session, Some(alice)).await;

        remote.pause();
        tx.send_replace(AuthState::resolved(Some(identity(bob))));
        tokio::time::timeout(Duration::from_secs(2), async {
            while session.owner() != Some(bob) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("bob was never bound");
        assert!(session.is_loading());
        assert!(session.items.is_empty());

        tx.send_replace(AuthState::resolved(None));
        settle(&session, None).await;
        assert_eq!(session.owner(), None);
        assert!(session.items.is_empty());
        assert!(session.folders.is_empty());

        remote.resume();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(session.owner(), None);
        assert!(session.items.is_empty());

        drop(tx);
        handle.await.unwrap();
    }
}
