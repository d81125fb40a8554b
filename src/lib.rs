//! # basket_sync
//!
//! Client-side state for a personal shopping list backed by Supabase.
//!
//! ```text
//! AuthClient ──identity──▶ ShoppingSession ──▶ ItemStore / FolderStore ──▶ RemoteTable
//! ```
//!
//! The stores hold one user's rows in memory, newest first, and apply a
//! mutation locally only after the server confirmed it.

/// Application wiring: [`ShoppingSession`](app::ShoppingSession) and
/// [`AppState`](app::AppState).
pub mod app;

/// Sign-in, sign-out and the published [`AuthState`](auth::AuthState).
pub mod auth;

/// Environment configuration.
pub mod config;

/// Shopping items, folders and their insert/update payloads.
pub mod model;

/// The remote tables: Supabase over HTTP, or an in-memory stand-in.
pub mod remote;

/// Per-user collections with server-confirmed mutations.
pub mod store;

pub use app::ShoppingSession;
pub use auth::{AuthClient, AuthState, Identity};
pub use model::{Folder, ItemStatus, ShoppingItem};
pub use store::{FolderFilter, FolderStore, ItemStore, StoreError};
