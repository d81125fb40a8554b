//! In-memory remote that behaves like the Supabase tables.
//!
//! Assigns ids and timestamps, applies column defaults and not-null checks,
//! and can be told to fail or stall so store behavior under transport
//! failures and races can be exercised without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::watch;
use uuid::Uuid;

use super::{RemoteError, RemoteTable, FOLDERS_TABLE, ITEMS_TABLE};

/// Column defaults and not-null columns of one table
#[derive(Debug, Clone, Default)]
struct TableSchema {
    defaults: Map<String, Value>,
    required: Vec<&'static str>,
}

struct Inner {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    schemas: HashMap<&'static str, TableSchema>,
    failures: Mutex<VecDeque<RemoteError>>,
    last_stamp: Mutex<DateTime<Utc>>,
    paused: watch::Sender<bool>,
    held: watch::Sender<bool>,
    holds: AtomicUsize,
    calls: AtomicUsize,
}

/// Shared handle to an in-memory database
#[derive(Clone)]
pub struct MemoryRemote {
    inner: Arc<Inner>,
}

impl MemoryRemote {
    /// Empty database with the `shopping_items` and `folders` schemas
    pub fn new() -> Self {
        let mut schemas = HashMap::new();

        let mut item_defaults = Map::new();
        item_defaults.insert("folder_id".into(), Value::Null);
        item_defaults.insert("purchase_link".into(), Value::Null);
        item_defaults.insert("image_url".into(), Value::Null);
        item_defaults.insert("status".into(), Value::String("pending".into()));
        schemas.insert(
            ITEMS_TABLE,
            TableSchema {
                defaults: item_defaults,
                required: vec!["user_id", "name", "status"],
            },
        );

        let mut folder_defaults = Map::new();
        folder_defaults.insert("color".into(), Value::String("#3B82F6".into()));
        schemas.insert(
            FOLDERS_TABLE,
            TableSchema {
                defaults: folder_defaults,
                required: vec!["user_id", "name", "color"],
            },
        );

        let (paused, _) = watch::channel(false);
        let (held, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(HashMap::new()),
                schemas,
                failures: Mutex::new(VecDeque::new()),
                last_stamp: Mutex::new(DateTime::<Utc>::MIN_UTC),
                paused,
                held,
                holds: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Make the next call fail with `error` (queued, one call per error)
    pub fn fail_next(&self, error: RemoteError) {
        self.inner.failures.lock().push_back(error);
    }

    /// Stall every call until [`resume`](Self::resume)
    pub fn pause(&self) {
        self.inner.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.inner.paused.send_replace(false);
    }

    /// Apply the next call right away but hold back its reply until
    /// [`release`](Self::release)
    pub fn hold_next_reply(&self) {
        self.inner.holds.fetch_add(1, Ordering::SeqCst);
        self.inner.held.send_replace(true);
    }

    pub fn release(&self) {
        self.inner.held.send_replace(false);
    }

    /// Number of calls received so far, failed ones included
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of a table in storage order
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.inner
            .tables
            .lock()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Run one operation: count it, honor pause, pop a queued failure,
    /// apply it and hand back the reply once no hold is in the way
    async fn serve<T>(&self, op: impl FnOnce() -> Result<T, RemoteError>) -> Result<T, RemoteError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        wait_while(&self.inner.paused).await;

        let held = self
            .inner
            .holds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let queued = self.inner.failures.lock().pop_front();
        let result = match queued {
            Some(error) => Err(error),
            None => op(),
        };

        if held {
            wait_while(&self.inner.held).await;
        }
        result
    }

    /// Strictly increasing server clock so `created_at` ordering is total
    fn stamp(&self) -> String {
        let mut last = self.inner.last_stamp.lock();
        let mut now = Utc::now();
        if now <= *last {
            now = *last + Duration::microseconds(1);
        }
        *last = now;
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn check_not_null(&self, table: &str, row: &Map<String, Value>) -> Result<(), RemoteError> {
        let Some(schema) = self.inner.schemas.get(table) else {
            return Ok(());
        };
        for column in &schema.required {
            if row.get(*column).map_or(true, Value::is_null) {
                return Err(RemoteError::Api {
                    status: 400,
                    body: format!(
                        "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                        column, table
                    ),
                });
            }
        }
        Ok(())
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_while(flag: &watch::Sender<bool>) {
    let mut rx = flag.subscribe();
    loop {
        let set = *rx.borrow_and_update();
        if !set || rx.changed().await.is_err() {
            break;
        }
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, RemoteError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(RemoteError::Api {
            status: 400,
            body: format!("expected a JSON object, got {}", other),
        }),
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn created_at(row: &Value) -> Option<DateTime<Utc>> {
    row.get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl RemoteTable for MemoryRemote {
    async fn select_owned(&self, table: &str, user_id: Uuid) -> Result<Vec<Value>, RemoteError> {
        self.serve(|| Ok(self.select_rows(table, user_id))).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        self.serve(|| self.insert_row(table, row)).await
    }

    async fn update(&self, table: &str, id: Uuid, patch: Value) -> Result<Value, RemoteError> {
        self.serve(|| self.update_row(table, id, patch)).await
    }

    async fn delete(&self, table: &str, id: Uuid) -> Result<(), RemoteError> {
        self.serve(|| self.delete_row(table, id)).await
    }
}

impl MemoryRemote {
    fn select_rows(&self, table: &str, user_id: Uuid) -> Vec<Value> {
        let owner = user_id.to_string();
        let mut rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| row.get("user_id").and_then(Value::as_str) == Some(owner.as_str()))
            .collect();
        rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
        rows
    }

    fn insert_row(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        let mut row = into_object(row)?;
        if let Some(schema) = self.inner.schemas.get(table) {
            for (column, default) in &schema.defaults {
                row.entry(column.clone()).or_insert_with(|| default.clone());
            }
        }
        self.check_not_null(table, &row)?;

        let stamp = self.stamp();
        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        row.insert("created_at".into(), Value::String(stamp.clone()));
        row.insert("updated_at".into(), Value::String(stamp));

        let row = Value::Object(row);
        self.inner
            .tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    /// Merge `patch` into the row. A patch carrying `updated_at` keeps the
    /// caller's value, which comes from the client clock; only patches
    /// without one are stamped from the server clock of [`stamp`](Self::stamp).
    /// The two clocks are not ordered against each other.
    fn update_row(&self, table: &str, id: Uuid, patch: Value) -> Result<Value, RemoteError> {
        let patch = into_object(patch)?;
        let key = id.to_string();
        let mut tables = self.inner.tables.lock();
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == Some(key.as_str())))
            .ok_or_else(|| RemoteError::not_found(table, id))?;

        let touched = patch.contains_key("updated_at");
        let mut merged = into_object(row.clone())?;
        for (column, value) in patch {
            if column != "id" && column != "created_at" {
                merged.insert(column, value);
            }
        }
        self.check_not_null(table, &merged)?;
        if !touched {
            merged.insert("updated_at".into(), Value::String(self.stamp()));
        }

        *row = Value::Object(merged);
        Ok(row.clone())
    }

    fn delete_row(&self, table: &str, id: Uuid) -> Result<(), RemoteError> {
        let key = id.to_string();
        let mut tables = self.inner.tables.lock();
        let rows = tables.get_mut(table).ok_or_else(|| RemoteError::not_found(table, id))?;
        let before = rows.len();
        rows.retain(|row| row_id(row) != Some(key.as_str()));
        if rows.len() == before {
            return Err(RemoteError::not_found(table, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_insert_assigns_identity_and_defaults() {
        let remote = MemoryRemote::new();
        let user = Uuid::new_v4();

        let row = assert_ok!(remote.insert(ITEMS_TABLE, json!({ "user_id": user, "name": "Milk" })).await);
        assert!(Uuid::parse_str(row["id"].as_str().unwrap()).is_ok());
        assert_eq!(row["status"], "pending");
        assert_eq!(row["created_at"], row["updated_at"]);
    }

    #[tokio::test]
    async fn test_not_null_violation_is_rejected() {
        let remote = MemoryRemote::new();
        let err = assert_err!(remote.insert(FOLDERS_TABLE, json!({ "user_id": Uuid::new_v4(), "name": null })).await);
        assert!(matches!(err, RemoteError::Api { status: 400, .. }));
        assert!(remote.rows(FOLDERS_TABLE).is_empty());
    }

    #[tokio::test]
    async fn test_select_filters_owner_newest_first() {
        let remote = MemoryRemote::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        remote.insert(FOLDERS_TABLE, json!({ "user_id": alice, "name": "first" })).await.unwrap();
        remote.insert(FOLDERS_TABLE, json!({ "user_id": bob, "name": "other" })).await.unwrap();
        remote.insert(FOLDERS_TABLE, json!({ "user_id": alice, "name": "second" })).await.unwrap();

        let rows = remote.select_owned(FOLDERS_TABLE, alice).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["second", "first"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_row() {
        let remote = MemoryRemote::new();
        let id = Uuid::new_v4();

        let err = assert_err!(remote.update(ITEMS_TABLE, id, json!({ "name": "x" })).await);
        assert!(matches!(err, RemoteError::NotFound { .. }));
        let err = assert_err!(remote.delete(ITEMS_TABLE, id).await);
        assert!(matches!(err, RemoteError::NotFound { id: missing, .. } if missing == id));
    }

    #[tokio::test]
    async fn test_fail_next_consumes_one_call() {
        let remote = MemoryRemote::new();
        remote.fail_next(RemoteError::Transport("connection reset".into()));

        assert_err!(remote.select_owned(ITEMS_TABLE, Uuid::new_v4()).await);
        assert_ok!(remote.select_owned(ITEMS_TABLE, Uuid::new_v4()).await);
        assert_eq!(remote.calls(), 2);
    }

    #[tokio::test]
    async fn test_held_reply_is_applied_before_release() {
        let remote = MemoryRemote::new();
        let user = Uuid::new_v4();
        remote.hold_next_reply();

        let pending = tokio::spawn({
            let remote = remote.clone();
            async move { remote.insert(FOLDERS_TABLE, json!({ "user_id": user, "name": "Held" })).await }
        });
        tokio::task::yield_now().await;

        // Visible to other callers while the reply is still held
        let rows = assert_ok!(remote.select_owned(FOLDERS_TABLE, user).await);
        assert_eq!(rows.len(), 1);
        assert!(!pending.is_finished());

        remote.release();
        let row = assert_ok!(pending.await.unwrap());
        assert_eq!(row["id"], rows[0]["id"]);
    }

    #[tokio::test]
    async fn test_update_keeps_client_stamp_or_stamps_from_server_clock() {
        let remote = MemoryRemote::new();
        let row = remote
            .insert(FOLDERS_TABLE, json!({ "user_id": Uuid::new_v4(), "name": "Fruit" }))
            .await
            .unwrap();
        let id = Uuid::parse_str(row["id"].as_str().unwrap()).unwrap();

        let client_stamp = "2001-01-01T00:00:00.000000Z";
        let kept = assert_ok!(
            remote
                .update(FOLDERS_TABLE, id, json!({ "name": "Veg", "updated_at": client_stamp }))
                .await
        );
        assert_eq!(kept["updated_at"], client_stamp);

        let stamped = assert_ok!(remote.update(FOLDERS_TABLE, id, json!({ "name": "Nuts" })).await);
        let inserted = created_at(&row).unwrap();
        let updated = DateTime::parse_from_rfc3339(stamped["updated_at"].as_str().unwrap()).unwrap();
        assert!(updated > inserted);
        assert_eq!(stamped["created_at"], row["created_at"]);
    }
}
