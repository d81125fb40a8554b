//! Supabase REST (PostgREST) client acting on behalf of the signed-in user

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{RemoteError, RemoteTable};
use crate::config::Config;

/// Supabase client for user-scoped database operations.
///
/// Requests carry the anon key plus the user's access token once signed in,
/// so row-level security applies. Clones share the access token.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    access_token: Arc<RwLock<Option<String>>>,
}

impl SupabaseClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            access_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Install (or clear) the user access token used as bearer
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.read().is_some()
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Get a GoTrue auth endpoint URL
    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// Attach apikey and bearer headers; falls back to the anon key when signed out
    pub(crate) fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .access_token
            .read()
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());

        builder
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Content-Type", "application/json")
    }

    /// Make an authenticated GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, RemoteError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(RemoteError::Request)?;

        let response = check_status(response).await?;
        response.json().await.map_err(RemoteError::Parse)
    }

    /// Make an authenticated POST request (insert)
    pub async fn insert<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        table: &str,
        data: &T,
    ) -> Result<R, RemoteError> {
        let url = self.rest_url(table);

        let response = self
            .authorize(self.client.post(&url))
            .header("Prefer", "return=representation")
            .json(data)
            .send()
            .await
            .map_err(RemoteError::Request)?;

        let response = check_status(response).await?;

        // PostgREST returns an array, get first element
        let results: Vec<R> = response.json().await.map_err(RemoteError::Parse)?;
        results
            .into_iter()
            .next()
            .ok_or(RemoteError::NoRowReturned)
    }

    /// Make an authenticated PATCH request (update), returning the affected rows
    pub async fn update<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
        data: &T,
    ) -> Result<Vec<R>, RemoteError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authorize(self.client.patch(&url))
            .header("Prefer", "return=representation")
            .json(data)
            .send()
            .await
            .map_err(RemoteError::Request)?;

        let response = check_status(response).await?;
        response.json().await.map_err(RemoteError::Parse)
    }

    /// Make an authenticated DELETE request, returning the removed rows
    pub async fn delete<R: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<R>, RemoteError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authorize(self.client.delete(&url))
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(RemoteError::Request)?;

        let response = check_status(response).await?;
        response.json().await.map_err(RemoteError::Parse)
    }
}

#[async_trait]
impl RemoteTable for SupabaseClient {
    async fn select_owned(&self, table: &str, user_id: Uuid) -> Result<Vec<Value>, RemoteError> {
        let rows: Vec<Value> = self.get(table, &owner_query(user_id)).await?;
        debug!(table, user_id = %user_id, count = rows.len(), "Selected rows");
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        // PostgREST accepts a one-element array for bulk-style inserts
        SupabaseClient::insert(self, table, &[row]).await
    }

    async fn update(&self, table: &str, id: Uuid, patch: Value) -> Result<Value, RemoteError> {
        let rows: Vec<Value> = SupabaseClient::update(self, table, &id_query(id), &patch).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RemoteError::not_found(table, id))
    }

    async fn delete(&self, table: &str, id: Uuid) -> Result<(), RemoteError> {
        let rows: Vec<Value> = SupabaseClient::delete(self, table, &id_query(id)).await?;
        if rows.is_empty() {
            return Err(RemoteError::not_found(table, id));
        }
        Ok(())
    }
}

/// Turn a non-2xx response into an API error carrying the body
async fn check_status(response: Response) -> Result<Response, RemoteError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Query for every row of one owner, newest first
fn owner_query(user_id: Uuid) -> String {
    format!("select=*&user_id=eq.{}&order=created_at.desc", user_id)
}

fn id_query(id: Uuid) -> String {
    format!("id=eq.{}", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = SupabaseClient::new(&Config::new("https://abc.supabase.co/", "anon"));
        assert_eq!(client.rest_url("folders"), "https://abc.supabase.co/rest/v1/folders");
        assert_eq!(
            client.auth_url("/token?grant_type=password"),
            "https://abc.supabase.co/auth/v1/token?grant_type=password"
        );
    }

    #[test]
    fn test_queries() {
        let id = Uuid::nil();
        assert_eq!(
            owner_query(id),
            "select=*&user_id=eq.00000000-0000-0000-0000-000000000000&order=created_at.desc"
        );
        assert_eq!(id_query(id), "id=eq.00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_access_token_shared_between_clones() {
        let client = SupabaseClient::new(&Config::new("https://abc.supabase.co", "anon"));
        let clone = client.clone();
        assert!(!clone.has_access_token());
        client.set_access_token(Some("token".into()));
        assert!(clone.has_access_token());
        client.set_access_token(None);
        assert!(!clone.has_access_token());
    }
}
