//! GoTrue client owning the current session

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use super::token::decode_access_token;
use super::{AuthError, AuthState, Identity};
use crate::remote::SupabaseClient;

#[derive(Debug, Serialize)]
struct PasswordCredentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// User object embedded in GoTrue responses
#[derive(Debug, Clone, Deserialize)]
struct AuthUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

/// Token grant returned by sign-in, refresh and auto-confirmed sign-up
#[derive(Debug, Clone, Deserialize)]
struct AuthSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: AuthUser,
}

/// Sign-up answers with a session, or with a bare user when email
/// confirmation is pending
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(AuthSession),
    User(AuthUser),
}

/// Auth session collaborator: signs in and out and publishes the current
/// [`AuthState`] to subscribers. Clones share the session.
#[derive(Clone)]
pub struct AuthClient {
    supabase: SupabaseClient,
    jwt_secret: Option<String>,
    state: Arc<watch::Sender<AuthState>>,
    refresh_token: Arc<RwLock<Option<String>>>,
}

impl AuthClient {
    /// Starts in the loading state until a sign-in, restore or sign-out
    pub fn new(supabase: SupabaseClient, jwt_secret: Option<String>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            supabase,
            jwt_secret,
            state: Arc::new(state),
            refresh_token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    /// Resolve identity from a previously issued access token (or none)
    pub fn restore(&self, access_token: Option<&str>) -> Result<Option<Identity>, AuthError> {
        let Some(token) = access_token else {
            self.clear();
            return Ok(None);
        };

        match decode_access_token(token, self.jwt_secret.as_deref()) {
            Ok(claims) => {
                let identity = Identity::from(claims);
                self.supabase.set_access_token(Some(token.to_string()));
                self.publish(Some(identity.clone()));
                info!(user_id = %identity.id, "Session restored");
                Ok(Some(identity))
            }
            Err(e) => {
                warn!(error = %e, "Stored access token rejected");
                self.clear();
                Err(e)
            }
        }
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let url = self.supabase.auth_url("token?grant_type=password");
        let session: AuthSession = self
            .post(&url, &PasswordCredentials { email, password })
            .await?;
        Ok(self.install(session))
    }

    /// Register a user. Returns the identity when the server signs the user
    /// in right away, `None` when email confirmation is pending.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Identity>, AuthError> {
        let url = self.supabase.auth_url("signup");
        let response: SignUpResponse = self
            .post(&url, &PasswordCredentials { email, password })
            .await?;

        match response {
            SignUpResponse::Session(session) => Ok(Some(self.install(session))),
            SignUpResponse::User(user) => {
                info!(user_id = %user.id, "Sign-up pending email confirmation");
                Ok(None)
            }
        }
    }

    /// Exchange the refresh token for a new access token
    pub async fn refresh(&self) -> Result<Identity, AuthError> {
        let refresh_token = self
            .refresh_token
            .read()
            .clone()
            .ok_or(AuthError::NotSignedIn)?;

        let url = self.supabase.auth_url("token?grant_type=refresh_token");
        let session: AuthSession = self
            .post(
                &url,
                &RefreshRequest {
                    refresh_token: &refresh_token,
                },
            )
            .await?;
        Ok(self.install(session))
    }

    /// Revoke this session server-side and clear it locally.
    ///
    /// Local state is cleared even when the server call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = if self.supabase.has_access_token() {
            let url = self.supabase.auth_url("logout?scope=local");
            match self
                .supabase
                .authorize(self.supabase.http().post(&url))
                .send()
                .await
            {
                Ok(response) => check_status(response).await.map(|_| ()),
                Err(e) => Err(AuthError::Request(e)),
            }
        } else {
            Ok(())
        };

        if let Err(e) = &result {
            warn!(error = %e, "Server-side sign-out failed");
        }
        self.clear();
        info!("Signed out");
        result
    }

    async fn post<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, AuthError> {
        let response = self
            .supabase
            .http()
            .post(url)
            .header("apikey", self.supabase.anon_key())
            .json(body)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    fn install(&self, session: AuthSession) -> Identity {
        let identity = Identity {
            id: session.user.id,
            email: session.user.email,
        };
        self.supabase.set_access_token(Some(session.access_token));
        *self.refresh_token.write() = session.refresh_token;
        self.publish(Some(identity.clone()));
        info!(user_id = %identity.id, "Signed in");
        identity
    }

    fn clear(&self) {
        self.supabase.set_access_token(None);
        *self.refresh_token.write() = None;
        self.publish(None);
    }

    fn publish(&self, identity: Option<Identity>) {
        self.state.send_replace(AuthState::resolved(identity));
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::BAD_REQUEST && body.contains("invalid_grant") {
        return Err(AuthError::InvalidCredentials);
    }
    Err(AuthError::Api {
        status: status.as_u16(),
        body,
    })
}
