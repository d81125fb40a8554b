//! Authentication: identity resolution against Supabase GoTrue

pub mod client;
pub mod token;

pub use client::AuthClient;
pub use token::{decode_access_token, TokenClaims};

use uuid::Uuid;

/// The signed-in principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
}

impl Identity {
    /// Human-readable handle: the email when known, else the user id
    pub fn handle(&self) -> String {
        self.email.clone().unwrap_or_else(|| self.id.to_string())
    }
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
        }
    }
}

/// Published auth state. `loading` stays set until the first resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub identity: Option<Identity>,
    pub loading: bool,
}

impl AuthState {
    pub fn resolved(identity: Option<Identity>) -> Self {
        Self {
            identity,
            loading: false,
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Auth API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}
