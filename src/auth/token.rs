//! Access token decoding and verification

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// JWT claims from a Supabase access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Audience
    #[serde(default)]
    pub aud: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: u64,
    /// Email (if available)
    #[serde(default)]
    pub email: Option<String>,
    /// Role
    #[serde(default)]
    pub role: Option<String>,
}

/// Decode an access token and extract its claims.
///
/// The HMAC-SHA256 signature is only checked when `secret` is given; the
/// server checks it on every request regardless. Expiry is always checked.
pub fn decode_access_token(token: &str, secret: Option<&str>) -> Result<TokenClaims, AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::InvalidToken);
    };

    if let Some(secret) = secret {
        let message = format!("{}.{}", header_b64, payload_b64);

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| AuthError::InvalidToken)?;
        mac.update(message.as_bytes());

        let provided_signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::InvalidToken)?;

        // Constant-time comparison
        mac.verify_slice(&provided_signature)
            .map_err(|_| AuthError::InvalidToken)?;
    }

    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    let claims: TokenClaims =
        serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();

    if claims.exp < now {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}
