//! Application state shared by the binary's commands

use std::sync::Arc;

use crate::app::ShoppingSession;
use crate::auth::AuthClient;
use crate::config::Config;
use crate::remote::SupabaseClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub supabase: SupabaseClient,
    pub auth: AuthClient,
    pub session: ShoppingSession,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // One client shared by auth and the stores so they see the same access token
        let supabase = SupabaseClient::new(&config);
        let auth = AuthClient::new(supabase.clone(), config.supabase_jwt_secret.clone());

        // Stores stay unbound until an identity is activated
        let session = ShoppingSession::new(Arc::new(supabase.clone()));

        Self {
            config,
            supabase,
            auth,
            session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_carries_sign_in_credentials() {
        let mut config = Config::new("http://127.0.0.1:9/", "anon");
        config.email = Some("ann@example.com".into());
        config.password = Some("hunter2".into());

        let state = AppState::new(config);
        assert_eq!(state.config.email.as_deref(), Some("ann@example.com"));
        assert_eq!(state.config.password.as_deref(), Some("hunter2"));
        assert_eq!(state.config.supabase_url, "http://127.0.0.1:9");
        assert!(state.session.owner().is_none());
        assert!(state.auth.current().loading);
    }
}
