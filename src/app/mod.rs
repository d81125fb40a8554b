//! Application wiring: session stores driven by the auth identity

pub mod session;
pub mod state;

pub use session::ShoppingSession;
pub use state::AppState;
