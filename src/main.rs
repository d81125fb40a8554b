//! basket - command-line access to a Supabase-backed shopping list
//!
//! Signs in with `BASKET_EMAIL` / `BASKET_PASSWORD`, loads the user's items
//! and folders, runs one command and signs out again.

mod cli;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use basket_sync::app::AppState;
use basket_sync::config::Config;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    let state = AppState::new(config);

    let (Some(email), Some(password)) = (&state.config.email, &state.config.password) else {
        anyhow::bail!("BASKET_EMAIL and BASKET_PASSWORD must be set");
    };

    let identity = state.auth.sign_in_with_password(email, password).await?;
    info!(user = %identity.handle(), "Loading shopping list");
    state.session.activate(Some(&identity)).await;

    let outcome = cli::run(&state.session, identity.id, cli.command).await;

    state.auth.sign_out().await.ok();
    outcome
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
