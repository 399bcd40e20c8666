use std::sync::Arc;

use anyhow::Context;

use almacen_session::{
    HttpAuthService, InMemoryBroadcast, SessionConfig, SessionManager, TracingNavigator,
};

const EMAIL_ENV: &str = "ALMACEN_EMAIL";
const PASSWORD_ENV: &str = "ALMACEN_PASSWORD";

/// Headless session keeper: resolves (or opens) a session and keeps it
/// refreshed until Ctrl-C, then logs out.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    almacen_observability::init();

    let config = SessionConfig::from_env();
    let auth = HttpAuthService::from_config(&config).context("failed to build HTTP client")?;

    let bus = InMemoryBroadcast::new();
    let manager = SessionManager::builder(Arc::new(auth), Arc::new(bus.open_tab()))
        .config(config)
        .navigator(Arc::new(TracingNavigator))
        .build();
    let listener = manager.spawn_sync_listener();
    let reresolver = manager.spawn_reresolver();

    manager.resolve_session().await;

    if !manager.is_authenticated() {
        match (std::env::var(EMAIL_ENV), std::env::var(PASSWORD_ENV)) {
            (Ok(email), Ok(password)) => {
                if let Err(e) = manager.login(&email, &password).await {
                    anyhow::bail!("login failed: {}", e.user_message());
                }
            }
            _ => {
                tracing::warn!("no session to resume and {EMAIL_ENV}/{PASSWORD_ENV} not set");
                return Ok(());
            }
        }
    }

    let snapshot = serde_json::to_string(&manager.snapshot())?;
    tracing::info!(session = %snapshot, "session active; press Ctrl-C to log out");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    manager.logout().await;
    listener.abort();
    reresolver.abort();
    Ok(())
}
