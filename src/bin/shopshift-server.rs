use anyhow::Context;
use shopshift::config::ServerConfig;
use shopshift::http::{router, AppState};
use shopshift::Scheduler;
use shopshift_client::{BackendClient, ClientConfig};
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(format!(
        "warn,shopshift={level},shopshift_client={level},tower_http={level}",
        level = log_level
    ))
    .context("invalid RUST_LOG filter")?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let config = ServerConfig::from_env();
    let backend = BackendClient::from_env().context("failed to configure Supabase client")?;
    let scheduler = Scheduler::new(backend.clone())?;

    let maintenance = match &config.service_role_key {
        Some(key) => {
            let client_config = ClientConfig::new(backend.config().url.as_str(), key.clone())?;
            Scheduler::new(BackendClient::new(client_config)?)?
        }
        None => {
            warn!("SUPABASE_SERVICE_ROLE_KEY is not set, maintenance jobs run with the public key");
            scheduler.clone()
        }
    };
    if config.cron_secret.is_none() {
        warn!("CRON_SECRET is not set, cron endpoints will refuse every request");
    }

    let app = router(AppState {
        scheduler,
        maintenance,
        cron_secret: config.cron_secret.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!(addr = %config.addr, "shopshift server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
