//! OpenSASE Marketplace - Self-hosted multi-vendor marketplace

use anyhow::Result;
use opensase_marketplace::api::{self, AppState};
use opensase_marketplace::config::Config;
use opensase_marketplace::events::EventBus;
use opensase_marketplace::gateway::SimulatedGateway;
use opensase_marketplace::service::Marketplace;
use opensase_marketplace::storage::postgres::PgStorage;
use opensase_marketplace::storage::StorageService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let storage = match &config.database_url {
        Some(url) => StorageService::new(Box::new(PgStorage::connect(url, config.db_max_connections).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage; data is lost on restart");
            StorageService::in_memory()
        }
    };
    let events = match &config.nats_url {
        Some(url) => match EventBus::connect(url).await {
            Ok(bus) => bus,
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, domain events will only be logged");
                EventBus::default()
            }
        },
        None => EventBus::default(),
    };
    let gateway = Box::new(SimulatedGateway::new(config.payment.clone()));
    let marketplace = Marketplace::new(storage, events, gateway, config.pricing.clone());

    if let Some(email) = &config.bootstrap_admin_email {
        let admin = marketplace.bootstrap_admin(email).await?;
        tracing::info!(user_id = %admin.id, "admin account ready");
    }

    let app = api::router(AppState::new(marketplace));
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("OpenSASE Marketplace listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
