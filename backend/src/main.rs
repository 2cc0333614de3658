//! Service entry point: settings, tracing, store selection, HTTP server.

use std::env;
use std::sync::Arc;

use actix_web::web;
use color_eyre::eyre::{Result, WrapErr};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use backend::domain::RegistrationService;
use backend::domain::ports::FixtureAuthVerifier;
use backend::inbound::http::health::HealthState;
use backend::inbound::http::state::HttpState;
use backend::outbound::memory::InMemoryNetworkStore;
use backend::outbound::postgres::PostgresNetworkStore;
use backend::server::{self, AppSettings};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings =
        AppSettings::load_from_iter(env::args_os()).wrap_err("failed to load settings")?;
    let bind_addr = settings.bind_addr().wrap_err("invalid bind address")?;

    // Verified-phone identity still comes from the fixture verifier; the
    // identity-provider adapter replaces it when that integration lands.
    let auth = Arc::new(FixtureAuthVerifier);
    let clock = Arc::new(DefaultClock);

    let state = match settings.database_url.as_deref() {
        Some(url) => {
            let store = PostgresNetworkStore::connect(url)
                .await
                .wrap_err("failed to connect to PostgreSQL")?;
            if settings.run_migrations {
                store.migrate().await.wrap_err("failed to run migrations")?;
            }
            info!("using the PostgreSQL network store");
            HttpState::for_service(
                Arc::new(RegistrationService::new(Arc::new(store), clock)),
                auth,
            )
        }
        None => {
            warn!("no database configured; state lives in this process only");
            HttpState::for_service(
                Arc::new(RegistrationService::new(
                    Arc::new(InMemoryNetworkStore::new()),
                    clock,
                )),
                auth,
            )
        }
    };

    let health = web::Data::new(HealthState::new());
    let server = server::run(bind_addr, state, health.clone())
        .wrap_err_with(|| format!("failed to bind {bind_addr}"))?;

    info!(%bind_addr, "listening");
    health.mark_ready();
    server.await.wrap_err("server terminated abnormally")
}
