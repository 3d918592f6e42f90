//! Backend entry-point: loads settings, wires adapters and serves the REST API.

mod server;

use actix_web::web;
use color_eyre::eyre::{Context, Result, eyre};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use learning_platform::inbound::http::health::HealthState;
use server::{AppSettings, build_runtime, create_server};

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

    let settings = AppSettings::load_from_iter(std::env::args_os())
        .map_err(|err| eyre!("load settings: {err}"))?;
    let bind_addr = settings.bind_addr().wrap_err("parse bind address")?;

    let runtime = build_runtime(&settings).await?;
    let health_state = web::Data::new(HealthState::new(runtime.store));
    let server = create_server(health_state.clone(), runtime.http_state, bind_addr)
        .wrap_err_with(|| format!("bind {bind_addr}"))?;
    info!(%bind_addr, "serving enrollment API");

    let outcome = server.await.wrap_err("run HTTP server");
    health_state.mark_unhealthy();
    for task in runtime.background {
        task.abort();
    }
    outcome
}
