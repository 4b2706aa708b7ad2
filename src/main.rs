// ================================
// src/main.rs
// ================================
use anyhow::{Context, Result};
use chrono::Utc;
use green_wave::{
    catalog::TrafficLightCatalog,
    config::ParameterManager,
    controller::AdvisoryLoopController,
    destination::{resolve_destination, spawn_operator_input, Destination},
    output::ConsoleSink,
    sensors,
};
use std::{
    io::{self, BufReader, Write},
    sync::Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("green_wave=info")),
        )
        .init();

    info!("Green-wave assistant starting");

    // Parameters with hot reload
    let param_manager = Arc::new(ParameterManager::new().context("failed to load configuration")?);
    let params = param_manager.snapshot();
    if params.debug_mode {
        info!("=== Initial Parameters ===\n{:#?}", params);
    }

    // Destination from the operator, default on malformed input
    print!("Enter destination coordinates (latitude longitude): ");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("failed to read destination input")?;

    let target = resolve_destination(&line, params.fallback_destination);
    let destination = Destination::new(target);
    info!(destination = %target, "destination set");

    // Catalog must be usable before the loop starts
    let catalog = TrafficLightCatalog::load(&params.catalog_path, &params.schedules, Utc::now())
        .with_context(|| {
            format!(
                "could not load traffic-light dataset {}",
                params.catalog_path.display()
            )
        })?;

    let cancel = CancellationToken::new();
    let ctrlc_token = cancel.clone();
    ctrlc::set_handler(move || ctrlc_token.cancel()).context("failed to install Ctrl-C handler")?;

    let watcher = param_manager.start_file_watcher(cancel.clone());
    info!(
        config = %param_manager.config_path().display(),
        "hot reload enabled - edit the TOML file to change parameters"
    );

    // Further destination lines while riding
    spawn_operator_input(BufReader::new(io::stdin()), destination.clone());

    let (position, speed) = sensors::mock_sensors(&params, &destination);
    let controller = AdvisoryLoopController::new(
        Arc::new(catalog),
        destination,
        position,
        speed,
        Box::new(ConsoleSink::stdout()),
        param_manager.get_params(),
    );

    let cycles = controller.run(cancel).await;
    info!(cycles, "Green-wave assistant stopped");

    // Watcher wakes at most every 500 ms; wait for it off the async workers
    tokio::task::spawn_blocking(move || watcher.join()).await.ok();
    Ok(())
}
