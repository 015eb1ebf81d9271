//! Service entry point: wire configuration, storage, the batch stepper, the
//! scheduler and the HTTP control surface together.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cdn_image_replace::application::{spawn_scheduler, BatchStepper, ImageProcessor};
use cdn_image_replace::infrastructure::config::defaults;
use cdn_image_replace::infrastructure::{
    ConfigManager, DatabaseConnection, ImageRepository, LocalImageStore, ProgressStore,
    TransformClient,
};
use cdn_image_replace::infrastructure::logging::init_logging;
use cdn_image_replace::server::{run_server, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load_config().await?;

    init_logging(&config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), "cdn-image-replace starting");

    if config.server.api_token == defaults::API_TOKEN {
        warn!("control API token is still the default; set server.api_token in the config file");
    }

    let db = DatabaseConnection::new(&config.database.url, config.database.max_connections).await?;
    db.migrate().await?;

    let repository = Arc::new(ImageRepository::new(db.pool().clone()));
    let progress = ProgressStore::new(db.pool().clone());
    let store = LocalImageStore::new(
        &config.storage.public_base_url,
        config.storage.storage_root.clone(),
    )?;
    let fetcher = Arc::new(TransformClient::new(&config.transform)?);

    let processor = ImageProcessor::new(fetcher, store, repository.clone());
    let stepper = Arc::new(BatchStepper::new(
        progress,
        repository,
        processor,
        config.batch.batch_size,
    ));

    let shutdown = CancellationToken::new();
    let scheduler = spawn_scheduler(
        stepper.clone(),
        Duration::from_secs(config.batch.schedule_interval_secs),
        shutdown.clone(),
    );

    let state = AppState::new(stepper, config.server.api_token.clone());
    let server = run_server(state, &config.server.bind_addr)?;
    let server_handle = server.handle();
    let mut server_task = tokio::spawn(server);

    tokio::select! {
        result = &mut server_task => {
            match result {
                Ok(Err(e)) => error!(error = %e, "control server terminated"),
                Err(e) => error!(error = %e, "control server task panicked"),
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            server_handle.stop(true).await;
            let _ = server_task.await;
        }
    }

    // Persisted job state is intentionally left in place; a running job
    // resumes from its offset on the next start of the service.
    shutdown.cancel();
    let _ = scheduler.await;
    info!("cdn-image-replace stopped");
    Ok(())
}
