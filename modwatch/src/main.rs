use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use modwatch::api::{ApiServer, AppState};
use modwatch::catalog::CurseForgeClient;
use modwatch::config::AppConfig;
use modwatch::database::{self, repositories::SqlxReleaseRepository};
use modwatch::logging;
use modwatch::notification::DiscordDispatcher;
use modwatch::scheduler::UpdateScanner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = logging::init_logging(&config.logging_settings())?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting modwatch");
    debug!(?config, "Loaded configuration");

    let cancel = CancellationToken::new();
    if let Some(log_dir) = &config.log_dir {
        logging::start_retention_cleanup(log_dir.clone(), cancel.clone());
    }

    let pool = database::open_ledger(&config.database_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open release ledger at {}",
                config.database_path.display()
            )
        })?;
    let ledger = Arc::new(SqlxReleaseRepository::new(pool.clone()));
    let catalog = Arc::new(CurseForgeClient::new(config.curseforge_config())?);
    let dispatcher = Arc::new(DiscordDispatcher::new(config.discord_config())?);

    let scanner = Arc::new(UpdateScanner::new(
        catalog,
        ledger,
        dispatcher,
        config.channel_router(),
        config.scanner_config(),
    ));

    let mut scanner_task = tokio::spawn(scanner.clone().run(cancel.clone()));

    let api_task = config.api_enabled.then(|| {
        let server = ApiServer::new(
            config.api_server_config(),
            AppState::new(scanner.clone(), cancel.clone()),
        );
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!(error = %e, "API server failed");
            }
        })
    });

    let scanner_result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received, stopping");
            cancel.cancel();
            scanner_task.await
        }
        result = &mut scanner_task => {
            cancel.cancel();
            result
        }
    };

    if let Some(api_task) = api_task
        && let Err(e) = api_task.await
    {
        error!(error = %e, "API server task panicked");
    }

    pool.close().await;

    scanner_result
        .context("Update scanner task panicked")?
        .context("Update scanner stopped with an error")?;

    info!("modwatch stopped");
    Ok(())
}
