use anyhow::{anyhow, Context};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use privacy_diagnosis::catalog;
use privacy_diagnosis::config::loader;
use privacy_diagnosis::log_collector::parse_level;
use privacy_diagnosis::{AsyncDiagnosisService, DiagnosisService, LogCollector, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // =========================================================================
    // CONFIGURATION
    // =========================================================================
    let explicit_config = std::env::args().nth(1).map(PathBuf::from);
    let config = loader::load_or_default(explicit_config.as_deref())
        .context("Failed to load engine configuration")?;

    // =========================================================================
    // LOGGING - before anything that logs
    // =========================================================================
    let log_collector = LogCollector::new(
        &config.log_dir,
        parse_level(&config.log_level),
        config.log_to_stderr,
    )
    .map_err(|e| anyhow!("LogCollector initialization failed: {}", e))?;
    let flusher = log_collector.clone();
    if let Err(e) = log_collector.install() {
        eprintln!("[Main] WARNING: {}", e);
    }
    log::info!("[Main] privacy_diagnosis {} starting", privacy_diagnosis::VERSION);
    log::info!("[Main] {}", config.summary());

    // =========================================================================
    // STORE AND CATALOG
    // =========================================================================
    let store = Store::open(&config.database_path, config.busy_timeout())
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    let service = DiagnosisService::new(Arc::new(store), config.clone());

    if let Some(path) = &config.catalog_path {
        let seed = catalog::load_seed_from_file(path)
            .with_context(|| format!("Failed to load catalog seed {}", path.display()))?;
        let summary = service.import_catalog(&seed)?;
        log::info!(
            "[Main] catalog ready: {} quantitative, {} qualitative questions",
            summary.quantitative,
            summary.qualitative
        );
    }

    // =========================================================================
    // COMMAND LOOP - one JSON command per stdin line, one reply per stdout line
    // =========================================================================
    let service = AsyncDiagnosisService::new(service);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut handled = 0u64;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = service.handle_line(line).await;
        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        handled += 1;
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================
    log::info!("[Main] stdin closed after {} commands, shutting down", handled);
    if let Err(e) = flusher.wait_for_empty().await {
        eprintln!("[Main] WARNING: Failed to flush logs: {}", e);
    }
    Ok(())
}
