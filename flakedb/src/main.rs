// src/main.rs
//
// Minimal ledger node that wires up the flakedb library:
//
// - settings from the fdb-* environment surface
// - storage backend selected by fdb-storage-type
// - ledger registry with a dev ledger bootstrapped on first start
// - Prometheus metrics exporter on /metrics
// - periodic stats loop and graceful shutdown on Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;

use flakedb::{
    ApproveAllSpecs, FileStorage, Ledger, LedgerRegistry, MemoryStorage, MetricsRegistry,
    S3Storage, Settings, StashStorage, Storage, StorageType, Transactor, crypto,
    run_prometheus_http_server, storage,
};

/// Development signing seed. A production deployment loads the transactor
/// key from its secret store; the dev node derives a stable identity so
/// that repeated bootstraps of the same ledger are byte-identical.
const DEV_SECRET: [u8; 32] = [7u8; 32];

const DEV_NETWORK: &str = "dev";
const DEV_DBID: &str = "main";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "flakedb=info".to_string()),
        )
        .init();

    // Configuration errors at startup are fatal.
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("fatal configuration error: {e}");
            std::process::exit(1);
        }
    };

    let result = match settings.storage_type {
        StorageType::Memory => run_node(Arc::new(MemoryStorage::new()), settings).await,
        StorageType::File => {
            let store = FileStorage::open(
                settings.storage_file_directory.clone(),
                settings.encryption_secret.as_deref(),
            );
            run_node(Arc::new(store), settings).await
        }
        StorageType::S3 => {
            let endpoint = std::env::var("FDB_STORAGE_S3_ENDPOINT")
                .unwrap_or_else(|_| "http://127.0.0.1:9000".to_string());
            let bucket = settings
                .storage_s3_bucket
                .clone()
                .expect("validated at configuration load");
            match S3Storage::open(endpoint, bucket, Duration::from_secs(10)) {
                Ok(store) => run_node(Arc::new(store), settings).await,
                Err(e) => Err(format!("failed to open S3 storage: {e}")),
            }
        }
        StorageType::Stash => {
            let endpoint = std::env::var("FDB_STORAGE_STASH_ENDPOINT")
                .unwrap_or_else(|_| "http://127.0.0.1:8200".to_string());
            match StashStorage::open(endpoint, Duration::from_secs(10)) {
                Ok(store) => run_node(Arc::new(store), settings).await,
                Err(e) => Err(format!("failed to open stash storage: {e}")),
            }
        }
    };

    if let Err(e) = result {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run_node<S: Storage + 'static>(store: Arc<S>, settings: Settings) -> Result<(), String> {
    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    {
        let metrics_clone = metrics.clone();
        let addr: std::net::SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::warn!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{addr}/metrics");
    }

    // ---------------------------
    // Ledger registry + dev ledger
    // ---------------------------

    let registry = Arc::new(LedgerRegistry::new());

    let genesis_key = storage::block_key(DEV_NETWORK, DEV_DBID, 1);
    let fresh = !store
        .exists(&genesis_key)
        .await
        .map_err(|e| format!("storage probe failed: {e}"))?;

    let cmd = format!(
        r#"{{"type":"new-db","db":"{DEV_NETWORK}/{DEV_DBID}","nonce":1,"expire":0}}"#
    );
    let sig = crypto::sign_recoverable(&DEV_SECRET, cmd.as_bytes())
        .map_err(|e| format!("failed to sign genesis command: {e}"))?;
    let (ledger, genesis_block) = Ledger::genesis(DEV_NETWORK, DEV_DBID, &cmd, &sig, 0)
        .map_err(|e| format!("bootstrap failed: {e}"))?;

    if fresh {
        store
            .write(&genesis_key, &genesis_block.canonical_bytes())
            .await
            .map_err(|e| format!("failed to persist genesis block: {e}"))?;
        tracing::info!(
            hash = %genesis_block.hash,
            flakes = genesis_block.flakes.len(),
            "bootstrapped dev ledger {DEV_NETWORK}/{DEV_DBID}"
        );
    } else {
        tracing::info!("dev ledger {DEV_NETWORK}/{DEV_DBID} already bootstrapped");
    }

    let ledger_handle = registry.insert(ledger).await;

    // ---------------------------
    // Transactor
    // ---------------------------

    // The consensus collaborator feeds commands into the transactor; this
    // binary keeps the stats loop alive and reports flush eligibility.
    let transactor: Transactor<S, ApproveAllSpecs> = Transactor::new(
        store.clone(),
        ApproveAllSpecs,
        settings.novelty_min_bytes as usize,
        settings.novelty_max_bytes as usize,
    );

    // ---------------------------
    // Stats loop + shutdown
    // ---------------------------

    let stats_metrics = metrics.clone();
    let stats_handle = ledger_handle.clone();
    tokio::spawn(async move {
        loop {
            {
                let ledger = stats_handle.lock().await;
                stats_metrics
                    .ledger
                    .novelty_bytes
                    .set(ledger.novelty.size() as i64);
                tracing::info!(
                    block = ledger.block,
                    t = ledger.t,
                    novelty_bytes = ledger.novelty.size(),
                    flakes = ledger.stats.flakes,
                    "ledger stats"
                );
                if transactor.reindex_eligible(&ledger) {
                    tracing::info!("novelty above soft threshold, indexer may flush");
                }
            }
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
    });

    shutdown_signal().await;
    registry.shutdown().await;
    store
        .close()
        .await
        .map_err(|e| format!("storage close failed: {e}"))?;
    tracing::info!("node stopped");
    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
