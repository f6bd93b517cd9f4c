//! Optional TLS greeter server.
//!
//! # Architecture Overview
//!
//! ```text
//!     TLS client ─────┐
//!                     ▼
//!              ┌─────────────┐    ┌──────────────────────────┐    ┌─────────────┐
//!              │    net      │───▶│ OptionalTlsCredentials   │───▶│  rpc server │
//!              │  listener   │    │  rewind → sniff → decide │    │  (greeter)  │
//!              └─────────────┘    └────────────┬─────────────┘    └─────────────┘
//!                     ▲                        │ plaintext?
//!     plain client ───┘                        ▼
//!                                       ┌─────────────┐
//!                                       │ TLS policy  │◀── admin API / config reload
//!                                       └─────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use clap::Parser;

use optional_tls::admin::{setup_admin_router, AdminState};
use optional_tls::config::{load_config, ConfigWatcher, ServerConfig};
use optional_tls::lifecycle::signals::shutdown_signal;
use optional_tls::lifecycle::startup::{apply_config_update, build_credentials, StartupError};
use optional_tls::lifecycle::Shutdown;
use optional_tls::net::Listener;
use optional_tls::observability::{logging, metrics};
use optional_tls::policy::PolicySwitch;
use optional_tls::rpc::RpcServer;

#[derive(Parser)]
#[command(name = "optional-tls")]
#[command(about = "Greeter server accepting TLS and plaintext clients on one port", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config).map_err(StartupError::from)?;
    logging::init(&config.observability.log_level);

    tracing::info!("optional-tls v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        tls_required = config.policy.tls_required,
        handshake_timeout_secs = config.timeouts.handshake_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr).map_err(StartupError::from)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let policy = PolicySwitch::new(config.policy.tls_required);
    let credentials = build_credentials(&config, policy.clone())?;

    let shutdown = Shutdown::new();
    let live_config = Arc::new(ArcSwap::from_pointee(config.clone()));

    let server = RpcServer::new(
        Arc::new(credentials),
        Duration::from_secs(config.timeouts.handshake_secs),
    )
    .with_shutdown_grace(Duration::from_secs(config.timeouts.shutdown_grace_secs))
    .with_idle_timeout(Duration::from_secs(config.timeouts.idle_secs))
    .with_max_frame_len(config.listener.max_frame_bytes);
    let tracker = server.tracker();

    let admin_task = if config.admin.enabled {
        let state = AdminState {
            policy: policy.clone(),
            tracker,
            config: Arc::clone(&live_config),
        };
        let admin_listener = tokio::net::TcpListener::bind(&config.admin.bind_address)
            .await
            .map_err(StartupError::Admin)?;
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");

        let mut stop = shutdown.subscribe();
        Some(tokio::spawn(async move {
            let result = axum::serve(admin_listener, setup_admin_router(state))
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API failed");
            }
        }))
    } else {
        None
    };

    let _watcher = spawn_config_watcher(&args.config, live_config, policy, &shutdown);

    // Listeners start last.
    let listener = Listener::bind(&config.listener).await.map_err(StartupError::from)?;
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    shutdown.trigger();

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "RPC server failed"),
        Err(e) => tracing::error!(error = %e, "RPC server task panicked"),
    }
    if let Some(task) = admin_task {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Reload the config file on change and apply what can change live.
///
/// Returns the watcher handle, which must stay alive for reloads to flow.
fn spawn_config_watcher(
    path: &std::path::Path,
    live_config: Arc<ArcSwap<ServerConfig>>,
    policy: PolicySwitch,
    shutdown: &Shutdown,
) -> Option<notify::RecommendedWatcher> {
    let (watcher, mut updates) = ConfigWatcher::new(path);
    let handle = match watcher.run() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload disabled");
            return None;
        }
    };

    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Some(next) => {
                        apply_config_update(&live_config, &policy, next);
                        tracing::info!(tls_required = policy.is_required(), "Configuration reloaded");
                    }
                    None => break,
                },
                _ = stop.recv() => break,
            }
        }
    });

    Some(handle)
}
