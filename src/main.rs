mod config;
mod device;
mod errors;
mod extractors;
mod instrumentation;
mod locks;
mod upload;
mod utilities;

use std::{future, path::PathBuf, sync::Arc};

use axum::{
    http::{header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue},
    routing::post,
    Extension, Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::{
    config::{load_config, Config},
    device::{HaCli, SwitchControl},
    locks::PathLocks,
    upload::{preflight_endpoint, prepare_upload_dir, upload_endpoint},
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Clone)]
pub struct AppContext {
    cfg: Arc<Config>,
    upload_dir: Arc<PathBuf>,
    switch: Arc<dyn SwitchControl>,
    write_locks: Arc<PathLocks>,
}

impl AppContext {
    fn new(cfg: Config, upload_dir: PathBuf, switch: Arc<dyn SwitchControl>) -> Self {
        Self {
            cfg: Arc::new(cfg),
            upload_dir: Arc::new(upload_dir),
            switch,
            write_locks: Arc::new(PathLocks::default()),
        }
    }
}

fn router(ctx: AppContext) -> Router {
    let router = Router::new()
        .route("/", post(upload_endpoint).options(preflight_endpoint))
        .layer((
            SetResponseHeaderLayer::overriding(
                ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ),
            Extension(ctx),
        ));

    instrumentation::add_layer(router)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let loaded = load_config(&config_path).await?;
    let found = loaded.is_some();
    let cfg = loaded.unwrap_or_default();

    instrumentation::setup(&cfg.instrumentation.directives)?;
    if !found {
        tracing::warn!("config file {config_path} not found, using defaults");
    }

    let upload_dir = prepare_upload_dir(&cfg.general.upload_dir).await?;
    let switch = Arc::new(HaCli::new(cfg.device.program.clone()));
    let bind_address = cfg.general.bind_address;

    let listener = TcpListener::bind(bind_address).await?;
    tracing::info!(
        "upload server running on port {} (storing in {})",
        bind_address.port(),
        upload_dir.display()
    );

    let ctx = AppContext::new(cfg, upload_dir, switch);
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(why) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {why}");
            future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(why) => {
                tracing::error!("failed to install SIGTERM handler: {why}");
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
}
