use std::{process::Stdio, time::Duration};

use axum::async_trait;
use tokio::{io, process::Command, time::sleep};

use crate::{
    config::DeviceConfig,
    errors::{AppError, AppResult},
};

/// Home automation switch that can be asked to run a service.
///
/// Calls are best-effort and fire-and-forget: `Ok` means the call was made,
/// not that it had any effect. Exit status and output of the underlying tool
/// are never reported back. `Err` is returned only when the call could not be
/// made at all.
#[async_trait]
pub trait SwitchControl: Send + Sync {
    async fn call_service(&self, service: &str, entity_id: &str) -> io::Result<()>;
}

/// Runs `<program> service call <service> --data {"entity_id": ...}`.
pub struct HaCli {
    program: String,
}

impl HaCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

fn service_args(service: &str, entity_id: &str) -> Vec<String> {
    let data = serde_json::json!({ "entity_id": entity_id });
    vec![
        "service".to_string(),
        "call".to_string(),
        service.to_string(),
        "--data".to_string(),
        data.to_string(),
    ]
}

#[async_trait]
impl SwitchControl for HaCli {
    async fn call_service(&self, service: &str, entity_id: &str) -> io::Result<()> {
        let output = Command::new(&self.program)
            .args(service_args(service, entity_id))
            .stdin(Stdio::null())
            .output()
            .await?;

        tracing::debug!(
            status = %output.status,
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "{service} on {entity_id} finished"
        );

        Ok(())
    }
}

/// Turns the configured entity off, waits, then turns it back on.
pub async fn restart_entity(control: &dyn SwitchControl, cfg: &DeviceConfig) -> AppResult<()> {
    call(control, cfg, &cfg.off_service).await?;
    sleep(Duration::from_millis(cfg.toggle_delay_ms)).await;
    call(control, cfg, &cfg.on_service).await?;

    Ok(())
}

async fn call(control: &dyn SwitchControl, cfg: &DeviceConfig, service: &str) -> AppResult<()> {
    control
        .call_service(service, &cfg.entity_id)
        .await
        .map_err(|source| AppError::DeviceControl {
            program: cfg.program.clone(),
            source,
        })
}
