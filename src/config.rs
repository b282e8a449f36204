use std::{io::ErrorKind, net::SocketAddr};

use serde::Deserialize;
use tokio::fs;

/// Returns `None` when the file does not exist.
pub async fn load_config(path: &str) -> anyhow::Result<Option<Config>> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(why) if why.kind() == ErrorKind::NotFound => return Ok(None),
        Err(why) => return Err(why.into()),
    };
    let parsed = toml::from_str(&contents)?;
    Ok(Some(parsed))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub bind_address: SocketAddr,
    pub upload_dir: String,
    /// Used when a request carries no `filename`.
    pub default_filename: String,
    pub max_body_bytes: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8765)),
            upload_dir: "/media/multimedia".to_string(),
            default_filename: "_DOMYSLNY_.mp4".to_string(),
            max_body_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// External switch that gets restarted after every upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub program: String,
    pub entity_id: String,
    pub off_service: String,
    pub on_service: String,
    pub toggle_delay_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            program: "ha".to_string(),
            entity_id: "switch.video".to_string(),
            off_service: "switch.turn_off".to_string(),
            on_service: "switch.turn_on".to_string(),
            toggle_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    pub directives: Vec<String>,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            directives: vec!["info".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub device: DeviceConfig,
    pub instrumentation: InstrumentationConfig,
}

#[cfg(test)]
mod tests {
    use super::{load_config, Config};

    #[tokio::test]
    async fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let loaded = load_config(&path.display().to_string()).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[device]\ntoggle_delay_ms = 250\n").unwrap();

        let cfg = load_config(&path.display().to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cfg.device.toggle_delay_ms, 250);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[general\n").unwrap();

        assert!(load_config(&path.display().to_string()).await.is_err());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg: Config = toml::from_str("").unwrap();

        assert_eq!(cfg.general.bind_address.port(), 8765);
        assert_eq!(cfg.general.upload_dir, "/media/multimedia");
        assert_eq!(cfg.general.default_filename, "_DOMYSLNY_.mp4");
        assert_eq!(cfg.device.entity_id, "switch.video");
        assert_eq!(cfg.device.toggle_delay_ms, 1000);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [general]
            upload_dir = "/srv/videos"

            [device]
            entity_id = "switch.screen"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.general.upload_dir, "/srv/videos");
        assert_eq!(cfg.general.bind_address.port(), 8765);
        assert_eq!(cfg.device.entity_id, "switch.screen");
        assert_eq!(cfg.device.program, "ha");
        assert_eq!(cfg.instrumentation.directives, vec!["info".to_string()]);
    }
}
