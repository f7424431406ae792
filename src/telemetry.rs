//! Anonymous usage telemetry
//!
//! Events go to the `forgesync::telemetry` tracing target, tagged with a
//! persistent device id. Opt out with `telemetry.enabled: false` or
//! `FORGESYNC_NO_TELEMETRY=1`.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::TelemetryConfig;

/// Set to `1` to disable telemetry regardless of config
pub const NO_TELEMETRY_ENV: &str = "FORGESYNC_NO_TELEMETRY";

/// Receives run metadata at the end of a session
pub trait Telemetry: Send + Sync {
    fn capture(&self, event: &str, properties: BTreeMap<String, Value>);
}

/// Emits telemetry events as structured tracing records
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetry {
    device_id: Option<String>,
}

impl TracingTelemetry {
    /// Telemetry for this run, honouring config and env opt-outs.
    ///
    /// Any problem reading or creating the device id disables telemetry.
    pub async fn init(config: &TelemetryConfig, env_value: Option<String>, device_id_file: &Path) -> Self {
        if is_opted_out(config, env_value.as_deref()) {
            tracing::debug!("Telemetry is disabled");
            return Self::disabled();
        }

        match device_id(device_id_file).await {
            Ok(id) => {
                tracing::debug!("Telemetry initialized");
                Self { device_id: Some(id) }
            }
            Err(e) => {
                tracing::debug!("Failed to get device id, disabling telemetry: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { device_id: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.device_id.is_some()
    }
}

impl Telemetry for TracingTelemetry {
    fn capture(&self, event: &str, properties: BTreeMap<String, Value>) {
        let Some(device_id) = &self.device_id else {
            return;
        };
        let properties = Value::Object(properties.into_iter().collect());
        tracing::info!(
            target: "forgesync::telemetry",
            device_id = %device_id,
            event = %event,
            properties = %properties,
            "telemetry event"
        );
    }
}

pub fn is_opted_out(config: &TelemetryConfig, env_value: Option<&str>) -> bool {
    !config.enabled || env_value == Some("1")
}

/// Read the device id, creating and storing a new one on first use
pub async fn device_id(path: &Path) -> std::io::Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(existing) if !existing.trim().is_empty() => return Ok(existing.trim().to_string()),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let id = uuid::Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &id).await?;
    Ok(id)
}
