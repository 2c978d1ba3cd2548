//! GPU discovery for health reporting.
//!
//! The probe runs once at startup. A missing or failing probe is reported as
//! "no devices"; it never stops the gateway from starting.

use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;

use crate::config::DeviceConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceReport {
    pub cuda_available: bool,
    pub device_count: usize,
}

impl DeviceReport {
    fn from_count(device_count: usize) -> Self {
        Self {
            cuda_available: device_count > 0,
            device_count,
        }
    }
}

/// Run the configured probe and count the devices it lists.
pub async fn detect(config: &DeviceConfig) -> DeviceReport {
    if config.probe_program.trim().is_empty() {
        tracing::debug!("GPU probe disabled");
        return DeviceReport::default();
    }

    let output = Command::new(&config.probe_program)
        .args(&config.probe_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    let report = match tokio::time::timeout(Duration::from_secs(config.timeout_secs), output).await
    {
        Ok(Ok(output)) if output.status.success() => {
            DeviceReport::from_count(count_devices(&String::from_utf8_lossy(&output.stdout)))
        }
        Ok(Ok(output)) => {
            tracing::warn!(status = %output.status, "GPU probe exited unsuccessfully");
            DeviceReport::default()
        }
        Ok(Err(e)) => {
            tracing::warn!(program = %config.probe_program, error = %e, "GPU probe unavailable");
            DeviceReport::default()
        }
        Err(_) => {
            tracing::warn!(program = %config.probe_program, "GPU probe timed out");
            DeviceReport::default()
        }
    };

    tracing::info!(
        cuda_available = report.cuda_available,
        device_count = report.device_count,
        "GPU discovery finished"
    );
    report
}

/// Count `GPU <n>: ...` lines as printed by `nvidia-smi --list-gpus`.
pub fn count_devices(listing: &str) -> usize {
    listing
        .lines()
        .map(str::trim_start)
        .filter(|line| {
            line.strip_prefix("GPU ")
                .and_then(|rest| rest.split(':').next())
                .map(|index| !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()))
                .unwrap_or(false)
        })
        .count()
}
