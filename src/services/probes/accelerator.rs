use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::probe_timeout;
use crate::config::AiServiceSettings;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AcceleratorStatus {
    /// The runtime query tool itself is missing.
    NotInstalled,
    Unavailable { reason: String },
    Available { device_count: usize },
}

/// Answers whether CUDA devices can be used by this process.
#[async_trait]
pub trait AcceleratorRuntime: Send + Sync {
    fn name(&self) -> &str;

    async fn query(&self, timeout: Duration) -> AcceleratorStatus;
}

/// Queries the NVIDIA driver through `nvidia-smi -L`.
#[derive(Clone, Debug)]
pub struct NvidiaSmi {
    program: PathBuf,
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self::new("nvidia-smi")
    }
}

impl NvidiaSmi {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

#[async_trait]
impl AcceleratorRuntime for NvidiaSmi {
    fn name(&self) -> &str {
        "nvidia-smi"
    }

    async fn query(&self, timeout: Duration) -> AcceleratorStatus {
        let output = Command::new(&self.program)
            .arg("-L")
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, output).await {
            Err(_) => {
                return AcceleratorStatus::Unavailable {
                    reason: format!("no answer within {}s", timeout.as_secs()),
                };
            }
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => return AcceleratorStatus::NotInstalled,
            Ok(Err(e)) => return AcceleratorStatus::Unavailable { reason: e.to_string() },
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return AcceleratorStatus::Unavailable {
                reason: if stderr.is_empty() { output.status.to_string() } else { stderr },
            };
        }

        match count_listed_gpus(&String::from_utf8_lossy(&output.stdout)) {
            0 => AcceleratorStatus::Unavailable {
                reason: "no devices listed".to_string(),
            },
            device_count => AcceleratorStatus::Available { device_count },
        }
    }
}

/// Counts `GPU <n>: ...` lines in `nvidia-smi -L` output.
pub fn count_listed_gpus(stdout: &str) -> usize {
    stdout
        .lines()
        .filter(|line| line.trim_start().starts_with("GPU "))
        .count()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceleratorProbe {
    pub ok: bool,
    /// `None` when the configured device never needs the accelerator.
    pub status: Option<AcceleratorStatus>,
}

/// Checks accelerator availability when the configured device is `cuda` or `auto`.
/// Other devices need no probe and always report true.
pub async fn probe_accelerator(
    settings: &AiServiceSettings,
    runtime: &dyn AcceleratorRuntime,
) -> AcceleratorProbe {
    let device = settings.hardware.device;
    if !device.wants_accelerator() {
        debug!(device = %device, "Device does not need an accelerator check");
        return AcceleratorProbe { ok: true, status: None };
    }

    let status = runtime.query(probe_timeout(settings)).await;
    let ok = match &status {
        AcceleratorStatus::Available { device_count } => {
            info!(runtime = runtime.name(), "CUDA available with {} GPU(s)", device_count);
            true
        }
        AcceleratorStatus::Unavailable { reason } => {
            warn!(device = %device, reason = %reason, "CUDA requested but not available, falling back to CPU");
            false
        }
        AcceleratorStatus::NotInstalled => {
            warn!(runtime = runtime.name(), "CUDA runtime not installed, cannot check CUDA");
            false
        }
    };

    AcceleratorProbe { ok, status: Some(status) }
}
