use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use super::probes::AcceleratorStatus;
use crate::config::{AiServiceSettings, DeviceType};

pub const CUDA_VISIBLE_DEVICES: &str = "CUDA_VISIBLE_DEVICES";

/// The device inference will actually run on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActiveDevice {
    Cpu,
    Cuda { visible_devices: String },
    Mps,
}

impl fmt::Display for ActiveDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveDevice::Cpu => write!(f, "cpu"),
            ActiveDevice::Cuda { visible_devices } => write!(f, "cuda ({})", visible_devices),
            ActiveDevice::Mps => write!(f, "mps"),
        }
    }
}

/// Resolves the configured device against what the accelerator probe found.
///
/// `cuda` and `auto` both need an available accelerator and fall back to CPU otherwise.
pub fn select_active_device(
    settings: &AiServiceSettings,
    status: Option<&AcceleratorStatus>,
) -> ActiveDevice {
    let configured = settings.hardware.device;
    match configured {
        DeviceType::Cpu => ActiveDevice::Cpu,
        DeviceType::Mps => ActiveDevice::Mps,
        DeviceType::Cuda | DeviceType::Auto => match status {
            Some(AcceleratorStatus::Available { .. }) => ActiveDevice::Cuda {
                visible_devices: settings.hardware.cuda_visible_devices.clone(),
            },
            _ => {
                if configured == DeviceType::Cuda {
                    warn!("DEVICE=cuda but no usable accelerator, running on CPU");
                }
                ActiveDevice::Cpu
            }
        },
    }
}

/// Publishes the selected CUDA devices to the process environment.
///
/// This is the only process-wide mutation done at startup. It must run before
/// anything spawns a thread, including the DNS lookups of the network probes,
/// which tokio hands to its blocking pool.
pub fn apply_active_device(device: &ActiveDevice) {
    if let ActiveDevice::Cuda { visible_devices } = device {
        // SAFETY: startup calls this once on the current_thread runtime, after the
        // accelerator query (a child process, no extra thread) and before any network
        // probe, so no other thread of this process exists yet.
        unsafe {
            std::env::set_var(CUDA_VISIBLE_DEVICES, visible_devices);
        }
        info!(visible_devices = %visible_devices, "Set {}", CUDA_VISIBLE_DEVICES);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvSource;
    use pretty_assertions::assert_eq;

    fn settings(pairs: &[(&str, &str)]) -> AiServiceSettings {
        AiServiceSettings::from_source(&EnvSource::from_pairs(pairs.iter().copied())).unwrap()
    }

    #[test]
    fn test_cpu_and_mps_ignore_probe() {
        let available = AcceleratorStatus::Available { device_count: 1 };
        assert_eq!(
            select_active_device(&settings(&[("DEVICE", "cpu")]), Some(&available)),
            ActiveDevice::Cpu
        );
        assert_eq!(select_active_device(&settings(&[("DEVICE", "mps")]), None), ActiveDevice::Mps);
    }

    #[test]
    fn test_available_accelerator_uses_configured_devices() {
        let available = AcceleratorStatus::Available { device_count: 4 };
        let settings = settings(&[("DEVICE", "auto"), ("CUDA_VISIBLE_DEVICES", "0,2")]);
        assert_eq!(
            select_active_device(&settings, Some(&available)),
            ActiveDevice::Cuda { visible_devices: "0,2".to_string() }
        );
    }

    #[test]
    fn test_falls_back_to_cpu() {
        let unavailable = AcceleratorStatus::Unavailable { reason: "driver".to_string() };
        for device in ["cuda", "auto"] {
            let settings = settings(&[("DEVICE", device)]);
            assert_eq!(select_active_device(&settings, Some(&unavailable)), ActiveDevice::Cpu);
            assert_eq!(
                select_active_device(&settings, Some(&AcceleratorStatus::NotInstalled)),
                ActiveDevice::Cpu
            );
        }
    }

    #[test]
    fn test_cpu_device_leaves_environment_alone() {
        let before = std::env::var_os(CUDA_VISIBLE_DEVICES);
        apply_active_device(&ActiveDevice::Cpu);
        assert_eq!(std::env::var_os(CUDA_VISIBLE_DEVICES), before);
    }
}
