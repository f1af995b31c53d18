pub mod device;
pub mod probes;
pub mod startup;

pub use device::{ActiveDevice, apply_active_device, select_active_device};
pub use probes::{ProbeReport, run_connectivity_probes};
pub use startup::{StartupReport, run_startup_validation, run_startup_validation_with, validate_environment};
