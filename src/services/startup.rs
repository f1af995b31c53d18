//! Startup validation for the AI service.
//!
//! Order: schema, production cross-field check, development directories,
//! model paths, summary log. The accelerator check and device selection come
//! next, then the network probes. Probes only ever produce warnings.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use super::device::{ActiveDevice, apply_active_device, select_active_device};
use super::probes::{AcceleratorRuntime, NvidiaSmi, ProbeReport, probe_accelerator, run_connectivity_probes};
use crate::config::{AiServiceSettings, EnvSource, Environment};
use crate::error::{AppError, AppResult};

/// Everything startup learned. `settings` is the read-only handle handed to the pipelines.
#[derive(Clone, Debug)]
pub struct StartupReport {
    pub settings: Arc<AiServiceSettings>,
    pub probes: ProbeReport,
    pub device: ActiveDevice,
}

/// Builds and checks the settings. Any error returned here is fatal for the process.
pub fn validate_environment(source: &EnvSource) -> AppResult<AiServiceSettings> {
    let settings = AiServiceSettings::from_source(source)?;

    settings.check_production_requirements()?;

    if settings.service.environment == Environment::Development {
        ensure_working_dirs(&settings)?;
    }

    if !settings.development.mock_models {
        report_missing_models(&settings);
    }

    log_summary(&settings);
    Ok(settings)
}

/// Creates the development working directories. Safe to repeat.
pub fn ensure_working_dirs(settings: &AiServiceSettings) -> AppResult<()> {
    for dir in settings.working_dirs() {
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::Io(format!("Failed to create directory {}: {}", dir.display(), e))
        })?;
    }
    Ok(())
}

pub fn missing_model_paths(settings: &AiServiceSettings) -> Vec<PathBuf> {
    settings
        .model_paths()
        .into_iter()
        .filter(|path| !path.exists())
        .collect()
}

fn report_missing_models(settings: &AiServiceSettings) {
    let missing = missing_model_paths(settings);
    if missing.is_empty() {
        return;
    }

    let listed = missing
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    if settings.downloads.auto_download_models {
        info!("Model paths not found, they will be downloaded: {}", listed);
    } else {
        warn!("Model paths not found: {}", listed);
        warn!("Set AUTO_DOWNLOAD_MODELS=true to download automatically");
    }
}

fn log_summary(settings: &AiServiceSettings) {
    info!("AI service environment validation successful");
    info!("Running in {} mode", settings.service.environment);
    info!("Device: {}", settings.hardware.device);
    info!("Storage provider: {}", settings.storage.provider);

    let features = settings.features.enabled();
    if !features.is_empty() {
        info!("Enabled features: {}", features.join(", "));
    }
}

/// Full startup check using `nvidia-smi` to answer accelerator queries.
pub async fn run_startup_validation(source: &EnvSource) -> AppResult<StartupReport> {
    run_startup_validation_with(source, &NvidiaSmi::default()).await
}

pub async fn run_startup_validation_with(
    source: &EnvSource,
    runtime: &dyn AcceleratorRuntime,
) -> AppResult<StartupReport> {
    info!("Running AI service startup validation...");

    let settings = validate_environment(source)?;

    // The device write must happen before the network probes start resolver threads
    let accelerator = probe_accelerator(&settings, runtime).await;
    let device = select_active_device(&settings, accelerator.status.as_ref());
    apply_active_device(&device);

    let probes = run_connectivity_probes(&settings, &accelerator).await;

    info!(device = %device, "AI service startup validation completed");

    Ok(StartupReport {
        settings: Arc::new(settings),
        probes,
        device,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::probes::AcceleratorStatus;
    use crate::services::probes::accelerator::tests::FixedRuntime;
    use pretty_assertions::assert_eq;

    fn unavailable() -> FixedRuntime {
        FixedRuntime(AcceleratorStatus::Unavailable {
            reason: "test".to_string(),
        })
    }

    #[test]
    fn test_development_creates_working_dirs() {
        let root = tempfile::tempdir().unwrap();
        let temp_dir = root.path().join("processing/tmp");
        let audiocraft = root.path().join("cache/audiocraft");
        let demucs = root.path().join("cache/demucs");

        let source = EnvSource::from_pairs([
            ("ENVIRONMENT", "development".to_string()),
            ("MOCK_MODELS", "true".to_string()),
            ("TEMP_DIR", temp_dir.display().to_string()),
            ("AUDIOCRAFT_CACHE_DIR", audiocraft.display().to_string()),
            ("DEMUCS_CACHE_DIR", demucs.display().to_string()),
        ]);

        validate_environment(&source).unwrap();
        assert!(temp_dir.is_dir());
        assert!(audiocraft.is_dir());
        assert!(demucs.is_dir());

        // Second run finds everything in place
        validate_environment(&source).unwrap();
    }

    #[test]
    fn test_directory_creation_failure_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let source = EnvSource::from_pairs([
            ("MOCK_MODELS", "true".to_string()),
            ("TEMP_DIR", blocker.join("tmp").display().to_string()),
        ]);

        match validate_environment(&source) {
            Err(AppError::Io(message)) => assert!(message.contains("not-a-dir")),
            other => panic!("expected I/O error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_model_paths() {
        let root = tempfile::tempdir().unwrap();
        let present = root.path().join("musicgen");
        fs::create_dir(&present).unwrap();
        let absent = root.path().join("htdemucs");

        let source = EnvSource::from_pairs([
            ("AUDIOCRAFT_MODEL_PATH", present.display().to_string()),
            ("DEMUCS_MODEL_PATH", absent.display().to_string()),
        ]);
        let settings = AiServiceSettings::from_source(&source).unwrap();

        assert_eq!(missing_model_paths(&settings), vec![absent]);
    }

    #[test]
    fn test_missing_models_do_not_abort() {
        let source = EnvSource::from_pairs([
            ("ENVIRONMENT", "testing"),
            ("AUDIOCRAFT_MODEL_PATH", "/nonexistent/models/musicgen"),
        ]);
        assert!(validate_environment(&source).is_ok());
    }

    #[test]
    fn test_production_without_secrets_is_fatal() {
        let source = EnvSource::from_pairs([("ENVIRONMENT", "production"), ("MOCK_MODELS", "true")]);
        match validate_environment(&source) {
            Err(AppError::MissingProductionSecrets(names)) => {
                assert_eq!(names, vec!["API_KEY".to_string(), "JWT_SECRET".to_string()]);
            }
            other => panic!("expected missing secrets, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_invalid_schema_stops_before_probes() {
        let source = EnvSource::from_pairs([("REDIS_URL", "http://localhost")]);
        let result = run_startup_validation_with(&source, &unavailable()).await;
        assert!(matches!(result, Err(AppError::InvalidFields(_))));
    }

    #[tokio::test]
    async fn test_startup_with_mock_models_completes_despite_failed_probes() {
        let source = EnvSource::from_pairs([
            ("ENVIRONMENT", "testing"),
            ("MOCK_MODELS", "true"),
            ("REDIS_URL", "redis://127.0.0.1:1"),
            ("MINIO_ENDPOINT", "127.0.0.1:1"),
            ("PROBE_TIMEOUT_SECS", "2"),
        ]);

        let report = run_startup_validation_with(&source, &unavailable()).await.unwrap();

        assert!(!report.probes.queue);
        assert!(!report.probes.database);
        assert!(!report.probes.storage);
        assert!(!report.probes.accelerator);
        assert_eq!(report.device, ActiveDevice::Cpu);
        assert_eq!(report.settings.service.environment, Environment::Testing);
    }
}
