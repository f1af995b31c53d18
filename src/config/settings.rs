use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::enums::{DeviceType, Environment, LogLevel, ModelSize, StorageProvider};
use super::schema::{ValidatedFields, validate_fields};
use super::source::EnvSource;
use super::validators::{parse_list, parse_size_to_bytes};
use crate::error::{AppError, AppResult};

/// A credential value. Never printed and never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AiServiceSettings {
    pub service: ServiceConfig,
    pub security: SecurityConfig,
    pub models: ModelsConfig,
    pub hardware: HardwareConfig,
    pub memory: MemoryConfig,
    pub files: FileProcessingConfig,
    pub generation: GenerationConfig,
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub monitoring: MonitoringConfig,
    pub performance: PerformanceConfig,
    pub cultural: CulturalConfig,
    pub rate_limit: RateLimitConfig,
    pub features: FeatureFlags,
    pub sandbox: SandboxConfig,
    pub development: DevelopmentConfig,
    pub downloads: ModelDownloadConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServiceConfig {
    pub port: u16,
    pub host: String,
    pub api_version: String,
    pub service_name: String,
    pub environment: Environment,
}

#[derive(Clone, Debug, Serialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<Secret>,
    #[serde(skip_serializing)]
    pub jwt_secret: Option<Secret>,
    pub allowed_origins: Vec<String>,
    pub cors_enabled: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelsConfig {
    pub audiocraft_model_path: PathBuf,
    pub audiocraft_cache_dir: PathBuf,
    pub audiocraft_model_size: ModelSize,
    pub audiocraft_max_length: u32,
    pub audiocraft_sample_rate: u32,
    pub demucs_model_path: PathBuf,
    pub demucs_cache_dir: PathBuf,
    pub demucs_device: DeviceType,
    pub demucs_shifts: u32,
    pub demucs_split: bool,
    pub style_transfer_model_path: PathBuf,
    pub cultural_classifier_model_path: PathBuf,
    pub mood_classifier_model_path: PathBuf,
}

#[derive(Clone, Debug, Serialize)]
pub struct HardwareConfig {
    pub device: DeviceType,
    pub cuda_visible_devices: String,
    pub torch_num_threads: u32,
    pub omp_num_threads: u32,
    pub mkl_num_threads: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct MemoryConfig {
    pub max_memory_usage: String,
    pub batch_size: u32,
    pub max_concurrent_generations: u32,
    pub model_cache_size: u32,
    pub clear_cache_interval_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct FileProcessingConfig {
    pub input_audio_formats: Vec<String>,
    pub output_audio_format: String,
    pub output_sample_rate: u32,
    pub output_bit_rate: String,
    pub max_file_size: String,
    pub temp_dir: PathBuf,
    pub cleanup_temp_files: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct GenerationConfig {
    pub default_length_secs: u32,
    pub max_length_secs: u32,
    pub min_length_secs: u32,
    pub default_temperature: f64,
    pub default_top_k: u32,
    pub default_top_p: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct QueueConfig {
    pub redis_url: String,
    pub queue_name: String,
    pub max_queue_size: u32,
    pub job_timeout_secs: u64,
    pub result_ttl_secs: u64,
    pub failed_job_ttl_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub minio: MinioConfig,
    pub s3: S3Config,
}

#[derive(Clone, Debug, Serialize)]
pub struct MinioConfig {
    pub endpoint: String,
    pub access_key: String,
    #[serde(skip_serializing)]
    pub secret_key: Secret,
    pub bucket_input: String,
    pub bucket_output: String,
    pub use_ssl: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct S3Config {
    pub access_key_id: Option<String>,
    #[serde(skip_serializing)]
    pub secret_access_key: Option<Secret>,
    pub region: String,
    pub bucket_input: String,
    pub bucket_output: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct DatabaseConfig {
    /// Connection URLs usually carry the password in their userinfo.
    #[serde(skip_serializing)]
    pub url: Option<Secret>,
    pub pool_size: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct MonitoringConfig {
    pub log_level: LogLevel,
    pub log_format: String,
    pub sentry_dsn: Option<String>,
    pub prometheus_enabled: bool,
    pub prometheus_port: u16,
    pub metrics_endpoint: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PerformanceConfig {
    pub enable_profiling: bool,
    pub profiling_output_dir: PathBuf,
    pub benchmark_mode: bool,
    pub performance_logging: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct CulturalConfig {
    pub metadata_path: PathBuf,
    pub validation_enabled: bool,
    pub approval_required: bool,
    pub restricted_contexts: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub requests_per_day: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct FeatureFlags {
    pub style_transfer: bool,
    pub mood_generation: bool,
    pub instrument_separation: bool,
    pub cultural_classification: bool,
    pub batch_processing: bool,
    pub real_time_generation: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SandboxConfig {
    pub disable_telemetry: bool,
    pub sandbox_enabled: bool,
    pub max_cpu_usage_percent: u8,
    pub max_disk_usage: String,
    pub network_timeout_secs: u64,
    pub probe_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct DevelopmentConfig {
    pub debug_mode: bool,
    pub mock_models: bool,
    pub test_mode: bool,
    pub benchmark_datasets_path: PathBuf,
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelDownloadConfig {
    pub huggingface_cache_dir: PathBuf,
    #[serde(skip_serializing)]
    pub huggingface_token: Option<Secret>,
    pub auto_download_models: bool,
    pub model_download_timeout_secs: u64,
}

impl AiServiceSettings {
    /// Reads and validates the process environment (plus env file).
    pub fn from_env() -> AppResult<Self> {
        Self::from_source(&EnvSource::from_process()?)
    }

    /// Validates every field of `source`; fails with all field violations at once.
    pub fn from_source(source: &EnvSource) -> AppResult<Self> {
        let f = validate_fields(source)?;
        Self::from_fields(&f)
    }

    fn from_fields(f: &ValidatedFields) -> AppResult<Self> {
        let secret = |name: &str| -> AppResult<Option<Secret>> {
            Ok(f.optional_text(name)?.map(Secret::new))
        };

        Ok(Self {
            service: ServiceConfig {
                port: f.int("PORT")?,
                host: f.text("HOST")?,
                api_version: f.text("API_VERSION")?,
                service_name: f.text("SERVICE_NAME")?,
                environment: f.symbol("ENVIRONMENT")?,
            },
            security: SecurityConfig {
                api_key: secret("API_KEY")?,
                jwt_secret: secret("JWT_SECRET")?,
                allowed_origins: parse_list(&f.text("ALLOWED_ORIGINS")?),
                cors_enabled: f.flag("CORS_ENABLED")?,
            },
            models: ModelsConfig {
                audiocraft_model_path: f.text("AUDIOCRAFT_MODEL_PATH")?.into(),
                audiocraft_cache_dir: f.text("AUDIOCRAFT_CACHE_DIR")?.into(),
                audiocraft_model_size: f.symbol("AUDIOCRAFT_MODEL_SIZE")?,
                audiocraft_max_length: f.int("AUDIOCRAFT_MAX_LENGTH")?,
                audiocraft_sample_rate: f.int("AUDIOCRAFT_SAMPLE_RATE")?,
                demucs_model_path: f.text("DEMUCS_MODEL_PATH")?.into(),
                demucs_cache_dir: f.text("DEMUCS_CACHE_DIR")?.into(),
                demucs_device: f.symbol("DEMUCS_DEVICE")?,
                demucs_shifts: f.int("DEMUCS_SHIFTS")?,
                demucs_split: f.flag("DEMUCS_SPLIT")?,
                style_transfer_model_path: f.text("STYLE_TRANSFER_MODEL_PATH")?.into(),
                cultural_classifier_model_path: f.text("CULTURAL_CLASSIFIER_MODEL_PATH")?.into(),
                mood_classifier_model_path: f.text("MOOD_CLASSIFIER_MODEL_PATH")?.into(),
            },
            hardware: HardwareConfig {
                device: f.symbol("DEVICE")?,
                cuda_visible_devices: f.text("CUDA_VISIBLE_DEVICES")?,
                torch_num_threads: f.int("TORCH_NUM_THREADS")?,
                omp_num_threads: f.int("OMP_NUM_THREADS")?,
                mkl_num_threads: f.int("MKL_NUM_THREADS")?,
            },
            memory: MemoryConfig {
                max_memory_usage: f.text("MAX_MEMORY_USAGE")?,
                batch_size: f.int("BATCH_SIZE")?,
                max_concurrent_generations: f.int("MAX_CONCURRENT_GENERATIONS")?,
                model_cache_size: f.int("MODEL_CACHE_SIZE")?,
                clear_cache_interval_secs: f.int("CLEAR_CACHE_INTERVAL")?,
            },
            files: FileProcessingConfig {
                input_audio_formats: parse_list(&f.text("INPUT_AUDIO_FORMATS")?.to_ascii_lowercase()),
                output_audio_format: f.text("OUTPUT_AUDIO_FORMAT")?,
                output_sample_rate: f.int("OUTPUT_SAMPLE_RATE")?,
                output_bit_rate: f.text("OUTPUT_BIT_RATE")?,
                max_file_size: f.text("MAX_FILE_SIZE")?,
                temp_dir: f.text("TEMP_DIR")?.into(),
                cleanup_temp_files: f.flag("CLEANUP_TEMP_FILES")?,
            },
            generation: GenerationConfig {
                default_length_secs: f.int("DEFAULT_GENERATION_LENGTH")?,
                max_length_secs: f.int("MAX_GENERATION_LENGTH")?,
                min_length_secs: f.int("MIN_GENERATION_LENGTH")?,
                default_temperature: f.float("DEFAULT_TEMPERATURE")?,
                default_top_k: f.int("DEFAULT_TOP_K")?,
                default_top_p: f.float("DEFAULT_TOP_P")?,
            },
            queue: QueueConfig {
                redis_url: f.text("REDIS_URL")?,
                queue_name: f.text("QUEUE_NAME")?,
                max_queue_size: f.int("MAX_QUEUE_SIZE")?,
                job_timeout_secs: f.int("JOB_TIMEOUT")?,
                result_ttl_secs: f.int("RESULT_TTL")?,
                failed_job_ttl_secs: f.int("FAILED_JOB_TTL")?,
            },
            storage: StorageConfig {
                provider: f.symbol("STORAGE_PROVIDER")?,
                minio: MinioConfig {
                    endpoint: f.text("MINIO_ENDPOINT")?,
                    access_key: f.text("MINIO_ACCESS_KEY")?,
                    secret_key: Secret::new(f.text("MINIO_SECRET_KEY")?),
                    bucket_input: f.text("MINIO_BUCKET_INPUT")?,
                    bucket_output: f.text("MINIO_BUCKET_OUTPUT")?,
                    use_ssl: f.flag("MINIO_USE_SSL")?,
                },
                s3: S3Config {
                    access_key_id: f.optional_text("AWS_ACCESS_KEY_ID")?,
                    secret_access_key: secret("AWS_SECRET_ACCESS_KEY")?,
                    region: f.text("AWS_REGION")?,
                    bucket_input: f.text("AWS_S3_BUCKET_INPUT")?,
                    bucket_output: f.text("AWS_S3_BUCKET_OUTPUT")?,
                },
            },
            database: DatabaseConfig {
                url: secret("DATABASE_URL")?,
                pool_size: f.int("DB_POOL_SIZE")?,
                timeout_secs: f.int("DB_TIMEOUT")?,
            },
            monitoring: MonitoringConfig {
                log_level: f.symbol("LOG_LEVEL")?,
                log_format: f.text("LOG_FORMAT")?,
                sentry_dsn: f.optional_text("SENTRY_DSN")?,
                prometheus_enabled: f.flag("PROMETHEUS_ENABLED")?,
                prometheus_port: f.int("PROMETHEUS_PORT")?,
                metrics_endpoint: f.text("METRICS_ENDPOINT")?,
            },
            performance: PerformanceConfig {
                enable_profiling: f.flag("ENABLE_PROFILING")?,
                profiling_output_dir: f.text("PROFILING_OUTPUT_DIR")?.into(),
                benchmark_mode: f.flag("BENCHMARK_MODE")?,
                performance_logging: f.flag("PERFORMANCE_LOGGING")?,
            },
            cultural: CulturalConfig {
                metadata_path: f.text("CULTURAL_METADATA_PATH")?.into(),
                validation_enabled: f.flag("CULTURAL_VALIDATION_ENABLED")?,
                approval_required: f.flag("CULTURAL_APPROVAL_REQUIRED")?,
                restricted_contexts: parse_list(&f.text("RESTRICTED_CULTURAL_CONTEXTS")?),
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: f.int("RATE_LIMIT_REQUESTS_PER_MINUTE")?,
                requests_per_hour: f.int("RATE_LIMIT_REQUESTS_PER_HOUR")?,
                requests_per_day: f.int("RATE_LIMIT_REQUESTS_PER_DAY")?,
            },
            features: FeatureFlags {
                style_transfer: f.flag("ENABLE_STYLE_TRANSFER")?,
                mood_generation: f.flag("ENABLE_MOOD_GENERATION")?,
                instrument_separation: f.flag("ENABLE_INSTRUMENT_SEPARATION")?,
                cultural_classification: f.flag("ENABLE_CULTURAL_CLASSIFICATION")?,
                batch_processing: f.flag("ENABLE_BATCH_PROCESSING")?,
                real_time_generation: f.flag("ENABLE_REAL_TIME_GENERATION")?,
            },
            sandbox: SandboxConfig {
                disable_telemetry: f.flag("DISABLE_TELEMETRY")?,
                sandbox_enabled: f.flag("SANDBOX_ENABLED")?,
                max_cpu_usage_percent: f.int("MAX_CPU_USAGE")?,
                max_disk_usage: f.text("MAX_DISK_USAGE")?,
                network_timeout_secs: f.int("NETWORK_TIMEOUT")?,
                probe_timeout_secs: f.int("PROBE_TIMEOUT_SECS")?,
            },
            development: DevelopmentConfig {
                debug_mode: f.flag("DEBUG_MODE")?,
                mock_models: f.flag("MOCK_MODELS")?,
                test_mode: f.flag("TEST_MODE")?,
                benchmark_datasets_path: f.text("BENCHMARK_DATASETS_PATH")?.into(),
            },
            downloads: ModelDownloadConfig {
                huggingface_cache_dir: f.text("HUGGINGFACE_CACHE_DIR")?.into(),
                huggingface_token: secret("HUGGINGFACE_TOKEN")?,
                auto_download_models: f.flag("AUTO_DOWNLOAD_MODELS")?,
                model_download_timeout_secs: f.int("MODEL_DOWNLOAD_TIMEOUT")?,
            },
        })
    }

    /// Variables production mode needs but did not get, in reporting order.
    pub fn missing_production_secrets(&self) -> Vec<String> {
        let mut missing = Vec::new();

        if self.security.api_key.is_none() {
            missing.push("API_KEY".to_string());
        }
        if self.security.jwt_secret.is_none() {
            missing.push("JWT_SECRET".to_string());
        }
        if self.storage.provider == StorageProvider::S3 {
            let s3 = &self.storage.s3;
            if s3.access_key_id.is_none() || s3.secret_access_key.is_none() {
                missing.push("AWS_ACCESS_KEY_ID".to_string());
                missing.push("AWS_SECRET_ACCESS_KEY".to_string());
            }
        }

        missing
    }

    /// Cross-field check applied only when running in production.
    pub fn check_production_requirements(&self) -> AppResult<()> {
        if self.service.environment != Environment::Production {
            return Ok(());
        }

        let missing = self.missing_production_secrets();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingProductionSecrets(missing))
        }
    }

    /// Directories created on startup in development mode.
    pub fn working_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.files.temp_dir.clone(),
            self.models.audiocraft_cache_dir.clone(),
            self.models.demucs_cache_dir.clone(),
        ]
    }

    /// Model locations that must exist unless models are mocked.
    pub fn model_paths(&self) -> Vec<PathBuf> {
        vec![
            self.models.audiocraft_model_path.clone(),
            self.models.demucs_model_path.clone(),
        ]
    }

    pub fn max_file_size_bytes(&self) -> AppResult<u64> {
        parse_size_to_bytes(&self.files.max_file_size).map_err(AppError::Configuration)
    }

    pub fn max_memory_usage_bytes(&self) -> AppResult<u64> {
        parse_size_to_bytes(&self.memory.max_memory_usage).map_err(AppError::Configuration)
    }

    pub fn max_disk_usage_bytes(&self) -> AppResult<u64> {
        parse_size_to_bytes(&self.sandbox.max_disk_usage).map_err(AppError::Configuration)
    }
}

impl FeatureFlags {
    /// Names of the optional features that are switched on.
    pub fn enabled(&self) -> Vec<&'static str> {
        [
            ("style_transfer", self.style_transfer),
            ("mood_generation", self.mood_generation),
            ("instrument_separation", self.instrument_separation),
            ("cultural_classification", self.cultural_classification),
            ("batch_processing", self.batch_processing),
            ("real_time_generation", self.real_time_generation),
        ]
        .into_iter()
        .filter_map(|(name, enabled)| enabled.then_some(name))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KEY_32: &str = "0123456789abcdef0123456789abcdef";

    fn production(extra: &[(&str, &str)]) -> AiServiceSettings {
        let mut pairs = vec![("ENVIRONMENT", "production")];
        pairs.extend_from_slice(extra);
        AiServiceSettings::from_source(&EnvSource::from_pairs(pairs)).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = AiServiceSettings::from_source(&EnvSource::default()).unwrap();
        assert_eq!(settings.service.port, 8000);
        assert_eq!(settings.service.environment, Environment::Development);
        assert_eq!(settings.hardware.device, DeviceType::Auto);
        assert_eq!(settings.storage.provider, StorageProvider::Minio);
        assert!(settings.database.url.is_none());
        assert_eq!(
            settings.security.allowed_origins,
            vec!["http://localhost:3001", "http://localhost:3000"]
        );
        assert_eq!(settings.cultural.restricted_contexts, vec!["sacred", "ceremonial"]);
        assert_eq!(settings.sandbox.probe_timeout_secs, 5);
    }

    #[test]
    fn test_size_accessors() {
        let settings = AiServiceSettings::from_source(&EnvSource::default()).unwrap();
        assert_eq!(settings.max_file_size_bytes().unwrap(), 100 * 1024 * 1024);
        assert_eq!(settings.max_memory_usage_bytes().unwrap(), 8 * 1024 * 1024 * 1024);
        assert_eq!(settings.max_disk_usage_bytes().unwrap(), 10 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_production_reports_both_missing_secrets() {
        let settings = production(&[]);
        let err = settings.check_production_requirements().unwrap_err();
        match &err {
            AppError::MissingProductionSecrets(names) => {
                assert_eq!(names, &vec!["API_KEY".to_string(), "JWT_SECRET".to_string()]);
            }
            other => panic!("unexpected error: {}", other),
        }
        let message = err.to_string();
        assert!(message.contains("API_KEY") && message.contains("JWT_SECRET"));
    }

    #[test]
    fn test_production_s3_requires_aws_credentials() {
        let settings = production(&[("STORAGE_PROVIDER", "s3")]);
        let message = settings.check_production_requirements().unwrap_err().to_string();
        for name in ["API_KEY", "JWT_SECRET", "AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"] {
            assert!(message.contains(name), "{} missing from: {}", name, message);
        }
    }

    #[test]
    fn test_production_with_all_secrets_passes() {
        let settings = production(&[
            ("API_KEY", KEY_32),
            ("JWT_SECRET", KEY_32),
            ("STORAGE_PROVIDER", "s3"),
            ("AWS_ACCESS_KEY_ID", "AKIAEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]);
        assert!(settings.check_production_requirements().is_ok());
    }

    #[test]
    fn test_secrets_not_required_outside_production() {
        let source = EnvSource::from_pairs([("ENVIRONMENT", "staging")]);
        let settings = AiServiceSettings::from_source(&source).unwrap();
        assert!(settings.check_production_requirements().is_ok());
    }

    #[test]
    fn test_enabled_features() {
        let source = EnvSource::from_pairs([
            ("ENABLE_MOOD_GENERATION", "false"),
            ("ENABLE_BATCH_PROCESSING", "yes"),
        ]);
        let settings = AiServiceSettings::from_source(&source).unwrap();
        assert_eq!(
            settings.features.enabled(),
            vec!["style_transfer", "instrument_separation", "cultural_classification", "batch_processing"]
        );
    }

    #[test]
    fn test_secrets_stay_out_of_debug_and_json() {
        let source = EnvSource::from_pairs([("API_KEY", KEY_32), ("JWT_SECRET", KEY_32)]);
        let settings = AiServiceSettings::from_source(&source).unwrap();

        assert_eq!(settings.security.api_key.as_ref().map(Secret::expose), Some(KEY_32));
        assert!(!format!("{:?}", settings).contains(KEY_32));
        assert!(!serde_json::to_string(&settings).unwrap().contains(KEY_32));
    }

    #[test]
    fn test_database_password_stays_out_of_debug() {
        let url = "postgresql://app:hunter2pw@db:5432/soundlab";
        let source = EnvSource::from_pairs([("DATABASE_URL", url)]);
        let settings = AiServiceSettings::from_source(&source).unwrap();

        assert_eq!(settings.database.url.as_ref().map(Secret::expose), Some(url));
        assert!(!format!("{:?}", settings).contains("hunter2pw"));
        assert!(!format!("{:?}", settings.database).contains("hunter2pw"));
        assert!(!serde_json::to_string(&settings).unwrap().contains("hunter2pw"));
    }
}
