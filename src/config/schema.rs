//! The configuration schema: one ordered table of field specifications and
//! the loop that checks raw values against it.
//!
//! Every field is read from the variable of the same upper-snake-case name.
//! Unknown variables are ignored, missing ones take the declared default, and
//! all violations of one pass are reported together.

use std::collections::HashMap;
use std::str::FromStr;

use tracing::debug;

use super::enums::{DeviceType, Environment, LogLevel, ModelSize, StorageProvider};
use super::source::EnvSource;
use super::validators::{
    self, Check, validate_audio_formats, validate_database_url, validate_origins,
    validate_redis_url, validate_size_format, validate_url,
};
use crate::error::{AppError, AppResult, FieldError};

const REDACTED: &str = "<redacted>";
const NON_UTF8: &str = "<non-utf8>";

#[derive(Clone, Copy, Debug)]
pub enum FieldKind {
    /// Integer with inclusive bounds; `None` leaves that side open.
    Int { min: Option<i64>, max: Option<i64> },
    Float { min: f64, max: f64 },
    Bool,
    Text,
    /// Unset or empty means `None`.
    OptionalText { min_len: Option<usize>, secret: bool },
    Symbol(&'static [&'static str]),
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: Option<&'static str>,
    /// Runs after type coercion succeeds.
    pub check: Option<Check>,
}

impl FieldSpec {
    const fn int(name: &'static str, default: &'static str, min: i64, max: i64) -> Self {
        Self {
            name,
            kind: FieldKind::Int { min: Some(min), max: Some(max) },
            default: Some(default),
            check: None,
        }
    }

    const fn at_least(name: &'static str, default: &'static str, min: i64) -> Self {
        Self {
            name,
            kind: FieldKind::Int { min: Some(min), max: None },
            default: Some(default),
            check: None,
        }
    }

    const fn float(name: &'static str, default: &'static str, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: FieldKind::Float { min, max },
            default: Some(default),
            check: None,
        }
    }

    const fn flag(name: &'static str, default: &'static str) -> Self {
        Self { name, kind: FieldKind::Bool, default: Some(default), check: None }
    }

    const fn text(name: &'static str, default: &'static str) -> Self {
        Self { name, kind: FieldKind::Text, default: Some(default), check: None }
    }

    const fn checked(name: &'static str, default: &'static str, check: Check) -> Self {
        Self { name, kind: FieldKind::Text, default: Some(default), check: Some(check) }
    }

    const fn optional(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::OptionalText { min_len: None, secret: false },
            default: None,
            check: None,
        }
    }

    const fn optional_checked(name: &'static str, check: Check) -> Self {
        Self {
            name,
            kind: FieldKind::OptionalText { min_len: None, secret: false },
            default: None,
            check: Some(check),
        }
    }

    const fn secret(name: &'static str, min_len: Option<usize>) -> Self {
        Self {
            name,
            kind: FieldKind::OptionalText { min_len, secret: true },
            default: None,
            check: None,
        }
    }

    const fn secret_checked(name: &'static str, check: Check) -> Self {
        Self {
            name,
            kind: FieldKind::OptionalText { min_len: None, secret: true },
            default: None,
            check: Some(check),
        }
    }

    const fn symbol(name: &'static str, default: &'static str, variants: &'static [&'static str]) -> Self {
        Self { name, kind: FieldKind::Symbol(variants), default: Some(default), check: None }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self.kind, FieldKind::OptionalText { secret: true, .. })
    }
}

pub static FIELDS: &[FieldSpec] = &[
    // Service
    FieldSpec::int("PORT", "8000", 1000, 65535),
    FieldSpec::text("HOST", "0.0.0.0"),
    FieldSpec::text("API_VERSION", "v1"),
    FieldSpec::text("SERVICE_NAME", "cultural-sound-lab-ai"),
    FieldSpec::symbol("ENVIRONMENT", "development", Environment::VARIANTS),
    // API security
    FieldSpec::secret("API_KEY", Some(32)),
    FieldSpec::secret("JWT_SECRET", Some(32)),
    FieldSpec::checked("ALLOWED_ORIGINS", "http://localhost:3001,http://localhost:3000", validate_origins),
    FieldSpec::flag("CORS_ENABLED", "true"),
    // Audio generation model
    FieldSpec::text("AUDIOCRAFT_MODEL_PATH", "/models/audiocraft/musicgen-medium"),
    FieldSpec::text("AUDIOCRAFT_CACHE_DIR", "/cache/audiocraft"),
    FieldSpec::symbol("AUDIOCRAFT_MODEL_SIZE", "medium", ModelSize::VARIANTS),
    FieldSpec::int("AUDIOCRAFT_MAX_LENGTH", "30", 3, 300),
    FieldSpec::int("AUDIOCRAFT_SAMPLE_RATE", "32000", 16000, 48000),
    // Stem separation model
    FieldSpec::text("DEMUCS_MODEL_PATH", "/models/demucs/htdemucs"),
    FieldSpec::text("DEMUCS_CACHE_DIR", "/cache/demucs"),
    FieldSpec::symbol("DEMUCS_DEVICE", "auto", DeviceType::VARIANTS),
    FieldSpec::int("DEMUCS_SHIFTS", "1", 1, 10),
    FieldSpec::flag("DEMUCS_SPLIT", "true"),
    // Custom models
    FieldSpec::text("STYLE_TRANSFER_MODEL_PATH", "/models/custom/style_transfer"),
    FieldSpec::text("CULTURAL_CLASSIFIER_MODEL_PATH", "/models/custom/cultural_classifier"),
    FieldSpec::text("MOOD_CLASSIFIER_MODEL_PATH", "/models/custom/mood_classifier"),
    // Hardware
    FieldSpec::symbol("DEVICE", "auto", DeviceType::VARIANTS),
    FieldSpec::text("CUDA_VISIBLE_DEVICES", "0"),
    FieldSpec::int("TORCH_NUM_THREADS", "4", 1, 32),
    FieldSpec::int("OMP_NUM_THREADS", "4", 1, 32),
    FieldSpec::int("MKL_NUM_THREADS", "4", 1, 32),
    // Memory
    FieldSpec::checked("MAX_MEMORY_USAGE", "8GB", validate_size_format),
    FieldSpec::int("BATCH_SIZE", "1", 1, 16),
    FieldSpec::int("MAX_CONCURRENT_GENERATIONS", "3", 1, 10),
    FieldSpec::int("MODEL_CACHE_SIZE", "2", 1, 10),
    FieldSpec::at_least("CLEAR_CACHE_INTERVAL", "3600", 300),
    // File processing
    FieldSpec::checked("INPUT_AUDIO_FORMATS", "mp3,wav,m4a,flac,ogg", validate_audio_formats),
    FieldSpec::text("OUTPUT_AUDIO_FORMAT", "mp3"),
    FieldSpec::int("OUTPUT_SAMPLE_RATE", "44100", 16000, 96000),
    FieldSpec::text("OUTPUT_BIT_RATE", "320k"),
    FieldSpec::checked("MAX_FILE_SIZE", "100MB", validate_size_format),
    FieldSpec::text("TEMP_DIR", "/tmp/ai_processing"),
    FieldSpec::flag("CLEANUP_TEMP_FILES", "true"),
    // Generation defaults
    FieldSpec::int("DEFAULT_GENERATION_LENGTH", "30", 3, 300),
    FieldSpec::int("MAX_GENERATION_LENGTH", "300", 10, 600),
    FieldSpec::int("MIN_GENERATION_LENGTH", "3", 1, 10),
    FieldSpec::float("DEFAULT_TEMPERATURE", "0.8", 0.1, 2.0),
    FieldSpec::int("DEFAULT_TOP_K", "250", 1, 1000),
    FieldSpec::float("DEFAULT_TOP_P", "0.0", 0.0, 1.0),
    // Queue
    FieldSpec::checked("REDIS_URL", "redis://localhost:6379", validate_redis_url),
    FieldSpec::text("QUEUE_NAME", "ai_generation_queue"),
    FieldSpec::int("MAX_QUEUE_SIZE", "100", 10, 1000),
    FieldSpec::int("JOB_TIMEOUT", "600", 60, 3600),
    FieldSpec::int("RESULT_TTL", "3600", 300, 86400),
    FieldSpec::at_least("FAILED_JOB_TTL", "86400", 3600),
    // Storage
    FieldSpec::symbol("STORAGE_PROVIDER", "minio", StorageProvider::VARIANTS),
    FieldSpec::text("MINIO_ENDPOINT", "localhost:9000"),
    FieldSpec::text("MINIO_ACCESS_KEY", "minioadmin"),
    FieldSpec::text("MINIO_SECRET_KEY", "minioadmin"),
    FieldSpec::text("MINIO_BUCKET_INPUT", "ai-input"),
    FieldSpec::text("MINIO_BUCKET_OUTPUT", "ai-output"),
    FieldSpec::flag("MINIO_USE_SSL", "false"),
    FieldSpec::optional("AWS_ACCESS_KEY_ID"),
    FieldSpec::secret("AWS_SECRET_ACCESS_KEY", None),
    FieldSpec::text("AWS_REGION", "us-east-1"),
    FieldSpec::text("AWS_S3_BUCKET_INPUT", "ai-input-prod"),
    FieldSpec::text("AWS_S3_BUCKET_OUTPUT", "ai-output-prod"),
    // Database
    FieldSpec::secret_checked("DATABASE_URL", validate_database_url),
    FieldSpec::int("DB_POOL_SIZE", "5", 1, 20),
    FieldSpec::int("DB_TIMEOUT", "30", 5, 60),
    // Monitoring
    FieldSpec::symbol("LOG_LEVEL", "info", LogLevel::VARIANTS),
    FieldSpec::text("LOG_FORMAT", "json"),
    FieldSpec::optional_checked("SENTRY_DSN", validate_url),
    FieldSpec::flag("PROMETHEUS_ENABLED", "true"),
    FieldSpec::int("PROMETHEUS_PORT", "9090", 1000, 65535),
    FieldSpec::text("METRICS_ENDPOINT", "/metrics"),
    // Performance
    FieldSpec::flag("ENABLE_PROFILING", "false"),
    FieldSpec::text("PROFILING_OUTPUT_DIR", "/profiling"),
    FieldSpec::flag("BENCHMARK_MODE", "false"),
    FieldSpec::flag("PERFORMANCE_LOGGING", "true"),
    // Cultural context
    FieldSpec::text("CULTURAL_METADATA_PATH", "/data/cultural_metadata"),
    FieldSpec::flag("CULTURAL_VALIDATION_ENABLED", "true"),
    FieldSpec::flag("CULTURAL_APPROVAL_REQUIRED", "true"),
    FieldSpec::text("RESTRICTED_CULTURAL_CONTEXTS", "sacred,ceremonial"),
    // Rate limiting
    FieldSpec::int("RATE_LIMIT_REQUESTS_PER_MINUTE", "10", 1, 100),
    FieldSpec::int("RATE_LIMIT_REQUESTS_PER_HOUR", "100", 10, 1000),
    FieldSpec::int("RATE_LIMIT_REQUESTS_PER_DAY", "1000", 100, 10000),
    // Feature flags
    FieldSpec::flag("ENABLE_STYLE_TRANSFER", "true"),
    FieldSpec::flag("ENABLE_MOOD_GENERATION", "true"),
    FieldSpec::flag("ENABLE_INSTRUMENT_SEPARATION", "true"),
    FieldSpec::flag("ENABLE_CULTURAL_CLASSIFICATION", "true"),
    FieldSpec::flag("ENABLE_BATCH_PROCESSING", "false"),
    FieldSpec::flag("ENABLE_REAL_TIME_GENERATION", "false"),
    // Sandbox
    FieldSpec::flag("DISABLE_TELEMETRY", "true"),
    FieldSpec::flag("SANDBOX_ENABLED", "true"),
    FieldSpec::int("MAX_CPU_USAGE", "80", 10, 100),
    FieldSpec::checked("MAX_DISK_USAGE", "10GB", validate_size_format),
    FieldSpec::int("NETWORK_TIMEOUT", "30", 5, 120),
    FieldSpec::int("PROBE_TIMEOUT_SECS", "5", 1, 60),
    // Development & testing
    FieldSpec::flag("DEBUG_MODE", "false"),
    FieldSpec::flag("MOCK_MODELS", "false"),
    FieldSpec::flag("TEST_MODE", "false"),
    FieldSpec::text("BENCHMARK_DATASETS_PATH", "/data/benchmarks"),
    // Model downloads
    FieldSpec::text("HUGGINGFACE_CACHE_DIR", "/cache/huggingface"),
    FieldSpec::secret("HUGGINGFACE_TOKEN", None),
    FieldSpec::flag("AUTO_DOWNLOAD_MODELS", "false"),
    FieldSpec::int("MODEL_DOWNLOAD_TIMEOUT", "3600", 300, 7200),
];

pub fn field(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|spec| spec.name == name)
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Absent,
}

/// Typed values for every schema field, produced only by a clean `validate_fields` pass.
#[derive(Debug)]
pub struct ValidatedFields {
    values: HashMap<&'static str, FieldValue>,
}

/// Checks every schema field against the source and collects all violations.
pub fn validate_fields(source: &EnvSource) -> AppResult<ValidatedFields> {
    let mut values = HashMap::with_capacity(FIELDS.len());
    let mut errors = Vec::new();

    for spec in FIELDS {
        if source.is_unreadable(spec.name) {
            errors.push(FieldError::new(spec.name, NON_UTF8, "is not valid UTF-8"));
            continue;
        }

        let raw = source.get(spec.name).map(str::trim);
        match coerce(spec, raw) {
            Ok(value) => {
                values.insert(spec.name, value);
            }
            Err(reason) => {
                let shown = match raw {
                    Some(_) if spec.is_secret() => REDACTED.to_string(),
                    Some(raw) => raw.to_string(),
                    None => String::new(),
                };
                errors.push(FieldError::new(spec.name, shown, reason));
            }
        }
    }

    if !errors.is_empty() {
        return Err(AppError::InvalidFields(errors));
    }

    debug!(fields = values.len(), "Configuration schema validated");
    Ok(ValidatedFields { values })
}

fn coerce(spec: &FieldSpec, raw: Option<&str>) -> Result<FieldValue, String> {
    if let FieldKind::OptionalText { min_len, .. } = spec.kind {
        let Some(value) = raw.filter(|v| !v.is_empty()) else {
            return Ok(FieldValue::Absent);
        };
        if let Some(min_len) = min_len {
            if value.chars().count() < min_len {
                return Err(format!("must be at least {} characters long", min_len));
            }
        }
        run_check(spec, value)?;
        return Ok(FieldValue::Text(value.to_string()));
    }

    let value = raw
        .or(spec.default)
        .ok_or_else(|| "is required".to_string())?;

    let coerced = match spec.kind {
        FieldKind::Int { min, max } => {
            let parsed: i64 = value
                .parse()
                .map_err(|_| "must be an integer".to_string())?;
            if let Some(min) = min {
                if parsed < min {
                    return Err(format!("must be >= {}", min));
                }
            }
            if let Some(max) = max {
                if parsed > max {
                    return Err(format!("must be <= {}", max));
                }
            }
            FieldValue::Int(parsed)
        }
        FieldKind::Float { min, max } => {
            let parsed: f64 = value
                .parse()
                .map_err(|_| "must be a number".to_string())?;
            if !(min..=max).contains(&parsed) {
                return Err(format!("must be between {} and {}", min, max));
            }
            FieldValue::Float(parsed)
        }
        FieldKind::Bool => FieldValue::Bool(validators::parse_bool(value)?),
        FieldKind::Symbol(variants) => {
            let normalized = value.to_ascii_lowercase();
            if !variants.contains(&normalized.as_str()) {
                return Err(format!("must be one of: {}", variants.join(", ")));
            }
            FieldValue::Text(normalized)
        }
        FieldKind::Text => FieldValue::Text(value.to_string()),
        FieldKind::OptionalText { .. } => unreachable!("handled above"),
    };

    if let FieldValue::Text(text) = &coerced {
        run_check(spec, text)?;
    }
    Ok(coerced)
}

fn run_check(spec: &FieldSpec, value: &str) -> Result<(), String> {
    match spec.check {
        Some(check) => check(value),
        None => Ok(()),
    }
}

impl ValidatedFields {
    fn get(&self, name: &str) -> AppResult<&FieldValue> {
        self.values
            .get(name)
            .ok_or_else(|| AppError::Internal(format!("{} is not a schema field", name)))
    }

    fn mismatch(name: &str, expected: &str) -> AppError {
        AppError::Internal(format!("{} is not declared as {}", name, expected))
    }

    pub fn int<T: TryFrom<i64>>(&self, name: &str) -> AppResult<T> {
        match self.get(name)? {
            FieldValue::Int(value) => T::try_from(*value).map_err(|_| {
                AppError::Internal(format!("{}={} does not fit its target type", name, value))
            }),
            _ => Err(Self::mismatch(name, "an integer")),
        }
    }

    pub fn float(&self, name: &str) -> AppResult<f64> {
        match self.get(name)? {
            FieldValue::Float(value) => Ok(*value),
            _ => Err(Self::mismatch(name, "a number")),
        }
    }

    pub fn flag(&self, name: &str) -> AppResult<bool> {
        match self.get(name)? {
            FieldValue::Bool(value) => Ok(*value),
            _ => Err(Self::mismatch(name, "a boolean")),
        }
    }

    pub fn text(&self, name: &str) -> AppResult<String> {
        match self.get(name)? {
            FieldValue::Text(value) => Ok(value.clone()),
            _ => Err(Self::mismatch(name, "text")),
        }
    }

    pub fn optional_text(&self, name: &str) -> AppResult<Option<String>> {
        match self.get(name)? {
            FieldValue::Text(value) => Ok(Some(value.clone())),
            FieldValue::Absent => Ok(None),
            _ => Err(Self::mismatch(name, "optional text")),
        }
    }

    pub fn symbol<T: FromStr<Err = String>>(&self, name: &str) -> AppResult<T> {
        self.text(name)?
            .parse()
            .map_err(|e: String| AppError::Internal(format!("{}: {}", name, e)))
    }
}
