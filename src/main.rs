use soundlab_ai_env::config::{EnvSource, LogLevel};
use soundlab_ai_env::run_startup_validation;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let print_config = std::env::args().skip(1).any(|arg| arg == "--print-config");

    // Raw values first, so LOG_LEVEL can drive the logger before validation runs
    let source = match EnvSource::from_process() {
        Ok(source) => source,
        Err(e) => {
            env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
            log::error!("Failed to read environment: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logger
    let default_level = source
        .get("LOG_LEVEL")
        .and_then(|level| level.parse::<LogLevel>().ok())
        .map(|level| level.as_level_filter().to_string().to_lowercase())
        .unwrap_or_else(|| "info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_level));

    let report = match run_startup_validation(&source).await {
        Ok(report) => report,
        Err(e) => {
            log::error!("Environment validation failed: {}", e);
            log::error!("Cannot start AI service without a valid environment");
            std::process::exit(1);
        }
    };

    if !report.probes.all_ok() {
        log::warn!("Starting with degraded dependencies: {}", report.probes);
    }

    if print_config {
        match serde_json::to_string_pretty(report.settings.as_ref()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                log::error!("Failed to serialize configuration: {}", e);
                std::process::exit(1);
            }
        }
    }

    println!("Environment validation completed successfully!");
}
