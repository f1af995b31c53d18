//! One-shot reachability checks against the service's external dependencies.
//!
//! Probes are advisory: each one logs its outcome and returns a status, none
//! of them can fail startup. Every probe is bounded by `PROBE_TIMEOUT_SECS`.

pub mod accelerator;
pub mod database;
pub mod queue;
pub mod storage;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::config::AiServiceSettings;
use crate::error::{AppError, AppResult};

pub use accelerator::{AcceleratorProbe, AcceleratorRuntime, AcceleratorStatus, NvidiaSmi, probe_accelerator};
pub use database::probe_database;
pub use queue::probe_queue;
pub use storage::probe_storage;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub queue: bool,
    pub database: bool,
    pub storage: bool,
    pub accelerator: bool,
}

impl ProbeReport {
    pub fn all_ok(&self) -> bool {
        self.queue && self.database && self.storage && self.accelerator
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |ok: bool| if ok { "ok" } else { "unavailable" };
        write!(
            f,
            "Redis: {}, DB: {}, Storage: {}, GPU: {}",
            mark(self.queue),
            mark(self.database),
            mark(self.storage),
            mark(self.accelerator)
        )
    }
}

pub(crate) fn probe_timeout(settings: &AiServiceSettings) -> Duration {
    Duration::from_secs(settings.sandbox.probe_timeout_secs)
}

/// Runs `fut`, turning an elapsed deadline into an external-service error.
pub(crate) async fn with_timeout<T, F>(what: &str, timeout: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::External(format!(
            "{} did not respond within {}s",
            what,
            timeout.as_secs()
        ))),
    }
}

/// Runs the network probes one after another and folds in the accelerator result.
/// A failing probe never stops the next one.
pub async fn run_connectivity_probes(settings: &AiServiceSettings, accelerator: &AcceleratorProbe) -> ProbeReport {
    let queue = probe_queue(settings).await;
    let database = probe_database(settings).await;
    let storage = probe_storage(settings).await;

    let report = ProbeReport {
        queue,
        database,
        storage,
        accelerator: accelerator.ok,
    };
    info!("Connection status - {}", report);

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvSource;

    #[test]
    fn test_report_summary_line() {
        let report = ProbeReport {
            queue: true,
            database: false,
            storage: true,
            accelerator: false,
        };
        assert_eq!(
            report.to_string(),
            "Redis: ok, DB: unavailable, Storage: ok, GPU: unavailable"
        );
        assert!(!report.all_ok());
    }

    #[tokio::test]
    async fn test_with_timeout_reports_elapsed_deadline() {
        let result: AppResult<()> = with_timeout("slow dependency", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(AppError::External(message)) => assert!(message.contains("slow dependency")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connectivity_report_keeps_accelerator_result() {
        let source = EnvSource::from_pairs([
            ("REDIS_URL", "redis://127.0.0.1:1"),
            ("MINIO_ENDPOINT", "127.0.0.1:1"),
            ("PROBE_TIMEOUT_SECS", "2"),
        ]);
        let settings = AiServiceSettings::from_source(&source).unwrap();
        let accelerator = AcceleratorProbe {
            ok: true,
            status: Some(AcceleratorStatus::Available { device_count: 1 }),
        };

        let report = run_connectivity_probes(&settings, &accelerator).await;

        assert_eq!(
            report,
            ProbeReport {
                queue: false,
                database: false,
                storage: false,
                accelerator: true,
            }
        );
    }
}
