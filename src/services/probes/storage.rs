use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use tracing::{debug, info, warn};

use super::{probe_timeout, with_timeout};
use crate::config::settings::{MinioConfig, S3Config};
use crate::config::{AiServiceSettings, StorageProvider};
use crate::error::{AppError, AppResult};

/// MinIO ignores the region, but the S3 signer needs one.
const MINIO_REGION: &str = "us-east-1";

/// Lists buckets on the configured object store. Providers without a remote
/// endpoint report false without trying.
pub async fn probe_storage(settings: &AiServiceSettings) -> bool {
    let timeout = probe_timeout(settings);
    let storage = &settings.storage;

    let (label, result) = match storage.provider {
        StorageProvider::Minio => (
            "MinIO",
            with_timeout("MinIO", timeout, list_buckets(minio_client(&storage.minio))).await,
        ),
        StorageProvider::S3 => (
            "S3",
            with_timeout("S3", timeout, async {
                let client = s3_client(&storage.s3).await;
                list_buckets(client).await
            })
            .await,
        ),
        other => {
            info!(provider = %other, "Storage provider has no connectivity check");
            return false;
        }
    };

    match result {
        Ok(bucket_count) => {
            info!(buckets = bucket_count, "{} connection validated", label);
            true
        }
        Err(e) => {
            warn!(error = %e, "{} connection failed", label);
            false
        }
    }
}

/// Endpoint URL for a MinIO `host:port`, honouring the TLS flag unless a scheme is already given.
pub fn minio_endpoint_url(config: &MinioConfig) -> String {
    if config.endpoint.contains("://") {
        return config.endpoint.clone();
    }
    let scheme = if config.use_ssl { "https" } else { "http" };
    format!("{}://{}", scheme, config.endpoint)
}

fn minio_client(config: &MinioConfig) -> Client {
    let credentials = Credentials::new(
        config.access_key.clone(),
        config.secret_key.expose().to_string(),
        None,
        None,
        "minio-settings",
    );

    let s3_config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(MINIO_REGION))
        .endpoint_url(minio_endpoint_url(config))
        .credentials_provider(credentials)
        .force_path_style(true)
        .retry_config(RetryConfig::disabled())
        .build();

    Client::from_conf(s3_config)
}

async fn s3_client(config: &S3Config) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .retry_config(RetryConfig::disabled());

    // Fall back to the default credential chain when the keys are not configured
    if let (Some(access_key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
        loader = loader.credentials_provider(Credentials::new(
            access_key_id.clone(),
            secret.expose().to_string(),
            None,
            None,
            "s3-settings",
        ));
    }

    let shared_config = loader.load().await;
    Client::new(&shared_config)
}

async fn list_buckets(client: Client) -> AppResult<usize> {
    let output = client
        .list_buckets()
        .send()
        .await
        .map_err(|e| AppError::External(format!("{}", DisplayErrorContext(&e))))?;

    let count = output.buckets().len();
    debug!(buckets = count, "Listed storage buckets");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvSource;

    fn settings(pairs: &[(&str, &str)]) -> AiServiceSettings {
        AiServiceSettings::from_source(&EnvSource::from_pairs(pairs.iter().copied())).unwrap()
    }

    #[test]
    fn test_minio_endpoint_url() {
        let plain = settings(&[]);
        assert_eq!(minio_endpoint_url(&plain.storage.minio), "http://localhost:9000");

        let tls = settings(&[("MINIO_USE_SSL", "true"), ("MINIO_ENDPOINT", "minio.internal:9443")]);
        assert_eq!(minio_endpoint_url(&tls.storage.minio), "https://minio.internal:9443");

        let explicit = settings(&[("MINIO_ENDPOINT", "http://minio:9000")]);
        assert_eq!(minio_endpoint_url(&explicit.storage.minio), "http://minio:9000");
    }

    #[tokio::test]
    async fn test_local_provider_is_not_probed() {
        assert!(!probe_storage(&settings(&[("STORAGE_PROVIDER", "local")])).await);
    }

    #[tokio::test]
    async fn test_unreachable_minio_returns_false() {
        let unreachable = settings(&[
            ("MINIO_ENDPOINT", "127.0.0.1:1"),
            ("PROBE_TIMEOUT_SECS", "2"),
        ]);
        assert!(!probe_storage(&unreachable).await);
    }
}
