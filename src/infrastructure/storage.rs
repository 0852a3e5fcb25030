use crate::config::{AppConfig, StorageBackend};
use crate::services::storage::{LocalStorageService, S3StorageService, StorageService};
use aws_sdk_s3::config::Region;
use std::env;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &AppConfig) -> anyhow::Result<Arc<dyn StorageService>> {
    match config.storage_backend {
        StorageBackend::Local => {
            tokio::fs::create_dir_all(&config.media_root).await?;
            info!("🗄️  Local storage: {}", config.media_root);
            Ok(Arc::new(LocalStorageService::new(&config.media_root)))
        }
        StorageBackend::S3 => {
            let require = |name: &str| {
                env::var(name).map_err(|_| anyhow::anyhow!("{} must be set", name))
            };
            let endpoint_url = require("S3_ENDPOINT")?;
            let access_key = require("S3_ACCESS_KEY")?;
            let secret_key = require("S3_SECRET_KEY")?;
            let bucket = require("S3_BUCKET")?;

            info!("☁️  S3 Storage: {} (Bucket: {})", endpoint_url, bucket);

            let aws_config = aws_config::from_env()
                .endpoint_url(&endpoint_url)
                .region(Region::new("us-east-1"))
                .credentials_provider(aws_sdk_s3::config::Credentials::new(
                    access_key, secret_key, None, None, "static",
                ))
                .load()
                .await;

            let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build();

            let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
            Ok(Arc::new(S3StorageService::new(s3_client, bucket)))
        }
    }
}
