// sqlbackup/src/upload/s3_upload.rs
use anyhow::{Context, Result};
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::primitives::ByteStream;
use std::path::Path;
use std::time::Duration;

use crate::config::S3Settings;

pub async fn build_client(settings: &S3Settings) -> s3::Client {
    let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
        .endpoint_url(&settings.endpoint_url)
        .region(Region::new(settings.region.clone()))
        .credentials_provider(s3::config::Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "Static",
        ))
        .load()
        .await;
    s3::Client::new(&sdk_config)
}

/// Uploads one archive to the configured bucket. The object key is the
/// file name, under `folder_prefix` when one is set.
pub async fn upload_file(
    client: &s3::Client,
    settings: &S3Settings,
    file_path: &Path,
    timeout: Duration,
) -> Result<()> {
    let file_name = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("artifact has no usable file name: {}", file_path.display()))?;
    let key = match &settings.folder_prefix {
        Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), file_name),
        None => file_name.to_string(),
    };

    let body = ByteStream::from_path(file_path)
        .await
        .with_context(|| format!("failed to read {}", file_path.display()))?;

    tokio::time::timeout(
        timeout,
        client
            .put_object()
            .bucket(&settings.bucket_name)
            .key(&key)
            .body(body)
            .send(),
    )
    .await
    .map_err(|_| anyhow::anyhow!("S3 upload timed out after {}s", timeout.as_secs()))?
    .with_context(|| {
        format!(
            "failed to upload {} to bucket {} with key {}",
            file_path.display(),
            settings.bucket_name,
            key
        )
    })?;

    tracing::info!(file = %file_path.display(), bucket = %settings.bucket_name, key = %key,
        "uploaded archive to S3");
    Ok(())
}
