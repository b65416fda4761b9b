//! Optional copy of generated documents in S3.
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::error::AppError;

#[async_trait]
pub trait DocumentArchive: Send + Sync {
    async fn store(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), AppError>;
}

pub struct S3Archive {
    client: S3Client,
    bucket: String,
}

impl S3Archive {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into() }
    }
}

/// `offers/<year>/<filename>`
pub fn archive_key(year: i32, filename: &str) -> String {
    format!("offers/{}/{}", year, filename)
}

#[async_trait]
impl DocumentArchive for S3Archive {
    async fn store(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| AppError::ExternalResource(format!("Failed to upload {} to S3: {}", key, e)))?;
        tracing::info!(bucket = %self.bucket, key, "Offer archived");
        Ok(())
    }
}
