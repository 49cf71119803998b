//! S3署名付きアップロードURLの発行
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SignError {
    #[error("署名設定エラー: {0}")]
    InvalidConfig(String),

    #[error("署名付きURL生成エラー: {0}")]
    PresignFailed(String),
}

#[async_trait]
pub trait UploadUrlSigner: Send + Sync {
    /// PUT用の署名付きURLを発行する
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String, SignError>;
}

#[derive(Debug, Clone)]
pub struct S3UploadSigner {
    client: S3Client,
    bucket: String,
}

impl S3UploadSigner {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl UploadUrlSigner for S3UploadSigner {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String, SignError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| SignError::InvalidConfig(e.to_string()))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| {
                warn!(bucket = %self.bucket, key = %key, error = %e, "署名付きURL生成エラー");
                SignError::PresignFailed(e.to_string())
            })?;

        debug!(bucket = %self.bucket, key = %key, "署名付きURL生成");
        Ok(request.uri().to_string())
    }
}
