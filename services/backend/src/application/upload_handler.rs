//! メニュー画像アップロード用の署名付きURL発行

use serde_json::{json, Value};
use tracing::info;

use super::api::{required_field, ApiError, ApiRequest, ApiResponse};
use super::auth::require_admin;
use super::clock::new_id;
use crate::domain::upload::{object_key, public_url, validate_upload};
use crate::infrastructure::{UploadSettings, UploadUrlSigner};

pub struct UploadUrlHandler<S>
where
    S: UploadUrlSigner,
{
    signer: S,
    settings: UploadSettings,
}

impl<S> UploadUrlHandler<S>
where
    S: UploadUrlSigner,
{
    pub fn new(signer: S, settings: UploadSettings) -> Self {
        Self { signer, settings }
    }

    pub async fn handle(&self, event: &Value) -> ApiResponse {
        ApiResponse::respond("admin_image_upload_url", self.process(event).await)
    }

    async fn process(&self, event: &Value) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::from_event(event)?;
        require_admin(&request)?;
        let body = request.json_object()?;

        let file_name = required_field(&body, "fileName")?;
        let content_type = required_field(&body, "contentType")?;
        validate_upload(file_name, content_type)?;

        let key = object_key(&new_id(), file_name);
        let upload_url = self
            .signer
            .presign_put(&key, content_type, self.settings.expires_in)
            .await?;
        let file_url = public_url(
            self.settings.cdn_base_url.as_deref(),
            &self.settings.bucket_name,
            &key,
        );

        info!(key = %key, content_type = %content_type, "アップロードURL発行");
        Ok(ApiResponse::ok(&json!({
            "uploadUrl": upload_url,
            "fileUrl": file_url,
            "key": key,
            "expiresIn": self.settings.expires_in.as_secs(),
        })))
    }
}
