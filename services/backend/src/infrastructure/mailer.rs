//! SES v2によるメール送信
use async_trait::async_trait;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;
use thiserror::Error;
use tracing::{info, warn};

const CHARSET: &str = "UTF-8";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MailError {
    #[error("メッセージ構築エラー: {0}")]
    BuildError(String),

    #[error("SES送信エラー: {0}")]
    SendFailed(String),
}

/// プレーンテキストメール
#[derive(Debug, Clone, PartialEq)]
pub struct PlainEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// メールを送信し、メッセージIDを返す
    async fn send(&self, email: &PlainEmail) -> Result<String, MailError>;
}

#[derive(Debug, Clone)]
pub struct SesMailer {
    client: SesClient,
}

impl SesMailer {
    pub fn new(client: SesClient) -> Self {
        Self { client }
    }

    fn content(data: &str) -> Result<Content, MailError> {
        Content::builder()
            .data(data)
            .charset(CHARSET)
            .build()
            .map_err(|e| MailError::BuildError(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, email: &PlainEmail) -> Result<String, MailError> {
        let message = Message::builder()
            .subject(Self::content(&email.subject)?)
            .body(Body::builder().text(Self::content(&email.body)?).build())
            .build();

        let output = self
            .client
            .send_email()
            .from_email_address(&email.from)
            .destination(Destination::builder().to_addresses(&email.to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| {
                warn!(to = %email.to, error = %e, "SES SendEmailエラー");
                MailError::SendFailed(e.to_string())
            })?;

        let message_id = output.message_id().unwrap_or("unknown").to_string();
        info!(to = %email.to, message_id = %message_id, "メール送信完了");
        Ok(message_id)
    }
}
