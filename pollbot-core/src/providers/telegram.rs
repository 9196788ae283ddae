//! Telegram QR sink: upload login codes via the Bot API sendPhoto method.

use crate::models::mask_secret;
use crate::providers::{DeliveryError, QrSink};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;

/// Telegram photo sink. Token and chat_id from config/env. Never log token.
pub struct TelegramPhotoSink {
    token: String,
    chat_id: String,
    api_base: String,
    client: Arc<Client>,
}

impl TelegramPhotoSink {
    pub fn new(token: String, chat_id: String, api_base: String) -> Self {
        Self {
            token,
            chat_id,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: Arc::new(Client::new()),
        }
    }

    fn send_photo_url(&self) -> String {
        format!("{}/bot{}/sendPhoto", self.api_base, self.token)
    }
}

#[async_trait]
impl QrSink for TelegramPhotoSink {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, image: &Path, caption: &str) -> Result<(), DeliveryError> {
        let bytes = tokio::fs::read(image).await?;
        let photo = Part::bytes(bytes)
            .file_name("qr.png")
            .mime_str("image/png")?;
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .part("photo", photo);

        let res = self
            .client
            .post(self.send_photo_url())
            .multipart(form)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected { status, body });
        }

        tracing::info!(
            bot = %mask_secret(&self.token),
            caption = caption,
            "QR delivered via Telegram"
        );
        Ok(())
    }
}
