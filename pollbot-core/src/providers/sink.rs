//! QR sink: outbound delivery of login codes to the operator

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Failed to read QR image: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Delivery rejected {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("QR rendering failed: {0}")]
    Render(String),
}

/// Renders a login URL as a scannable PNG
pub trait QrRenderer: Send + Sync {
    fn render_png(&self, url: &str) -> Result<Vec<u8>, DeliveryError>;
}

/// Sink delivering a rendered login QR to an operator channel (e.g. Telegram).
#[async_trait]
pub trait QrSink: Send + Sync {
    /// Provider name for logging (e.g. "telegram").
    fn name(&self) -> &str;

    /// Deliver the image with a caption. Called once per QR attempt.
    async fn deliver(&self, image: &Path, caption: &str) -> Result<(), DeliveryError>;
}
