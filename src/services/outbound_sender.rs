use std::sync::Arc;

use crate::schema::{DeliveryResult, DeliveryStep, StepKind};
use crate::services::image_compressor::ImageCompressor;
use crate::services::media_fetcher::MediaSource;
use crate::services::transport_client::MessageTransport;

/// Sequences a reply: image with the text as caption when possible, plain
/// text otherwise.
pub struct OutboundSender {
    media: Arc<dyn MediaSource>,
    compressor: ImageCompressor,
    transport: Arc<dyn MessageTransport>,
}

impl OutboundSender {
    pub fn new(
        media: Arc<dyn MediaSource>,
        compressor: ImageCompressor,
        transport: Arc<dyn MessageTransport>,
    ) -> Self {
        Self {
            media,
            compressor,
            transport,
        }
    }

    pub async fn send(
        &self,
        session: &str,
        phone: &str,
        message: &str,
        image_url: Option<&str>,
    ) -> DeliveryResult {
        let mut result = DeliveryResult::default();

        if let Some(url) = image_url {
            let step = self.send_image(session, phone, message, url).await;
            if let Some(step) = step {
                let delivered = step.success;
                result.push(step);
                // the caption carries the message, nothing left to send
                if delivered {
                    return result;
                }
            }
        }

        if message.is_empty() {
            tracing::debug!(phone, "no text to send");
            return result;
        }

        let sent = self.transport.send_text(session, phone, message).await;
        if let Err(e) = &sent {
            tracing::error!(phone, error = %e, "text delivery failed");
        }
        result.push(DeliveryStep::from_result(StepKind::Text, sent));
        result
    }

    /// `None` when the image could not be fetched, so no transport call was made.
    async fn send_image(
        &self,
        session: &str,
        phone: &str,
        caption: &str,
        url: &str,
    ) -> Option<DeliveryStep> {
        let media = match self.media.fetch(url).await.into_result() {
            Ok(media) => media,
            Err(failure) => {
                tracing::warn!(%failure, "image unavailable, falling back to text");
                return None;
            }
        };

        let compressor = self.compressor;
        let compressed = match tokio::task::spawn_blocking(move || compressor.compress(&media.bytes))
            .await
        {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "compression task failed, falling back to text");
                return None;
            }
        };

        let sent = self
            .transport
            .send_image(session, phone, caption, &compressed)
            .await;
        if let Err(e) = &sent {
            tracing::error!(phone, error = %e, "image delivery failed, falling back to text");
        }
        Some(DeliveryStep::from_result(StepKind::Image, sent))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::schema::{CompressionResult, FetchFailure, FetchOutcome, FetchedMedia};
    use serde_json::{Value, json};
    use std::sync::Mutex;

    pub struct StaticMedia(pub FetchOutcome);

    impl StaticMedia {
        pub fn image(bytes: Vec<u8>) -> Self {
            Self(FetchOutcome::Fetched(FetchedMedia {
                size: bytes.len(),
                bytes,
                content_type: "image/png".to_string(),
            }))
        }

        pub fn failing() -> Self {
            Self(FetchOutcome::Failed(FetchFailure {
                reason: "received an HTML page instead of media".to_string(),
                url: "https://x/err.html".to_string(),
                status: Some(200),
                attempt: 3,
            }))
        }
    }

    #[async_trait::async_trait]
    impl MediaSource for StaticMedia {
        async fn fetch(&self, _url: &str) -> FetchOutcome {
            self.0.clone()
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum SentCall {
        Text { phone: String, text: String },
        Image { phone: String, caption: String, bytes: usize },
    }

    #[derive(Default)]
    pub struct RecordingTransport {
        pub calls: Mutex<Vec<SentCall>>,
        pub reject_images: bool,
        pub reject_texts: bool,
    }

    #[async_trait::async_trait]
    impl MessageTransport for RecordingTransport {
        async fn send_text(&self, _session: &str, phone: &str, text: &str) -> Result<Value, String> {
            self.calls.lock().unwrap().push(SentCall::Text {
                phone: phone.to_string(),
                text: text.to_string(),
            });
            if self.reject_texts {
                Err("transport returned 500 Internal Server Error".to_string())
            } else {
                Ok(json!({ "id": "text-1" }))
            }
        }

        async fn send_image(
            &self,
            _session: &str,
            phone: &str,
            caption: &str,
            image: &CompressionResult,
        ) -> Result<Value, String> {
            self.calls.lock().unwrap().push(SentCall::Image {
                phone: phone.to_string(),
                caption: caption.to_string(),
                bytes: image.bytes.len(),
            });
            if self.reject_images {
                Err("transport returned 413 Payload Too Large".to_string())
            } else {
                Ok(json!({ "id": "image-1" }))
            }
        }
    }
}
