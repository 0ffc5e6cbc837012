use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use crate::schema::CompressionResult;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Outbound side of the WhatsApp automation backend.
#[async_trait::async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_text(&self, session: &str, phone: &str, text: &str) -> Result<Value, String>;

    async fn send_image(
        &self,
        session: &str,
        phone: &str,
        caption: &str,
        image: &CompressionResult,
    ) -> Result<Value, String>;
}

pub struct TransportClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl TransportClient {
    pub fn new(base_url: String, api_token: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn send_url(&self, session: &str) -> String {
        format!("{}/api/{}/send-message", self.base_url, session)
    }

    async fn post(&self, session: &str, body: &Value) -> Result<Value, String> {
        let resp = self
            .client
            .post(self.send_url(session))
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(body)
            .send()
            .await
            .map_err(|e| format!("transport unreachable: {e}"))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let ack = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if !status.is_success() {
            return Err(format!("transport returned {status}: {ack}"));
        }
        Ok(ack)
    }
}

pub fn text_body(phone: &str, text: &str) -> Value {
    json!({
        "phone": phone,
        "type": "text",
        "message": text,
    })
}

pub fn image_body(phone: &str, caption: &str, image: &CompressionResult) -> Value {
    let extension = image::ImageFormat::from_mime_type(&image.content_type)
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("bin");
    json!({
        "phone": phone,
        "type": "image",
        "message": caption,
        "media": {
            "data": BASE64.encode(&image.bytes),
            "mimetype": image.content_type,
            "filename": format!("imagen.{extension}"),
        },
    })
}

#[async_trait::async_trait]
impl MessageTransport for TransportClient {
    async fn send_text(&self, session: &str, phone: &str, text: &str) -> Result<Value, String> {
        tracing::info!(session, phone, chars = text.chars().count(), "sending text");
        self.post(session, &text_body(phone, text)).await
    }

    async fn send_image(
        &self,
        session: &str,
        phone: &str,
        caption: &str,
        image: &CompressionResult,
    ) -> Result<Value, String> {
        tracing::info!(
            session,
            phone,
            bytes = image.final_size,
            content_type = %image.content_type,
            "sending image"
        );
        self.post(session, &image_body(phone, caption, image)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_router;
    use axum::Json;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;

    fn jpeg(bytes: Vec<u8>) -> CompressionResult {
        CompressionResult {
            original_size: 10,
            final_size: bytes.len(),
            bytes,
            content_type: "image/jpeg".to_string(),
            compressed: true,
            passes: 1,
            fallback_reason: None,
        }
    }

    #[test]
    fn builds_image_body_with_base64_and_caption() {
        let body = image_body("51999999999", "Hola", &jpeg(vec![1, 2, 3]));
        assert_eq!(body["type"], "image");
        assert_eq!(body["message"], "Hola");
        assert_eq!(body["media"]["data"], "AQID");
        assert_eq!(body["media"]["filename"], "imagen.jpg");
    }

    #[test]
    fn fallback_image_keeps_its_own_extension() {
        let mut image = jpeg(vec![1]);
        image.content_type = "image/png".to_string();
        assert_eq!(image_body("1", "", &image)["media"]["filename"], "imagen.png");
    }

    #[test]
    fn unknown_fallback_type_gets_bin_extension() {
        let image = CompressionResult::uncompressed(b"??", "application/octet-stream", "unknown");
        let body = image_body("1", "", &image);
        assert_eq!(body["media"]["filename"], "imagen.bin");
        assert_eq!(body["media"]["mimetype"], "application/octet-stream");
    }

    #[tokio::test]
    async fn posts_to_session_endpoint_with_bearer_token() {
        let app = Router::new().route(
            "/api/{session}/send-message",
            post(
                |axum::extract::Path(session): axum::extract::Path<String>,
                 headers: HeaderMap,
                 Json(body): Json<Value>| async move {
                    Json(json!({
                        "session": session,
                        "auth": headers.get("authorization").and_then(|v| v.to_str().ok()),
                        "message": body["message"],
                    }))
                },
            ),
        );
        let base = spawn_router(app).await;
        let client = TransportClient::new(format!("{base}/"), "tok".to_string()).unwrap();

        let ack = client.send_text("bitel", "51999999999", "hola").await.unwrap();
        assert_eq!(ack["session"], "bitel");
        assert_eq!(ack["auth"], "Bearer tok");
        assert_eq!(ack["message"], "hola");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error_with_body() {
        let app = Router::new().route(
            "/api/{session}/send-message",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad token") }),
        );
        let base = spawn_router(app).await;
        let client = TransportClient::new(base, "nope".to_string()).unwrap();

        let err = client.send_text("bitel", "1", "x").await.unwrap_err();
        assert!(err.contains("401"));
        assert!(err.contains("bad token"));
    }
}
