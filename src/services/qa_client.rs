use axum::http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::error::RelayError;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QaAnswer {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub answer: String,
    #[serde(default)]
    pub imagen_url: Option<String>,
    #[serde(default)]
    pub status: Option<Value>,
}

impl QaAnswer {
    /// Absent, null and blank URLs all mean there is no image to send.
    pub fn image_url(&self) -> Option<&str> {
        self.imagen_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[async_trait::async_trait]
pub trait QuestionAnswering: Send + Sync {
    async fn ask(&self, phone: &str, question: &str) -> Result<QaAnswer, RelayError>;
}

pub struct QaClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl QaClient {
    pub fn new(url: String, api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl QuestionAnswering for QaClient {
    async fn ask(&self, phone: &str, question: &str) -> Result<QaAnswer, RelayError> {
        let resp = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .json(&json!({ "question": question, "phone": phone }))
            .send()
            .await
            .map_err(|e| RelayError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: "question API unreachable".to_string(),
                details: Value::String(e.to_string()),
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let details = serde_json::from_str(&body).unwrap_or(Value::String(body));
            return Err(RelayError::Upstream {
                status,
                message: format!("question API returned {status}"),
                details,
            });
        }

        serde_json::from_str(&body).map_err(|e| RelayError::Upstream {
            status: StatusCode::BAD_GATEWAY,
            message: "question API returned an unreadable answer".to_string(),
            details: Value::String(e.to_string()),
        })
    }
}
