use serde_json::Value;

use crate::error::RelayError;
use crate::schema::{FileSummary, MessageEnvelope, WorkflowPayload};

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
const MAX_REDIRECTS: usize = 5;

/// What the webhook producer gets back once the engine accepted the message.
#[derive(Debug, Clone)]
pub struct Acknowledgement {
    pub engine_status: u16,
    pub files: Vec<FileSummary>,
}

impl Acknowledgement {
    pub fn files_uploaded(&self) -> usize {
        self.files.len()
    }
}

/// Forwards canonical messages to the workflow engine. No retries: the
/// webhook producer is expected to retry on its side.
pub struct WorkflowDispatcher {
    client: reqwest::Client,
    webhook_url: String,
}

impl WorkflowDispatcher {
    pub fn new(webhook_url: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self {
            client,
            webhook_url,
        })
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    pub async fn dispatch(&self, envelope: MessageEnvelope) -> Result<Acknowledgement, RelayError> {
        let payload = WorkflowPayload::from(envelope);
        let files: Vec<FileSummary> = payload.files.iter().map(FileSummary::from).collect();

        tracing::info!(
            session_id = %payload.envelope.session_id,
            from = %payload.envelope.from,
            files = files.len(),
            "dispatching to workflow engine"
        );

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RelayError::Dispatch {
                status: None,
                details: Value::String(e.to_string()),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let details = serde_json::from_str(&body).unwrap_or(Value::String(body));
            return Err(RelayError::Dispatch {
                status: Some(status.as_u16()),
                details,
            });
        }

        tracing::info!(status = status.as_u16(), "workflow engine accepted message");
        Ok(Acknowledgement {
            engine_status: status.as_u16(),
            files,
        })
    }
}
