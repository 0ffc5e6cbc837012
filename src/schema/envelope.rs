use serde::Serialize;

use crate::schema::attachment::DecodedAttachment;

/// Canonical inbound message, built once per request.
#[derive(Debug, Clone, Serialize)]
pub struct MessageEnvelope {
    pub session_id: String,
    pub from: String,
    #[serde(rename = "mensaje")]
    pub message_text: String,
    pub message_types: Vec<String>,
    pub message_count: u64,
    /// Attachment list exactly as received, for engines that decode it themselves.
    #[serde(rename = "raw_buffer")]
    pub raw_attachments: Vec<serde_json::Value>,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(rename = "remoteJid", skip_serializing_if = "Option::is_none")]
    pub raw_sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<serde_json::Value>,
    #[serde(rename = "pushName", skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    #[serde(rename = "messageType")]
    pub message_type: String,
    /// Attachments that survived decoding, in their original order.
    #[serde(skip)]
    pub attachments: Vec<DecodedAttachment>,
}

/// Exact body posted to the workflow engine.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowPayload {
    #[serde(flatten)]
    pub envelope: MessageEnvelope,
    pub files: Vec<DecodedAttachment>,
    pub files_count: usize,
}

impl From<MessageEnvelope> for WorkflowPayload {
    fn from(mut envelope: MessageEnvelope) -> Self {
        let files = std::mem::take(&mut envelope.attachments);
        Self {
            files_count: files.len(),
            envelope,
            files,
        }
    }
}
