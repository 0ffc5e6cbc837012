use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    Voice,
    Document,
    Sticker,
}

impl AttachmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Voice => "voice",
            Self::Document => "document",
            Self::Sticker => "sticker",
        }
    }

    /// Extension used when the sender did not supply a filename.
    pub fn default_extension(self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Video => "mp4",
            Self::Audio => "mp3",
            Self::Voice => "ogg",
            Self::Document => "pdf",
            Self::Sticker => "webp",
        }
    }

    pub fn default_mime(self) -> &'static str {
        match self {
            Self::Image => "image/jpeg",
            Self::Video => "video/mp4",
            Self::Audio => "audio/mpeg",
            Self::Voice => "audio/ogg",
            Self::Document => "application/pdf",
            Self::Sticker => "image/webp",
        }
    }

    /// Directory segment of the virtual storage path.
    pub fn storage_dir(self) -> &'static str {
        match self {
            Self::Image => "imagen",
            Self::Video => "video",
            Self::Audio | Self::Voice => "audio",
            Self::Document | Self::Sticker => "documentos",
        }
    }
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attachment content as it arrives on the wire: a string (base64, data URI or
/// literal text), a JSON byte array, or a serialized Node buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawContent {
    Text(String),
    Bytes(Vec<u8>),
    NodeBuffer { data: Vec<u8> },
}

impl Default for RawContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAttachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    #[serde(default, alias = "base64", alias = "content", alias = "buffer")]
    pub data: RawContent,
    #[serde(default, alias = "fileName")]
    pub filename: Option<String>,
    #[serde(default, alias = "mimeType", alias = "mime")]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default, alias = "messageId", alias = "message_id")]
    pub source_message_id: Option<String>,
}

/// Decoded attachment forwarded to the workflow engine. The raw bytes stay in
/// process; the engine receives them re-encoded as base64.
#[derive(Debug, Clone, Serialize)]
pub struct DecodedAttachment {
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub filename: String,
    pub mimetype: String,
    pub size: usize,
    pub md5: String,
    pub storage_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<String>,
    #[serde(rename = "data")]
    pub base64: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Per-file metadata echoed back to the webhook producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub filename: String,
    pub size: usize,
    pub mimetype: String,
}

impl From<&DecodedAttachment> for FileSummary {
    fn from(att: &DecodedAttachment) -> Self {
        Self {
            index: att.index,
            kind: att.kind,
            filename: att.filename.clone(),
            size: att.size,
            mimetype: att.mimetype.clone(),
        }
    }
}
