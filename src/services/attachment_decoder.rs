use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};

use crate::schema::{AttachmentKind, DecodedAttachment, RawAttachment, RawContent};

/// Why an attachment was left out of the forwarded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    EmptyPayload,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPayload => f.write_str("empty payload after decoding"),
        }
    }
}

pub fn decode(
    raw: &RawAttachment,
    session_id: &str,
    index: usize,
) -> Result<DecodedAttachment, DropReason> {
    decode_at(raw, session_id, index, Utc::now())
}

/// Same as [`decode`] with the clock pinned, used for the synthesized filename.
pub fn decode_at(
    raw: &RawAttachment,
    session_id: &str,
    index: usize,
    now: DateTime<Utc>,
) -> Result<DecodedAttachment, DropReason> {
    let bytes = content_bytes(&raw.data);
    if bytes.is_empty() {
        return Err(DropReason::EmptyPayload);
    }

    let filename = resolve_filename(raw.filename.as_deref(), raw.kind, now);
    let mimetype = resolve_mime(raw.mimetype.as_deref(), &filename, raw.kind);
    let storage_path = format!("{}/{}/{}", session_id, raw.kind.storage_dir(), filename);

    Ok(DecodedAttachment {
        index,
        kind: raw.kind,
        size: bytes.len(),
        md5: content_hash(&bytes),
        base64: BASE64.encode(&bytes),
        filename,
        mimetype,
        storage_path,
        caption: raw.caption.clone(),
        source_message_id: raw.source_message_id.clone(),
        bytes,
    })
}

fn content_bytes(content: &RawContent) -> Vec<u8> {
    match content {
        RawContent::Text(text) => decode_text(text),
        RawContent::Bytes(bytes) | RawContent::NodeBuffer { data: bytes } => bytes.clone(),
    }
}

/// Base64 when the cleaned text is pure base64 and decodes to something;
/// otherwise the text is taken literally.
fn decode_text(text: &str) -> Vec<u8> {
    let cleaned: String = strip_data_uri(text)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if looks_like_base64(&cleaned)
        && let Ok(bytes) = BASE64.decode(cleaned.as_bytes())
        && !bytes.is_empty()
    {
        return bytes;
    }

    text.as_bytes().to_vec()
}

fn strip_data_uri(text: &str) -> &str {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix("data:")
        && let Some(pos) = rest.find(";base64,")
    {
        return &rest[pos + ";base64,".len()..];
    }
    trimmed
}

fn looks_like_base64(text: &str) -> bool {
    text.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}

pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Keeps `[A-Za-z0-9._-]`, replaces everything else with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn resolve_filename(explicit: Option<&str>, kind: AttachmentKind, now: DateTime<Utc>) -> String {
    if let Some(name) = explicit.map(str::trim).filter(|n| !n.is_empty()) {
        return sanitize_filename(name);
    }
    let synthesized = format!(
        "{}_{}.{}",
        kind.as_str(),
        now.timestamp_millis(),
        kind.default_extension()
    );
    sanitize_filename(&synthesized)
}

fn resolve_mime(explicit: Option<&str>, filename: &str, kind: AttachmentKind) -> String {
    if let Some(mime) = explicit.map(str::trim).filter(|m| !m.is_empty()) {
        return mime.to_string();
    }
    mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or(kind.default_mime())
        .to_string()
}
