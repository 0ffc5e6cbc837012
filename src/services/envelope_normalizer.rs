use serde_json::Value;

use crate::error::RelayError;
use crate::schema::{DecodedAttachment, MessageEnvelope, RawAttachment};
use crate::services::attachment_decoder;

const WHATSAPP_SUFFIX: &str = "@s.whatsapp.net";

/// One way of pulling a value out of the message data. Rules for a field are
/// tried in order and the first one that yields a value wins.
type Rule<T> = fn(&Value) -> Option<T>;

fn first_match<T>(data: &Value, rules: &[Rule<T>]) -> Option<T> {
    rules.iter().find_map(|rule| rule(data))
}

fn non_empty_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn strip_suffix(jid: String) -> String {
    jid.strip_suffix(WHATSAPP_SUFFIX)
        .map(ToString::to_string)
        .unwrap_or(jid)
}

const SESSION_RULES: &[Rule<String>] = &[
    |d| non_empty_str(&d["sessionId"]),
    |d| non_empty_str(&d["session"]),
    |d| non_empty_str(&d["companyId"]),
];

const SENDER_RULES: &[Rule<String>] = &[
    |d| non_empty_str(&d["fromNumber"]),
    |d| non_empty_str(&d["from"]).map(strip_suffix),
    |d| non_empty_str(&d["key"]["remoteJid"]).map(strip_suffix),
];

const TEXT_RULES: &[Rule<String>] = &[
    |d| d["messageText"].as_str().map(ToString::to_string),
    |d| d["message"]["conversation"].as_str().map(ToString::to_string),
    |d| d["message"]["extendedTextMessage"]["text"].as_str().map(ToString::to_string),
    |d| d["body"].as_str().map(ToString::to_string),
];

const TYPES_RULES: &[Rule<Vec<String>>] = &[
    |d| {
        let types: Vec<String> = d["messageTypes"]
            .as_array()?
            .iter()
            .filter_map(non_empty_str)
            .collect();
        (!types.is_empty()).then_some(types)
    },
    |d| non_empty_str(&d["messageType"]).map(|t| vec![t]),
];

const COUNT_RULES: &[Rule<u64>] = &[
    |d| d["messageCount"].as_u64(),
    |d| d["messages"].as_array().map(|m| m.len() as u64).filter(|n| *n > 0),
];

const ATTACHMENT_RULES: &[Rule<Vec<Value>>] = &[
    |d| d["buffer"].as_array().cloned(),
    |d| d["attachments"].as_array().cloned(),
    |d| d["files"].as_array().cloned(),
];

const MESSAGE_ID_RULES: &[Rule<String>] = &[
    |d| non_empty_str(&d["messageId"]),
    |d| non_empty_str(&d["key"]["id"]),
    |d| non_empty_str(&d["id"]),
];

const RAW_SENDER_RULES: &[Rule<String>] = &[
    |d| non_empty_str(&d["from"]),
    |d| non_empty_str(&d["key"]["remoteJid"]),
    |d| non_empty_str(&d["remoteJid"]),
];

const TIMESTAMP_RULES: &[Rule<Value>] = &[
    |d| Some(d["timestamp"].clone()).filter(|v| !v.is_null()),
    |d| Some(d["messageTimestamp"].clone()).filter(|v| !v.is_null()),
];

const PUSH_NAME_RULES: &[Rule<String>] = &[
    |d| non_empty_str(&d["pushName"]),
    |d| non_empty_str(&d["notifyName"]),
];

/// Picks the message data out of one of the accepted body shapes.
pub fn unwrap_data(mut body: Value) -> Result<Value, RelayError> {
    if let Some(Value::String(encoded)) = body.get("data") {
        return serde_json::from_str(encoded)
            .map_err(|e| RelayError::Decode(format!("data field is not valid JSON: {e}")));
    }
    if body.get("data").is_some_and(Value::is_object) {
        return Ok(body["data"].take());
    }
    Ok(body)
}

pub fn normalize(body: Value, default_session: &str) -> Result<MessageEnvelope, RelayError> {
    let data = unwrap_data(body)?;
    if !data.is_object() {
        return Err(RelayError::Decode("message data must be a JSON object".to_string()));
    }

    let session_id =
        first_match(&data, SESSION_RULES).unwrap_or_else(|| default_session.to_string());
    let message_types =
        first_match(&data, TYPES_RULES).unwrap_or_else(|| vec!["text".to_string()]);
    let raw_attachments = first_match(&data, ATTACHMENT_RULES).unwrap_or_default();
    let attachments = decode_all(&raw_attachments, &session_id);

    Ok(MessageEnvelope {
        from: first_match(&data, SENDER_RULES).unwrap_or_default(),
        message_text: first_match(&data, TEXT_RULES).unwrap_or_default(),
        message_count: first_match(&data, COUNT_RULES).unwrap_or(1),
        message_id: first_match(&data, MESSAGE_ID_RULES),
        raw_sender: first_match(&data, RAW_SENDER_RULES),
        timestamp: first_match(&data, TIMESTAMP_RULES),
        push_name: first_match(&data, PUSH_NAME_RULES),
        message_type: message_types[0].clone(),
        message_types,
        session_id,
        raw_attachments,
        attachments,
    })
}

fn decode_all(raw: &[Value], session_id: &str) -> Vec<DecodedAttachment> {
    let mut decoded = Vec::with_capacity(raw.len());
    for (index, item) in raw.iter().enumerate() {
        let attachment: RawAttachment = match serde_json::from_value(item.clone()) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping malformed attachment");
                continue;
            }
        };
        match attachment_decoder::decode(&attachment, session_id, index) {
            Ok(att) => {
                tracing::debug!(
                    index,
                    kind = %att.kind,
                    filename = %att.filename,
                    size = att.size,
                    "decoded attachment"
                );
                decoded.push(att);
            }
            Err(reason) => {
                tracing::warn!(index, kind = %attachment.kind, %reason, "skipping attachment");
            }
        }
    }
    decoded
}
