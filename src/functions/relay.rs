use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::error::RelayError;
use crate::functions::http::with_cors;
use crate::schema::{FileSummary, MessageEnvelope};
use crate::services::WorkflowDispatcher;
use crate::services::envelope_normalizer::normalize;

const SERVICE_NAME: &str = "whatsapp-n8n-relay";
const SEND_MESSAGE_OP: &str = "ENVIAR_MENSAJE_WHATSAPP";

#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<WorkflowDispatcher>,
}

impl RelayState {
    pub fn from_config(config: Arc<Config>) -> anyhow::Result<Self> {
        let dispatcher = WorkflowDispatcher::new(config.n8n_webhook_url.clone())?;
        Ok(Self {
            config,
            dispatcher: Arc::new(dispatcher),
        })
    }
}

pub fn router(state: RelayState) -> Router {
    with_cors(
        Router::new()
            .route("/webhook/trigger", post(trigger))
            .route("/webhook/whatsapp", post(whatsapp))
            .route("/health", get(health))
            .with_state(state),
    )
}

#[derive(Debug, Serialize)]
struct RelayData {
    session_id: String,
    from: String,
    mensaje: String,
    #[serde(rename = "pushName")]
    push_name: Option<String>,
    n8n_status: u16,
    message_types: Vec<String>,
    message_count: u64,
    files_uploaded: usize,
    files: Vec<FileSummary>,
}

async fn trigger(State(state): State<RelayState>, body: Bytes) -> Result<Json<Value>, RelayError> {
    let mut body = parse_body(&body)?;
    let op = body
        .as_object_mut()
        .and_then(|obj| obj.remove("codOpe"))
        .and_then(|v| v.as_str().map(ToString::to_string));

    match op.as_deref() {
        Some(SEND_MESSAGE_OP) => relay(&state, body).await,
        Some(other) => Err(RelayError::UnsupportedOperation(other.to_string())),
        None => Err(RelayError::InvalidRequest("codOpe is required".to_string())),
    }
}

async fn whatsapp(State(state): State<RelayState>, body: Bytes) -> Result<Json<Value>, RelayError> {
    let body = parse_body(&body)?;
    relay(&state, body).await
}

async fn relay(state: &RelayState, body: Value) -> Result<Json<Value>, RelayError> {
    let span = tracing::info_span!("relay", request_id = %Uuid::new_v4());
    normalize_and_dispatch(state, body).instrument(span).await
}

async fn normalize_and_dispatch(state: &RelayState, body: Value) -> Result<Json<Value>, RelayError> {
    let envelope = normalize(body, &state.config.session_id)?;
    tracing::info!(
        session_id = %envelope.session_id,
        from = %envelope.from,
        types = ?envelope.message_types,
        attachments = envelope.raw_attachments.len(),
        decoded = envelope.attachments.len(),
        "inbound message normalized"
    );

    let summary = summarize(&envelope);
    let ack = state.dispatcher.dispatch(envelope).await?;

    let data = RelayData {
        n8n_status: ack.engine_status,
        files_uploaded: ack.files_uploaded(),
        files: ack.files,
        ..summary
    };
    Ok(Json(json!({
        "success": true,
        "message": "Message relayed to workflow engine",
        "data": data,
    })))
}

fn summarize(envelope: &MessageEnvelope) -> RelayData {
    RelayData {
        session_id: envelope.session_id.clone(),
        from: envelope.from.clone(),
        mensaje: envelope.message_text.clone(),
        push_name: envelope.push_name.clone(),
        n8n_status: 0,
        message_types: envelope.message_types.clone(),
        message_count: envelope.message_count,
        files_uploaded: 0,
        files: Vec::new(),
    }
}

fn parse_body(body: &[u8]) -> Result<Value, RelayError> {
    serde_json::from_slice(body).map_err(|e| RelayError::Decode(format!("body is not valid JSON: {e}")))
}

async fn health(State(state): State<RelayState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "n8n_webhook": state.dispatcher.webhook_url(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_router;
    use axum::http::StatusCode;
    use std::sync::Mutex;

    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    struct Harness {
        base: String,
        engine_bodies: Arc<Mutex<Vec<Value>>>,
    }

    async fn start(engine_status: StatusCode) -> Harness {
        let engine_bodies = Arc::new(Mutex::new(Vec::new()));
        let sink = engine_bodies.clone();
        let engine = Router::new().route(
            "/webhook/whatsapp",
            post(move |Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(body);
                    (engine_status, Json(json!({ "message": "Workflow was started" })))
                }
            }),
        );
        let engine_base = spawn_router(engine).await;

        let config = Arc::new(Config {
            n8n_webhook_url: format!("{engine_base}/webhook/whatsapp"),
            ..Config::default()
        });
        let base = spawn_router(router(RelayState::from_config(config).unwrap())).await;
        Harness {
            base,
            engine_bodies,
        }
    }

    async fn post_json(url: String, body: Value) -> (StatusCode, Value) {
        let resp = reqwest::Client::new().post(url).json(&body).send().await.unwrap();
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn relays_plain_text_message() {
        let h = start(StatusCode::OK).await;
        let (status, body) = post_json(
            format!("{}/webhook/whatsapp", h.base),
            json!({
                "sessionId": "bitel",
                "fromNumber": "51999999999",
                "messageText": "Hola",
                "messageTypes": ["text"],
                "buffer": []
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["files_uploaded"], 0);
        assert_eq!(body["data"]["mensaje"], "Hola");
        assert_eq!(body["data"]["n8n_status"], 200);
        assert_eq!(h.engine_bodies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn relays_image_attachment() {
        let h = start(StatusCode::OK).await;
        let (status, body) = post_json(
            format!("{}/webhook/whatsapp", h.base),
            json!({
                "sessionId": "bitel",
                "fromNumber": "51999999999",
                "messageText": "Hola",
                "messageTypes": ["text"],
                "buffer": [{ "type": "image", "data": PNG_B64, "filename": "foto.png" }]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["files_uploaded"], 1);
        let file = &body["data"]["files"][0];
        assert_eq!(file["filename"], "foto.png");
        assert_eq!(file["type"], "image");
        assert_eq!(file["mimetype"], "image/png");
        assert_eq!(file["size"], 68);

        let forwarded = h.engine_bodies.lock().unwrap()[0].clone();
        assert_eq!(forwarded["files"][0]["storage_path"], "bitel/imagen/foto.png");
        assert_eq!(forwarded["files"][0]["data"], PNG_B64);
    }

    #[tokio::test]
    async fn trigger_with_known_operation_relays_rest() {
        let h = start(StatusCode::OK).await;
        let (status, body) = post_json(
            format!("{}/webhook/trigger", h.base),
            json!({
                "codOpe": "ENVIAR_MENSAJE_WHATSAPP",
                "data": json!({ "from": "51988888888@s.whatsapp.net", "messageText": "hola" }).to_string()
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["from"], "51988888888");
        let forwarded = h.engine_bodies.lock().unwrap()[0].clone();
        assert_eq!(forwarded["mensaje"], "hola");
        assert_eq!(forwarded["remoteJid"], "51988888888@s.whatsapp.net");
    }

    #[tokio::test]
    async fn trigger_rejects_unknown_operation() {
        let h = start(StatusCode::OK).await;
        let (status, body) = post_json(
            format!("{}/webhook/trigger", h.base),
            json!({ "codOpe": "DESCONOCIDO" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(h.engine_bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn trigger_without_operation_is_a_bad_request() {
        let h = start(StatusCode::OK).await;
        let (status, _) = post_json(format!("{}/webhook/trigger", h.base), json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_string_data_is_a_server_error() {
        let h = start(StatusCode::OK).await;
        let (status, body) = post_json(
            format!("{}/webhook/whatsapp", h.base),
            json!({ "data": "{broken" }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(h.engine_bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn engine_failure_returns_its_body_as_details() {
        let h = start(StatusCode::INTERNAL_SERVER_ERROR).await;
        let (status, body) = post_json(
            format!("{}/webhook/whatsapp", h.base),
            json!({ "messageText": "Hola" }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["details"]["message"], "Workflow was started");
    }

    #[tokio::test]
    async fn health_reports_webhook() {
        let h = start(StatusCode::OK).await;
        let body: Value = reqwest::get(format!("{}/health", h.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], SERVICE_NAME);
        assert!(body["n8n_webhook"].as_str().unwrap().ends_with("/webhook/whatsapp"));
    }
}
