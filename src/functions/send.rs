use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::error::RelayError;
use crate::functions::http::with_cors;
use crate::services::{
    ImageCompressor, MediaFetcher, OutboundSender, QaClient, QuestionAnswering, TokioSleeper,
    TransportClient,
};

const SERVICE_NAME: &str = "whatsapp-send-service";

#[derive(Clone)]
pub struct SendState {
    pub config: Arc<Config>,
    pub qa: Arc<dyn QuestionAnswering>,
    pub sender: Arc<OutboundSender>,
}

impl SendState {
    pub fn new(
        config: Arc<Config>,
        qa: Arc<dyn QuestionAnswering>,
        sender: Arc<OutboundSender>,
    ) -> Self {
        Self { config, qa, sender }
    }

    pub fn from_config(config: Arc<Config>) -> anyhow::Result<Self> {
        let qa = QaClient::new(config.qa_api_url.clone(), config.qa_api_key.clone())?;
        let fetcher = MediaFetcher::new(config.media.fetch_retries, Arc::new(TokioSleeper))?;
        let transport = TransportClient::new(
            config.transport_base_url.clone(),
            config.transport_api_token.clone(),
        )?;
        let sender = OutboundSender::new(
            Arc::new(fetcher),
            ImageCompressor::from(config.media),
            Arc::new(transport),
        );
        Ok(Self::new(config, Arc::new(qa), Arc::new(sender)))
    }
}

pub fn router(state: SendState) -> Router {
    with_cors(
        Router::new()
            .route("/send", post(send))
            .route("/health", get(health))
            .with_state(state),
    )
}

#[derive(Debug, Default, Deserialize)]
struct SendRequest {
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    question: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, RelayError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| RelayError::InvalidRequest(format!("{field} is required")))
}

async fn send(State(state): State<SendState>, body: Bytes) -> Result<Json<Value>, RelayError> {
    let request: SendRequest = serde_json::from_slice(&body)
        .map_err(|e| RelayError::InvalidRequest(format!("body is not valid JSON: {e}")))?;
    let phone = required(request.phone, "phone")?;
    let question = required(request.question, "question")?;

    let span = tracing::info_span!("send", request_id = %Uuid::new_v4(), phone = %phone);
    answer_and_deliver(&state, phone, question).instrument(span).await
}

async fn answer_and_deliver(
    state: &SendState,
    phone: String,
    question: String,
) -> Result<Json<Value>, RelayError> {
    let answer = state.qa.ask(&phone, &question).await?;
    tracing::info!(
        has_image = answer.image_url().is_some(),
        answer_len = answer.answer.len(),
        "answer received"
    );

    let delivery = state
        .sender
        .send(
            &state.config.session_id,
            &phone,
            &answer.answer,
            answer.image_url(),
        )
        .await;
    if !delivery.delivered() {
        tracing::warn!(steps = delivery.steps.len(), "nothing was delivered");
    }

    Ok(Json(json!({
        "success": true,
        "message": "Answer sent over WhatsApp",
        "data": {
            "status": answer.status,
            "answer": answer.answer,
            "imagen_url": answer.imagen_url,
        },
        "whatsapp_results": delivery,
    })))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
