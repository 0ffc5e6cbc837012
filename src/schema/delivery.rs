use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub reason: String,
    pub url: String,
    pub status: Option<u16>,
    pub attempt: u32,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (url: {}, attempt {}", self.reason, self.url, self.attempt)?;
        if let Some(status) = self.status {
            write!(f, ", HTTP {status}")?;
        }
        write!(f, ")")
    }
}

/// Result of a media download. Never both payload and failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched(FetchedMedia),
    Failed(FetchFailure),
}

impl FetchOutcome {
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }

    pub fn into_result(self) -> Result<FetchedMedia, FetchFailure> {
        match self {
            Self::Fetched(media) => Ok(media),
            Self::Failed(failure) => Err(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionResult {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub compressed: bool,
    pub original_size: usize,
    pub final_size: usize,
    pub passes: u32,
    pub fallback_reason: Option<String>,
}

impl CompressionResult {
    /// The degrade path: hand back the untouched input with the reason attached.
    pub fn uncompressed(original: &[u8], content_type: &str, reason: impl Into<String>) -> Self {
        Self {
            bytes: original.to_vec(),
            content_type: content_type.to_string(),
            compressed: false,
            original_size: original.len(),
            final_size: original.len(),
            passes: 0,
            fallback_reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Image,
    Text,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryStep {
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryStep {
    pub fn from_result(kind: StepKind, result: Result<serde_json::Value, String>) -> Self {
        match result {
            Ok(ack) => Self {
                kind,
                success: true,
                response: Some(ack),
                error: None,
            },
            Err(error) => Self {
                kind,
                success: false,
                response: None,
                error: Some(error),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct DeliveryResult {
    pub steps: Vec<DeliveryStep>,
}

impl DeliveryResult {
    pub fn push(&mut self, step: DeliveryStep) {
        self.steps.push(step);
    }

    pub fn delivered(&self) -> bool {
        self.steps.iter().any(|s| s.success)
    }

    pub fn count(&self, kind: StepKind) -> usize {
        self.steps.iter().filter(|s| s.kind == kind).count()
    }
}
