use std::str::FromStr;

const DEFAULT_TRANSPORT_BASE_URL: &str = "http://localhost:21465";
const DEFAULT_N8N_WEBHOOK_URL: &str = "http://localhost:5678/webhook/whatsapp";
const DEFAULT_QA_API_URL: &str = "http://localhost:8000/ask";
const DEFAULT_SESSION_ID: &str = "bitel";

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub relay_port: u16,
    pub send_port: u16,
    pub transport_base_url: String,
    pub transport_api_token: String,
    pub n8n_webhook_url: String,
    pub qa_api_url: String,
    pub qa_api_key: String,
    pub session_id: String,
    pub media: MediaSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaSettings {
    pub max_width: u32,
    pub quality: u8,
    pub max_size_kb: usize,
    pub fetch_retries: u32,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            max_width: 800,
            quality: 70,
            max_size_kb: 50,
            fetch_retries: 2,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            relay_port: 3000,
            send_port: 3001,
            transport_base_url: DEFAULT_TRANSPORT_BASE_URL.to_string(),
            transport_api_token: String::new(),
            n8n_webhook_url: DEFAULT_N8N_WEBHOOK_URL.to_string(),
            qa_api_url: DEFAULT_QA_API_URL.to_string(),
            qa_api_key: String::new(),
            session_id: DEFAULT_SESSION_ID.to_string(),
            media: MediaSettings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests never touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let media_defaults = MediaSettings::default();

        let string = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        Self {
            bind_address: string("BIND_ADDRESS", defaults.bind_address),
            relay_port: parse_or(&lookup, "RELAY_PORT", defaults.relay_port),
            send_port: parse_or(&lookup, "SEND_PORT", defaults.send_port),
            transport_base_url: string("TRANSPORT_BASE_URL", defaults.transport_base_url)
                .trim_end_matches('/')
                .to_string(),
            transport_api_token: string("TRANSPORT_API_TOKEN", defaults.transport_api_token),
            n8n_webhook_url: string("N8N_WEBHOOK_URL", defaults.n8n_webhook_url),
            qa_api_url: string("QA_API_URL", defaults.qa_api_url),
            qa_api_key: string("QA_API_KEY", defaults.qa_api_key),
            session_id: string("SESSION_ID", defaults.session_id),
            media: MediaSettings {
                max_width: parse_or(&lookup, "MEDIA_MAX_WIDTH", media_defaults.max_width),
                quality: parse_or(&lookup, "MEDIA_QUALITY", media_defaults.quality),
                max_size_kb: parse_or(&lookup, "MEDIA_MAX_SIZE_KB", media_defaults.max_size_kb),
                fetch_retries: parse_or(&lookup, "MEDIA_FETCH_RETRIES", media_defaults.fetch_retries),
            },
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        None => default,
        Some(raw) if raw.trim().is_empty() => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, %default, "invalid config value, using default");
            default
        }),
    }
}
