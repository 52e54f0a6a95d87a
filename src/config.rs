use crate::db::Database;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// Keys accepted by the settings table. Anything else is rejected.
pub const SETTING_KEYS: &[&str] = &[
    "api_base_url",
    "chatbot_webhook_url",
    "page_poll_interval_ms",
    "request_timeout_ms",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub api_base_url: String,
    pub chatbot_webhook_url: Option<String>,
    pub request_timeout: Duration,
    pub summary_timeout: Duration,
    pub page_poll_interval: Duration,
    /// Slides are rendered at `max_render_width / page_width`.
    pub max_render_width: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            chatbot_webhook_url: None,
            request_timeout: Duration::from_millis(10_000),
            summary_timeout: Duration::from_millis(15_000),
            page_poll_interval: Duration::from_millis(1_000),
            max_render_width: 900.0,
        }
    }
}

impl AppConfig {
    /// Defaults, then `NOTESYNC_*` environment variables, then stored settings.
    pub fn load(db: &Database) -> rusqlite::Result<Self> {
        let mut config = Self::default();
        config.apply(|key| {
            let var = format!("NOTESYNC_{}", env_name(key));
            std::env::var(var).ok()
        });
        let mut stored = Vec::new();
        for key in SETTING_KEYS {
            if let Some(value) = db.get_setting(key)? {
                stored.push((*key, value));
            }
        }
        config.apply(|key| {
            stored
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        });
        Ok(config)
    }

    fn apply(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("api_base_url").filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup("chatbot_webhook_url") {
            let url = url.trim();
            self.chatbot_webhook_url = (!url.is_empty()).then(|| url.to_string());
        }
        if let Some(ms) = lookup("page_poll_interval_ms").and_then(|v| parse_millis(&v)) {
            self.page_poll_interval = ms;
        }
        if let Some(ms) = lookup("request_timeout_ms").and_then(|v| parse_millis(&v)) {
            self.request_timeout = ms;
        }
    }
}

fn env_name(key: &str) -> String {
    match key {
        "page_poll_interval_ms" => "PAGE_POLL_MS".to_string(),
        other => other.to_uppercase(),
    }
}

fn parse_millis(value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => {
            log::warn!("Ignoring invalid duration setting: {:?}", value);
            None
        }
        Ok(ms) => Some(Duration::from_millis(ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_backend_contract() {
        let config = AppConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:5000/api");
        assert_eq!(config.page_poll_interval, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.summary_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_stored_settings_override_defaults() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting("api_base_url", "https://lectures.example/api/").unwrap();
        db.set_setting("page_poll_interval_ms", "2500").unwrap();
        db.set_setting("request_timeout_ms", "zero").unwrap();
        db.set_setting("chatbot_webhook_url", "https://hooks.example/chat").unwrap();

        let config = AppConfig::load(&db).unwrap();
        assert_eq!(config.api_base_url, "https://lectures.example/api");
        assert_eq!(config.page_poll_interval, Duration::from_millis(2500));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(
            config.chatbot_webhook_url.as_deref(),
            Some("https://hooks.example/chat")
        );
    }

    #[test]
    fn test_env_names() {
        assert_eq!(env_name("api_base_url"), "API_BASE_URL");
        assert_eq!(env_name("page_poll_interval_ms"), "PAGE_POLL_MS");
        assert_eq!(env_name("request_timeout_ms"), "REQUEST_TIMEOUT_MS");
    }
}
