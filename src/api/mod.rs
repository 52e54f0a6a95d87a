pub mod auth;
pub mod catalog;
pub mod chatbot;
pub mod notes;
pub mod summaries;
pub mod transcription;

use crate::config::AppConfig;
use crate::session::SessionContext;
use chrono::{DateTime, Utc};
use reqwest::{multipart, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// REST client for the lecture backend.
///
/// Attaches the session's bearer token to every request and unwraps the
/// `{ "data": ... }` envelope most endpoints answer with.
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<SessionContext>,
}

impl ApiClient {
    pub fn new(config: &AppConfig, session: Arc<SessionContext>) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.session.auth_token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let req = self.http.get(self.url(path));
        self.send(req).await
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.http.post(self.url(path)).json(body);
        self.send(req).await
    }

    pub(crate) async fn post_json_with_timeout<B, T>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.http.post(self.url(path)).json(body).timeout(timeout);
        self.send(req).await
    }

    pub(crate) async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let req = self.http.post(self.url(path));
        self.send(req).await
    }

    pub(crate) async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.http.put(self.url(path)).json(body);
        self.send(req).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let req = self.http.delete(self.url(path));
        let _: Value = self.send(req).await?;
        Ok(())
    }

    pub(crate) async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: multipart::Form,
    ) -> Result<T, ApiError> {
        let req = self.http.post(self.url(path)).multipart(form);
        self.send(req).await
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = self.authorize(req).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let err = error_for_status(status, &text);
            if matches!(err, ApiError::Unauthorized(_)) {
                // No refresh flow exists; the token is kept and the caller decides.
                log::warn!("Backend rejected the session token (401)");
            }
            return Err(err);
        }

        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))?
        };
        serde_json::from_value(unwrap_envelope(value)).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

/// Strip a `{ "data": ... }` wrapper when present.
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) => match map.remove("data") {
            Some(inner) if !inner.is_null() => inner,
            Some(null) => {
                map.insert("data".to_string(), null);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => other,
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

fn error_for_status(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| body.trim().to_string());
    if status == StatusCode::UNAUTHORIZED {
        ApiError::Unauthorized(message)
    } else {
        ApiError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// Accepts `"abc"` as well as `{ "$oid": "abc" }` for Mongo-style ids.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Plain(String),
    Oid {
        #[serde(rename = "$oid")]
        oid: String,
    },
}

impl RawId {
    pub fn into_string(self) -> String {
        match self {
            RawId::Plain(id) => id,
            RawId::Oid { oid } => oid,
        }
    }
}

pub(crate) fn pick_id(primary: Option<RawId>, fallback: Option<RawId>) -> Option<String> {
    primary
        .or(fallback)
        .map(RawId::into_string)
        .filter(|id| !id.is_empty())
}

/// Record timestamps come as RFC 3339 strings or epoch milliseconds depending
/// on the record's age. Anything else reads as unknown instead of failing the
/// whole payload.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let parsed = match Value::deserialize(deserializer)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    };
    Ok(parsed)
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("{0}")]
    Validation(String),
    #[error("Session storage error: {0}")]
    Session(#[from] rusqlite::Error),
}

impl Serialize for ApiError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
