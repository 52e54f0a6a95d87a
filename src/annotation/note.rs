use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_TOKEN: AtomicI64 = AtomicI64::new(0);

/// Client-side identity of a note that the backend has not acknowledged yet.
/// Derived from the creation time in milliseconds, bumped to stay unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalToken(pub i64);

impl LocalToken {
    pub fn next(now: DateTime<Utc>) -> Self {
        let millis = now.timestamp_millis();
        let mut prev = LAST_TOKEN.load(Ordering::Relaxed);
        loop {
            let candidate = millis.max(prev + 1);
            match LAST_TOKEN.compare_exchange_weak(prev, candidate, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return LocalToken(candidate),
                Err(actual) => prev = actual,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum NoteId {
    Pending(LocalToken),
    Persisted(String),
}

impl NoteId {
    pub fn server_id(&self) -> Option<&str> {
        match self {
            NoteId::Persisted(id) => Some(id),
            NoteId::Pending(_) => None,
        }
    }

    pub fn local_token(&self) -> Option<LocalToken> {
        match self {
            NoteId::Pending(token) => Some(*token),
            NoteId::Persisted(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, NoteId::Pending(_))
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteId::Pending(token) => write!(f, "local:{}", token.0),
            NoteId::Persisted(id) => f.write_str(id),
        }
    }
}

/// Position on the page as a fraction of the rendered size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub fn clamped(x: f64, y: f64) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }
}

/// NaN lands on 0 so a degenerate surface cannot leak an invalid coordinate.
pub(crate) fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelPosition {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub content: String,
    pub audio_time: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub transcript_id: Option<String>,
}

impl Note {
    pub fn point(&self) -> NormalizedPoint {
        NormalizedPoint {
            x: self.x,
            y: self.y,
        }
    }

    pub(crate) fn move_to(&mut self, point: NormalizedPoint) {
        self.x = point.x;
        self.y = point.y;
    }
}
