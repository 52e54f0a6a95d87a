//! Process-wide lecture session state.
//!
//! Components receive an `Arc<SessionContext>` at construction instead of
//! reading ambient storage. All writes go through [`SessionContext::update`],
//! which persists the changed keys to the `session` table.

use crate::db::Database;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard};

const KEY_AUTH_TOKEN: &str = "authToken";
const KEY_USER_ROLE: &str = "userRole";
const KEY_LECTURE_ID: &str = "lectureId";
const KEY_LECTURE_PDF_URL: &str = "lecturePdfUrl";
const KEY_TRANSCRIPT_ID: &str = "transcriptId";
const KEY_TRANSCRIPT_ID_LEGACY: &str = "transcript_id";
const KEY_CLASS_ID: &str = "classId";
const KEY_UPLOADED_SLIDE: &str = "uploadedSlide";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Teacher,
    Student,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Teacher => "teacher",
            UserRole::Student => "student",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "teacher" => Some(UserRole::Teacher),
            "student" => Some(UserRole::Student),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub auth_token: Option<String>,
    pub user_role: Option<UserRole>,
    pub lecture_id: Option<String>,
    pub lecture_pdf_url: Option<String>,
    pub transcript_id: Option<String>,
    pub class_id: Option<String>,
    /// Locally imported slide deck as a base64 data URL.
    pub uploaded_slide: Option<String>,
}

impl SessionState {
    fn from_stored(mut stored: HashMap<String, String>) -> Self {
        let mut take = |key: &str| {
            stored
                .remove(key)
                .filter(|v| !v.is_empty() && v != "undefined" && v != "null")
        };
        let transcript_id = take(KEY_TRANSCRIPT_ID);
        let legacy_transcript_id = take(KEY_TRANSCRIPT_ID_LEGACY);
        Self {
            auth_token: take(KEY_AUTH_TOKEN),
            user_role: take(KEY_USER_ROLE).and_then(|r| UserRole::parse(&r)),
            lecture_id: take(KEY_LECTURE_ID),
            lecture_pdf_url: take(KEY_LECTURE_PDF_URL),
            transcript_id: transcript_id.or(legacy_transcript_id),
            class_id: take(KEY_CLASS_ID),
            uploaded_slide: take(KEY_UPLOADED_SLIDE),
        }
    }

    fn entries(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            (KEY_AUTH_TOKEN, self.auth_token.clone()),
            (KEY_USER_ROLE, self.user_role.map(|r| r.as_str().to_string())),
            (KEY_LECTURE_ID, self.lecture_id.clone()),
            (KEY_LECTURE_PDF_URL, self.lecture_pdf_url.clone()),
            (KEY_TRANSCRIPT_ID, self.transcript_id.clone()),
            (KEY_TRANSCRIPT_ID_LEGACY, self.transcript_id.clone()),
            (KEY_CLASS_ID, self.class_id.clone()),
            (KEY_UPLOADED_SLIDE, self.uploaded_slide.clone()),
        ]
    }
}

pub struct SessionContext {
    db: Arc<Database>,
    state: RwLock<SessionState>,
}

impl SessionContext {
    pub fn load(db: Arc<Database>) -> rusqlite::Result<Self> {
        let state = SessionState::from_stored(db.load_session()?);
        Ok(Self {
            db,
            state: RwLock::new(state),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> SessionState {
        self.read().clone()
    }

    /// The single write path. Only keys whose value changed hit the database.
    pub fn update<F>(&self, mutate: F) -> rusqlite::Result<SessionState>
    where
        F: FnOnce(&mut SessionState),
    {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = state.clone();
        mutate(&mut next);

        let before = state.entries();
        for ((key, old), (_, new)) in before.iter().zip(next.entries()) {
            if *old == new {
                continue;
            }
            match new {
                Some(value) => self.db.set_session_value(key, &value)?,
                None => self.db.remove_session_value(key)?,
            }
        }
        *state = next.clone();
        Ok(next)
    }

    pub fn auth_token(&self) -> Option<String> {
        self.read().auth_token.clone()
    }

    pub fn user_role(&self) -> Option<UserRole> {
        self.read().user_role
    }

    pub fn lecture_id(&self) -> Option<String> {
        self.read().lecture_id.clone()
    }

    pub fn transcript_id(&self) -> Option<String> {
        self.read().transcript_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> (Arc<Database>, SessionContext) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let session = SessionContext::load(db.clone()).unwrap();
        (db, session)
    }

    #[test]
    fn test_update_persists_changed_keys() {
        let (db, session) = context();
        session
            .update(|s| {
                s.auth_token = Some("tok".into());
                s.user_role = Some(UserRole::Teacher);
                s.transcript_id = Some("tr-9".into());
            })
            .unwrap();

        let stored = db.load_session().unwrap();
        assert_eq!(stored.get("authToken").map(String::as_str), Some("tok"));
        assert_eq!(stored.get("userRole").map(String::as_str), Some("teacher"));
        assert_eq!(stored.get("transcriptId").map(String::as_str), Some("tr-9"));
        assert_eq!(stored.get("transcript_id").map(String::as_str), Some("tr-9"));

        session.update(|s| s.auth_token = None).unwrap();
        assert!(!db.load_session().unwrap().contains_key("authToken"));
        assert_eq!(session.user_role(), Some(UserRole::Teacher));
    }

    #[test]
    fn test_load_ignores_placeholder_values_and_reads_legacy_key() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.set_session_value("lectureId", "undefined").unwrap();
        db.set_session_value("transcript_id", "legacy-tr").unwrap();
        db.set_session_value("userRole", "Student").unwrap();

        let session = SessionContext::load(db).unwrap();
        assert_eq!(session.lecture_id(), None);
        assert_eq!(session.transcript_id().as_deref(), Some("legacy-tr"));
        assert_eq!(session.user_role(), Some(UserRole::Student));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(UserRole::parse(" TEACHER "), Some(UserRole::Teacher));
        assert_eq!(UserRole::parse("admin"), None);
    }
}
