pub mod models;

use models::StoredChatMessage;
use rusqlite::{params, Connection, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(app_dir: &std::path::Path) -> Result<Self> {
        std::fs::create_dir_all(app_dir).ok();
        let db_path = app_dir.join("notesync.db");
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS session (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                lecture_id TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('bot', 'user', 'error')),
                text TEXT NOT NULL,
                refs TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                seq INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chat_messages_lecture
                ON chat_messages (lecture_id, seq);
            ",
        )?;
        Ok(())
    }

    // ── Session ──

    pub fn load_session(&self) -> Result<HashMap<String, String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key, value FROM session")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }

    pub fn set_session_value(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO session (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove_session_value(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM session WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── Chat history ──

    pub fn add_chat_message(&self, message: &StoredChatMessage) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO chat_messages (id, lecture_id, kind, text, refs, created_at, seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                     (SELECT COALESCE(MAX(seq), 0) + 1 FROM chat_messages WHERE lecture_id = ?2))",
            params![
                message.id,
                message.lecture_id,
                message.kind,
                message.text,
                message.references,
                message.created_at
            ],
        )?;
        Ok(())
    }

    pub fn get_chat_messages(&self, lecture_id: &str) -> Result<Vec<StoredChatMessage>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, lecture_id, kind, text, refs, created_at FROM chat_messages
             WHERE lecture_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![lecture_id], |row| {
            Ok(StoredChatMessage {
                id: row.get(0)?,
                lecture_id: row.get(1)?,
                kind: row.get(2)?,
                text: row.get(3)?,
                references: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        rows.collect()
    }

    pub fn clear_chat_messages(&self, lecture_id: &str) -> Result<usize> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM chat_messages WHERE lecture_id = ?1",
            params![lecture_id],
        )
    }

    // ── Settings ──

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let result = conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );
        match result {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn message(id: &str, lecture_id: &str, text: &str) -> StoredChatMessage {
        StoredChatMessage {
            id: id.into(),
            lecture_id: lecture_id.into(),
            kind: "user".into(),
            text: text.into(),
            references: "[]".into(),
            created_at: "2024-05-01T10:00:00Z".into(),
        }
    }

    #[test]
    fn test_session_values_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let db = Database::new(dir.path()).unwrap();
            db.set_session_value("lectureId", "lec-1").unwrap();
            db.set_session_value("userRole", "student").unwrap();
            db.remove_session_value("userRole").unwrap();
        }
        let db = Database::new(dir.path()).unwrap();
        let session = db.load_session().unwrap();
        assert_eq!(session.get("lectureId").map(String::as_str), Some("lec-1"));
        assert!(!session.contains_key("userRole"));
    }

    #[test]
    fn test_chat_history_is_ordered_and_scoped() {
        let db = Database::open_in_memory().unwrap();
        db.add_chat_message(&message("b", "lec-1", "second id, first in")).unwrap();
        db.add_chat_message(&message("a", "lec-1", "first id, second in")).unwrap();
        db.add_chat_message(&message("c", "lec-2", "other lecture")).unwrap();

        let history = db.get_chat_messages("lec-1").unwrap();
        let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["second id, first in", "first id, second in"]);

        assert_eq!(db.clear_chat_messages("lec-1").unwrap(), 2);
        assert!(db.get_chat_messages("lec-1").unwrap().is_empty());
        assert_eq!(db.get_chat_messages("lec-2").unwrap().len(), 1);
    }

    #[test]
    fn test_settings_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_setting("api_base_url").unwrap(), None);
        db.set_setting("api_base_url", "http://example.test/api").unwrap();
        assert_eq!(
            db.get_setting("api_base_url").unwrap().as_deref(),
            Some("http://example.test/api")
        );
        db.delete_setting("api_base_url").unwrap();
        assert_eq!(db.get_setting("api_base_url").unwrap(), None);
    }
}
