use super::{lenient_timestamp, pick_id, ApiClient, ApiError, RawId};
use crate::annotation::PixelPosition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StoredPosition {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// A note as the backend returns it. Field names vary between endpoints and
/// older records, so everything is optional and reconciled in the overlay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerNote {
    #[serde(rename = "_id")]
    mongo_id: Option<RawId>,
    id: Option<RawId>,
    position: Option<StoredPosition>,
    coords: Option<StoredPosition>,
    page: Option<u32>,
    lecture_page: Option<u32>,
    page_index: Option<u32>,
    content: Option<String>,
    text: Option<String>,
    #[serde(rename = "audioTime")]
    audio_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt", default, deserialize_with = "lenient_timestamp")]
    created_at_camel: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created: Option<DateTime<Utc>>,
    transcript_id: Option<String>,
    #[serde(rename = "transcriptId")]
    transcript_id_camel: Option<String>,
}

impl ServerNote {
    pub fn id(&self) -> Option<String> {
        pick_id(self.mongo_id.clone(), self.id.clone())
    }

    pub fn position(&self) -> StoredPosition {
        self.position
            .or(self.coords)
            .unwrap_or(StoredPosition { x: 0.0, y: 0.0 })
    }

    pub fn page(&self) -> u32 {
        self.page
            .or(self.lecture_page)
            .or(self.page_index)
            .filter(|p| *p > 0)
            .unwrap_or(1)
    }

    pub fn content(&self) -> String {
        self.content
            .clone()
            .or_else(|| self.text.clone())
            .unwrap_or_default()
    }

    pub fn audio_time(&self) -> Option<f64> {
        self.audio_time
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.or(self.created_at_camel).or(self.created)
    }

    pub fn transcript_id(&self) -> Option<String> {
        self.transcript_id
            .clone()
            .or_else(|| self.transcript_id_camel.clone())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateNoteRequest {
    pub lecture_id: String,
    /// Pixel offset inside the rendered page.
    pub position: PixelPosition,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub transcript_id: Option<String>,
    pub page_index: u32,
}

#[derive(Serialize)]
struct UpdateNoteBody<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct CreatedNote {
    #[serde(rename = "_id")]
    mongo_id: Option<RawId>,
    id: Option<RawId>,
}

impl ApiClient {
    pub async fn lecture_notes(&self, lecture_id: &str) -> Result<Vec<ServerNote>, ApiError> {
        self.get(&format!("/notes/lecture/{}", lecture_id)).await
    }

    /// Returns the server-assigned note id.
    pub async fn create_note(&self, request: &CreateNoteRequest) -> Result<String, ApiError> {
        let created: CreatedNote = self.post_json("/notes", request).await?;
        pick_id(created.mongo_id, created.id)
            .ok_or_else(|| ApiError::Parse("created note has no id".into()))
    }

    pub async fn update_note_content(&self, note_id: &str, content: &str) -> Result<(), ApiError> {
        let _: Value = self
            .put_json(&format!("/notes/{}", note_id), &UpdateNoteBody { content })
            .await?;
        Ok(())
    }

    pub async fn delete_note(&self, note_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/notes/{}", note_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_note_field_variants() {
        let note: ServerNote = serde_json::from_value(json!({
            "_id": { "$oid": "n1" },
            "coords": { "x": 450, "y": 0.25 },
            "lecture_page": 3,
            "text": "check eq. 4",
            "createdAt": "2024-05-01T09:00:05Z",
            "transcriptId": "t1"
        }))
        .unwrap();
        assert_eq!(note.id().as_deref(), Some("n1"));
        assert_eq!(note.position(), StoredPosition { x: 450.0, y: 0.25 });
        assert_eq!(note.page(), 3);
        assert_eq!(note.content(), "check eq. 4");
        assert!(note.created_at().is_some());
        assert_eq!(note.transcript_id().as_deref(), Some("t1"));
    }

    #[test]
    fn test_server_note_defaults() {
        let note: ServerNote = serde_json::from_value(json!({ "page": 0 })).unwrap();
        assert_eq!(note.id(), None);
        assert_eq!(note.page(), 1);
        assert_eq!(note.position(), StoredPosition { x: 0.0, y: 0.0 });
        assert_eq!(note.content(), "");
        assert_eq!(note.created_at(), None);
    }

    #[test]
    fn test_mixed_timestamp_shapes_keep_the_list() {
        let notes: Vec<ServerNote> = serde_json::from_value(json!([
            { "_id": "n1", "created_at": "2024-05-01T09:00:05Z" },
            { "_id": "n2", "created_at": 1714550400000i64 },
            { "_id": "n3", "created": "2024-05-01T09:30:00Z" },
            { "_id": "n4", "createdAt": "last tuesday" }
        ]))
        .unwrap();
        assert_eq!(notes.len(), 4);
        assert_eq!(
            notes[1].created_at(),
            Some("2024-05-01T08:00:00Z".parse().unwrap())
        );
        assert!(notes[2].created_at().is_some());
        assert_eq!(notes[3].created_at(), None);
    }

    #[test]
    fn test_create_request_body() {
        let body = serde_json::to_value(CreateNoteRequest {
            lecture_id: "l1".into(),
            position: PixelPosition { x: 120, y: 48 },
            content: String::new(),
            created_at: "2024-05-01T09:00:05Z".parse().unwrap(),
            transcript_id: Some("t1".into()),
            page_index: 2,
        })
        .unwrap();
        assert_eq!(body["position"], json!({ "x": 120, "y": 48 }));
        assert_eq!(body["page_index"], json!(2));
        assert_eq!(body["transcript_id"], json!("t1"));
    }
}
