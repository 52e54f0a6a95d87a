use super::{lenient_timestamp, pick_id, ApiClient, ApiError, RawId};
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub id: String,
    pub full_text: String,
    pub audio_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub status: TranscriptStatus,
}

#[derive(Deserialize)]
struct RawTranscript {
    #[serde(rename = "_id")]
    mongo_id: Option<RawId>,
    id: Option<RawId>,
    #[serde(default)]
    full_text: Option<String>,
    #[serde(default)]
    audio_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    status: TranscriptStatus,
}

impl From<RawTranscript> for Transcript {
    fn from(raw: RawTranscript) -> Self {
        Self {
            id: pick_id(raw.mongo_id, raw.id).unwrap_or_default(),
            full_text: raw.full_text.unwrap_or_default(),
            audio_url: raw.audio_url.filter(|u| !u.is_empty()),
            created_at: raw.created_at,
            status: raw.status,
        }
    }
}

/// Server-side "current slide" of a lecture. `-1` means no session is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePage {
    #[serde(rename = "currentPageIndex")]
    pub index: i64,
    /// Monotonic counter, when the backend provides one.
    #[serde(default)]
    pub sequence: Option<u64>,
}

#[derive(Serialize)]
struct PageIndexBody {
    #[serde(rename = "currentPageIndex")]
    current_page_index: i64,
}

#[derive(Deserialize)]
struct StartResponse {
    transcript_id: Option<String>,
}

/// An assembled recording ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlob {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub file_name: String,
}

impl ApiClient {
    pub async fn start_transcription(&self, lecture_id: &str) -> Result<String, ApiError> {
        let resp: StartResponse = self
            .post_empty(&format!("/transcription/start/{}", lecture_id))
            .await?;
        resp.transcript_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::Parse("No transcript_id from server".into()))
    }

    pub async fn upload_recording(
        &self,
        transcript_id: &str,
        audio: AudioBlob,
    ) -> Result<(), ApiError> {
        let size = audio.bytes.len();
        let part = Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.mime)?;
        let form = Form::new().part("audio", part);
        let _: Value = self
            .post_multipart(&format!("/transcription/upload/{}", transcript_id), form)
            .await?;
        log::info!("Uploaded {} bytes of audio for transcript {}", size, transcript_id);
        Ok(())
    }

    pub async fn lecture_transcripts(&self, lecture_id: &str) -> Result<Vec<Transcript>, ApiError> {
        let raw: Vec<RawTranscript> = self
            .get(&format!("/transcription/lecture/{}", lecture_id))
            .await?;
        Ok(raw.into_iter().map(Transcript::from).collect())
    }

    pub async fn current_page_index(&self, lecture_id: &str) -> Result<RemotePage, ApiError> {
        self.get(&format!("/transcription/{}/currentPageIndex", lecture_id))
            .await
    }

    pub async fn set_current_page_index(&self, lecture_id: &str, index: i64) -> Result<(), ApiError> {
        let _: Value = self
            .put_json(
                &format!("/transcription/{}/currentPageIndex", lecture_id),
                &PageIndexBody {
                    current_page_index: index,
                },
            )
            .await?;
        Ok(())
    }
}
