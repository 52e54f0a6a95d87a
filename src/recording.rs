use crate::api::transcription::{AudioBlob, Transcript};
use crate::api::{ApiClient, ApiError};
use crate::notify::{Notice, Notifier};
use crate::session::SessionContext;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

pub const RECORDING_MIME: &str = "audio/webm";
pub const RECORDING_FILE_NAME: &str = "recording.webm";

#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Returns the transcript id the recording will be uploaded against.
    async fn start(&self, lecture_id: &str) -> Result<String, ApiError>;
    async fn upload(&self, transcript_id: &str, audio: AudioBlob) -> Result<(), ApiError>;
    async fn list_transcripts(&self, lecture_id: &str) -> Result<Vec<Transcript>, ApiError>;
}

#[async_trait]
impl TranscriptionService for ApiClient {
    async fn start(&self, lecture_id: &str) -> Result<String, ApiError> {
        self.start_transcription(lecture_id).await
    }

    async fn upload(&self, transcript_id: &str, audio: AudioBlob) -> Result<(), ApiError> {
        self.upload_recording(transcript_id, audio).await
    }

    async fn list_transcripts(&self, lecture_id: &str) -> Result<Vec<Transcript>, ApiError> {
        self.lecture_transcripts(lecture_id).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("Recording already in progress")]
    AlreadyRecording,
    #[error("No recording in progress")]
    NotRecording,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Session storage error: {0}")]
    Session(#[from] rusqlite::Error),
}

impl Serialize for RecordingError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Debug, Default)]
enum RecorderState {
    #[default]
    Idle,
    Recording {
        transcript_id: String,
        chunks: Vec<Vec<u8>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingStatus {
    pub recording: bool,
    pub transcript_id: Option<String>,
    pub buffered_bytes: usize,
}

/// Captured audio chunks are buffered here between `start` and `stop`,
/// then uploaded as one blob against the transcript the server issued.
pub struct RecordingPipeline<T: ?Sized> {
    service: Arc<T>,
    session: Arc<SessionContext>,
    state: RecorderState,
}

impl<T: TranscriptionService + ?Sized> RecordingPipeline<T> {
    pub fn new(service: Arc<T>, session: Arc<SessionContext>) -> Self {
        Self {
            service,
            session,
            state: RecorderState::Idle,
        }
    }

    pub fn status(&self) -> RecordingStatus {
        match &self.state {
            RecorderState::Idle => RecordingStatus {
                recording: false,
                transcript_id: None,
                buffered_bytes: 0,
            },
            RecorderState::Recording {
                transcript_id,
                chunks,
            } => RecordingStatus {
                recording: true,
                transcript_id: Some(transcript_id.clone()),
                buffered_bytes: chunks.iter().map(Vec::len).sum(),
            },
        }
    }

    pub async fn start(&mut self, lecture_id: &str) -> Result<String, RecordingError> {
        if matches!(self.state, RecorderState::Recording { .. }) {
            return Err(RecordingError::AlreadyRecording);
        }
        let transcript_id = self.service.start(lecture_id).await?;
        self.session.update(|s| s.transcript_id = Some(transcript_id.clone()))?;
        log::info!("Recording started for lecture {} (transcript {})", lecture_id, transcript_id);
        self.state = RecorderState::Recording {
            transcript_id: transcript_id.clone(),
            chunks: Vec::new(),
        };
        Ok(transcript_id)
    }

    /// Returns false when the chunk was dropped.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) -> bool {
        match &mut self.state {
            RecorderState::Recording { chunks, .. } if !chunk.is_empty() => {
                chunks.push(chunk);
                true
            }
            _ => false,
        }
    }

    /// End capture and assemble the blob. Nothing is uploaded.
    pub fn stop(&mut self) -> Result<(String, AudioBlob), RecordingError> {
        match std::mem::take(&mut self.state) {
            RecorderState::Idle => Err(RecordingError::NotRecording),
            RecorderState::Recording {
                transcript_id,
                chunks,
            } => {
                let blob = AudioBlob {
                    bytes: chunks.concat(),
                    mime: RECORDING_MIME.to_string(),
                    file_name: RECORDING_FILE_NAME.to_string(),
                };
                log::info!(
                    "Recording stopped: {} chunks, {} bytes",
                    chunks.len(),
                    blob.bytes.len()
                );
                Ok((transcript_id, blob))
            }
        }
    }

    pub async fn stop_and_upload(&mut self, notifier: &dyn Notifier) -> Result<String, RecordingError> {
        let (transcript_id, blob) = self.stop()?;
        match self.service.upload(&transcript_id, blob).await {
            Ok(()) => {
                notifier.notify(Notice::success("Recording uploaded"));
                Ok(transcript_id)
            }
            Err(e) => {
                log::error!("Audio upload failed for {}: {}", transcript_id, e);
                notifier.notify(Notice::error(format!("Audio upload failed: {}", e)));
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::notify::{CollectingNotifier, NoticeLevel};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTranscription {
        issue_id: Option<String>,
        uploads: Mutex<Vec<(String, AudioBlob)>>,
        fail_upload: bool,
    }

    #[async_trait]
    impl TranscriptionService for FakeTranscription {
        async fn start(&self, _lecture_id: &str) -> Result<String, ApiError> {
            self.issue_id
                .clone()
                .ok_or_else(|| ApiError::Parse("No transcript_id from server".into()))
        }

        async fn upload(&self, transcript_id: &str, audio: AudioBlob) -> Result<(), ApiError> {
            if self.fail_upload {
                return Err(ApiError::Api {
                    status: 413,
                    message: "too large".into(),
                });
            }
            self.uploads
                .lock()
                .unwrap()
                .push((transcript_id.to_string(), audio));
            Ok(())
        }

        async fn list_transcripts(&self, _lecture_id: &str) -> Result<Vec<Transcript>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn pipeline(service: FakeTranscription) -> (RecordingPipeline<FakeTranscription>, Arc<SessionContext>, Arc<FakeTranscription>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let session = Arc::new(SessionContext::load(db).unwrap());
        let service = Arc::new(service);
        (
            RecordingPipeline::new(service.clone(), session.clone()),
            session,
            service,
        )
    }

    #[tokio::test]
    async fn test_chunks_are_assembled_and_uploaded() {
        let (mut rec, session, service) = pipeline(FakeTranscription {
            issue_id: Some("t1".into()),
            ..FakeTranscription::default()
        });
        assert_eq!(rec.start("l1").await.unwrap(), "t1");
        assert_eq!(session.transcript_id().as_deref(), Some("t1"));

        assert!(rec.push_chunk(b"abc".to_vec()));
        assert!(!rec.push_chunk(Vec::new()));
        assert!(rec.push_chunk(b"de".to_vec()));
        assert_eq!(rec.status().buffered_bytes, 5);

        let notifier = CollectingNotifier::default();
        assert_eq!(rec.stop_and_upload(&notifier).await.unwrap(), "t1");

        let uploads = service.uploads.lock().unwrap();
        let (id, blob) = &uploads[0];
        assert_eq!(id, "t1");
        assert_eq!(blob.bytes, b"abcde");
        assert_eq!(blob.mime, "audio/webm");
        assert_eq!(blob.file_name, "recording.webm");
        assert_eq!(notifier.take()[0].level, NoticeLevel::Success);
        assert!(!rec.status().recording);
    }

    #[tokio::test]
    async fn test_missing_transcript_id_does_not_start() {
        let (mut rec, session, _) = pipeline(FakeTranscription::default());
        assert!(matches!(rec.start("l1").await, Err(RecordingError::Api(ApiError::Parse(_)))));
        assert!(!rec.status().recording);
        assert_eq!(session.transcript_id(), None);
        assert!(!rec.push_chunk(b"x".to_vec()));
    }

    #[tokio::test]
    async fn test_double_start_and_idle_stop_are_rejected() {
        let (mut rec, _, _) = pipeline(FakeTranscription {
            issue_id: Some("t1".into()),
            ..FakeTranscription::default()
        });
        assert!(matches!(rec.stop(), Err(RecordingError::NotRecording)));
        rec.start("l1").await.unwrap();
        assert!(matches!(rec.start("l1").await, Err(RecordingError::AlreadyRecording)));
    }

    #[tokio::test]
    async fn test_upload_failure_is_notified() {
        let (mut rec, _, _) = pipeline(FakeTranscription {
            issue_id: Some("t1".into()),
            fail_upload: true,
            ..FakeTranscription::default()
        });
        rec.start("l1").await.unwrap();
        rec.push_chunk(b"abc".to_vec());
        let notifier = CollectingNotifier::default();
        assert!(rec.stop_and_upload(&notifier).await.is_err());
        let notices = notifier.take();
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.contains("too large"));
    }
}
