//! The lecture page: slides, note overlay, transcripts and audio deck.
//!
//! Overlay events are persisted through a [`NoteStore`]; every remote failure
//! is logged and turned into a one-shot [`Notice`], never an error return.

use crate::annotation::{
    resolve_note_playback, AnnotationOverlay, AudioDeck, LocalToken, Note, NoteId, OverlayEvent,
    PlaybackTarget, Surface,
};
use crate::api::notes::{CreateNoteRequest, ServerNote};
use crate::api::transcription::{RemotePage, Transcript, TranscriptStatus};
use crate::api::{ApiClient, ApiError};
use crate::notify::{Notice, Notifier};
use crate::pagesync::{PageFollower, PageIndexChannel, PageJump, PagePublisher};
use crate::recording::TranscriptionService;
use crate::session::{SessionContext, UserRole};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn fetch_notes(&self, lecture_id: &str) -> Result<Vec<ServerNote>, ApiError>;
    async fn create(&self, request: &CreateNoteRequest) -> Result<String, ApiError>;
    async fn update_content(&self, note_id: &str, content: &str) -> Result<(), ApiError>;
    async fn remove(&self, note_id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl NoteStore for ApiClient {
    async fn fetch_notes(&self, lecture_id: &str) -> Result<Vec<ServerNote>, ApiError> {
        self.lecture_notes(lecture_id).await
    }

    async fn create(&self, request: &CreateNoteRequest) -> Result<String, ApiError> {
        self.create_note(request).await
    }

    async fn update_content(&self, note_id: &str, content: &str) -> Result<(), ApiError> {
        self.update_note_content(note_id, content).await
    }

    async fn remove(&self, note_id: &str) -> Result<(), ApiError> {
        self.delete_note(note_id).await
    }
}

/// Everything the lecture page talks to.
pub trait LectureBackend: NoteStore + TranscriptionService + PageIndexChannel {}

impl<T: NoteStore + TranscriptionService + PageIndexChannel + ?Sized> LectureBackend for T {}

pub struct LectureWorkspace<B: ?Sized> {
    backend: Arc<B>,
    notifier: Arc<dyn Notifier>,
    session: Arc<SessionContext>,
    lecture_id: String,
    role: Option<UserRole>,
    overlay: AnnotationOverlay,
    initial_notes: Vec<ServerNote>,
    transcripts: Vec<Transcript>,
    deck: AudioDeck,
    page_count: u32,
    assignments: HashMap<LocalToken, String>,
    publisher: PagePublisher<B>,
    follower: PageFollower,
}

impl<B: LectureBackend + ?Sized> LectureWorkspace<B> {
    /// Loads transcripts and stored notes concurrently. Either may fail on
    /// its own; the page still opens.
    pub async fn open(
        backend: Arc<B>,
        notifier: Arc<dyn Notifier>,
        session: Arc<SessionContext>,
        lecture_id: &str,
        role: Option<UserRole>,
        page_count: u32,
    ) -> Self {
        let (transcripts, notes) = futures::join!(
            backend.list_transcripts(lecture_id),
            backend.fetch_notes(lecture_id)
        );

        let transcripts = transcripts.unwrap_or_else(|e| {
            log::error!("Failed to load transcripts for {}: {}", lecture_id, e);
            notifier.notify(Notice::error("Could not load transcripts"));
            Vec::new()
        });
        let initial_notes = notes.unwrap_or_else(|e| {
            log::error!("Failed to load notes for {}: {}", lecture_id, e);
            Vec::new()
        });

        let mut deck = AudioDeck::default();
        if let Some(first) = transcripts.first() {
            deck.select(first);
        }

        Self {
            publisher: PagePublisher::new(backend.clone(), lecture_id),
            backend,
            notifier,
            session,
            lecture_id: lecture_id.to_string(),
            role,
            overlay: AnnotationOverlay::new(1),
            initial_notes,
            transcripts,
            deck,
            page_count,
            assignments: HashMap::new(),
            follower: PageFollower::new(),
        }
    }

    pub fn lecture_id(&self) -> &str {
        &self.lecture_id
    }

    pub fn overlay(&self) -> &AnnotationOverlay {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut AnnotationOverlay {
        &mut self.overlay
    }

    pub fn transcripts(&self) -> &[Transcript] {
        &self.transcripts
    }

    pub fn deck(&self) -> &AudioDeck {
        &self.deck
    }

    pub fn deck_mut(&mut self) -> &mut AudioDeck {
        &mut self.deck
    }

    pub fn page(&self) -> u32 {
        self.overlay.page()
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn set_page_count(&mut self, page_count: u32) {
        self.page_count = page_count;
    }

    /// The rendered page changed size or position. Stored notes are placed
    /// once the first surface is known.
    pub fn set_surface(&mut self, surface: Surface) {
        self.overlay.set_surface(surface);
        if !self.initial_notes.is_empty()
            && self.overlay.load_initial(&self.initial_notes, Utc::now())
        {
            self.initial_notes.clear();
        }
    }

    /// New notes are attributed to the transcript started last, falling back
    /// to one the server still lists as queued.
    fn recording_transcript_id(&self) -> Option<String> {
        self.session.transcript_id().or_else(|| {
            self.transcripts
                .iter()
                .find(|t| t.status == TranscriptStatus::Queued)
                .map(|t| t.id.clone())
        })
    }

    /// Double-click on the slide. Creates the note locally and persists it.
    pub async fn create_note_at(&mut self, client_x: f64, client_y: f64) -> Option<Note> {
        let transcript_id = self.recording_transcript_id();
        let event = self
            .overlay
            .double_click(client_x, client_y, Utc::now(), transcript_id)?;
        let note = match &event {
            OverlayEvent::Created { note, .. } => note.clone(),
            _ => return None,
        };
        self.handle_overlay_event(event).await;
        self.overlay.note(&self.resolve_id(&note.id)).cloned()
    }

    pub async fn edit_note(&mut self, id: &NoteId, content: &str) {
        if let Some(event) = self.overlay.edit_content(id, content) {
            self.handle_overlay_event(event).await;
        }
    }

    pub async fn delete_note(&mut self, id: &NoteId) {
        if let Some(event) = self.overlay.delete(id) {
            self.handle_overlay_event(event).await;
        }
    }

    fn resolve_id(&self, id: &NoteId) -> NoteId {
        match id.local_token().and_then(|t| self.assignments.get(&t)) {
            Some(server_id) => NoteId::Persisted(server_id.clone()),
            None => id.clone(),
        }
    }

    fn server_id_for(&self, id: &NoteId) -> Option<String> {
        match id {
            NoteId::Persisted(server_id) => Some(server_id.clone()),
            NoteId::Pending(token) => self.assignments.get(token).cloned(),
        }
    }

    pub async fn handle_overlay_event(&mut self, event: OverlayEvent) {
        match event {
            OverlayEvent::Created { note, pixel } => {
                let request = CreateNoteRequest {
                    lecture_id: self.lecture_id.clone(),
                    position: pixel,
                    content: note.content.clone(),
                    created_at: note.created_at.unwrap_or_else(Utc::now),
                    transcript_id: note.transcript_id.clone(),
                    page_index: note.page,
                };
                match self.backend.create(&request).await {
                    Ok(server_id) => {
                        if let Some(token) = note.id.local_token() {
                            self.assignments.insert(token, server_id);
                            self.overlay.apply_assignments(&self.assignments);
                        }
                    }
                    Err(e) => {
                        log::error!("Failed to create note {}: {}", note.id, e);
                        self.notifier.notify(Notice::error("Could not create note"));
                    }
                }
            }
            OverlayEvent::Updated(note) => {
                let Some(server_id) = self.server_id_for(&note.id) else {
                    log::warn!("Note {} has no server id yet, update skipped", note.id);
                    return;
                };
                if let Err(e) = self.backend.update_content(&server_id, &note.content).await {
                    log::error!("Failed to update note {}: {}", server_id, e);
                    self.notifier.notify(Notice::error("Could not update note"));
                }
            }
            OverlayEvent::Deleted(id) => {
                let Some(server_id) = self.server_id_for(&id) else {
                    log::warn!("Note {} has no server id yet, delete skipped", id);
                    return;
                };
                if let Err(e) = self.backend.remove(&server_id).await {
                    log::error!("Failed to delete note {}: {}", server_id, e);
                    self.notifier.notify(Notice::error("Could not delete note"));
                }
            }
        }
    }

    /// Play the audio recorded around the time the note was taken.
    pub fn play_note(&mut self, id: &NoteId) -> Option<PlaybackTarget> {
        let note = self.overlay.note(id)?;
        match resolve_note_playback(note, &self.transcripts) {
            Ok(target) => {
                self.deck.play_target(&target);
                Some(target)
            }
            Err(e) => {
                log::warn!("Cannot play note {}: {}", id, e);
                self.notifier.notify(Notice::error("Audio not found for this note"));
                None
            }
        }
    }

    pub fn select_transcript(&mut self, index: usize) -> Option<&Transcript> {
        let transcript = self.transcripts.get(index)?;
        self.deck.select(transcript);
        Some(transcript)
    }

    /// Local navigation. Presenters publish the new page for followers.
    pub async fn go_to_page(&mut self, page: u32) -> u32 {
        let page = page.clamp(1, self.page_count.max(1));
        if page == self.overlay.page() {
            return page;
        }
        self.overlay.set_page(page);
        if self.role == Some(UserRole::Teacher) {
            self.publisher.page_changed(page).await;
        }
        page
    }

    /// One poll of the presenter's page, reconciled against the page shown now.
    pub fn follow_presenter(&mut self, remote: RemotePage) -> Option<PageJump> {
        let jump = self
            .follower
            .reconcile(remote, self.overlay.page(), self.page_count)?;
        self.overlay.set_page(jump.page);
        log::info!("Following presenter to page {}", jump.page);
        self.notifier
            .notify(Notice::info(format!("Teacher moved to page {}", jump.page)));
        Some(jump)
    }

    /// Notes side panel: switch page, open the popup, return the scroll target.
    pub fn jump_to_note(&mut self, id: &NoteId, scroll_height: f64) -> Option<f64> {
        self.overlay.jump_to(id, scroll_height)
    }

    pub async fn refresh_transcripts(&mut self) -> bool {
        match self.backend.list_transcripts(&self.lecture_id).await {
            Ok(transcripts) => {
                self.transcripts = transcripts;
                true
            }
            Err(e) => {
                log::error!("Failed to reload transcripts: {}", e);
                self.notifier.notify(Notice::error("Could not load transcripts"));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transcription::AudioBlob;
    use crate::db::Database;
    use crate::notify::{CollectingNotifier, NoticeLevel};
    use crate::recording::RecordingPipeline;
    use chrono::{DateTime, Duration};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        notes: Vec<ServerNote>,
        transcripts: Mutex<Vec<Transcript>>,
        created: Mutex<Vec<CreateNoteRequest>>,
        updated: Mutex<Vec<(String, String)>>,
        removed: Mutex<Vec<String>>,
        published: Mutex<Vec<i64>>,
        fail_writes: bool,
    }

    fn down() -> ApiError {
        ApiError::Api {
            status: 503,
            message: "unavailable".into(),
        }
    }

    #[async_trait]
    impl NoteStore for FakeBackend {
        async fn fetch_notes(&self, _lecture_id: &str) -> Result<Vec<ServerNote>, ApiError> {
            Ok(self.notes.clone())
        }

        async fn create(&self, request: &CreateNoteRequest) -> Result<String, ApiError> {
            if self.fail_writes {
                return Err(down());
            }
            let mut created = self.created.lock().unwrap();
            created.push(request.clone());
            Ok(format!("srv-{}", created.len()))
        }

        async fn update_content(&self, note_id: &str, content: &str) -> Result<(), ApiError> {
            if self.fail_writes {
                return Err(down());
            }
            self.updated
                .lock()
                .unwrap()
                .push((note_id.to_string(), content.to_string()));
            Ok(())
        }

        async fn remove(&self, note_id: &str) -> Result<(), ApiError> {
            if self.fail_writes {
                return Err(down());
            }
            self.removed.lock().unwrap().push(note_id.to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl TranscriptionService for FakeBackend {
        async fn start(&self, _lecture_id: &str) -> Result<String, ApiError> {
            Ok("t-new".into())
        }

        async fn upload(&self, _transcript_id: &str, _audio: AudioBlob) -> Result<(), ApiError> {
            Ok(())
        }

        async fn list_transcripts(&self, _lecture_id: &str) -> Result<Vec<Transcript>, ApiError> {
            Ok(self.transcripts.lock().unwrap().clone())
        }
    }

    #[async_trait]
    impl PageIndexChannel for FakeBackend {
        async fn publish(&self, _lecture_id: &str, index: i64) -> Result<(), ApiError> {
            self.published.lock().unwrap().push(index);
            Ok(())
        }

        async fn fetch(&self, _lecture_id: &str) -> Result<RemotePage, ApiError> {
            Ok(RemotePage {
                index: -1,
                sequence: None,
            })
        }
    }

    fn t0() -> DateTime<Utc> {
        "2024-05-01T09:00:00Z".parse().unwrap()
    }

    fn transcripts() -> Vec<Transcript> {
        vec![
            Transcript {
                id: "t1".into(),
                full_text: "Raft".into(),
                audio_url: Some("https://cdn.example/t1.webm".into()),
                created_at: Some(t0()),
                status: TranscriptStatus::Completed,
            },
            Transcript {
                id: "t2".into(),
                full_text: String::new(),
                audio_url: None,
                created_at: Some(t0()),
                status: TranscriptStatus::Queued,
            },
        ]
    }

    fn surface() -> Surface {
        Surface {
            left: 0.0,
            top: 0.0,
            width: 800.0,
            height: 600.0,
        }
    }

    async fn open_with_session(
        backend: FakeBackend,
        role: Option<UserRole>,
    ) -> (
        LectureWorkspace<FakeBackend>,
        Arc<FakeBackend>,
        Arc<CollectingNotifier>,
        Arc<SessionContext>,
    ) {
        let backend = Arc::new(backend);
        let notifier = Arc::new(CollectingNotifier::default());
        let db = Arc::new(Database::open_in_memory().unwrap());
        let session = Arc::new(SessionContext::load(db).unwrap());
        let mut ws = LectureWorkspace::open(
            backend.clone(),
            notifier.clone(),
            session.clone(),
            "l1",
            role,
            10,
        )
        .await;
        ws.set_surface(surface());
        (ws, backend, notifier, session)
    }

    async fn open(
        backend: FakeBackend,
        role: Option<UserRole>,
    ) -> (LectureWorkspace<FakeBackend>, Arc<FakeBackend>, Arc<CollectingNotifier>) {
        let (ws, backend, notifier, _) = open_with_session(backend, role).await;
        (ws, backend, notifier)
    }

    fn remote(index: i64) -> RemotePage {
        RemotePage {
            index,
            sequence: None,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_server_id() {
        let (mut ws, backend, _) = open(
            FakeBackend {
                transcripts: Mutex::new(transcripts()),
                ..FakeBackend::default()
            },
            None,
        )
        .await;

        let note = ws.create_note_at(400.0, 150.0).await.unwrap();
        assert_eq!(note.id, NoteId::Persisted("srv-1".into()));
        assert_eq!(note.transcript_id.as_deref(), Some("t2"));

        let created = backend.created.lock().unwrap();
        assert_eq!(created[0].lecture_id, "l1");
        assert_eq!(created[0].page_index, 1);
        assert_eq!(created[0].position.x, 400);
        assert_eq!(created[0].transcript_id.as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn test_note_taken_while_recording_plays_that_recording() {
        let (mut ws, backend, _, session) = open_with_session(FakeBackend::default(), None).await;
        let mut recorder = RecordingPipeline::new(backend.clone(), session);
        assert_eq!(recorder.start("l1").await.unwrap(), "t-new");

        let note = ws.create_note_at(200.0, 200.0).await.unwrap();
        assert_eq!(note.transcript_id.as_deref(), Some("t-new"));
        assert_eq!(
            backend.created.lock().unwrap()[0].transcript_id.as_deref(),
            Some("t-new")
        );

        assert!(recorder.push_chunk(b"abc".to_vec()));
        recorder
            .stop_and_upload(&CollectingNotifier::default())
            .await
            .unwrap();
        let started = note.created_at.unwrap() - Duration::seconds(4);
        backend.transcripts.lock().unwrap().push(Transcript {
            id: "t-new".into(),
            full_text: String::new(),
            audio_url: Some("https://cdn.example/t-new.webm".into()),
            created_at: Some(started),
            status: TranscriptStatus::Completed,
        });
        assert!(ws.refresh_transcripts().await);

        let target = ws.play_note(&note.id).unwrap();
        assert_eq!(target.transcript_id, "t-new");
        assert_eq!(target.offset, 4.0);
        assert_eq!(ws.deck().selected.as_deref(), Some("t-new"));
    }

    #[tokio::test]
    async fn test_edit_and_delete_use_server_id() {
        let (mut ws, backend, _) = open(FakeBackend::default(), None).await;
        let note = ws.create_note_at(100.0, 100.0).await.unwrap();

        ws.edit_note(&note.id, "lemma").await;
        ws.delete_note(&note.id).await;
        assert_eq!(
            *backend.updated.lock().unwrap(),
            vec![("srv-1".to_string(), "lemma".to_string())]
        );
        assert_eq!(*backend.removed.lock().unwrap(), vec!["srv-1".to_string()]);
        assert!(ws.overlay().notes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_create_keeps_note_pending_and_notifies() {
        let (mut ws, backend, notifier) = open(
            FakeBackend {
                fail_writes: true,
                ..FakeBackend::default()
            },
            None,
        )
        .await;
        let note = ws.create_note_at(100.0, 100.0).await.unwrap();
        assert!(note.id.is_pending());
        assert_eq!(notifier.take()[0].level, NoticeLevel::Error);

        ws.edit_note(&note.id, "offline").await;
        assert!(backend.updated.lock().unwrap().is_empty());
        assert!(notifier.take().is_empty());
    }

    #[tokio::test]
    async fn test_stored_notes_load_with_surface() {
        let notes: Vec<ServerNote> = serde_json::from_value(json!([
            { "_id": "n1", "position": { "x": 400, "y": 300 }, "page": 2, "content": "x" }
        ]))
        .unwrap();
        let (ws, _, _) = open(
            FakeBackend {
                notes,
                ..FakeBackend::default()
            },
            None,
        )
        .await;
        let loaded = &ws.overlay().notes()[0];
        assert_eq!((loaded.x, loaded.y), (0.5, 0.5));
        assert_eq!(ws.overlay().visible_pins().count(), 0);
    }

    #[tokio::test]
    async fn test_play_note_seeks_into_transcript_audio() {
        let notes: Vec<ServerNote> = serde_json::from_value(json!([
            { "_id": "n1", "position": { "x": 0.1, "y": 0.1 }, "created_at": "2024-05-01T09:00:05Z", "transcript_id": "t1" },
            { "_id": "n2", "position": { "x": 0.1, "y": 0.1 }, "transcript_id": "t2" }
        ]))
        .unwrap();
        let (mut ws, _, notifier) = open(
            FakeBackend {
                notes,
                transcripts: Mutex::new(transcripts()),
                ..FakeBackend::default()
            },
            None,
        )
        .await;
        assert_eq!(ws.deck().selected.as_deref(), Some("t1"));

        let target = ws.play_note(&NoteId::Persisted("n1".into())).unwrap();
        assert_eq!(target.offset, 5.0);
        ws.deck_mut().on_metadata(3.0);
        assert_eq!(ws.deck().position, 3.0);
        assert!(ws.deck().playing);

        let before = ws.deck().clone();
        assert_eq!(ws.play_note(&NoteId::Persisted("n2".into())), None);
        assert_eq!(ws.deck(), &before);
        assert_eq!(notifier.take().len(), 1);
    }

    #[tokio::test]
    async fn test_teacher_publishes_page_changes() {
        let (mut ws, backend, _) = open(FakeBackend::default(), Some(UserRole::Teacher)).await;
        assert_eq!(ws.go_to_page(1).await, 1);
        assert_eq!(ws.go_to_page(4).await, 4);
        assert_eq!(ws.go_to_page(4).await, 4);
        assert_eq!(ws.go_to_page(99).await, 10);
        assert_eq!(ws.go_to_page(12).await, 10);
        assert_eq!(*backend.published.lock().unwrap(), vec![3, 9]);

        let (mut student, backend, _) = open(FakeBackend::default(), Some(UserRole::Student)).await;
        student.go_to_page(2).await;
        assert!(backend.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_follower_pulls_student_back_after_local_navigation() {
        let (mut ws, _, notifier) = open(FakeBackend::default(), Some(UserRole::Student)).await;
        assert_eq!(ws.follow_presenter(remote(2)), Some(PageJump { page: 3 }));
        assert_eq!(ws.page(), 3);
        assert_eq!(notifier.take()[0].level, NoticeLevel::Info);

        ws.go_to_page(5).await;
        assert_eq!(ws.follow_presenter(remote(2)), Some(PageJump { page: 3 }));
        assert_eq!(ws.page(), 3);

        assert_eq!(ws.follow_presenter(remote(2)), None);
        assert_eq!(ws.follow_presenter(remote(-1)), None);
        assert_eq!(ws.page(), 3);
        assert_eq!(notifier.take().len(), 1);
    }

    #[tokio::test]
    async fn test_follower_uses_current_page_count() {
        let (mut ws, _, _) = open(FakeBackend::default(), Some(UserRole::Student)).await;
        ws.set_page_count(0);
        assert_eq!(ws.follow_presenter(remote(11)), None);
        assert_eq!(ws.page(), 1);

        ws.set_page_count(20);
        assert_eq!(ws.follow_presenter(remote(11)), Some(PageJump { page: 12 }));
        assert_eq!(ws.page(), 12);
    }
}
