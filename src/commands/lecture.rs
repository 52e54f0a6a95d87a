use super::{AppState, NO_LECTURE};
use crate::annotation::{AudioDeck, Note, NoteId, PlaybackTarget, Surface};
use crate::api::transcription::Transcript;
use crate::api::ApiClient;
use crate::chat::ChatPanel;
use crate::workspace::LectureWorkspace;
use serde::Serialize;
use tauri::State;

/// What the lecture page renders.
#[derive(Debug, Serialize)]
pub struct LectureView {
    pub lecture_id: String,
    pub page: u32,
    pub page_count: u32,
    pub pins: Vec<Note>,
    pub notes: Vec<Note>,
    pub active_note: Option<NoteId>,
    pub transcripts: Vec<Transcript>,
    pub deck: AudioDeck,
}

impl LectureView {
    fn of(ws: &LectureWorkspace<ApiClient>) -> Self {
        Self {
            lecture_id: ws.lecture_id().to_string(),
            page: ws.page(),
            page_count: ws.page_count(),
            pins: ws.overlay().visible_pins().cloned().collect(),
            notes: ws.overlay().notes().to_vec(),
            active_note: ws.overlay().active_note().map(|n| n.id.clone()),
            transcripts: ws.transcripts().to_vec(),
            deck: ws.deck().clone(),
        }
    }
}

macro_rules! with_workspace {
    ($state:expr, $ws:ident => $body:expr) => {{
        let mut guard = $state.workspace.lock().await;
        let $ws = guard.as_mut().ok_or(NO_LECTURE)?;
        $body
    }};
}

#[tauri::command]
pub async fn open_lecture(
    state: State<'_, AppState>,
    lecture_id: Option<String>,
    page_count: u32,
) -> Result<LectureView, String> {
    let lecture_id = lecture_id
        .or_else(|| state.session.lecture_id())
        .ok_or(NO_LECTURE)?;

    // A previous lecture's follower must not move the new page.
    if let Some(mut follower) = state.follower.lock().await.take() {
        follower.stop();
    }

    let ws = LectureWorkspace::open(
        state.api.clone(),
        state.notifier.clone(),
        state.session.clone(),
        &lecture_id,
        state.session.user_role(),
        page_count,
    )
    .await;

    let mut panel = ChatPanel::new(state.assistant.clone(), &lecture_id, Some(state.db.clone()));
    panel.set_transcript(ws.deck().selected.clone());
    *state.panel.lock().await = Some(panel);

    state
        .session
        .update(|s| s.lecture_id = Some(lecture_id.clone()))
        .map_err(|e| e.to_string())?;

    let view = LectureView::of(&ws);
    *state.workspace.lock().await = Some(ws);
    log::info!("Opened lecture {}", lecture_id);
    Ok(view)
}

#[tauri::command]
pub async fn lecture_state(state: State<'_, AppState>) -> Result<LectureView, String> {
    with_workspace!(state, ws => Ok(LectureView::of(ws)))
}

/// The PDF page was (re)rendered at this client rectangle.
#[tauri::command]
pub async fn set_page_surface(
    state: State<'_, AppState>,
    page_width: f64,
    page_height: f64,
    left: f64,
    top: f64,
    page_count: Option<u32>,
) -> Result<LectureView, String> {
    let max_width = state.config.max_render_width;
    with_workspace!(state, ws => {
        if let Some(count) = page_count {
            ws.set_page_count(count);
        }
        ws.set_surface(Surface::fit_page(page_width, page_height, max_width).at(left, top));
        Ok(LectureView::of(ws))
    })
}

#[tauri::command]
pub async fn note_double_click(
    state: State<'_, AppState>,
    client_x: f64,
    client_y: f64,
) -> Result<Option<Note>, String> {
    with_workspace!(state, ws => Ok(ws.create_note_at(client_x, client_y).await))
}

#[tauri::command]
pub async fn note_pointer_down(state: State<'_, AppState>, id: NoteId) -> Result<bool, String> {
    with_workspace!(state, ws => Ok(ws.overlay_mut().pointer_down_on_pin(&id)))
}

#[tauri::command]
pub async fn note_pointer_move(
    state: State<'_, AppState>,
    client_x: f64,
    client_y: f64,
) -> Result<bool, String> {
    with_workspace!(state, ws => Ok(ws.overlay_mut().pointer_move(client_x, client_y)))
}

#[tauri::command]
pub async fn note_pointer_up(state: State<'_, AppState>) -> Result<Option<NoteId>, String> {
    with_workspace!(state, ws => Ok(ws.overlay_mut().pointer_up()))
}

#[tauri::command]
pub async fn close_note_popup(state: State<'_, AppState>) -> Result<(), String> {
    with_workspace!(state, ws => {
        ws.overlay_mut().close_popup();
        Ok(())
    })
}

#[tauri::command]
pub async fn edit_note(
    state: State<'_, AppState>,
    id: NoteId,
    content: String,
) -> Result<(), String> {
    with_workspace!(state, ws => {
        ws.edit_note(&id, &content).await;
        Ok(())
    })
}

#[tauri::command]
pub async fn delete_note(state: State<'_, AppState>, id: NoteId) -> Result<(), String> {
    with_workspace!(state, ws => {
        ws.delete_note(&id).await;
        Ok(())
    })
}

#[tauri::command]
pub async fn jump_to_note(
    state: State<'_, AppState>,
    id: NoteId,
    scroll_height: f64,
) -> Result<Option<f64>, String> {
    with_workspace!(state, ws => Ok(ws.jump_to_note(&id, scroll_height)))
}

#[tauri::command]
pub async fn play_note(
    state: State<'_, AppState>,
    id: NoteId,
) -> Result<Option<PlaybackTarget>, String> {
    with_workspace!(state, ws => Ok(ws.play_note(&id)))
}

#[tauri::command]
pub async fn select_transcript(
    state: State<'_, AppState>,
    index: usize,
) -> Result<AudioDeck, String> {
    let selected = with_workspace!(state, ws => {
        let id = ws
            .select_transcript(index)
            .map(|t| t.id.clone())
            .ok_or("Transcript not found")?;
        (id, ws.deck().clone())
    });
    if let Some(panel) = state.panel.lock().await.as_mut() {
        panel.set_transcript(Some(selected.0));
    }
    Ok(selected.1)
}

#[tauri::command]
pub async fn refresh_transcripts(state: State<'_, AppState>) -> Result<Vec<Transcript>, String> {
    with_workspace!(state, ws => {
        ws.refresh_transcripts().await;
        Ok(ws.transcripts().to_vec())
    })
}

#[tauri::command]
pub async fn audio_metadata(state: State<'_, AppState>, duration: f64) -> Result<AudioDeck, String> {
    with_workspace!(state, ws => {
        ws.deck_mut().on_metadata(duration);
        Ok(ws.deck().clone())
    })
}

#[tauri::command]
pub async fn audio_time_update(
    state: State<'_, AppState>,
    position: f64,
) -> Result<AudioDeck, String> {
    with_workspace!(state, ws => {
        ws.deck_mut().on_time_update(position);
        Ok(ws.deck().clone())
    })
}

#[tauri::command]
pub async fn audio_pause(state: State<'_, AppState>) -> Result<AudioDeck, String> {
    with_workspace!(state, ws => {
        ws.deck_mut().pause();
        Ok(ws.deck().clone())
    })
}

#[tauri::command]
pub async fn go_to_page(state: State<'_, AppState>, page: u32) -> Result<u32, String> {
    with_workspace!(state, ws => Ok(ws.go_to_page(page).await))
}
