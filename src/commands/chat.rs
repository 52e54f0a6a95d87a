use super::{AppState, NO_LECTURE};
use crate::annotation::AudioDeck;
use crate::api::summaries::Summary;
use crate::chat::{ChatMessage, Quiz, Segment};
use serde::Serialize;
use tauri::State;

#[derive(Debug, Serialize)]
pub struct RenderedMessage {
    #[serde(flatten)]
    pub message: ChatMessage,
    pub segments: Vec<Segment>,
}

impl From<&ChatMessage> for RenderedMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            segments: message.segments(),
            message: message.clone(),
        }
    }
}

macro_rules! with_panel {
    ($state:expr, $panel:ident => $body:expr) => {{
        let mut guard = $state.panel.lock().await;
        let $panel = guard.as_mut().ok_or(NO_LECTURE)?;
        $body
    }};
}

#[tauri::command]
pub async fn get_chat_messages(state: State<'_, AppState>) -> Result<Vec<RenderedMessage>, String> {
    with_panel!(state, panel => Ok(panel.messages().iter().map(RenderedMessage::from).collect()))
}

#[tauri::command]
pub async fn set_chat_open(state: State<'_, AppState>, open: bool) -> Result<(), String> {
    with_panel!(state, panel => {
        panel.set_open(open);
        panel.show_chat();
        Ok(())
    })
}

#[tauri::command]
pub async fn send_chat_message(
    state: State<'_, AppState>,
    text: String,
) -> Result<Option<RenderedMessage>, String> {
    with_panel!(state, panel => {
        let reply = panel.send(&text).await;
        Ok(reply.as_ref().map(RenderedMessage::from))
    })
}

#[tauri::command]
pub async fn clear_chat_history(state: State<'_, AppState>) -> Result<(), String> {
    with_panel!(state, panel => {
        panel.clear_history();
        Ok(())
    })
}

#[tauri::command]
pub async fn request_summary(state: State<'_, AppState>) -> Result<Summary, String> {
    with_panel!(state, panel => Ok(panel.request_summary().await.clone()))
}

#[tauri::command]
pub async fn request_quiz(state: State<'_, AppState>) -> Result<Quiz, String> {
    with_panel!(state, panel => Ok(panel.request_quiz().clone()))
}

/// A `[m:ss]` marker in a bot message was clicked.
#[tauri::command]
pub async fn activate_timestamp(
    state: State<'_, AppState>,
    seconds: u32,
) -> Result<AudioDeck, String> {
    let mut ws_guard = state.workspace.lock().await;
    let ws = ws_guard.as_mut().ok_or(NO_LECTURE)?;
    with_panel!(state, panel => {
        panel.activate_timestamp(seconds, ws.deck_mut());
        Ok(ws.deck().clone())
    })
}
