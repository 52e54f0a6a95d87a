use super::{AppState, NO_LECTURE};
use crate::api::transcription::RemotePage;
use crate::pagesync::spawn_follower;
use tauri::{AppHandle, Emitter, Manager, State};
use tokio::sync::mpsc;

/// Student view: follow the presenter's slide until stopped or the lecture closes.
#[tauri::command]
pub async fn start_page_follow(app: AppHandle, state: State<'_, AppState>) -> Result<(), String> {
    let lecture_id = {
        let guard = state.workspace.lock().await;
        guard.as_ref().ok_or(NO_LECTURE)?.lecture_id().to_string()
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<RemotePage>();
    let handle = spawn_follower(
        state.api.clone(),
        lecture_id.clone(),
        state.config.page_poll_interval,
        tx,
    );
    if let Some(mut previous) = state.follower.lock().await.replace(handle) {
        previous.stop();
    }

    tauri::async_runtime::spawn(async move {
        while let Some(remote) = rx.recv().await {
            let state = app.state::<AppState>();
            let mut guard = state.workspace.lock().await;
            let jump = match guard.as_mut() {
                Some(ws) if ws.lecture_id() == lecture_id => ws.follow_presenter(remote),
                _ => break,
            };
            drop(guard);
            let Some(jump) = jump else { continue };
            if let Err(e) = app.emit("page-jump", jump) {
                log::warn!("Failed to emit page jump: {}", e);
            }
        }
    });
    log::info!("Following presenter pages");
    Ok(())
}

#[tauri::command]
pub async fn stop_page_follow(state: State<'_, AppState>) -> Result<bool, String> {
    match state.follower.lock().await.take() {
        Some(mut handle) => {
            handle.stop();
            Ok(true)
        }
        None => Ok(false),
    }
}
