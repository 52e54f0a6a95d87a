use super::{AppState, NO_LECTURE};
use crate::recording::RecordingStatus;
use crate::notify::Notice;
use tauri::State;

#[tauri::command]
pub async fn start_recording(state: State<'_, AppState>) -> Result<RecordingStatus, String> {
    let lecture_id = state.session.lecture_id().ok_or(NO_LECTURE)?;
    let mut recorder = state.recorder.lock().await;
    match recorder.start(&lecture_id).await {
        Ok(_) => {
            state.notifier.notify(Notice::success("Recording started"));
            if let Some(ws) = state.workspace.lock().await.as_mut() {
                ws.refresh_transcripts().await;
            }
            Ok(recorder.status())
        }
        Err(e) => {
            log::error!("Could not start recording: {}", e);
            state
                .notifier
                .notify(Notice::error(format!("Could not start transcription: {}", e)));
            Err(e.to_string())
        }
    }
}

/// One encoded chunk from the webview's media recorder.
#[tauri::command]
pub async fn push_audio_chunk(state: State<'_, AppState>, chunk: Vec<u8>) -> Result<bool, String> {
    Ok(state.recorder.lock().await.push_chunk(chunk))
}

#[tauri::command]
pub async fn stop_recording(state: State<'_, AppState>) -> Result<String, String> {
    let transcript_id = {
        let mut recorder = state.recorder.lock().await;
        recorder
            .stop_and_upload(state.notifier.as_ref())
            .await
            .map_err(|e| e.to_string())?
    };
    if let Some(ws) = state.workspace.lock().await.as_mut() {
        ws.refresh_transcripts().await;
    }
    Ok(transcript_id)
}

#[tauri::command]
pub async fn recording_status(state: State<'_, AppState>) -> Result<RecordingStatus, String> {
    Ok(state.recorder.lock().await.status())
}
