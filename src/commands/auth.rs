use super::AppState;
use crate::api::auth::LoginResponse;
use crate::session::SessionState;
use tauri::State;

#[tauri::command]
pub async fn login(
    state: State<'_, AppState>,
    email: String,
    password: String,
) -> Result<LoginResponse, String> {
    state
        .api
        .login(&email, &password)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_session(state: State<'_, AppState>) -> Result<SessionState, String> {
    Ok(state.session.snapshot())
}
