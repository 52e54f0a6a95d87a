use super::AppState;
use crate::config::{AppConfig, SETTING_KEYS};
use std::collections::HashMap;
use tauri::State;

#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> Result<HashMap<String, String>, String> {
    let mut map = HashMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = state.db.get_setting(key).map_err(|e| e.to_string())? {
            map.insert(key.to_string(), value);
        }
    }
    Ok(map)
}

/// Settings take effect on the next launch.
#[tauri::command]
pub fn set_setting(state: State<'_, AppState>, key: String, value: String) -> Result<(), String> {
    if !SETTING_KEYS.contains(&key.as_str()) {
        return Err(format!("Unknown setting key: {}", key));
    }
    state.db.set_setting(&key, &value).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn delete_setting(state: State<'_, AppState>, key: String) -> Result<(), String> {
    state.db.delete_setting(&key).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_effective_config(state: State<'_, AppState>) -> Result<AppConfig, String> {
    Ok(state.config.clone())
}
