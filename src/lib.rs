pub mod annotation;
pub mod api;
pub mod chat;
pub mod config;
pub mod db;
pub mod notify;
pub mod pagesync;
pub mod recording;
pub mod session;
pub mod slides;
pub mod workspace;

#[cfg(feature = "desktop")]
mod commands;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use commands::{AppState, TauriNotifier};
    use config::AppConfig;
    use db::Database;
    use std::sync::Arc;
    use tauri::Manager;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let app_dir = app.path().app_data_dir()?;
            let database = Arc::new(Database::new(&app_dir)?);
            let config = AppConfig::load(&database)?;
            log::info!("Using backend {}", config.api_base_url);
            let notifier = Arc::new(TauriNotifier::new(app.handle().clone()));
            let state = AppState::new(database, config, notifier)?;
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::auth::login,
            commands::auth::get_session,
            commands::catalog::list_classes,
            commands::catalog::refresh_classes,
            commands::catalog::list_lectures,
            commands::catalog::create_lecture,
            commands::catalog::select_lecture_for_viewing,
            commands::catalog::lecture_pdf_url,
            commands::catalog::import_slides,
            commands::catalog::slide_text,
            commands::lecture::open_lecture,
            commands::lecture::lecture_state,
            commands::lecture::set_page_surface,
            commands::lecture::note_double_click,
            commands::lecture::note_pointer_down,
            commands::lecture::note_pointer_move,
            commands::lecture::note_pointer_up,
            commands::lecture::close_note_popup,
            commands::lecture::edit_note,
            commands::lecture::delete_note,
            commands::lecture::jump_to_note,
            commands::lecture::play_note,
            commands::lecture::select_transcript,
            commands::lecture::refresh_transcripts,
            commands::lecture::audio_metadata,
            commands::lecture::audio_time_update,
            commands::lecture::audio_pause,
            commands::lecture::go_to_page,
            commands::sync::start_page_follow,
            commands::sync::stop_page_follow,
            commands::chat::get_chat_messages,
            commands::chat::set_chat_open,
            commands::chat::send_chat_message,
            commands::chat::clear_chat_history,
            commands::chat::request_summary,
            commands::chat::request_quiz,
            commands::chat::activate_timestamp,
            commands::recording::start_recording,
            commands::recording::push_audio_chunk,
            commands::recording::stop_recording,
            commands::recording::recording_status,
            commands::settings::get_settings,
            commands::settings::set_setting,
            commands::settings::delete_setting,
            commands::settings::get_effective_config,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
