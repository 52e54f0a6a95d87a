use super::AppState;
use crate::api::catalog::{select_lecture, ClassInfo, Lecture, LectureUpload};
use crate::slides::{self, SlideDeck};
use serde::Serialize;
use std::path::Path;
use tauri::State;

#[tauri::command]
pub async fn list_classes(
    state: State<'_, AppState>,
    query: Option<String>,
) -> Result<Vec<ClassInfo>, String> {
    let mut catalog = state.catalog.lock().await;
    if catalog.classes().is_empty() {
        catalog.refresh(&state.api).await.map_err(|e| e.to_string())?;
    }
    Ok(catalog
        .search(query.as_deref().unwrap_or(""))
        .into_iter()
        .cloned()
        .collect())
}

#[tauri::command]
pub async fn refresh_classes(state: State<'_, AppState>) -> Result<Vec<ClassInfo>, String> {
    let mut catalog = state.catalog.lock().await;
    let classes = catalog.refresh(&state.api).await.map_err(|e| e.to_string())?;
    Ok(classes.to_vec())
}

#[tauri::command]
pub async fn list_lectures(
    state: State<'_, AppState>,
    class_id: String,
) -> Result<Vec<Lecture>, String> {
    let mut catalog = state.catalog.lock().await;
    let lectures = catalog
        .lectures(&state.api, &class_id)
        .await
        .map_err(|e| e.to_string())?;
    Ok(lectures.to_vec())
}

#[tauri::command]
pub async fn create_lecture(
    state: State<'_, AppState>,
    class_id: String,
    title: String,
    file_path: String,
) -> Result<Lecture, String> {
    let path = Path::new(&file_path);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let upload = LectureUpload::new(&title, &file_name, bytes).map_err(|e| e.to_string())?;

    let mut catalog = state.catalog.lock().await;
    catalog
        .create_lecture(&state.api, &class_id, upload)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn select_lecture_for_viewing(
    state: State<'_, AppState>,
    class_id: String,
    lecture: Lecture,
) -> Result<(), String> {
    select_lecture(&state.session, &class_id, &lecture).map_err(|e| e.to_string())
}

/// Direct URL of the open lecture's slide deck.
#[tauri::command]
pub async fn lecture_pdf_url(state: State<'_, AppState>) -> Result<String, String> {
    let key = state
        .session
        .snapshot()
        .lecture_pdf_url
        .ok_or("PDF URL not found")?;
    state
        .api
        .presigned_url(&key)
        .await
        .map_err(|e| e.to_string())
}

#[derive(Debug, Serialize)]
pub struct ImportedSlides {
    pub file_name: String,
    pub page_count: u32,
}

/// Open a local PDF without uploading it.
#[tauri::command]
pub async fn import_slides(
    state: State<'_, AppState>,
    file_path: String,
) -> Result<ImportedSlides, String> {
    let path = Path::new(&file_path);
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("slides.pdf")
        .to_string();
    let deck = SlideDeck::from_bytes(&file_name, &bytes).map_err(|e| e.to_string())?;

    let data_url = slides::to_data_url(&bytes);
    state
        .session
        .update(|s| s.uploaded_slide = Some(data_url))
        .map_err(|e| e.to_string())?;

    let imported = ImportedSlides {
        file_name,
        page_count: deck.page_count(),
    };
    *state.slides.lock().await = Some(deck);
    Ok(imported)
}

#[tauri::command]
pub async fn slide_text(state: State<'_, AppState>, page: u32) -> Result<Option<String>, String> {
    let slides = state.slides.lock().await;
    Ok(slides
        .as_ref()
        .and_then(|d| d.page_text(page))
        .map(str::to_string))
}
