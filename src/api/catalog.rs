use super::{pick_id, ApiClient, ApiError, RawId};
use crate::session::SessionContext;
use crate::slides;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub id: String,
    pub name: String,
    pub teacher_name: String,
    pub student_count: usize,
    pub description: String,
    pub updated_at: Option<String>,
}

#[derive(Deserialize)]
struct RawClass {
    #[serde(rename = "_id")]
    mongo_id: Option<RawId>,
    id: Option<RawId>,
    name: Option<String>,
    title: Option<String>,
    /// Either a populated `{ full_name }` object or a bare id.
    teacher_id: Option<Value>,
    teacher: Option<String>,
    student_ids: Option<Vec<Value>>,
    students: Option<usize>,
    description: Option<String>,
    updated_at: Option<String>,
    #[serde(rename = "updatedAt")]
    updated_at_camel: Option<String>,
    created_at: Option<String>,
}

impl From<RawClass> for ClassInfo {
    fn from(raw: RawClass) -> Self {
        let teacher_name = raw
            .teacher_id
            .as_ref()
            .and_then(|t| t.get("full_name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(raw.teacher)
            .unwrap_or_default();
        Self {
            id: pick_id(raw.mongo_id, raw.id).unwrap_or_default(),
            name: raw
                .name
                .or(raw.title)
                .unwrap_or_else(|| "Untitled class".to_string()),
            teacher_name,
            student_count: raw
                .student_ids
                .map(|ids| ids.len())
                .or(raw.students)
                .unwrap_or(0),
            description: raw.description.unwrap_or_default(),
            updated_at: raw
                .updated_at
                .or(raw.updated_at_camel)
                .or(raw.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecture {
    pub id: String,
    pub title: String,
    /// Storage key of the slide deck, resolved through a presigned URL.
    pub pdf_url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Deserialize)]
struct RawLecture {
    #[serde(rename = "_id")]
    mongo_id: Option<RawId>,
    id: Option<RawId>,
    title: Option<String>,
    name: Option<String>,
    pdf_url: Option<String>,
    #[serde(rename = "pdfUrl")]
    pdf_url_camel: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl From<RawLecture> for Lecture {
    fn from(raw: RawLecture) -> Self {
        Self {
            id: pick_id(raw.mongo_id, raw.id).unwrap_or_default(),
            title: raw
                .title
                .or(raw.name)
                .unwrap_or_else(|| "Lecture".to_string()),
            pdf_url: raw.pdf_url.or(raw.pdf_url_camel).filter(|u| !u.is_empty()),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct PresignedResponse {
    url: Option<String>,
}

/// A validated lecture upload. Construction fails on a blank title or a non-PDF file,
/// so nothing invalid ever reaches the network.
#[derive(Debug, Clone)]
pub struct LectureUpload {
    title: String,
    file_name: String,
    bytes: Vec<u8>,
}

impl LectureUpload {
    pub fn new(title: &str, file_name: &str, bytes: Vec<u8>) -> Result<Self, ApiError> {
        if bytes.is_empty() {
            return Err(ApiError::Validation("Please choose a file".into()));
        }
        if title.trim().is_empty() {
            return Err(ApiError::Validation("Please enter a title".into()));
        }
        slides::ensure_pdf(file_name, &bytes)
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        Ok(Self {
            title: title.trim().to_string(),
            file_name: file_name.to_string(),
            bytes,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Case-insensitive match on name, description and teacher name.
pub fn filter_classes<'a>(classes: &'a [ClassInfo], query: &str) -> Vec<&'a ClassInfo> {
    let q = query.trim().to_lowercase();
    classes
        .iter()
        .filter(|c| {
            q.is_empty()
                || c.name.to_lowercase().contains(&q)
                || c.description.to_lowercase().contains(&q)
                || c.teacher_name.to_lowercase().contains(&q)
        })
        .collect()
}

impl ApiClient {
    pub async fn list_classes(&self) -> Result<Vec<ClassInfo>, ApiError> {
        let raw: Vec<RawClass> = self.get("/classes").await?;
        Ok(raw.into_iter().map(ClassInfo::from).collect())
    }

    pub async fn list_lectures(&self, class_id: &str) -> Result<Vec<Lecture>, ApiError> {
        let raw: Vec<RawLecture> = self.get(&format!("/lectures/class/{}", class_id)).await?;
        Ok(raw.into_iter().map(Lecture::from).collect())
    }

    pub async fn create_lecture(
        &self,
        class_id: &str,
        upload: LectureUpload,
    ) -> Result<Lecture, ApiError> {
        let file = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", file).text("title", upload.title);
        let raw: RawLecture = self
            .post_multipart(&format!("/lectures/create/{}", class_id), form)
            .await?;
        let lecture = Lecture::from(raw);
        log::info!("Created lecture {} in class {}", lecture.id, class_id);
        Ok(lecture)
    }

    pub async fn presigned_url(&self, key: &str) -> Result<String, ApiError> {
        let resp: PresignedResponse = self.get(&format!("/files/presigned/{}", key)).await?;
        resp.url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ApiError::Parse("Missing presigned URL".into()))
    }
}

/// Classes and their lectures as last fetched. Lectures are loaded per class
/// on first access and kept until the catalog is refreshed.
#[derive(Debug, Default)]
pub struct Catalog {
    classes: Vec<ClassInfo>,
    lectures: HashMap<String, Vec<Lecture>>,
}

impl Catalog {
    pub fn classes(&self) -> &[ClassInfo] {
        &self.classes
    }

    pub fn search(&self, query: &str) -> Vec<&ClassInfo> {
        filter_classes(&self.classes, query)
    }

    pub async fn refresh(&mut self, api: &ApiClient) -> Result<&[ClassInfo], ApiError> {
        self.classes = api.list_classes().await?;
        self.lectures.clear();
        Ok(&self.classes)
    }

    pub fn cached_lectures(&self, class_id: &str) -> Option<&[Lecture]> {
        self.lectures.get(class_id).map(Vec::as_slice)
    }

    pub async fn lectures(&mut self, api: &ApiClient, class_id: &str) -> Result<&[Lecture], ApiError> {
        if !self.lectures.contains_key(class_id) {
            let fetched = api.list_lectures(class_id).await?;
            self.lectures.insert(class_id.to_string(), fetched);
        }
        Ok(self.cached_lectures(class_id).unwrap_or_default())
    }

    pub async fn create_lecture(
        &mut self,
        api: &ApiClient,
        class_id: &str,
        upload: LectureUpload,
    ) -> Result<Lecture, ApiError> {
        let lecture = api.create_lecture(class_id, upload).await?;
        select_lecture(api.session(), class_id, &lecture)?;
        self.insert_lecture(class_id, lecture.clone());
        Ok(lecture)
    }

    fn insert_lecture(&mut self, class_id: &str, lecture: Lecture) {
        if let Some(list) = self.lectures.get_mut(class_id) {
            list.push(lecture);
        }
    }
}

/// Remember which lecture is open for the lecture page and later launches.
pub fn select_lecture(
    session: &SessionContext,
    class_id: &str,
    lecture: &Lecture,
) -> Result<(), ApiError> {
    session.update(|s| {
        s.class_id = Some(class_id.to_string());
        s.lecture_id = Some(lecture.id.clone());
        s.lecture_pdf_url = lecture.pdf_url.clone();
    })?;
    Ok(())
}
