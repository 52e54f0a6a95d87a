use super::{pick_id, ApiClient, ApiError, RawId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub title: String,
    pub summary_text: String,
    pub key_points: Vec<String>,
    pub model_used: Option<String>,
    pub status: String,
    pub generated_at: DateTime<Utc>,
}

impl Summary {
    /// Placeholder shown in the summary view when generation failed.
    pub fn failed(lecture_id: &str, reason: &str) -> Self {
        Self {
            id: format!("summary_{}", lecture_id),
            title: "Could not load summary".to_string(),
            summary_text: format!("An error occurred: {}", reason),
            key_points: Vec::new(),
            model_used: None,
            status: "error".to_string(),
            generated_at: Utc::now(),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    lecture_id: &'a str,
    transcript_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct RawSummary {
    #[serde(rename = "_id")]
    mongo_id: Option<RawId>,
    id: Option<RawId>,
    #[serde(default)]
    summary_text: Option<String>,
    #[serde(default)]
    key_points: Option<Vec<String>>,
    model_used: Option<String>,
    status: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl RawSummary {
    fn into_summary(self, lecture_id: &str) -> Summary {
        Summary {
            id: pick_id(self.mongo_id, self.id)
                .unwrap_or_else(|| format!("summary_{}", lecture_id)),
            title: "Lecture summary".to_string(),
            summary_text: self.summary_text.unwrap_or_default(),
            key_points: self.key_points.unwrap_or_default(),
            model_used: self.model_used,
            status: self.status.unwrap_or_else(|| "completed".to_string()),
            generated_at: self.updated_at.unwrap_or_else(Utc::now),
        }
    }
}

impl ApiClient {
    pub async fn generate_summary(
        &self,
        lecture_id: &str,
        transcript_id: Option<&str>,
        timeout: Duration,
    ) -> Result<Summary, ApiError> {
        let raw: RawSummary = self
            .post_json_with_timeout(
                "/summaries/generate",
                &GenerateRequest {
                    lecture_id,
                    transcript_id,
                },
                timeout,
            )
            .await?;
        Ok(raw.into_summary(lecture_id))
    }
}
