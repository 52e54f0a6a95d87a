use super::ApiError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for the external chat webhook. It is not part of the lecture
/// backend, so no bearer token is attached.
#[derive(Debug, Clone)]
pub struct ChatbotClient {
    http: Client,
    webhook_url: Option<String>,
}

#[derive(Serialize)]
struct ChatbotRequest<'a> {
    #[serde(rename = "lectureId")]
    lecture_id: &'a str,
    question: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub text: String,
    /// Milliseconds into the lecture audio.
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatAnswer {
    pub answer: String,
    pub references: Vec<Reference>,
}

#[derive(Deserialize)]
struct ChatbotOutput {
    answer: Option<String>,
    #[serde(default)]
    references: Option<Vec<Reference>>,
}

#[derive(Deserialize)]
struct ChatbotEnvelope {
    output: Option<ChatbotOutput>,
}

/// The webhook answers either `{ output }` or `[{ output }]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChatbotResponse {
    Many(Vec<ChatbotEnvelope>),
    One(ChatbotEnvelope),
}

impl ChatbotClient {
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, webhook_url })
    }

    pub async fn ask(&self, lecture_id: &str, question: &str) -> Result<ChatAnswer, ApiError> {
        let url = self
            .webhook_url
            .as_deref()
            .ok_or_else(|| ApiError::Validation("Chat webhook URL not configured".into()))?;

        let resp = self
            .http
            .post(url)
            .json(&ChatbotRequest {
                lecture_id,
                question,
            })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status,
                message: text,
            });
        }

        let data: ChatbotResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        parse_answer(data)
    }
}

fn parse_answer(data: ChatbotResponse) -> Result<ChatAnswer, ApiError> {
    let output = match data {
        ChatbotResponse::Many(items) => items.into_iter().next().and_then(|e| e.output),
        ChatbotResponse::One(envelope) => envelope.output,
    };
    let output = output
        .ok_or_else(|| ApiError::Parse("Invalid response format from server".into()))?;
    let answer = output
        .answer
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::Parse("Invalid response format from server".into()))?;
    Ok(ChatAnswer {
        answer,
        references: output.references.unwrap_or_default(),
    })
}
