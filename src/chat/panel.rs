use super::quiz::{generate_quiz, Quiz, DEFAULT_QUESTION_COUNT};
use super::timestamps::{format_timestamp, parse_segments, Segment};
use crate::annotation::AudioDeck;
use crate::api::chatbot::{ChatAnswer, ChatbotClient, Reference};
use crate::api::summaries::Summary;
use crate::api::{ApiClient, ApiError};
use crate::db::models::StoredChatMessage;
use crate::db::Database;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const GREETING: &str = "Hi! Ask me anything about this lecture. I can also summarize it or quiz you.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Bot,
    User,
    Error,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Bot => "bot",
            MessageKind::User => "user",
            MessageKind::Error => "error",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "user" => MessageKind::User,
            "error" => MessageKind::Error,
            _ => MessageKind::Bot,
        }
    }
}

/// A transcript passage the answer was grounded on, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedReference {
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub label: String,
}

impl From<&Reference> for TimedReference {
    fn from(r: &Reference) -> Self {
        let start_seconds = (r.start / 1000.0).max(0.0);
        Self {
            text: r.text.clone(),
            start_seconds,
            end_seconds: (r.end / 1000.0).max(start_seconds),
            label: format_timestamp(start_seconds),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    pub references: Vec<TimedReference>,
}

impl ChatMessage {
    fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            timestamp: Utc::now(),
            kind,
            references: Vec::new(),
        }
    }

    /// User text is shown verbatim; bot and error text get clickable timestamps.
    pub fn segments(&self) -> Vec<Segment> {
        match self.kind {
            MessageKind::User => vec![Segment::Text {
                text: self.text.clone(),
            }],
            MessageKind::Bot | MessageKind::Error => parse_segments(&self.text),
        }
    }

    fn to_stored(&self, lecture_id: &str) -> StoredChatMessage {
        StoredChatMessage {
            id: self.id.clone(),
            lecture_id: lecture_id.to_string(),
            kind: self.kind.as_str().to_string(),
            text: self.text.clone(),
            references: serde_json::to_string(&self.references).unwrap_or_else(|_| "[]".into()),
            created_at: self.timestamp.to_rfc3339(),
        }
    }

    fn from_stored(stored: StoredChatMessage) -> Self {
        Self {
            timestamp: DateTime::parse_from_rfc3339(&stored.created_at)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            references: serde_json::from_str(&stored.references).unwrap_or_default(),
            kind: MessageKind::parse(&stored.kind),
            id: stored.id,
            text: stored.text,
        }
    }
}

/// Answer text with one reference block per cited passage.
pub fn render_answer(answer: &ChatAnswer) -> (String, Vec<TimedReference>) {
    let references: Vec<TimedReference> = answer.references.iter().map(TimedReference::from).collect();
    let mut text = answer.answer.clone();
    for r in &references {
        text.push_str(&format!("\n\n📍 Reference: \"{}\"\n🎙️ [{}]", r.text, r.label));
    }
    (text, references)
}

/// The remote side of the assistant panel.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn ask(&self, lecture_id: &str, question: &str) -> Result<ChatAnswer, ApiError>;
    async fn summarize(
        &self,
        lecture_id: &str,
        transcript_id: Option<&str>,
    ) -> Result<Summary, ApiError>;
}

/// Chat webhook plus the backend's summary endpoint.
pub struct AssistantBackend {
    api: Arc<ApiClient>,
    chatbot: ChatbotClient,
    summary_timeout: Duration,
}

impl AssistantBackend {
    pub fn new(api: Arc<ApiClient>, chatbot: ChatbotClient, summary_timeout: Duration) -> Self {
        Self {
            api,
            chatbot,
            summary_timeout,
        }
    }
}

#[async_trait]
impl ChatService for AssistantBackend {
    async fn ask(&self, lecture_id: &str, question: &str) -> Result<ChatAnswer, ApiError> {
        self.chatbot.ask(lecture_id, question).await
    }

    async fn summarize(
        &self,
        lecture_id: &str,
        transcript_id: Option<&str>,
    ) -> Result<Summary, ApiError> {
        self.api
            .generate_summary(lecture_id, transcript_id, self.summary_timeout)
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelView {
    Chat,
    Summary,
    Quiz,
}

/// Assistant side panel of a lecture: chat, summary and quiz views.
pub struct ChatPanel<S: ?Sized> {
    service: Arc<S>,
    lecture_id: String,
    transcript_id: Option<String>,
    messages: Vec<ChatMessage>,
    open: bool,
    view: PanelView,
    summary: Option<Summary>,
    quiz: Option<Quiz>,
    history: Option<Arc<Database>>,
}

impl<S: ChatService + ?Sized> ChatPanel<S> {
    pub fn new(service: Arc<S>, lecture_id: impl Into<String>, history: Option<Arc<Database>>) -> Self {
        let lecture_id = lecture_id.into();
        let stored = match &history {
            Some(db) => db.get_chat_messages(&lecture_id).unwrap_or_else(|e| {
                log::warn!("Failed to load chat history for {}: {}", lecture_id, e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        let mut messages: Vec<ChatMessage> = stored.into_iter().map(ChatMessage::from_stored).collect();
        if messages.is_empty() {
            messages.push(ChatMessage::new(MessageKind::Bot, GREETING));
        }
        Self {
            service,
            lecture_id,
            transcript_id: None,
            messages,
            open: false,
            view: PanelView::Chat,
            summary: None,
            quiz: None,
            history,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn view(&self) -> PanelView {
        self.view
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref()
    }

    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    pub fn show_chat(&mut self) {
        self.view = PanelView::Chat;
    }

    /// Transcript the summary is generated from.
    pub fn set_transcript(&mut self, transcript_id: Option<String>) {
        self.transcript_id = transcript_id;
    }

    fn push(&mut self, message: ChatMessage) -> &ChatMessage {
        if let Some(db) = &self.history {
            if let Err(e) = db.add_chat_message(&message.to_stored(&self.lecture_id)) {
                log::warn!("Failed to store chat message: {}", e);
            }
        }
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    /// Ask the assistant. Failures become an error message in the thread.
    pub async fn send(&mut self, text: &str) -> Option<ChatMessage> {
        let question = text.trim();
        if question.is_empty() {
            return None;
        }
        self.push(ChatMessage::new(MessageKind::User, question));

        let reply = match self.service.ask(&self.lecture_id, question).await {
            Ok(answer) => {
                let (text, references) = render_answer(&answer);
                let mut message = ChatMessage::new(MessageKind::Bot, text);
                message.references = references;
                message
            }
            Err(e) => {
                log::error!("Chat request failed: {}", e);
                ChatMessage::new(
                    MessageKind::Error,
                    format!("Sorry, I couldn't get an answer: {}", e),
                )
            }
        };
        Some(self.push(reply).clone())
    }

    /// Local only: the backend keeps no chat history to clear.
    pub fn clear_history(&mut self) {
        self.messages.clear();
        if let Some(db) = &self.history {
            match db.clear_chat_messages(&self.lecture_id) {
                Ok(n) => log::info!("Cleared {} stored chat messages", n),
                Err(e) => log::warn!("Failed to clear stored chat history: {}", e),
            }
        }
    }

    pub async fn request_summary(&mut self) -> &Summary {
        let summary = match self
            .service
            .summarize(&self.lecture_id, self.transcript_id.as_deref())
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                log::error!("Summary generation failed: {}", e);
                Summary::failed(&self.lecture_id, &e.to_string())
            }
        };
        self.view = PanelView::Summary;
        self.summary.insert(summary)
    }

    pub fn request_quiz(&mut self) -> &Quiz {
        self.view = PanelView::Quiz;
        self.quiz
            .insert(generate_quiz(&self.lecture_id, DEFAULT_QUESTION_COUNT))
    }

    /// A timestamp in a bot message was clicked.
    pub fn activate_timestamp(&mut self, seconds: u32, deck: &mut AudioDeck) {
        deck.seek_and_play(f64::from(seconds));
        self.open = false;
    }
}
