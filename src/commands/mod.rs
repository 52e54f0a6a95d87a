pub mod auth;
pub mod catalog;
pub mod chat;
pub mod lecture;
pub mod recording;
pub mod settings;
pub mod sync;

use crate::api::catalog::Catalog;
use crate::api::chatbot::ChatbotClient;
use crate::api::ApiClient;
use crate::chat::{AssistantBackend, ChatPanel};
use crate::config::AppConfig;
use crate::db::Database;
use crate::notify::{Notice, Notifier};
use crate::pagesync::FollowerHandle;
use crate::recording::RecordingPipeline;
use crate::session::SessionContext;
use crate::slides::SlideDeck;
use crate::workspace::LectureWorkspace;
use std::sync::Arc;
use tauri::{AppHandle, Emitter};
use tokio::sync::Mutex;

/// Forwards notices to the webview as `notice` events.
pub struct TauriNotifier {
    app: AppHandle,
}

impl TauriNotifier {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl Notifier for TauriNotifier {
    fn notify(&self, notice: Notice) {
        if let Err(e) = self.app.emit("notice", &notice) {
            log::warn!("Failed to emit notice: {}", e);
        }
    }
}

pub struct AppState {
    pub db: Arc<Database>,
    pub session: Arc<SessionContext>,
    pub config: AppConfig,
    pub api: Arc<ApiClient>,
    pub assistant: Arc<AssistantBackend>,
    pub notifier: Arc<dyn Notifier>,
    pub catalog: Mutex<Catalog>,
    pub workspace: Mutex<Option<LectureWorkspace<ApiClient>>>,
    pub panel: Mutex<Option<ChatPanel<AssistantBackend>>>,
    pub recorder: Mutex<RecordingPipeline<ApiClient>>,
    pub follower: Mutex<Option<FollowerHandle>>,
    pub slides: Mutex<Option<SlideDeck>>,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        config: AppConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, String> {
        let session = Arc::new(SessionContext::load(db.clone()).map_err(|e| e.to_string())?);
        let api = Arc::new(ApiClient::new(&config, session.clone()).map_err(|e| e.to_string())?);
        let chatbot = ChatbotClient::new(config.chatbot_webhook_url.clone(), config.request_timeout)
            .map_err(|e| e.to_string())?;
        let assistant = Arc::new(AssistantBackend::new(
            api.clone(),
            chatbot,
            config.summary_timeout,
        ));
        Ok(Self {
            recorder: Mutex::new(RecordingPipeline::new(api.clone(), session.clone())),
            db,
            session,
            config,
            api,
            assistant,
            notifier,
            catalog: Mutex::new(Catalog::default()),
            workspace: Mutex::new(None),
            panel: Mutex::new(None),
            follower: Mutex::new(None),
            slides: Mutex::new(None),
        })
    }
}

pub(crate) const NO_LECTURE: &str = "No lecture is open";
