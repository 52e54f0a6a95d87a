pub mod panel;
pub mod quiz;
pub mod timestamps;

pub use panel::{AssistantBackend, ChatMessage, ChatPanel, ChatService, MessageKind, PanelView, TimedReference};
pub use quiz::{generate_quiz, Quiz, QuizQuestion};
pub use timestamps::{format_timestamp, parse_segments, Segment};
