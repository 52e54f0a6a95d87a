use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_QUESTION_COUNT: usize = 4;

const QUESTION_BANK: &[&str] = &[
    "What is the main topic of this lecture?",
    "Which concept from the lecture would you explain to a classmate first, and how?",
    "Name two key terms introduced in the lecture and define them.",
    "What example did the lecturer use to illustrate the central idea?",
    "How does today's material connect to the previous lecture?",
    "Which part of the slides was the hardest to follow, and why?",
    "What problem does the main technique presented in the lecture solve?",
    "Summarize the lecture in three sentences.",
    "What question would you ask the lecturer about this material?",
    "Which assumption does the central argument of the lecture rely on?",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub text: String,
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub questions: Vec<QuizQuestion>,
    pub total: usize,
}

/// Draw `count` review questions from the built-in bank in random order.
pub fn generate_quiz(lecture_id: &str, count: usize) -> Quiz {
    let mut keyed: Vec<(Uuid, &str)> = QUESTION_BANK.iter().map(|q| (Uuid::new_v4(), *q)).collect();
    keyed.sort_by_key(|(key, _)| *key);

    let questions: Vec<QuizQuestion> = keyed
        .into_iter()
        .take(count)
        .enumerate()
        .map(|(i, (_, text))| QuizQuestion {
            id: format!("q_{}", i + 1),
            text: text.to_string(),
            order: i + 1,
        })
        .collect();

    Quiz {
        id: format!("quiz_{}", lecture_id),
        title: "Lecture review quiz".to_string(),
        total: questions.len(),
        questions,
    }
}
