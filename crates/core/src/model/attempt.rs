use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AttemptId, OptionId, QuestionId, SessionId};

/// One answer as submitted by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    pub selected_option_id: OptionId,
    pub time_spent_secs: u32,
}

/// Record of a single answered question within a session.
///
/// Correctness is captured when the row is written; later edits to the
/// question's correct option do not rescore history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: AttemptId,
    pub session_id: SessionId,
    pub question_id: QuestionId,
    pub selected_option_id: OptionId,
    pub is_correct: bool,
    pub time_spent_secs: u32,
    pub attempted_at: DateTime<Utc>,
}

impl QuizAttempt {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        answer: AnswerSubmission,
        is_correct: bool,
        attempted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AttemptId::random(),
            session_id,
            question_id: answer.question_id,
            selected_option_id: answer.selected_option_id,
            is_correct,
            time_spent_secs: answer.time_spent_secs,
            attempted_at,
        }
    }
}
