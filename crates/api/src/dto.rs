//! Wire shapes for request bodies and response payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quiz_core::model::{
    AnswerSubmission, CategoryId, Difficulty, OptionId, Question, QuestionId, QuestionSetId,
    QuestionStatus, QuizMode, QuizSession, ReviewAction, SessionConfig, SessionId, SessionPatch,
    SessionStatus, SourceSelection, TagId, UserId,
};

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub mode: QuizMode,
    pub question_count: u32,
    #[serde(default)]
    pub selected_categories: Vec<CategoryId>,
    #[serde(default)]
    pub selected_tags: Vec<TagId>,
    #[serde(default)]
    pub selected_question_sets: Vec<QuestionSetId>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default = "default_true")]
    pub shuffle: bool,
}

impl From<CreateSessionBody> for SessionConfig {
    fn from(body: CreateSessionBody) -> Self {
        SessionConfig {
            title: body.title.unwrap_or_default(),
            mode: body.mode,
            question_count: body.question_count,
            sources: SourceSelection {
                categories: body.selected_categories,
                tags: body.selected_tags,
                question_sets: body.selected_question_sets,
            },
            difficulty: body.difficulty,
            shuffle: body.shuffle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Start,
    Pause,
    Resume,
}

/// `PATCH /sessions/{id}`: a lifecycle action, or a plain field update when
/// `action` is absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSessionBody {
    #[serde(default)]
    pub action: Option<LifecycleAction>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub time_remaining: Option<u32>,
}

impl PatchSessionBody {
    pub fn into_patch(self) -> SessionPatch {
        SessionPatch {
            title: self.title,
            time_remaining_secs: self.time_remaining,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsQuery {
    pub status: Option<SessionStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// One answer on the wire. A client `timestamp` (sent by offline batch
/// flushes) is accepted but not stored; `attempted_at` is the server clock.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerBody {
    pub question_id: QuestionId,
    pub selected_answer_id: OptionId,
    #[serde(default)]
    pub time_spent: u32,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<AnswerBody> for AnswerSubmission {
    fn from(body: AnswerBody) -> Self {
        AnswerSubmission {
            question_id: body.question_id,
            selected_option_id: body.selected_answer_id,
            time_spent_secs: body.time_spent,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptBody {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub answer: AnswerBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBatchBody {
    pub session_id: SessionId,
    pub answers: Vec<AnswerBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptsQuery {
    pub session_id: SessionId,
}

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    pub action: ReviewAction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: SessionId,
    pub user_id: UserId,
    pub title: String,
    pub mode: QuizMode,
    pub status: SessionStatus,
    pub question_ids: Vec<QuestionId>,
    pub total_questions: u32,
    pub sources: SourceSelection,
    pub difficulty: Option<Difficulty>,
    pub time_limit: Option<u32>,
    pub time_remaining: Option<u32>,
    pub paused_time: u32,
    pub total_time_spent: Option<u32>,
    pub correct_answers: Option<u32>,
    pub score: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&QuizSession> for SessionView {
    fn from(s: &QuizSession) -> Self {
        let score = s.score();
        SessionView {
            id: s.id(),
            user_id: s.owner(),
            title: s.title().to_owned(),
            mode: s.mode(),
            status: s.status(),
            question_ids: s.question_ids().to_vec(),
            total_questions: s.total_questions(),
            sources: s.config().sources.clone(),
            difficulty: s.config().difficulty,
            time_limit: s.time_limit_secs(),
            time_remaining: s.time_remaining_secs(),
            paused_time: s.paused_secs(),
            total_time_spent: s.total_time_spent_secs(),
            correct_answers: score.map(|sc| sc.correct),
            score: score.map(|sc| sc.percent()),
            started_at: s.started_at(),
            paused_at: s.paused_at(),
            completed_at: s.completed_at(),
            created_at: s.created_at(),
            updated_at: s.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    pub id: OptionId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: QuestionId,
    pub title: String,
    pub category_id: Option<CategoryId>,
    pub question_set_id: Option<QuestionSetId>,
    pub tag_ids: Vec<TagId>,
    pub difficulty: Difficulty,
    pub status: QuestionStatus,
    pub author_id: UserId,
    pub options: Vec<OptionView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuestionView {
    /// `reveal` controls whether the correct option is exposed.
    pub fn new(q: &Question, reveal: bool) -> Self {
        QuestionView {
            id: q.id(),
            title: q.title().to_owned(),
            category_id: q.category_id(),
            question_set_id: q.question_set_id(),
            tag_ids: q.tags().to_vec(),
            difficulty: q.difficulty(),
            status: q.status(),
            author_id: q.author(),
            options: q
                .options()
                .iter()
                .map(|o| OptionView {
                    id: o.id,
                    text: o.text.clone(),
                    is_correct: reveal.then_some(o.is_correct),
                })
                .collect(),
            created_at: q.created_at(),
            updated_at: q.updated_at(),
        }
    }
}
