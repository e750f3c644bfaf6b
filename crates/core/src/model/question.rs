use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{
    Capability, CategoryId, OptionId, QuestionId, QuestionSetId, SourceSelection, TagId, UserId,
};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question title cannot be empty")]
    EmptyTitle,

    #[error("a question needs at least two options, got {count}")]
    TooFewOptions { count: usize },

    #[error("exactly one option must be correct, got {count}")]
    CorrectOptionCount { count: usize },

    #[error("option text cannot be empty")]
    EmptyOptionText,

    #[error("cannot {action} a question that is {from}")]
    IllegalReview {
        from: QuestionStatus,
        action: ReviewAction,
    },

    #[error("invalid question status: {0}")]
    InvalidStatus(String),

    #[error("invalid difficulty: {0}")]
    InvalidDifficulty(String),
}

//
// ─── DIFFICULTY ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(QuestionError::InvalidDifficulty(other.to_owned())),
        }
    }
}

//
// ─── REVIEW WORKFLOW ──────────────────────────────────────────────────────────
//

/// Editorial state of a question.
///
/// Only `Approved` and `Published` questions are eligible for quiz pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Draft,
    PendingReview,
    Approved,
    Rejected,
    Published,
}

/// Step requested against a question's review status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Submit,
    Approve,
    Reject,
    Revise,
    Publish,
}

impl QuestionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionStatus::Draft => "draft",
            QuestionStatus::PendingReview => "pending_review",
            QuestionStatus::Approved => "approved",
            QuestionStatus::Rejected => "rejected",
            QuestionStatus::Published => "published",
        }
    }

    #[must_use]
    pub fn is_quizzable(self) -> bool {
        matches!(self, QuestionStatus::Approved | QuestionStatus::Published)
    }

    /// # Errors
    ///
    /// Returns `QuestionError::IllegalReview` outside the review table.
    pub fn apply(self, action: ReviewAction) -> Result<QuestionStatus, QuestionError> {
        use QuestionStatus as S;
        use ReviewAction as A;

        match (self, action) {
            (S::Draft, A::Submit) => Ok(S::PendingReview),
            (S::PendingReview, A::Approve) => Ok(S::Approved),
            (S::PendingReview, A::Reject) => Ok(S::Rejected),
            (S::Rejected, A::Revise) => Ok(S::Draft),
            (S::Approved, A::Publish) => Ok(S::Published),
            (from, action) => Err(QuestionError::IllegalReview { from, action }),
        }
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionStatus {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending_review" => Ok(Self::PendingReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "published" => Ok(Self::Published),
            other => Err(QuestionError::InvalidStatus(other.to_owned())),
        }
    }
}

impl ReviewAction {
    #[must_use]
    pub fn required_capability(self) -> Capability {
        match self {
            ReviewAction::Submit | ReviewAction::Revise => Capability::AuthorQuestions,
            ReviewAction::Approve | ReviewAction::Reject => Capability::ReviewQuestions,
            ReviewAction::Publish => Capability::PublishQuestions,
        }
    }

    /// Author-side actions are limited to the question's author (or an admin).
    #[must_use]
    pub fn is_author_action(self) -> bool {
        matches!(self, ReviewAction::Submit | ReviewAction::Revise)
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            ReviewAction::Submit => "submit",
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
            ReviewAction::Revise => "revise",
            ReviewAction::Publish => "publish",
        };
        f.write_str(verb)
    }
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub id: OptionId,
    pub text: String,
    pub is_correct: bool,
}

/// Unvalidated option as submitted by an author.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDraft {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Unvalidated question as submitted by an author.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub title: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub question_set_id: Option<QuestionSetId>,
    #[serde(default)]
    pub tags: Vec<TagId>,
    pub difficulty: Difficulty,
    pub options: Vec<OptionDraft>,
}

impl QuestionDraft {
    /// Validate the draft into a `Draft`-status question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the title is empty, fewer than two options
    /// are given, or the number of correct options is not exactly one.
    pub fn validate(
        self,
        id: QuestionId,
        author: UserId,
        now: DateTime<Utc>,
    ) -> Result<Question, QuestionError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(QuestionError::EmptyTitle);
        }
        if self.options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                count: self.options.len(),
            });
        }
        let correct = self.options.iter().filter(|o| o.is_correct).count();
        if correct != 1 {
            return Err(QuestionError::CorrectOptionCount { count: correct });
        }

        let mut options = Vec::with_capacity(self.options.len());
        for draft in self.options {
            let text = draft.text.trim();
            if text.is_empty() {
                return Err(QuestionError::EmptyOptionText);
            }
            options.push(QuestionOption {
                id: OptionId::random(),
                text: text.to_owned(),
                is_correct: draft.is_correct,
            });
        }

        let mut tags = self.tags;
        tags.sort_unstable();
        tags.dedup();

        Ok(Question {
            id,
            title: title.to_owned(),
            category_id: self.category_id,
            question_set_id: self.question_set_id,
            tags,
            difficulty: self.difficulty,
            status: QuestionStatus::Draft,
            author,
            options,
            created_at: now,
            updated_at: now,
        })
    }
}

/// A bank question. Read-only from the quiz lifecycle's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    title: String,
    category_id: Option<CategoryId>,
    question_set_id: Option<QuestionSetId>,
    tags: Vec<TagId>,
    difficulty: Difficulty,
    status: QuestionStatus,
    author: UserId,
    options: Vec<QuestionOption>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Question {
    /// Rehydrate a question from persisted storage.
    ///
    /// The single-correct-option rule is enforced at authoring time and is
    /// not re-checked here.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        id: QuestionId,
        title: String,
        category_id: Option<CategoryId>,
        question_set_id: Option<QuestionSetId>,
        tags: Vec<TagId>,
        difficulty: Difficulty,
        status: QuestionStatus,
        author: UserId,
        options: Vec<QuestionOption>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            category_id,
            question_set_id,
            tags,
            difficulty,
            status,
            author,
            options,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    #[must_use]
    pub fn question_set_id(&self) -> Option<QuestionSetId> {
        self.question_set_id
    }

    #[must_use]
    pub fn tags(&self) -> &[TagId] {
        &self.tags
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn status(&self) -> QuestionStatus {
        self.status
    }

    #[must_use]
    pub fn author(&self) -> UserId {
        self.author
    }

    #[must_use]
    pub fn options(&self) -> &[QuestionOption] {
        &self.options
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether `option_id` is this question's correct option.
    ///
    /// Returns `None` when the option does not belong to the question.
    #[must_use]
    pub fn is_correct_option(&self, option_id: OptionId) -> Option<bool> {
        self.options
            .iter()
            .find(|o| o.id == option_id)
            .map(|o| o.is_correct)
    }

    /// True when any selector (category, tag, or set) picks this question.
    #[must_use]
    pub fn matches_sources(&self, sources: &SourceSelection) -> bool {
        let by_category = self
            .category_id
            .is_some_and(|c| sources.categories.contains(&c));
        let by_set = self
            .question_set_id
            .is_some_and(|s| sources.question_sets.contains(&s));
        let by_tag = self.tags.iter().any(|t| sources.tags.contains(t));
        by_category || by_set || by_tag
    }

    /// Move the question through the review workflow.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::IllegalReview` outside the review table.
    pub fn apply_review(
        &mut self,
        action: ReviewAction,
        now: DateTime<Utc>,
    ) -> Result<QuestionStatus, QuestionError> {
        self.status = self.status.apply(action)?;
        self.updated_at = now;
        Ok(self.status)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
