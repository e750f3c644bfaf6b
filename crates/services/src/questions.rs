use std::sync::Arc;

use tracing::info;

use quiz_core::model::{
    Capability, Question, QuestionDraft, QuestionId, QuestionStatus, ReviewAction, Role,
};
use storage::repository::QuestionRepository;

use crate::Clock;
use crate::error::QuestionServiceError;
use crate::guard::{AccessDenied, Caller, ensure_capability};

/// Authoring and review workflow for bank questions.
#[derive(Clone)]
pub struct QuestionService {
    clock: Clock,
    questions: Arc<dyn QuestionRepository>,
}

impl QuestionService {
    #[must_use]
    pub fn new(clock: Clock, questions: Arc<dyn QuestionRepository>) -> Self {
        Self { clock, questions }
    }

    /// Validate and persist a new `draft` question authored by the caller.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Forbidden` without the authoring
    /// capability and `QuestionServiceError::Invalid` for a malformed draft.
    pub async fn author_question(
        &self,
        caller: &Caller,
        draft: QuestionDraft,
    ) -> Result<Question, QuestionServiceError> {
        ensure_capability(caller, Capability::AuthorQuestions)?;
        let question = draft.validate(QuestionId::random(), caller.user_id, self.clock.now())?;
        self.questions.upsert_question(&question).await?;
        info!(
            question_id = %question.id(),
            user_id = %caller.user_id,
            options = question.options().len(),
            "question drafted"
        );
        Ok(question)
    }

    /// Move a question through the review workflow.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Forbidden` when the caller's role lacks
    /// the action's capability, or when a non-author attempts an author-side
    /// action; `QuestionServiceError::InvalidTransition` outside the review
    /// table.
    pub async fn review_question(
        &self,
        caller: &Caller,
        id: QuestionId,
        action: ReviewAction,
    ) -> Result<Question, QuestionServiceError> {
        ensure_capability(caller, action.required_capability())?;
        let mut question = self
            .questions
            .get_question(id)
            .await?
            .ok_or(QuestionServiceError::NotFound)?;

        if action.is_author_action() && !is_author_or_admin(caller, &question) {
            return Err(AccessDenied::NotOwner.into());
        }

        let from = question.status();
        let to = question.apply_review(action, self.clock.now())?;
        self.questions.upsert_question(&question).await?;
        info!(
            question_id = %id,
            user_id = %caller.user_id,
            %action,
            %from,
            %to,
            "question reviewed"
        );
        Ok(question)
    }

    /// Fetch a question.
    ///
    /// Questions outside the quiz pool are only visible to their author and
    /// to roles that can author or review; everyone else sees `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::NotFound` for missing or hidden questions.
    pub async fn get_question(
        &self,
        caller: &Caller,
        id: QuestionId,
    ) -> Result<Question, QuestionServiceError> {
        let question = self
            .questions
            .get_question(id)
            .await?
            .ok_or(QuestionServiceError::NotFound)?;
        if question.status().is_quizzable() || can_see_unpublished(caller, &question) {
            Ok(question)
        } else {
            Err(QuestionServiceError::NotFound)
        }
    }
}

fn is_author_or_admin(caller: &Caller, question: &Question) -> bool {
    caller.role == Role::Admin || caller.user_id == question.author()
}

fn can_see_unpublished(caller: &Caller, question: &Question) -> bool {
    caller.user_id == question.author()
        || caller.can(Capability::ReviewQuestions)
        || (caller.can(Capability::AuthorQuestions) && question.status() != QuestionStatus::Draft)
}
