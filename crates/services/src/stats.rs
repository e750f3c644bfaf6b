use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use quiz_core::model::{CategoryId, QuestionId, QuizAttempt, QuizSession, SessionStatus};
use storage::repository::{QuestionRepository, SessionQuery, SessionRepository, StatsRepository};

use crate::Clock;
use crate::error::StatsError;
use crate::guard::Caller;
use crate::sessions::results::tally_attempts;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAccuracy {
    pub category_id: CategoryId,
    pub total_attempts: u32,
    pub correct_attempts: u32,
    pub accuracy: u32,
    pub updated_at: DateTime<Utc>,
}

/// A caller's aggregate performance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub completed_sessions: u32,
    pub average_score: u32,
    pub total_time_spent_secs: u64,
    pub categories: Vec<CategoryAccuracy>,
}

/// Folds completed sessions into per-user, per-category accuracy.
#[derive(Clone)]
pub struct StatsAggregator {
    clock: Clock,
    stats: Arc<dyn StatsRepository>,
    sessions: Arc<dyn SessionRepository>,
    questions: Arc<dyn QuestionRepository>,
}

impl StatsAggregator {
    #[must_use]
    pub fn new(
        clock: Clock,
        stats: Arc<dyn StatsRepository>,
        sessions: Arc<dyn SessionRepository>,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self {
            clock,
            stats,
            sessions,
            questions,
        }
    }

    /// Apply a completed session's attempts to its owner's category stats.
    ///
    /// Returns `false` when the session had already been applied.
    ///
    /// # Errors
    ///
    /// Returns `StatsError` on storage failures.
    pub async fn record_session(
        &self,
        session: &QuizSession,
        attempts: &[QuizAttempt],
    ) -> Result<bool, StatsError> {
        let mut seen = HashSet::new();
        let ids: Vec<QuestionId> = attempts
            .iter()
            .map(|a| a.question_id)
            .filter(|id| seen.insert(*id))
            .collect();
        let questions = self.questions.get_questions(&ids).await?;
        let tallies = tally_attempts(attempts, &questions);

        let applied = self
            .stats
            .apply_session_stats(session.owner(), session.id(), &tallies, self.clock.now())
            .await?;
        debug!(
            session_id = %session.id(),
            user_id = %session.owner(),
            categories = tallies.len(),
            applied,
            "category stats aggregated"
        );
        Ok(applied)
    }

    /// The caller's category accuracy plus totals over completed sessions.
    ///
    /// # Errors
    ///
    /// Returns `StatsError` on storage failures.
    pub async fn user_stats(&self, caller: &Caller) -> Result<UserStats, StatsError> {
        let records = self.stats.category_stats(caller.user_id).await?;
        let completed = self
            .sessions
            .list_sessions(
                &SessionQuery::for_owner(caller.user_id).with_status(SessionStatus::Completed),
            )
            .await?;

        let mut percent_sum = 0_u64;
        let mut total_time = 0_u64;
        for session in &completed {
            if let Some(score) = session.score() {
                percent_sum += u64::from(score.percent());
            }
            total_time += u64::from(session.total_time_spent_secs().unwrap_or(0));
        }
        let count = u64::try_from(completed.len()).unwrap_or(u64::MAX);
        let average_score = if count == 0 {
            0
        } else {
            u32::try_from((2 * percent_sum + count) / (2 * count)).unwrap_or(100)
        };

        Ok(UserStats {
            completed_sessions: u32::try_from(completed.len()).unwrap_or(u32::MAX),
            average_score,
            total_time_spent_secs: total_time,
            categories: records
                .into_iter()
                .map(|r| CategoryAccuracy {
                    accuracy: r.accuracy_percent(),
                    category_id: r.category_id,
                    total_attempts: r.total_attempts,
                    correct_attempts: r.correct_attempts,
                    updated_at: r.updated_at,
                })
                .collect(),
        })
    }
}
