use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use quiz_core::model::{
    CategoryId, CategoryTally, Difficulty, Question, QuestionId, QuizAttempt, QuizSession, Score,
    SessionId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Tally {
    pub correct: u32,
    pub total: u32,
}

impl Tally {
    fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DifficultyBreakdown {
    pub easy: Tally,
    pub medium: Tally,
    pub hard: Tally,
}

impl DifficultyBreakdown {
    fn slot(&mut self, difficulty: Difficulty) -> &mut Tally {
        match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub category_id: CategoryId,
    pub correct: u32,
    pub total: u32,
}

/// Read model for a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResults {
    pub session_id: SessionId,
    pub score: u32,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub total_time_spent_secs: u32,
    pub average_time_per_question_secs: u32,
    pub difficulty_breakdown: DifficultyBreakdown,
    pub category_breakdown: Vec<CategoryBreakdown>,
    pub attempts: Vec<QuizAttempt>,
    pub completed_at: Option<DateTime<Utc>>,
}

fn correctness_by_question(attempts: &[QuizAttempt]) -> HashMap<QuestionId, bool> {
    attempts
        .iter()
        .map(|a| (a.question_id, a.is_correct))
        .collect()
}

/// Breakdowns walk the frozen list; unanswered questions count as wrong.
///
/// Questions deleted from the bank since the session was created are left out
/// of the breakdowns but still count toward the score denominator.
#[must_use]
pub fn build_results(
    session: &QuizSession,
    score: Score,
    attempts: Vec<QuizAttempt>,
    questions: &[Question],
) -> SessionResults {
    let answered = correctness_by_question(&attempts);
    let by_id: HashMap<QuestionId, &Question> = questions.iter().map(|q| (q.id(), q)).collect();

    let mut difficulty = DifficultyBreakdown::default();
    let mut categories: BTreeMap<CategoryId, Tally> = BTreeMap::new();
    for qid in session.question_ids() {
        let Some(question) = by_id.get(qid) else {
            continue;
        };
        let correct = answered.get(qid).copied().unwrap_or(false);
        difficulty.slot(question.difficulty()).record(correct);
        if let Some(category) = question.category_id() {
            categories.entry(category).or_default().record(correct);
        }
    }

    let total_time = session.total_time_spent_secs().unwrap_or(0);
    let average = if score.total == 0 {
        0
    } else {
        let t = u64::from(total_time);
        let n = u64::from(score.total);
        u32::try_from((2 * t + n) / (2 * n)).unwrap_or(u32::MAX)
    };

    SessionResults {
        session_id: session.id(),
        score: score.percent(),
        correct_answers: score.correct,
        total_questions: score.total,
        total_time_spent_secs: total_time,
        average_time_per_question_secs: average,
        difficulty_breakdown: difficulty,
        category_breakdown: categories
            .into_iter()
            .map(|(category_id, t)| CategoryBreakdown {
                category_id,
                correct: t.correct,
                total: t.total,
            })
            .collect(),
        attempts,
        completed_at: session.completed_at(),
    }
}

/// Per-category tallies over the attempts actually made.
#[must_use]
pub fn tally_attempts(attempts: &[QuizAttempt], questions: &[Question]) -> Vec<CategoryTally> {
    let categories: HashMap<QuestionId, CategoryId> = questions
        .iter()
        .filter_map(|q| q.category_id().map(|c| (q.id(), c)))
        .collect();

    let mut tallies: BTreeMap<CategoryId, Tally> = BTreeMap::new();
    for attempt in attempts {
        if let Some(category) = categories.get(&attempt.question_id) {
            tallies.entry(*category).or_default().record(attempt.is_correct);
        }
    }

    tallies
        .into_iter()
        .map(|(category_id, t)| CategoryTally {
            category_id,
            total: t.total,
            correct: t.correct,
        })
        .collect()
}
