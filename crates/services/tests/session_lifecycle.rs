use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{
    AnswerSubmission, CategoryId, CategoryStats, CategoryTally, Difficulty, OptionDraft,
    OptionId, Question, QuestionDraft, QuestionId, QuizMode, ReviewAction, Role, SessionConfig,
    SessionId, SessionPatch, SessionStatus, SourceSelection, UserId,
};
use quiz_core::time::fixed_now;
use services::{
    AnswerRejection, Caller, Clock, ListSessions, QuizSessionService, SessionError,
    StatsAggregator,
};
use storage::repository::{
    AttemptRepository, InMemoryRepository, PoolFilter, QuestionRepository, SessionRepository,
    StatsRepository, StorageError,
};

struct Bank {
    repo: InMemoryRepository,
    category: CategoryId,
    questions: Vec<Question>,
}

async fn bank(count: usize) -> Bank {
    let repo = InMemoryRepository::new();
    let category = CategoryId::random();
    let author = UserId::random();
    let mut questions = Vec::new();
    for i in 0..count {
        let mut q = QuestionDraft {
            title: format!("Pathology item {i}"),
            category_id: Some(category),
            question_set_id: None,
            tags: Vec::new(),
            difficulty: Difficulty::Medium,
            options: vec![
                OptionDraft {
                    text: "right".into(),
                    is_correct: true,
                },
                OptionDraft {
                    text: "wrong".into(),
                    is_correct: false,
                },
            ],
        }
        .validate(QuestionId::random(), author, fixed_now() + Duration::seconds(i as i64))
        .unwrap();
        q.apply_review(ReviewAction::Submit, fixed_now()).unwrap();
        q.apply_review(ReviewAction::Approve, fixed_now()).unwrap();
        repo.upsert_question(&q).await.unwrap();
        questions.push(q);
    }
    Bank {
        repo,
        category,
        questions,
    }
}

fn service_at(repo: &InMemoryRepository, now: DateTime<Utc>) -> QuizSessionService {
    service_with_stats(repo, now, Arc::new(repo.clone()))
}

fn service_with_stats(
    repo: &InMemoryRepository,
    now: DateTime<Utc>,
    stats: Arc<dyn StatsRepository>,
) -> QuizSessionService {
    let clock = Clock::fixed(now);
    let aggregator = StatsAggregator::new(
        clock,
        stats,
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    QuizSessionService::new(
        clock,
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        aggregator,
    )
}

fn config(category: CategoryId, count: u32, mode: QuizMode) -> SessionConfig {
    SessionConfig {
        title: "Hematopathology".into(),
        mode,
        question_count: count,
        sources: SourceSelection {
            categories: vec![category],
            ..SourceSelection::default()
        },
        difficulty: None,
        shuffle: false,
    }
}

fn option(q: &Question, correct: bool) -> OptionId {
    q.options()
        .iter()
        .find(|o| o.is_correct == correct)
        .map(|o| o.id)
        .unwrap()
}

fn answer(q: &Question, correct: bool) -> AnswerSubmission {
    AnswerSubmission {
        question_id: q.id(),
        selected_option_id: option(q, correct),
        time_spent_secs: 30,
    }
}

fn user() -> Caller {
    Caller::new(UserId::random(), Role::User)
}

#[tokio::test]
async fn full_lifecycle_scores_over_frozen_list() {
    let bank = bank(4).await;
    let svc = service_at(&bank.repo, fixed_now());
    let me = user();

    let session = svc
        .create_session(&me, config(bank.category, 4, QuizMode::Tutor))
        .await
        .unwrap();
    assert_eq!(session.status(), SessionStatus::NotStarted);
    assert_eq!(session.total_questions(), 4);

    svc.start_session(&me, session.id()).await.unwrap();
    for (i, q) in bank.questions.iter().take(3).enumerate() {
        svc.submit_answer(&me, session.id(), answer(q, i != 1))
            .await
            .unwrap();
    }

    let done = svc.complete_session(&me, session.id()).await.unwrap();
    assert_eq!(done.status(), SessionStatus::Completed);
    let score = done.score().unwrap();
    assert_eq!((score.correct, score.total), (2, 4));
    assert_eq!(done.total_time_spent_secs(), Some(90));

    let results = svc.session_results(&me, session.id()).await.unwrap();
    assert_eq!(results.score, 50);
    assert_eq!(results.attempts.len(), 3);
    assert_eq!(results.category_breakdown.len(), 1);
    assert_eq!(results.category_breakdown[0].total, 4);
}

#[tokio::test]
async fn completion_is_idempotent() {
    let bank = bank(2).await;
    let svc = service_at(&bank.repo, fixed_now());
    let me = user();

    let session = svc
        .create_session(&me, config(bank.category, 2, QuizMode::Untimed))
        .await
        .unwrap();
    svc.start_session(&me, session.id()).await.unwrap();
    svc.submit_answer(&me, session.id(), answer(&bank.questions[0], true))
        .await
        .unwrap();
    let first = svc.complete_session(&me, session.id()).await.unwrap();

    let err = svc.complete_session(&me, session.id()).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyCompleted));

    let stored = svc.get_session(&me, session.id()).await.unwrap();
    assert_eq!(stored.score(), first.score());
    assert_eq!(stored.completed_at(), first.completed_at());

    let stats = bank.repo.category_stats(me.user_id).await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].total_attempts, 1);
}

#[tokio::test]
async fn duplicate_single_answer_is_rejected() {
    let bank = bank(2).await;
    let svc = service_at(&bank.repo, fixed_now());
    let me = user();

    let session = svc
        .create_session(&me, config(bank.category, 2, QuizMode::Tutor))
        .await
        .unwrap();
    svc.start_session(&me, session.id()).await.unwrap();
    svc.submit_answer(&me, session.id(), answer(&bank.questions[0], true))
        .await
        .unwrap();

    let err = svc
        .submit_answer(&me, session.id(), answer(&bank.questions[0], false))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::DuplicateAnswer));

    let attempts = svc.list_attempts(&me, session.id()).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].is_correct);
}

#[tokio::test]
async fn batch_skips_already_answered_questions() {
    let bank = bank(3).await;
    let svc = service_at(&bank.repo, fixed_now());
    let me = user();
    let [q1, q2, q3] = [&bank.questions[0], &bank.questions[1], &bank.questions[2]];

    let session = svc
        .create_session(&me, config(bank.category, 3, QuizMode::Tutor))
        .await
        .unwrap();
    svc.start_session(&me, session.id()).await.unwrap();

    let first = svc
        .submit_answers_batch(&me, session.id(), vec![answer(q1, true), answer(q2, false)])
        .await
        .unwrap();
    assert_eq!((first.submitted, first.skipped, first.total), (2, 0, 2));

    let second = svc
        .submit_answers_batch(&me, session.id(), vec![answer(q1, true), answer(q3, true)])
        .await
        .unwrap();
    assert_eq!((second.submitted, second.skipped, second.total), (1, 1, 2));

    assert_eq!(svc.list_attempts(&me, session.id()).await.unwrap().len(), 3);

    let done = svc.complete_session(&me, session.id()).await.unwrap();
    let score = done.score().unwrap();
    assert_eq!((score.correct, score.total), (2, 3));
}

#[tokio::test]
async fn invalid_tuple_rejects_whole_batch() {
    let bank = bank(2).await;
    let svc = service_at(&bank.repo, fixed_now());
    let me = user();

    let session = svc
        .create_session(&me, config(bank.category, 2, QuizMode::Tutor))
        .await
        .unwrap();
    svc.start_session(&me, session.id()).await.unwrap();

    let foreign = AnswerSubmission {
        question_id: bank.questions[1].id(),
        selected_option_id: option(&bank.questions[0], true),
        time_spent_secs: 5,
    };
    let err = svc
        .submit_answers_batch(
            &me,
            session.id(),
            vec![answer(&bank.questions[0], true), foreign],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidAnswer(AnswerRejection::OptionNotInQuestion)
    ));
    assert!(svc.list_attempts(&me, session.id()).await.unwrap().is_empty());

    let err = svc
        .submit_answers_batch(&me, session.id(), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidAnswer(AnswerRejection::EmptyBatch)
    ));
}

#[tokio::test]
async fn answers_outside_the_frozen_list_are_refused() {
    let bank = bank(3).await;
    let svc = service_at(&bank.repo, fixed_now());
    let me = user();

    let session = svc
        .create_session(&me, config(bank.category, 2, QuizMode::Tutor))
        .await
        .unwrap();
    svc.start_session(&me, session.id()).await.unwrap();

    let outsider = bank
        .questions
        .iter()
        .find(|q| !session.contains_question(q.id()))
        .unwrap();
    let err = svc
        .submit_answer(&me, session.id(), answer(outsider, true))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidAnswer(AnswerRejection::QuestionNotInSession)
    ));
}

#[tokio::test]
async fn other_users_are_forbidden_regardless_of_role() {
    let bank = bank(2).await;
    let svc = service_at(&bank.repo, fixed_now());
    let owner = user();
    let admin = Caller::new(UserId::random(), Role::Admin);

    let session = svc
        .create_session(&owner, config(bank.category, 2, QuizMode::Tutor))
        .await
        .unwrap();

    assert!(matches!(
        svc.get_session(&admin, session.id()).await.unwrap_err(),
        SessionError::Forbidden
    ));
    assert!(matches!(
        svc.start_session(&admin, session.id()).await.unwrap_err(),
        SessionError::Forbidden
    ));
    assert!(matches!(
        svc.delete_session(&admin, session.id()).await.unwrap_err(),
        SessionError::Forbidden
    ));
    assert!(matches!(
        svc.list_attempts(&admin, session.id()).await.unwrap_err(),
        SessionError::Forbidden
    ));

    let listed = svc
        .list_sessions(&admin, ListSessions::default())
        .await
        .unwrap();
    assert!(listed.is_empty());

    let stored = svc.get_session(&owner, session.id()).await.unwrap();
    assert_eq!(stored.status(), SessionStatus::NotStarted);
}

#[tokio::test]
async fn illegal_transitions_leave_state_untouched() {
    let bank = bank(2).await;
    let svc = service_at(&bank.repo, fixed_now());
    let me = user();

    let session = svc
        .create_session(&me, config(bank.category, 2, QuizMode::Tutor))
        .await
        .unwrap();

    assert!(matches!(
        svc.pause_session(&me, session.id(), None).await.unwrap_err(),
        SessionError::InvalidTransition(_)
    ));
    assert!(matches!(
        svc.submit_answer(&me, session.id(), answer(&bank.questions[0], true))
            .await
            .unwrap_err(),
        SessionError::InvalidTransition(_)
    ));
    assert!(matches!(
        svc.complete_session(&me, session.id()).await.unwrap_err(),
        SessionError::InvalidTransition(_)
    ));
    assert!(matches!(
        svc.session_results(&me, session.id()).await.unwrap_err(),
        SessionError::InvalidTransition(_)
    ));

    svc.start_session(&me, session.id()).await.unwrap();
    assert!(matches!(
        svc.start_session(&me, session.id()).await.unwrap_err(),
        SessionError::InvalidTransition(_)
    ));

    svc.pause_session(&me, session.id(), None).await.unwrap();
    assert!(matches!(
        svc.submit_answer(&me, session.id(), answer(&bank.questions[0], true))
            .await
            .unwrap_err(),
        SessionError::InvalidTransition(_)
    ));

    svc.complete_session(&me, session.id()).await.unwrap();
    assert!(matches!(
        svc.update_session(
            &me,
            session.id(),
            SessionPatch {
                title: Some("renamed".into()),
                time_remaining_secs: None,
            },
        )
        .await
        .unwrap_err(),
        SessionError::AlreadyCompleted
    ));
    let stored = svc.get_session(&me, session.id()).await.unwrap();
    assert_eq!(stored.title(), "Hematopathology");
}

#[tokio::test]
async fn pause_time_is_measured_on_the_server() {
    let bank = bank(2).await;
    let t0 = fixed_now();
    let me = user();

    let svc = service_at(&bank.repo, t0);
    let session = svc
        .create_session(&me, config(bank.category, 2, QuizMode::Timed))
        .await
        .unwrap();
    assert_eq!(session.time_limit_secs(), Some(120));
    svc.start_session(&me, session.id()).await.unwrap();
    let paused = svc
        .pause_session(&me, session.id(), Some(10_000))
        .await
        .unwrap();
    assert_eq!(paused.time_remaining_secs(), Some(120));

    let later = service_at(&bank.repo, t0 + Duration::seconds(45));
    let resumed = later.resume_session(&me, session.id()).await.unwrap();
    assert_eq!(resumed.status(), SessionStatus::InProgress);
    assert_eq!(resumed.paused_secs(), 45);

    later
        .submit_answer(&me, session.id(), answer(&bank.questions[0], true))
        .await
        .unwrap();
    let done = later.complete_session(&me, session.id()).await.unwrap();
    assert_eq!(done.total_time_spent_secs(), Some(75));
}

#[tokio::test]
async fn reported_answer_time_is_clamped() {
    let bank = bank(1).await;
    let svc = service_at(&bank.repo, fixed_now());
    let me = user();

    let session = svc
        .create_session(&me, config(bank.category, 1, QuizMode::Tutor))
        .await
        .unwrap();
    svc.start_session(&me, session.id()).await.unwrap();
    let attempt = svc
        .submit_answer(
            &me,
            session.id(),
            AnswerSubmission {
                time_spent_secs: u32::MAX,
                ..answer(&bank.questions[0], true)
            },
        )
        .await
        .unwrap();
    assert_eq!(
        attempt.time_spent_secs,
        svc.limits().max_time_per_question_secs
    );
}

#[tokio::test]
async fn deleting_removes_attempts_then_session() {
    let bank = bank(2).await;
    let svc = service_at(&bank.repo, fixed_now());
    let me = user();

    let session = svc
        .create_session(&me, config(bank.category, 2, QuizMode::Tutor))
        .await
        .unwrap();
    svc.start_session(&me, session.id()).await.unwrap();
    svc.submit_answer(&me, session.id(), answer(&bank.questions[0], true))
        .await
        .unwrap();

    svc.delete_session(&me, session.id()).await.unwrap();

    assert!(bank.repo.get_session(session.id()).await.unwrap().is_none());
    assert!(
        bank.repo
            .attempts_for_session(session.id())
            .await
            .unwrap()
            .is_empty()
    );
    assert!(matches!(
        svc.get_session(&me, session.id()).await.unwrap_err(),
        SessionError::NotFound
    ));
}

#[tokio::test]
async fn configuration_errors_are_reported() {
    let bank = bank(1).await;
    let svc = service_at(&bank.repo, fixed_now());
    let me = user();

    let mut no_source = config(bank.category, 1, QuizMode::Tutor);
    no_source.sources = SourceSelection::default();
    assert!(matches!(
        svc.create_session(&me, no_source).await.unwrap_err(),
        SessionError::InvalidConfiguration(_)
    ));

    assert!(matches!(
        svc.create_session(&me, config(bank.category, 0, QuizMode::Tutor))
            .await
            .unwrap_err(),
        SessionError::InvalidConfiguration(_)
    ));

    assert!(matches!(
        svc.create_session(&me, config(CategoryId::random(), 1, QuizMode::Tutor))
            .await
            .unwrap_err(),
        SessionError::InvalidConfiguration(_)
    ));
}

#[tokio::test]
async fn missing_session_is_not_found() {
    let bank = bank(1).await;
    let svc = service_at(&bank.repo, fixed_now());
    let err = svc
        .start_session(&user(), SessionId::random())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotFound));
}

/// Question bank with some questions removed after sessions froze them.
struct PrunedBank {
    inner: InMemoryRepository,
    removed: Vec<QuestionId>,
}

#[async_trait]
impl QuestionRepository for PrunedBank {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        self.inner.upsert_question(question).await
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        if self.removed.contains(&id) {
            return Ok(None);
        }
        self.inner.get_question(id).await
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        let kept: Vec<QuestionId> = ids
            .iter()
            .copied()
            .filter(|id| !self.removed.contains(id))
            .collect();
        self.inner.get_questions(&kept).await
    }

    async fn find_pool(&self, filter: &PoolFilter) -> Result<Vec<QuestionId>, StorageError> {
        self.inner.find_pool(filter).await
    }
}

#[tokio::test]
async fn answering_a_removed_question_is_not_found() {
    let bank = bank(2).await;
    let svc = service_at(&bank.repo, fixed_now());
    let me = user();
    let session = svc
        .create_session(&me, config(bank.category, 2, QuizMode::Tutor))
        .await
        .unwrap();
    svc.start_session(&me, session.id()).await.unwrap();

    let removed = &bank.questions[0];
    let pruned = QuizSessionService::new(
        Clock::fixed(fixed_now()),
        Arc::new(bank.repo.clone()),
        Arc::new(bank.repo.clone()),
        Arc::new(PrunedBank {
            inner: bank.repo.clone(),
            removed: vec![removed.id()],
        }),
        StatsAggregator::new(
            Clock::fixed(fixed_now()),
            Arc::new(bank.repo.clone()),
            Arc::new(bank.repo.clone()),
            Arc::new(bank.repo.clone()),
        ),
    );

    let err = pruned
        .submit_answer(&me, session.id(), answer(removed, true))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::QuestionNotFound));

    let err = pruned
        .submit_answers_batch(
            &me,
            session.id(),
            vec![answer(&bank.questions[1], true), answer(removed, false)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::QuestionNotFound));
    assert!(bank.repo.attempts_for_session(session.id()).await.unwrap().is_empty());
}

struct BrokenStats;

#[async_trait]
impl StatsRepository for BrokenStats {
    async fn apply_session_stats(
        &self,
        _user_id: UserId,
        _session_id: SessionId,
        _tallies: &[CategoryTally],
        _applied_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        Err(StorageError::Connection("stats store offline".into()))
    }

    async fn category_stats(&self, _user_id: UserId) -> Result<Vec<CategoryStats>, StorageError> {
        Err(StorageError::Connection("stats store offline".into()))
    }
}

#[tokio::test]
async fn stats_failure_does_not_fail_completion() {
    let bank = bank(1).await;
    let svc = service_with_stats(&bank.repo, fixed_now(), Arc::new(BrokenStats));
    let me = user();

    let session = svc
        .create_session(&me, config(bank.category, 1, QuizMode::Practice))
        .await
        .unwrap();
    svc.start_session(&me, session.id()).await.unwrap();
    svc.submit_answer(&me, session.id(), answer(&bank.questions[0], true))
        .await
        .unwrap();

    let done = svc.complete_session(&me, session.id()).await.unwrap();
    assert_eq!(done.status(), SessionStatus::Completed);
}

#[tokio::test]
async fn user_stats_summarize_completed_sessions() {
    let bank = bank(2).await;
    let repo = bank.repo.clone();
    let svc = service_at(&repo, fixed_now());
    let aggregator = StatsAggregator::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    let me = user();

    for correct in [true, false] {
        let session = svc
            .create_session(&me, config(bank.category, 2, QuizMode::Tutor))
            .await
            .unwrap();
        svc.start_session(&me, session.id()).await.unwrap();
        svc.submit_answers_batch(
            &me,
            session.id(),
            vec![
                answer(&bank.questions[0], correct),
                answer(&bank.questions[1], true),
            ],
        )
        .await
        .unwrap();
        svc.complete_session(&me, session.id()).await.unwrap();
    }

    let stats = aggregator.user_stats(&me).await.unwrap();
    assert_eq!(stats.completed_sessions, 2);
    assert_eq!(stats.average_score, 75);
    assert_eq!(stats.total_time_spent_secs, 120);
    assert_eq!(stats.categories.len(), 1);
    assert_eq!(stats.categories[0].total_attempts, 4);
    assert_eq!(stats.categories[0].correct_attempts, 3);
    assert_eq!(stats.categories[0].accuracy, 75);
}
