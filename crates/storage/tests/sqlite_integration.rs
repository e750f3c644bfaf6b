use chrono::Duration;
use quiz_core::model::{
    AnswerSubmission, CategoryId, CategoryTally, Difficulty, OptionDraft, Question, QuestionDraft,
    QuestionId, QuizAttempt, QuizMode, QuizSession, ReviewAction, SessionConfig, SessionId,
    SessionStatus, SourceSelection, TagId, UserId,
};
use quiz_core::time::fixed_now;
use storage::repository::{
    AttemptRepository, PoolFilter, QuestionRepository, SessionQuery, SessionRepository,
    StatsRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn approved_question(
    category: Option<CategoryId>,
    tags: Vec<TagId>,
    difficulty: Difficulty,
    minutes: i64,
) -> Question {
    let draft = QuestionDraft {
        title: format!("Question created at +{minutes}m"),
        category_id: category,
        question_set_id: None,
        tags,
        difficulty,
        options: vec![
            OptionDraft {
                text: "Granuloma".into(),
                is_correct: true,
            },
            OptionDraft {
                text: "Abscess".into(),
                is_correct: false,
            },
        ],
    };
    let now = fixed_now() + Duration::minutes(minutes);
    let mut q = draft
        .validate(QuestionId::random(), UserId::random(), now)
        .unwrap();
    for action in [ReviewAction::Submit, ReviewAction::Approve] {
        q.apply_review(action, now).unwrap();
    }
    q
}

fn session_over(owner: UserId, questions: &[QuestionId], mode: QuizMode) -> QuizSession {
    let config = SessionConfig {
        title: "  Liver pathology ".into(),
        mode,
        question_count: u32::try_from(questions.len()).unwrap(),
        sources: SourceSelection {
            categories: vec![CategoryId::random()],
            ..SourceSelection::default()
        },
        difficulty: Some(Difficulty::Hard),
        shuffle: true,
    };
    QuizSession::new(
        SessionId::random(),
        owner,
        config,
        questions.to_vec(),
        fixed_now(),
    )
    .unwrap()
}

#[tokio::test]
async fn session_round_trips_and_guards_status() {
    let repo = connect("memdb_sessions").await;
    let owner = UserId::random();
    let questions = [QuestionId::random(), QuestionId::random()];
    let mut session = session_over(owner, &questions, QuizMode::Timed);
    repo.insert_session(&session).await.unwrap();

    let fetched = repo.get_session(session.id()).await.unwrap().unwrap();
    assert_eq!(fetched.title(), "Liver pathology");
    assert_eq!(fetched.question_ids(), &questions);
    assert_eq!(fetched.time_limit_secs(), Some(120));
    assert_eq!(fetched.config().difficulty, Some(Difficulty::Hard));

    session.start(fixed_now()).unwrap();
    repo.update_session(&session, SessionStatus::NotStarted)
        .await
        .unwrap();
    session
        .pause(Some(90), fixed_now() + Duration::seconds(30))
        .unwrap();
    repo.update_session(&session, SessionStatus::InProgress)
        .await
        .unwrap();

    let stale = repo
        .update_session(&session, SessionStatus::InProgress)
        .await
        .unwrap_err();
    assert!(matches!(stale, StorageError::Conflict));

    let fetched = repo.get_session(session.id()).await.unwrap().unwrap();
    assert_eq!(fetched.status(), SessionStatus::Paused);
    assert_eq!(fetched.time_remaining_secs(), Some(90));
    assert!(fetched.paused_at().is_some());
}

#[tokio::test]
async fn attempts_are_unique_per_question_and_block_session_delete() {
    let repo = connect("memdb_attempts").await;
    let q1 = QuestionId::random();
    let session = session_over(UserId::random(), &[q1], QuizMode::Tutor);
    repo.insert_session(&session).await.unwrap();

    let answer = AnswerSubmission {
        question_id: q1,
        selected_option_id: quiz_core::model::OptionId::random(),
        time_spent_secs: 40,
    };
    repo.insert_attempt(&QuizAttempt::new(session.id(), answer, true, fixed_now()))
        .await
        .unwrap();
    let dup = repo
        .insert_attempt(&QuizAttempt::new(session.id(), answer, false, fixed_now()))
        .await
        .unwrap_err();
    assert!(matches!(dup, StorageError::Conflict));

    let orphan = repo
        .insert_attempt(&QuizAttempt::new(
            SessionId::random(),
            answer,
            true,
            fixed_now(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(orphan, StorageError::NotFound));

    let blocked = repo.delete_session(session.id()).await.unwrap_err();
    assert!(matches!(blocked, StorageError::Conflict));

    assert_eq!(
        repo.delete_attempts_for_session(session.id()).await.unwrap(),
        1
    );
    repo.delete_session(session.id()).await.unwrap();
    assert!(repo.get_session(session.id()).await.unwrap().is_none());
    assert!(
        repo.attempts_for_session(session.id())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn pool_unions_selectors_and_skips_unreviewed() {
    let repo = connect("memdb_pool").await;
    let cardio = CategoryId::random();
    let neoplasia = TagId::random();

    let by_category = approved_question(Some(cardio), Vec::new(), Difficulty::Easy, 1);
    let by_tag = approved_question(None, vec![neoplasia], Difficulty::Hard, 2);
    let both = approved_question(Some(cardio), vec![neoplasia], Difficulty::Easy, 3);
    let unrelated = approved_question(Some(CategoryId::random()), Vec::new(), Difficulty::Easy, 4);
    let draft = QuestionDraft {
        title: "Still a draft".into(),
        category_id: Some(cardio),
        question_set_id: None,
        tags: Vec::new(),
        difficulty: Difficulty::Easy,
        options: vec![
            OptionDraft {
                text: "A".into(),
                is_correct: true,
            },
            OptionDraft {
                text: "B".into(),
                is_correct: false,
            },
        ],
    }
    .validate(QuestionId::random(), UserId::random(), fixed_now())
    .unwrap();

    for q in [&by_category, &by_tag, &both, &unrelated, &draft] {
        repo.upsert_question(q).await.unwrap();
    }

    let sources = SourceSelection {
        categories: vec![cardio],
        tags: vec![neoplasia],
        ..SourceSelection::default()
    };
    let pool = repo
        .find_pool(&PoolFilter {
            sources: sources.clone(),
            difficulty: None,
        })
        .await
        .unwrap();
    assert_eq!(pool, vec![by_category.id(), by_tag.id(), both.id()]);

    let easy = repo
        .find_pool(&PoolFilter {
            sources,
            difficulty: Some(Difficulty::Easy),
        })
        .await
        .unwrap();
    assert_eq!(easy, vec![by_category.id(), both.id()]);

    let loaded = repo.get_question(both.id()).await.unwrap().unwrap();
    assert_eq!(loaded.options(), both.options());
    assert_eq!(loaded.tags(), &[neoplasia]);
    assert_eq!(loaded.status(), both.status());
}

#[tokio::test]
async fn stats_apply_once_and_accumulate() {
    let repo = connect("memdb_stats").await;
    let user = UserId::random();
    let category = CategoryId::random();
    let tally = [CategoryTally {
        category_id: category,
        total: 3,
        correct: 2,
    }];

    let first = SessionId::random();
    assert!(
        repo.apply_session_stats(user, first, &tally, fixed_now())
            .await
            .unwrap()
    );
    assert!(
        !repo
            .apply_session_stats(user, first, &tally, fixed_now())
            .await
            .unwrap()
    );
    assert!(
        repo.apply_session_stats(user, SessionId::random(), &tally, fixed_now())
            .await
            .unwrap()
    );

    let stats = repo.category_stats(user).await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].total_attempts, 6);
    assert_eq!(stats[0].correct_attempts, 4);
}

#[tokio::test]
async fn listing_filters_by_owner_and_status_with_paging() {
    let repo = connect("memdb_listing").await;
    let owner = UserId::random();

    for minutes in 0..3 {
        let config = SessionConfig {
            title: format!("Quiz {minutes}"),
            mode: QuizMode::Practice,
            question_count: 1,
            sources: SourceSelection {
                tags: vec![TagId::random()],
                ..SourceSelection::default()
            },
            difficulty: None,
            shuffle: false,
        };
        let session = QuizSession::new(
            SessionId::random(),
            owner,
            config,
            vec![QuestionId::random()],
            fixed_now() + Duration::minutes(minutes),
        )
        .unwrap();
        repo.insert_session(&session).await.unwrap();
    }
    repo.insert_session(&session_over(
        UserId::random(),
        &[QuestionId::random()],
        QuizMode::Tutor,
    ))
    .await
    .unwrap();

    let mut query = SessionQuery::for_owner(owner);
    query.limit = 2;
    let page = repo.list_sessions(&query).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].title(), "Quiz 2");

    query.offset = 2;
    let rest = repo.list_sessions(&query).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].title(), "Quiz 0");

    let completed = repo
        .list_sessions(&SessionQuery::for_owner(owner).with_status(SessionStatus::Completed))
        .await
        .unwrap();
    assert!(completed.is_empty());
}
