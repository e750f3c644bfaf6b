use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Versioned schema migrations.
///
/// Version 1 holds the question bank, sessions, attempts, and per-category stats.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        let statements = [
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id BLOB PRIMARY KEY,
                    title TEXT NOT NULL,
                    category_id BLOB,
                    question_set_id BLOB,
                    difficulty TEXT NOT NULL
                        CHECK (difficulty IN ('easy', 'medium', 'hard')),
                    status TEXT NOT NULL,
                    author_id BLOB NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
            r"
                CREATE TABLE IF NOT EXISTS question_options (
                    id BLOB PRIMARY KEY,
                    question_id BLOB NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    text TEXT NOT NULL,
                    is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
                    FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
                );
            ",
            r"
                CREATE TABLE IF NOT EXISTS question_tags (
                    question_id BLOB NOT NULL,
                    tag_id BLOB NOT NULL,
                    PRIMARY KEY (question_id, tag_id),
                    FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
                );
            ",
            r"
                CREATE TABLE IF NOT EXISTS quiz_sessions (
                    id BLOB PRIMARY KEY,
                    owner_id BLOB NOT NULL,
                    title TEXT NOT NULL,
                    mode TEXT NOT NULL,
                    question_count INTEGER NOT NULL CHECK (question_count >= 0),
                    sources TEXT NOT NULL,
                    difficulty TEXT,
                    shuffle INTEGER NOT NULL CHECK (shuffle IN (0, 1)),
                    question_ids TEXT NOT NULL,
                    status TEXT NOT NULL
                        CHECK (status IN ('not_started', 'in_progress', 'paused', 'completed')),
                    time_limit_secs INTEGER,
                    time_remaining_secs INTEGER,
                    paused_secs INTEGER NOT NULL DEFAULT 0 CHECK (paused_secs >= 0),
                    total_time_spent_secs INTEGER,
                    correct_answers INTEGER,
                    started_at TEXT,
                    paused_at TEXT,
                    completed_at TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
            // No cascade: attempts must be removed before their session.
            r"
                CREATE TABLE IF NOT EXISTS quiz_attempts (
                    id BLOB PRIMARY KEY,
                    session_id BLOB NOT NULL,
                    question_id BLOB NOT NULL,
                    selected_option_id BLOB NOT NULL,
                    is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
                    time_spent_secs INTEGER NOT NULL CHECK (time_spent_secs >= 0),
                    attempted_at TEXT NOT NULL,
                    FOREIGN KEY (session_id) REFERENCES quiz_sessions(id)
                );
            ",
            r"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_quiz_attempts_session_question
                    ON quiz_attempts (session_id, question_id);
            ",
            r"
                CREATE TABLE IF NOT EXISTS user_category_stats (
                    user_id BLOB NOT NULL,
                    category_id BLOB NOT NULL,
                    total_attempts INTEGER NOT NULL CHECK (total_attempts >= 0),
                    correct_attempts INTEGER NOT NULL CHECK (correct_attempts >= 0),
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, category_id)
                );
            ",
            r"
                CREATE TABLE IF NOT EXISTS stats_applied_sessions (
                    session_id BLOB PRIMARY KEY,
                    user_id BLOB NOT NULL,
                    applied_at TEXT NOT NULL
                );
            ",
            r"
                CREATE INDEX IF NOT EXISTS idx_quiz_sessions_owner_created
                    ON quiz_sessions (owner_id, created_at);
            ",
            r"
                CREATE INDEX IF NOT EXISTS idx_questions_status_created
                    ON questions (status, created_at);
            ",
            r"
                CREATE INDEX IF NOT EXISTS idx_question_options_question
                    ON question_options (question_id, position);
            ",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
