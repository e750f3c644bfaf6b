use chrono::{DateTime, Utc};
use quiz_core::model::{
    CategoryStats, Difficulty, PersistedSession, QuestionId, QuizAttempt, QuizMode, QuizSession,
    SessionStatus, SourceSelection,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver errors, turning constraint violations into `Conflict`.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
            StorageError::Conflict
        }
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn opt_u32(row: &SqliteRow, field: &'static str) -> Result<Option<u32>, StorageError> {
    row.try_get::<Option<i64>, _>(field)
        .map_err(ser)?
        .map(|v| u32_from_i64(field, v))
        .transpose()
}

pub(crate) fn id<T: From<Uuid>>(row: &SqliteRow, field: &str) -> Result<T, StorageError> {
    row.try_get::<Uuid, _>(field).map(T::from).map_err(ser)
}

pub(crate) fn opt_id<T: From<Uuid>>(row: &SqliteRow, field: &str) -> Result<Option<T>, StorageError> {
    Ok(row
        .try_get::<Option<Uuid>, _>(field)
        .map_err(ser)?
        .map(T::from))
}

pub(crate) fn parse_difficulty(s: &str) -> Result<Difficulty, StorageError> {
    s.parse().map_err(ser)
}

pub(crate) fn sources_to_json(sources: &SourceSelection) -> Result<String, StorageError> {
    serde_json::to_string(sources).map_err(ser)
}

pub(crate) fn question_ids_to_json(ids: &[QuestionId]) -> Result<String, StorageError> {
    serde_json::to_string(ids).map_err(ser)
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<QuizSession, StorageError> {
    let sources: String = row.try_get("sources").map_err(ser)?;
    let sources: SourceSelection = serde_json::from_str(&sources).map_err(ser)?;
    let question_ids: String = row.try_get("question_ids").map_err(ser)?;
    let question_ids: Vec<QuestionId> = serde_json::from_str(&question_ids).map_err(ser)?;

    let mode: String = row.try_get("mode").map_err(ser)?;
    let status: String = row.try_get("status").map_err(ser)?;
    let difficulty = row
        .try_get::<Option<String>, _>("difficulty")
        .map_err(ser)?
        .as_deref()
        .map(parse_difficulty)
        .transpose()?;

    let persisted = PersistedSession {
        id: id(row, "id")?,
        owner: id(row, "owner_id")?,
        title: row.try_get("title").map_err(ser)?,
        mode: mode.parse::<QuizMode>().map_err(ser)?,
        question_count: u32_from_i64(
            "question_count",
            row.try_get::<i64, _>("question_count").map_err(ser)?,
        )?,
        sources,
        difficulty,
        shuffle: row.try_get("shuffle").map_err(ser)?,
        question_ids,
        status: status.parse::<SessionStatus>().map_err(ser)?,
        time_limit_secs: opt_u32(row, "time_limit_secs")?,
        time_remaining_secs: opt_u32(row, "time_remaining_secs")?,
        paused_secs: u32_from_i64(
            "paused_secs",
            row.try_get::<i64, _>("paused_secs").map_err(ser)?,
        )?,
        total_time_spent_secs: opt_u32(row, "total_time_spent_secs")?,
        correct_answers: opt_u32(row, "correct_answers")?,
        started_at: row.try_get("started_at").map_err(ser)?,
        paused_at: row.try_get("paused_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    };

    QuizSession::from_persisted(persisted).map_err(ser)
}

pub(crate) fn map_attempt_row(row: &SqliteRow) -> Result<QuizAttempt, StorageError> {
    Ok(QuizAttempt {
        id: id(row, "id")?,
        session_id: id(row, "session_id")?,
        question_id: id(row, "question_id")?,
        selected_option_id: id(row, "selected_option_id")?,
        is_correct: row.try_get("is_correct").map_err(ser)?,
        time_spent_secs: u32_from_i64(
            "time_spent_secs",
            row.try_get::<i64, _>("time_spent_secs").map_err(ser)?,
        )?,
        attempted_at: row.try_get::<DateTime<Utc>, _>("attempted_at").map_err(ser)?,
    })
}

pub(crate) fn map_stats_row(row: &SqliteRow) -> Result<CategoryStats, StorageError> {
    Ok(CategoryStats {
        user_id: id(row, "user_id")?,
        category_id: id(row, "category_id")?,
        total_attempts: u32_from_i64(
            "total_attempts",
            row.try_get::<i64, _>("total_attempts").map_err(ser)?,
        )?,
        correct_attempts: u32_from_i64(
            "correct_attempts",
            row.try_get::<i64, _>("correct_attempts").map_err(ser)?,
        )?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

/// Appends `?N, ?N+1, ...` placeholders for an `IN (...)` list.
pub(crate) fn push_placeholders(sql: &mut String, start: usize, count: usize) {
    for i in 0..count {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
        sql.push_str(&(start + i).to_string());
    }
}
