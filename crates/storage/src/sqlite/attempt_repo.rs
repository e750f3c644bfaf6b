use quiz_core::model::{QuizAttempt, SessionId};

use super::{
    SqliteRepository,
    mapping::{db_err, is_foreign_key_violation, map_attempt_row},
};
use crate::repository::{AttemptRepository, StorageError};

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO quiz_attempts (
                    id, session_id, question_id, selected_option_id,
                    is_correct, time_spent_secs, attempted_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(attempt.id.value())
        .bind(attempt.session_id.value())
        .bind(attempt.question_id.value())
        .bind(attempt.selected_option_id.value())
        .bind(attempt.is_correct)
        .bind(i64::from(attempt.time_spent_secs))
        .bind(attempt.attempted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StorageError::NotFound
            } else {
                db_err(e)
            }
        })?;

        Ok(())
    }

    async fn attempts_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<QuizAttempt>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, session_id, question_id, selected_option_id,
                    is_correct, time_spent_secs, attempted_at
                FROM quiz_attempts
                WHERE session_id = ?1
                ORDER BY attempted_at ASC, rowid ASC
            ",
        )
        .bind(session_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }

    async fn delete_attempts_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM quiz_attempts WHERE session_id = ?1")
            .bind(session_id.value())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(res.rows_affected())
    }
}
