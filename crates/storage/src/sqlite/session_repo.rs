use quiz_core::model::{QuizSession, SessionId, SessionStatus};

use super::{
    SqliteRepository,
    mapping::{db_err, map_session_row, question_ids_to_json, sources_to_json},
};
use crate::repository::{SessionQuery, SessionRepository, StorageError};

const SESSION_COLUMNS: &str = r"
    id, owner_id, title, mode, question_count, sources, difficulty, shuffle,
    question_ids, status, time_limit_secs, time_remaining_secs, paused_secs,
    total_time_spent_secs, correct_answers, started_at, paused_at, completed_at,
    created_at, updated_at
";

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn insert_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        let p = session.to_persisted();

        sqlx::query(
            r"
                INSERT INTO quiz_sessions (
                    id, owner_id, title, mode, question_count, sources, difficulty, shuffle,
                    question_ids, status, time_limit_secs, time_remaining_secs, paused_secs,
                    total_time_spent_secs, correct_answers, started_at, paused_at, completed_at,
                    created_at, updated_at
                )
                VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
                )
            ",
        )
        .bind(p.id.value())
        .bind(p.owner.value())
        .bind(&p.title)
        .bind(p.mode.as_str())
        .bind(i64::from(p.question_count))
        .bind(sources_to_json(&p.sources)?)
        .bind(p.difficulty.map(|d| d.as_str()))
        .bind(p.shuffle)
        .bind(question_ids_to_json(&p.question_ids)?)
        .bind(p.status.as_str())
        .bind(p.time_limit_secs.map(i64::from))
        .bind(p.time_remaining_secs.map(i64::from))
        .bind(i64::from(p.paused_secs))
        .bind(p.total_time_spent_secs.map(i64::from))
        .bind(p.correct_answers.map(i64::from))
        .bind(p.started_at)
        .bind(p.paused_at)
        .bind(p.completed_at)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<QuizSession>, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM quiz_sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn update_session(
        &self,
        session: &QuizSession,
        expected: SessionStatus,
    ) -> Result<(), StorageError> {
        let p = session.to_persisted();

        // Only mutable fields; configuration and the frozen list never change.
        let res = sqlx::query(
            r"
                UPDATE quiz_sessions SET
                    title = ?1,
                    status = ?2,
                    time_remaining_secs = ?3,
                    paused_secs = ?4,
                    total_time_spent_secs = ?5,
                    correct_answers = ?6,
                    started_at = ?7,
                    paused_at = ?8,
                    completed_at = ?9,
                    updated_at = ?10
                WHERE id = ?11 AND status = ?12
            ",
        )
        .bind(&p.title)
        .bind(p.status.as_str())
        .bind(p.time_remaining_secs.map(i64::from))
        .bind(i64::from(p.paused_secs))
        .bind(p.total_time_spent_secs.map(i64::from))
        .bind(p.correct_answers.map(i64::from))
        .bind(p.started_at)
        .bind(p.paused_at)
        .bind(p.completed_at)
        .bind(p.updated_at)
        .bind(p.id.value())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() > 0 {
            return Ok(());
        }

        let exists = sqlx::query("SELECT 1 FROM quiz_sessions WHERE id = ?1")
            .bind(p.id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        if exists.is_some() {
            Err(StorageError::Conflict)
        } else {
            Err(StorageError::NotFound)
        }
    }

    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<QuizSession>, StorageError> {
        let mut sql = format!("SELECT {SESSION_COLUMNS} FROM quiz_sessions WHERE owner_id = ?1");
        let mut bind_index = 2;
        if query.status.is_some() {
            sql.push_str(" AND status = ?");
            sql.push_str(&bind_index.to_string());
            bind_index += 1;
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");
        sql.push_str(" LIMIT ?");
        sql.push_str(&bind_index.to_string());
        sql.push_str(" OFFSET ?");
        sql.push_str(&(bind_index + 1).to_string());

        let mut q = sqlx::query(&sql).bind(query.owner.value());
        if let Some(status) = query.status {
            q = q.bind(status.as_str());
        }
        q = q.bind(i64::from(query.limit)).bind(i64::from(query.offset));

        let rows = q.fetch_all(&self.pool).await.map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_row(&row)?);
        }
        Ok(out)
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM quiz_sessions WHERE id = ?1")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
