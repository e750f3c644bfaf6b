use chrono::{DateTime, Utc};
use quiz_core::model::{CategoryStats, CategoryTally, SessionId, UserId};

use super::{
    SqliteRepository,
    mapping::{db_err, map_stats_row},
};
use crate::repository::{StatsRepository, StorageError};

#[async_trait::async_trait]
impl StatsRepository for SqliteRepository {
    async fn apply_session_stats(
        &self,
        user_id: UserId,
        session_id: SessionId,
        tallies: &[CategoryTally],
        applied_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let marker = sqlx::query(
            r"
                INSERT INTO stats_applied_sessions (session_id, user_id, applied_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(session_id) DO NOTHING
            ",
        )
        .bind(session_id.value())
        .bind(user_id.value())
        .bind(applied_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if marker.rows_affected() == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Ok(false);
        }

        for tally in tallies {
            sqlx::query(
                r"
                    INSERT INTO user_category_stats (
                        user_id, category_id, total_attempts, correct_attempts, updated_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(user_id, category_id) DO UPDATE SET
                        total_attempts = total_attempts + excluded.total_attempts,
                        correct_attempts = correct_attempts + excluded.correct_attempts,
                        updated_at = excluded.updated_at
                ",
            )
            .bind(user_id.value())
            .bind(tally.category_id.value())
            .bind(i64::from(tally.total))
            .bind(i64::from(tally.correct))
            .bind(applied_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn category_stats(&self, user_id: UserId) -> Result<Vec<CategoryStats>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT user_id, category_id, total_attempts, correct_attempts, updated_at
                FROM user_category_stats
                WHERE user_id = ?1
                ORDER BY category_id ASC
            ",
        )
        .bind(user_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_stats_row(&row)?);
        }
        Ok(out)
    }
}
