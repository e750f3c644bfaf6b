use std::collections::HashMap;

use quiz_core::model::{Question, QuestionId, QuestionOption, QuestionStatus, TagId};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{db_err, id, opt_id, parse_difficulty, push_placeholders, ser},
};
use crate::repository::{PoolFilter, QuestionRepository, StorageError};

type OptionMap = HashMap<QuestionId, Vec<QuestionOption>>;
type TagMap = HashMap<QuestionId, Vec<TagId>>;

impl SqliteRepository {
    async fn load_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
                SELECT
                    id, title, category_id, question_set_id, difficulty,
                    status, author_id, created_at, updated_at
                FROM questions
                WHERE id IN (
            ",
        );
        push_placeholders(&mut sql, 1, ids.len());
        sql.push(')');
        let mut query = sqlx::query(&sql);
        for qid in ids {
            query = query.bind(qid.value());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        let mut options = self.load_options(ids).await?;
        let mut tags = self.load_tags(ids).await?;

        let mut by_id = HashMap::with_capacity(rows.len());
        for row in rows {
            let qid: QuestionId = id(&row, "id")?;
            let difficulty: String = row.try_get("difficulty").map_err(ser)?;
            let status: String = row.try_get("status").map_err(ser)?;
            let question = Question::from_persisted(
                qid,
                row.try_get("title").map_err(ser)?,
                opt_id(&row, "category_id")?,
                opt_id(&row, "question_set_id")?,
                tags.remove(&qid).unwrap_or_default(),
                parse_difficulty(&difficulty)?,
                status.parse::<QuestionStatus>().map_err(ser)?,
                id(&row, "author_id")?,
                options.remove(&qid).unwrap_or_default(),
                row.try_get("created_at").map_err(ser)?,
                row.try_get("updated_at").map_err(ser)?,
            );
            by_id.insert(qid, question);
        }

        Ok(ids.iter().filter_map(|qid| by_id.remove(qid)).collect())
    }

    async fn load_options(&self, ids: &[QuestionId]) -> Result<OptionMap, StorageError> {
        let mut sql = String::from(
            r"
                SELECT id, question_id, text, is_correct
                FROM question_options
                WHERE question_id IN (
            ",
        );
        push_placeholders(&mut sql, 1, ids.len());
        sql.push_str(")\n ORDER BY question_id ASC, position ASC");
        let mut query = sqlx::query(&sql);
        for qid in ids {
            query = query.bind(qid.value());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        let mut out: OptionMap = HashMap::new();
        for row in rows {
            out.entry(id(&row, "question_id")?)
                .or_default()
                .push(QuestionOption {
                    id: id(&row, "id")?,
                    text: row.try_get("text").map_err(ser)?,
                    is_correct: row.try_get("is_correct").map_err(ser)?,
                });
        }
        Ok(out)
    }

    async fn load_tags(&self, ids: &[QuestionId]) -> Result<TagMap, StorageError> {
        let mut sql = String::from("SELECT question_id, tag_id FROM question_tags WHERE question_id IN (");
        push_placeholders(&mut sql, 1, ids.len());
        sql.push_str(") ORDER BY question_id ASC, tag_id ASC");
        let mut query = sqlx::query(&sql);
        for qid in ids {
            query = query.bind(qid.value());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        let mut out: TagMap = HashMap::new();
        for row in rows {
            out.entry(id(&row, "question_id")?)
                .or_default()
                .push(id(&row, "tag_id")?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let qid = question.id().value();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r"
            INSERT INTO questions (
                id, title, category_id, question_set_id, difficulty,
                status, author_id, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                category_id = excluded.category_id,
                question_set_id = excluded.question_set_id,
                difficulty = excluded.difficulty,
                status = excluded.status,
                updated_at = excluded.updated_at
            ",
        )
        .bind(qid)
        .bind(question.title())
        .bind(question.category_id().map(|c| c.value()))
        .bind(question.question_set_id().map(|s| s.value()))
        .bind(question.difficulty().as_str())
        .bind(question.status().as_str())
        .bind(question.author().value())
        .bind(question.created_at())
        .bind(question.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query("DELETE FROM question_options WHERE question_id = ?1")
            .bind(qid)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM question_tags WHERE question_id = ?1")
            .bind(qid)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        for (position, option) in question.options().iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("option position overflow".into()))?;
            sqlx::query(
                r"
                    INSERT INTO question_options (id, question_id, position, text, is_correct)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(option.id.value())
            .bind(qid)
            .bind(position)
            .bind(&option.text)
            .bind(option.is_correct)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        for tag in question.tags() {
            sqlx::query("INSERT INTO question_tags (question_id, tag_id) VALUES (?1, ?2)")
                .bind(qid)
                .bind(tag.value())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        Ok(self.load_questions(&[id]).await?.into_iter().next())
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        self.load_questions(ids).await
    }

    async fn find_pool(&self, filter: &PoolFilter) -> Result<Vec<QuestionId>, StorageError> {
        let sources = &filter.sources;
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
                SELECT DISTINCT q.id, q.created_at
                FROM questions q
                LEFT JOIN question_tags t ON t.question_id = q.id
                WHERE q.status IN ('approved', 'published')
            ",
        );
        let mut bind_index = 1;
        if filter.difficulty.is_some() {
            sql.push_str(" AND q.difficulty = ?");
            sql.push_str(&bind_index.to_string());
            bind_index += 1;
        }

        let mut clauses = Vec::new();
        for (column, count) in [
            ("q.category_id", sources.categories.len()),
            ("q.question_set_id", sources.question_sets.len()),
            ("t.tag_id", sources.tags.len()),
        ] {
            if count == 0 {
                continue;
            }
            let mut clause = format!("{column} IN (");
            push_placeholders(&mut clause, bind_index, count);
            clause.push(')');
            bind_index += count;
            clauses.push(clause);
        }
        sql.push_str(" AND (");
        sql.push_str(&clauses.join(" OR "));
        sql.push_str(")\n ORDER BY q.created_at ASC, q.id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(difficulty) = filter.difficulty {
            query = query.bind(difficulty.as_str());
        }
        for category in &sources.categories {
            query = query.bind(category.value());
        }
        for set in &sources.question_sets {
            query = query.bind(set.value());
        }
        for tag in &sources.tags {
            query = query.bind(tag.value());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(id(&row, "id")?);
        }
        Ok(out)
    }
}
