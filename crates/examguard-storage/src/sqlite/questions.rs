//! 로컬 문항 은행 (QuestionSource 포트 구현).

use async_trait::async_trait;
use examguard_core::error::CoreError;
use examguard_core::models::question::Question;
use examguard_core::ports::question_source::QuestionSource;
use rusqlite::params;
use tracing::{debug, info};

use super::SqliteStorage;
use crate::sample::sample_questions;

impl SqliteStorage {
    /// 문항 일괄 저장. 같은 id는 덮어쓴다
    pub fn insert_questions(&self, category: &str, questions: &[Question]) -> Result<usize, CoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::Internal(format!("트랜잭션 시작 실패: {e}")))?;

        for q in questions {
            let options = serde_json::to_string(&q.options)?;
            tx.execute(
                "INSERT INTO questions (id, category, prompt, options, answer)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    category = excluded.category,
                    prompt = excluded.prompt,
                    options = excluded.options,
                    answer = excluded.answer",
                params![q.id, category, q.prompt, options, q.correct_option_index as i64],
            )
            .map_err(|e| CoreError::Internal(format!("문항 저장 실패: {e}")))?;
        }

        tx.commit()
            .map_err(|e| CoreError::Internal(format!("커밋 실패: {e}")))?;

        debug!("문항 {}개 저장: {category}", questions.len());
        Ok(questions.len())
    }

    /// 분류별 문항 수
    pub fn count_questions(&self, category: &str) -> Result<usize, CoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM questions WHERE category = ?1",
                params![category],
                |row| row.get(0),
            )
            .map_err(|e| CoreError::Internal(format!("문항 수 조회 실패: {e}")))?;
        Ok(count as usize)
    }

    /// 문항 은행이 비어 있으면 내장 샘플을 적재
    pub fn seed_samples_if_empty(&self) -> Result<usize, CoreError> {
        let samples = sample_questions();
        let category = crate::sample::SAMPLE_CATEGORY;
        if self.count_questions(category)? > 0 {
            return Ok(0);
        }
        let inserted = self.insert_questions(category, &samples)?;
        info!("샘플 문항 {inserted}개 적재");
        Ok(inserted)
    }
}

#[async_trait]
impl QuestionSource for SqliteStorage {
    async fn fetch(&self, code: &str) -> Result<Vec<Question>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, prompt, options, answer FROM questions
                 WHERE category = ?1 ORDER BY seq ASC",
            )
            .map_err(|e| CoreError::Internal(format!("쿼리 준비 실패: {e}")))?;

        let rows = stmt
            .query_map(params![code], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(|e| CoreError::Internal(format!("문항 조회 실패: {e}")))?;

        let mut questions = Vec::new();
        for row in rows {
            let (id, prompt, options, answer) =
                row.map_err(|e| CoreError::Internal(format!("행 읽기 실패: {e}")))?;
            let options: Vec<String> = serde_json::from_str(&options)
                .map_err(|e| CoreError::InvalidResponse(format!("문항 {id} 선택지 손상: {e}")))?;
            let correct_option_index = usize::try_from(answer).map_err(|_| {
                CoreError::InvalidResponse(format!("문항 {id} 정답 인덱스 음수: {answer}"))
            })?;
            questions.push(Question {
                id,
                prompt,
                options,
                correct_option_index,
                category: Some(code.to_string()),
            });
        }

        if questions.is_empty() {
            return Err(CoreError::NotFound {
                resource_type: "QuestionSet".to_string(),
                id: code.to_string(),
            });
        }
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seed_once_and_fetch_in_order() {
        let storage = SqliteStorage::open_in_memory("testState").unwrap();
        assert_eq!(storage.seed_samples_if_empty().unwrap(), 5);
        assert_eq!(storage.seed_samples_if_empty().unwrap(), 0);

        let questions = storage.fetch("python").await.unwrap();
        let ids: Vec<&str> = questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["python-1", "python-2", "python-3", "python-4", "python-5"]);
        assert_eq!(questions, sample_questions());
    }

    #[tokio::test]
    async fn unknown_category_is_not_found() {
        let storage = SqliteStorage::open_in_memory("testState").unwrap();
        storage.seed_samples_if_empty().unwrap();
        assert!(matches!(
            storage.fetch("go").await,
            Err(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn corrupted_options_are_invalid_response() {
        let storage = SqliteStorage::open_in_memory("testState").unwrap();
        storage
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO questions (id, category, prompt, options, answer)
                 VALUES ('x-1', 'x', 'prompt', 'not-json', 0)",
                [],
            )
            .unwrap();
        assert!(matches!(
            storage.fetch("x").await,
            Err(CoreError::InvalidResponse(_))
        ));
    }
}
