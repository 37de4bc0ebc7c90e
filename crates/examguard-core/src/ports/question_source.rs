//! 문항 공급 포트.
//!
//! 구현: `examguard-network` (원격 퀴즈 API), `examguard-storage` (SQLite 문항 은행, 내장 샘플)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::question::Question;

/// 분류/코드로 문항 목록을 조회
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// 순서가 있는 문항 목록 반환
    async fn fetch(&self, code: &str) -> Result<Vec<Question>, CoreError>;
}
