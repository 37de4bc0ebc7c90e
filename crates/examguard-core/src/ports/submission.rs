//! 답안 제출 포트.
//!
//! 구현: `examguard-network` crate (reqwest)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::submission::{Submission, SubmissionAck};

/// 답안 제출 엔드포인트. 멱등성은 가정하지 않는다
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    /// 답안 제출
    async fn submit(&self, submission: &Submission) -> Result<SubmissionAck, CoreError>;
}
