//! 답안 제출 모델.

use serde::{Deserialize, Serialize};

/// 제출 요청 본문
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// 응시자 식별자
    pub user_id: String,
    /// 퀴즈 식별자
    pub quiz_id: String,
    /// 문항별 선택
    pub answers: Vec<Option<usize>>,
    /// 확정 점수
    pub score: u32,
}

/// 제출 응답
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAck {
    /// 서버 메시지
    #[serde(default)]
    pub message: String,
    /// 생성된 리포트 id
    #[serde(default)]
    pub report_id: Option<String>,
}
