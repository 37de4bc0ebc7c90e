//! 세션 상태 및 스냅샷 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::violation::Violation;

/// 세션 상태. `Completed`/`Terminated`는 종결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// 진행 중
    InProgress,
    /// 정상 완료 (시간 만료 또는 제출)
    Completed,
    /// 위반 한도 도달로 강제 종료
    Terminated,
}

impl SessionStatus {
    /// 종결 상태 여부
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "InProgress"),
            SessionStatus::Completed => write!(f, "Completed"),
            SessionStatus::Terminated => write!(f, "Terminated"),
        }
    }
}

/// 네트워크 연결 상태 (세션 속성)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// 온라인
    Online,
    /// 오프라인
    Offline,
}

/// 영속화용 세션 스냅샷
///
/// 연결 단절 구간을 넘어 진행 상황을 보존한다. 종결 상태와 소요 시간도 함께 저장해
/// 재로드 후 종료된 세션이 다시 진행 중으로 보이지 않게 한다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// 문항 id 순서 (섞인 순서 그대로)
    pub question_ids: Vec<String>,
    /// 현재 문항 인덱스
    pub current_index: usize,
    /// 문항별 선택 (None = 미응답)
    pub answers: Vec<Option<usize>>,
    /// 남은 시간 (초)
    pub time_remaining_secs: u64,
    /// 소요 시간 (초)
    pub time_spent_secs: u64,
    /// 표시 중인 위반 목록
    pub violations: Vec<Violation>,
    /// 누적 위반 횟수 (감소하지 않음)
    pub violation_count: u32,
    /// 세션 상태
    pub status: SessionStatus,
    /// 확정 점수 (종결 시)
    #[serde(default)]
    pub score: Option<u32>,
    /// 세션 시작 시각
    pub started_at: DateTime<Utc>,
    /// 종결 시각
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// 저장 시각
    pub saved_at: DateTime<Utc>,
}
