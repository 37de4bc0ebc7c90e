//! 위반(경고) 모델.

use serde::{Deserialize, Serialize};

/// 위반 신호 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSource {
    /// 문서가 숨겨짐 (탭 전환)
    DocumentHidden,
    /// 창 포커스 상실
    WindowBlur,
    /// 포인터가 창 밖으로 이동
    PointerLeave,
    /// 원격 감독 서비스 탐지
    RemoteProctor,
}

impl ViolationSource {
    /// 로컬 신호의 고정 경고 문구. 원격 탐지는 수신 메시지를 그대로 사용
    pub fn default_message(&self) -> Option<&'static str> {
        match self {
            ViolationSource::DocumentHidden => Some(
                "You have navigated away from the test window. This action has been recorded.",
            ),
            ViolationSource::WindowBlur => {
                Some("Test window lost focus. This action has been recorded.")
            }
            ViolationSource::PointerLeave => {
                Some("Mouse left the test window. This action has been recorded.")
            }
            ViolationSource::RemoteProctor => None,
        }
    }
}

/// 표시 중인 위반 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// 단조 증가 식별자
    pub id: u64,
    /// 표시 문구
    pub message: String,
    /// 발생 시각 (Unix ms)
    pub timestamp_ms: i64,
    /// 출처
    pub source: ViolationSource,
}
