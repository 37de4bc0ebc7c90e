//! ExamGuard 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 경계에서 발생한 실패를 `CoreError`로 변환한다.
//! 세션 상태 전이 로직은 에러를 반환하지 않으며, 에러는 항상 `Notice`로 변환되어 표시된다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 카메라/마이크(또는 화면) 접근 거부. 재요청으로 복구 가능
    #[error("권한 거부: {0}")]
    PermissionDenied(String),

    /// 네트워크 에러 (제출, 문항 조회 실패)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 감독 채널 연결 끊김
    #[error("감독 채널 연결 끊김: {0}")]
    ChannelDisconnected(String),

    /// 서버 응답 형식 오류 (문항 페이로드 손상 등)
    #[error("잘못된 응답: {0}")]
    InvalidResponse(String),

    /// 인증 실패 (토큰 만료, 자격증명 오류 등)
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Quiz")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// Rate Limit 초과 (429)
    #[error("요청 한도 초과, {retry_after_secs}초 후 재시도")]
    RateLimit {
        /// 재시도 대기 시간 (초)
        retry_after_secs: u64,
    },

    /// 서비스 일시 불가 (503)
    #[error("서비스 일시 불가: {0}")]
    ServiceUnavailable(String),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// 재시도로 회복될 수 있는 에러인지 판별
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::Network(_) | CoreError::ServiceUnavailable(_) | CoreError::RateLimit { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(CoreError::Network("timeout".into()).is_retryable());
        assert!(CoreError::ServiceUnavailable("down".into()).is_retryable());
        assert!(CoreError::RateLimit {
            retry_after_secs: 3
        }
        .is_retryable());
        assert!(!CoreError::InvalidResponse("bad".into()).is_retryable());
        assert!(!CoreError::PermissionDenied("camera".into()).is_retryable());
    }

    #[test]
    fn messages_are_localized() {
        let err = CoreError::PermissionDenied("camera".into());
        assert!(err.to_string().contains("권한 거부"));

        let err = CoreError::NotFound {
            resource_type: "Quiz".into(),
            id: "abc".into(),
        };
        assert_eq!(err.to_string(), "Quiz 미발견: abc");
    }
}
