//! 사용자 알림(비치명적 에러 표시) 모델.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 알림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// 미디어 접근 거부 (세션 시작 차단)
    PermissionDenied,
    /// 제출/문항 조회 실패
    NetworkFailure,
    /// 감독 채널 끊김 (배너)
    ChannelDisconnected,
    /// 응답 형식 오류 (세션 시작 불가)
    InvalidResponse,
    /// 로컬 저장소 등 내부 실패
    Internal,
}

impl From<&CoreError> for NoticeKind {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::PermissionDenied(_) => NoticeKind::PermissionDenied,
            CoreError::Network(_)
            | CoreError::ServiceUnavailable(_)
            | CoreError::RateLimit { .. }
            | CoreError::Auth(_)
            | CoreError::NotFound { .. } => NoticeKind::NetworkFailure,
            CoreError::ChannelDisconnected(_) => NoticeKind::ChannelDisconnected,
            CoreError::InvalidResponse(_) | CoreError::Serialization(_) => {
                NoticeKind::InvalidResponse
            }
            CoreError::Config(_)
            | CoreError::Validation { .. }
            | CoreError::Internal(_)
            | CoreError::Io(_) => NoticeKind::Internal,
        }
    }
}

/// 사용자에게 표시할 비치명적 알림
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// 종류
    pub kind: NoticeKind,
    /// 표시 문구
    pub message: String,
}

impl Notice {
    /// 에러로부터 알림 생성
    pub fn from_error(err: &CoreError) -> Self {
        Self {
            kind: NoticeKind::from(err),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_notices() {
        let cases = [
            (CoreError::PermissionDenied("cam".into()), NoticeKind::PermissionDenied),
            (CoreError::Network("down".into()), NoticeKind::NetworkFailure),
            (CoreError::Auth("expired".into()), NoticeKind::NetworkFailure),
            (
                CoreError::ChannelDisconnected("ws".into()),
                NoticeKind::ChannelDisconnected,
            ),
            (CoreError::InvalidResponse("bad".into()), NoticeKind::InvalidResponse),
            (CoreError::Internal("lock".into()), NoticeKind::Internal),
        ];
        for (err, kind) in cases {
            let notice = Notice::from_error(&err);
            assert_eq!(notice.kind, kind);
            assert_eq!(notice.message, err.to_string());
        }
    }
}
