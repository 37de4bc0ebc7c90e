//! 감독 채널 메시지.
//!
//! 채널 경계에서 태그된 변형으로 검증한다. 형식이 맞지 않는 수신 메시지는 폐기.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 감독 채널 메시지 (`type` 태그)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelMessage {
    /// 송신: 현재 프레임
    VideoFrame(FrameOutbound),
    /// 수신: 감독 탐지 알림
    ProctoringAlert(AlertInbound),
}

/// 송신 프레임
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameOutbound {
    /// `data:image/...;base64,` 형식 이미지
    pub frame: String,
    /// 캡처 시각 (Unix ms)
    pub timestamp: i64,
}

/// 수신 알림
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertInbound {
    /// 탐지 내용 (예: "Face not detected")
    pub message: String,
    /// true일 때만 위반으로 기록
    pub warning: bool,
}

impl AlertInbound {
    /// 수신 텍스트를 알림으로 파싱
    ///
    /// `{"type":"proctoring_alert",...}` 태그 형식과 태그 없는 `{message, warning}` 형식을 모두 허용.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let alert = match serde_json::from_str::<ChannelMessage>(text) {
            Ok(ChannelMessage::ProctoringAlert(alert)) => alert,
            Ok(ChannelMessage::VideoFrame(_)) => {
                return Err(CoreError::InvalidResponse(
                    "수신 방향에 video_frame 메시지".to_string(),
                ))
            }
            Err(_) => serde_json::from_str::<AlertInbound>(text)
                .map_err(|e| CoreError::InvalidResponse(format!("알림 형식 오류: {e}")))?,
        };
        if alert.message.trim().is_empty() {
            return Err(CoreError::InvalidResponse("알림 메시지가 비어 있음".to_string()));
        }
        Ok(alert)
    }
}

/// 감독 채널 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// 시작 전 또는 비활성
    Idle,
    /// 최초 연결 중
    Connecting,
    /// 연결됨
    Connected,
    /// 재연결 대기 중
    Reconnecting {
        /// 재시도 회차 (1부터)
        attempt: u32,
    },
    /// 재연결 시도 소진
    Failed,
    /// 정상 종료
    Closed,
}

impl ChannelState {
    /// 프레임 송신 가능 여부
    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelState::Connected)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::Idle => write!(f, "Idle"),
            ChannelState::Connecting => write!(f, "Connecting"),
            ChannelState::Connected => write!(f, "Connected"),
            ChannelState::Reconnecting { attempt } => write!(f, "Reconnecting({attempt})"),
            ChannelState::Failed => write!(f, "Failed"),
            ChannelState::Closed => write!(f, "Closed"),
        }
    }
}
