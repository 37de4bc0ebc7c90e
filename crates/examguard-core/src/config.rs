//! 애플리케이션 설정 구조체.
//!
//! 서버 URL, 시험 세션 정책(시간 예산, 위반 한도), 감독 채널 재연결 정책,
//! 저장소 경로 등 런타임 설정을 정의한다. `config` crate를 통해 파일/환경변수에서 로드.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 서버 연결 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 시험 세션 정책
    #[serde(default)]
    pub session: SessionConfig,
    /// 감독 채널 설정
    #[serde(default)]
    pub channel: ChannelConfig,
    /// 로컬 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// 감독 프레임 설정
    #[serde(default)]
    pub vision: VisionConfig,
    /// 연결 상태 감시 설정
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
}

// ============================================================
// 서버
// ============================================================

/// 서버 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// REST API 기본 URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 요청 타임아웃 (ms)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 재시도 가능한 실패에 대한 최대 재시도 횟수
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Bearer 토큰 (없으면 인증 헤더 생략)
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            auth_token: None,
        }
    }
}

// ============================================================
// 세션 정책
// ============================================================

/// 시험 세션 정책
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 시간 예산 (초)
    #[serde(default = "default_time_budget_secs")]
    pub time_budget_secs: u64,
    /// 누적 위반 한도. 도달 시 세션 강제 종료
    #[serde(default = "default_violation_limit")]
    pub violation_limit: u32,
    /// 경고 표시 유지 시간 (초)
    #[serde(default = "default_warning_display_secs")]
    pub warning_display_secs: u64,
    /// 주기적 스냅샷 저장 간격 (ms)
    #[serde(default = "default_autosave_interval_ms")]
    pub autosave_interval_ms: u64,
    /// 시계 틱 간격 (ms)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// 로드 시 문항 순서 섞기
    #[serde(default = "default_true")]
    pub shuffle_questions: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            time_budget_secs: default_time_budget_secs(),
            violation_limit: default_violation_limit(),
            warning_display_secs: default_warning_display_secs(),
            autosave_interval_ms: default_autosave_interval_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            shuffle_questions: true,
        }
    }
}

impl SessionConfig {
    /// 세션 시작 전 정책 검증. 0인 시간 예산, 한도, 간격은 거부한다
    pub fn validate(&self) -> Result<(), CoreError> {
        let checks: [(&str, u64); 4] = [
            ("time_budget_secs", self.time_budget_secs),
            ("violation_limit", u64::from(self.violation_limit)),
            ("tick_interval_ms", self.tick_interval_ms),
            ("autosave_interval_ms", self.autosave_interval_ms),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(CoreError::Config(format!("{field}는 1 이상이어야 합니다")));
            }
        }
        Ok(())
    }
}

// ============================================================
// 감독 채널
// ============================================================

/// 감독 채널(WebSocket) 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// 채널 사용 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// WebSocket URL. 없으면 `server.base_url`에서 유도
    #[serde(default)]
    pub ws_url: Option<String>,
    /// 프레임 전송 간격 (ms)
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// 첫 재연결 대기 (ms)
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    /// 재연결 대기 상한 (ms)
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    /// 최대 재연결 시도 횟수
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ws_url: None,
            frame_interval_ms: default_frame_interval_ms(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

// ============================================================
// 저장소
// ============================================================

/// 로컬 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite 파일 경로. 없으면 데이터 디렉토리 기본값 사용
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// 스냅샷 저장 키
    #[serde(default = "default_snapshot_key")]
    pub snapshot_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            snapshot_key: default_snapshot_key(),
        }
    }
}

// ============================================================
// 감독 프레임
// ============================================================

/// 프레임 캡처 장치 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureDevice {
    /// 주 모니터 화면
    #[default]
    Screen,
    /// 합성 프레임 (헤드리스 환경)
    Synthetic,
}

/// 감독 프레임 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// 캡처 장치
    #[serde(default)]
    pub device: CaptureDevice,
    /// 전송 프레임 최대 너비
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    /// 전송 프레임 최대 높이
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
    /// WebP 품질 (0~100)
    #[serde(default = "default_frame_quality")]
    pub quality: u8,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            device: CaptureDevice::default(),
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            quality: default_frame_quality(),
        }
    }
}

// ============================================================
// 연결 상태 감시
// ============================================================

/// 연결 상태 감시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// 서버 헬스 체크 간격 (ms)
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// 오프라인 전환 임계값 (연속 실패 횟수)
    #[serde(default = "default_offline_threshold")]
    pub offline_threshold: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: default_probe_interval_ms(),
            offline_threshold: default_offline_threshold(),
        }
    }
}

impl AppConfig {
    /// 기본 설정 생성
    pub fn default_config() -> Self {
        Self::default()
    }

    /// 설정값 검증. 0 값 간격/한도는 세션을 구동할 수 없다
    pub fn validate(&self) -> Result<(), CoreError> {
        let checks: [(&str, u64); 6] = [
            ("session.time_budget_secs", self.session.time_budget_secs),
            ("session.violation_limit", u64::from(self.session.violation_limit)),
            ("session.autosave_interval_ms", self.session.autosave_interval_ms),
            ("session.tick_interval_ms", self.session.tick_interval_ms),
            ("channel.frame_interval_ms", self.channel.frame_interval_ms),
            ("connectivity.probe_interval_ms", self.connectivity.probe_interval_ms),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(CoreError::Validation {
                    field: field.to_string(),
                    message: "0보다 커야 합니다".to_string(),
                });
            }
        }
        if self.channel.reconnect_max_ms < self.channel.reconnect_initial_ms {
            return Err(CoreError::Validation {
                field: "channel.reconnect_max_ms".to_string(),
                message: "reconnect_initial_ms 이상이어야 합니다".to_string(),
            });
        }
        if self.vision.quality > 100 {
            return Err(CoreError::Validation {
                field: "vision.quality".to_string(),
                message: "0~100 범위여야 합니다".to_string(),
            });
        }
        Ok(())
    }

    /// HTTP 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    /// 시계 틱 간격
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.session.tick_interval_ms)
    }

    /// 주기적 저장 간격
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.session.autosave_interval_ms)
    }

    /// 경고 표시 유지 시간
    pub fn warning_display(&self) -> Duration {
        Duration::from_secs(self.session.warning_display_secs)
    }

    /// 프레임 전송 간격
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.channel.frame_interval_ms)
    }

    /// 헬스 체크 간격
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.connectivity.probe_interval_ms)
    }

    /// 감독 채널 WebSocket URL
    ///
    /// 명시값이 없으면 `http(s)://` → `ws(s)://` 치환 후 `/ws/proctor` 경로를 붙인다.
    pub fn channel_url(&self) -> String {
        if let Some(url) = &self.channel.ws_url {
            return url.clone();
        }
        let base = self
            .server
            .base_url
            .trim_end_matches('/')
            .replace("https://", "wss://")
            .replace("http://", "ws://");
        format!("{base}/ws/proctor")
    }
}

fn default_true() -> bool {
    true
}
fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_time_budget_secs() -> u64 {
    3600
}
fn default_violation_limit() -> u32 {
    5
}
fn default_warning_display_secs() -> u64 {
    5
}
fn default_autosave_interval_ms() -> u64 {
    5_000
}
fn default_tick_interval_ms() -> u64 {
    1_000
}
fn default_frame_interval_ms() -> u64 {
    1_000
}
fn default_reconnect_initial_ms() -> u64 {
    1_000
}
fn default_reconnect_max_ms() -> u64 {
    5_000
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_snapshot_key() -> String {
    "testState".to_string()
}
fn default_frame_width() -> u32 {
    640
}
fn default_frame_height() -> u32 {
    480
}
fn default_frame_quality() -> u8 {
    75
}
fn default_probe_interval_ms() -> u64 {
    5_000
}
fn default_offline_threshold() -> u64 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn session_defaults_are_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_session_intervals_are_rejected() {
        let tick = SessionConfig {
            tick_interval_ms: 0,
            ..SessionConfig::default()
        };
        assert_matches!(tick.validate(), Err(CoreError::Config(m)) if m.contains("tick_interval_ms"));

        let autosave = SessionConfig {
            autosave_interval_ms: 0,
            ..SessionConfig::default()
        };
        assert_matches!(autosave.validate(), Err(CoreError::Config(_)));

        let budget = SessionConfig {
            time_budget_secs: 0,
            ..SessionConfig::default()
        };
        assert_matches!(budget.validate(), Err(CoreError::Config(_)));
    }
}
