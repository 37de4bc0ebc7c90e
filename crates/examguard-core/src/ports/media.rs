//! 미디어 캡처 포트.
//!
//! 구현: `examguard-vision` crate (xcap 화면 캡처, 합성 프레임)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::frame::RawFrame;

/// 캡처 장치
#[async_trait]
pub trait MediaDevice: Send + Sync {
    /// 접근 권한 요청. 거부 시 `CoreError::PermissionDenied`
    async fn request_access(&self) -> Result<(), CoreError>;

    /// 현재 프레임 캡처
    async fn capture_frame(&self) -> Result<RawFrame, CoreError>;
}
