//! 캡처 원본 프레임.

use chrono::{DateTime, Utc};

/// RGBA8 원본 프레임
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// 너비 (px)
    pub width: u32,
    /// 높이 (px)
    pub height: u32,
    /// RGBA 픽셀 (width * height * 4 바이트)
    pub rgba: Vec<u8>,
    /// 캡처 시각
    pub captured_at: DateTime<Utc>,
}
