//! 감독 프레임 인코더.
//!
//! 원본 RGBA 프레임을 최대 크기로 축소한 뒤 WebP로 인코딩하고
//! `data:image/webp;base64,...` 형식으로 감싼다.

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use examguard_core::config::VisionConfig;
use examguard_core::error::CoreError;
use examguard_core::models::channel::FrameOutbound;
use examguard_core::models::frame::RawFrame;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use tracing::debug;

/// data URL 접두사
pub const DATA_URL_PREFIX: &str = "data:image/webp;base64,";

/// 프레임 인코더
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    max_width: u32,
    max_height: u32,
    quality: u8,
}

impl FrameEncoder {
    pub fn new(max_width: u32, max_height: u32, quality: u8) -> Self {
        Self {
            max_width: max_width.max(1),
            max_height: max_height.max(1),
            quality: quality.min(100),
        }
    }

    pub fn from_config(config: &VisionConfig) -> Self {
        Self::new(config.frame_width, config.frame_height, config.quality)
    }

    /// 원본을 이미지로 변환하고 필요하면 비율을 유지한 채 축소
    pub fn prepare(&self, frame: &RawFrame) -> Result<RgbaImage, CoreError> {
        let image = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone())
            .ok_or_else(|| {
                CoreError::Internal(format!(
                    "프레임 버퍼 크기 불일치: {}x{}, {} bytes",
                    frame.width,
                    frame.height,
                    frame.rgba.len()
                ))
            })?;

        if frame.width <= self.max_width && frame.height <= self.max_height {
            return Ok(image);
        }

        let resized = DynamicImage::ImageRgba8(image).resize(
            self.max_width,
            self.max_height,
            FilterType::Triangle,
        );
        Ok(resized.to_rgba8())
    }

    /// WebP 바이트 인코딩
    pub fn encode_webp(&self, image: &RgbaImage) -> Vec<u8> {
        let (w, h) = (image.width(), image.height());
        let encoded = webp::Encoder::from_rgba(image, w, h).encode(self.quality as f32);
        let bytes = encoded.to_vec();
        debug!(
            "WebP 인코딩: {w}x{h} → {} bytes (품질 {})",
            bytes.len(),
            self.quality
        );
        bytes
    }

    /// 송신용 프레임 메시지 생성
    pub fn encode(&self, frame: &RawFrame) -> Result<FrameOutbound, CoreError> {
        let image = self.prepare(frame)?;
        let bytes = self.encode_webp(&image);
        Ok(FrameOutbound {
            frame: format!("{DATA_URL_PREFIX}{}", B64.encode(&bytes)),
            timestamp: frame.captured_at.timestamp_millis(),
        })
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::from_config(&VisionConfig::default())
    }
}
