//! 캡처 장치 (MediaDevice 포트 구현).
//!
//! - `ScreenFeed`: xcap 기반 주 모니터 캡처
//! - `SyntheticFeed`: 헤드리스 환경용 합성 프레임

use async_trait::async_trait;
use chrono::Utc;
use examguard_core::error::CoreError;
use examguard_core::models::frame::RawFrame;
use examguard_core::ports::media::MediaDevice;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{debug, info, warn};
use xcap::Monitor;

fn primary_monitor() -> Result<Monitor, CoreError> {
    let monitors = Monitor::all()
        .map_err(|e| CoreError::PermissionDenied(format!("모니터 목록 조회 실패: {e}")))?;

    let mut fallback = None;
    for monitor in monitors {
        if monitor.is_primary().unwrap_or(false) {
            return Ok(monitor);
        }
        fallback.get_or_insert(monitor);
    }
    fallback.ok_or_else(|| CoreError::PermissionDenied("사용 가능한 모니터 없음".to_string()))
}

fn capture_primary() -> Result<RawFrame, CoreError> {
    let image = primary_monitor()?
        .capture_image()
        .map_err(|e| CoreError::PermissionDenied(format!("스크린 캡처 실패: {e}")))?;

    let (width, height) = (image.width(), image.height());
    debug!("스크린 캡처 완료: {width}x{height}");
    Ok(RawFrame {
        width,
        height,
        rgba: image.into_raw(),
        captured_at: Utc::now(),
    })
}

/// 주 모니터 화면 캡처
#[derive(Debug, Default)]
pub struct ScreenFeed;

impl ScreenFeed {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaDevice for ScreenFeed {
    /// 시험 캡처 1회로 권한과 장치 존재를 함께 확인
    async fn request_access(&self) -> Result<(), CoreError> {
        let frame = tokio::task::spawn_blocking(capture_primary)
            .await
            .map_err(|e| CoreError::Internal(format!("캡처 태스크 실패: {e}")))??;
        if frame.width == 0 || frame.height == 0 {
            warn!("빈 캡처 프레임");
            return Err(CoreError::PermissionDenied(
                "화면 캡처 권한이 없거나 빈 화면".to_string(),
            ));
        }
        info!("화면 캡처 권한 확인: {}x{}", frame.width, frame.height);
        Ok(())
    }

    async fn capture_frame(&self) -> Result<RawFrame, CoreError> {
        tokio::task::spawn_blocking(capture_primary)
            .await
            .map_err(|e| CoreError::Internal(format!("캡처 태스크 실패: {e}")))?
    }
}

/// 합성 프레임 장치
///
/// 프레임마다 위치가 바뀌는 그라데이션을 생성한다. 권한 상태를 외부에서 바꿀 수 있다.
#[derive(Debug)]
pub struct SyntheticFeed {
    width: u32,
    height: u32,
    granted: AtomicBool,
    sequence: AtomicU32,
}

impl SyntheticFeed {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            granted: AtomicBool::new(true),
            sequence: AtomicU32::new(0),
        }
    }

    /// 권한 부여/회수
    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaDevice for SyntheticFeed {
    async fn request_access(&self) -> Result<(), CoreError> {
        if self.granted.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied("합성 장치 접근 거부".to_string()))
        }
    }

    async fn capture_frame(&self) -> Result<RawFrame, CoreError> {
        self.request_access().await?;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let (w, h) = (self.width, self.height);
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                rgba.extend_from_slice(&[
                    ((x + seq) % 256) as u8,
                    (y % 256) as u8,
                    (seq % 256) as u8,
                    255,
                ]);
            }
        }
        Ok(RawFrame {
            width: w,
            height: h,
            rgba,
            captured_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn synthetic_frames_change_each_capture() {
        let feed = SyntheticFeed::new(8, 4);
        feed.request_access().await.unwrap();

        let a = feed.capture_frame().await.unwrap();
        let b = feed.capture_frame().await.unwrap();
        assert_eq!(a.rgba.len(), 8 * 4 * 4);
        assert_ne!(a.rgba, b.rgba);
    }

    #[tokio::test]
    async fn revoked_feed_denies_access_and_capture() {
        let feed = SyntheticFeed::new(2, 2);
        feed.set_granted(false);
        assert!(matches!(
            feed.request_access().await,
            Err(CoreError::PermissionDenied(_))
        ));
        assert!(feed.capture_frame().await.is_err());

        feed.set_granted(true);
        assert!(feed.request_access().await.is_ok());
    }
}
