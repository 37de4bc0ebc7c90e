//! # examguard-vision
//!
//! 감독용 프레임 처리.
//! - `capture`: `MediaDevice` 포트 구현 (xcap 화면 캡처, 합성 프레임)
//! - `encoder`: 리사이즈 + WebP 인코딩 + data URL 변환
//! - `frame_pump`: 채널이 연결된 동안 주기적으로 프레임 송신

pub mod capture;
pub mod encoder;
pub mod frame_pump;
