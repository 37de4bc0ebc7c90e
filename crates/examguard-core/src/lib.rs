//! # examguard-core
//!
//! ExamGuard 도메인 모델, 포트(trait), 에러 타입, 설정.
//!
//! - `models`: 문항, 세션 스냅샷, 위반, 감독 채널 메시지, 리포트
//! - `ports`: 저장소/문항 공급/제출/미디어/감독 채널 추상화
//! - `error`: `CoreError`
//! - `config`: `AppConfig`

pub mod config;
pub mod error;
pub mod models;
pub mod ports;
