//! # examguard-session
//!
//! 시험 세션 상태 머신과 단일 작성자 런타임.
//!
//! - `machine`: 전이 규칙 (`ExamSession`)
//! - `violation`: 표시 목록과 누적 횟수를 분리한 위반 추적기
//! - `clock`: 1초 틱 공급원
//! - `signal`: 위반 신호 공급원 (`start` → `SignalGuard`)
//! - `persist`: 순서 보장 스냅샷 기록 태스크
//! - `runtime`: `select!` 루프 액터, `SessionHandle`
//! - `launch`: 권한 확인 → 문항 로드 → 재개 → 런타임 시작
//! - `scoring`: 채점, 결과 리포트

pub mod clock;
pub mod launch;
pub mod machine;
pub mod persist;
pub mod runtime;
pub mod scoring;
pub mod signal;
pub mod violation;

pub use launch::{LaunchRequest, SessionLauncher};
pub use machine::{CompletionReason, ExamSession, IgnoreReason, SessionSettings, Transition};
pub use runtime::{RuntimeDeps, RuntimeOptions, SessionCommand, SessionHandle, SessionView};
