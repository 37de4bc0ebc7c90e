//! 도메인 모델.

pub mod channel;
pub mod frame;
pub mod notice;
pub mod question;
pub mod report;
pub mod session;
pub mod submission;
pub mod violation;
