//! 포트(trait) 정의.
//!
//! 어댑터 crate가 구현하고, 앱 crate가 `Arc<dyn T>`로 주입한다.

pub mod media;
pub mod proctor_channel;
pub mod question_source;
pub mod snapshot_store;
pub mod submission;
