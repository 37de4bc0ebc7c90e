//! # examguard-storage
//!
//! 로컬 저장소 어댑터.
//! - `SqliteStorage`: 세션 스냅샷 + 분류별 문항 은행 (rusqlite)
//! - `MemorySnapshotStore`: 인메모리 스냅샷
//! - `sample`: 내장 Python 샘플 문항

pub mod memory;
pub mod migration;
pub mod sample;
pub mod sqlite;
