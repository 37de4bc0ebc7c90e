//! 세션 스냅샷 저장소 포트.
//!
//! 구현: `examguard-storage` crate (rusqlite, 메모리)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::session::SessionSnapshot;

/// 단일 이름의 스냅샷을 보관하는 키-값 저장소
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// 스냅샷 저장 (기존 값 덮어쓰기)
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), CoreError>;

    /// 마지막 저장 스냅샷 로드
    async fn load(&self) -> Result<Option<SessionSnapshot>, CoreError>;

    /// 저장된 스냅샷 삭제
    async fn clear(&self) -> Result<(), CoreError>;
}
