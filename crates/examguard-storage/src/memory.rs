//! 인메모리 스냅샷 저장소.
//!
//! 직렬화된 JSON 문서 하나를 보관한다. 프로세스 재시작 간에는 유지되지 않는다.

use async_trait::async_trait;
use examguard_core::error::CoreError;
use examguard_core::models::session::SessionSnapshot;
use examguard_core::ports::snapshot_store::SnapshotStore;
use parking_lot::Mutex;

/// 메모리 기반 `SnapshotStore`
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 원문 (진단용)
    pub fn raw(&self) -> Option<String> {
        self.slot.lock().clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), CoreError> {
        let json = serde_json::to_string(snapshot)?;
        *self.slot.lock() = Some(json);
        Ok(())
    }

    async fn load(&self) -> Result<Option<SessionSnapshot>, CoreError> {
        let raw = self.slot.lock().clone();
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn clear(&self) -> Result<(), CoreError> {
        *self.slot.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use examguard_core::models::session::SessionStatus;

    #[tokio::test]
    async fn stores_latest_snapshot() {
        let store = MemorySnapshotStore::new();
        assert!(store.load().await.unwrap().is_none());

        let snapshot = SessionSnapshot {
            question_ids: vec!["a".into(), "b".into()],
            current_index: 0,
            answers: vec![None, Some(1)],
            time_remaining_secs: 10,
            time_spent_secs: 5,
            violations: vec![],
            violation_count: 0,
            status: SessionStatus::Completed,
            score: Some(1),
            started_at: Utc::now(),
            ended_at: Some(Utc::now()),
            saved_at: Utc::now(),
        };
        store.save(&snapshot).await.unwrap();
        assert!(store.raw().unwrap().contains("\"completed\""));
        assert_eq!(store.load().await.unwrap(), Some(snapshot));

        store.clear().await.unwrap();
        assert!(store.raw().is_none());
    }
}
