//! 세션 스냅샷 저장 (SnapshotStore 포트 구현).
//!
//! 단일 키에 JSON 문서 하나를 덮어쓴다.

use async_trait::async_trait;
use examguard_core::error::CoreError;
use examguard_core::models::session::SessionSnapshot;
use examguard_core::ports::snapshot_store::SnapshotStore;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::SqliteStorage;

#[async_trait]
impl SnapshotStore for SqliteStorage {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), CoreError> {
        let data = serde_json::to_string(snapshot)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO snapshots (key, data, saved_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET data = excluded.data, saved_at = excluded.saved_at",
            params![self.snapshot_key, data, snapshot.saved_at.to_rfc3339()],
        )
        .map_err(|e| CoreError::Internal(format!("스냅샷 저장 실패: {e}")))?;
        debug!("스냅샷 기록: key={}", self.snapshot_key);
        Ok(())
    }

    async fn load(&self) -> Result<Option<SessionSnapshot>, CoreError> {
        let conn = self.lock()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM snapshots WHERE key = ?1",
                params![self.snapshot_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CoreError::Internal(format!("스냅샷 조회 실패: {e}")))?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn clear(&self) -> Result<(), CoreError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM snapshots WHERE key = ?1",
            params![self.snapshot_key],
        )
        .map_err(|e| CoreError::Internal(format!("스냅샷 삭제 실패: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use examguard_core::models::session::SessionStatus;
    use examguard_core::models::violation::{Violation, ViolationSource};

    fn snapshot(answer: Option<usize>) -> SessionSnapshot {
        SessionSnapshot {
            question_ids: vec!["q1".into(), "q2".into(), "q3".into()],
            current_index: 1,
            answers: vec![answer, None, Some(0)],
            time_remaining_secs: 3000,
            time_spent_secs: 600,
            violations: vec![Violation {
                id: 2,
                message: "Face not detected".into(),
                timestamp_ms: 1_700_000_000_500,
                source: ViolationSource::RemoteProctor,
            }],
            violation_count: 2,
            status: SessionStatus::InProgress,
            score: None,
            started_at: Utc::now(),
            ended_at: None,
            saved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_then_load_is_deep_equal() {
        let storage = SqliteStorage::open_in_memory("testState").unwrap();
        let saved = snapshot(Some(2));
        storage.save(&saved).await.unwrap();
        assert_eq!(storage.load().await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn save_overwrites_previous() {
        let storage = SqliteStorage::open_in_memory("testState").unwrap();
        storage.save(&snapshot(Some(1))).await.unwrap();
        storage.save(&snapshot(Some(3))).await.unwrap();
        let loaded = storage.load().await.unwrap().unwrap();
        assert_eq!(loaded.answers[0], Some(3));
    }

    #[tokio::test]
    async fn load_empty_and_clear() {
        let storage = SqliteStorage::open_in_memory("testState").unwrap();
        assert!(storage.load().await.unwrap().is_none());
        storage.save(&snapshot(None)).await.unwrap();
        storage.clear().await.unwrap();
        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exam.db");
        {
            let a = SqliteStorage::open(&path, "a").unwrap();
            a.save(&snapshot(Some(1))).await.unwrap();
        }
        let b = SqliteStorage::open(&path, "b").unwrap();
        assert!(b.load().await.unwrap().is_none());
        let a = SqliteStorage::open(&path, "a").unwrap();
        assert!(a.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupted_row_is_serialization_error() {
        let storage = SqliteStorage::open_in_memory("testState").unwrap();
        storage
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO snapshots (key, data, saved_at) VALUES ('testState', '{broken', '')",
                [],
            )
            .unwrap();
        assert!(matches!(
            storage.load().await,
            Err(CoreError::Serialization(_))
        ));
    }
}
