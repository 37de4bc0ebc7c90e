//! 스냅샷 기록 태스크.
//!
//! 저장/로드 요청을 도착 순서대로 처리한다. 상태 머신 루프는 요청을 큐에 넣기만 하고
//! 저장소 I/O를 기다리지 않는다.

use examguard_core::error::CoreError;
use examguard_core::models::notice::Notice;
use examguard_core::models::session::SessionSnapshot;
use examguard_core::ports::snapshot_store::SnapshotStore;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// 로드 결과 수신기
pub type LoadReply = oneshot::Receiver<Result<Option<SessionSnapshot>, CoreError>>;

enum PersistOp {
    Save(Box<SessionSnapshot>),
    Load(oneshot::Sender<Result<Option<SessionSnapshot>, CoreError>>),
    Barrier(oneshot::Sender<()>),
}

/// 순서 보장 스냅샷 기록기
pub struct Persister {
    tx: mpsc::UnboundedSender<PersistOp>,
    task: JoinHandle<()>,
}

impl Persister {
    /// 기록 태스크 시작
    pub fn spawn(store: Arc<dyn SnapshotStore>, notices: broadcast::Sender<Notice>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(Self::run(store, notices, rx));
        Self { tx, task }
    }

    /// 저장 요청 (대기하지 않음)
    pub fn save(&self, snapshot: SessionSnapshot) {
        if self.tx.send(PersistOp::Save(Box::new(snapshot))).is_err() {
            warn!("스냅샷 기록 태스크 종료됨, 저장 요청 폐기");
        }
    }

    /// 로드 요청. 앞선 저장이 모두 끝난 뒤 처리된다
    pub fn load(&self) -> LoadReply {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(PersistOp::Load(reply)).is_err() {
            warn!("스냅샷 기록 태스크 종료됨, 로드 요청 폐기");
        }
        rx
    }

    /// 앞선 요청이 모두 처리되면 응답
    pub fn barrier(&self, reply: oneshot::Sender<()>) {
        let _ = self.tx.send(PersistOp::Barrier(reply));
    }

    /// 남은 요청을 모두 처리한 뒤 종료
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            error!("스냅샷 기록 태스크 비정상 종료: {e}");
        }
    }

    async fn run(
        store: Arc<dyn SnapshotStore>,
        notices: broadcast::Sender<Notice>,
        mut rx: mpsc::UnboundedReceiver<PersistOp>,
    ) {
        while let Some(op) = rx.recv().await {
            match op {
                PersistOp::Save(snapshot) => match store.save(&snapshot).await {
                    Ok(()) => debug!(
                        "스냅샷 저장: 문항 {}, 남은 시간 {}초, 상태 {}",
                        snapshot.current_index, snapshot.time_remaining_secs, snapshot.status
                    ),
                    Err(e) => {
                        error!("스냅샷 저장 실패: {e}");
                        let _ = notices.send(Notice::from_error(&e));
                    }
                },
                PersistOp::Load(reply) => {
                    let _ = reply.send(store.load().await);
                }
                PersistOp::Barrier(reply) => {
                    let _ = reply.send(());
                }
            }
        }
        debug!("스냅샷 기록 태스크 종료");
    }
}
