//! 연결 상태 감시.
//!
//! 서버 헬스 체크 결과로 온라인/오프라인을 판정하고 `watch`로 알린다.
//! 연속 실패가 임계값에 닿으면 오프라인, 첫 성공에서 온라인.

use async_trait::async_trait;
use examguard_core::error::CoreError;
use examguard_core::models::session::Connectivity;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 서버 도달 가능성 확인
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<(), CoreError>;
}

/// 연결 상태 감시기
pub struct ConnectivityMonitor {
    /// 연속 실패 횟수
    failure_count: AtomicU64,
    /// 상태 변경 브로드캐스트
    status_tx: watch::Sender<Connectivity>,
    /// 오프라인 전환 임계값 (연속 실패 횟수)
    offline_threshold: u64,
    /// 강제 오프라인 모드
    force_offline: AtomicBool,
}

impl ConnectivityMonitor {
    /// `offline_threshold`: 이 횟수만큼 연속 실패하면 오프라인 전환
    pub fn new(offline_threshold: u64) -> Self {
        let (status_tx, _) = watch::channel(Connectivity::Online);
        Self {
            failure_count: AtomicU64::new(0),
            status_tx,
            offline_threshold: offline_threshold.max(1),
            force_offline: AtomicBool::new(false),
        }
    }

    /// 강제 오프라인 모드 설정. 해제해도 다음 성공 기록 전까지는 오프라인 유지
    pub fn set_force_offline(&self, force: bool) {
        self.force_offline.store(force, Ordering::Relaxed);
        if force {
            info!("강제 오프라인 모드 활성화");
            self.publish(Connectivity::Offline);
        } else {
            info!("강제 오프라인 모드 해제");
        }
    }

    /// 강제 오프라인 모드 여부
    pub fn is_force_offline(&self) -> bool {
        self.force_offline.load(Ordering::Relaxed)
    }

    /// 현재 상태
    pub fn status(&self) -> Connectivity {
        *self.status_tx.borrow()
    }

    /// 현재 온라인 여부
    pub fn is_online(&self) -> bool {
        self.status() == Connectivity::Online
    }

    /// 상태 변경 수신기 생성
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.status_tx.subscribe()
    }

    /// 연결 성공 기록
    pub fn record_success(&self) {
        if self.is_force_offline() {
            return;
        }
        self.failure_count.store(0, Ordering::Relaxed);
        if !self.is_online() {
            info!("서버 연결 복구됨 - 온라인 모드");
            self.publish(Connectivity::Online);
        }
    }

    /// 연결 실패 기록
    pub fn record_failure(&self) {
        if self.is_force_offline() {
            return;
        }
        let count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("연결 실패 기록 (연속 {count}회)");

        if count >= self.offline_threshold && self.is_online() {
            warn!("연속 {count}회 실패 - 오프라인 모드 전환");
            self.publish(Connectivity::Offline);
        }
    }

    /// 연속 실패 횟수
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    fn publish(&self, status: Connectivity) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    /// 주기적 헬스 체크 루프. `shutdown`이 true가 되면 종료
    pub async fn run_probe(
        self: Arc<Self>,
        probe: Arc<dyn HealthProbe>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!("연결 상태 감시 시작 (간격 {interval:?})");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match probe.ping().await {
                        Ok(()) => self.record_success(),
                        Err(e) => {
                            debug!("헬스 체크 실패: {e}");
                            self.record_failure();
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("연결 상태 감시 종료");
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(2)
    }
}
