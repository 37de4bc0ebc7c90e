//! 내부 이벤트 버스.
//!
//! `tokio::broadcast` 기반. 세션/채널/연결 상태와 알림을 콘솔 출력으로 모은다.

use examguard_core::models::channel::ChannelState;
use examguard_core::models::notice::Notice;
use examguard_core::models::session::Connectivity;
use examguard_session::SessionView;
use tokio::sync::broadcast;
use tracing::debug;

/// 내부 앱 이벤트
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// 세션 상태의 표시할 만한 변경
    SessionChanged(Box<SessionView>),
    /// 비치명적 알림
    Notice(Notice),
    /// 감독 채널 상태 변경
    ChannelChanged(ChannelState),
    /// 서버 연결 상태 변경
    ConnectivityChanged(Connectivity),
}

/// 내부 이벤트 버스
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// 새 이벤트 버스 생성
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 이벤트 발행
    pub fn publish(&self, event: AppEvent) {
        debug!("이벤트 발행: {:?}", std::mem::discriminant(&event));
        let _ = self.tx.send(event);
    }

    /// 구독자 생성
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(128)
    }
}
