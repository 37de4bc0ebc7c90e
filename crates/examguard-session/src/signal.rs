//! 위반 신호 공급원.
//!
//! 각 공급원은 `start`로 수신 태스크를 띄우고 `SignalGuard`를 돌려준다.
//! 가드를 `stop`하거나 드롭하면 태스크가 즉시 중단된다.

use examguard_core::models::channel::AlertInbound;
use examguard_core::models::violation::ViolationSource;
use examguard_core::ports::proctor_channel::ProctorChannel;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 공급원이 상태 머신으로 보내는 위반 신호
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEvent {
    /// 표시 문구
    pub message: String,
    /// 출처
    pub source: ViolationSource,
}

impl SignalEvent {
    /// 로컬 공급원의 고정 문구로 생성
    pub fn local(source: ViolationSource) -> Option<Self> {
        source.default_message().map(|message| Self {
            message: message.to_string(),
            source,
        })
    }
}

/// 위반 신호 공급원
pub trait SignalSource: Send + Sync {
    /// 로그용 이름
    fn name(&self) -> &'static str;

    /// 수신 시작. 반환된 가드가 살아 있는 동안만 `sink`로 신호를 보낸다
    fn start(&self, sink: mpsc::Sender<SignalEvent>) -> SignalGuard;
}

/// 공급원 해제 가드
#[derive(Debug)]
pub struct SignalGuard {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl SignalGuard {
    /// 태스크를 감싸는 가드 생성
    pub fn new(name: &'static str, handle: JoinHandle<()>) -> Self {
        Self {
            name,
            handle: Some(handle),
        }
    }

    /// 명시적 해제
    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("신호 공급원 해제: {}", self.name);
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.abort();
    }
}

// ============================================================
// 호스트 창 이벤트
// ============================================================

/// 호스트 창(브라우저 문서/데스크톱 창) 이벤트
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostWindowEvent {
    /// 문서 숨김 (탭 전환)
    Hidden,
    /// 문서 다시 보임
    Visible,
    /// 포커스 상실
    Blur,
    /// 포커스 획득
    Focus,
    /// 포인터가 창 밖으로
    PointerLeave,
    /// 포인터가 창 안으로
    PointerEnter,
}

impl HostWindowEvent {
    /// 위반에 해당하는 이벤트의 출처
    pub fn violation_source(&self) -> Option<ViolationSource> {
        match self {
            HostWindowEvent::Hidden => Some(ViolationSource::DocumentHidden),
            HostWindowEvent::Blur => Some(ViolationSource::WindowBlur),
            HostWindowEvent::PointerLeave => Some(ViolationSource::PointerLeave),
            HostWindowEvent::Visible | HostWindowEvent::Focus | HostWindowEvent::PointerEnter => {
                None
            }
        }
    }
}

/// 호스트 창 이벤트를 위반 신호로 변환하는 공급원
pub struct HostWindowSource {
    events: broadcast::Sender<HostWindowEvent>,
}

impl HostWindowSource {
    /// 이벤트 버스 크기를 지정해 생성
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { events }
    }

    /// 호스트 이벤트 주입 (UI 드라이버가 호출)
    pub fn emit(&self, event: HostWindowEvent) {
        let _ = self.events.send(event);
    }

    /// 이벤트 송신기 복제
    pub fn sender(&self) -> broadcast::Sender<HostWindowEvent> {
        self.events.clone()
    }
}

impl Default for HostWindowSource {
    fn default() -> Self {
        Self::new(64)
    }
}

impl SignalSource for HostWindowSource {
    fn name(&self) -> &'static str {
        "host-window"
    }

    fn start(&self, sink: mpsc::Sender<SignalEvent>) -> SignalGuard {
        let mut rx = self.events.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let Some(signal) = event.violation_source().and_then(SignalEvent::local)
                        else {
                            continue;
                        };
                        if sink.send(signal).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => warn!("호스트 창 이벤트 {n}개 누락"),
                    Err(RecvError::Closed) => break,
                }
            }
        });
        SignalGuard::new(self.name(), handle)
    }
}

// ============================================================
// 원격 감독 알림
// ============================================================

/// 감독 채널 알림 중 `warning == true`만 위반으로 전달하는 공급원
pub struct RemoteAlertSource {
    channel: Arc<dyn ProctorChannel>,
}

impl RemoteAlertSource {
    /// 감독 채널로부터 생성
    pub fn new(channel: Arc<dyn ProctorChannel>) -> Self {
        Self { channel }
    }
}

/// 알림을 위반 신호로 변환. 경고가 아니면 None
pub fn alert_to_signal(alert: AlertInbound) -> Option<SignalEvent> {
    alert.warning.then(|| SignalEvent {
        message: alert.message,
        source: ViolationSource::RemoteProctor,
    })
}

impl SignalSource for RemoteAlertSource {
    fn name(&self) -> &'static str {
        "remote-proctor"
    }

    fn start(&self, sink: mpsc::Sender<SignalEvent>) -> SignalGuard {
        let mut rx = self.channel.subscribe_alerts();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(alert) => {
                        debug!("감독 알림 수신: {} (warning={})", alert.message, alert.warning);
                        let Some(signal) = alert_to_signal(alert) else {
                            continue;
                        };
                        if sink.send(signal).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => warn!("감독 알림 {n}개 누락"),
                    Err(RecvError::Closed) => break,
                }
            }
        });
        SignalGuard::new(self.name(), handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use examguard_core::error::CoreError;
    use examguard_core::models::channel::{ChannelState, FrameOutbound};
    use std::time::Duration;
    use tokio::sync::watch;

    struct FakeChannel {
        alerts: broadcast::Sender<AlertInbound>,
        state: watch::Sender<ChannelState>,
    }

    #[async_trait]
    impl ProctorChannel for FakeChannel {
        fn state(&self) -> watch::Receiver<ChannelState> {
            self.state.subscribe()
        }
        fn subscribe_alerts(&self) -> broadcast::Receiver<AlertInbound> {
            self.alerts.subscribe()
        }
        async fn send_frame(&self, _frame: &FrameOutbound) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn host_window_maps_only_violating_events() {
        let source = HostWindowSource::default();
        let (tx, mut rx) = mpsc::channel(8);
        let _guard = source.start(tx);

        source.emit(HostWindowEvent::Focus);
        source.emit(HostWindowEvent::Blur);
        source.emit(HostWindowEvent::Visible);
        source.emit(HostWindowEvent::Hidden);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.source, ViolationSource::WindowBlur);
        assert_eq!(
            first.message,
            "Test window lost focus. This action has been recorded."
        );
        let second = rx.recv().await.unwrap();
        assert_eq!(second.source, ViolationSource::DocumentHidden);
    }

    #[tokio::test]
    async fn remote_source_passes_only_warnings() {
        let (alerts, _) = broadcast::channel(8);
        let (state, _) = watch::channel(ChannelState::Connected);
        let channel = Arc::new(FakeChannel {
            alerts: alerts.clone(),
            state,
        });
        let source = RemoteAlertSource::new(channel);
        let (tx, mut rx) = mpsc::channel(8);
        let _guard = source.start(tx);

        alerts
            .send(AlertInbound {
                message: "Face detected".into(),
                warning: false,
            })
            .unwrap();
        alerts
            .send(AlertInbound {
                message: "Multiple faces detected".into(),
                warning: true,
            })
            .unwrap();

        let signal = rx.recv().await.unwrap();
        assert_eq!(signal.message, "Multiple faces detected");
        assert_eq!(signal.source, ViolationSource::RemoteProctor);
    }

    #[tokio::test]
    async fn stopped_guard_delivers_nothing() {
        let source = HostWindowSource::default();
        let (tx, mut rx) = mpsc::channel(8);
        let guard = source.start(tx);
        guard.stop();
        tokio::task::yield_now().await;

        source.emit(HostWindowEvent::Blur);
        let result = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        // 태스크가 중단되면 송신기가 드롭되어 채널이 닫힌다
        assert!(matches!(result, Ok(None) | Err(_)));
    }
}
