//! 원격 감독 WebSocket 채널.
//!
//! `tokio-tungstenite` 기반 자동 재연결 채널. `ProctorChannel` 포트 구현.
//! 수신 메시지는 경계에서 `AlertInbound`로 검증하고, 형식 오류는 로그 후 폐기한다.

use async_trait::async_trait;
use examguard_core::config::ChannelConfig;
use examguard_core::error::CoreError;
use examguard_core::models::channel::{AlertInbound, ChannelMessage, ChannelState, FrameOutbound};
use examguard_core::ports::proctor_channel::ProctorChannel;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 송신 대기열 크기. 가득 차면 프레임을 버린다
const OUTBOUND_CAPACITY: usize = 8;

/// 재연결 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// 첫 재연결 대기
    pub initial: Duration,
    /// 대기 상한
    pub max_delay: Duration,
    /// 최대 재연결 시도 횟수
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.reconnect_initial_ms),
            max_delay: Duration::from_millis(config.reconnect_max_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }

    /// `attempt`번째(1부터) 재연결 전 대기 시간
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ChannelConfig::default())
    }
}

/// 감독 채널 클라이언트
pub struct ProctorChannelClient {
    url: String,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ChannelState>,
    alerts: broadcast::Sender<AlertInbound>,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
}

impl ProctorChannelClient {
    /// 새 채널 클라이언트 생성. 연결은 `run`에서 시작
    pub fn new(url: &str, policy: ReconnectPolicy) -> Result<Self, CoreError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| CoreError::Config(format!("잘못된 감독 채널 URL '{url}': {e}")))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(CoreError::Config(format!(
                "감독 채널 URL은 ws/wss 스킴이어야 함: {url}"
            )));
        }

        let (state_tx, _) = watch::channel(ChannelState::Idle);
        let (alerts, _) = broadcast::channel(64);
        Ok(Self {
            url: url.to_string(),
            policy,
            state_tx,
            alerts,
            outbound: Mutex::new(None),
        })
    }

    /// 현재 상태
    pub fn current_state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ChannelState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!("감독 채널 상태: {previous} → {state}");
        }
    }

    /// 연결 유지 루프. 재연결 시도를 소진하면 `Failed`, 종료 신호면 `Closed`로 끝난다
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut attempt: u32 = 0;
        self.set_state(ChannelState::Connecting);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let connected = tokio::select! {
                result = tokio_tungstenite::connect_async(self.url.as_str()) => result,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok((stream, _)) => {
                    attempt = 0;
                    if self.serve(stream, &mut shutdown).await {
                        break;
                    }
                    warn!("감독 채널 연결 끊김");
                }
                Err(e) => warn!("감독 채널 연결 실패: {e}"),
            }

            attempt += 1;
            if attempt > self.policy.max_attempts {
                error!(
                    "감독 채널 재연결 {}회 실패, 재시도 중단",
                    self.policy.max_attempts
                );
                self.set_state(ChannelState::Failed);
                return;
            }

            self.set_state(ChannelState::Reconnecting { attempt });
            let delay = self.policy.delay_for(attempt);
            debug!("{delay:?} 후 재연결 (시도 {attempt}/{})", self.policy.max_attempts);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.set_state(ChannelState::Closed);
    }

    /// 연결 하나를 끝날 때까지 처리. 종료 신호로 끝났으면 true
    async fn serve(&self, stream: WsStream, shutdown: &mut watch::Receiver<bool>) -> bool {
        let (mut write, mut read) = stream.split();
        let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
        *self.outbound.lock() = Some(tx);
        self.set_state(ChannelState::Connected);

        let shutdown_requested = loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => break false,
                    Some(Ok(_)) => {} // Ping/Pong은 자동 처리
                    Some(Err(e)) => {
                        warn!("감독 채널 수신 에러: {e}");
                        break false;
                    }
                },
                Some(out) = rx.recv() => {
                    if let Err(e) = write.send(Message::Text(out.into())).await {
                        warn!("감독 채널 전송 실패: {e}");
                        break false;
                    }
                }
                _ = shutdown.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    break true;
                }
            }
        };

        *self.outbound.lock() = None;
        shutdown_requested
    }

    fn handle_text(&self, text: &str) {
        match AlertInbound::parse(text) {
            Ok(alert) => {
                debug!("감독 알림: {} (warning={})", alert.message, alert.warning);
                let _ = self.alerts.send(alert);
            }
            Err(e) => warn!("감독 채널 메시지 폐기: {e}"),
        }
    }
}

#[async_trait]
impl ProctorChannel for ProctorChannelClient {
    fn state(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    fn subscribe_alerts(&self) -> broadcast::Receiver<AlertInbound> {
        self.alerts.subscribe()
    }

    async fn send_frame(&self, frame: &FrameOutbound) -> Result<(), CoreError> {
        let tx = self.outbound.lock().clone();
        let Some(tx) = tx else {
            return Err(CoreError::ChannelDisconnected(format!(
                "감독 채널 미연결 ({})",
                self.current_state()
            )));
        };

        let json = serde_json::to_string(&ChannelMessage::VideoFrame(frame.clone()))?;
        match tx.try_send(json) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                debug!("송신 대기열 가득 참, 프레임 폐기");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(CoreError::ChannelDisconnected(
                "감독 채널 송신 종료됨".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            initial: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            max_attempts,
        }
    }

    async fn wait_for_state(
        rx: &mut watch::Receiver<ChannelState>,
        pred: impl Fn(&ChannelState) -> bool,
    ) -> ChannelState {
        let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| pred(s)))
            .await
            .expect("상태 대기 시간 초과")
            .expect("상태 송신기 종료");
        *state
    }

    #[test]
    fn policy_doubles_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn rejects_non_ws_url() {
        assert!(matches!(
            ProctorChannelClient::new("http://localhost:5000", ReconnectPolicy::default()),
            Err(CoreError::Config(_))
        ));
    }

    #[tokio::test]
    async fn send_frame_while_idle_is_disconnected() {
        let client =
            ProctorChannelClient::new("ws://127.0.0.1:9/ws", ReconnectPolicy::default()).unwrap();
        let frame = FrameOutbound {
            frame: "data:image/webp;base64,AAAA".into(),
            timestamp: 1,
        };
        assert!(matches!(
            client.send_frame(&frame).await,
            Err(CoreError::ChannelDisconnected(_))
        ));
    }

    #[tokio::test]
    async fn exhausted_reconnects_end_in_failed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = Arc::new(
            ProctorChannelClient::new(&format!("ws://{addr}/ws"), fast_policy(2)).unwrap(),
        );
        let mut state = client.state();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(client.clone().run(shutdown_rx));

        let last = wait_for_state(&mut state, |s| *s == ChannelState::Failed).await;
        assert_eq!(last, ChannelState::Failed);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn exchanges_frames_and_alerts_with_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frame_tx, frame_rx) = tokio::sync::oneshot::channel::<String>();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Text(String::from("not json").into())).await.unwrap();
            ws.send(Message::Text(
                String::from(
                    r#"{"type":"proctoring_alert","message":"Face not detected","warning":true}"#,
                )
                .into(),
            ))
            .await
            .unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    let _ = frame_tx.send(text.to_string());
                    break;
                }
            }
            let _ = ws.close(None).await;
        });

        let client = Arc::new(
            ProctorChannelClient::new(&format!("ws://{addr}/ws"), fast_policy(0)).unwrap(),
        );
        let mut alerts = client.subscribe_alerts();
        let mut state = client.state();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(client.clone().run(shutdown_rx));

        wait_for_state(&mut state, |s| s.is_connected()).await;
        client
            .send_frame(&FrameOutbound {
                frame: "data:image/webp;base64,UklGRg==".into(),
                timestamp: 1_700_000_000_000,
            })
            .await
            .unwrap();

        let alert = tokio::time::timeout(Duration::from_secs(5), alerts.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alert.message, "Face not detected");
        assert!(alert.warning);

        let sent = tokio::time::timeout(Duration::from_secs(5), frame_rx)
            .await
            .unwrap()
            .unwrap();
        let parsed: ChannelMessage = serde_json::from_str(&sent).unwrap();
        assert!(matches!(parsed, ChannelMessage::VideoFrame(f) if f.timestamp == 1_700_000_000_000));

        server.await.unwrap();
        // 서버가 닫고 재시도 0회이므로 Failed로 끝난다
        wait_for_state(&mut state, |s| *s == ChannelState::Failed).await;
        let _ = shutdown_tx.send(true);
        task.await.unwrap();
    }
}
