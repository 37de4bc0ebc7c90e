//! 감독 프레임 송신 루프.
//!
//! 채널이 `Connected`일 때만 주기마다 캡처 → 인코딩 → 송신한다.
//! 연결이 끊기거나 재연결을 포기하면 `ChannelDisconnected` 알림을 게시한다.
//! 채널 상태는 세션 상태에 영향을 주지 않는다.

use examguard_core::error::CoreError;
use examguard_core::models::channel::ChannelState;
use examguard_core::models::notice::{Notice, NoticeKind};
use examguard_core::ports::media::MediaDevice;
use examguard_core::ports::proctor_channel::ProctorChannel;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::encoder::FrameEncoder;

/// 프레임 송신기
pub struct FramePump {
    media: Arc<dyn MediaDevice>,
    channel: Arc<dyn ProctorChannel>,
    encoder: FrameEncoder,
    interval: Duration,
    notices: Option<broadcast::Sender<Notice>>,
}

impl FramePump {
    pub fn new(
        media: Arc<dyn MediaDevice>,
        channel: Arc<dyn ProctorChannel>,
        encoder: FrameEncoder,
        interval: Duration,
    ) -> Self {
        Self {
            media,
            channel,
            encoder,
            interval,
            notices: None,
        }
    }

    /// 채널 단절 알림을 게시할 스트림 지정
    pub fn with_notices(mut self, notices: broadcast::Sender<Notice>) -> Self {
        self.notices = Some(notices);
        self
    }

    fn notify(&self, message: String) {
        if let Some(tx) = &self.notices {
            let _ = tx.send(Notice {
                kind: NoticeKind::ChannelDisconnected,
                message,
            });
        }
    }

    /// 1회 캡처 + 송신
    pub async fn pump_once(&self) -> Result<(), CoreError> {
        let raw = self.media.capture_frame().await?;
        let encoder = self.encoder;
        let frame = tokio::task::spawn_blocking(move || encoder.encode(&raw))
            .await
            .map_err(|e| CoreError::Internal(format!("인코딩 태스크 실패: {e}")))??;
        self.channel.send_frame(&frame).await
    }

    /// 송신 루프. 종료 신호, 채널 `Failed`/`Closed`에서 끝난다. 보낸 프레임 수 반환
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut state = self.channel.state();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut was_connected = state.borrow().is_connected();
        let mut sent: u64 = 0;
        info!("프레임 송신 시작 (간격 {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !state.borrow().is_connected() {
                        continue;
                    }
                    match self.pump_once().await {
                        Ok(()) => sent += 1,
                        Err(e) => debug!("프레임 송신 생략: {e}"),
                    }
                }
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = *state.borrow_and_update();
                    match current {
                        ChannelState::Connected => {
                            if !was_connected {
                                info!("감독 채널 연결, 프레임 송신 재개");
                            }
                        }
                        ChannelState::Reconnecting { attempt } if was_connected => {
                            warn!("감독 채널 끊김, 재연결 시도 {attempt}");
                            self.notify("감독 채널 연결이 끊겼습니다. 재연결 중입니다.".to_string());
                        }
                        ChannelState::Failed => {
                            warn!("감독 채널 재연결 포기, 프레임 송신 중단");
                            self.notify("감독 채널에 다시 연결하지 못했습니다.".to_string());
                            break;
                        }
                        ChannelState::Closed => break,
                        _ => {}
                    }
                    was_connected = current.is_connected();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("프레임 송신 종료: {sent}개 전송");
        sent
    }
}
