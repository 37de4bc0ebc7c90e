//! 감독 채널 포트.
//!
//! 구현: `examguard-network` crate (tokio-tungstenite)

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::error::CoreError;
use crate::models::channel::{AlertInbound, ChannelState, FrameOutbound};

/// 원격 감독 서비스와의 양방향 채널
#[async_trait]
pub trait ProctorChannel: Send + Sync {
    /// 연결 상태 구독
    fn state(&self) -> watch::Receiver<ChannelState>;

    /// 수신 알림 구독 (검증 완료된 메시지만)
    fn subscribe_alerts(&self) -> broadcast::Receiver<AlertInbound>;

    /// 프레임 송신. 연결되지 않았으면 `CoreError::ChannelDisconnected`
    async fn send_frame(&self, frame: &FrameOutbound) -> Result<(), CoreError>;
}
