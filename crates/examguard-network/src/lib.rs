//! # examguard-network
//!
//! 네트워크 어댑터.
//! 퀴즈 서버 REST API(문항 조회, 답안 제출), 원격 감독 WebSocket 채널,
//! 서버 연결 상태 감시를 담당한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use examguard_network::http_client::HttpExamClient;
//! use examguard_network::ws_client::{ProctorChannelClient, ReconnectPolicy};
//! use examguard_network::connectivity::ConnectivityMonitor;
//! ```

pub mod connectivity;
pub mod http_client;
pub mod ws_client;
