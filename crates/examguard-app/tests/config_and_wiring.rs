//! 설정 및 DI 와이어링 통합 테스트.
//!
//! AppConfig → 어댑터 생성 검증.

use examguard_core::config::AppConfig;
use examguard_core::models::channel::ChannelState;
use examguard_core::ports::question_source::QuestionSource;
use examguard_network::connectivity::ConnectivityMonitor;
use examguard_network::http_client::HttpExamClient;
use examguard_network::ws_client::{ProctorChannelClient, ReconnectPolicy};
use examguard_storage::sqlite::SqliteStorage;
use examguard_vision::encoder::FrameEncoder;
use std::time::Duration;

#[test]
fn config_defaults_are_valid() {
    let config = AppConfig::default_config();
    config.validate().unwrap();

    // 세션 정책
    assert_eq!(config.session.time_budget_secs, 3600);
    assert_eq!(config.session.violation_limit, 5);
    assert!(config.session.shuffle_questions);

    // 감독 채널
    assert!(config.channel.enabled);
    assert!(config.channel.reconnect_max_ms >= config.channel.reconnect_initial_ms);
    assert!(config.channel.max_reconnect_attempts > 0);

    // 저장소
    assert_eq!(config.storage.snapshot_key, "testState");
}

#[test]
fn zero_limits_are_rejected() {
    let mut config = AppConfig::default_config();
    config.session.violation_limit = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default_config();
    config.session.time_budget_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn channel_url_is_derived_from_server() {
    let mut config = AppConfig::default_config();
    config.server.base_url = "https://exam.example.com/".to_string();
    assert_eq!(config.channel_url(), "wss://exam.example.com/ws/proctor");

    config.channel.ws_url = Some("ws://127.0.0.1:9000/stream".to_string());
    assert_eq!(config.channel_url(), "ws://127.0.0.1:9000/stream");
}

#[test]
fn config_to_adapters() {
    let config = AppConfig::default_config();

    let http = HttpExamClient::new(&config.server.base_url, config.request_timeout());
    assert!(http.is_ok());

    let channel = ProctorChannelClient::new(
        &config.channel_url(),
        ReconnectPolicy::from_config(&config.channel),
    )
    .unwrap();
    assert_eq!(channel.current_state(), ChannelState::Idle);

    let policy = ReconnectPolicy::from_config(&config.channel);
    assert_eq!(policy.delay_for(1), Duration::from_millis(1_000));
    assert_eq!(policy.delay_for(10), Duration::from_millis(5_000));

    let monitor = ConnectivityMonitor::new(config.connectivity.offline_threshold);
    assert!(monitor.is_online());

    let _encoder = FrameEncoder::from_config(&config.vision);
}

#[test]
fn seeded_storage_serves_sample_bank() {
    let storage = SqliteStorage::open_in_memory("testState").unwrap();
    assert_eq!(storage.seed_samples_if_empty().unwrap(), 5);
    assert_eq!(storage.seed_samples_if_empty().unwrap(), 0);

    let questions = tokio_test::block_on(storage.fetch("python")).unwrap();
    assert_eq!(questions.len(), 5);
    assert_eq!(questions[0].id, "python-1");
}
