//! 에러 경로 통합 테스트.
//!
//! 세션 시작을 막는 실패와 알림으로만 전달되는 실패를 구분해 검증한다.

use examguard_core::config::SessionConfig;
use examguard_core::error::CoreError;
use examguard_core::models::notice::NoticeKind;
use examguard_core::models::session::SessionStatus;
use examguard_core::ports::media::MediaDevice;
use examguard_core::ports::question_source::QuestionSource;
use examguard_core::ports::submission::SubmissionClient;
use examguard_network::http_client::HttpExamClient;
use examguard_session::{LaunchRequest, RuntimeDeps, SessionLauncher};
use examguard_storage::memory::MemorySnapshotStore;
use examguard_storage::sqlite::SqliteStorage;
use examguard_vision::capture::SyntheticFeed;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn launcher(
    media: Arc<dyn MediaDevice>,
    questions: Arc<dyn QuestionSource>,
    submission: Option<Arc<HttpExamClient>>,
) -> SessionLauncher {
    SessionLauncher::new(
        SessionConfig {
            shuffle_questions: false,
            ..SessionConfig::default()
        },
        media,
        questions,
        RuntimeDeps {
            store: Arc::new(MemorySnapshotStore::new()),
            submission: submission.map(|s| s as Arc<dyn SubmissionClient>),
            signals: vec![],
        },
    )
}

fn request(code: &str) -> LaunchRequest {
    LaunchRequest {
        code: code.to_string(),
        user_id: "u1".to_string(),
        resume: false,
    }
}

fn local_bank() -> Arc<SqliteStorage> {
    let storage = SqliteStorage::open_in_memory("testState").unwrap();
    storage.seed_samples_if_empty().unwrap();
    Arc::new(storage)
}

#[tokio::test]
async fn unknown_category_is_not_found() {
    let launcher = launcher(Arc::new(SyntheticFeed::new(4, 4)), local_bank(), None);
    let mut notices = launcher.subscribe_notices();
    let (_tx, shutdown) = watch::channel(false);

    let err = launcher.launch(request("rust"), shutdown).await.err().unwrap();
    assert!(matches!(err, CoreError::NotFound { .. }));
    assert_eq!(notices.recv().await.unwrap().kind, NoticeKind::NetworkFailure);
}

#[tokio::test]
async fn revoked_capture_blocks_start_until_granted() {
    let feed = Arc::new(SyntheticFeed::new(4, 4));
    feed.set_granted(false);
    let launcher = launcher(feed.clone(), local_bank(), None);
    let (_tx, shutdown) = watch::channel(false);

    let err = launcher
        .launch(request("python"), shutdown.clone())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CoreError::PermissionDenied(_)));

    feed.set_granted(true);
    let (handle, task) = launcher.launch(request("python"), shutdown).await.unwrap();
    assert_eq!(handle.view().status, SessionStatus::InProgress);
    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn malformed_remote_quiz_blocks_start() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/api/quiz/broken")
        .with_status(200)
        .with_body(r#"{"_id":"broken","questions":"not json at all"}"#)
        .create_async()
        .await;

    let http = Arc::new(HttpExamClient::new(&server.url(), Duration::from_secs(5)).unwrap());
    let launcher = launcher(Arc::new(SyntheticFeed::new(4, 4)), http, None);
    let mut notices = launcher.subscribe_notices();
    let (_tx, shutdown) = watch::channel(false);

    let err = launcher.launch(request("broken"), shutdown).await.err().unwrap();
    assert!(matches!(err, CoreError::InvalidResponse(_)));
    assert_eq!(notices.recv().await.unwrap().kind, NoticeKind::InvalidResponse);
}

#[tokio::test]
async fn quiz_with_out_of_range_answer_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/api/quiz/bad-answer")
        .with_status(200)
        .with_body(
            r#"{"_id":"bad-answer","questions":[{"question":"Q?","options":["a","b"],"answer":7}]}"#,
        )
        .create_async()
        .await;

    let http = Arc::new(HttpExamClient::new(&server.url(), Duration::from_secs(5)).unwrap());
    let launcher = launcher(Arc::new(SyntheticFeed::new(4, 4)), http, None);
    let (_tx, shutdown) = watch::channel(false);

    let err = launcher
        .launch(request("bad-answer"), shutdown)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CoreError::InvalidResponse(_)));
}

#[tokio::test]
async fn submission_failure_keeps_completed_result() {
    let mut server = mockito::Server::new_async().await;
    let submit = server
        .mock("POST", "/api/submit-quiz")
        .with_status(503)
        .with_body(r#"{"error":"db down"}"#)
        .expect(1)
        .create_async()
        .await;

    let http = Arc::new(HttpExamClient::new(&server.url(), Duration::from_secs(5)).unwrap());
    let launcher = launcher(Arc::new(SyntheticFeed::new(4, 4)), local_bank(), Some(http));
    let (_tx, shutdown) = watch::channel(false);

    let (handle, task) = launcher.launch(request("python"), shutdown).await.unwrap();
    let mut notices = handle.subscribe_notices();

    handle.submit().await.unwrap();
    let notice = tokio::time::timeout(Duration::from_secs(5), notices.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notice.kind, NoticeKind::NetworkFailure);
    assert_eq!(handle.view().status, SessionStatus::Completed);
    assert_eq!(handle.view().score, Some(0));

    handle.shutdown().await.unwrap();
    task.await.unwrap();
    submit.assert_async().await;
}
