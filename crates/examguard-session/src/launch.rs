//! 세션 시작 절차.
//!
//! 설정 검증 → 미디어 권한 → 문항 조회/검증 → 1회 섞기 → (선택) 저장된 스냅샷 재개 → 런타임 시작.
//! 권한 거부와 문항 형식 오류는 세션 시작을 막고, 알림으로도 전달된다.

use examguard_core::config::SessionConfig;
use examguard_core::error::CoreError;
use examguard_core::models::notice::Notice;
use examguard_core::models::question::validate_question_set;
use examguard_core::ports::media::MediaDevice;
use examguard_core::ports::question_source::QuestionSource;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::machine::{ExamSession, SessionSettings};
use crate::runtime::{RuntimeDeps, RuntimeOptions, SessionHandle, SessionRuntime};

/// 세션 시작 요청
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// 퀴즈 코드 또는 문항 분류
    pub code: String,
    /// 응시자 식별자
    pub user_id: String,
    /// 저장된 스냅샷이 있으면 이어서 진행
    pub resume: bool,
}

/// 세션 시작기
pub struct SessionLauncher {
    config: SessionConfig,
    media: Arc<dyn MediaDevice>,
    questions: Arc<dyn QuestionSource>,
    deps: RuntimeDeps,
    notices: broadcast::Sender<Notice>,
}

impl SessionLauncher {
    pub fn new(
        config: SessionConfig,
        media: Arc<dyn MediaDevice>,
        questions: Arc<dyn QuestionSource>,
        deps: RuntimeDeps,
    ) -> Self {
        let (notices, _) = broadcast::channel(64);
        Self {
            config,
            media,
            questions,
            deps,
            notices,
        }
    }

    /// 알림 구독 (시작 단계 알림 포함)
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// 외부 어댑터(감독 채널 등)가 같은 알림 스트림에 게시할 송신기
    pub fn notice_sender(&self) -> broadcast::Sender<Notice> {
        self.notices.clone()
    }

    /// 세션 시작. 권한 거부 후에는 같은 시작기로 다시 호출할 수 있다
    pub async fn launch(
        &self,
        request: LaunchRequest,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(SessionHandle, JoinHandle<()>), CoreError> {
        self.config
            .validate()
            .map_err(|e| self.reject("세션 설정 오류", e))?;

        self.media
            .request_access()
            .await
            .map_err(|e| self.reject("미디어 권한 획득 실패", e))?;
        info!("미디어 권한 획득");

        let mut questions = self
            .questions
            .fetch(&request.code)
            .await
            .map_err(|e| self.reject("문항 조회 실패", e))?;
        validate_question_set(&questions).map_err(|e| self.reject("문항 검증 실패", e))?;
        info!("문항 {}개 로드: {}", questions.len(), request.code);

        // 제출은 조회된 순서 기준
        let source_order: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
        if self.config.shuffle_questions {
            questions.shuffle(&mut rand::rng());
        }

        let mut session = ExamSession::new(questions, SessionSettings::from(&self.config))?;

        if request.resume {
            match self.deps.store.load().await {
                Ok(Some(snapshot)) => match session.restore(snapshot, Instant::now()) {
                    Ok(t) => info!("저장된 세션 재개: {t:?}"),
                    Err(e) => {
                        warn!("저장된 세션과 문항 불일치, 새로 시작: {e}");
                        let _ = self.notices.send(Notice::from_error(&e));
                    }
                },
                Ok(None) => info!("저장된 세션 없음, 새로 시작"),
                Err(e) => {
                    warn!("스냅샷 로드 실패, 새로 시작: {e}");
                    let _ = self.notices.send(Notice::from_error(&e));
                }
            }
        }

        let options = RuntimeOptions {
            tick_interval: Duration::from_millis(self.config.tick_interval_ms),
            autosave_interval: Duration::from_millis(self.config.autosave_interval_ms),
            user_id: request.user_id,
            quiz_id: request.code,
            source_order,
        };
        Ok(SessionRuntime::spawn(
            session,
            self.deps.clone(),
            options,
            self.notices.clone(),
            shutdown,
        ))
    }

    fn reject(&self, stage: &str, err: CoreError) -> CoreError {
        warn!("{stage}: {err}");
        let _ = self.notices.send(Notice::from_error(&err));
        err
    }
}
