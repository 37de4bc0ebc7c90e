//! 세션 런타임.
//!
//! 하나의 태스크가 `ExamSession`을 소유하고, 시계/위반 신호/사용자 명령/자동 저장을
//! 하나의 `select!` 루프에서 순서대로 처리한다. 외부에서는 `SessionHandle`로 명령을 보내고
//! `watch` 채널로 확정된 상태만 관찰한다.

use examguard_core::error::CoreError;
use examguard_core::models::notice::Notice;
use examguard_core::models::question::Question;
use examguard_core::models::report::SessionReport;
use examguard_core::models::session::{Connectivity, SessionSnapshot, SessionStatus};
use examguard_core::models::submission::Submission;
use examguard_core::models::violation::Violation;
use examguard_core::ports::snapshot_store::SnapshotStore;
use examguard_core::ports::submission::SubmissionClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clock::SessionClock;
use crate::machine::{ExamSession, Transition};
use crate::persist::{LoadReply, Persister};
use crate::scoring::{answers_in_order, build_report};
use crate::signal::{SignalEvent, SignalGuard, SignalSource};

/// 세션 런타임 명령
#[derive(Debug)]
pub enum SessionCommand {
    /// 현재 문항에 답 선택
    SelectAnswer {
        /// 문항 인덱스
        index: usize,
        /// 선택지 인덱스
        option: usize,
    },
    /// 다음 문항 (마지막이면 제출)
    Next,
    /// 이전 문항
    Previous,
    /// 명시적 제출
    Submit,
    /// 경고 표시 해제
    Dismiss(u64),
    /// 연결 상태 변경
    SetConnectivity(Connectivity),
    /// 종결된 세션 재시작
    Restart,
    /// 결과 리포트 요청
    Report(oneshot::Sender<Option<SessionReport>>),
    /// 앞선 저장 요청이 모두 기록될 때까지 대기
    Flush(oneshot::Sender<()>),
    /// 런타임 종료
    Shutdown,
}

/// 관찰자용 세션 상태
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub status: SessionStatus,
    pub connectivity: Connectivity,
    pub current_index: usize,
    pub total_questions: usize,
    pub current_question: Question,
    pub answers: Vec<Option<usize>>,
    pub time_remaining_secs: u64,
    pub time_spent_secs: u64,
    pub violations: Vec<Violation>,
    pub violation_count: u32,
    pub violation_limit: u32,
    pub score: Option<u32>,
}

impl SessionView {
    fn from_session(session: &ExamSession) -> Self {
        Self {
            status: session.status(),
            connectivity: session.connectivity(),
            current_index: session.current_index(),
            total_questions: session.questions().len(),
            current_question: session.current_question().clone(),
            answers: session.answers().to_vec(),
            time_remaining_secs: session.time_remaining_secs(),
            time_spent_secs: session.time_spent_secs(),
            violations: session.violations().to_vec(),
            violation_count: session.violation_count(),
            violation_limit: session.settings().violation_limit,
            score: session.score(),
        }
    }
}

/// 런타임 명령 핸들 (복제 가능)
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<SessionView>,
    notices: broadcast::Sender<Notice>,
}

impl SessionHandle {
    async fn send(&self, command: SessionCommand) -> Result<(), CoreError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoreError::Internal("세션 런타임이 종료됨".to_string()))
    }

    /// 현재 문항에 답 선택
    pub async fn select_answer(&self, index: usize, option: usize) -> Result<(), CoreError> {
        self.send(SessionCommand::SelectAnswer { index, option }).await
    }

    /// 다음 문항
    pub async fn next(&self) -> Result<(), CoreError> {
        self.send(SessionCommand::Next).await
    }

    /// 이전 문항
    pub async fn previous(&self) -> Result<(), CoreError> {
        self.send(SessionCommand::Previous).await
    }

    /// 제출
    pub async fn submit(&self) -> Result<(), CoreError> {
        self.send(SessionCommand::Submit).await
    }

    /// 경고 해제
    pub async fn dismiss(&self, violation_id: u64) -> Result<(), CoreError> {
        self.send(SessionCommand::Dismiss(violation_id)).await
    }

    /// 연결 상태 변경
    pub async fn set_connectivity(&self, connectivity: Connectivity) -> Result<(), CoreError> {
        self.send(SessionCommand::SetConnectivity(connectivity)).await
    }

    /// 재시작
    pub async fn restart(&self) -> Result<(), CoreError> {
        self.send(SessionCommand::Restart).await
    }

    /// 종료
    pub async fn shutdown(&self) -> Result<(), CoreError> {
        self.send(SessionCommand::Shutdown).await
    }

    /// 결과 리포트 (진행 중이면 None)
    pub async fn report(&self) -> Result<Option<SessionReport>, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Report(tx)).await?;
        rx.await
            .map_err(|_| CoreError::Internal("리포트 응답 수신 실패".to_string()))
    }

    /// 지금까지의 저장 요청이 기록될 때까지 대기
    pub async fn flush(&self) -> Result<(), CoreError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Flush(tx)).await?;
        rx.await
            .map_err(|_| CoreError::Internal("저장 완료 응답 수신 실패".to_string()))
    }

    /// 마지막으로 확정된 상태
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// 상태 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// 조건을 만족하는 상태가 확정될 때까지 대기
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionView) -> bool,
    ) -> Result<SessionView, CoreError> {
        let mut rx = self.view.clone();
        let view = rx
            .wait_for(predicate)
            .await
            .map_err(|_| CoreError::Internal("세션 런타임이 종료됨".to_string()))?;
        Ok(view.clone())
    }

    /// 알림 구독
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }
}

/// 런타임 협력자
#[derive(Clone)]
pub struct RuntimeDeps {
    /// 스냅샷 저장소
    pub store: Arc<dyn SnapshotStore>,
    /// 제출 엔드포인트 (없으면 로컬 채점만)
    pub submission: Option<Arc<dyn SubmissionClient>>,
    /// 위반 신호 공급원
    pub signals: Vec<Arc<dyn SignalSource>>,
}

/// 런타임 설정
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// 시계 틱 간격
    pub tick_interval: Duration,
    /// 주기적 저장 간격
    pub autosave_interval: Duration,
    /// 응시자 식별자
    pub user_id: String,
    /// 퀴즈 식별자
    pub quiz_id: String,
    /// 조회 시점의 문항 id 순서. 제출 답안은 이 순서로 정렬한다
    pub source_order: Vec<String>,
}

/// 세션 런타임 (단일 작성자)
pub struct SessionRuntime {
    session: ExamSession,
    clock: SessionClock,
    autosave: Interval,
    commands: mpsc::Receiver<SessionCommand>,
    signal_tx: mpsc::Sender<SignalEvent>,
    signal_rx: mpsc::Receiver<SignalEvent>,
    signal_guards: Vec<SignalGuard>,
    view_tx: watch::Sender<SessionView>,
    notices: broadcast::Sender<Notice>,
    persister: Persister,
    pending_load: Option<LoadReply>,
    submissions: Vec<JoinHandle<()>>,
    deps: RuntimeDeps,
    options: RuntimeOptions,
}

impl SessionRuntime {
    /// 런타임 태스크 시작
    pub fn spawn(
        session: ExamSession,
        deps: RuntimeDeps,
        options: RuntimeOptions,
        notices: broadcast::Sender<Notice>,
        shutdown: watch::Receiver<bool>,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (signal_tx, signal_rx) = mpsc::channel(64);
        let (view_tx, view_rx) = watch::channel(SessionView::from_session(&session));

        let autosave = Self::autosave_interval(options.autosave_interval);
        let persister = Persister::spawn(deps.store.clone(), notices.clone());

        let mut runtime = Self {
            session,
            clock: SessionClock::new(options.tick_interval),
            autosave,
            commands: command_rx,
            signal_tx,
            signal_rx,
            signal_guards: Vec::new(),
            view_tx,
            notices: notices.clone(),
            persister,
            pending_load: None,
            submissions: Vec::new(),
            deps,
            options,
        };
        if runtime.session.status().is_terminal() {
            runtime.clock.stop();
        } else {
            runtime.start_signals();
        }

        let handle = SessionHandle {
            commands: command_tx,
            view: view_rx,
            notices,
        };
        let task = tokio::spawn(runtime.run(shutdown));
        (handle, task)
    }

    fn autosave_interval(period: Duration) -> Interval {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "세션 런타임 시작: quiz={} user={}",
            self.options.quiz_id, self.options.user_id
        );
        let mut shutdown_open = true;

        loop {
            let expiry = self.session.next_violation_expiry();
            let live = !self.session.status().is_terminal();

            tokio::select! {
                biased;

                // 시간 만료가 같은 순간의 다른 이벤트보다 먼저 처리된다
                _ = self.clock.tick() => {
                    let t = self.session.tick();
                    self.apply(t);
                }
                _ = sleep_until_opt(expiry) => {
                    if self.session.expire_violations(Instant::now()) > 0 {
                        self.publish();
                    }
                }
                Some(signal) = self.signal_rx.recv() => {
                    let t = self
                        .session
                        .raise_violation(signal.message, signal.source, Instant::now());
                    self.apply(t);
                }
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                loaded = recv_load(&mut self.pending_load) => {
                    self.pending_load = None;
                    self.apply_loaded(loaded);
                }
                _ = self.autosave.tick(), if live => {
                    self.persister.save(self.session.snapshot());
                }
                changed = shutdown.changed(), if shutdown_open => match changed {
                    Ok(()) if *shutdown.borrow() => break,
                    Ok(()) => {}
                    Err(_) => shutdown_open = false,
                },
            }
        }

        self.finish().await;
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SelectAnswer { index, option } => {
                let t = self.session.select_answer(index, option);
                self.apply(t);
            }
            SessionCommand::Next => {
                let t = self.session.next_question();
                self.apply(t);
            }
            SessionCommand::Previous => {
                let t = self.session.previous_question();
                self.apply(t);
            }
            SessionCommand::Submit => {
                let t = self.session.submit();
                self.apply(t);
            }
            SessionCommand::Dismiss(id) => {
                let t = self.session.dismiss_violation(id);
                self.apply(t);
            }
            SessionCommand::SetConnectivity(connectivity) => self.change_connectivity(connectivity),
            SessionCommand::Restart => self.restart(),
            SessionCommand::Report(reply) => {
                let _ = reply.send(build_report(&self.session, &self.options.user_id));
            }
            SessionCommand::Flush(reply) => self.persister.barrier(reply),
            SessionCommand::Shutdown => {}
        }
    }

    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Ignored(reason) => debug!("이벤트 무시: {reason:?}"),
            Transition::Applied => self.publish(),
            Transition::Completed { .. } | Transition::Terminated { .. } => {
                self.finalize(true);
                self.publish();
            }
        }
    }

    /// 오프라인 전환 시 즉시 저장, 온라인 복귀 시 저장본으로 덮어쓰기
    fn change_connectivity(&mut self, connectivity: Connectivity) {
        if !self.session.set_connectivity(connectivity) {
            return;
        }
        match connectivity {
            Connectivity::Offline => {
                warn!("오프라인 전환: 스냅샷 즉시 저장");
                self.persister.save(self.session.snapshot());
            }
            Connectivity::Online => {
                info!("온라인 복귀: 저장된 스냅샷으로 복원");
                self.pending_load = Some(self.persister.load());
            }
        }
        self.publish();
    }

    fn apply_loaded(
        &mut self,
        loaded: Result<Result<Option<SessionSnapshot>, CoreError>, oneshot::error::RecvError>,
    ) {
        let snapshot = match loaded {
            Ok(Ok(Some(snapshot))) => snapshot,
            Ok(Ok(None)) => {
                debug!("저장된 스냅샷 없음: 메모리 상태 유지");
                return;
            }
            Ok(Err(e)) => {
                error!("스냅샷 로드 실패: {e}");
                self.notify(&e);
                return;
            }
            Err(_) => {
                warn!("스냅샷 로드 응답 유실");
                return;
            }
        };

        let persisted_terminal = snapshot.status.is_terminal();
        match self.session.restore(snapshot, Instant::now()) {
            Ok(Transition::Ignored(reason)) => debug!("스냅샷 복원 생략: {reason:?}"),
            Ok(t) => {
                if t.is_terminal() {
                    // 이미 종결된 스냅샷은 제출도 끝난 상태
                    self.finalize(!persisted_terminal);
                }
                self.publish();
            }
            Err(e) => {
                warn!("스냅샷 복원 거부: {e}");
                self.notify(&e);
            }
        }
    }

    /// 종결 처리: 시계와 신호 공급원 해제, 최종 저장, 제출
    fn finalize(&mut self, submit: bool) {
        self.clock.stop();
        self.signal_guards.clear();
        self.pending_load = None;
        self.persister.save(self.session.snapshot());
        if submit {
            self.spawn_submission();
        }
    }

    fn spawn_submission(&mut self) {
        let Some(client) = self.deps.submission.clone() else {
            return;
        };
        let Some(score) = self.session.score() else {
            return;
        };
        let submission = Submission {
            user_id: self.options.user_id.clone(),
            quiz_id: self.options.quiz_id.clone(),
            answers: answers_in_order(
                self.session.questions(),
                self.session.answers(),
                &self.options.source_order,
            ),
            score,
        };
        let notices = self.notices.clone();
        let handle = tokio::spawn(async move {
            match client.submit(&submission).await {
                Ok(ack) => info!(
                    "답안 제출 완료: {} (report={:?})",
                    ack.message, ack.report_id
                ),
                Err(e) => {
                    // 로컬 종결 상태는 유지
                    error!("답안 제출 실패: {e}");
                    let _ = notices.send(Notice::from_error(&e));
                }
            }
        });
        self.submissions.push(handle);
    }

    fn restart(&mut self) {
        match self.session.restart() {
            Transition::Applied => {
                self.clock = SessionClock::new(self.options.tick_interval);
                self.autosave = Self::autosave_interval(self.options.autosave_interval);
                while self.signal_rx.try_recv().is_ok() {}
                self.start_signals();
                self.pending_load = None;
                self.persister.save(self.session.snapshot());
                self.publish();
            }
            other => debug!("재시작 무시: {other:?}"),
        }
    }

    fn start_signals(&mut self) {
        self.signal_guards = self
            .deps
            .signals
            .iter()
            .map(|source| {
                debug!("신호 공급원 시작: {}", source.name());
                source.start(self.signal_tx.clone())
            })
            .collect();
    }

    fn publish(&self) {
        self.view_tx
            .send_replace(SessionView::from_session(&self.session));
    }

    fn notify(&self, err: &CoreError) {
        let _ = self.notices.send(Notice::from_error(err));
    }

    async fn finish(mut self) {
        info!("세션 런타임 종료: 상태 {}", self.session.status());
        self.clock.stop();
        self.signal_guards.clear();
        self.publish();
        self.persister.save(self.session.snapshot());
        self.persister.close().await;
        for handle in self.submissions.drain(..) {
            let _ = handle.await;
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn recv_load(
    slot: &mut Option<LoadReply>,
) -> Result<Result<Option<SessionSnapshot>, CoreError>, oneshot::error::RecvError> {
    match slot.as_mut() {
        Some(rx) => rx.await,
        None => std::future::pending().await,
    }
}
