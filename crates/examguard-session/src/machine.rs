//! 시험 세션 상태 머신.
//!
//! 세션 상태의 유일한 작성자. 모든 연산은 동기적이며 I/O를 하지 않는다.
//! 종결 상태(`Completed`, `Terminated`)에서는 `restart`를 제외한 모든 이벤트가 무시된다.

use chrono::{DateTime, Utc};
use examguard_core::config::SessionConfig;
use examguard_core::error::CoreError;
use examguard_core::models::question::{validate_question_set, Question};
use examguard_core::models::session::{Connectivity, SessionSnapshot, SessionStatus};
use examguard_core::models::violation::{Violation, ViolationSource};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::scoring::score;
use crate::violation::ViolationTracker;

/// 세션 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// 시간 예산 (초)
    pub time_budget_secs: u64,
    /// 위반 한도
    pub violation_limit: u32,
    /// 경고 표시 유지 시간
    pub warning_display: Duration,
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            time_budget_secs: config.time_budget_secs,
            violation_limit: config.violation_limit,
            warning_display: Duration::from_secs(config.warning_display_secs),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// 정상 완료 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// 남은 시간 소진
    TimeExpired,
    /// 마지막 문항에서 다음으로 이동
    LastQuestion,
    /// 명시적 제출
    Submitted,
    /// 종결된 스냅샷 복원
    Restored,
}

/// 이벤트가 무시된 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// 세션이 이미 종결됨
    SessionClosed,
    /// 현재 문항이 아닌 인덱스
    NotCurrentQuestion,
    /// 선택지 범위 밖
    OptionOutOfRange,
    /// 첫 문항에서 이전으로 이동
    AtFirstQuestion,
    /// 표시 목록에 없는 위반
    UnknownViolation,
    /// 진행 중 세션은 재시작 불가
    NotTerminal,
}

/// 이벤트 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// 상태 변경 없음
    Ignored(IgnoreReason),
    /// 진행 중 상태에서 변경 적용
    Applied,
    /// 정상 완료로 전이
    Completed {
        /// 완료 경로
        reason: CompletionReason,
        /// 확정 점수
        score: u32,
    },
    /// 위반 한도 도달로 강제 종료
    Terminated {
        /// 누적 위반 횟수
        violation_count: u32,
        /// 확정 점수
        score: u32,
    },
}

impl Transition {
    /// 이 이벤트로 종결 상태에 진입했는지
    pub fn is_terminal(&self) -> bool {
        matches!(self, Transition::Completed { .. } | Transition::Terminated { .. })
    }
}

/// 시험 세션
#[derive(Debug)]
pub struct ExamSession {
    questions: Vec<Question>,
    current_index: usize,
    answers: Vec<Option<usize>>,
    time_remaining_secs: u64,
    time_spent_secs: u64,
    tracker: ViolationTracker,
    status: SessionStatus,
    connectivity: Connectivity,
    score: Option<u32>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    settings: SessionSettings,
}

impl ExamSession {
    /// 확정된 문항 집합으로 세션 생성
    pub fn new(questions: Vec<Question>, settings: SessionSettings) -> Result<Self, CoreError> {
        validate_question_set(&questions)?;
        if settings.violation_limit == 0 {
            return Err(CoreError::Config("violation_limit은 1 이상이어야 합니다".into()));
        }
        if settings.time_budget_secs == 0 {
            return Err(CoreError::Config("time_budget_secs는 1 이상이어야 합니다".into()));
        }
        let count = questions.len();
        info!(
            "세션 생성: 문항 {}개, 시간 예산 {}초, 위반 한도 {}",
            count, settings.time_budget_secs, settings.violation_limit
        );
        Ok(Self {
            questions,
            current_index: 0,
            answers: vec![None; count],
            time_remaining_secs: settings.time_budget_secs,
            time_spent_secs: 0,
            tracker: ViolationTracker::new(settings.violation_limit, settings.warning_display),
            status: SessionStatus::InProgress,
            connectivity: Connectivity::Online,
            score: None,
            started_at: Utc::now(),
            ended_at: None,
            settings,
        })
    }

    // ============================================================
    // 전이
    // ============================================================

    /// 시계 틱
    pub fn tick(&mut self) -> Transition {
        if self.status.is_terminal() {
            return Transition::Ignored(IgnoreReason::SessionClosed);
        }
        self.time_spent_secs += 1;
        if self.time_remaining_secs <= 1 {
            self.time_remaining_secs = 0;
            info!("남은 시간 소진, 세션 완료");
            return self.complete(CompletionReason::TimeExpired);
        }
        self.time_remaining_secs -= 1;
        Transition::Applied
    }

    /// 현재 문항에 답 선택
    pub fn select_answer(&mut self, index: usize, option: usize) -> Transition {
        if self.status.is_terminal() {
            return Transition::Ignored(IgnoreReason::SessionClosed);
        }
        if index != self.current_index {
            return Transition::Ignored(IgnoreReason::NotCurrentQuestion);
        }
        if !self.questions[index].has_option(option) {
            return Transition::Ignored(IgnoreReason::OptionOutOfRange);
        }
        self.answers[index] = Some(option);
        debug!("답 선택: 문항 {index} → 선택지 {option}");
        Transition::Applied
    }

    /// 다음 문항. 마지막 문항에서는 제출
    pub fn next_question(&mut self) -> Transition {
        if self.status.is_terminal() {
            return Transition::Ignored(IgnoreReason::SessionClosed);
        }
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
            return Transition::Applied;
        }
        self.complete(CompletionReason::LastQuestion)
    }

    /// 이전 문항
    pub fn previous_question(&mut self) -> Transition {
        if self.status.is_terminal() {
            return Transition::Ignored(IgnoreReason::SessionClosed);
        }
        if self.current_index == 0 {
            return Transition::Ignored(IgnoreReason::AtFirstQuestion);
        }
        self.current_index -= 1;
        Transition::Applied
    }

    /// 명시적 제출
    pub fn submit(&mut self) -> Transition {
        if self.status.is_terminal() {
            return Transition::Ignored(IgnoreReason::SessionClosed);
        }
        self.complete(CompletionReason::Submitted)
    }

    /// 위반 기록. 한도 도달 시 같은 단계에서 강제 종료
    pub fn raise_violation(
        &mut self,
        message: impl Into<String>,
        source: ViolationSource,
        now: Instant,
    ) -> Transition {
        if self.status.is_terminal() {
            return Transition::Ignored(IgnoreReason::SessionClosed);
        }
        self.tracker.raise(message, source, now);
        if self.tracker.threshold_reached() {
            return self.terminate();
        }
        Transition::Applied
    }

    /// 경고 표시 조기 해제
    pub fn dismiss_violation(&mut self, id: u64) -> Transition {
        if self.status.is_terminal() {
            return Transition::Ignored(IgnoreReason::SessionClosed);
        }
        if self.tracker.dismiss(id) {
            Transition::Applied
        } else {
            Transition::Ignored(IgnoreReason::UnknownViolation)
        }
    }

    /// 표시 만료 처리. 제거된 개수 반환
    pub fn expire_violations(&mut self, now: Instant) -> usize {
        self.tracker.expire_due(now)
    }

    /// 다음 표시 만료 시각
    pub fn next_violation_expiry(&self) -> Option<Instant> {
        self.tracker.next_expiry()
    }

    /// 연결 상태 변경. 실제로 바뀌었으면 true
    pub fn set_connectivity(&mut self, connectivity: Connectivity) -> bool {
        if self.connectivity == connectivity {
            return false;
        }
        self.connectivity = connectivity;
        true
    }

    /// 종결 상태에서만 허용. 모든 필드를 초기값으로
    pub fn restart(&mut self) -> Transition {
        if !self.status.is_terminal() {
            return Transition::Ignored(IgnoreReason::NotTerminal);
        }
        info!("세션 재시작 (이전 상태: {})", self.status);
        self.current_index = 0;
        self.answers = vec![None; self.questions.len()];
        self.time_remaining_secs = self.settings.time_budget_secs;
        self.time_spent_secs = 0;
        self.tracker.reset();
        self.status = SessionStatus::InProgress;
        self.score = None;
        self.started_at = Utc::now();
        self.ended_at = None;
        Transition::Applied
    }

    fn complete(&mut self, reason: CompletionReason) -> Transition {
        let score = self.finish(SessionStatus::Completed);
        info!("세션 완료 ({reason:?}): 점수 {score}/{}", self.questions.len());
        Transition::Completed { reason, score }
    }

    fn terminate(&mut self) -> Transition {
        let violation_count = self.tracker.raised_count();
        let score = self.finish(SessionStatus::Terminated);
        warn!(
            "위반 한도 도달 ({violation_count}/{}), 세션 강제 종료",
            self.tracker.limit()
        );
        Transition::Terminated {
            violation_count,
            score,
        }
    }

    /// 종결 처리. 점수는 최초 한 번만 계산한다
    fn finish(&mut self, status: SessionStatus) -> u32 {
        self.status = status;
        self.ended_at.get_or_insert_with(Utc::now);
        *self
            .score
            .get_or_insert_with(|| score(&self.questions, &self.answers))
    }

    // ============================================================
    // 스냅샷
    // ============================================================

    /// 영속화용 스냅샷
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            question_ids: self.questions.iter().map(|q| q.id.clone()).collect(),
            current_index: self.current_index,
            answers: self.answers.clone(),
            time_remaining_secs: self.time_remaining_secs,
            time_spent_secs: self.time_spent_secs,
            violations: self.tracker.displayed().to_vec(),
            violation_count: self.tracker.raised_count(),
            status: self.status,
            score: self.score,
            started_at: self.started_at,
            ended_at: self.ended_at,
            saved_at: Utc::now(),
        }
    }

    /// 영속화된 스냅샷으로 메모리 상태를 덮어쓴다
    ///
    /// 문항 구성이 다른 스냅샷은 거부한다. 순서는 스냅샷을 따른다.
    /// 이미 종결된 세션에는 적용하지 않는다.
    pub fn restore(&mut self, snapshot: SessionSnapshot, now: Instant) -> Result<Transition, CoreError> {
        if self.status.is_terminal() {
            return Ok(Transition::Ignored(IgnoreReason::SessionClosed));
        }
        let reordered = self.reorder_for(&snapshot)?;

        self.questions = reordered;
        self.current_index = snapshot.current_index;
        self.answers = snapshot.answers;
        self.time_remaining_secs = snapshot.time_remaining_secs;
        // 소요 시간은 진행 중 감소하지 않는다 (재시작 직후에는 메모리 값이 0)
        self.time_spent_secs = self.time_spent_secs.max(snapshot.time_spent_secs);
        self.tracker
            .restore(snapshot.violations, snapshot.violation_count, now);
        self.started_at = snapshot.started_at;
        info!(
            "스냅샷 복원: 문항 {}/{}, 남은 시간 {}초, 누적 위반 {}",
            self.current_index + 1,
            self.questions.len(),
            self.time_remaining_secs,
            self.tracker.raised_count()
        );

        match snapshot.status {
            SessionStatus::Completed => {
                self.score = snapshot.score;
                self.ended_at = snapshot.ended_at;
                Ok(self.complete(CompletionReason::Restored))
            }
            SessionStatus::Terminated => {
                self.score = snapshot.score;
                self.ended_at = snapshot.ended_at;
                let violation_count = self.tracker.raised_count();
                let score = self.finish(SessionStatus::Terminated);
                info!("강제 종료된 세션 복원: 누적 위반 {violation_count}, 점수 {score}");
                Ok(Transition::Terminated {
                    violation_count,
                    score,
                })
            }
            SessionStatus::InProgress if self.tracker.threshold_reached() => Ok(self.terminate()),
            SessionStatus::InProgress if self.time_remaining_secs == 0 => {
                Ok(self.complete(CompletionReason::TimeExpired))
            }
            SessionStatus::InProgress => Ok(Transition::Applied),
        }
    }

    /// 스냅샷 검증 후 스냅샷 순서대로 재배열한 문항 반환
    fn reorder_for(&self, snapshot: &SessionSnapshot) -> Result<Vec<Question>, CoreError> {
        let count = self.questions.len();
        if snapshot.question_ids.len() != count || snapshot.answers.len() != count {
            return Err(CoreError::InvalidResponse(format!(
                "스냅샷 문항 수 불일치: 저장 {} / 응답 {} / 현재 {count}",
                snapshot.question_ids.len(),
                snapshot.answers.len()
            )));
        }
        if snapshot.current_index >= count {
            return Err(CoreError::InvalidResponse(format!(
                "스냅샷 현재 인덱스 범위 초과: {}",
                snapshot.current_index
            )));
        }

        let mut by_id: HashMap<&str, &Question> =
            self.questions.iter().map(|q| (q.id.as_str(), q)).collect();
        let mut reordered = Vec::with_capacity(count);
        for id in &snapshot.question_ids {
            let q = by_id.remove(id.as_str()).ok_or_else(|| {
                CoreError::InvalidResponse(format!("스냅샷에 알 수 없는 문항: {id}"))
            })?;
            reordered.push(q.clone());
        }

        for (q, answer) in reordered.iter().zip(&snapshot.answers) {
            if let Some(option) = answer {
                if !q.has_option(*option) {
                    return Err(CoreError::InvalidResponse(format!(
                        "스냅샷 답안 범위 초과: 문항 {} 선택지 {option}",
                        q.id
                    )));
                }
            }
        }
        Ok(reordered)
    }

    // ============================================================
    // 조회
    // ============================================================

    /// 문항 목록
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// 현재 문항 인덱스
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// 현재 문항
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current_index]
    }

    /// 문항별 선택
    pub fn answers(&self) -> &[Option<usize>] {
        &self.answers
    }

    /// 남은 시간 (초)
    pub fn time_remaining_secs(&self) -> u64 {
        self.time_remaining_secs
    }

    /// 소요 시간 (초)
    pub fn time_spent_secs(&self) -> u64 {
        self.time_spent_secs
    }

    /// 표시 중인 위반
    pub fn violations(&self) -> &[Violation] {
        self.tracker.displayed()
    }

    /// 누적 위반 횟수
    pub fn violation_count(&self) -> u32 {
        self.tracker.raised_count()
    }

    /// 세션 상태
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// 연결 상태
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// 확정 점수 (종결 전에는 None)
    pub fn score(&self) -> Option<u32> {
        self.score
    }

    /// 시작 시각
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// 종결 시각
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// 세션 정책
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}
