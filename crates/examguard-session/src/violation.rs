//! 위반 추적기.
//!
//! 표시용 경고 목록과 누적 위반 횟수를 분리해서 관리한다.
//! 표시 목록은 만료/해제로 줄어들지만 누적 횟수는 감소하지 않는다.

use chrono::Utc;
use examguard_core::models::violation::{Violation, ViolationSource};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// 위반 추적기
#[derive(Debug)]
pub struct ViolationTracker {
    displayed: Vec<Violation>,
    /// (위반 id, 표시 만료 시각)
    expiries: Vec<(u64, Instant)>,
    raised: u32,
    limit: u32,
    next_id: u64,
    display_ttl: Duration,
}

impl ViolationTracker {
    /// `limit`: 종료 임계값, `display_ttl`: 표시 유지 시간
    pub fn new(limit: u32, display_ttl: Duration) -> Self {
        Self {
            displayed: Vec::new(),
            expiries: Vec::new(),
            raised: 0,
            limit,
            next_id: 1,
            display_ttl,
        }
    }

    /// 위반 기록. 새 id를 반환하고 누적 횟수를 증가시킨다
    pub fn raise(&mut self, message: impl Into<String>, source: ViolationSource, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.raised = self.raised.saturating_add(1);

        let violation = Violation {
            id,
            message: message.into(),
            timestamp_ms: Utc::now().timestamp_millis(),
            source,
        };
        debug!(
            "위반 기록 #{id} ({:?}) 누적 {}/{}",
            source, self.raised, self.limit
        );
        self.displayed.push(violation);
        self.expiries.push((id, now + self.display_ttl));
        id
    }

    /// 표시 목록에서 조기 제거. 누적 횟수는 그대로
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.displayed.len();
        self.displayed.retain(|v| v.id != id);
        self.expiries.retain(|(eid, _)| *eid != id);
        before != self.displayed.len()
    }

    /// 만료 시각이 지난 항목 제거. 제거된 개수 반환
    pub fn expire_due(&mut self, now: Instant) -> usize {
        let due: Vec<u64> = self
            .expiries
            .iter()
            .filter(|(_, at)| *at <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &due {
            self.dismiss(*id);
        }
        due.len()
    }

    /// 가장 빠른 만료 시각
    pub fn next_expiry(&self) -> Option<Instant> {
        self.expiries.iter().map(|(_, at)| *at).min()
    }

    /// 누적 횟수가 한도 이상인지
    pub fn threshold_reached(&self) -> bool {
        self.raised >= self.limit
    }

    /// 누적 위반 횟수
    pub fn raised_count(&self) -> u32 {
        self.raised
    }

    /// 종료 임계값
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// 표시 중인 위반 목록
    pub fn displayed(&self) -> &[Violation] {
        &self.displayed
    }

    /// 영속화된 목록으로 교체
    ///
    /// 누적 횟수는 현재 값과 저장 값 중 큰 값을 유지한다. 표시 만료는 발생 시각 기준
    /// 남은 시간으로 다시 예약한다.
    pub fn restore(&mut self, displayed: Vec<Violation>, raised: u32, now: Instant) {
        let now_ms = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(self.display_ttl.as_millis()).unwrap_or(i64::MAX);

        self.expiries = displayed
            .iter()
            .map(|v| {
                let age = now_ms.saturating_sub(v.timestamp_ms).max(0);
                let remaining = u64::try_from(ttl_ms.saturating_sub(age).max(0)).unwrap_or(0);
                (v.id, now + Duration::from_millis(remaining))
            })
            .collect();

        let max_id = displayed.iter().map(|v| v.id).max().unwrap_or(0);
        self.next_id = self.next_id.max(max_id + 1);
        self.raised = self.raised.max(raised).max(displayed.len() as u32);
        self.displayed = displayed;
    }

    /// 초기 상태로 (재시작 전용)
    pub fn reset(&mut self) {
        self.displayed.clear();
        self.expiries.clear();
        self.raised = 0;
        self.next_id = 1;
    }
}
