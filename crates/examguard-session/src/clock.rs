//! 세션 시계.
//!
//! 진행 중인 세션에 일정 간격 틱을 공급한다. 누락된 틱은 재생하지 않으며,
//! `stop` 이후에는 다시 시작되지 않는다 (재시작은 새 시계 생성).

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// 틱 공급원
pub struct SessionClock {
    interval: Option<Interval>,
    period: Duration,
}

impl SessionClock {
    /// 첫 틱은 한 주기 뒤에 발생
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval: Some(interval),
            period,
        }
    }

    /// 다음 틱까지 대기. 정지된 시계는 영원히 대기한다
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// 시계 정지 (복구 불가)
    pub fn stop(&mut self) {
        if self.interval.take().is_some() {
            debug!("세션 시계 정지");
        }
    }

    /// 동작 중 여부
    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// 틱 간격
    pub fn period(&self) -> Duration {
        self.period
    }
}
