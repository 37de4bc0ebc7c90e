//! 세션 결과 리포트 모델.
//!
//! 종결된 세션에 대한 읽기 전용 뷰. 문서 생성기는 이 구조만 소비한다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use super::session::SessionStatus;

/// 문항별 결과 행
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    /// 1부터 시작하는 문항 번호
    pub number: usize,
    /// 문제 본문
    pub prompt: String,
    /// 선택한 선택지 문구
    pub selected: Option<String>,
    /// 정답 선택지 문구
    pub correct: String,
    /// 정답 여부
    pub is_correct: bool,
}

/// 세션 결과 리포트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// 응시자
    pub candidate: String,
    /// 종결 상태
    pub status: SessionStatus,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
    /// 종결 시각
    pub ended_at: Option<DateTime<Utc>>,
    /// 점수
    pub score: u32,
    /// 전체 문항 수
    pub total: usize,
    /// 소요 시간 (초)
    pub time_spent_secs: u64,
    /// 누적 위반 횟수
    pub violation_count: u32,
    /// 위반 한도
    pub violation_limit: u32,
    /// 문항별 결과
    pub rows: Vec<ReportRow>,
}

impl SessionReport {
    /// 정답률 (%)
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.score) * 100.0 / self.total as f64
    }

    /// 평문 리포트 렌더링
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Test Report");
        let _ = writeln!(out, "Candidate: {}", self.candidate);
        let _ = writeln!(out, "Status: {}", self.status);
        let _ = writeln!(
            out,
            "Start Time: {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        );
        if let Some(ended) = self.ended_at {
            let _ = writeln!(out, "End Time: {}", ended.format("%Y-%m-%d %H:%M:%S"));
        }
        let _ = writeln!(
            out,
            "Score: {}/{} ({:.2}%)",
            self.score,
            self.total,
            self.percentage()
        );
        let _ = writeln!(
            out,
            "Time Spent: {}m {}s",
            self.time_spent_secs / 60,
            self.time_spent_secs % 60
        );
        let _ = writeln!(
            out,
            "Warnings: {} / {}",
            self.violation_count, self.violation_limit
        );
        for row in &self.rows {
            let _ = writeln!(out);
            let _ = writeln!(out, "Q{}: {}", row.number, row.prompt);
            let _ = writeln!(
                out,
                "Your answer: {}",
                row.selected.as_deref().unwrap_or("Not answered")
            );
            let _ = writeln!(
                out,
                "{}",
                if row.is_correct { "Correct" } else { "Incorrect" }
            );
            let _ = writeln!(out, "Correct answer: {}", row.correct);
        }
        out
    }
}
