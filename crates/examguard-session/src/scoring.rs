//! 채점 및 리포트 생성.

use examguard_core::models::question::Question;
use examguard_core::models::report::{ReportRow, SessionReport};
use std::collections::HashMap;

use crate::machine::ExamSession;

/// 정답 선택지와 일치하는 답의 수
pub fn score(questions: &[Question], answers: &[Option<usize>]) -> u32 {
    questions
        .iter()
        .zip(answers)
        .filter(|(q, a)| **a == Some(q.correct_option_index))
        .count() as u32
}

/// 답안을 `order`의 문항 id 순서로 재배열
///
/// `order`가 현재 문항 구성과 다르면 현재 순서를 그대로 반환한다.
pub fn answers_in_order(
    questions: &[Question],
    answers: &[Option<usize>],
    order: &[String],
) -> Vec<Option<usize>> {
    if order.len() != questions.len() {
        return answers.to_vec();
    }
    let by_id: HashMap<&str, Option<usize>> = questions
        .iter()
        .zip(answers)
        .map(|(q, a)| (q.id.as_str(), *a))
        .collect();
    order
        .iter()
        .map(|id| by_id.get(id.as_str()).copied())
        .collect::<Option<Vec<_>>>()
        .unwrap_or_else(|| answers.to_vec())
}

/// 종결된 세션의 리포트. 진행 중이면 None
pub fn build_report(session: &ExamSession, candidate: &str) -> Option<SessionReport> {
    if !session.status().is_terminal() {
        return None;
    }
    let rows = session
        .questions()
        .iter()
        .zip(session.answers())
        .enumerate()
        .map(|(i, (q, answer))| ReportRow {
            number: i + 1,
            prompt: q.prompt.clone(),
            selected: answer.and_then(|opt| q.options.get(opt).cloned()),
            correct: q.options[q.correct_option_index].clone(),
            is_correct: *answer == Some(q.correct_option_index),
        })
        .collect();

    Some(SessionReport {
        candidate: candidate.to_string(),
        status: session.status(),
        started_at: session.started_at(),
        ended_at: session.ended_at(),
        score: session
            .score()
            .unwrap_or_else(|| score(session.questions(), session.answers())),
        total: session.questions().len(),
        time_spent_secs: session.time_spent_secs(),
        violation_count: session.violation_count(),
        violation_limit: session.settings().violation_limit,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::SessionSettings;

    fn questions() -> Vec<Question> {
        vec![
            Question {
                id: "q1".into(),
                prompt: "What is the correct syntax to output 'Hello World' in Python?".into(),
                options: vec![
                    "echo('Hello World');".into(),
                    "print('Hello World')".into(),
                    "console.log('Hello World');".into(),
                    "System.out.println('Hello World');".into(),
                ],
                correct_option_index: 1,
                category: Some("python".into()),
            },
            Question {
                id: "q2".into(),
                prompt: "How do you insert COMMENTS in Python code?".into(),
                options: vec!["#This is a comment".into(), "//This is a comment".into()],
                correct_option_index: 0,
                category: Some("python".into()),
            },
        ]
    }

    #[test]
    fn score_counts_exact_matches() {
        let qs = questions();
        assert_eq!(score(&qs, &[Some(1), Some(0)]), 2);
        assert_eq!(score(&qs, &[Some(0), None]), 0);
        assert_eq!(score(&qs, &[None, Some(0)]), 1);
    }

    #[test]
    fn answers_follow_fetched_order() {
        let mut shuffled = questions();
        shuffled.reverse();
        let order = vec!["q1".to_string(), "q2".to_string()];

        // 화면 순서: q2, q1
        let answers = answers_in_order(&shuffled, &[Some(0), Some(1)], &order);
        assert_eq!(answers, vec![Some(1), Some(0)]);
        assert_eq!(score(&questions(), &answers), 2);
    }

    #[test]
    fn unknown_order_keeps_local_answers() {
        let qs = questions();
        let local = [Some(1), None];
        assert_eq!(answers_in_order(&qs, &local, &[]), local.to_vec());

        let foreign = vec!["q1".to_string(), "zz".to_string()];
        assert_eq!(answers_in_order(&qs, &local, &foreign), local.to_vec());
    }

    #[test]
    fn report_only_for_terminal_sessions() {
        let mut session = ExamSession::new(questions(), SessionSettings::default()).unwrap();
        assert!(build_report(&session, "candidate@example.com").is_none());

        session.select_answer(0, 1);
        session.submit();
        let report = build_report(&session, "candidate@example.com").unwrap();

        assert_eq!(report.score, 1);
        assert_eq!(report.total, 2);
        assert_eq!(report.percentage(), 50.0);
        assert_eq!(report.rows[0].selected.as_deref(), Some("print('Hello World')"));
        assert!(report.rows[0].is_correct);
        assert_eq!(report.rows[1].selected, None);
        assert!(!report.rows[1].is_correct);
    }

    #[test]
    fn rendered_report_lists_rows() {
        let mut session = ExamSession::new(questions(), SessionSettings::default()).unwrap();
        session.submit();
        let text = build_report(&session, "kim@example.com").unwrap().render_text();

        assert!(text.contains("Candidate: kim@example.com"));
        assert!(text.contains("Score: 0/2 (0.00%)"));
        assert!(text.contains("Warnings: 0 / 5"));
        assert!(text.contains("Q2: How do you insert COMMENTS in Python code?"));
        assert!(text.contains("Your answer: Not answered"));
        assert!(text.contains("Correct answer: #This is a comment"));
    }
}
