//! 시험 문항 모델.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::CoreError;

/// 객관식 문항. 세션에 로드된 이후 변경되지 않는다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// 문항 식별자 (세션 내 유일)
    pub id: String,
    /// 문제 본문
    pub prompt: String,
    /// 선택지 (2개 이상, 순서 고정)
    pub options: Vec<String>,
    /// 정답 선택지 인덱스
    pub correct_option_index: usize,
    /// 분류 (예: "python")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Question {
    /// 문항 형식 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.prompt.trim().is_empty() {
            return Err(CoreError::InvalidResponse(format!(
                "문항 {}: 본문이 비어 있음",
                self.id
            )));
        }
        if self.options.len() < 2 {
            return Err(CoreError::InvalidResponse(format!(
                "문항 {}: 선택지가 2개 미만 ({}개)",
                self.id,
                self.options.len()
            )));
        }
        if self.correct_option_index >= self.options.len() {
            return Err(CoreError::InvalidResponse(format!(
                "문항 {}: 정답 인덱스 {} 범위 초과",
                self.id, self.correct_option_index
            )));
        }
        Ok(())
    }

    /// 선택지 인덱스가 유효한지
    pub fn has_option(&self, option: usize) -> bool {
        option < self.options.len()
    }
}

/// 문항 집합 검증: 비어 있지 않고, 각 문항이 유효하며, id가 중복되지 않아야 한다.
pub fn validate_question_set(questions: &[Question]) -> Result<(), CoreError> {
    if questions.is_empty() {
        return Err(CoreError::InvalidResponse("문항이 없음".to_string()));
    }
    let mut seen = HashSet::with_capacity(questions.len());
    for q in questions {
        q.validate()?;
        if !seen.insert(q.id.as_str()) {
            return Err(CoreError::InvalidResponse(format!("중복 문항 id: {}", q.id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, options: usize, answer: usize) -> Question {
        Question {
            id: id.to_string(),
            prompt: format!("문항 {id}"),
            options: (0..options).map(|i| format!("opt{i}")).collect(),
            correct_option_index: answer,
            category: None,
        }
    }

    #[test]
    fn valid_question_passes() {
        assert!(question("q1", 4, 3).validate().is_ok());
    }

    #[test]
    fn rejects_single_option() {
        let err = question("q1", 1, 0).validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidResponse(_)));
    }

    #[test]
    fn rejects_answer_out_of_range() {
        assert!(question("q1", 3, 3).validate().is_err());
    }

    #[test]
    fn rejects_duplicate_ids_and_empty_set() {
        assert!(validate_question_set(&[]).is_err());
        let set = vec![question("q1", 2, 0), question("q1", 2, 1)];
        assert!(validate_question_set(&set).is_err());
    }
}
