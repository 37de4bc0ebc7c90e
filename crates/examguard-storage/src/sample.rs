//! 내장 샘플 문항.
//!
//! 원격 서버와 로컬 문항 은행이 모두 없을 때 사용하는 Python 기초 문항 5개.

use async_trait::async_trait;
use examguard_core::error::CoreError;
use examguard_core::models::question::Question;
use examguard_core::ports::question_source::QuestionSource;
use tracing::debug;

/// 샘플 문항 분류
pub const SAMPLE_CATEGORY: &str = "python";

fn question(id: &str, prompt: &str, options: &[&str], answer: usize) -> Question {
    Question {
        id: id.to_string(),
        prompt: prompt.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_option_index: answer,
        category: Some(SAMPLE_CATEGORY.to_string()),
    }
}

/// Python 샘플 문항 5개 (고정 순서)
pub fn sample_questions() -> Vec<Question> {
    vec![
        question(
            "python-1",
            "What is the correct syntax to output 'Hello World' in Python?",
            &[
                "echo \"Hello World\"",
                "print(\"Hello World\")",
                "console.log(\"Hello World\")",
                "System.out.println(\"Hello World\")",
            ],
            1,
        ),
        question(
            "python-2",
            "Which of these is a mutable data type in Python?",
            &["List", "Tuple", "String", "Integer"],
            0,
        ),
        question(
            "python-3",
            "What does the 'in' operator do in Python?",
            &[
                "Checks if a value is present in a sequence",
                "Performs addition",
                "Performs subtraction",
                "Defines a class",
            ],
            0,
        ),
        question(
            "python-4",
            "What is the purpose of a 'for' loop in Python?",
            &[
                "To iterate over a sequence",
                "To define a function",
                "To handle exceptions",
                "To create a class",
            ],
            0,
        ),
        question(
            "python-5",
            "Which keyword is used to define a function in Python?",
            &["function", "def", "procedure", "method"],
            1,
        ),
    ]
}

/// 내장 샘플만 돌려주는 문항 공급원
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedQuestionSource;

#[async_trait]
impl QuestionSource for EmbeddedQuestionSource {
    async fn fetch(&self, code: &str) -> Result<Vec<Question>, CoreError> {
        if code != SAMPLE_CATEGORY {
            return Err(CoreError::NotFound {
                resource_type: "QuestionSet".to_string(),
                id: code.to_string(),
            });
        }
        debug!("내장 샘플 문항 사용");
        Ok(sample_questions())
    }
}
