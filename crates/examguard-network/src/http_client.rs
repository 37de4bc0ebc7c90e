//! 퀴즈 서버 REST 클라이언트.
//!
//! `QuestionSource` + `SubmissionClient` 포트 구현. 선택적 Bearer 토큰 + 재시도 로직.

use async_trait::async_trait;
use examguard_core::error::CoreError;
use examguard_core::models::question::Question;
use examguard_core::models::submission::{Submission, SubmissionAck};
use examguard_core::ports::question_source::QuestionSource;
use examguard_core::ports::submission::SubmissionClient;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::connectivity::HealthProbe;

/// 기본 재시도 횟수
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Retry-After 헤더가 없을 때 대기 시간 (초)
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// 재시도 가능한 에러인지 판별
fn is_retryable(error: &CoreError) -> bool {
    error.is_retryable()
}

/// 퀴즈 서버 클라이언트
pub struct HttpExamClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    max_retries: u32,
}

impl HttpExamClient {
    /// 새 클라이언트 생성
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CoreError> {
        url::Url::parse(base_url)
            .map_err(|e| CoreError::Config(format!("잘못된 서버 URL '{base_url}': {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Bearer 토큰 설정
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    /// 재시도 횟수 설정
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let req = self.client.request(method, &url);
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(
        &self,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, CoreError> {
        let status = resp.status();

        if status.is_success() {
            return Ok(resp);
        }

        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });

        match status.as_u16() {
            401 | 403 => Err(CoreError::Auth(format!("인증 실패: {text}"))),
            404 => Err(CoreError::NotFound {
                resource_type: "API".to_string(),
                id: text,
            }),
            429 => Err(CoreError::RateLimit {
                retry_after_secs: retry_after,
            }),
            502..=504 => Err(CoreError::ServiceUnavailable(text)),
            _ => Err(CoreError::Internal(format!("API 에러 ({status}): {text}"))),
        }
    }

    /// 재시도가 포함된 요청 실행
    ///
    /// exponential backoff: 1s → 2s → 4s (상한 30s)
    async fn execute_with_retry<F, Fut, T>(&self, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut last_error = CoreError::Internal("요청 실패".to_string());
        let mut delay = Duration::from_secs(1);

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !is_retryable(&e) || attempt == self.max_retries {
                        return Err(e);
                    }

                    warn!(
                        "요청 실패 (시도 {}/{}): {e}, {delay:?} 후 재시도",
                        attempt + 1,
                        self.max_retries + 1
                    );

                    if let CoreError::RateLimit { retry_after_secs } = &e {
                        delay = Duration::from_secs(*retry_after_secs);
                    }

                    last_error = e;
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(30));
                }
            }
        }

        Err(last_error)
    }
}

// ============================================================
// 퀴즈 응답 형식
// ============================================================

#[derive(Debug, Deserialize)]
struct QuizPayload {
    questions: QuestionsField,
}

/// 문항 목록은 배열 또는 배열을 담은 JSON 문자열로 온다
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionsField {
    List(Vec<RemoteQuestion>),
    Encoded(String),
}

#[derive(Debug, Deserialize)]
struct RemoteQuestion {
    question: String,
    options: Vec<String>,
    answer: usize,
    #[serde(default)]
    category: Option<String>,
}

/// `GET /api/quiz/{code}` 응답 본문을 문항 목록으로 변환
///
/// 문항 id는 `{code}-{순번}` (1부터).
pub fn parse_quiz_payload(code: &str, body: &str) -> Result<Vec<Question>, CoreError> {
    let payload: QuizPayload = serde_json::from_str(body)
        .map_err(|e| CoreError::InvalidResponse(format!("퀴즈 응답 형식 오류: {e}")))?;

    let remote = match payload.questions {
        QuestionsField::List(list) => list,
        QuestionsField::Encoded(text) => {
            let text = text
                .trim()
                .trim_start_matches("```json")
                .trim_start_matches("```")
                .trim_end_matches("```")
                .trim();
            serde_json::from_str::<Vec<RemoteQuestion>>(text)
                .map_err(|e| CoreError::InvalidResponse(format!("문항 문자열 파싱 실패: {e}")))?
        }
    };

    Ok(remote
        .into_iter()
        .enumerate()
        .map(|(i, q)| Question {
            id: format!("{code}-{}", i + 1),
            prompt: q.question,
            options: q.options,
            correct_option_index: q.answer,
            category: q.category,
        })
        .collect())
}

#[async_trait]
impl QuestionSource for HttpExamClient {
    async fn fetch(&self, code: &str) -> Result<Vec<Question>, CoreError> {
        debug!("퀴즈 조회 요청: {code}");

        let body = self
            .execute_with_retry(|| async {
                let resp = self
                    .request(reqwest::Method::GET, &format!("/api/quiz/{code}"))
                    .send()
                    .await
                    .map_err(|e| CoreError::Network(format!("퀴즈 조회 요청 실패: {e}")))?;

                let resp = self.check_response(resp).await?;
                resp.text()
                    .await
                    .map_err(|e| CoreError::Network(format!("퀴즈 응답 읽기 실패: {e}")))
            })
            .await?;

        let questions = parse_quiz_payload(code, &body)?;
        info!("퀴즈 조회 성공: {code}, 문항 {}개", questions.len());
        Ok(questions)
    }
}

#[async_trait]
impl SubmissionClient for HttpExamClient {
    /// 비멱등 요청이므로 재시도하지 않는다
    async fn submit(&self, submission: &Submission) -> Result<SubmissionAck, CoreError> {
        debug!(
            "답안 제출: user={}, quiz={}, score={}",
            submission.user_id, submission.quiz_id, submission.score
        );

        let resp = self
            .request(reqwest::Method::POST, "/api/submit-quiz")
            .json(submission)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("답안 제출 요청 실패: {e}")))?;

        let resp = self.check_response(resp).await?;
        let ack: SubmissionAck = resp
            .json()
            .await
            .map_err(|e| CoreError::InvalidResponse(format!("제출 응답 파싱 실패: {e}")))?;

        info!("답안 제출 완료: report_id={:?}", ack.report_id);
        Ok(ack)
    }
}

#[async_trait]
impl HealthProbe for HttpExamClient {
    /// 서버가 응답하면 성공. 5xx와 전송 실패만 실패로 본다
    async fn ping(&self) -> Result<(), CoreError> {
        let resp = self
            .request(reqwest::Method::GET, "/")
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("헬스 체크 실패: {e}")))?;

        if resp.status().is_server_error() {
            return Err(CoreError::ServiceUnavailable(format!(
                "헬스 체크 응답: {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(server: &mockito::ServerGuard) -> HttpExamClient {
        HttpExamClient::new(&server.url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn http_client_creation() {
        let client = HttpExamClient::new("http://localhost:5000/", Duration::from_secs(30)).unwrap();
        assert_eq!(client.base_url, "http://localhost:5000");
        assert_eq!(client.max_retries, DEFAULT_MAX_RETRIES);
        assert!(client.auth_token.is_none());
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            HttpExamClient::new("not a url", Duration::from_secs(1)),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn empty_token_is_ignored() {
        let client = HttpExamClient::new("http://localhost:5000", Duration::from_secs(1))
            .unwrap()
            .with_auth_token(Some(String::new()))
            .with_max_retries(0);
        assert!(client.auth_token.is_none());
        assert_eq!(client.max_retries, 0);
    }

    #[test]
    fn parse_array_payload() {
        let body = r#"{"_id":"abc","questions":[
            {"question":"Which keyword is used to define a function in Python?",
             "options":["function","def","procedure","method"],"answer":1}
        ]}"#;
        let questions = parse_quiz_payload("abc", body).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, "abc-1");
        assert_eq!(questions[0].correct_option_index, 1);
        assert_eq!(questions[0].options[1], "def");
    }

    #[test]
    fn parse_string_encoded_payload() {
        let inner = r#"[{"question":"Q1","options":["a","b"],"answer":0,"category":"python"},
                        {"question":"Q2","options":["c","d"],"answer":1}]"#;
        let body = serde_json::json!({ "_id": "xyz", "questions": inner }).to_string();
        let questions = parse_quiz_payload("xyz", &body).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[1].id, "xyz-2");
        assert_eq!(questions[0].category.as_deref(), Some("python"));
    }

    #[test]
    fn parse_rejects_malformed_payload() {
        assert!(matches!(
            parse_quiz_payload("x", r#"{"questions":"not json"}"#),
            Err(CoreError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_quiz_payload("x", r#"{"questions":[{"question":"q"}]}"#),
            Err(CoreError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_quiz_payload("x", r#"{"message":"Quiz not found"}"#),
            Err(CoreError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn fetch_quiz_success_with_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/quiz/quiz42")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"_id":"quiz42","questions":[{"question":"Q","options":["a","b"],"answer":0}]}"#)
            .create_async()
            .await;

        let client = client(&server).with_auth_token(Some("tok".to_string()));
        let questions = client.fetch("quiz42").await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, "quiz42-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_quiz_not_found() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/quiz/missing")
            .with_status(404)
            .with_body(r#"{"message":"Quiz not found"}"#)
            .expect(1)
            .create_async()
            .await;

        let result = client(&server).fetch("missing").await;
        assert!(matches!(result, Err(CoreError::NotFound { .. })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_retries_service_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/quiz/busy")
            .with_status(503)
            .with_body("maintenance")
            .expect(2)
            .create_async()
            .await;

        let result = client(&server).with_max_retries(1).fetch("busy").await;
        assert!(matches!(result, Err(CoreError::ServiceUnavailable(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/quiz/secret")
            .with_status(401)
            .with_body("Token is missing")
            .expect(1)
            .create_async()
            .await;

        let result = client(&server).fetch("secret").await;
        let err = format!("{}", result.unwrap_err());
        assert!(err.contains("인증"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn submit_posts_camel_case_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/submit-quiz")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "userId": "kim@example.com",
                "quizId": "quiz42",
                "answers": [1, null],
                "score": 1
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"Quiz submitted successfully","reportId":"r-1"}"#)
            .create_async()
            .await;

        let ack = client(&server)
            .submit(&Submission {
                user_id: "kim@example.com".into(),
                quiz_id: "quiz42".into(),
                answers: vec![Some(1), None],
                score: 1,
            })
            .await
            .unwrap();
        assert_eq!(ack.report_id.as_deref(), Some("r-1"));
        assert_eq!(ack.message, "Quiz submitted successfully");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn submit_failure_is_single_attempt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/submit-quiz")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let result = client(&server)
            .submit(&Submission {
                user_id: "u".into(),
                quiz_id: "q".into(),
                answers: vec![None],
                score: 0,
            })
            .await;
        assert!(matches!(result, Err(CoreError::ServiceUnavailable(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn ping_treats_client_errors_as_reachable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(404)
            .create_async()
            .await;
        assert!(client(&server).ping().await.is_ok());
    }
}
