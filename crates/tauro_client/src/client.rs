//! Answer service client: the `AnswerClient` seam used by the session, and the
//! HTTP implementation (`POST /ask`, `GET /health`).

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::messages::{AskRequest, AskResponse, ErrorDetail, HealthStatus};

/// Default address of the answer service.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Turns a question into an answer. The session depends only on this trait.
pub trait AnswerClient: Send + Sync {
    fn ask(&self, question: &str) -> impl Future<Output = Result<String, ClientError>> + Send;
}

/// Answer client error. Only ever logged; the user sees a fixed message.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error(
        "server returned status {status}: {}",
        .detail.as_deref().unwrap_or("no detail")
    )]
    Status { status: u16, detail: Option<String> },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// HTTP client for the answer service.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    /// Create a client for the service at `base_url` (e.g. `http://127.0.0.1:8000`).
    ///
    /// Only the connect phase is bounded; answers may take as long as the
    /// service needs. Fails if the TLS backend cannot be initialized.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Probe `GET /health`.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let url = self.endpoint("health");
        tracing::debug!(%url, "probing answer service");
        let response = self.http.get(&url).send().await?;
        read_json(response).await
    }
}

impl AnswerClient for HttpClient {
    async fn ask(&self, question: &str) -> Result<String, ClientError> {
        let url = self.endpoint("ask");
        tracing::debug!(%url, chars = question.chars().count(), "posting question");
        let response = self
            .http
            .post(&url)
            .json(&AskRequest::new(question))
            .send()
            .await?;
        let reply: AskResponse = read_json(response).await?;
        tracing::debug!(chars = reply.answer.chars().count(), "answer received");
        Ok(reply.answer)
    }
}

/// Decode a 2xx body as `T`; turn anything else into `ClientError::Status`.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorDetail>(&body)
            .ok()
            .map(ErrorDetail::into_text);
        return Err(ClientError::Status {
            status: status.as_u16(),
            detail,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn new_builds_client_for_base_url() {
        let client = HttpClient::new("http://127.0.0.1:8000/").expect("client should build");
        assert_eq!(client.base_url(), "http://127.0.0.1:8000/");
        assert_eq!(client.endpoint("ask"), "http://127.0.0.1:8000/ask");
    }

    #[tokio::test]
    async fn ask_posts_question_and_returns_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ask"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({ "question": "Hello" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "answer": "Hi there" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(server.uri()).unwrap();
        let answer = client.ask("Hello").await.expect("ask should succeed");
        assert_eq!(answer, "Hi there");
    }

    #[tokio::test]
    async fn trailing_slash_in_base_url_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ask"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "answer": "ok" })),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(format!("{}/", server.uri())).unwrap();
        assert_eq!(client.ask("q").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn server_error_carries_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ask"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({ "detail": "CRM unavailable" })),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(server.uri()).unwrap();
        let err = client.ask("Hello").await.unwrap_err();
        match &err {
            ClientError::Status { status, detail } => {
                assert_eq!(*status, 500);
                assert_eq!(detail.as_deref(), Some("CRM unavailable"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert!(err.to_string().contains("CRM unavailable"));
    }

    #[tokio::test]
    async fn status_error_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = HttpClient::new(server.uri()).unwrap().ask("Hello").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Status {
                status: 404,
                detail: None
            }
        ));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ask"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = HttpClient::new(server.uri()).unwrap().ask("Hello").await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn missing_answer_field_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ask"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "reply": "x" })),
            )
            .mount(&server)
            .await;

        let err = HttpClient::new(server.uri()).unwrap().ask("Hello").await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_request_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = HttpClient::new(format!("http://127.0.0.1:{port}")).unwrap();
        let err = client.ask("Hello").await.unwrap_err();
        assert!(matches!(err, ClientError::Request(_)));
    }

    #[tokio::test]
    async fn health_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "ok" })),
            )
            .mount(&server)
            .await;

        let status = HttpClient::new(server.uri()).unwrap().health().await.unwrap();
        assert!(status.is_ok());
    }
}
