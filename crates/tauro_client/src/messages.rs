//! HTTP message types exchanged with the answer service. Client ↔ server JSON.

use serde::{Deserialize, Serialize};

/// Client → server: body of `POST /ask`.
#[derive(Debug, Clone, Serialize)]
pub struct AskRequest<'a> {
    pub question: &'a str,
}

impl<'a> AskRequest<'a> {
    pub fn new(question: &'a str) -> Self {
        Self { question }
    }
}

/// Server → client: successful `/ask` reply. Extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

/// Server → client: error body (`{"detail": "..."}`) sent with non-2xx replies.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub detail: serde_json::Value,
}

impl ErrorDetail {
    /// Best-effort text of the detail; validation errors arrive as arrays.
    pub fn into_text(self) -> String {
        match self.detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        }
    }
}

/// Server → client: `GET /health` reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_request_serializes_question_only() {
        let json = serde_json::to_string(&AskRequest::new("Hello")).unwrap();
        assert_eq!(json, r#"{"question":"Hello"}"#);
    }

    #[test]
    fn ask_response_ignores_unknown_fields() {
        let resp: AskResponse =
            serde_json::from_str(r#"{"answer":"Hi there","sources":[]}"#).unwrap();
        assert_eq!(resp.answer, "Hi there");
    }

    #[test]
    fn ask_response_requires_string_answer() {
        assert!(serde_json::from_str::<AskResponse>(r#"{"reply":"x"}"#).is_err());
        assert!(serde_json::from_str::<AskResponse>(r#"{"answer":42}"#).is_err());
    }

    #[test]
    fn error_detail_text() {
        let d: ErrorDetail = serde_json::from_str(r#"{"detail":"boom"}"#).unwrap();
        assert_eq!(d.into_text(), "boom");
        let d: ErrorDetail = serde_json::from_str(r#"{"detail":[{"msg":"bad"}]}"#).unwrap();
        assert_eq!(d.into_text(), r#"[{"msg":"bad"}]"#);
    }
}
