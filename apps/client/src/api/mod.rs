//! Resume API client: the single point of entry for all backend calls.
//!
//! ARCHITECTURAL RULE: No other module may perform network I/O.
//! The workflow engine talks to the backend exclusively through the
//! `ResumeService` trait, so tests can swap in a scripted fake.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::SessionStore;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error (status {status}): {detail}")]
    Server { status: u16, detail: String },

    #[error("authentication required or session expired")]
    Auth,
}

/// A resume file as selected by the user: original file name plus raw bytes.
#[derive(Debug, Clone)]
pub struct ResumeFile {
    pub file_name: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpRequested {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthToken {
    pub token: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScoreResponse {
    /// ATS match score in 0..=100.
    pub ats_score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewriteResponse {
    pub rewritten_resume: String,
    /// Score of the rewritten resume. Older backend builds omit it.
    pub ats_score: Option<f64>,
}

/// Error body shape used by the backend for 4xx responses.
#[derive(Debug, Deserialize)]
struct ErrorDetail {
    detail: String,
}

/// One method per remote capability. No caching, no retries: failures
/// propagate immediately and the engine decides what the user sees.
#[async_trait]
pub trait ResumeService: Send + Sync {
    async fn request_otp(&self, email: &str) -> Result<OtpRequested, ApiError>;
    async fn signup(&self, email: &str, otp: &str, password: &str) -> Result<AuthToken, ApiError>;
    async fn login(&self, email: &str, password: &str) -> Result<AuthToken, ApiError>;
    async fn upload_resume(&self, resume: &ResumeFile, jd: &str) -> Result<(), ApiError>;
    async fn ats_score(&self, jd: &str) -> Result<ScoreResponse, ApiError>;
    async fn rewrite(&self, jd: &str) -> Result<RewriteResponse, ApiError>;
    async fn download_pdf(&self) -> Result<Bytes, ApiError>;
}

/// The reqwest-backed `ResumeService` used by the real client.
/// Attaches the current credential as a bearer token whenever one is held.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, session: Arc<SessionStore>) -> Self {
        Self {
            http: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn jd_form(jd: &str) -> Form {
        Form::new().text("jd", jd.to_string())
    }

    /// Classifies a non-2xx response: 401 becomes `Auth`, anything else
    /// becomes `Server` with the backend's `{"detail": ...}` message when
    /// parseable, else the raw body.
    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Auth);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorDetail>(&body)
            .map(|e| e.detail)
            .unwrap_or_else(|_| {
                if body.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                } else {
                    body
                }
            });
        warn!("API returned {status}: {detail}");
        Err(ApiError::Server {
            status: status.as_u16(),
            detail,
        })
    }

    async fn handle<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ResumeService for ApiClient {
    async fn request_otp(&self, email: &str) -> Result<OtpRequested, ApiError> {
        let response = self
            .http
            .post(self.url("/request-otp"))
            .json(&json!({ "email": email }))
            .send()
            .await?;
        Self::handle(response).await
    }

    async fn signup(&self, email: &str, otp: &str, password: &str) -> Result<AuthToken, ApiError> {
        let response = self
            .http
            .post(self.url("/signup"))
            .json(&json!({ "email": email, "password": password, "otp": otp }))
            .send()
            .await?;
        Self::handle(response).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthToken, ApiError> {
        let response = self
            .http
            .post(self.url("/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        Self::handle(response).await
    }

    async fn upload_resume(&self, resume: &ResumeFile, jd: &str) -> Result<(), ApiError> {
        let part = Part::bytes(resume.bytes.to_vec())
            .file_name(resume.file_name.clone())
            .mime_str("application/pdf")?;
        let form = Form::new()
            .part("resume", part)
            .text("jd", jd.to_string());
        let response = self
            .authorize(self.http.post(self.url("/upload")).multipart(form))
            .send()
            .await?;
        Self::check(response).await?;
        debug!("resume registered with backend");
        Ok(())
    }

    async fn ats_score(&self, jd: &str) -> Result<ScoreResponse, ApiError> {
        let response = self
            .authorize(self.http.post(self.url("/ats-score")).multipart(Self::jd_form(jd)))
            .send()
            .await?;
        let score: ScoreResponse = Self::handle(response).await?;
        debug!("ATS score received: {}", score.ats_score);
        Ok(score)
    }

    async fn rewrite(&self, jd: &str) -> Result<RewriteResponse, ApiError> {
        let response = self
            .authorize(self.http.post(self.url("/rewrite")).multipart(Self::jd_form(jd)))
            .send()
            .await?;
        let rewrite: RewriteResponse = Self::handle(response).await?;
        debug!(
            "rewrite received: {} chars, optimized score {:?}",
            rewrite.rewritten_resume.len(),
            rewrite.ats_score
        );
        Ok(rewrite)
    }

    async fn download_pdf(&self) -> Result<Bytes, ApiError> {
        let response = self
            .authorize(self.http.get(self.url("/generate-ats-pdf")))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> (ApiClient, Arc<SessionStore>) {
        let session = Arc::new(SessionStore::new());
        let client = ApiClient::new(
            server.uri(),
            Duration::from_secs(5),
            Arc::clone(&session),
        );
        (client, session)
    }

    #[tokio::test]
    async fn test_login_returns_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_json(json!({ "email": "a@b.c", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "t1" })))
            .mount(&server)
            .await;

        let (client, _) = client(&server);
        let auth = client.login("a@b.c", "pw").await.unwrap();
        assert_eq!(auth.token, "t1");
    }

    #[tokio::test]
    async fn test_unauthorized_classified_as_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ats-score"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (client, _) = client(&server);
        let err = client.ats_score("some jd").await.unwrap_err();
        assert!(matches!(err, ApiError::Auth));
    }

    #[tokio::test]
    async fn test_detail_body_classified_as_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ats-score"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "detail": "Upload resume first." })),
            )
            .mount(&server)
            .await;

        let (client, _) = client(&server);
        let err = client.ats_score("some jd").await.unwrap_err();
        match err {
            ApiError::Server { status, detail } => {
                assert_eq!(status, 400);
                assert_eq!(detail, "Upload resume first.");
            }
            other => panic!("expected Server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ats_score_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ats-score"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ats_score": 64.0 })))
            .mount(&server)
            .await;

        let (client, _) = client(&server);
        let score = client.ats_score("some jd").await.unwrap();
        assert_eq!(score.ats_score, 64.0);
    }

    #[tokio::test]
    async fn test_rewrite_without_score_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rewrite"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "rewritten_resume": "X" })),
            )
            .mount(&server)
            .await;

        let (client, _) = client(&server);
        let rewrite = client.rewrite("some jd").await.unwrap();
        assert_eq!(rewrite.rewritten_resume, "X");
        assert_eq!(rewrite.ats_score, None);
    }

    #[tokio::test]
    async fn test_upload_acks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client(&server);
        let resume = ResumeFile {
            file_name: "resume.pdf".to_string(),
            bytes: Bytes::from_static(b"%PDF-1.4 fake"),
        };
        client.upload_resume(&resume, "some jd").await.unwrap();
    }

    #[tokio::test]
    async fn test_download_returns_bytes_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generate-ats-pdf"))
            .and(header("authorization", "Bearer t1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 real".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let (client, session) = client(&server);
        session.set_token("t1");
        let blob = client.download_pdf().await.unwrap();
        assert_eq!(blob.as_ref(), b"%PDF-1.4 real");
    }

    #[tokio::test]
    async fn test_timeout_classified_as_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generate-ats-pdf"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let session = Arc::new(SessionStore::new());
        let client = ApiClient::new(server.uri(), Duration::from_millis(100), session);
        let err = client.download_pdf().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }
}
