//! Jobs REST collaborator: submission, listing and termination.

use std::sync::Arc;

use async_trait::async_trait;
use jut_proto::{JobInfo, JobRequest, JobSummary};
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::authorized;
use crate::error::ClientError;
use crate::token::TokenManager;

/// Operations on `<data_url>/api/v1/jobs`.
#[async_trait]
pub trait JobsApi: Send + Sync {
    /// Start a program on an already-open channel.
    ///
    /// A refused program surfaces as [`ClientError::JobSubmission`] carrying
    /// the full response body.
    async fn submit(&self, data_url: &str, request: &JobRequest) -> Result<JobInfo, ClientError>;

    /// Running jobs on one endpoint, tagged with that endpoint.
    async fn list(&self, data_url: &str) -> Result<Vec<JobSummary>, ClientError>;

    /// Terminate a job.
    async fn delete(&self, data_url: &str, job_id: &str) -> Result<(), ClientError>;
}

/// HTTP implementation of [`JobsApi`].
#[derive(Debug, Clone)]
pub struct HttpJobs {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
}

impl HttpJobs {
    /// Create a jobs client.
    #[must_use]
    pub fn new(http: reqwest::Client, tokens: Arc<TokenManager>) -> Self {
        Self { http, tokens }
    }

    async fn bearer(&self) -> Result<String, ClientError> {
        Ok(self.tokens.get_credential().await?.token().to_string())
    }
}

fn jobs_url(data_url: &str) -> String {
    format!("{}/api/v1/jobs", data_url.trim_end_matches('/'))
}

#[async_trait]
impl JobsApi for HttpJobs {
    async fn submit(&self, data_url: &str, request: &JobRequest) -> Result<JobInfo, ClientError> {
        let token = self.bearer().await?;
        let response = authorized(self.http.post(jobs_url(data_url)), &token)
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if status != 200 || body.get("code").is_some() {
            debug!(status, "job submission refused");
            return Err(ClientError::JobSubmission { status, body });
        }

        let job: JobInfo = serde_json::from_value(body)
            .map_err(|e| ClientError::Protocol(format!("unexpected job submission answer: {e}")))?;
        info!(job_id = %job.job_id(), sinks = job.sinks.len(), "job started");
        Ok(job)
    }

    async fn list(&self, data_url: &str) -> Result<Vec<JobSummary>, ClientError> {
        let token = self.bearer().await?;
        let response = authorized(self.http.get(jobs_url(data_url)), &token)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, message });
        }

        let mut jobs: Vec<JobSummary> = response.json().await?;
        for job in &mut jobs {
            job.data_url = data_url.to_string();
        }
        Ok(jobs)
    }

    async fn delete(&self, data_url: &str, job_id: &str) -> Result<(), ClientError> {
        let token = self.bearer().await?;
        let url = format!("{}/{}", jobs_url(data_url), job_id.trim());
        let response = authorized(self.http.delete(url), &token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        info!(job_id = %job_id, "job deleted");
        Ok(())
    }
}

/// Running jobs across every endpoint.
///
/// # Errors
///
/// Returns the first listing failure.
pub async fn list_all(
    jobs: &dyn JobsApi,
    data_urls: &[String],
) -> Result<Vec<JobSummary>, ClientError> {
    let mut all = Vec::new();
    for url in data_urls {
        all.extend(jobs.list(url).await?);
    }
    Ok(all)
}

/// Find the endpoint that owns `job_id`.
///
/// # Errors
///
/// Returns [`ClientError::JobNotFound`] when no endpoint lists the job.
pub async fn locate_job(
    jobs: &dyn JobsApi,
    data_urls: &[String],
    job_id: &str,
) -> Result<JobSummary, ClientError> {
    let job_id = job_id.trim();
    for url in data_urls {
        if let Some(found) = jobs.list(url).await?.into_iter().find(|j| j.id == job_id) {
            debug!(job_id = %job_id, data_url = %found.data_url, "located job");
            return Ok(found);
        }
    }
    Err(ClientError::JobNotFound(job_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessToken, AuthProvider};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken;

    #[async_trait]
    impl AuthProvider for StaticToken {
        async fn request_token(&self) -> Result<AccessToken, ClientError> {
            Ok(AccessToken {
                access_token: "tok".into(),
                token_type: "Bearer".into(),
                expires_in: Some(3600),
            })
        }
    }

    fn client() -> HttpJobs {
        HttpJobs::new(
            reqwest::Client::new(),
            Arc::new(TokenManager::new(Arc::new(StaticToken))),
        )
    }

    fn request() -> JobRequest {
        JobRequest {
            channel_id: "ch-1".into(),
            alias: Some("demo".into()),
            program: "emit -limit 5".into(),
        }
    }

    #[tokio::test]
    async fn submit_posts_request_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/jobs"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({
                "channel_id": "ch-1",
                "alias": "demo",
                "program": "emit -limit 5"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "job": {"id": "job-9"},
                "sinks": [{"channel": "s0", "name": "table"}],
                "now": "2014-01-01T00:00:00.000Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let info = client().submit(&server.uri(), &request()).await.unwrap();
        assert_eq!(info.job_id(), "job-9");
        assert_eq!(info.sinks.len(), 1);
        assert!(info.extra.contains_key("now"));
    }

    #[tokio::test]
    async fn submit_non_200_embeds_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/jobs"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "message": "no such sub: foo"
            })))
            .mount(&server)
            .await;

        let err = client().submit(&server.uri(), &request()).await.unwrap_err();
        match err {
            ClientError::JobSubmission { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body["message"], "no such sub: foo");
            }
            other => panic!("expected submission error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn submit_200_with_code_is_refusal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "JUTTLE-SYNTAX-ERROR",
                "message": "Error: no such sub: foo",
                "info": {"location": {"filename": "main", "start": {"line": 1, "column": 1}}}
            })))
            .mount(&server)
            .await;

        let err = client().submit(&server.uri(), &request()).await.unwrap_err();
        assert!(matches!(err, ClientError::JobSubmission { status: 200, .. }));
    }

    #[tokio::test]
    async fn list_tags_data_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "a", "alias": "x", "user": "u1", "_start_time": "t", "timeout": 0},
                {"id": "b", "alias": "y", "user": "u2", "_start_time": "t", "timeout": 30}
            ])))
            .mount(&server)
            .await;

        let jobs = client().list(&server.uri()).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.data_url == server.uri()));
        assert!(jobs[0].is_persistent());
    }

    #[tokio::test]
    async fn delete_hits_job_path() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/jobs/job-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client().delete(&server.uri(), " job-1 ").await.unwrap();
    }

    #[tokio::test]
    async fn delete_failure_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/jobs/job-1"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;

        let err = client().delete(&server.uri(), "job-1").await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn locate_scans_every_endpoint() {
        let first = MockServer::start().await;
        let second = MockServer::start().await;
        for (server, id) in [(&first, "a"), (&second, "b")] {
            Mock::given(method("GET"))
                .and(path("/api/v1/jobs"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": id}])))
                .mount(server)
                .await;
        }

        let urls = vec![first.uri(), second.uri()];
        let jobs = client();
        let found = locate_job(&jobs, &urls, "b").await.unwrap();
        assert_eq!(found.data_url, second.uri());

        let all = list_all(&jobs, &urls).await.unwrap();
        assert_eq!(all.len(), 2);

        let err = locate_job(&jobs, &urls, "zzz").await.unwrap_err();
        assert!(matches!(err, ClientError::JobNotFound(id) if id == "zzz"));
    }
}
