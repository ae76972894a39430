//! Job and sink metadata exchanged with the jobs REST API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /api/v1/jobs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRequest {
    /// Channel assigned during the socket handshake.
    pub channel_id: String,
    /// Display name.
    pub alias: Option<String>,
    /// Program text.
    pub program: String,
}

/// Job metadata returned when a job starts.
///
/// Unknown fields (timing, stats) are kept verbatim in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobInfo {
    /// Job identity.
    pub job: JobMeta,
    /// Output branches of the program.
    #[serde(default)]
    pub sinks: Vec<SinkInfo>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobInfo {
    /// Identifier of the started job.
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job.id
    }
}

/// The `job` object inside [`JobInfo`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobMeta {
    /// Job identifier.
    pub id: String,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One sink of a running program.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SinkInfo {
    /// Channel the sink's points arrive on.
    pub channel: String,
    /// Sink name.
    #[serde(default)]
    pub name: Option<String>,
    /// Source location of the sink in the program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A running job as reported by `GET /api/v1/jobs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSummary {
    /// Job identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub alias: Option<String>,
    /// Owning user id.
    #[serde(default)]
    pub user: Option<String>,
    /// Start time as reported by the service.
    #[serde(rename = "_start_time", default)]
    pub start_time: Option<String>,
    /// Idle timeout; `0` marks a persistent job.
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Endpoint that owns the job. Filled in by the client after listing.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data_url: String,
}

impl JobSummary {
    /// Whether the job runs without an idle timeout.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.timeout == Some(0)
    }
}
