//! Client side of the rendering backend's job-queue API.
//!
//! The backend is an opaque service: images go up, a workflow graph is
//! queued, a notification stream signals completion, and the output image
//! comes back down. [`JobBackend`] is the seam; [`HttpBackend`] is the real
//! client and tests substitute a recording fake.

use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::Error;

/// How an uploaded raster is interpreted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Input,
    Mask,
}

impl ImageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageRole::Input => "input",
            ImageRole::Mask => "mask",
        }
    }
}

/// Storage path the backend assigned to an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub path: String,
}

/// Opaque identifier of one queued rendering job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The job-queue operations the render flow needs.
#[allow(async_fn_in_trait)]
pub trait JobBackend {
    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        role: ImageRole,
    ) -> Result<UploadedImage, Error>;

    async fn submit_job(&self, workflow: &Value) -> Result<JobId, Error>;

    /// Block until the completion sentinel for `job` arrives. Sentinels for
    /// other jobs must be skipped, not treated as ours.
    async fn await_completion(&self, job: &JobId, cancel: &CancellationToken)
    -> Result<(), Error>;

    async fn fetch_output(&self, job: &JobId) -> Result<Vec<u8>, Error>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    name: String,
    #[serde(default)]
    subfolder: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// One frame of the backend's notification stream. The completion sentinel
/// is `event == "executing"` with an explicit `node: null` and our job id;
/// a frame lacking the node field entirely is not a sentinel.
#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(default)]
    event: String,
    #[serde(default, deserialize_with = "present_value")]
    node: Option<Value>,
    #[serde(default)]
    job_id: Option<String>,
}

// Keeps an explicit JSON null distinguishable from an absent key: a present
// field always lands as `Some` (null becomes `Some(Value::Null)`), while the
// serde default covers the absent case with `None`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Notification {
    fn completes(&self, job: &JobId) -> bool {
        self.event == "executing"
            && matches!(&self.node, Some(v) if v.is_null())
            && self.job_id.as_deref() == Some(job.0.as_str())
    }
}

/// HTTP client for the job-queue API, with a per-process client id so the
/// backend can attribute uploads and notifications to this session.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
    client_id: String,
    completion_timeout: Duration,
}

impl HttpBackend {
    pub fn new(base_url: &str, completion_timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("earth-canvas/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            client_id: Uuid::new_v4().to_string(),
            completion_timeout,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_until_sentinel(&self, job: &JobId) -> Result<(), Error> {
        let endpoint = self.url("/notifications");
        let resp = self
            .client
            .get(&endpoint)
            .query(&[("client_id", self.client_id.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::BackendStatus {
                endpoint,
                status: resp.status().as_u16(),
            });
        }

        let mut stream = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = &line[..line.len() - 1];
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_slice::<Notification>(line) {
                    Ok(event) if event.completes(job) => {
                        debug!(%job, "completion sentinel received");
                        return Ok(());
                    }
                    Ok(event) => {
                        trace!(event = %event.event, job_id = ?event.job_id, "notification ignored");
                    }
                    Err(_) => {
                        // Binary preview frames and other non-JSON payloads
                        // share the stream; skip them.
                        trace!("skipping non-JSON notification frame");
                    }
                }
            }
        }
        Err(Error::NotificationStreamClosed(job.0.clone()))
    }
}

impl JobBackend for HttpBackend {
    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        role: ImageRole,
    ) -> Result<UploadedImage, Error> {
        let endpoint = self.url("/upload-image");
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("type", role.as_str())
            .text("client_id", self.client_id.clone());
        let resp = self.client.post(&endpoint).multipart(form).send().await?;
        if !resp.status().is_success() {
            return Err(Error::BackendStatus {
                endpoint,
                status: resp.status().as_u16(),
            });
        }
        let body: UploadResponse = resp.json().await?;
        let path = if body.subfolder.is_empty() {
            body.name
        } else {
            format!("{}/{}", body.subfolder, body.name)
        };
        debug!(%path, role = role.as_str(), "image uploaded");
        Ok(UploadedImage { path })
    }

    async fn submit_job(&self, workflow: &Value) -> Result<JobId, Error> {
        let endpoint = self.url("/submit-job");
        let payload = serde_json::json!({
            "workflow": workflow,
            "client_id": self.client_id,
        });
        let resp = self.client.post(&endpoint).json(&payload).send().await?;
        if !resp.status().is_success() {
            return Err(Error::BackendStatus {
                endpoint,
                status: resp.status().as_u16(),
            });
        }
        let body: SubmitResponse = resp.json().await?;
        debug!(job_id = %body.job_id, "job queued");
        Ok(JobId(body.job_id))
    }

    async fn await_completion(
        &self,
        job: &JobId,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = tokio::time::timeout(self.completion_timeout, self.read_until_sentinel(job)) => {
                match res {
                    Ok(inner) => inner,
                    Err(_) => Err(Error::CompletionTimeout(job.0.clone())),
                }
            }
        }
    }

    async fn fetch_output(&self, job: &JobId) -> Result<Vec<u8>, Error> {
        let endpoint = format!("{}/job-output/{}", self.base_url, job.0);
        let resp = self.client.get(&endpoint).send().await?;
        if !resp.status().is_success() {
            return Err(Error::BackendStatus {
                endpoint,
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}
