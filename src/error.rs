use std::path::PathBuf;

use thiserror::Error;

/// Library error type for Earth Canvas operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The accumulated shapes rasterized to an all-zero mask; nothing was
    /// sent to the backend.
    #[error("no region selected: draw a polygon or run segmentation first")]
    NoRegionSelected,

    /// The workflow template file is missing or unreadable.
    #[error("workflow template not found at {0}")]
    MissingTemplate(PathBuf),

    /// The workflow template parsed but lacks a required parameter slot.
    #[error("workflow template has no usable {role} slot at node {node}")]
    MissingSlot { role: &'static str, node: String },

    /// The workflow template is not a valid JSON node graph.
    #[error("invalid workflow template: {0}")]
    InvalidTemplate(#[from] serde_json::Error),

    /// Transport-level failure talking to the rendering backend.
    #[error("backend request failed: {0}")]
    Backend(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status} from {endpoint}")]
    BackendStatus { endpoint: String, status: u16 },

    /// The notification stream closed before the job's completion sentinel.
    #[error("notification stream closed before job {0} completed")]
    NotificationStreamClosed(String),

    /// The completion wait exceeded the configured render timeout.
    #[error("timed out waiting for completion of job {0}")]
    CompletionTimeout(String),

    /// The enclosing task was cancelled while a render was in flight.
    #[error("render cancelled")]
    Cancelled,

    /// Point-prompt segmentation failed; the shape accumulation is untouched.
    #[error("segmentation failed: {0}")]
    Segmentation(#[source] anyhow::Error),

    /// Encoding an upload or decoding a fetched output image failed.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
