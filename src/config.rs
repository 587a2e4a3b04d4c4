use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::canvas::DEFAULT_MAX_CANVAS_WIDTH;
use crate::workflow::SlotIds;

/// Top-level YAML configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    pub server: ServerOptions,
    #[serde(default)]
    pub canvas: CanvasOptions,
    #[serde(default)]
    pub render: RenderOptions,
    pub workflow: WorkflowOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerOptions {
    /// Base URL of the rendering backend, e.g. `http://127.0.0.1:8188`.
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CanvasOptions {
    /// Width cap for the editing canvas; height follows the aspect ratio.
    #[serde(default = "CanvasOptions::default_max_width")]
    pub max_width: u32,
}

impl CanvasOptions {
    fn default_max_width() -> u32 {
        DEFAULT_MAX_CANVAS_WIDTH
    }
}

impl Default for CanvasOptions {
    fn default() -> Self {
        Self {
            max_width: Self::default_max_width(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RenderOptions {
    /// Upper bound on the wait for a job's completion sentinel.
    #[serde(default = "RenderOptions::default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl RenderOptions {
    fn default_timeout() -> Duration {
        Duration::from_secs(10 * 60)
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            timeout: Self::default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkflowOptions {
    /// Path to the workflow template JSON; missing file halts startup.
    pub template_path: PathBuf,
    #[serde(default)]
    pub slots: SlotIds,
}

pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Configuration> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let cfg: Configuration = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    Ok(cfg)
}

impl Configuration {
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.server.base_url.starts_with("http://") || self.server.base_url.starts_with("https://"),
            "server.base-url must be an http(s) URL, got {:?}",
            self.server.base_url
        );
        ensure!(self.canvas.max_width > 0, "canvas.max-width must be positive");
        ensure!(
            !self.render.timeout.is_zero(),
            "render.timeout must be positive"
        );
        Ok(self)
    }
}
