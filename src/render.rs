//! The render submission flow: guard, upload, queue, await, apply.

use std::io::Cursor;

use image::{GrayImage, ImageFormat, RgbaImage};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::{ImageRole, JobBackend, JobId};
use crate::error::Error;
use crate::mask;
use crate::session::Session;
use crate::workflow::{RenderParams, WorkflowTemplate};

/// Phase of one submission round. Exactly one submission is in flight per
/// session; the flow holds the session mutably for its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPhase {
    #[default]
    Idle,
    MaskReady,
    Uploading,
    Queued,
    AwaitingCompletion,
    Complete,
    Failed,
}

/// Drives one (image, mask, prompt) triple through the backend and applies
/// the result to the session.
///
/// The session is only mutated after the output image has been fetched and
/// decoded, so any failure leaves the prior active image untouched and the
/// flow back at [`RenderPhase::Idle`] after [`RenderFlow::reset`].
pub struct RenderFlow<'a, B> {
    backend: &'a B,
    template: &'a WorkflowTemplate,
    phase: RenderPhase,
}

impl<'a, B: JobBackend> RenderFlow<'a, B> {
    pub fn new(backend: &'a B, template: &'a WorkflowTemplate) -> Self {
        Self {
            backend,
            template,
            phase: RenderPhase::Idle,
        }
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Return a failed flow to [`RenderPhase::Idle`] for the next attempt.
    pub fn reset(&mut self) {
        self.phase = RenderPhase::Idle;
    }

    /// Submit the session's accumulated mask with `prompt` and block until
    /// the rendered image replaces the active image.
    ///
    /// Rejected with [`Error::NoRegionSelected`] before any backend call
    /// when the mask is all-zero. Returns the completed job id.
    pub async fn submit(
        &mut self,
        session: &mut Session,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<JobId, Error> {
        self.phase = RenderPhase::Idle;
        let mask = session.rasterize_mask();
        if mask::is_empty(&mask) {
            warn!("submission rejected: mask has no selected pixels");
            return Err(Error::NoRegionSelected);
        }
        self.phase = RenderPhase::MaskReady;

        match self.run_round(session, &mask, prompt, cancel).await {
            Ok((job, output)) => {
                session.apply_render(output);
                self.phase = RenderPhase::Complete;
                info!(%job, "render complete");
                Ok(job)
            }
            Err(err) => {
                self.phase = RenderPhase::Failed;
                warn!(error = %err, "render round failed; active image untouched");
                Err(err)
            }
        }
    }

    async fn run_round(
        &mut self,
        session: &Session,
        mask: &GrayImage,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<(JobId, RgbaImage), Error> {
        self.phase = RenderPhase::Uploading;
        let generation = session.generation();
        let source = self
            .backend
            .upload_image(
                encode_rgba_png(session.active_image())?,
                &format!("source_{generation}.png"),
                ImageRole::Input,
            )
            .await?;
        let mask_upload = self
            .backend
            .upload_image(
                encode_gray_png(mask)?,
                &format!("mask_{generation}.png"),
                ImageRole::Mask,
            )
            .await?;
        let original = self
            .backend
            .upload_image(
                encode_rgba_png(session.original_image())?,
                &format!("original_{generation}.png"),
                ImageRole::Input,
            )
            .await?;

        let graph = self.template.instantiate(&RenderParams {
            prompt,
            source_path: &source.path,
            mask_path: &mask_upload.path,
            original_path: &original.path,
            seed: rand::random::<u32>() as u64,
        });
        let job = self.backend.submit_job(&graph).await?;
        self.phase = RenderPhase::Queued;

        self.phase = RenderPhase::AwaitingCompletion;
        self.backend.await_completion(&job, cancel).await?;

        let bytes = self.backend.fetch_output(&job).await?;
        let output = image::load_from_memory(&bytes)?.to_rgba8();
        Ok((job, output))
    }
}

// PNG is the one lossless format the backend accepts for all three rasters.
fn encode_rgba_png(image: &RgbaImage) -> Result<Vec<u8>, Error> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

fn encode_gray_png(image: &GrayImage) -> Result<Vec<u8>, Error> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}
