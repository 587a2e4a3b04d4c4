//! The per-interaction editing session and its lifecycle.

use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::{GrayImage, RgbaImage};
use tracing::info;

use crate::canvas::{DisplayRegion, Shape};
use crate::mask;

/// Mutable store binding one editing session: the active image being edited,
/// the originally uploaded image, the accumulated canvas shapes, and a
/// generation counter that bumps whenever the canvas must start afresh.
///
/// Lifecycle: created on first load, reset wholesale on a new upload, and
/// partially mutated ([`Session::apply_render`]) when a render completes.
#[derive(Debug, Clone)]
pub struct Session {
    active_image: RgbaImage,
    original_image: RgbaImage,
    original_dims: (u32, u32),
    shapes: Vec<Shape>,
    generation: u64,
    max_canvas_width: u32,
}

impl Session {
    pub fn new(image: RgbaImage, max_canvas_width: u32) -> Self {
        let dims = image.dimensions();
        Self {
            active_image: image.clone(),
            original_image: image,
            original_dims: dims,
            shapes: Vec::new(),
            generation: 0,
            max_canvas_width,
        }
    }

    /// A new upload replaces the session wholesale: both images, the
    /// dimensions, and the shape accumulation.
    pub fn replace_image(&mut self, image: RgbaImage) {
        self.original_dims = image.dimensions();
        self.active_image = image.clone();
        self.original_image = image;
        self.shapes.clear();
        self.generation += 1;
        info!(generation = self.generation, "session reset for new image");
    }

    pub fn active_image(&self) -> &RgbaImage {
        &self.active_image
    }

    pub fn original_image(&self) -> &RgbaImage {
        &self.original_image
    }

    pub fn original_dims(&self) -> (u32, u32) {
        self.original_dims
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn push_shape(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    pub fn extend_shapes(&mut self, shapes: impl IntoIterator<Item = Shape>) {
        self.shapes.extend(shapes);
    }

    /// Discard every accumulated shape and invalidate the canvas.
    pub fn clear_shapes(&mut self) {
        self.shapes.clear();
        self.generation += 1;
    }

    /// The coordinate map for the current active image.
    pub fn display_region(&self) -> DisplayRegion {
        let (w, h) = self.active_image.dimensions();
        DisplayRegion::for_image(w, h, self.max_canvas_width)
    }

    /// Rasterize the accumulated shapes at the active image's resolution.
    pub fn rasterize_mask(&self) -> GrayImage {
        mask::rasterize_shapes(&self.shapes, &self.display_region())
    }

    /// A finished render substitutes the active image, refreshes the
    /// dimensions, and clears the shapes so the next round starts from an
    /// identity-or-fresh mapping.
    pub fn apply_render(&mut self, output: RgbaImage) {
        self.original_dims = output.dimensions();
        self.active_image = output;
        self.shapes.clear();
        self.generation += 1;
        info!(
            generation = self.generation,
            width = self.original_dims.0,
            height = self.original_dims.1,
            "render applied; canvas cleared"
        );
    }

    /// Scale the active image down to display resolution for the canvas
    /// background.
    pub fn display_preview(&self) -> Result<RgbaImage> {
        let region = self.display_region();
        let (dw, dh) = region.display_size();
        resize_rgba(&self.active_image, dw, dh)
    }
}

fn resize_rgba(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage> {
    if source.width() == target_w && source.height() == target_h {
        return Ok(source.clone());
    }
    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for preview resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options =
        fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("preview resize failed")?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| anyhow::anyhow!("failed to construct resized preview image"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::DisplayPoint;

    fn triangle() -> Shape {
        Shape::polygon(vec![
            DisplayPoint::new(2.0, 2.0),
            DisplayPoint::new(20.0, 2.0),
            DisplayPoint::new(2.0, 20.0),
        ])
    }

    #[test]
    fn new_upload_resets_everything() {
        let mut session = Session::new(RgbaImage::new(64, 64), 800);
        session.push_shape(triangle());
        session.replace_image(RgbaImage::new(128, 32));
        assert!(session.shapes().is_empty());
        assert_eq!(session.original_dims(), (128, 32));
        assert_eq!(session.generation(), 1);
    }

    #[test]
    fn apply_render_substitutes_active_image_only() {
        let original = RgbaImage::from_pixel(64, 64, image::Rgba([9, 9, 9, 255]));
        let mut session = Session::new(original.clone(), 800);
        session.push_shape(triangle());

        session.apply_render(RgbaImage::new(80, 40));
        assert_eq!(session.active_image().dimensions(), (80, 40));
        assert_eq!(session.original_dims(), (80, 40));
        assert_eq!(session.original_image(), &original);
        assert!(session.shapes().is_empty());
        assert_eq!(session.generation(), 1);
    }

    #[test]
    fn display_preview_matches_region() {
        let session = Session::new(RgbaImage::new(1600, 1000), 800);
        let preview = session.display_preview().unwrap();
        assert_eq!(preview.dimensions(), (800, 500));
    }

    #[test]
    fn clear_shapes_bumps_generation() {
        let mut session = Session::new(RgbaImage::new(64, 64), 800);
        session.push_shape(triangle());
        session.clear_shapes();
        assert!(session.shapes().is_empty());
        assert_eq!(session.generation(), 1);
    }
}
