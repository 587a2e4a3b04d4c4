//! Bridge between a point-prompted segmentation model and the canvas shapes.
//!
//! The model itself is an external collaborator: anything that can turn an
//! image plus prompt points into masks plugs in behind [`PointSegmenter`].
//! Its output is adapted into the same [`Shape::Polygon`] representation as
//! hand-drawn geometry so both edit and union identically.

use image::{GrayImage, RgbaImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::point::Point;
use tracing::debug;

use crate::canvas::{Bounds, DisplayPoint, DisplayRegion, OriginalPoint, Ring, Shape};
use crate::error::Error;
use crate::session::Session;

/// Contours enclosing fewer pixels than this are treated as model noise.
pub const MIN_CONTOUR_AREA: f64 = 20.0;

/// Prompt-point label understood by point-prompt segmentation models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PointLabel {
    Background = 0,
    Foreground = 1,
}

/// A point-prompted segmentation model.
///
/// Takes the image and prompt points in original-raster coordinates and
/// returns one mask per detected object, each sized to the image. Values are
/// thresholded at >0 by the bridge, so probability or binary output both work.
pub trait PointSegmenter {
    fn segment(
        &mut self,
        image: &RgbaImage,
        points: &[OriginalPoint],
        labels: &[PointLabel],
    ) -> anyhow::Result<Vec<GrayImage>>;
}

/// Trace a model mask into display-space polygons.
///
/// External boundaries become exterior rings, enclosed boundaries become
/// holes; contours below [`MIN_CONTOUR_AREA`] are dropped.
pub fn polygons_from_mask(mask: &GrayImage, region: &DisplayRegion) -> Vec<Shape> {
    let mut binary = GrayImage::new(mask.width(), mask.height());
    for (src, dst) in mask.pixels().zip(binary.pixels_mut()) {
        dst.0[0] = if src.0[0] > 0 { 255 } else { 0 };
    }

    let contours: Vec<Contour<i32>> = find_contours(&binary);
    let mut shapes = Vec::new();
    for contour in contours {
        let area = contour_area(&contour.points);
        if area < MIN_CONTOUR_AREA {
            debug!(area, "dropping noise contour");
            continue;
        }
        let points: Vec<DisplayPoint> = contour
            .points
            .iter()
            .map(|p| region.to_display(OriginalPoint::new(p.x, p.y)))
            .collect();
        if points.len() < 3 {
            continue;
        }
        let bounds = Bounds::of(&points);
        let ring = match contour.border_type {
            BorderType::Outer => Ring::Exterior,
            BorderType::Hole => Ring::Hole,
        };
        shapes.push(Shape::Polygon {
            points,
            bounds,
            ring,
        });
    }
    shapes
}

// Shoelace formula over the traced boundary.
fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (a, b) in points.iter().zip(points.iter().cycle().skip(1)) {
        twice_area += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    (twice_area.abs() as f64) / 2.0
}

/// Run the segmenter over the session's accumulated prompt points and append
/// the traced polygons to the shape list.
///
/// Prompt clicks are remapped to original coordinates before reaching the
/// model and every point is labelled foreground. On model failure the shape
/// accumulation is left exactly as it was; the error is recoverable and the
/// caller decides how loudly to surface it. Returns the number of polygons
/// added.
pub fn refine_with_prompts<S: PointSegmenter>(
    session: &mut Session,
    segmenter: &mut S,
) -> Result<usize, Error> {
    let region = session.display_region();
    let points: Vec<OriginalPoint> = session
        .shapes()
        .iter()
        .filter_map(Shape::prompt_point)
        .map(|p| region.to_original(p))
        .collect();
    if points.is_empty() {
        debug!("no prompt points on canvas; skipping segmentation");
        return Ok(0);
    }
    let labels = vec![PointLabel::Foreground; points.len()];

    let masks = segmenter
        .segment(session.active_image(), &points, &labels)
        .map_err(Error::Segmentation)?;

    // Trace every mask before mutating the session so a failure cannot leave
    // a partial append behind.
    let mut traced = Vec::new();
    for mask in &masks {
        traced.extend(polygons_from_mask(mask, &region));
    }
    let added = traced.len();
    session.extend_shapes(traced);
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use image::Luma;

    struct FixedSegmenter {
        masks: Vec<GrayImage>,
        seen_points: Vec<OriginalPoint>,
        seen_labels: Vec<PointLabel>,
    }

    impl FixedSegmenter {
        fn new(masks: Vec<GrayImage>) -> Self {
            Self {
                masks,
                seen_points: Vec::new(),
                seen_labels: Vec::new(),
            }
        }
    }

    impl PointSegmenter for FixedSegmenter {
        fn segment(
            &mut self,
            _image: &RgbaImage,
            points: &[OriginalPoint],
            labels: &[PointLabel],
        ) -> anyhow::Result<Vec<GrayImage>> {
            self.seen_points = points.to_vec();
            self.seen_labels = labels.to_vec();
            Ok(self.masks.clone())
        }
    }

    struct FailingSegmenter;

    impl PointSegmenter for FailingSegmenter {
        fn segment(
            &mut self,
            _image: &RgbaImage,
            _points: &[OriginalPoint],
            _labels: &[PointLabel],
        ) -> anyhow::Result<Vec<GrayImage>> {
            Err(anyhow!("model exploded"))
        }
    }

    fn square_mask(w: u32, h: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        for y in y0..(y0 + side) {
            for x in x0..(x0 + side) {
                mask.put_pixel(x, y, Luma([200]));
            }
        }
        mask
    }

    fn session_with_prompt(w: u32, h: u32) -> Session {
        let mut session = Session::new(RgbaImage::new(w, h), 800);
        session.push_shape(Shape::Point {
            at: DisplayPoint::new(10.0, 10.0),
        });
        session
    }

    #[test]
    fn traces_square_into_polygon() {
        let region = DisplayRegion::for_image(64, 64, 800);
        let mask = square_mask(64, 64, 8, 8, 16);
        let shapes = polygons_from_mask(&mask, &region);
        assert_eq!(shapes.len(), 1);
        match &shapes[0] {
            Shape::Polygon { bounds, ring, .. } => {
                assert_eq!(*ring, Ring::Exterior);
                assert!((bounds.left - 8.0).abs() <= 1.0);
                assert!((bounds.top - 8.0).abs() <= 1.0);
                assert!((bounds.width - 15.0).abs() <= 1.0);
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn tiny_blobs_are_suppressed() {
        let region = DisplayRegion::for_image(64, 64, 800);
        // 3x3 blob encloses well under MIN_CONTOUR_AREA pixels.
        let mask = square_mask(64, 64, 30, 30, 3);
        assert!(polygons_from_mask(&mask, &region).is_empty());
    }

    #[test]
    fn model_failure_leaves_shapes_untouched() {
        let mut session = session_with_prompt(64, 64);
        let before = session.shapes().to_vec();
        let err = refine_with_prompts(&mut session, &mut FailingSegmenter).unwrap_err();
        assert!(matches!(err, Error::Segmentation(_)));
        assert_eq!(session.shapes(), before.as_slice());
    }

    #[test]
    fn successful_refinement_appends_polygons() {
        let mut session = session_with_prompt(64, 64);
        let mut segmenter = FixedSegmenter::new(vec![square_mask(64, 64, 8, 8, 20)]);
        let added = refine_with_prompts(&mut session, &mut segmenter).unwrap();
        assert_eq!(added, 1);
        // Prompt point is still there, polygon appended after it.
        assert_eq!(session.shapes().len(), 2);
    }

    #[test]
    fn prompts_reach_model_in_original_coordinates() {
        // 1600x1000 under an 800 cap scales display clicks by 2 on each axis.
        let mut session = Session::new(RgbaImage::new(1600, 1000), 800);
        session.push_shape(Shape::Point {
            at: DisplayPoint::new(10.0, 10.0),
        });
        session.push_shape(Shape::Point {
            at: DisplayPoint::new(399.5, 250.0),
        });
        let mut segmenter = FixedSegmenter::new(Vec::new());

        refine_with_prompts(&mut session, &mut segmenter).unwrap();

        assert_eq!(
            segmenter.seen_points,
            vec![OriginalPoint::new(20, 20), OriginalPoint::new(799, 500)]
        );
        // Every prompt click is a foreground point.
        assert_eq!(segmenter.seen_labels.len(), 2);
        assert!(
            segmenter
                .seen_labels
                .iter()
                .all(|l| *l == PointLabel::Foreground)
        );
    }

    #[test]
    fn no_prompts_is_a_quiet_no_op() {
        let mut session = Session::new(RgbaImage::new(32, 32), 800);
        let added = refine_with_prompts(&mut session, &mut FailingSegmenter).unwrap();
        assert_eq!(added, 0);
    }
}
