//! Rasterization of accumulated shapes into a full-resolution edit mask.

use image::imageops::FilterType;
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use tracing::debug;

use crate::canvas::{DisplayPoint, DisplayRegion, Ring, Shape};

/// Rasterize the accumulated shapes into a single-channel mask at original
/// resolution: 255 where the edit applies, 0 elsewhere.
///
/// Fill order is two-pass: every exterior ring is filled first, so
/// overlapping shapes union, then hole rings punch back to 0. Shapes that
/// collapse below three distinct points after remapping contribute nothing.
pub fn rasterize_shapes(shapes: &[Shape], region: &DisplayRegion) -> GrayImage {
    let (w, h) = region.original_size();
    let mut mask = GrayImage::new(w, h);
    for pass in [Ring::Exterior, Ring::Hole] {
        let value = match pass {
            Ring::Exterior => 255u8,
            Ring::Hole => 0u8,
        };
        for shape in shapes {
            if shape.ring() != pass {
                continue;
            }
            if let Some(outline) = shape.outline() {
                fill_ring(&mut mask, outline, region, value);
            }
        }
    }
    mask
}

fn fill_ring(mask: &mut GrayImage, outline: &[DisplayPoint], region: &DisplayRegion, value: u8) {
    let mut ring: Vec<Point<i32>> = outline
        .iter()
        .map(|p| {
            let o = region.to_original(*p);
            Point::new(o.x, o.y)
        })
        .collect();
    // Remapping can collapse neighbours onto the same pixel; the fill also
    // rejects a closing point equal to the first.
    ring.dedup();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 {
        debug!(points = ring.len(), "skipping degenerate ring");
        return;
    }
    draw_polygon_mut(mask, &ring, Luma([value]));
}

/// Number of selected (nonzero) pixels in a mask.
pub fn coverage(mask: &GrayImage) -> u64 {
    mask.pixels().filter(|p| p.0[0] != 0).count() as u64
}

pub fn is_empty(mask: &GrayImage) -> bool {
    coverage(mask) == 0
}

/// Binarize the alpha channel of a canvas raster: any touched pixel becomes
/// fully selected.
pub fn from_canvas_alpha(canvas: &RgbaImage) -> GrayImage {
    let mut mask = GrayImage::new(canvas.width(), canvas.height());
    for (src, dst) in canvas.pixels().zip(mask.pixels_mut()) {
        dst.0[0] = if src.0[3] > 0 { 255 } else { 0 };
    }
    mask
}

/// Resize a canvas-resolution mask up to the original raster.
///
/// The downstream inpainting model is sensitive to edge aliasing, so this is
/// always a Lanczos resample, never nearest-neighbor.
pub fn resize_to_original(mask: &GrayImage, region: &DisplayRegion) -> GrayImage {
    let (w, h) = region.original_size();
    if mask.dimensions() == (w, h) {
        return mask.clone();
    }
    image::imageops::resize(mask, w, h, FilterType::Lanczos3)
}

/// Blend a colored preview of the mask over the active image so the operator
/// can see what a render would touch.
pub fn overlay_on_image(image: &RgbaImage, mask: &GrayImage, color: [u8; 3], alpha: f32) -> RgbaImage {
    let alpha = alpha.clamp(0.0, 1.0);
    let mask = if mask.dimensions() == image.dimensions() {
        mask.clone()
    } else {
        image::imageops::resize(mask, image.width(), image.height(), FilterType::Lanczos3)
    };
    let mut out = image.clone();
    for (dst, m) in out.pixels_mut().zip(mask.pixels()) {
        let a = alpha * m.0[0] as f32 / 255.0;
        if a <= 0.0 {
            continue;
        }
        let Rgba([r, g, b, base_a]) = *dst;
        let blend = |base: u8, tint: u8| -> u8 {
            (base as f32 * (1.0 - a) + tint as f32 * a).round() as u8
        };
        *dst = Rgba([
            blend(r, color[0]),
            blend(g, color[1]),
            blend(b, color[2]),
            base_a,
        ]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::DisplayPoint;

    fn identity_region(w: u32, h: u32) -> DisplayRegion {
        DisplayRegion::for_image(w, h, w.max(1))
    }

    #[test]
    fn degenerate_polygon_rasterizes_to_nothing() {
        let region = identity_region(64, 64);
        let shapes = vec![Shape::polygon(vec![
            DisplayPoint::new(10.0, 10.0),
            DisplayPoint::new(30.0, 10.0),
        ])];
        let mask = rasterize_shapes(&shapes, &region);
        assert!(is_empty(&mask));
    }

    #[test]
    fn points_never_rasterize() {
        let region = identity_region(32, 32);
        let shapes = vec![Shape::Point {
            at: DisplayPoint::new(16.0, 16.0),
        }];
        assert!(is_empty(&rasterize_shapes(&shapes, &region)));
    }

    #[test]
    fn hole_ring_punches_out_interior() {
        let region = identity_region(100, 100);
        let outer = Shape::polygon(vec![
            DisplayPoint::new(10.0, 10.0),
            DisplayPoint::new(90.0, 10.0),
            DisplayPoint::new(90.0, 90.0),
            DisplayPoint::new(10.0, 90.0),
        ]);
        let hole = Shape::Polygon {
            points: vec![
                DisplayPoint::new(40.0, 40.0),
                DisplayPoint::new(60.0, 40.0),
                DisplayPoint::new(60.0, 60.0),
                DisplayPoint::new(40.0, 60.0),
            ],
            bounds: crate::canvas::Bounds::of(&[]),
            ring: Ring::Hole,
        };
        let mask = rasterize_shapes(&[outer, hole], &region);
        assert_eq!(mask.get_pixel(20, 20).0[0], 255);
        assert_eq!(mask.get_pixel(50, 50).0[0], 0);
    }

    #[test]
    fn canvas_alpha_binarizes() {
        let mut canvas = RgbaImage::new(4, 4);
        canvas.put_pixel(1, 1, Rgba([255, 255, 6, 120]));
        canvas.put_pixel(2, 2, Rgba([255, 255, 6, 1]));
        let mask = from_canvas_alpha(&canvas);
        assert_eq!(mask.get_pixel(1, 1).0[0], 255);
        assert_eq!(mask.get_pixel(2, 2).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
        assert_eq!(coverage(&mask), 2);
    }

    #[test]
    fn overlay_tints_only_masked_pixels() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let mut mask = GrayImage::new(4, 4);
        mask.put_pixel(1, 1, Luma([255]));
        let out = overlay_on_image(&image, &mask, [246, 250, 6], 0.5);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(1, 1).0[0], 123);
    }
}
