//! Display-space geometry: the scaled editing canvas and the shapes drawn on it.

use serde::{Deserialize, Serialize};

/// Default cap on the editing canvas width, in pixels.
pub const DEFAULT_MAX_CANVAS_WIDTH: u32 = 800;

/// A point on the editing canvas (display space).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayPoint {
    pub x: f32,
    pub y: f32,
}

impl DisplayPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A pixel coordinate in the original image raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalPoint {
    pub x: i32,
    pub y: i32,
}

impl OriginalPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Mapping between the original image raster and the scaled-down canvas
/// shown to the user.
///
/// The display size is aspect-preserving and capped at `max_width`; when the
/// image already fits, the map is the identity. All user geometry is captured
/// in display space and must pass through [`DisplayRegion::to_original`]
/// before touching the full-resolution raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayRegion {
    original_w: u32,
    original_h: u32,
    display_w: u32,
    display_h: u32,
}

impl DisplayRegion {
    pub fn for_image(original_w: u32, original_h: u32, max_width: u32) -> Self {
        let ow = original_w.max(1);
        let oh = original_h.max(1);
        let max_width = max_width.max(1);
        let (dw, dh) = if ow <= max_width {
            (ow, oh)
        } else {
            let dh = (max_width as f32 * oh as f32 / ow as f32).round().max(1.0) as u32;
            (max_width, dh)
        };
        Self {
            original_w: ow,
            original_h: oh,
            display_w: dw,
            display_h: dh,
        }
    }

    pub fn original_size(&self) -> (u32, u32) {
        (self.original_w, self.original_h)
    }

    pub fn display_size(&self) -> (u32, u32) {
        (self.display_w, self.display_h)
    }

    pub fn is_identity(&self) -> bool {
        self.original_w == self.display_w && self.original_h == self.display_h
    }

    fn scale(&self) -> (f32, f32) {
        (
            self.original_w as f32 / self.display_w as f32,
            self.original_h as f32 / self.display_h as f32,
        )
    }

    /// Map a canvas point into the original raster (e.g. a segmentation
    /// prompt click).
    pub fn to_original(&self, p: DisplayPoint) -> OriginalPoint {
        let (sx, sy) = self.scale();
        OriginalPoint::new((p.x * sx).round() as i32, (p.y * sy).round() as i32)
    }

    /// Map an original-raster point back onto the canvas (e.g. a traced
    /// segmentation contour).
    pub fn to_display(&self, p: OriginalPoint) -> DisplayPoint {
        let (sx, sy) = self.scale();
        DisplayPoint::new(p.x as f32 / sx, p.y as f32 / sy)
    }
}

/// Whether a polygon ring marks region interior or a hole punched out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ring {
    #[default]
    Exterior,
    Hole,
}

/// Axis-aligned bounding box of a shape, in display space. Kept alongside
/// polygon points so redraws don't have to rescan the point list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn of(points: &[DisplayPoint]) -> Self {
        if points.is_empty() {
            return Self {
                left: 0.0,
                top: 0.0,
                width: 0.0,
                height: 0.0,
            };
        }
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self {
            left: min_x,
            top: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }
}

/// One shape captured on the canvas.
///
/// Hand-drawn freehand strokes, bare prompt points, and closed polygons
/// (hand-drawn or traced from a segmentation mask) all accumulate in the same
/// list so they can be edited and unioned identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Shape {
    /// A freehand stroke; promoted to a closed polygon at rasterization time.
    Freehand { path: Vec<DisplayPoint> },
    /// A single click, used only as a segmentation prompt.
    Point { at: DisplayPoint },
    /// A closed ring of points with its precomputed bounding box.
    Polygon {
        points: Vec<DisplayPoint>,
        bounds: Bounds,
        #[serde(default)]
        ring: Ring,
    },
}

impl Shape {
    pub fn polygon(points: Vec<DisplayPoint>) -> Self {
        let bounds = Bounds::of(&points);
        Shape::Polygon {
            points,
            bounds,
            ring: Ring::Exterior,
        }
    }

    /// The closed outline this shape contributes to the mask, if any.
    pub fn outline(&self) -> Option<&[DisplayPoint]> {
        match self {
            Shape::Freehand { path } => Some(path),
            Shape::Point { .. } => None,
            Shape::Polygon { points, .. } => Some(points),
        }
    }

    /// The segmentation prompt this shape contributes, if any.
    pub fn prompt_point(&self) -> Option<DisplayPoint> {
        match self {
            Shape::Point { at } => Some(*at),
            Shape::Freehand { .. } | Shape::Polygon { .. } => None,
        }
    }

    pub fn ring(&self) -> Ring {
        match self {
            Shape::Polygon { ring, .. } => *ring,
            Shape::Freehand { .. } | Shape::Point { .. } => Ring::Exterior,
        }
    }
}
