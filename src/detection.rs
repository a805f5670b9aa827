use serde::{Deserialize, Serialize};

/// A point on the page, in pixels from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

impl From<[f32; 2]> for Point {
    fn from(raw: [f32; 2]) -> Self {
        Self { x: raw[0], y: raw[1] }
    }
}

impl From<Point> for [f32; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

/// Four corners of a detected text region, ordered top-left, top-right,
/// bottom-right, bottom-left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    pub fn from_corners(corners: [(f32, f32); 4]) -> Self {
        Self(corners.map(|(x, y)| Point::new(x, y)))
    }

    pub fn top_left(&self) -> Point {
        self.0[0]
    }

    /// Width and height measured along the page axes, truncated to whole
    /// pixels: top edge x-span and left edge y-span. For a rotated quad
    /// these are the extents of the projection, not the edge lengths.
    pub fn axis_aligned_extents(&self) -> (i32, i32) {
        let width = (self.0[1].x - self.0[0].x) as i32;
        let height = (self.0[2].y - self.0[0].y) as i32;
        (width, height)
    }

    /// True edge lengths of the (possibly rotated) box: top-left to
    /// top-right, then top-right to bottom-right.
    pub fn rotated_edge_lengths(&self) -> (f32, f32) {
        let width = self.0[0].distance(&self.0[1]);
        let height = self.0[1].distance(&self.0[2]);
        (width, height)
    }
}

/// One detected text region on a page, with the recognized source text and
/// (once translation has run) the text to draw in its place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextDetection {
    pub quad: Quad,
    pub source_text: String,
    pub confidence: f32,
    #[serde(default)]
    pub translated_text: String,
    /// Counter-clockwise angle in degrees the overlay is rotated by before
    /// being pasted back onto the page.
    #[serde(default)]
    pub rotation_angle: f32,
}
