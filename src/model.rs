use serde::{Deserialize, Serialize};

// ── Geometry ────────────────────────────────────────────────────────────────

/// A position in image pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box with a top-left origin, stored on disk as
/// `[x, y, width, height]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a box from the two corners of a drag, in either direction.
    pub fn normalize(anchor: Point, cursor: Point) -> Self {
        Self {
            x: anchor.x.min(cursor.x),
            y: anchor.y.min(cursor.y),
            width: (cursor.x - anchor.x).abs(),
            height: (cursor.y - anchor.y).abs(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }

    pub fn max(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = String;

    fn try_from([x, y, width, height]: [f64; 4]) -> Result<Self, Self::Error> {
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return Err(format!("non-finite bbox [{x}, {y}, {width}, {height}]"));
        }
        if width < 0.0 || height < 0.0 {
            return Err(format!("negative bbox size [{x}, {y}, {width}, {height}]"));
        }
        Ok(Self::new(x, y, width, height))
    }
}

// ── Annotation records ──────────────────────────────────────────────────────

/// All boxes of one class on one image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassAnnotationGroup {
    #[serde(rename = "class")]
    pub class_name: String,
    #[serde(rename = "bboxes")]
    pub boxes: Vec<BoundingBox>,
}

/// Everything recorded for one image, keyed by its path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageAnnotation {
    #[serde(rename = "image")]
    pub image_path: String,
    #[serde(rename = "class_and_bboxes", default)]
    pub groups: Vec<ClassAnnotationGroup>,
}

impl ImageAnnotation {
    pub fn new(image_path: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            groups: Vec::new(),
        }
    }

    /// First group with this class name.
    pub fn group(&self, class_name: &str) -> Option<&ClassAnnotationGroup> {
        self.groups.iter().find(|g| g.class_name == class_name)
    }

    pub fn group_mut(&mut self, class_name: &str) -> Option<&mut ClassAnnotationGroup> {
        self.groups.iter_mut().find(|g| g.class_name == class_name)
    }

    pub fn box_count(&self) -> usize {
        self.groups.iter().map(|g| g.boxes.len()).sum()
    }

    /// Boxes flattened with their labels, in group order.
    pub fn labelled_boxes(&self) -> impl Iterator<Item = (&str, &BoundingBox)> {
        self.groups
            .iter()
            .flat_map(|g| g.boxes.iter().map(move |b| (g.class_name.as_str(), b)))
    }
}
