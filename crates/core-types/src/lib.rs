//! Shared geometry and identity primitives

use std::fmt;

use uuid::Uuid;

/// Largest per-edge movement still considered "the same place" between two samples.
pub const DEVICE_PIXEL_TOLERANCE: f64 = 1.0;

/// Handle to a node inside a live document. The document owns the node; holders of a
/// `NodeId` must expect it to be detached or replaced at any time.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of one stabilization run, used to correlate log lines.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Axis-aligned rectangle in CSS pixels.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        top: 0.0,
        left: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// True when both dimensions are strictly positive.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Shift the rectangle by a scroll offset (viewport space to document space).
    pub fn translate(&self, offset: ScrollOffset) -> Self {
        Self {
            top: self.top + offset.y,
            left: self.left + offset.x,
            ..*self
        }
    }

    /// True when any of top/left/width/height moved by more than `tolerance`.
    pub fn differs_from(&self, other: &Rect, tolerance: f64) -> bool {
        (self.top - other.top).abs() > tolerance
            || (self.left - other.left).abs() > tolerance
            || (self.width - other.width).abs() > tolerance
            || (self.height - other.height).abs() > tolerance
    }

    /// True when all four edges lie within `[0, size]`.
    pub fn is_within(&self, size: Size) -> bool {
        self.top >= 0.0
            && self.left >= 0.0
            && self.bottom() <= size.height
            && self.right() <= size.width
    }

    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "top={:.1} left={:.1} width={:.1} height={:.1}",
            self.top, self.left, self.width, self.height
        )
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Current scroll position of the document's scrolling element.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

impl ScrollOffset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
