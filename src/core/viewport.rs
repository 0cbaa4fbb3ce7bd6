use crate::core::bounds::Extent;
use serde::{Deserialize, Serialize};

/// Pixel rectangle occupied by the map frame on the host surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A frame anchored at the origin
    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Shrinks the frame by half an outline width on every side.
    pub fn inset_for_outline(&self, outline_width: f64) -> ScreenRect {
        let half = outline_width / 2.0;
        ScreenRect {
            x: self.left + half,
            y: self.top + half,
            width: self.width - outline_width,
            height: self.height - outline_width,
        }
    }

    pub fn same_size(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// A rectangle in screen pixels, origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Maps projected meters inside an extent onto a frame.
///
/// Screen y grows downward, so `ymax` lands on the frame's top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenTransform {
    extent: Extent,
    frame: Frame,
}

impl ScreenTransform {
    pub fn new(extent: Extent, frame: Frame) -> Self {
        Self { extent, frame }
    }

    pub fn map_to_screen(&self, mx: f64, my: f64) -> (f64, f64) {
        let sx = self.frame.left + (mx - self.extent.xmin) / self.extent.width() * self.frame.width;
        let sy = self.frame.top + (self.extent.ymax - my) / self.extent.height() * self.frame.height;
        (sx, sy)
    }

    /// Screen rectangle covered by a tile's meter bounds.
    pub fn bounds_to_screen(&self, bounds: &Extent) -> ScreenRect {
        let (sxmin, symin) = self.map_to_screen(bounds.xmin, bounds.ymax);
        let (sxmax, symax) = self.map_to_screen(bounds.xmax, bounds.ymin);
        ScreenRect {
            x: sxmin,
            y: symin,
            width: sxmax - sxmin,
            height: symax - symin,
        }
    }
}
