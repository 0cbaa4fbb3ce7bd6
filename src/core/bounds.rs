use serde::{Deserialize, Serialize};

/// An axis-aligned extent in projected meters (or degrees, for geographic bounds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Creates an extent from a `[xmin, ymin, xmax, ymax]` array
    pub fn from_array(values: [f64; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Gets the center point of the extent
    pub fn center(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    /// All four edges are finite numbers
    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite() && self.ymin.is_finite() && self.xmax.is_finite() && self.ymax.is_finite()
    }

    /// Finite with a positive width and height
    pub fn has_area(&self) -> bool {
        self.is_finite() && self.width() > 0.0 && self.height() > 0.0
    }

    /// Recentred copy with the given size.
    pub fn resized(&self, width: f64, height: f64) -> Extent {
        let (cx, cy) = self.center();
        Extent::new(cx - width / 2.0, cy - height / 2.0, cx + width / 2.0, cy + height / 2.0)
    }

    /// Checks if the extent intersects another
    pub fn intersects(&self, other: &Extent) -> bool {
        !(other.xmax < self.xmin
            || other.xmin > self.xmax
            || other.ymax < self.ymin
            || other.ymin > self.ymax)
    }

    /// Grows (or shrinks, for negative values) the extent symmetrically.
    pub fn expand(&self, dx: f64, dy: f64) -> Extent {
        Extent::new(self.xmin - dx, self.ymin - dy, self.xmax + dx, self.ymax + dy)
    }
}

impl From<[f64; 4]> for Extent {
    fn from(values: [f64; 4]) -> Self {
        Self::from_array(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_dimensions() {
        let extent = Extent::new(-10.0, -5.0, 30.0, 15.0);
        assert_eq!(extent.width(), 40.0);
        assert_eq!(extent.height(), 20.0);
        assert_eq!(extent.center(), (10.0, 5.0));
        assert!(extent.is_finite());
    }

    #[test]
    fn test_extent_intersects_and_expand() {
        let a = Extent::new(0.0, 0.0, 10.0, 10.0);
        let b = Extent::new(11.0, 0.0, 20.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.expand(1.0, 0.0).intersects(&b));
        assert!(!Extent::new(f64::NAN, 0.0, 1.0, 1.0).is_finite());
    }

    #[test]
    fn test_has_area_and_resized() {
        assert!(Extent::new(0.0, 0.0, 1.0, 1.0).has_area());
        assert!(!Extent::new(5.0, 0.0, 5.0, 10.0).has_area());
        assert!(!Extent::new(0.0, 10.0, 10.0, 0.0).has_area());
        assert!(!Extent::new(0.0, 0.0, f64::INFINITY, 1.0).has_area());

        let resized = Extent::new(-10.0, -10.0, 10.0, 30.0).resized(4.0, 2.0);
        assert_eq!(resized, Extent::new(-2.0, 9.0, 2.0, 11.0));
    }
}
