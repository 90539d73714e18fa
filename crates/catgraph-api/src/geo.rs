//! Rectangle bounds for `catsByArea`.

use serde::Serialize;

use crate::model::Point;

/// Axis-aligned longitude/latitude rectangle, edges inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

/// The rectangle spanned by two opposite corners.
///
/// Corners given the wrong way round are normalised rather than rejected.
pub fn rectangle_bounds(top_right: Point, bottom_left: Point) -> Bounds {
    Bounds {
        min_lng: top_right.lng().min(bottom_left.lng()),
        min_lat: top_right.lat().min(bottom_left.lat()),
        max_lng: top_right.lng().max(bottom_left.lng()),
        max_lat: top_right.lat().max(bottom_left.lat()),
    }
}

impl Bounds {
    pub fn contains(&self, point: &Point) -> bool {
        (self.min_lng..=self.max_lng).contains(&point.lng())
            && (self.min_lat..=self.max_lat).contains(&point.lat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive() {
        let b = rectangle_bounds(Point::new(25.0, 61.0), Point::new(24.0, 60.0));
        assert!(b.contains(&Point::new(24.5, 60.5)));
        assert!(b.contains(&Point::new(25.0, 60.0)));
        assert!(!b.contains(&Point::new(25.01, 60.5)));
        assert!(!b.contains(&Point::new(24.5, 59.99)));
    }

    #[test]
    fn swapped_corners_normalise() {
        let a = rectangle_bounds(Point::new(25.0, 61.0), Point::new(24.0, 60.0));
        let b = rectangle_bounds(Point::new(24.0, 60.0), Point::new(25.0, 61.0));
        assert_eq!(a, b);
    }
}
