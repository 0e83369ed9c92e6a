//! Hotspot shapes used by `inside` and area mappings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Shape {
    /// The whole image: every point is inside.
    Default,
    /// `left-x, top-y, right-x, bottom-y`
    Rect,
    /// `center-x, center-y, radius`
    Circle,
    /// `x1, y1, x2, y2, ..., xN, yN`, optionally closed by repeating the
    /// first point.
    Poly,
    /// `center-x, center-y, h-radius, v-radius`. Deprecated in favour of
    /// circle and poly.
    Ellipse,
}

impl Shape {
    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Default => "default",
            Shape::Rect => "rect",
            Shape::Circle => "circle",
            Shape::Poly => "poly",
            Shape::Ellipse => "ellipse",
        }
    }

    /// Problems with `coords` for this shape; empty when valid.
    pub fn coord_problems(self, coords: &[i32]) -> Vec<String> {
        let mut problems = Vec::new();
        let expect_len = |problems: &mut Vec<String>, expected: usize| {
            if coords.len() != expected {
                problems.push(format!(
                    "invalid number of coordinates for {} shape: expected {}, found {}",
                    self.as_str(),
                    expected,
                    coords.len()
                ));
                false
            } else {
                true
            }
        };
        let expect_non_negative = |problems: &mut Vec<String>| {
            if let Some(c) = coords.iter().find(|c| **c < 0) {
                problems.push(format!("coordinate {} must not be negative", c));
            }
        };
        match self {
            Shape::Default => {
                if !coords.is_empty() {
                    problems.push(format!(
                        "default shape takes no coordinates, found {}",
                        coords.len()
                    ));
                }
            }
            Shape::Rect => {
                if expect_len(&mut problems, 4) {
                    expect_non_negative(&mut problems);
                    if coords[0] >= coords[2] {
                        problems.push(format!(
                            "left-x ({}) must be smaller than right-x ({})",
                            coords[0], coords[2]
                        ));
                    }
                    if coords[1] >= coords[3] {
                        problems.push(format!(
                            "top-y ({}) must be smaller than bottom-y ({})",
                            coords[1], coords[3]
                        ));
                    }
                }
            }
            Shape::Circle => {
                if expect_len(&mut problems, 3) {
                    if coords[2] < 1 {
                        problems.push(format!("radius ({}) must be positive", coords[2]));
                    }
                    expect_non_negative(&mut problems);
                }
            }
            Shape::Ellipse => {
                if expect_len(&mut problems, 4) {
                    if coords[2] < 1 {
                        problems.push(format!("h-radius ({}) must be positive", coords[2]));
                    }
                    if coords[3] < 1 {
                        problems.push(format!("v-radius ({}) must be positive", coords[3]));
                    }
                    expect_non_negative(&mut problems);
                }
            }
            Shape::Poly => {
                let closed = coords.len() > 1
                    && coords[0] == coords[coords.len() - 2]
                    && coords[1] == coords[coords.len() - 1];
                let minimum = if closed { 8 } else { 6 };
                if coords.len() < minimum {
                    problems.push(format!(
                        "invalid number of coordinates for poly shape: expected at least {}, found {}",
                        minimum,
                        coords.len()
                    ));
                } else {
                    if coords.len() % 2 != 0 {
                        problems.push(format!(
                            "poly shape needs an even number of coordinates, found {}",
                            coords.len()
                        ));
                    }
                    expect_non_negative(&mut problems);
                }
            }
        }
        problems
    }

    /// Whether the point `(x, y)` lies inside the shape. Boundaries count as
    /// inside. Malformed coordinates are never inside.
    pub fn is_inside(self, coords: &[i32], x: i32, y: i32) -> bool {
        let (px, py) = (f64::from(x), f64::from(y));
        let c = |i: usize| f64::from(coords[i]);
        match self {
            Shape::Default => true,
            Shape::Rect if coords.len() >= 4 => {
                px >= c(0) && px <= c(2) && py >= c(1) && py <= c(3)
            }
            Shape::Circle if coords.len() >= 3 => {
                (px - c(0)).powi(2) + (py - c(1)).powi(2) <= c(2).powi(2)
            }
            Shape::Ellipse if coords.len() >= 4 => {
                (px - c(0)).powi(2) / c(2).powi(2) + (py - c(1)).powi(2) / c(3).powi(2) <= 1.0
            }
            Shape::Poly if coords.len() >= 6 => inside_polygon(coords, px, py),
            _ => false,
        }
    }
}

/// Winding test: sum the signed angles subtended at the point by each edge.
/// A sum of zero (to six decimal places) means outside.
fn inside_polygon(coords: &[i32], bx: f64, by: f64) -> bool {
    let mut points: Vec<(f64, f64)> = coords
        .chunks_exact(2)
        .map(|p| (f64::from(p[0]), f64::from(p[1])))
        .collect();
    if points.first() != points.last() {
        if let Some(first) = points.first().copied() {
            points.push(first);
        }
    }

    let mut sum = 0.0;
    for edge in points.windows(2) {
        let (ax, ay) = edge[0];
        let (cx, cy) = edge[1];
        let a = ((bx - cx).powi(2) + (by - cy).powi(2)).sqrt();
        let b = ((cx - ax).powi(2) + (cy - ay).powi(2)).sqrt();
        let c = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();
        let angle = ((a * a - b * b + c * c) / (2.0 * a * c)).acos().to_degrees();
        // point coincides with a vertex
        if angle.is_nan() {
            return true;
        }
        let sign = (cx - bx) * (by - ay) - (cy - by) * (bx - ax);
        if sign >= 0.0 {
            sum += angle;
        } else {
            sum -= angle;
        }
    }
    (sum * 1e6).round() != 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_bounds_are_inclusive() {
        let coords = [0, 0, 10, 10];
        assert!(Shape::Rect.is_inside(&coords, 0, 0));
        assert!(Shape::Rect.is_inside(&coords, 10, 10));
        assert!(!Shape::Rect.is_inside(&coords, 11, 5));
    }

    #[test]
    fn circle_and_ellipse() {
        assert!(Shape::Circle.is_inside(&[10, 10, 5], 13, 14));
        assert!(!Shape::Circle.is_inside(&[10, 10, 5], 14, 14));
        assert!(Shape::Ellipse.is_inside(&[10, 10, 6, 2], 16, 10));
        assert!(!Shape::Ellipse.is_inside(&[10, 10, 6, 2], 10, 13));
    }

    #[test]
    fn polygon_winding() {
        let triangle = [0, 0, 10, 0, 0, 10];
        assert!(Shape::Poly.is_inside(&triangle, 2, 2));
        assert!(!Shape::Poly.is_inside(&triangle, 9, 9));
        assert!(Shape::Poly.is_inside(&triangle, 0, 0));
        let closed = [0, 0, 10, 0, 10, 10, 0, 10, 0, 0];
        assert!(Shape::Poly.is_inside(&closed, 5, 5));
        assert!(!Shape::Poly.is_inside(&closed, 15, 5));
    }

    #[test]
    fn default_contains_everything() {
        assert!(Shape::Default.is_inside(&[], -100, 4000));
    }

    #[test]
    fn coordinate_validation() {
        assert!(Shape::Rect.coord_problems(&[0, 0, 10, 10]).is_empty());
        assert_eq!(Shape::Rect.coord_problems(&[10, 0, 0, 10]).len(), 1);
        assert_eq!(Shape::Circle.coord_problems(&[1, 1]).len(), 1);
        assert_eq!(Shape::Circle.coord_problems(&[1, 1, 0]).len(), 1);
        assert_eq!(Shape::Poly.coord_problems(&[0, 0, 1, 1]).len(), 1);
        assert_eq!(Shape::Poly.coord_problems(&[0, 0, 1, 1, 2, 2, 0]).len(), 1);
        assert!(Shape::Default.coord_problems(&[]).is_empty());
    }
}
