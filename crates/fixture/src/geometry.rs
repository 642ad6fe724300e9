//! Fixture window layout, in window-relative pixels.

use serde::{Deserialize, Serialize};

/// Default tolerance for position comparisons.
pub const POSITION_TOLERANCE: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Each axis within `tolerance` of `other`.
    pub fn is_near(&self, other: Point, tolerance: i32) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }

    /// Read `{"x":..,"y":..}` as reported by position tools.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let x = value.get("x")?.as_i64()?;
        let y = value.get("y")?.as_i64()?;
        Some(Self::new(i32::try_from(x).ok()?, i32::try_from(y).ok()?))
    }
}

/// Axis-aligned box given by two corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn center(&self) -> Point {
        Point::new((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    pub fn contains(&self, p: Point) -> bool {
        (self.left..=self.right).contains(&p.x) && (self.top..=self.bottom).contains(&p.y)
    }
}

pub const RED_RECT: Rect = Rect::new(50, 50, 150, 150);
pub const BLUE_CIRCLE: Rect = Rect::new(200, 50, 300, 150);
pub const GREEN_RECT: Rect = Rect::new(350, 50, 450, 150);

/// Named places on the fixture window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landmark {
    RedRect,
    BlueCircle,
    GreenRect,
    Button1,
    Button2,
    Entry,
    Entry2,
    Draggable,
    ScrolledText,
}

impl Landmark {
    /// Center of the landmark relative to the window origin.
    pub fn center(self) -> Point {
        match self {
            Landmark::RedRect => RED_RECT.center(),
            Landmark::BlueCircle => BLUE_CIRCLE.center(),
            Landmark::GreenRect => GREEN_RECT.center(),
            Landmark::Button1 => Point::new(150, 200),
            Landmark::Button2 => Point::new(400, 200),
            Landmark::Entry => Point::new(300, 300),
            Landmark::Entry2 => Point::new(300, 360),
            Landmark::Draggable => Point::new(350, 400),
            Landmark::ScrolledText => Point::new(600, 500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_centers() {
        assert_eq!(Landmark::RedRect.center(), Point::new(100, 100));
        assert_eq!(Landmark::BlueCircle.center(), Point::new(250, 100));
        assert_eq!(Landmark::GreenRect.center(), Point::new(400, 100));
    }

    #[test]
    fn nearness_is_per_axis() {
        let p = Point::new(100, 100);
        assert!(p.is_near(Point::new(105, 95), POSITION_TOLERANCE));
        assert!(!p.is_near(Point::new(106, 100), POSITION_TOLERANCE));
        assert!(!p.is_near(Point::new(100, 94), POSITION_TOLERANCE));
    }

    #[test]
    fn point_from_tool_output() {
        let v = serde_json::json!({ "x": 640, "y": 360 });
        assert_eq!(Point::from_json(&v), Some(Point::new(640, 360)));
        assert_eq!(Point::from_json(&serde_json::json!({ "x": 1 })), None);
    }

    #[test]
    fn rect_contains_edges() {
        assert!(RED_RECT.contains(Point::new(50, 150)));
        assert!(!RED_RECT.contains(Point::new(151, 100)));
    }
}
