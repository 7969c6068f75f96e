use opencv::core::Rect;
use std::fmt;

/// Integer landmark location in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Rounds half-up, the way dlib converts floating point locations to pixels.
    pub fn rounded(x: f64, y: f64) -> Self {
        Self {
            x: (x + 0.5).floor() as i64,
            y: (y + 0.5).floor() as i64,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.x, self.y)
    }
}

/// Inclusive pixel rectangle. A box starting at `left` that is `w` pixels wide
/// has `right == left + w - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl FaceRect {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_cv(rect: Rect) -> Self {
        let left = i64::from(rect.x);
        let top = i64::from(rect.y);
        Self {
            left,
            top,
            right: left + i64::from(rect.width) - 1,
            bottom: top + i64::from(rect.height) - 1,
        }
    }

    pub fn to_cv(&self) -> Rect {
        Rect::new(
            self.left as i32,
            self.top as i32,
            self.width() as i32,
            self.height() as i32,
        )
    }

    /// Region covering a whole frame. The far edges sit one past the last
    /// pixel, which is what the predictor has always been given in full-frame mode.
    pub fn full_frame(cols: i32, rows: i32) -> Self {
        Self::new(0, 0, i64::from(cols), i64::from(rows))
    }

    /// Maps a box found on a downsampled frame back to full resolution.
    /// Each edge is divided by `ratio` and truncated.
    pub fn upscale(&self, ratio: f64) -> Self {
        let scale = |v: i64| (v as f64 / ratio) as i64;
        Self {
            left: scale(self.left),
            top: scale(self.top),
            right: scale(self.right),
            bottom: scale(self.bottom),
        }
    }

    pub fn width(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.right - self.left + 1
        }
    }

    pub fn height(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.bottom - self.top + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left > self.right || self.top > self.bottom
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right
            && point.y >= self.top
            && point.y <= self.bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(Point::rounded(1.5, 2.49), Point::new(2, 2));
        assert_eq!(Point::rounded(-0.5, -0.51), Point::new(0, -1));
    }

    #[test]
    fn cv_rect_is_inclusive() {
        let rect = FaceRect::from_cv(Rect::new(10, 20, 30, 40));
        assert_eq!(rect, FaceRect::new(10, 20, 39, 59));
        assert_eq!(rect.width(), 30);
        assert_eq!(rect.height(), 40);
        assert_eq!(rect.to_cv(), Rect::new(10, 20, 30, 40));
    }

    #[test]
    fn upscale_truncates_each_edge() {
        let rect = FaceRect::new(10, 21, 49, 60);
        assert_eq!(rect.upscale(0.5), FaceRect::new(20, 42, 98, 120));

        let rect = FaceRect::new(1, 1, 2, 2);
        assert_eq!(rect.upscale(0.3), FaceRect::new(3, 3, 6, 6));
    }

    #[test]
    fn full_frame_extends_past_last_pixel() {
        let rect = FaceRect::full_frame(640, 480);
        assert_eq!(rect, FaceRect::new(0, 0, 640, 480));
        assert!(rect.contains(Point::new(640, 480)));
    }

    #[test]
    fn empty_rect_has_no_size() {
        let rect = FaceRect::new(5, 5, 4, 10);
        assert!(rect.is_empty());
        assert_eq!(rect.width(), 0);
        assert!(!rect.contains(Point::new(5, 5)));
    }

    #[test]
    fn point_display_is_space_separated() {
        assert_eq!(Point::new(12, -3).to_string(), "12 -3");
    }
}
