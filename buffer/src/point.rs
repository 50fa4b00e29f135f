use std::fmt;

use crate::serialize::{Deserializer, Serializer};

/// A position in UTF-16 code-unit coordinates. `row` counts LF or CRLF line
/// terminators; `column` counts code units from the start of the row.
///
/// Ordering is lexicographic. Column arithmetic saturates so that
/// `u32::MAX` can be used as an "end of row" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    #[inline]
    pub fn new(row: u32, column: u32) -> Point {
        Point { row, column }
    }

    #[inline]
    pub fn zero() -> Point {
        Point::new(0, 0)
    }

    /// The largest representable point.
    #[inline]
    pub fn max() -> Point {
        Point::new(u32::MAX, u32::MAX)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.row == 0 && self.column == 0
    }

    /// The point reached by walking `distance` forward from `self`.
    /// A zero-row distance extends the current row; otherwise the distance's
    /// column replaces the current one.
    #[inline]
    pub fn traverse(&self, distance: Point) -> Point {
        if distance.row == 0 {
            Point::new(self.row, self.column.saturating_add(distance.column))
        } else {
            Point::new(self.row.saturating_add(distance.row), distance.column)
        }
    }

    /// The distance from `start` to `self`; inverse of [`Point::traverse`].
    #[inline]
    pub fn traversal(&self, start: Point) -> Point {
        if self.row == start.row {
            Point::new(0, self.column.saturating_sub(start.column))
        } else {
            Point::new(self.row.saturating_sub(start.row), self.column)
        }
    }

    pub(crate) fn serialize(&self, serializer: &mut Serializer) {
        serializer.append_u32(self.row);
        serializer.append_u32(self.column);
    }

    pub(crate) fn deserialize(deserializer: &mut Deserializer) -> Option<Point> {
        let row = deserializer.read_u32()?;
        let column = deserializer.read_u32()?;
        Some(Point::new(row, column))
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}
