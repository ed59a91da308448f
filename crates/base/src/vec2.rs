use std::{fmt, ops::Mul};

/// Two-component vector, used for image and region sizes (`x` = width, `y` = height).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Vec2<T> {
    pub x: T,
    pub y: T,
}

impl<T: fmt::Debug> fmt::Debug for Vec2<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vec2")
            .field("x", &self.x)
            .field("y", &self.y)
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for Vec2<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

impl<T> Vec2<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T: Mul<Output = T> + Copy> Vec2<T> {
    /// Product of both components (pixel count for a size).
    pub fn area(&self) -> T {
        self.x * self.y
    }
}

impl Vec2<usize> {
    pub fn is_empty(&self) -> bool {
        self.x == 0 || self.y == 0
    }

    /// Whether a `size` region starting at `origin` fits inside `self`.
    pub fn contains_region(&self, origin: Vec2<usize>, size: Vec2<usize>) -> bool {
        origin.x.checked_add(size.x).is_some_and(|right| right <= self.x)
            && origin.y.checked_add(size.y).is_some_and(|bottom| bottom <= self.y)
    }
}
