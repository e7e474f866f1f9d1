//! Left/right addressing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two actuators (or the session that talks to it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Left actuator.
    Left,
    /// Right actuator.
    Right,
}

impl Side {
    /// Both sides, left first.
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// The other side.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// A value held once per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SidePair<T> {
    /// Left value.
    pub left: T,
    /// Right value.
    pub right: T,
}

impl<T> SidePair<T> {
    /// Construct from both values.
    pub const fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    /// Borrow the value for `side`.
    #[inline]
    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Mutably borrow the value for `side`.
    #[inline]
    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Map both values.
    pub fn map<U>(self, mut f: impl FnMut(Side, T) -> U) -> SidePair<U> {
        SidePair {
            left: f(Side::Left, self.left),
            right: f(Side::Right, self.right),
        }
    }

    /// Convert into a `(left, right)` tuple.
    pub fn into_tuple(self) -> (T, T) {
        (self.left, self.right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_involutive() {
        for side in Side::BOTH {
            assert_eq!(side.opposite().opposite(), side);
            assert_ne!(side.opposite(), side);
        }
    }

    #[test]
    fn pair_access_and_map() {
        let mut pair = SidePair::new(1, 2);
        *pair.get_mut(Side::Right) += 10;
        assert_eq!(*pair.get(Side::Right), 12);
        let labels = pair.map(|side, v| format!("{side}={v}"));
        assert_eq!(
            labels.into_tuple(),
            ("left=1".to_string(), "right=12".to_string())
        );
    }
}
