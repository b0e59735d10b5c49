//! Opaque entity and object handles.

use std::fmt;

/// Handle of a networked entity or connected actor. `0` means "no entity".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetHandle(pub i32);

/// Handle of an object that only exists in the local game process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalHandle(pub i32);

impl NetHandle {
    /// The "no entity" sentinel.
    pub const NULL: Self = Self(0);

    /// Returns `true` if this is the sentinel handle.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The underlying wire value.
    pub fn value(self) -> i32 {
        self.0
    }
}

impl LocalHandle {
    /// The "no object" sentinel.
    pub const NULL: Self = Self(0);

    /// Returns `true` if this is the sentinel handle.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The underlying value.
    pub fn value(self) -> i32 {
        self.0
    }
}

impl From<i32> for NetHandle {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl From<i32> for LocalHandle {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for NetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net#{}", self.0)
    }
}

impl fmt::Display for LocalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_null_iff_zero() {
        for v in [i32::MIN, -1, 0, 1, 42, i32::MAX] {
            assert_eq!(NetHandle(v).is_null(), v == 0);
            assert_eq!(LocalHandle(v).is_null(), v == 0);
        }
        assert!(NetHandle::default().is_null());
        assert!(LocalHandle::NULL.is_null());
    }

    #[test]
    fn test_equality_compares_only_value() {
        assert_eq!(NetHandle(7), NetHandle::from(7));
        assert_ne!(NetHandle(7), NetHandle(8));
        assert_eq!(LocalHandle(-3), LocalHandle(-3));
    }

    #[test]
    fn test_display() {
        assert_eq!(NetHandle(12).to_string(), "net#12");
        assert_eq!(LocalHandle(5).to_string(), "local#5");
    }
}
