//! Plain vector type used on the wire.
//!
//! The protocol never touches host-engine math types; conversions to arrays
//! and `glam` vectors are the boundary for engine-side adapters.

use crate::wire;

/// Three-component float vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl Vector3 {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Create a vector from components.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Create a vector from double-precision components, truncating to `f32`.
    pub fn from_f64(x: f64, y: f64, z: f64) -> Self {
        Self::new(x as f32, y as f32, z as f32)
    }

    pub(crate) fn from_wire(v: Option<wire::Vector3>) -> Self {
        v.map(|v| Self::new(v.x, v.y, v.z)).unwrap_or_default()
    }

    /// Zero vectors are omitted from the wire.
    pub(crate) fn to_wire(self) -> Option<wire::Vector3> {
        if self == Self::ZERO {
            None
        } else {
            Some(wire::Vector3 {
                x: self.x,
                y: self.y,
                z: self.z,
            })
        }
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Vector3> for [f32; 3] {
    fn from(v: Vector3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl From<glam::Vec3> for Vector3 {
    fn from(v: glam::Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Vector3> for glam::Vec3 {
    fn from(v: Vector3) -> Self {
        glam::Vec3::new(v.x, v.y, v.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glam_conversion() {
        let v = Vector3::new(1.0, -2.5, 3.25);
        let g: glam::Vec3 = v.into();
        assert_eq!(g, glam::Vec3::new(1.0, -2.5, 3.25));
        assert_eq!(Vector3::from(g), v);
    }

    #[test]
    fn test_array_conversion() {
        let v = Vector3::from([4.0, 5.0, 6.0]);
        let a: [f32; 3] = v.into();
        assert_eq!(a, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_zero_vector_is_omitted_on_wire() {
        assert!(Vector3::ZERO.to_wire().is_none());
        assert_eq!(Vector3::from_wire(None), Vector3::ZERO);
        let v = Vector3::from_f64(1.5, 0.0, -1.0);
        assert_eq!(Vector3::from_wire(v.to_wire()), v);
    }
}
