//! Small geometry value types commonly read out of game targets.
//!
//! All three match the layouts such targets use in memory (tightly packed
//! 32-bit floats), so they move through the typed accessor like any other
//! scalar.

use crate::session::Scalar;

/// Packed 2-component float vector (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Vec2 {
        Vec2 { x, y }
    }

    pub fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let d = other.sub(self);
        (d.x * d.x + d.y * d.y).sqrt()
    }
}

/// Packed 3-component float vector (12 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Vec3 {
        Vec3 { x, y, z }
    }

    pub fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn distance(self, other: Vec3) -> f32 {
        let d = other.sub(self);
        (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
    }
}

/// Row-major 4x4 float matrix (64 bytes), e.g. a view-projection matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4x4(pub [f32; 16]);

impl Default for Mat4x4 {
    fn default() -> Mat4x4 {
        Mat4x4([0.0; 16])
    }
}

impl Mat4x4 {
    /// Element at `row, col`, both in `0..4`.
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.0[row * 4 + col]
    }
}

impl Scalar for Vec2 {
    const SIZE: usize = 8;

    fn from_bytes(bytes: &[u8]) -> Self {
        Vec2 {
            x: f32::from_bytes(&bytes[0..4]),
            y: f32::from_bytes(&bytes[4..8]),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.x.to_ne_bytes());
        out.extend_from_slice(&self.y.to_ne_bytes());
        out
    }
}

impl Scalar for Vec3 {
    const SIZE: usize = 12;

    fn from_bytes(bytes: &[u8]) -> Self {
        Vec3 {
            x: f32::from_bytes(&bytes[0..4]),
            y: f32::from_bytes(&bytes[4..8]),
            z: f32::from_bytes(&bytes[8..12]),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.x.to_ne_bytes());
        out.extend_from_slice(&self.y.to_ne_bytes());
        out.extend_from_slice(&self.z.to_ne_bytes());
        out
    }
}

impl Scalar for Mat4x4 {
    const SIZE: usize = 64;

    fn from_bytes(bytes: &[u8]) -> Self {
        let mut m = [0.0f32; 16];
        for (i, chunk) in bytes[..64].chunks_exact(4).enumerate() {
            m[i] = f32::from_bytes(chunk);
        }
        Mat4x4(m)
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        for v in self.0 {
            out.extend_from_slice(&v.to_ne_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec3_math() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 6.0, 3.0);
        assert_eq!(a.add(b), Vec3::new(5.0, 8.0, 6.0));
        assert_eq!(b.sub(a), Vec3::new(3.0, 4.0, 0.0));
        assert_eq!(a.distance(b), 5.0);
    }

    #[test]
    fn vec2_distance() {
        assert_eq!(Vec2::new(0.0, 0.0).distance(Vec2::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn vec3_byte_layout() {
        let v = Vec3::new(1.5, -2.0, 0.25);
        let bytes = v.to_bytes();
        assert_eq!(bytes.len(), Vec3::SIZE);
        assert_eq!(Vec3::from_bytes(&bytes), v);
    }

    #[test]
    fn matrix_byte_layout_and_indexing() {
        let mut m = Mat4x4::default();
        m.0[5] = 2.5; // row 1, col 1
        let bytes = m.to_bytes();
        assert_eq!(bytes.len(), Mat4x4::SIZE);
        let back = Mat4x4::from_bytes(&bytes);
        assert_eq!(back.at(1, 1), 2.5);
        assert_eq!(back.at(0, 0), 0.0);
    }
}
