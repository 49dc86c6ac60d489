use fixed::types::I32F32;
use std::ops::{Add, Mul};

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Wall-clock milliseconds as reported by the host.
pub type Millis = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and host hand-off.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// A deterministic 3-vector used for drop positions and velocities.
///
/// Arithmetic saturates at the Q32.32 range, so block coordinates at the
/// edge of `i32` clamp instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vec3 {
    pub x: Fixed64,
    pub y: Fixed64,
    pub z: Fixed64,
}

impl Vec3 {
    pub fn new(x: Fixed64, y: Fixed64, z: Fixed64) -> Self {
        Self { x, y, z }
    }

    /// Integer unit offset, e.g. a facing direction.
    pub fn from_offset((dx, dy, dz): (i32, i32, i32)) -> Self {
        Self::new(
            Fixed64::from_num(dx),
            Fixed64::from_num(dy),
            Fixed64::from_num(dz),
        )
    }

    pub fn to_f64(&self) -> (f64, f64, f64) {
        (
            fixed64_to_f64(self.x),
            fixed64_to_f64(self.y),
            fixed64_to_f64(self.z),
        )
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(
            self.x.saturating_add(rhs.x),
            self.y.saturating_add(rhs.y),
            self.z.saturating_add(rhs.z),
        )
    }
}

impl Mul<Fixed64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: Fixed64) -> Vec3 {
        Vec3::new(
            self.x.saturating_mul(rhs),
            self.y.saturating_mul(rhs),
            self.z.saturating_mul(rhs),
        )
    }
}
