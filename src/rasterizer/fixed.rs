//! 22.10 fixed-point arithmetic
//!
//! The whole pipeline works in integer fixed point: 1024 represents 1.0.
//! Division truncates toward zero, matching the integer divide the
//! renderer has always used. Never switch this to rounding division,
//! pixel output depends on it bit for bit.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Fixed-point scale (1.0)
pub const MAGIC: i32 = 1024;

/// log2(MAGIC)
pub const MEXP: u32 = 10;

/// A 22.10 fixed-point number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(pub i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(MAGIC);
    pub const HALF: Fixed = Fixed(MAGIC / 2);
    pub const MAX: Fixed = Fixed(i32::MAX);

    /// Build from an integer value (shifts left by MEXP)
    pub const fn from_int(v: i32) -> Self {
        Fixed(v << MEXP)
    }

    /// Wrap a raw 22.10 value
    pub const fn from_raw(raw: i32) -> Self {
        Fixed(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Integer part (arithmetic shift, so this floors negative values)
    pub const fn to_int(self) -> i32 {
        self.0 >> MEXP
    }

    /// Fractional part, 0..MAGIC
    pub const fn frac(self) -> i32 {
        self.0 & (MAGIC - 1)
    }

    /// Narrow a 64-bit intermediate, saturating at the i32 range
    pub fn from_i64_saturating(v: i64) -> Self {
        Fixed(v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
    }

    pub fn to_f32(self) -> f32 {
        self.0 as f32 / MAGIC as f32
    }

    pub fn from_f32(v: f32) -> Self {
        Fixed((v * MAGIC as f32) as i32)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.to_f32())
    }
}

impl Add for Fixed {
    type Output = Fixed;
    fn add(self, other: Fixed) -> Fixed {
        Fixed(self.0.wrapping_add(other.0))
    }
}

impl AddAssign for Fixed {
    fn add_assign(&mut self, other: Fixed) {
        self.0 = self.0.wrapping_add(other.0);
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    fn sub(self, other: Fixed) -> Fixed {
        Fixed(self.0.wrapping_sub(other.0))
    }
}

impl SubAssign for Fixed {
    fn sub_assign(&mut self, other: Fixed) {
        self.0 = self.0.wrapping_sub(other.0);
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    fn neg(self) -> Fixed {
        Fixed(self.0.wrapping_neg())
    }
}

/// (a * b) >> MEXP, computed in 64 bits
impl Mul for Fixed {
    type Output = Fixed;
    fn mul(self, other: Fixed) -> Fixed {
        Fixed::from_i64_saturating((self.0 as i64 * other.0 as i64) >> MEXP)
    }
}

/// (a << MEXP) / b, truncating toward zero. Dividing by zero saturates
/// toward the sign of the numerator instead of trapping.
impl Div for Fixed {
    type Output = Fixed;
    fn div(self, other: Fixed) -> Fixed {
        if other.0 == 0 {
            return match self.0.signum() {
                1 => Fixed(i32::MAX),
                -1 => Fixed(i32::MIN),
                _ => Fixed::ZERO,
            };
        }
        Fixed::from_i64_saturating(((self.0 as i64) << MEXP) / other.0 as i64)
    }
}
