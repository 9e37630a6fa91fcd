//! Concrete constant values.
//!
//! [`ConstValue`] is the payload of `Const` nodes and of `Constant` lattice elements. All
//! arithmetic follows target-machine integer semantics: results wrap on overflow, shift
//! amounts are taken modulo the operand width, and comparisons are signed or unsigned by
//! the operand type. Operations that have no defined compile-time result (division by zero,
//! `MIN / -1`, mixed operand types) return `None`; the analysis turns that into
//! `NotConstant` and leaves the trap to the generated code.

use std::fmt;

use crate::ir::{Mode, Relation};

/// A constant integer or boolean value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstValue {
    /// Boolean.
    Bool(bool),
    /// Signed 8-bit integer.
    I8(i8),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Signed 32-bit integer.
    I32(i32),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 64-bit integer.
    U64(u64),
}

/// Applies an expression to two integer constants of the same variant.
macro_rules! lift_int {
    ($lhs:expr, $rhs:expr, |$a:ident, $b:ident| $body:expr) => {
        match ($lhs, $rhs) {
            (ConstValue::I8($a), ConstValue::I8($b)) => $body.map(ConstValue::I8),
            (ConstValue::U8($a), ConstValue::U8($b)) => $body.map(ConstValue::U8),
            (ConstValue::I32($a), ConstValue::I32($b)) => $body.map(ConstValue::I32),
            (ConstValue::U32($a), ConstValue::U32($b)) => $body.map(ConstValue::U32),
            (ConstValue::I64($a), ConstValue::I64($b)) => $body.map(ConstValue::I64),
            (ConstValue::U64($a), ConstValue::U64($b)) => $body.map(ConstValue::U64),
            _ => None,
        }
    };
}

impl ConstValue {
    /// The mode a `Const` node carrying this value has.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        match self {
            Self::Bool(_) => Mode::Bool,
            Self::I8(_) => Mode::I8,
            Self::U8(_) => Mode::U8,
            Self::I32(_) => Mode::I32,
            Self::U32(_) => Mode::U32,
            Self::I64(_) => Mode::I64,
            Self::U64(_) => Mode::U64,
        }
    }

    /// The zero value of an integer or boolean mode.
    #[must_use]
    pub const fn zero(mode: Mode) -> Option<Self> {
        match mode {
            Mode::Bool => Some(Self::Bool(false)),
            Mode::I8 => Some(Self::I8(0)),
            Mode::U8 => Some(Self::U8(0)),
            Mode::I32 => Some(Self::I32(0)),
            Mode::U32 => Some(Self::U32(0)),
            Mode::I64 => Some(Self::I64(0)),
            Mode::U64 => Some(Self::U64(0)),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Sign- or zero-extends the value to 64 bits.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        match *self {
            Self::Bool(b) => b as i64,
            Self::I8(v) => v as i64,
            Self::U8(v) => v as i64,
            Self::I32(v) => v as i64,
            Self::U32(v) => v as i64,
            Self::I64(v) => v,
            Self::U64(v) => v as i64,
        }
    }

    /// Returns `true` if the value is an integer (or boolean) zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        match *self {
            Self::Bool(b) => !b,
            _ => self.as_i64() == 0,
        }
    }

    /// Two's complement negation.
    #[must_use]
    pub fn negate(&self) -> Option<Self> {
        match *self {
            Self::I8(v) => Some(Self::I8(v.wrapping_neg())),
            Self::U8(v) => Some(Self::U8(v.wrapping_neg())),
            Self::I32(v) => Some(Self::I32(v.wrapping_neg())),
            Self::U32(v) => Some(Self::U32(v.wrapping_neg())),
            Self::I64(v) => Some(Self::I64(v.wrapping_neg())),
            Self::U64(v) => Some(Self::U64(v.wrapping_neg())),
            Self::Bool(_) => None,
        }
    }

    /// Bitwise complement; logical negation for booleans.
    #[must_use]
    pub fn bitwise_not(&self) -> Option<Self> {
        Some(match *self {
            Self::Bool(b) => Self::Bool(!b),
            Self::I8(v) => Self::I8(!v),
            Self::U8(v) => Self::U8(!v),
            Self::I32(v) => Self::I32(!v),
            Self::U32(v) => Self::U32(!v),
            Self::I64(v) => Self::I64(!v),
            Self::U64(v) => Self::U64(!v),
        })
    }

    /// Wrapping addition.
    #[must_use]
    pub fn add(&self, other: &Self) -> Option<Self> {
        lift_int!(*self, *other, |a, b| Some(a.wrapping_add(b)))
    }

    /// Wrapping subtraction.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Option<Self> {
        lift_int!(*self, *other, |a, b| Some(a.wrapping_sub(b)))
    }

    /// Wrapping multiplication.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Option<Self> {
        lift_int!(*self, *other, |a, b| Some(a.wrapping_mul(b)))
    }

    /// Truncating division. `None` on a zero divisor or signed overflow.
    #[must_use]
    pub fn div(&self, other: &Self) -> Option<Self> {
        lift_int!(*self, *other, |a, b| a.checked_div(b))
    }

    /// Remainder with the sign of the dividend. `None` on a zero divisor or signed overflow.
    #[must_use]
    pub fn rem(&self, other: &Self) -> Option<Self> {
        lift_int!(*self, *other, |a, b| a.checked_rem(b))
    }

    /// Bitwise and; logical and for booleans.
    #[must_use]
    pub fn and(&self, other: &Self) -> Option<Self> {
        match (*self, *other) {
            (Self::Bool(a), Self::Bool(b)) => Some(Self::Bool(a && b)),
            (a, b) => lift_int!(a, b, |x, y| Some(x & y)),
        }
    }

    /// Bitwise or; logical or for booleans.
    #[must_use]
    pub fn or(&self, other: &Self) -> Option<Self> {
        match (*self, *other) {
            (Self::Bool(a), Self::Bool(b)) => Some(Self::Bool(a || b)),
            (a, b) => lift_int!(a, b, |x, y| Some(x | y)),
        }
    }

    /// Bitwise exclusive or; inequality for booleans.
    #[must_use]
    pub fn eor(&self, other: &Self) -> Option<Self> {
        match (*self, *other) {
            (Self::Bool(a), Self::Bool(b)) => Some(Self::Bool(a ^ b)),
            (a, b) => lift_int!(a, b, |x, y| Some(x ^ y)),
        }
    }

    /// Shift left. The amount is any integer and is taken modulo the width of `self`.
    #[must_use]
    pub fn shl(&self, amount: &Self) -> Option<Self> {
        let amount = Self::shift_amount(amount)?;
        Some(match *self {
            Self::I8(v) => Self::I8(v.wrapping_shl(amount)),
            Self::U8(v) => Self::U8(v.wrapping_shl(amount)),
            Self::I32(v) => Self::I32(v.wrapping_shl(amount)),
            Self::U32(v) => Self::U32(v.wrapping_shl(amount)),
            Self::I64(v) => Self::I64(v.wrapping_shl(amount)),
            Self::U64(v) => Self::U64(v.wrapping_shl(amount)),
            Self::Bool(_) => return None,
        })
    }

    /// Logical shift right, filling with zeros regardless of signedness.
    #[must_use]
    pub fn shr(&self, amount: &Self) -> Option<Self> {
        let amount = Self::shift_amount(amount)?;
        Some(match *self {
            Self::I8(v) => Self::I8((v as u8).wrapping_shr(amount) as i8),
            Self::U8(v) => Self::U8(v.wrapping_shr(amount)),
            Self::I32(v) => Self::I32((v as u32).wrapping_shr(amount) as i32),
            Self::U32(v) => Self::U32(v.wrapping_shr(amount)),
            Self::I64(v) => Self::I64((v as u64).wrapping_shr(amount) as i64),
            Self::U64(v) => Self::U64(v.wrapping_shr(amount)),
            Self::Bool(_) => return None,
        })
    }

    /// Arithmetic shift right, replicating the sign bit regardless of signedness.
    #[must_use]
    pub fn shrs(&self, amount: &Self) -> Option<Self> {
        let amount = Self::shift_amount(amount)?;
        Some(match *self {
            Self::I8(v) => Self::I8(v.wrapping_shr(amount)),
            Self::U8(v) => Self::U8((v as i8).wrapping_shr(amount) as u8),
            Self::I32(v) => Self::I32(v.wrapping_shr(amount)),
            Self::U32(v) => Self::U32((v as i32).wrapping_shr(amount) as u32),
            Self::I64(v) => Self::I64(v.wrapping_shr(amount)),
            Self::U64(v) => Self::U64((v as i64).wrapping_shr(amount) as u64),
            Self::Bool(_) => return None,
        })
    }

    fn shift_amount(amount: &Self) -> Option<u32> {
        match amount {
            Self::Bool(_) => None,
            // wrapping_shl/shr mask the amount with the operand width
            other => Some(other.as_i64() as u32),
        }
    }

    /// Evaluates `self <relation> other`. Both operands must have the same type.
    #[must_use]
    pub fn compare(&self, relation: Relation, other: &Self) -> Option<bool> {
        let ordering = match (*self, *other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(&b),
            (Self::I8(a), Self::I8(b)) => a.cmp(&b),
            (Self::U8(a), Self::U8(b)) => a.cmp(&b),
            (Self::I32(a), Self::I32(b)) => a.cmp(&b),
            (Self::U32(a), Self::U32(b)) => a.cmp(&b),
            (Self::I64(a), Self::I64(b)) => a.cmp(&b),
            (Self::U64(a), Self::U64(b)) => a.cmp(&b),
            _ => return None,
        };
        Some(relation.holds(ordering))
    }

    /// Re-tags the value into another integer or boolean mode.
    ///
    /// Integer conversions truncate or extend according to the source signedness. A
    /// conversion to `Bool` tests for non-zero. Returns `None` for non-foldable targets.
    #[must_use]
    pub fn convert_to(&self, mode: Mode) -> Option<Self> {
        let wide = self.as_i64();
        Some(match mode {
            Mode::Bool => Self::Bool(!self.is_zero()),
            Mode::I8 => Self::I8(wide as i8),
            Mode::U8 => Self::U8(wide as u8),
            Mode::I32 => Self::I32(wide as i32),
            Mode::U32 => Self::U32(wide as u32),
            Mode::I64 => Self::I64(wide),
            Mode::U64 => Self::U64(wide as u64),
            _ => return None,
        })
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::I8(v) => write!(f, "{v}:i8"),
            Self::U8(v) => write!(f, "{v}:u8"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}:u32"),
            Self::I64(v) => write!(f, "{v}:i64"),
            Self::U64(v) => write!(f, "{v}:u64"),
        }
    }
}
