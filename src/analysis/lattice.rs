//! The constant-propagation lattice.
//!
//! Abstract values form a three-level lattice:
//!
//! ```text
//!            NotConstant
//!          /   |   |    \
//!     ... c1   c2  c3 ...      (one element per concrete value)
//!          \   |   |    /
//!              Unknown
//! ```
//!
//! `Unknown` means no evidence has been seen yet, `Constant(c)` that every evidence so far
//! agrees on `c`, and `NotConstant` that the value varies. During a fixpoint a node's value
//! only ever moves up this picture, which bounds every node to at most two changes.

use std::fmt::{self, Debug};

use crate::ir::ConstValue;

/// A semi-lattice combining evidence from several sources.
///
/// `meet` must be idempotent, commutative and associative, with [`Self::unknown`] as its
/// identity and every [`Self::is_overdefined`] element absorbing.
pub trait MeetLattice: Clone + Debug + PartialEq {
    /// The element carrying no information. Identity of `meet`.
    fn unknown() -> Self;

    /// Combines the evidence of `self` and `other`.
    #[must_use]
    fn meet(&self, other: &Self) -> Self;

    /// Returns `true` for the absorbing element, after which nothing can change.
    fn is_overdefined(&self) -> bool;

    /// Lattice order: `self ⊑ other` iff combining them adds nothing to `other`.
    fn leq(&self, other: &Self) -> bool {
        &self.meet(other) == other
    }
}

/// Compile-time knowledge about a data value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AbstractValue {
    /// Nothing is known yet.
    #[default]
    Unknown,
    /// The value is always this constant.
    Constant(ConstValue),
    /// The value is not a compile-time constant.
    NotConstant,
}

impl AbstractValue {
    /// Returns `true` for [`AbstractValue::Unknown`].
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns `true` for [`AbstractValue::Constant`].
    #[must_use]
    pub const fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }

    /// The constant, if known.
    #[must_use]
    pub const fn as_constant(&self) -> Option<ConstValue> {
        match self {
            Self::Constant(c) => Some(*c),
            _ => None,
        }
    }

    /// Lifts a fallible constant computation into the lattice.
    ///
    /// `None` (division by zero, overflow, mixed types) becomes `NotConstant`.
    #[must_use]
    pub fn from_option(value: Option<ConstValue>) -> Self {
        value.map_or(Self::NotConstant, Self::Constant)
    }

    /// Applies a unary transfer function.
    pub fn map<F>(self, f: F) -> Self
    where
        F: FnOnce(ConstValue) -> Option<ConstValue>,
    {
        match self {
            Self::Constant(c) => Self::from_option(f(c)),
            other => other,
        }
    }

    /// Applies a binary transfer function.
    ///
    /// `NotConstant` on either side wins over `Unknown` on the other.
    pub fn combine<F>(self, other: Self, f: F) -> Self
    where
        F: FnOnce(ConstValue, ConstValue) -> Option<ConstValue>,
    {
        match (self, other) {
            (Self::NotConstant, _) | (_, Self::NotConstant) => Self::NotConstant,
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (Self::Constant(a), Self::Constant(b)) => Self::from_option(f(a, b)),
        }
    }
}

impl MeetLattice for AbstractValue {
    fn unknown() -> Self {
        Self::Unknown
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Unknown, x) | (x, Self::Unknown) => *x,
            (Self::Constant(a), Self::Constant(b)) if a == b => Self::Constant(*a),
            _ => Self::NotConstant,
        }
    }

    fn is_overdefined(&self) -> bool {
        matches!(self, Self::NotConstant)
    }
}

impl fmt::Display for AbstractValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("Unknown"),
            Self::Constant(c) => write!(f, "Constant({c})"),
            Self::NotConstant => f.write_str("NotConstant"),
        }
    }
}
