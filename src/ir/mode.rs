//! Value modes of graph nodes.
//!
//! Every node produces a value of exactly one [`Mode`]. Integer and boolean modes carry
//! concrete data and can hold lattice constants. Pointers are data too, but the optimizer
//! never tracks them as constants. The remaining modes describe the structural values
//! threaded through the graph: memory state, control flow, tuples of results, and blocks.

use std::fmt;

use strum::IntoStaticStr;

/// The kind of value a node produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum Mode {
    /// Boolean, produced by comparisons and consumed by `Cond`.
    Bool,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 64-bit integer.
    U64,
    /// Address value. Never constant-folded.
    Ptr,
    /// Memory state threaded through side-effecting nodes.
    Memory,
    /// Control flow edge (`Jmp`, `Return`, arms of a `Cond`).
    Control,
    /// Multiple results, selected by `Proj` nodes.
    Tuple,
    /// Basic block.
    Block,
}

impl Mode {
    /// Returns `true` for modes holding a concrete runtime value.
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::I8
                | Self::U8
                | Self::I32
                | Self::U32
                | Self::I64
                | Self::U64
                | Self::Ptr
        )
    }

    /// Returns `true` for integer modes.
    #[must_use]
    pub const fn is_int(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::U8 | Self::I32 | Self::U32 | Self::I64 | Self::U64
        )
    }

    /// Returns `true` for modes whose values can become lattice constants.
    #[must_use]
    pub const fn is_foldable(self) -> bool {
        self.is_int() || matches!(self, Self::Bool)
    }

    /// Width in bits of an integer mode, or `None` for everything else.
    #[must_use]
    pub const fn bits(self) -> Option<u32> {
        match self {
            Self::I8 | Self::U8 => Some(8),
            Self::I32 | Self::U32 => Some(32),
            Self::I64 | Self::U64 => Some(64),
            _ => None,
        }
    }

    /// Short label used in dumps and error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
