//! Node operations.
//!
//! [`Op`] is the closed set of node kinds the optimizer understands. Every traversal in the
//! crate dispatches over it with an exhaustive `match`, so introducing a new kind forces
//! every pass to decide how to handle it before the crate compiles again.

use std::{cmp::Ordering, fmt};

use bitflags::bitflags;
use strum::{Display, EnumIter, IntoStaticStr};

use crate::ir::ConstValue;

/// Output selected by a `Proj` node from a multi-result predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjKind {
    /// Memory state after a side-effecting node, or the initial memory of `Start`.
    Mem,
    /// Data result of `Div`, `Mod`, `Load` or `Call`.
    Res,
    /// The n-th function argument, projected from `Start`.
    Arg(u32),
    /// Control edge followed when a `Cond` selector is true.
    True,
    /// Control edge followed when a `Cond` selector is false.
    False,
}

impl ProjKind {
    /// Returns `true` for the two arms of a `Cond`.
    #[must_use]
    pub const fn is_branch_arm(self) -> bool {
        matches!(self, Self::True | Self::False)
    }

    /// The selector value for which this arm is followed.
    #[must_use]
    pub const fn arm_value(self) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::False => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for ProjKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mem => f.write_str("M"),
            Self::Res => f.write_str("res"),
            Self::Arg(n) => write!(f, "arg{n}"),
            Self::True => f.write_str("true"),
            Self::False => f.write_str("false"),
        }
    }
}

/// Two-operand arithmetic and bitwise operations without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum BinaryOp {
    /// Wrapping addition.
    Add,
    /// Wrapping subtraction.
    Sub,
    /// Wrapping multiplication.
    Mul,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise exclusive or.
    Eor,
    /// Shift left.
    Shl,
    /// Logical shift right.
    Shr,
    /// Arithmetic shift right.
    Shrs,
}

impl BinaryOp {
    /// Evaluates the operation on two constants.
    #[must_use]
    pub fn eval(self, left: &ConstValue, right: &ConstValue) -> Option<ConstValue> {
        match self {
            Self::Add => left.add(right),
            Self::Sub => left.sub(right),
            Self::Mul => left.mul(right),
            Self::And => left.and(right),
            Self::Or => left.or(right),
            Self::Eor => left.eor(right),
            Self::Shl => left.shl(right),
            Self::Shr => left.shr(right),
            Self::Shrs => left.shrs(right),
        }
    }
}

/// Relation tested by a `Cmp` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Relation {
    /// `==`
    #[strum(to_string = "==")]
    Equal,
    /// `!=`
    #[strum(to_string = "!=")]
    LessGreater,
    /// `<`
    #[strum(to_string = "<")]
    Less,
    /// `<=`
    #[strum(to_string = "<=")]
    LessEqual,
    /// `>`
    #[strum(to_string = ">")]
    Greater,
    /// `>=`
    #[strum(to_string = ">=")]
    GreaterEqual,
}

impl Relation {
    /// Returns `true` if an operand pair ordered as `ordering` satisfies the relation.
    #[must_use]
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Equal => ordering == Ordering::Equal,
            Self::LessGreater => ordering != Ordering::Equal,
            Self::Less => ordering == Ordering::Less,
            Self::LessEqual => ordering != Ordering::Greater,
            Self::Greater => ordering == Ordering::Greater,
            Self::GreaterEqual => ordering != Ordering::Less,
        }
    }
}

bitflags! {
    /// Static properties of an [`Op`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpFlags: u16 {
        /// Transfers control: its value is a control edge or selects one.
        const CONTROL_FLOW = 0x0001;
        /// Consumes memory state as operand 0.
        const USES_MEMORY = 0x0002;
        /// Produces multiple results that must be projected.
        const TUPLE = 0x0004;
        /// May legally take part in a dependency cycle.
        const LOOP_BREAKER = 0x0008;
        /// Value is fixed at construction.
        const CONSTANT = 0x0010;
        /// Value is computed from operands by a transfer function.
        const FOLDABLE = 0x0020;
        /// Structural node every graph owns exactly once.
        const ANCHOR = 0x0040;
    }
}

/// Operation of a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum Op {
    /// Function entry. Produces the initial memory and the arguments.
    Start,
    /// Function exit. Operands are keep-alive edges.
    End,
    /// Basic block. Operands are the incoming control edges.
    Block,
    /// Unconditional jump.
    Jmp,
    /// Two-way branch on a boolean selector.
    Cond,
    /// Function return. Operands: memory, then the returned values.
    Return,
    /// Canonical marker for unreachable control flow and retired values.
    Bad,
    /// Literal constant.
    Const(ConstValue),
    /// Selects one output of a tuple-producing node.
    Proj(ProjKind),
    /// SSA merge. One operand per predecessor of its block.
    Phi,
    /// Two-operand arithmetic.
    Binary(BinaryOp),
    /// Comparison producing a boolean.
    Cmp(Relation),
    /// Two's complement negation.
    Minus,
    /// Bitwise complement.
    Not,
    /// Conversion to the node's mode.
    Conv,
    /// Integer division. Operands: memory, dividend, divisor.
    Div,
    /// Integer remainder. Operands: memory, dividend, divisor.
    Mod,
    /// Memory read. Operands: memory, address.
    Load,
    /// Memory write. Operands: memory, address, value.
    Store,
    /// Call of a named function. Operands: memory, arguments.
    Call(String),
    /// Retired node. Never reachable from End in a well-formed graph.
    Deleted,
}

impl Op {
    /// Variant name, used in dumps and error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Static properties of this operation.
    #[must_use]
    pub fn flags(&self) -> OpFlags {
        match self {
            Self::Start => OpFlags::ANCHOR | OpFlags::TUPLE,
            Self::End => OpFlags::ANCHOR,
            Self::Block => OpFlags::LOOP_BREAKER,
            Self::Jmp => OpFlags::CONTROL_FLOW,
            Self::Cond => OpFlags::CONTROL_FLOW | OpFlags::TUPLE | OpFlags::FOLDABLE,
            Self::Return => OpFlags::CONTROL_FLOW | OpFlags::USES_MEMORY,
            Self::Bad => OpFlags::ANCHOR | OpFlags::CONTROL_FLOW,
            Self::Const(_) => OpFlags::CONSTANT,
            Self::Proj(kind) if kind.is_branch_arm() => OpFlags::CONTROL_FLOW,
            Self::Proj(_) => OpFlags::empty(),
            Self::Phi => OpFlags::LOOP_BREAKER | OpFlags::FOLDABLE,
            Self::Binary(_) | Self::Cmp(_) | Self::Minus | Self::Not | Self::Conv => {
                OpFlags::FOLDABLE
            }
            Self::Div | Self::Mod => OpFlags::USES_MEMORY | OpFlags::TUPLE | OpFlags::FOLDABLE,
            Self::Load | Self::Store | Self::Call(_) => OpFlags::USES_MEMORY | OpFlags::TUPLE,
            Self::Deleted => OpFlags::empty(),
        }
    }

    /// Returns `true` for the two kinds that may legally sit on a dependency cycle.
    #[must_use]
    pub fn is_loop_breaker(&self) -> bool {
        self.flags().contains(OpFlags::LOOP_BREAKER)
    }

    /// Returns `true` for side-effecting nodes that thread memory through operand 0.
    #[must_use]
    pub fn uses_memory(&self) -> bool {
        self.flags().contains(OpFlags::USES_MEMORY)
    }

    /// Returns `true` for tuple nodes whose memory output is a `Proj(Mem)`.
    #[must_use]
    pub fn produces_memory(&self) -> bool {
        matches!(
            self,
            Self::Div | Self::Mod | Self::Load | Self::Store | Self::Call(_)
        )
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(value) => write!(f, "Const {value}"),
            Self::Proj(kind) => write!(f, "Proj {kind}"),
            Self::Binary(op) => write!(f, "{op}"),
            Self::Cmp(relation) => write!(f, "Cmp {relation}"),
            Self::Call(callee) => write!(f, "Call {callee}"),
            other => f.write_str(other.name()),
        }
    }
}
