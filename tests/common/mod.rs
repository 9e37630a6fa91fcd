//! Shared helpers for integration tests.
//!
//! Provides a tiny structured language (expressions, assignments, stores, calls, `if`,
//! bounded and endless loops), `proptest` strategies generating random programs in it, and
//! a lowering into function graphs that does SSA construction the way a front end would:
//! phis for every variable and for memory at merges and loop headers, keep-alive edges for
//! endless loops.

#![allow(dead_code)]

use proptest::{collection::vec, prelude::*};
use ssaprop::{
    ir::{
        BinaryOp, ConstValue, Execution, FunctionBuilder, FunctionGraph, Interpreter, Mode,
        NodeId, Op, Outcome, Relation,
    },
    Result,
};

/// Number of parameters of every generated function.
pub const PARAMS: u32 = 2;

/// Number of local variables. Variables below `PARAMS` start as the arguments.
pub const VARS: usize = 3;

/// Fuel used when comparing executions.
pub const FUEL: usize = 400;

/// Callees generated programs may reference.
pub const CALLEES: [&str; 3] = ["print", "rand", "sink"];

/// An integer expression.
#[derive(Debug, Clone)]
pub enum Expr {
    Const(i32),
    Arg(u32),
    Var(usize),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Minus(Box<Expr>),
    Not(Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Mod(Box<Expr>, Box<Expr>),
    Load(Box<Expr>),
    Call(&'static str, Vec<Expr>),
}

/// A branch condition.
#[derive(Debug, Clone)]
pub enum Condition {
    Const(bool),
    Cmp(Relation, Expr, Expr),
}

/// A statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    Assign(usize, Expr),
    Store(Expr, Expr),
    Call(&'static str, Vec<Expr>),
    If(Condition, Vec<Stmt>, Vec<Stmt>),
    /// `for (i = 0; i < limit; i++) body`
    Loop(i32, Vec<Stmt>),
    /// `while (true) body`
    Forever(Vec<Stmt>),
    Return(Expr),
}

// ================================================================================================
// Strategies
// ================================================================================================

fn binary_op() -> impl Strategy<Value = BinaryOp> {
    prop_oneof![
        Just(BinaryOp::Add),
        Just(BinaryOp::Sub),
        Just(BinaryOp::Mul),
        Just(BinaryOp::And),
        Just(BinaryOp::Or),
        Just(BinaryOp::Eor),
        Just(BinaryOp::Shl),
        Just(BinaryOp::Shr),
        Just(BinaryOp::Shrs),
    ]
}

fn relation() -> impl Strategy<Value = Relation> {
    prop_oneof![
        Just(Relation::Equal),
        Just(Relation::LessGreater),
        Just(Relation::Less),
        Just(Relation::LessEqual),
        Just(Relation::Greater),
        Just(Relation::GreaterEqual),
    ]
}

fn callee() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(CALLEES[0]), Just(CALLEES[1]), Just(CALLEES[2])]
}

/// Random expressions. Constants are small so comparisons and divisions by zero happen.
pub fn expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        3 => (-2i32..6).prop_map(Expr::Const),
        1 => (0..PARAMS).prop_map(Expr::Arg),
        2 => (0..VARS).prop_map(Expr::Var),
    ];
    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            4 => (binary_op(), inner.clone(), inner.clone())
                .prop_map(|(op, l, r)| Expr::Binary(op, Box::new(l), Box::new(r))),
            1 => inner.clone().prop_map(|e| Expr::Minus(Box::new(e))),
            1 => inner.clone().prop_map(|e| Expr::Not(Box::new(e))),
            1 => (inner.clone(), inner.clone()).prop_map(|(l, r)| Expr::Div(Box::new(l), Box::new(r))),
            1 => (inner.clone(), inner.clone()).prop_map(|(l, r)| Expr::Mod(Box::new(l), Box::new(r))),
            1 => inner.clone().prop_map(|e| Expr::Load(Box::new(e))),
            1 => (callee(), vec(inner, 0..2)).prop_map(|(name, args)| Expr::Call(name, args)),
        ]
    })
}

/// Random branch conditions, biased towards ones SCCP can decide.
pub fn condition() -> impl Strategy<Value = Condition> {
    prop_oneof![
        1 => any::<bool>().prop_map(Condition::Const),
        3 => (relation(), expr(), expr()).prop_map(|(rel, l, r)| Condition::Cmp(rel, l, r)),
    ]
}

/// Random statements.
pub fn stmt() -> impl Strategy<Value = Stmt> {
    let leaf = prop_oneof![
        4 => ((0..VARS), expr()).prop_map(|(var, e)| Stmt::Assign(var, e)),
        1 => (expr(), expr()).prop_map(|(addr, value)| Stmt::Store(addr, value)),
        1 => (callee(), vec(expr(), 0..2)).prop_map(|(name, args)| Stmt::Call(name, args)),
        1 => expr().prop_map(Stmt::Return),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            3 => (condition(), vec(inner.clone(), 0..4), vec(inner.clone(), 0..4))
                .prop_map(|(c, t, e)| Stmt::If(c, t, e)),
            2 => ((0i32..4), vec(inner.clone(), 0..4)).prop_map(|(n, body)| Stmt::Loop(n, body)),
            1 => vec(inner, 0..3).prop_map(Stmt::Forever),
        ]
    })
}

/// Random function bodies.
pub fn body() -> impl Strategy<Value = Vec<Stmt>> {
    vec(stmt(), 1..8)
}

/// Random argument lists.
pub fn args() -> impl Strategy<Value = Vec<ConstValue>> {
    vec((-3i32..5).prop_map(ConstValue::I32), PARAMS as usize)
}

// ================================================================================================
// Lowering
// ================================================================================================

/// SSA construction state.
struct Lowering {
    b: FunctionBuilder,
    block: NodeId,
    mem: NodeId,
    vars: Vec<NodeId>,
    done: bool,
}

/// Where an arm of an `if` left off.
struct Exit {
    jmp: NodeId,
    vars: Vec<NodeId>,
    mem: NodeId,
}

impl Lowering {
    fn new(name: &str) -> Self {
        let mut b = FunctionBuilder::new(name, PARAMS);
        let block = b.entry_block();
        let mem = b.initial_memory();
        let vars = (0..VARS)
            .map(|v| {
                if (v as u32) < PARAMS {
                    b.arg(v as u32, Mode::I32)
                } else {
                    b.const_i32(v as i32)
                }
            })
            .collect();
        Self {
            b,
            block,
            mem,
            vars,
            done: false,
        }
    }

    fn expr(&mut self, e: &Expr) -> NodeId {
        let block = self.block;
        match e {
            Expr::Const(c) => self.b.const_i32(*c),
            Expr::Arg(i) => self.b.arg(*i, Mode::I32),
            Expr::Var(v) => self.vars[*v],
            Expr::Binary(op, l, r) => {
                let (l, r) = (self.expr(l), self.expr(r));
                self.b.binary(block, *op, l, r)
            }
            Expr::Minus(e) => {
                let e = self.expr(e);
                self.b.unary(block, Op::Minus, e)
            }
            Expr::Not(e) => {
                let e = self.expr(e);
                self.b.unary(block, Op::Not, e)
            }
            Expr::Div(l, r) | Expr::Mod(l, r) => {
                let (l, r) = (self.expr(l), self.expr(r));
                let (mem, res) = if matches!(e, Expr::Div(..)) {
                    self.b.div(block, self.mem, l, r)
                } else {
                    self.b.modulo(block, self.mem, l, r)
                };
                self.mem = mem;
                res
            }
            Expr::Load(addr) => {
                let addr = self.expr(addr);
                let (mem, res) = self.b.load(block, self.mem, addr, Mode::I32);
                self.mem = mem;
                res
            }
            Expr::Call(name, args) => {
                let args: Vec<NodeId> = args.iter().map(|a| self.expr(a)).collect();
                let (mem, res) = self.b.call(block, self.mem, name, &args, Some(Mode::I64));
                self.mem = mem;
                let res = res.expect("call with a result mode has a result projection");
                self.b.conv(block, res, Mode::I32)
            }
        }
    }

    fn condition(&mut self, c: &Condition) -> NodeId {
        match c {
            Condition::Const(value) => self.b.const_bool(*value),
            Condition::Cmp(rel, l, r) => {
                let (l, r) = (self.expr(l), self.expr(r));
                self.b.cmp(self.block, *rel, l, r)
            }
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for s in stmts {
            if self.done {
                return;
            }
            self.stmt(s);
        }
    }

    fn exit(&mut self) -> Option<Exit> {
        if self.done {
            return None;
        }
        Some(Exit {
            jmp: self.b.jmp(self.block),
            vars: self.vars.clone(),
            mem: self.mem,
        })
    }

    fn stmt(&mut self, s: &Stmt) {
        match s {
            Stmt::Assign(var, e) => {
                let value = self.expr(e);
                self.vars[*var] = value;
            }
            Stmt::Store(addr, value) => {
                let (addr, value) = (self.expr(addr), self.expr(value));
                self.mem = self.b.store(self.block, self.mem, addr, value);
            }
            Stmt::Call(name, args) => {
                let args: Vec<NodeId> = args.iter().map(|a| self.expr(a)).collect();
                self.mem = self.b.call(self.block, self.mem, name, &args, None).0;
            }
            Stmt::Return(e) => {
                let value = self.expr(e);
                self.b.ret(self.block, self.mem, &[value]);
                self.done = true;
            }
            Stmt::If(c, then_body, else_body) => self.lower_if(c, then_body, else_body),
            Stmt::Loop(limit, body) => self.lower_loop(*limit, body),
            Stmt::Forever(body) => self.lower_forever(body),
        }
    }

    fn lower_if(&mut self, c: &Condition, then_body: &[Stmt], else_body: &[Stmt]) {
        let selector = self.condition(c);
        let (t, f) = self.b.cond(self.block, selector);
        let (vars, mem) = (self.vars.clone(), self.mem);

        self.block = self.b.block(&[t]);
        self.stmts(then_body);
        let then_exit = self.exit();

        self.vars = vars;
        self.mem = mem;
        self.done = false;
        self.block = self.b.block(&[f]);
        self.stmts(else_body);
        let else_exit = self.exit();

        match (then_exit, else_exit) {
            (None, None) => self.done = true,
            (Some(exit), None) | (None, Some(exit)) => {
                self.done = false;
                self.block = self.b.block(&[exit.jmp]);
                self.vars = exit.vars;
                self.mem = exit.mem;
            }
            (Some(a), Some(b)) => {
                self.done = false;
                let merge = self.b.block(&[a.jmp, b.jmp]);
                self.vars = a
                    .vars
                    .iter()
                    .zip(&b.vars)
                    .map(|(&x, &y)| {
                        if x == y {
                            x
                        } else {
                            self.b.phi(merge, &[x, y], Mode::I32)
                        }
                    })
                    .collect();
                self.mem = if a.mem == b.mem {
                    a.mem
                } else {
                    self.b.phi(merge, &[a.mem, b.mem], Mode::Memory)
                };
                self.block = merge;
            }
        }
    }

    /// Opens a loop header entered from the current block. Returns the header, the
    /// variable phis and the memory phi.
    fn header(&mut self) -> (NodeId, Vec<NodeId>, NodeId) {
        let enter = self.b.jmp(self.block);
        let header = self.b.block(&[enter]);
        let phis: Vec<NodeId> = self
            .vars
            .clone()
            .into_iter()
            .map(|v| self.b.phi(header, &[v], Mode::I32))
            .collect();
        let mem_phi = self.b.phi(header, &[self.mem], Mode::Memory);
        self.vars = phis.clone();
        self.mem = mem_phi;
        self.block = header;
        (header, phis, mem_phi)
    }

    fn close_loop(&mut self, header: NodeId, phis: &[NodeId], mem_phi: NodeId) {
        let back = self.b.jmp(self.block);
        self.b.add_pred(header, back);
        for (&phi, &value) in phis.iter().zip(&self.vars.clone()) {
            self.b.add_phi_operand(phi, value);
        }
        self.b.add_phi_operand(mem_phi, self.mem);
    }

    fn lower_loop(&mut self, limit: i32, body: &[Stmt]) {
        let zero = self.b.const_i32(0);
        let (header, phis, mem_phi) = self.header();
        let counter = self.b.phi(header, &[zero], Mode::I32);
        let limit = self.b.const_i32(limit);
        let cmp = self.b.cmp(header, Relation::Less, counter, limit);
        let (t, f) = self.b.cond(header, cmp);

        self.block = self.b.block(&[t]);
        self.stmts(body);
        if !self.done {
            let one = self.b.const_i32(1);
            let next = self.b.binary(self.block, BinaryOp::Add, counter, one);
            self.close_loop(header, &phis, mem_phi);
            self.b.add_phi_operand(counter, next);
        }

        self.done = false;
        self.block = self.b.block(&[f]);
        self.vars = phis;
        self.mem = mem_phi;
    }

    fn lower_forever(&mut self, body: &[Stmt]) {
        let (header, phis, mem_phi) = self.header();
        let j = self.b.jmp(header);
        self.block = self.b.block(&[j]);
        self.stmts(body);
        if !self.done {
            self.close_loop(header, &phis, mem_phi);
        }
        self.b.keep_alive(header);
        self.b.keep_alive(mem_phi);
        self.done = true;
    }

    fn finish(mut self) -> FunctionGraph {
        if !self.done {
            let result = self.vars[0];
            self.b.ret(self.block, self.mem, &[result]);
        }
        self.b.finish()
    }
}

/// Lowers a function body to a graph.
pub fn lower(name: &str, body: &[Stmt]) -> FunctionGraph {
    let mut lowering = Lowering::new(name);
    lowering.stmts(body);
    lowering.finish()
}

/// Observable behavior of `graph` on `args`, bounded by [`FUEL`].
pub fn observe(graph: &FunctionGraph, args: &[ConstValue]) -> Result<Execution> {
    Interpreter::new(graph)?.with_fuel(FUEL).run(args)
}

/// Whether two executions are indistinguishable to an observer.
///
/// Runs cut off by fuel are only required to agree on the effects both of them got to.
pub fn equivalent(a: &Execution, b: &Execution) -> bool {
    if a.outcome == Outcome::OutOfFuel || b.outcome == Outcome::OutOfFuel {
        let shared = a.effects.len().min(b.effects.len());
        return a.effects[..shared] == b.effects[..shared];
    }
    a.effects == b.effects && a.outcome == b.outcome
}

/// Number of live control edges of `graph`, counting keep-alives.
pub fn control_edge_count(graph: &FunctionGraph) -> usize {
    graph
        .ids()
        .filter(|&n| graph.is_block(n))
        .map(|block| graph.preds(block).len())
        .sum::<usize>()
        + graph.keep_alives().len()
}

/// Number of side-effecting nodes in `graph`.
pub fn side_effect_count(graph: &FunctionGraph) -> usize {
    graph
        .ids()
        .filter(|&n| graph.op(n).uses_memory() && graph.op(n) != &Op::Return)
        .count()
}
