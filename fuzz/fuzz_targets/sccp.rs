#![no_main]

//! Decodes the input into a function graph, optimizes it, and checks that the result is
//! well-formed and behaves like the original.

use libfuzzer_sys::fuzz_target;
use ssaprop::ir::{
    verify_graph, BinaryOp, ConstValue, Execution, FunctionBuilder, FunctionGraph, Interpreter,
    Mode, NodeId, Op, Outcome, Relation,
};

const BINARY: [BinaryOp; 9] = [
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::And,
    BinaryOp::Or,
    BinaryOp::Eor,
    BinaryOp::Shl,
    BinaryOp::Shr,
    BinaryOp::Shrs,
];

const RELATIONS: [Relation; 6] = [
    Relation::Equal,
    Relation::LessGreater,
    Relation::Less,
    Relation::LessEqual,
    Relation::Greater,
    Relation::GreaterEqual,
];

const MAX_DEPTH: usize = 3;

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    b: FunctionBuilder,
    block: NodeId,
    mem: NodeId,
    pool: Vec<NodeId>,
    depth: usize,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        let mut b = FunctionBuilder::new("main", 2);
        let block = b.entry_block();
        let mem = b.initial_memory();
        let pool = vec![
            b.arg(0, Mode::I32),
            b.arg(1, Mode::I32),
            b.const_i32(0),
        ];
        Self {
            data,
            pos: 0,
            b,
            block,
            mem,
            pool,
            depth: 0,
        }
    }

    fn byte(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied();
        self.pos += 1;
        byte
    }

    fn pick(&mut self) -> Option<NodeId> {
        let index = self.byte()? as usize % self.pool.len();
        Some(self.pool[index])
    }

    fn last(&self) -> NodeId {
        self.pool[self.pool.len() - 1]
    }

    fn stmts(&mut self, budget: usize) -> Option<()> {
        for _ in 0..budget {
            self.stmt()?;
        }
        Some(())
    }

    fn stmt(&mut self) -> Option<()> {
        let block = self.block;
        let value = match self.byte()? % 9 {
            0 => {
                let c = self.byte()? as i8;
                self.b.const_i32(i32::from(c))
            }
            1 => {
                let op = BINARY[self.byte()? as usize % BINARY.len()];
                let (l, r) = (self.pick()?, self.pick()?);
                self.b.binary(block, op, l, r)
            }
            2 => {
                let op = if self.byte()? % 2 == 0 { Op::Minus } else { Op::Not };
                let x = self.pick()?;
                self.b.unary(block, op, x)
            }
            3 => {
                let (addr, value) = (self.pick()?, self.pick()?);
                self.mem = self.b.store(block, self.mem, addr, value);
                return Some(());
            }
            4 => {
                let modulo = self.byte()? % 2 == 0;
                let (l, r) = (self.pick()?, self.pick()?);
                let (mem, res) = if modulo {
                    self.b.modulo(block, self.mem, l, r)
                } else {
                    self.b.div(block, self.mem, l, r)
                };
                self.mem = mem;
                res
            }
            5 => {
                let addr = self.pick()?;
                let (mem, res) = self.b.load(block, self.mem, addr, Mode::I32);
                self.mem = mem;
                res
            }
            6 => {
                let callee = if self.byte()? % 2 == 0 { "print" } else { "rand" };
                let arg = self.pick()?;
                let (mem, res) = self.b.call(block, self.mem, callee, &[arg], Some(Mode::I64));
                self.mem = mem;
                self.b.conv(block, res?, Mode::I32)
            }
            7 if self.depth < MAX_DEPTH => return self.diamond(),
            8 if self.depth < MAX_DEPTH => return self.counting_loop(),
            _ => return Some(()),
        };
        self.pool.push(value);
        Some(())
    }

    fn diamond(&mut self) -> Option<()> {
        let selector = match self.byte()? % 3 {
            0 => self.b.const_bool(true),
            1 => self.b.const_bool(false),
            _ => {
                let relation = RELATIONS[self.byte()? as usize % RELATIONS.len()];
                let (l, r) = (self.pick()?, self.pick()?);
                self.b.cmp(self.block, relation, l, r)
            }
        };
        let (t, f) = self.b.cond(self.block, selector);
        let (saved_pool, saved_mem) = (self.pool.len(), self.mem);
        self.depth += 1;

        self.block = self.b.block(&[t]);
        let budget = self.byte()? as usize % 4;
        self.stmts(budget)?;
        let (then_value, then_mem) = (self.last(), self.mem);
        let then_jmp = self.b.jmp(self.block);
        self.pool.truncate(saved_pool);

        self.mem = saved_mem;
        self.block = self.b.block(&[f]);
        let budget = self.byte()? as usize % 4;
        self.stmts(budget)?;
        let (else_value, else_mem) = (self.last(), self.mem);
        let else_jmp = self.b.jmp(self.block);
        self.pool.truncate(saved_pool);

        self.depth -= 1;
        self.block = self.b.block(&[then_jmp, else_jmp]);
        let merged = self.b.phi(self.block, &[then_value, else_value], Mode::I32);
        self.pool.push(merged);
        if then_mem != else_mem {
            self.mem = self.b.phi(self.block, &[then_mem, else_mem], Mode::Memory);
        }
        Some(())
    }

    fn counting_loop(&mut self) -> Option<()> {
        let limit = self.b.const_i32(i32::from(self.byte()? % 4));
        let zero = self.b.const_i32(0);
        let one = self.b.const_i32(1);
        let init = self.last();

        let enter = self.b.jmp(self.block);
        let header = self.b.block(&[enter]);
        let counter = self.b.phi(header, &[zero], Mode::I32);
        let acc = self.b.phi(header, &[init], Mode::I32);
        let mem_phi = self.b.phi(header, &[self.mem], Mode::Memory);
        let cmp = self.b.cmp(header, Relation::Less, counter, limit);
        let (t, f) = self.b.cond(header, cmp);
        let saved_pool = self.pool.len();
        self.depth += 1;

        self.block = self.b.block(&[t]);
        self.mem = mem_phi;
        self.pool.push(acc);
        let budget = self.byte()? as usize % 4;
        self.stmts(budget)?;
        let next_acc = self.last();
        let next = self.b.binary(self.block, BinaryOp::Add, counter, one);
        let back = self.b.jmp(self.block);
        self.b.add_pred(header, back);
        self.b.add_phi_operand(counter, next);
        self.b.add_phi_operand(acc, next_acc);
        self.b.add_phi_operand(mem_phi, self.mem);
        self.pool.truncate(saved_pool);

        self.depth -= 1;
        self.block = self.b.block(&[f]);
        self.mem = mem_phi;
        self.pool.push(acc);
        Some(())
    }

    fn finish(mut self) -> FunctionGraph {
        let result = self.last();
        self.b.ret(self.block, self.mem, &[result]);
        self.b.finish()
    }
}

/// Decodes as many whole statements as the input holds.
fn decode(data: &[u8]) -> Option<(FunctionGraph, [ConstValue; 2])> {
    if data.len() < 2 {
        return None;
    }
    let (args, body) = data.split_at(2);
    let args = [
        ConstValue::I32(i32::from(args[0] as i8)),
        ConstValue::I32(i32::from(args[1] as i8)),
    ];

    // A statement cut off by the end of the input leaves the builder mid-construction, so
    // decode again and stop in front of it.
    let mut decoder = Decoder::new(body);
    let mut complete = 0;
    while decoder.pos < body.len() && decoder.stmt().is_some() {
        complete = decoder.pos;
    }
    if decoder.pos > body.len() {
        decoder = Decoder::new(&body[..complete]);
        while decoder.pos < complete && decoder.stmt().is_some() {}
    }
    Some((decoder.finish(), args))
}

fn run(graph: &FunctionGraph, args: &[ConstValue]) -> Execution {
    Interpreter::new(graph)
        .expect("schedulable graph")
        .with_fuel(256)
        .run(args)
        .expect("well-typed graph")
}

fuzz_target!(|data: &[u8]| {
    let Some((graph, args)) = decode(data) else {
        return;
    };
    verify_graph(&graph).expect("decoded graph is well-formed");

    let optimized = ssaprop::run_constant_propagation(graph.clone()).expect("optimization");
    verify_graph(&optimized).expect("optimized graph is well-formed");

    let before = run(&graph, &args);
    let after = run(&optimized, &args);
    if before.outcome == Outcome::OutOfFuel || after.outcome == Outcome::OutOfFuel {
        let shared = before.effects.len().min(after.effects.len());
        assert_eq!(before.effects[..shared], after.effects[..shared]);
    } else {
        assert_eq!(before, after);
    }
});
