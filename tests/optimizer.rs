//! Constant propagation integration tests.
//!
//! These tests drive the public API end to end:
//! 1. Build a function graph with `FunctionBuilder`
//! 2. Run constant propagation (directly or through the `Optimizer`)
//! 3. Check the rewritten graph's shape and well-formedness
//! 4. Compare its behavior with the original using the reference interpreter

mod common;

use ssaprop::{
    analysis::{AbstractValue, ConstantPropagation},
    compiler::{EventKind, Optimizer, OptimizerConfig},
    ir::{
        verify_graph, BinaryOp, ConstValue, FunctionBuilder, FunctionGraph, Mode, NodeId, Op,
        Outcome, Program, Relation,
    },
    run_constant_propagation, Error, Result,
};

/// The single `Return` of a graph.
fn single_return(graph: &FunctionGraph) -> NodeId {
    let returns: Vec<NodeId> = graph
        .ids()
        .filter(|&n| graph.op(n) == &Op::Return)
        .collect();
    assert_eq!(returns.len(), 1, "expected exactly one return");
    returns[0]
}

fn count_op(graph: &FunctionGraph, pred: impl Fn(&Op) -> bool) -> usize {
    graph.ids().filter(|&n| pred(graph.op(n))).count()
}

#[test]
fn test_straight_line_arithmetic_folds() -> Result<()> {
    // x = 2; y = 3; z = x + y; return z;
    let mut sum = None;
    let graph = FunctionBuilder::new("main", 0).build_with(|b| {
        let entry = b.entry_block();
        let mem = b.initial_memory();
        let x = b.const_i32(2);
        let y = b.const_i32(3);
        let z = b.binary(entry, BinaryOp::Add, x, y);
        sum = Some(z);
        b.ret(entry, mem, &[z]);
    });
    let sum = sum.expect("sum node");

    let graph = run_constant_propagation(graph)?;
    verify_graph(&graph)?;

    assert!(graph.is_deleted(sum));
    assert_eq!(count_op(&graph, |op| matches!(op, Op::Binary(_))), 0);
    let ret = single_return(&graph);
    assert_eq!(
        graph.operand(ret, 1).and_then(|v| graph.const_value(v)),
        Some(ConstValue::I32(5))
    );
    Ok(())
}

#[test]
fn test_constant_condition_prunes_else_arm() -> Result<()> {
    // if (1 == 1) { return 10; } else { return 20; }
    let mut blocks = None;
    let original = FunctionBuilder::new("main", 0).build_with(|b| {
        let entry = b.entry_block();
        let mem = b.initial_memory();
        let one = b.const_i32(1);
        let cmp = b.cmp(entry, Relation::Equal, one, one);
        let (t, f) = b.cond(entry, cmp);
        let then_block = b.block(&[t]);
        let else_block = b.block(&[f]);
        let ten = b.const_i32(10);
        let twenty = b.const_i32(20);
        b.ret(then_block, mem, &[ten]);
        b.ret(else_block, mem, &[twenty]);
        blocks = Some((then_block, else_block));
    });
    let (then_block, else_block) = blocks.expect("blocks");

    let graph = run_constant_propagation(original.clone())?;
    verify_graph(&graph)?;

    assert!(graph.is_deleted(else_block));
    assert!(!graph.is_deleted(then_block));
    assert_eq!(count_op(&graph, |op| op == &Op::Cond), 0);
    assert_eq!(graph.preds(graph.end_block()).len(), 1);
    assert_eq!(graph.preds(then_block).len(), 1);
    assert_eq!(graph.op(graph.preds(then_block)[0]), &Op::Jmp);

    let ret = single_return(&graph);
    assert_eq!(
        graph.operand(ret, 1).and_then(|v| graph.const_value(v)),
        Some(ConstValue::I32(10))
    );

    let before = common::observe(&original, &[])?;
    let after = common::observe(&graph, &[])?;
    assert_eq!(after.outcome, Outcome::Returned(vec![ConstValue::I32(10)]));
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn test_endless_loop_is_not_constant() -> Result<()> {
    // x = 0; while (true) { x = x + 1; }
    let mut nodes = None;
    let graph = FunctionBuilder::new("main", 0).build_with(|b| {
        let entry = b.entry_block();
        let zero = b.const_i32(0);
        let one = b.const_i32(1);
        let enter = b.jmp(entry);
        let header = b.block(&[enter]);
        let x = b.phi(header, &[zero], Mode::I32);
        let next = b.binary(header, BinaryOp::Add, x, one);
        let back = b.jmp(header);
        b.add_pred(header, back);
        b.add_phi_operand(x, next);
        b.keep_alive(header);
        b.keep_alive(x);
        nodes = Some((header, x, next));
    });
    let (header, x, next) = nodes.expect("loop nodes");

    let result = ConstantPropagation::analyze(&graph)?;
    assert_eq!(result.value(x), Some(&AbstractValue::NotConstant));
    assert_eq!(result.value(next), Some(&AbstractValue::NotConstant));
    assert!(result.is_block_reachable(header));

    let graph = run_constant_propagation(graph)?;
    verify_graph(&graph)?;
    assert!(!graph.is_deleted(header));
    assert!(!graph.is_deleted(x));
    assert!(!graph.is_deleted(next));
    assert_eq!(graph.preds(header).len(), 2);
    assert!(graph.preds(graph.end_block()).is_empty());

    let run = common::observe(&graph, &[])?;
    assert_eq!(run.outcome, Outcome::OutOfFuel);
    Ok(())
}

#[test]
fn test_agreeing_arms_fold_through_phi() -> Result<()> {
    // a = input(); if (a > 0) { b = 1; } else { b = 1; } use(b);
    let mut nodes = None;
    let graph = FunctionBuilder::new("main", 0).build_with(|b| {
        let entry = b.entry_block();
        let mem = b.initial_memory();
        let (mem, a) = b.call(entry, mem, "input", &[], Some(Mode::I64));
        let a = a.expect("input result");
        let zero = b.constant(ConstValue::I64(0));
        let cmp = b.cmp(entry, Relation::Greater, a, zero);
        let (t, f) = b.cond(entry, cmp);
        let then_block = b.block(&[t]);
        let one_then = b.const_i32(1);
        let then_jmp = b.jmp(then_block);
        let else_block = b.block(&[f]);
        let one_else = b.const_i32(1);
        let else_jmp = b.jmp(else_block);
        let merge = b.block(&[then_jmp, else_jmp]);
        let phi = b.phi(merge, &[one_then, one_else], Mode::I32);
        let (mem, _) = b.call(merge, mem, "use", &[phi], None);
        b.ret(merge, mem, &[]);
        nodes = Some((phi, cmp));
    });
    let (phi, cmp) = nodes.expect("phi");

    let result = ConstantPropagation::analyze(&graph)?;
    assert_eq!(result.constant(phi), Some(ConstValue::I32(1)));
    assert_eq!(result.value(cmp), Some(&AbstractValue::NotConstant));

    let graph = run_constant_propagation(graph)?;
    verify_graph(&graph)?;
    assert!(graph.is_deleted(phi));
    assert_eq!(count_op(&graph, |op| op == &Op::Cond), 1);

    let call = graph
        .ids()
        .find(|&n| matches!(graph.op(n), Op::Call(name) if name == "use"))
        .expect("use call");
    assert_eq!(
        graph.operand(call, 1).and_then(|v| graph.const_value(v)),
        Some(ConstValue::I32(1))
    );
    Ok(())
}

#[test]
fn test_constant_division_leaves_memory_chain_intact() -> Result<()> {
    // *8 = 1; q = 10 / 2; *q = q; return q;
    let original = FunctionBuilder::new("main", 0).build_with(|b| {
        let entry = b.entry_block();
        let mem = b.initial_memory();
        let eight = b.const_i32(8);
        let one = b.const_i32(1);
        let mem = b.store(entry, mem, eight, one);
        let ten = b.const_i32(10);
        let two = b.const_i32(2);
        let (mem, q) = b.div(entry, mem, ten, two);
        let mem = b.store(entry, mem, q, q);
        b.ret(entry, mem, &[q]);
    });

    let graph = run_constant_propagation(original.clone())?;
    verify_graph(&graph)?;
    assert_eq!(count_op(&graph, |op| op == &Op::Div), 0);
    assert_eq!(count_op(&graph, |op| op == &Op::Store), 2);

    // The second store now consumes the first store's memory directly.
    let stores: Vec<NodeId> = graph
        .ids()
        .filter(|&n| graph.op(n) == &Op::Store)
        .collect();
    let first_mem = graph
        .users(stores[0])
        .iter()
        .copied()
        .find(|&p| graph.mode(p) == Mode::Memory)
        .expect("memory projection");
    assert_eq!(graph.operand(stores[1], 0), Some(first_mem));

    assert_eq!(common::observe(&original, &[])?, common::observe(&graph, &[])?);
    Ok(())
}

#[test]
fn test_division_by_constant_zero_is_kept() -> Result<()> {
    let original = FunctionBuilder::new("main", 0).build_with(|b| {
        let entry = b.entry_block();
        let mem = b.initial_memory();
        let ten = b.const_i32(10);
        let zero = b.const_i32(0);
        let (mem, q) = b.modulo(entry, mem, ten, zero);
        b.ret(entry, mem, &[q]);
    });

    let graph = run_constant_propagation(original.clone())?;
    verify_graph(&graph)?;
    assert_eq!(count_op(&graph, |op| op == &Op::Mod), 1);
    assert_eq!(common::observe(&graph, &[])?.outcome, Outcome::Trapped);
    assert_eq!(common::observe(&original, &[])?, common::observe(&graph, &[])?);
    Ok(())
}

#[test]
fn test_loop_with_constant_exit_stays_sound() -> Result<()> {
    // s = 7; for (i = 0; i < 3; i++) { s = s * 1; } return s;
    use common::{Expr, Stmt};
    let body = [
        Stmt::Assign(1, Expr::Const(7)),
        Stmt::Loop(
            3,
            vec![Stmt::Assign(
                1,
                Expr::Binary(BinaryOp::Mul, Box::new(Expr::Var(1)), Box::new(Expr::Const(1))),
            )],
        ),
        Stmt::Return(Expr::Var(1)),
    ];
    let original = common::lower("main", &body);
    verify_graph(&original)?;

    let graph = run_constant_propagation(original.clone())?;
    verify_graph(&graph)?;

    let ret = single_return(&graph);
    assert_eq!(
        graph.operand(ret, 1).and_then(|v| graph.const_value(v)),
        Some(ConstValue::I32(7))
    );
    let args = [ConstValue::I32(1), ConstValue::I32(2)];
    assert_eq!(common::observe(&original, &args)?, common::observe(&graph, &args)?);
    Ok(())
}

#[test]
fn test_second_run_changes_nothing() -> Result<()> {
    use common::{Condition, Expr, Stmt};
    let body = [
        Stmt::If(
            Condition::Cmp(Relation::Less, Expr::Const(1), Expr::Const(2)),
            vec![Stmt::Assign(0, Expr::Const(4))],
            vec![Stmt::Store(Expr::Const(0), Expr::Arg(1))],
        ),
        Stmt::Call("print", vec![Expr::Var(0)]),
        Stmt::Return(Expr::Binary(
            BinaryOp::Add,
            Box::new(Expr::Var(0)),
            Box::new(Expr::Var(2)),
        )),
    ];
    let graph = run_constant_propagation(common::lower("main", &body))?;
    let nodes = graph.active_node_count();

    let mut program: Program = [graph].into_iter().collect();
    let report = Optimizer::new(OptimizerConfig::default().sequential()).run(&mut program)?;
    assert!(!report.changed);
    assert!(!report.events.has_changes());
    assert_eq!(program.functions()[0].active_node_count(), nodes);
    Ok(())
}

#[test]
fn test_optimizer_removes_uncalled_functions() -> Result<()> {
    use common::{Expr, Stmt};
    let mut program: Program = [
        common::lower("main", &[Stmt::Call("helper", vec![Expr::Arg(0)])]),
        common::lower("helper", &[Stmt::Call("print", vec![Expr::Arg(1)])]),
        common::lower("orphan", &[Stmt::Call("helper", vec![])]),
    ]
    .into_iter()
    .collect();

    let report = Optimizer::default().run(&mut program)?;
    assert_eq!(report.removed_functions, vec!["orphan"]);
    assert_eq!(report.optimized, vec!["helper", "main", "orphan"]);
    let names: Vec<&str> = program.functions().iter().map(FunctionGraph::name).collect();
    assert_eq!(names, vec!["main", "helper"]);
    assert_eq!(report.events.count_kind(EventKind::FunctionRemoved), 1);
    assert_eq!(report.stats().functions_removed, 1);
    Ok(())
}

#[test]
fn test_optimizer_writes_dumps() -> Result<()> {
    let dir = std::env::temp_dir().join(format!("ssaprop-dumps-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;

    let mut program: Program = [
        common::lower("main", &[common::Stmt::Return(common::Expr::Const(1))]),
        common::lower("other", &[]),
    ]
    .into_iter()
    .collect();
    let config = OptimizerConfig {
        remove_unused_functions: false,
        ..OptimizerConfig::default()
    }
    .with_dumps(&dir);

    let report = Optimizer::new(config).run(&mut program)?;
    assert_eq!(
        report.dumps,
        vec![dir.join("main-opt.dot"), dir.join("other-opt.dot")]
    );
    let dot = std::fs::read_to_string(dir.join("main-opt.dot"))?;
    assert!(dot.starts_with("digraph"));
    assert_eq!(report.events.count_kind(EventKind::GraphDumped), 2);

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn test_verification_failure_names_function() {
    let broken = FunctionBuilder::new("broken", 1).build_with(|b| {
        let entry = b.entry_block();
        let mem = b.initial_memory();
        let x = b.arg(0, Mode::I32);
        let j = b.jmp(entry);
        let next = b.block(&[j]);
        let phi = b.phi(next, &[x, x], Mode::I32);
        b.ret(next, mem, &[phi]);
    });
    let mut program: Program = [common::lower("main", &[]), broken].into_iter().collect();

    match Optimizer::default().run(&mut program) {
        Err(Error::VerificationFailed(names)) => assert_eq!(names, vec!["broken"]),
        other => panic!("expected a verification failure, got {other:?}"),
    }
}

#[test]
fn test_memory_carrying_loop_with_early_exit() -> Result<()> {
    // while a < 2 * 5 { q = a / d; if q == 7 { return q; } sink(q); } return a;
    let original = FunctionBuilder::new("main", 2).build_with(|b| {
        let entry = b.entry_block();
        let mem0 = b.initial_memory();
        let a = b.arg(0, Mode::I32);
        let d = b.arg(1, Mode::I32);
        let two = b.const_i32(2);
        let five = b.const_i32(5);
        let bound = b.binary(entry, BinaryOp::Mul, two, five);
        let seven = b.const_i32(7);
        let enter = b.jmp(entry);
        let header = b.block(&[enter]);
        let mem_phi = b.phi(header, &[mem0], Mode::Memory);
        let more = b.cmp(header, Relation::Less, a, bound);
        let (stay, leave) = b.cond(header, more);
        let body = b.block(&[stay]);
        let (m1, q) = b.div(body, mem_phi, a, d);
        let hit = b.cmp(body, Relation::Equal, q, seven);
        let (found, again) = b.cond(body, hit);
        let found_block = b.block(&[found]);
        b.ret(found_block, m1, &[q]);
        let latch = b.block(&[again]);
        let (m2, _) = b.call(latch, m1, "sink", &[q], None);
        let back = b.jmp(latch);
        b.add_pred(header, back);
        b.add_phi_operand(mem_phi, m2);
        let exit = b.block(&[leave]);
        b.ret(exit, mem_phi, &[a]);
    });
    verify_graph(&original)?;

    let mut program: Program = [original.clone()].into_iter().collect();
    Optimizer::new(OptimizerConfig::default().sequential()).run(&mut program)?;
    let optimized = program.get("main").expect("main survives");
    verify_graph(optimized)?;
    assert_eq!(count_op(optimized, |op| matches!(op, Op::Binary(_))), 0);
    assert_eq!(count_op(optimized, |op| op == &Op::Div), 1);

    let cases = [
        ([7, 1], Outcome::Returned(vec![ConstValue::I32(7)])),
        ([-7, -1], Outcome::Returned(vec![ConstValue::I32(7)])),
        ([20, 0], Outcome::Returned(vec![ConstValue::I32(20)])),
        ([3, 0], Outcome::Trapped),
        ([3, 1], Outcome::OutOfFuel),
    ];
    for ([a, d], expected) in cases {
        let args = [ConstValue::I32(a), ConstValue::I32(d)];
        let before = common::observe(&original, &args)?;
        let after = common::observe(optimized, &args)?;
        assert_eq!(before.outcome, expected, "args {args:?}");
        assert!(
            common::equivalent(&before, &after),
            "args {args:?}\nbefore: {before:?}\nafter: {after:?}"
        );
    }
    Ok(())
}
