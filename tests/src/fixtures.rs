//! Hand-built procedures shared by the test modules.

use thicket_core::cfg_ir::{BinOp, CmpPred, Procedure, ProcedureBuilder, Value};

/// `entry -> A -> exit` where `A: x = 1 + 1; call tick(x)` and `exit: ret x`.
pub(crate) fn straight_line() -> Procedure {
    let mut b = ProcedureBuilder::new("straight_line", 0);
    let entry = b.block("entry");
    let a = b.block("A");
    let exit = b.block("exit");
    b.br(entry, a);
    let x = b.binary(a, BinOp::Add, Value::Const(1), Value::Const(1));
    b.call(a, "tick", vec![x]);
    b.br(a, exit);
    b.ret(exit, Some(x));
    b.finish().unwrap()
}

/// Sums `0..n` with loop-carried PHIs.
pub(crate) fn sum_to() -> Procedure {
    let mut b = ProcedureBuilder::new("sum_to", 1);
    let entry = b.block("entry");
    let head = b.block("head");
    let body = b.block("body");
    let exit = b.block("exit");
    b.br(entry, head);
    let i = b.phi(head, vec![(entry, Value::Const(0))]);
    let sum = b.phi(head, vec![(entry, Value::Const(0))]);
    let c = b.cmp(head, CmpPred::Slt, i, Value::Arg(0));
    b.cond_br(head, c, body, exit);
    let sum2 = b.binary(body, BinOp::Add, sum, i);
    let i2 = b.binary(body, BinOp::Add, i, Value::Const(1));
    b.br(body, head);
    b.add_incoming(i, body, i2);
    b.add_incoming(sum, body, sum2);
    let r = b.binary(exit, BinOp::Mul, sum, Value::Const(3));
    b.ret(exit, Some(r));
    b.finish().unwrap()
}

/// Classifies its argument through a switch, merging the per-case results with a PHI.
pub(crate) fn classify() -> Procedure {
    let mut b = ProcedureBuilder::new("classify", 1);
    let entry = b.block("entry");
    let dispatch = b.block("dispatch");
    let zero = b.block("zero");
    let one = b.block("one");
    let other = b.block("other");
    let merge = b.block("merge");
    b.br(entry, dispatch);
    let key = b.binary(dispatch, BinOp::And, Value::Arg(0), Value::Const(3));
    b.switch(dispatch, key, other, vec![(0, zero), (1, one)]);
    let z = b.binary(zero, BinOp::Add, key, Value::Const(100));
    b.br(zero, merge);
    let o = b.binary(one, BinOp::Shl, Value::Arg(0), Value::Const(2));
    b.call(one, "note", vec![o]);
    b.br(one, merge);
    b.br(other, merge);
    let m = b.phi(merge, vec![(zero, z), (one, o), (other, Value::Const(-1))]);
    let r = b.binary(merge, BinOp::Xor, m, key);
    b.ret(merge, Some(r));
    b.finish().unwrap()
}

/// A value defined in `top` is read two blocks later, past a diamond.
pub(crate) fn cross_block() -> Procedure {
    let mut b = ProcedureBuilder::new("cross_block", 2);
    let entry = b.block("entry");
    let top = b.block("top");
    let left = b.block("left");
    let right = b.block("right");
    let bottom = b.block("bottom");
    b.br(entry, top);
    let t = b.binary(top, BinOp::Mul, Value::Arg(0), Value::Arg(1));
    let c = b.cmp(top, CmpPred::Sgt, t, Value::Const(10));
    b.marker(top, "diamond");
    b.cond_br(top, c, left, right);
    let l = b.binary(left, BinOp::Sub, t, Value::Const(10));
    b.br(left, bottom);
    b.call(right, "small", vec![t]);
    b.br(right, bottom);
    let m = b.phi(bottom, vec![(left, l), (right, t)]);
    let r = b.binary(bottom, BinOp::Add, m, t);
    b.ret(bottom, Some(r));
    b.finish().unwrap()
}

/// A block raising through `invoke`; the whole procedure is off limits.
pub(crate) fn with_invoke() -> Procedure {
    let mut b = ProcedureBuilder::new("with_invoke", 1);
    let entry = b.block("entry");
    let work = b.block("work");
    let ok = b.block("ok");
    let pad = b.block("pad");
    b.landing_pad(pad);
    b.br(entry, work);
    let x = b.binary(work, BinOp::Add, Value::Arg(0), Value::Const(1));
    let r = b.invoke(work, "may_throw", vec![x], ok, pad);
    b.ret(ok, Some(r));
    let e = b.call(pad, "catch", vec![]);
    b.resume(pad, e);
    b.finish().unwrap()
}

/// Has a body in the entry block and a landing pad reached by an ordinary branch.
pub(crate) fn guarded_entry() -> Procedure {
    let mut b = ProcedureBuilder::new("guarded_entry", 1);
    let entry = b.block("entry");
    let work = b.block("work");
    let pad = b.block("pad");
    b.landing_pad(pad);
    let c = b.cmp(entry, CmpPred::Sge, Value::Arg(0), Value::Const(0));
    b.cond_br(entry, c, work, pad);
    let w = b.binary(work, BinOp::Mul, Value::Arg(0), Value::Const(7));
    b.ret(work, Some(w));
    let p = b.call(pad, "cleanup", vec![Value::Arg(0)]);
    b.ret(pad, Some(p));
    b.finish().unwrap()
}

pub(crate) fn all() -> Vec<Procedure> {
    vec![straight_line(), sum_to(), classify(), cross_block(), guarded_entry()]
}
