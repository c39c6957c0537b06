//! Execution tracing.
//!
//! The tracer is a generic parameter of the dispatch loop, so the no-op
//! implementation is optimized away entirely.

use quarry_bytecode::Op;

/// Observer of the dispatch loop.
pub trait Tracer {
    fn trace_op(&mut self, _index: usize, _op: &Op, _redo: bool) {}
    fn trace_result(&mut self, _index: usize, _ok: bool) {}
    fn trace_yield(&mut self) {}
    fn trace_done(&mut self) {}
}

/// Tracer that does nothing.
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Tracer that prints every dispatched instruction to stderr.
pub struct PrintTracer;

impl Tracer for PrintTracer {
    fn trace_op(&mut self, index: usize, op: &Op, redo: bool) {
        eprintln!(
            "{index:>3}: {:<8} frame={} term={} redo={redo}",
            op.kind.name(),
            op.frame,
            op.term
        );
    }

    fn trace_result(&mut self, index: usize, ok: bool) {
        eprintln!("{index:>3}: -> {}", if ok { "pass" } else { "fail" });
    }

    fn trace_yield(&mut self) {
        eprintln!("     yield");
    }

    fn trace_done(&mut self) {
        eprintln!("     done");
    }
}
