use std::fmt::Write as _;

use criterion::{criterion_group, criterion_main, Criterion};

use dispatchq::*;

struct Sink;

impl CallTarget for Sink {
    fn update_selection(&mut self, _update: SelectionUpdate) {}

    fn dump(&mut self, w: &mut dyn std::fmt::Write, _args: &[String]) -> std::fmt::Result {
        writeln!(w, "  sink")
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let host = ServiceHost::new();
    let wrapper = host.create_session(Box::new(Sink)).unwrap();
    let proxy = wrapper.proxy();
    let dispatch = DispatchLoop::spawn(wrapper);

    let update = SelectionUpdate {
        old_sel_start: 0,
        old_sel_end: 0,
        sel_start: 1,
        sel_end: 1,
        candidates_start: -1,
        candidates_end: -1,
    };

    // Fire-and-forget enqueue cost, as seen by a producer thread.
    c.bench_function("enqueue", |b| {
        b.iter(|| proxy.update_selection(update));
    });

    // Synchronous cross-thread round trip through the owner loop.
    c.bench_function("dump-pingpong", |b| {
        b.iter(|| {
            let mut out = String::new();
            proxy.dump(&mut out, &[]).unwrap();
            out
        })
    });

    drop(dispatch);
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
