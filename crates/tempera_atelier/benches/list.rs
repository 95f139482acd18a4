//! Benchmarks for keyed list rendering

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use tempera_atelier::{Array, Engine, ManualFrames, Object, Scheduler, Value, View};

const LIST: &str = r#"<ul><li *foreach="items" *class="odd: @odd">{{ @number }}. {{ @item }}</li></ul>"#;

const ROWS: usize = 1000;

fn rows(count: usize) -> Array {
    Array::from_vec((0..count).map(|i| Value::from(format!("row {i}"))).collect())
}

fn mounted(engine: &Rc<Engine>, items: &Array) -> (View, ManualFrames) {
    let frames = ManualFrames::new();
    let scheduler = Scheduler::new(frames.clone());
    let context = Object::new();
    context.set("items", items.clone());
    let view = View::mount(engine.clone(), scheduler, LIST, context).unwrap();
    frames.run_frame();
    (view, frames)
}

fn benchmark_mount(c: &mut Criterion) {
    let engine = Rc::new(Engine::default());
    let items = rows(ROWS);

    let mut group = c.benchmark_group("mount");
    group.throughput(Throughput::Elements(ROWS as u64));
    group.bench_function("list_1000", |b| {
        b.iter(|| {
            let (view, _frames) = mounted(&engine, black_box(&items));
            view.watcher_count()
        })
    });
    group.finish();
}

fn benchmark_mutation(c: &mut Criterion) {
    let engine = Rc::new(Engine::default());

    let mut group = c.benchmark_group("mutation");
    group.throughput(Throughput::Elements(ROWS as u64));

    group.bench_function("shift_1000", |b| {
        b.iter_batched(
            || {
                let items = rows(ROWS);
                let (view, frames) = mounted(&engine, &items);
                (items, view, frames)
            },
            |(items, view, frames)| {
                items.shift();
                frames.run_frame();
                view.renders()
            },
            BatchSize::LargeInput,
        )
    });

    group.bench_function("reverse_1000", |b| {
        b.iter_batched(
            || {
                let items = rows(ROWS);
                let (view, frames) = mounted(&engine, &items);
                (items, view, frames)
            },
            |(items, view, frames)| {
                items.reverse();
                frames.run_frame();
                view.renders()
            },
            BatchSize::LargeInput,
        )
    });

    group.bench_function("replace_1000", |b| {
        b.iter_batched(
            || {
                let items = rows(ROWS);
                let (view, frames) = mounted(&engine, &items);
                (view, frames)
            },
            |(view, frames)| {
                view.context().set("items", rows(ROWS));
                frames.run_frame();
                view.renders()
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(benches, benchmark_mount, benchmark_mutation);
criterion_main!(benches);
