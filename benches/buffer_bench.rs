use criterion::{criterion_group, criterion_main, Criterion};
use quill::buffer::Buffer;
use quill::edit::{delete_stream, insert_stream};
use std::hint::black_box;

fn setup_buffer(lines: usize) -> Buffer {
    let mut text = Vec::new();
    for i in 0..lines {
        if i > 0 {
            text.push(0);
        }
        text.extend_from_slice(format!("line {i} with a bit of content").as_bytes());
    }
    let mut b = Buffer::new(false);
    insert_stream(&mut b, b.cur_line_id, 0, 0, &text).unwrap();
    b
}

fn edit_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("edit_primitives");

    group.bench_function("insert_char_middle", |bench| {
        let mut b = setup_buffer(100);
        bench.iter(|| {
            insert_stream(&mut b, b.cur_line_id, 0, 5, black_box(b"x")).unwrap();
            delete_stream(&mut b, b.cur_line_id, 0, 5, 1).unwrap();
        })
    });

    group.bench_function("split_and_join", |bench| {
        let mut b = setup_buffer(100);
        bench.iter(|| {
            insert_stream(&mut b, b.cur_line_id, 0, 10, black_box(b"\0")).unwrap();
            delete_stream(&mut b, b.cur_line_id, 0, 10, 1).unwrap();
        })
    });

    group.bench_function("insert_large_stream", |bench| {
        let mut payload = Vec::new();
        for i in 0..100 {
            payload.extend_from_slice(format!("inserted line {i}\0").as_bytes());
        }
        bench.iter(|| {
            let mut b = setup_buffer(10);
            insert_stream(&mut b, b.cur_line_id, 0, 0, black_box(&payload)).unwrap();
            black_box(b.num_lines);
        })
    });

    group.finish();
}

fn undo_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("undo_engine");

    group.bench_function("undo_redo_cycle", |bench| {
        let mut b = setup_buffer(50);
        bench.iter(|| {
            insert_stream(&mut b, b.cur_line_id, 0, 0, black_box(b"edit ")).unwrap();
            quill::undo::undo(&mut b).unwrap();
            quill::undo::redo(&mut b).unwrap();
            quill::undo::undo(&mut b).unwrap();
        })
    });

    group.finish();
}

fn navigation(c: &mut Criterion) {
    let mut group = c.benchmark_group("navigation");

    group.bench_function("goto_line_far", |bench| {
        let mut b = setup_buffer(10_000);
        let mut target = 0;
        bench.iter(|| {
            target = (target + 7_919) % 10_000;
            quill::movement::goto_line(&mut b, black_box(target));
        })
    });

    group.finish();
}

criterion_group!(benches, edit_primitives, undo_engine, navigation);
criterion_main!(benches);
