use criterion::{criterion_group, criterion_main, Criterion};
use quill::buffer::Buffer;
use quill::edit::insert_stream;
use quill::movement::move_to_sof;
use quill::search::{find, find_regexp, SearchEngine};
use std::hint::black_box;

fn setup_text() -> Buffer {
    let mut text = Vec::new();
    for i in 0..1000 {
        text.extend_from_slice(format!("prefix match_{i} suffix\0").as_bytes());
    }
    for _ in 0..1000 {
        text.extend_from_slice(b"the quick brown fox jumps over the lazy dog\0");
    }
    let mut b = Buffer::new(false);
    insert_stream(&mut b, b.cur_line_id, 0, 0, &text).unwrap();
    b
}

fn literal_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("literal_search");
    let never = || false;

    group.bench_function("find_deep_literal", |bench| {
        let mut b = setup_text();
        let mut engine = SearchEngine::default();
        bench.iter(|| {
            move_to_sof(&mut b);
            find(&mut b, &mut engine, Some(black_box(&b"match_900"[..])), false, false, &never).unwrap();
        })
    });

    group.bench_function("find_case_insensitive", |bench| {
        let mut b = setup_text();
        b.opt.case_search = false;
        let mut engine = SearchEngine::default();
        bench.iter(|| {
            move_to_sof(&mut b);
            find(&mut b, &mut engine, Some(black_box(&b"LAZY DOG"[..])), false, false, &never).unwrap();
        })
    });

    group.finish();
}

fn regex_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("regex_search");
    let never = || false;

    group.bench_function("find_regexp_digits", |bench| {
        let mut b = setup_text();
        let mut engine = SearchEngine::default();
        bench.iter(|| {
            move_to_sof(&mut b);
            find_regexp(
                &mut b,
                &mut engine,
                Some(black_box(&br"match_9[0-9]{2}"[..])),
                false,
                false,
                &never,
            )
            .unwrap();
        })
    });

    group.bench_function("compile_cached_repeat", |bench| {
        let mut b = setup_text();
        let mut engine = SearchEngine::default();
        b.find_string = Some(br"f[ou]x".to_vec());
        b.find_string_changed = 1;
        b.last_was_regexp = true;
        bench.iter(|| {
            move_to_sof(&mut b);
            find_regexp(&mut b, &mut engine, None, false, false, &never).unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, literal_search, regex_search);
criterion_main!(benches);
