//! Routing benchmarks.
//!
//! Run with: `cargo bench -p syme-router`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use http::Method;
use syme_router::{Invocable, MethodSet, RoutingTable};

struct Op;

impl Invocable for Op {
    fn is_invocable(&self) -> bool {
        true
    }
}

fn build_table(num_routes: usize) -> RoutingTable<Op> {
    let mut table = RoutingTable::new();
    let get = MethodSet::filter(["GET"]);

    for i in 0..num_routes / 3 {
        let _ = table.store(&format!("static{i}"), get, &format!("/api/v1/resource{i}"), Op);
    }

    for i in 0..num_routes / 3 {
        let _ = table.store(
            &format!("by_id{i}"),
            get,
            &format!("/api/v1/resource{i}/{{id:\\d+}}"),
            Op,
        );
    }

    for i in 0..num_routes / 3 {
        let _ = table.store(
            &format!("nested{i}"),
            get,
            &format!("/api/v1/org/{{org}}/resource{i}/{{id}}"),
            Op,
        );
    }

    table
}

fn bench_first_rule(c: &mut Criterion) {
    let table = build_table(99);

    c.bench_function("first_rule", |b| {
        b.iter(|| black_box(table.find(&Method::GET, "/api/v1/resource0")));
    });
}

fn bench_last_rule(c: &mut Criterion) {
    let table = build_table(99);

    c.bench_function("last_rule", |b| {
        b.iter(|| black_box(table.find(&Method::GET, "/api/v1/org/acme/resource32/7")));
    });
}

fn bench_miss(c: &mut Criterion) {
    let table = build_table(99);

    c.bench_function("miss", |b| {
        b.iter(|| black_box(table.find(&Method::GET, "/not/registered")));
    });
}

fn bench_table_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_size");

    for size in [12, 48, 96, 192] {
        let table = build_table(size);
        let last = size / 3 - 1;
        let path = format!("/api/v1/org/acme/resource{last}/7");

        group.bench_with_input(BenchmarkId::from_parameter(size), &path, |b, path| {
            b.iter(|| black_box(table.find(&Method::GET, path)));
        });
    }

    group.finish();
}

fn bench_uri_for(c: &mut Criterion) {
    let table = build_table(99);

    c.bench_function("uri_for", |b| {
        b.iter(|| black_box(table.uri_for("nested10", [("org", "acme"), ("id", "42")])));
    });
}

criterion_group!(
    benches,
    bench_first_rule,
    bench_last_rule,
    bench_miss,
    bench_table_sizes,
    bench_uri_for
);
criterion_main!(benches);
