//! Benchmarks for incremental maintenance: push fan-out through a joined
//! pipeline and window churn under a take.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tributary_core::schema::SchemaBuilder;
use tributary_core::{Row, SortSpec, SourceChange, Value, ValueType};
use tributary_pipeline::probe::Sink;
use tributary_pipeline::{JoinSpec, PipelineBuilder};
use tributary_source::SourceSet;

fn sources() -> SourceSet {
    let mut set = SourceSet::new();
    set.create(
        SchemaBuilder::new("issues")
            .unwrap()
            .column("id", ValueType::Int)
            .unwrap()
            .column("rank", ValueType::Int)
            .unwrap()
            .primary_key(&["id"])
            .unwrap()
            .build()
            .unwrap(),
    )
    .unwrap();
    set.create(
        SchemaBuilder::new("comments")
            .unwrap()
            .column("id", ValueType::Int)
            .unwrap()
            .column("issueID", ValueType::Int)
            .unwrap()
            .primary_key(&["id"])
            .unwrap()
            .build()
            .unwrap(),
    )
    .unwrap();
    set
}

fn issue(id: i64, rank: i64) -> Row {
    Row::new(vec![Value::Int(id), Value::Int(rank)])
}

fn comment(id: i64, issue_id: i64) -> Row {
    Row::new(vec![Value::Int(id), Value::Int(issue_id)])
}

fn bench_child_push_through_join(c: &mut Criterion) {
    c.bench_function("join/child_push_1k_parents", |b| {
        let set = sources();
        let pipeline = PipelineBuilder::new(&set, "issues")
            .ordered(SortSpec::asc("rank"))
            .join(JoinSpec::new("comments", "id", "issueID", "comments"))
            .build()
            .unwrap();
        let _sink = Sink::attach(pipeline.root().clone());
        for id in 0..1000 {
            set.push("issues", SourceChange::Add(issue(id, id))).unwrap();
        }

        let mut next = 0i64;
        b.iter(|| {
            set.push(
                "comments",
                SourceChange::Add(comment(next, black_box(next % 1000))),
            )
            .unwrap();
            next += 1;
        });
    });
}

fn bench_take_window_churn(c: &mut Criterion) {
    c.bench_function("take/window_churn_10_of_10k", |b| {
        let set = sources();
        let pipeline = PipelineBuilder::new(&set, "issues")
            .ordered(SortSpec::asc("rank"))
            .take(10)
            .build()
            .unwrap();
        let _sink = Sink::attach(pipeline.root().clone());
        for id in 0..10_000 {
            set.push("issues", SourceChange::Add(issue(id, id + 100))).unwrap();
        }

        let mut next = 0i64;
        b.iter(|| {
            // Alternately enter and leave the window front.
            let id = 50_000 + next;
            set.push("issues", SourceChange::Add(issue(id, black_box(0))))
                .unwrap();
            set.push("issues", SourceChange::Remove(issue(id, 0))).unwrap();
            next += 1;
        });
    });
}

criterion_group!(benches, bench_child_push_through_join, bench_take_window_churn);
criterion_main!(benches);
