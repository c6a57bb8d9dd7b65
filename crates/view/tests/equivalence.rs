//! Property tests: incremental maintenance is equivalent to re-running
//! the query from scratch, changes are invertible, and disjoint-key
//! pushes commute.

use std::collections::HashMap;

use proptest::prelude::*;
use tributary_core::schema::SchemaBuilder;
use tributary_core::{Row, SortSpec, SourceChange, Value, ValueType};
use tributary_pipeline::{JoinSpec, PipelineBuilder};
use tributary_source::SourceSet;
use tributary_view::MaterializedView;

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

fn build_view(set: &SourceSet) -> std::rc::Rc<MaterializedView> {
    let pipeline = PipelineBuilder::new(set, "issues")
        .ordered(SortSpec::asc("rank"))
        .join(
            JoinSpec::new("comments", "id", "issueID", "comments")
                .ordered(SortSpec::asc("id")),
        )
        .build()
        .unwrap();
    MaterializedView::attach(pipeline)
}

fn issue(id: i64, rank: i64) -> Row {
    Row::new(vec![Value::Int(id), Value::Int(rank)])
}

fn comment(id: i64, issue_id: i64) -> Row {
    Row::new(vec![Value::Int(id), Value::Int(issue_id)])
}

/// Raw generated step, interpreted against a model to stay valid.
#[derive(Clone, Debug)]
struct RawOp {
    selector: u8,
    a: i64,
    b: i64,
}

fn raw_ops() -> impl Strategy<Value = Vec<RawOp>> {
    prop::collection::vec(
        (0u8..6, 0i64..8, 0i64..8).prop_map(|(selector, a, b)| RawOp { selector, a, b }),
        1..60,
    )
}

/// Interprets raw steps into valid source changes, tracking table contents
/// in a model so removes and edits always target existing rows.
fn interpret(ops: &[RawOp]) -> Vec<(&'static str, SourceChange)> {
    let mut issues: HashMap<i64, i64> = HashMap::new();
    let mut comments: HashMap<i64, i64> = HashMap::new();
    let mut changes = Vec::new();

    for op in ops {
        match op.selector {
            0 => {
                if !issues.contains_key(&op.a) {
                    issues.insert(op.a, op.b);
                    changes.push(("issues", SourceChange::Add(issue(op.a, op.b))));
                }
            }
            1 => {
                if let Some(rank) = issues.remove(&op.a) {
                    changes.push(("issues", SourceChange::Remove(issue(op.a, rank))));
                }
            }
            2 => {
                if let Some(&rank) = issues.get(&op.a) {
                    issues.insert(op.a, op.b);
                    changes.push((
                        "issues",
                        SourceChange::edit(issue(op.a, rank), issue(op.a, op.b)),
                    ));
                }
            }
            3 => {
                if !comments.contains_key(&op.a) {
                    comments.insert(op.a, op.b);
                    changes.push(("comments", SourceChange::Add(comment(op.a, op.b))));
                }
            }
            4 => {
                if let Some(issue_id) = comments.remove(&op.a) {
                    changes.push(("comments", SourceChange::Remove(comment(op.a, issue_id))));
                }
            }
            _ => {
                if let Some(&issue_id) = comments.get(&op.a) {
                    comments.insert(op.a, op.b);
                    changes.push((
                        "comments",
                        SourceChange::edit(comment(op.a, issue_id), comment(op.a, op.b)),
                    ));
                }
            }
        }
    }
    changes
}

proptest! {
    /// After any valid change sequence, the incrementally-maintained view
    /// equals a view hydrated from scratch over the same source contents.
    #[test]
    fn incremental_equals_rescan(ops in raw_ops()) {
        let changes = interpret(&ops);

        // Incremental universe: view attached before any change.
        let live_set = sources();
        let live_view = build_view(&live_set);
        live_view.hydrate().unwrap();
        for (table, change) in &changes {
            live_set.push(table, change.clone()).unwrap();
        }

        // Rescan universe: same changes, view built afterwards.
        let fresh_set = sources();
        for (table, change) in &changes {
            fresh_set.push(table, change.clone()).unwrap();
        }
        let fresh_view = build_view(&fresh_set);
        fresh_view.hydrate().unwrap();

        prop_assert_eq!(live_view.entries(), fresh_view.entries());
    }

    /// Applying a change and then its inverse restores the view exactly.
    #[test]
    fn change_then_inverse_roundtrips(ops in raw_ops(), extra in (0u8..6, 0i64..8, 0i64..8)) {
        let changes = interpret(&ops);
        let set = sources();
        let view = build_view(&set);
        view.hydrate().unwrap();
        for (table, change) in &changes {
            set.push(table, change.clone()).unwrap();
        }

        let before = view.entries();

        // Derive one more valid change from the current contents.
        let follow_up = interpret(&[
            ops.to_vec(),
            vec![RawOp { selector: extra.0, a: extra.1, b: extra.2 }],
        ].concat());
        if follow_up.len() > changes.len() {
            let (table, change) = follow_up.last().unwrap();
            set.push(table, change.clone()).unwrap();
            set.push(table, change.inverse()).unwrap();
            prop_assert_eq!(view.entries(), before);
        }
    }

    /// Two pushes with disjoint primary keys commute on the final view.
    #[test]
    fn disjoint_key_pushes_commute(rank_a in 0i64..8, rank_b in 0i64..8) {
        let first = SourceChange::Add(issue(1, rank_a));
        let second = SourceChange::Add(issue(2, rank_b));

        let set_ab = sources();
        let view_ab = build_view(&set_ab);
        view_ab.hydrate().unwrap();
        set_ab.push("issues", first.clone()).unwrap();
        set_ab.push("issues", second.clone()).unwrap();

        let set_ba = sources();
        let view_ba = build_view(&set_ba);
        view_ba.hydrate().unwrap();
        set_ba.push("issues", second).unwrap();
        set_ba.push("issues", first).unwrap();

        prop_assert_eq!(view_ab.entries(), view_ba.entries());
    }
}
