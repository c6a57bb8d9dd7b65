//! Property tests for source scans: every connected ordering yields a
//! strictly ascending sequence with no duplicates and no omissions
//! relative to the authoritative contents.

use std::collections::HashMap;

use proptest::prelude::*;
use tributary_core::schema::SchemaBuilder;
use tributary_core::{
    FetchRequest, Operator, Row, SortSpec, SourceChange, Value, ValueType,
};
use tributary_index::compare_rows;
use tributary_source::Table;

fn table() -> Table {
    Table::new(
        SchemaBuilder::new("rows")
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
}

fn row(id: i64, rank: i64) -> Row {
    Row::new(vec![Value::Int(id), Value::Int(rank)])
}

#[derive(Clone, Debug)]
struct RawOp {
    selector: u8,
    id: i64,
    rank: i64,
}

fn raw_ops() -> impl Strategy<Value = Vec<RawOp>> {
    prop::collection::vec(
        (0u8..3, 0i64..10, 0i64..10).prop_map(|(selector, id, rank)| RawOp {
            selector,
            id,
            rank,
        }),
        1..80,
    )
}

proptest! {
    #[test]
    fn ordered_scans_match_authoritative_contents(ops in raw_ops()) {
        let table = table();
        let asc = table.connect(SortSpec::asc("rank"), None).unwrap();
        let desc = table.connect(SortSpec::desc("rank"), None).unwrap();

        let mut model: HashMap<i64, i64> = HashMap::new();
        for op in &ops {
            match op.selector {
                0 => {
                    if !model.contains_key(&op.id) {
                        model.insert(op.id, op.rank);
                        table.push(SourceChange::Add(row(op.id, op.rank))).unwrap();
                    }
                }
                1 => {
                    if let Some(rank) = model.remove(&op.id) {
                        table.push(SourceChange::Remove(row(op.id, rank))).unwrap();
                    }
                }
                _ => {
                    if let Some(&rank) = model.get(&op.id) {
                        model.insert(op.id, op.rank);
                        table
                            .push(SourceChange::edit(row(op.id, rank), row(op.id, op.rank)))
                            .unwrap();
                    }
                }
            }
        }

        for conn in [&asc, &desc] {
            let nodes = conn.fetch(FetchRequest::all()).unwrap().drain().unwrap();

            // No omissions, no duplicates.
            prop_assert_eq!(nodes.len(), model.len());
            let mut seen = std::collections::HashSet::new();
            for node in &nodes {
                let id = node.row().get(0).unwrap().as_int().unwrap();
                let rank = node.row().get(1).unwrap().as_int().unwrap();
                prop_assert_eq!(model.get(&id), Some(&rank));
                prop_assert!(seen.insert(id));
            }

            // Strictly ascending under the connection's ordering.
            let sort = conn.info().sort();
            for pair in nodes.windows(2) {
                prop_assert_eq!(
                    compare_rows(sort, pair[0].row(), pair[1].row()),
                    core::cmp::Ordering::Less
                );
            }
        }
    }

    /// A fetch constrained on an indexed column returns exactly the
    /// matching rows, still ordered.
    #[test]
    fn constrained_fetch_matches_filter(ops in raw_ops(), probe in 0i64..10) {
        let table = table();
        let conn = table.connect(SortSpec::asc("rank"), None).unwrap();
        table.hash_index("rank").unwrap();

        let mut model: HashMap<i64, i64> = HashMap::new();
        for op in &ops {
            if op.selector == 0 && !model.contains_key(&op.id) {
                model.insert(op.id, op.rank);
                table.push(SourceChange::Add(row(op.id, op.rank))).unwrap();
            }
        }

        let rank_pos = table.schema().column_index("rank").unwrap();
        let nodes = conn
            .fetch(FetchRequest::eq(rank_pos, Value::Int(probe)))
            .unwrap()
            .drain()
            .unwrap();

        let expected = model.values().filter(|&&rank| rank == probe).count();
        prop_assert_eq!(nodes.len(), expected);
        for node in &nodes {
            prop_assert_eq!(node.row().get(1), Some(&Value::Int(probe)));
        }
    }
}
