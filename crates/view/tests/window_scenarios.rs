//! View-level scenarios: windows, filters, and flush batching.

use std::cell::RefCell;
use std::rc::Rc;

use tributary_core::schema::SchemaBuilder;
use tributary_core::{Change, CmpOp, FilterSpec, Row, SortSpec, SourceChange, Value, ValueType};
use tributary_pipeline::PipelineBuilder;
use tributary_source::SourceSet;
use tributary_view::MaterializedView;

fn sources() -> SourceSet {
    let mut set = SourceSet::new();
    set.create(
        SchemaBuilder::new("rows")
            .unwrap()
            .column("id", ValueType::Int)
            .unwrap()
            .column("status", ValueType::Text)
            .unwrap()
            .primary_key(&["id"])
            .unwrap()
            .build()
            .unwrap(),
    )
    .unwrap();
    set
}

fn row(id: i64, status: &str) -> Row {
    Row::new(vec![Value::Int(id), Value::Text(status.into())])
}

fn ids(view: &MaterializedView) -> Vec<i64> {
    view.rows()
        .iter()
        .map(|r| r.get(0).unwrap().as_int().unwrap())
        .collect()
}

fn collect_changes(view: &MaterializedView) -> Rc<RefCell<Vec<Change>>> {
    let log: Rc<RefCell<Vec<Change>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    view.add_listener(move |changes| sink.borrow_mut().extend(changes.iter().cloned()));
    log
}

#[test]
fn take_window_add_below_start_evicts_window_end() {
    let set = sources();
    let pipeline = PipelineBuilder::new(&set, "rows")
        .ordered(SortSpec::asc("id"))
        .take(2)
        .build()
        .unwrap();
    let view = MaterializedView::attach(pipeline);

    set.push("rows", SourceChange::Add(row(1, "open"))).unwrap();
    set.push("rows", SourceChange::Add(row(2, "open"))).unwrap();
    view.hydrate().unwrap();
    assert_eq!(ids(&view), vec![1, 2]);

    let log = collect_changes(&view);
    set.push("rows", SourceChange::Add(row(0, "open"))).unwrap();
    view.flush();

    let changes = log.borrow();
    assert_eq!(changes.len(), 2);
    assert!(changes[0].is_add());
    assert_eq!(changes[0].row().get(0), Some(&Value::Int(0)));
    assert!(changes[1].is_remove());
    assert_eq!(changes[1].row().get(0), Some(&Value::Int(2)));
    drop(changes);

    assert_eq!(ids(&view), vec![0, 1]);
}

#[test]
fn filter_edit_out_of_predicate_emits_remove() {
    let set = sources();
    let pipeline = PipelineBuilder::new(&set, "rows")
        .ordered(SortSpec::asc("id"))
        .filter(FilterSpec::new("status", CmpOp::Eq, "open"))
        .without_push_down()
        .build()
        .unwrap();
    let view = MaterializedView::attach(pipeline);
    view.hydrate().unwrap();

    set.push("rows", SourceChange::Add(row(1, "open"))).unwrap();
    assert_eq!(ids(&view), vec![1]);

    let log = collect_changes(&view);
    set.push(
        "rows",
        SourceChange::edit(row(1, "open"), row(1, "closed")),
    )
    .unwrap();
    view.flush();

    let changes = log.borrow();
    assert_eq!(changes.len(), 1);
    assert!(changes[0].is_remove());
    drop(changes);
    assert!(view.is_empty());
}

#[test]
fn pushed_down_filter_behaves_identically() {
    let set = sources();
    let pipeline = PipelineBuilder::new(&set, "rows")
        .ordered(SortSpec::asc("id"))
        .filter(FilterSpec::new("status", CmpOp::Eq, "open"))
        .build()
        .unwrap();
    let view = MaterializedView::attach(pipeline);
    view.hydrate().unwrap();

    set.push("rows", SourceChange::Add(row(1, "open"))).unwrap();
    set.push("rows", SourceChange::Add(row(2, "closed"))).unwrap();
    set.push(
        "rows",
        SourceChange::edit(row(2, "closed"), row(2, "open")),
    )
    .unwrap();

    assert_eq!(ids(&view), vec![1, 2]);
}

#[test]
fn skip_then_take_paginates() {
    let set = sources();
    let pipeline = PipelineBuilder::new(&set, "rows")
        .ordered(SortSpec::asc("id"))
        .skip(1)
        .take(2)
        .build()
        .unwrap();
    let view = MaterializedView::attach(pipeline);

    for id in [1, 2, 3, 4] {
        set.push("rows", SourceChange::Add(row(id, "open"))).unwrap();
    }
    view.hydrate().unwrap();
    assert_eq!(ids(&view), vec![2, 3]);

    // Removing the hidden first row shifts the page.
    set.push("rows", SourceChange::Remove(row(1, "open"))).unwrap();
    assert_eq!(ids(&view), vec![3, 4]);
}

#[test]
fn sort_key_edit_transits_take_window_in_one_push() {
    let set = sources();
    let pipeline = PipelineBuilder::new(&set, "rows")
        .ordered(SortSpec::asc("id"))
        .take(2)
        .build()
        .unwrap();
    let view = MaterializedView::attach(pipeline);

    for id in [1, 2, 3] {
        set.push("rows", SourceChange::Add(row(id, "open"))).unwrap();
    }
    view.hydrate().unwrap();
    assert_eq!(ids(&view), vec![1, 2]);

    // Row 1 leaves the window and row 3 backfills, in one push.
    set.push(
        "rows",
        SourceChange::edit(row(1, "open"), row(9, "open")),
    )
    .unwrap();
    assert_eq!(ids(&view), vec![2, 3]);

    // And back again.
    set.push(
        "rows",
        SourceChange::edit(row(9, "open"), row(1, "open")),
    )
    .unwrap();
    assert_eq!(ids(&view), vec![1, 2]);
}
