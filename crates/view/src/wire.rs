//! Change-envelope wire rendering.
//!
//! Renders changes as the tagged-union JSON shape transports forward to
//! remote consumers:
//!
//! - `add`/`remove` carry `node: {row, relationships}`
//! - `edit` carries `oldRow` and `row`
//! - `child` carries the parent `row` and `child: {relationshipName,
//!   change}`, recursively
//!
//! Rows render as objects keyed by column name, resolved through the view
//! layout's schemas. Writer only; parsing is the transport's concern.

use alloc::string::String;
use alloc::vec::Vec;
use tributary_core::{Change, Node, Row, Schema, Value};
use tributary_pipeline::{RelationshipLayout, ViewLayout};

/// Renders one change envelope against the view's layout.
pub fn render_change(change: &Change, layout: &ViewLayout) -> String {
    let mut out = String::new();
    write_change(
        &mut out,
        change,
        &layout.schema,
        &layout.relationships,
    );
    out
}

/// Renders a row as an object keyed by column name.
pub fn render_row(row: &Row, schema: &Schema) -> String {
    let mut out = String::new();
    write_row(&mut out, row, schema);
    out
}

fn write_change(
    out: &mut String,
    change: &Change,
    schema: &Schema,
    layouts: &[RelationshipLayout],
) {
    match change {
        Change::Add(node) => {
            out.push_str("{\"type\":\"add\",\"node\":");
            write_node(out, node, schema, layouts);
            out.push('}');
        }
        Change::Remove(node) => {
            out.push_str("{\"type\":\"remove\",\"node\":");
            write_node(out, node, schema, layouts);
            out.push('}');
        }
        Change::Edit { old, new } => {
            out.push_str("{\"type\":\"edit\",\"oldRow\":");
            write_row(out, old, schema);
            out.push_str(",\"row\":");
            write_row(out, new, schema);
            out.push('}');
        }
        Change::Child {
            row,
            relationship,
            change,
        } => {
            out.push_str("{\"type\":\"child\",\"row\":");
            write_row(out, row, schema);
            out.push_str(",\"child\":{\"relationshipName\":");
            write_string(out, relationship);
            out.push_str(",\"change\":");
            match layouts.iter().find(|l| l.name == *relationship) {
                Some(child_layout) => write_change(
                    out,
                    change,
                    &child_layout.schema,
                    &child_layout.children,
                ),
                // Unknown relationship: render rows positionally absent;
                // should not happen for built pipelines.
                None => out.push_str("null"),
            }
            out.push_str("}}");
        }
    }
}

fn write_node(out: &mut String, node: &Node, schema: &Schema, layouts: &[RelationshipLayout]) {
    out.push_str("{\"row\":");
    write_row(out, node.row(), schema);
    out.push_str(",\"relationships\":{");
    let mut first = true;
    for rel in node.relationships() {
        let Some(layout) = layouts.iter().find(|l| l.name == *rel.name()) else {
            continue;
        };
        if !first {
            out.push(',');
        }
        first = false;
        write_string(out, rel.name());
        out.push_str(":[");
        let mut first_child = true;
        for child in rel.nodes() {
            if !first_child {
                out.push(',');
            }
            first_child = false;
            write_node(out, child, &layout.schema, &layout.children);
        }
        out.push(']');
    }
    out.push_str("}}");
}

fn write_row(out: &mut String, row: &Row, schema: &Schema) {
    out.push('{');
    let columns: Vec<_> = schema.columns().iter().collect();
    for (pos, column) in columns.iter().enumerate() {
        if pos > 0 {
            out.push(',');
        }
        write_string(out, column.name());
        out.push(':');
        match row.get(pos) {
            None | Some(Value::Null) => out.push_str("null"),
            Some(Value::Bool(true)) => out.push_str("true"),
            Some(Value::Bool(false)) => out.push_str("false"),
            Some(Value::Int(i)) => {
                out.push_str(&alloc::format!("{}", i));
            }
            Some(Value::Float(f)) => {
                // The wire carries finite numbers only.
                if f.is_finite() {
                    out.push_str(&alloc::format!("{}", f));
                } else {
                    out.push_str("null");
                }
            }
            Some(Value::Text(s)) => write_string(out, s),
        }
    }
    out.push('}');
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&alloc::format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
