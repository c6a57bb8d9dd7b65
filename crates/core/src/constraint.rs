//! Fetch constraints and push-down filters.
//!
//! A `Constraint` is a single equality predicate used to scope a fetch or
//! cleanup call. Joins use it to ask a child input for the rows matching
//! one join-key value. `Filters` are simple comparison conjunctions that an
//! operator may push down to a source; the source reports through
//! `applied_filters` on its handle whether it evaluated them itself.

use crate::error::Result;
use crate::row::Row;
use crate::schema::Schema;
use crate::value::Value;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;

/// An equality predicate `column = value`, by resolved column position.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    /// Column position in the producing schema.
    pub column: usize,
    /// Required value.
    pub value: Value,
}

impl Constraint {
    /// Creates an equality constraint.
    pub fn eq(column: usize, value: Value) -> Self {
        Self { column, value }
    }

    /// Returns true if the row satisfies this constraint.
    pub fn matches(&self, row: &Row) -> bool {
        row.get(self.column) == Some(&self.value)
    }
}

/// Comparison operator for push-down filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A single comparison, by resolved column position.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: usize,
    pub op: CmpOp,
    pub value: Value,
}

impl Condition {
    /// Returns true if the row satisfies this condition.
    ///
    /// Ordered comparisons against null are false; only `Eq`/`Ne` treat
    /// null as a comparable value.
    pub fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(self.column) else {
            return false;
        };
        match self.op {
            CmpOp::Eq => actual == &self.value,
            CmpOp::Ne => actual != &self.value,
            _ => {
                if actual.is_null() || self.value.is_null() {
                    return false;
                }
                let ord = actual.cmp(&self.value);
                match self.op {
                    CmpOp::Lt => ord == Ordering::Less,
                    CmpOp::Le => ord != Ordering::Greater,
                    CmpOp::Gt => ord == Ordering::Greater,
                    CmpOp::Ge => ord != Ordering::Less,
                    CmpOp::Eq | CmpOp::Ne => unreachable!("handled above"),
                }
            }
        }
    }
}

/// A single comparison, by column name. The public face of `Condition`;
/// resolved against a schema when a connection or filter is built.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterSpec {
    pub column: String,
    pub op: CmpOp,
    pub value: Value,
}

impl FilterSpec {
    /// Creates a filter condition by column name.
    pub fn new(column: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Resolves the column name against a schema.
    pub fn resolve(&self, schema: &Schema) -> Result<Condition> {
        Ok(Condition {
            column: schema.require_column(&self.column)?,
            op: self.op,
            value: self.value.clone(),
        })
    }
}

/// A conjunction of resolved comparison conditions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filters {
    conditions: Vec<Condition>,
}

impl Filters {
    /// Creates a conjunction from resolved conditions.
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    /// Resolves a list of name-based specs against a schema.
    pub fn resolve(specs: &[FilterSpec], schema: &Schema) -> Result<Self> {
        let mut conditions = Vec::with_capacity(specs.len());
        for spec in specs {
            conditions.push(spec.resolve(schema)?);
        }
        Ok(Self { conditions })
    }

    /// Returns true when there are no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns the conditions.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Returns true if the row satisfies every condition.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }
}

/// An exclusive or inclusive lower bound on the sort key of a scan.
///
/// Window operators use bounds to refill after a removal without
/// rescanning from the start.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanBound {
    /// Sort-key values in the producing input's normalized ordering.
    pub key: Vec<Value>,
    /// Whether a row whose sort key equals `key` is included.
    pub inclusive: bool,
}

/// Parameters of a fetch or cleanup call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchRequest {
    /// Optional equality constraint.
    pub constraint: Option<Constraint>,
    /// Optional lower bound on the sort key.
    pub lower: Option<ScanBound>,
}

impl FetchRequest {
    /// A request for everything, in order.
    pub fn all() -> Self {
        Self::default()
    }

    /// A request constrained to `column = value`.
    pub fn eq(column: usize, value: Value) -> Self {
        Self {
            constraint: Some(Constraint::eq(column, value)),
            lower: None,
        }
    }

    /// Adds a lower sort-key bound.
    pub fn starting_after(mut self, key: Vec<Value>) -> Self {
        self.lower = Some(ScanBound {
            key,
            inclusive: false,
        });
        self
    }
}
