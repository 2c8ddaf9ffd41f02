//! Result shaping: applies the residual plan to normalized remote rows:
//! projection with null defaulting, synthesized columns, stable multi-key
//! sort, row cap, and alias renames last.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::plan::ShapingPlan;

/// The remote API's native object for one resource instance. Created per
/// response, consumed by [`shape`], not retained.
pub type RawRecord = Map<String, Value>;

/// One named column of row-aligned values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// An ordered set of equal-length named columns, the final artifact
/// returned to the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<Column>,
}

impl ResultTable {
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Cell accessor by row index and column name.
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name).and_then(|c| c.values.get(row))
    }
}

/// Shape raw records into the caller's requested table.
///
/// Steps run in a fixed order: materialize `keep_columns` with null
/// defaulting, overlay synthesized columns, stable multi-key sort, row cap,
/// renames. Renaming last keeps every column-name-based operation resolving
/// against source names. Deterministic for a fixed input.
pub fn shape(records: &[RawRecord], plan: &ShapingPlan) -> ResultTable {
    let mut columns: Vec<Column> = plan
        .keep_columns
        .iter()
        .map(|name| Column {
            name: name.clone(),
            values: project_field(records, name),
        })
        .collect();

    for synthesized in &plan.synthesize {
        let values = project_field(records, &synthesized.source_field);
        match columns.iter_mut().find(|c| c.name == synthesized.column) {
            Some(column) => column.values = values,
            None => columns.push(Column {
                name: synthesized.column.clone(),
                values,
            }),
        }
    }

    if !plan.sort.is_empty() {
        let keys: Vec<(usize, bool)> = plan
            .sort
            .iter()
            .filter_map(|key| {
                columns
                    .iter()
                    .position(|c| c.name == key.column)
                    .map(|idx| (idx, key.ascending))
            })
            .collect();

        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&a, &b| {
            for &(idx, ascending) in &keys {
                let ord = cmp_values(&columns[idx].values[a], &columns[idx].values[b]);
                let ord = if ascending { ord } else { ord.reverse() };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        for column in &mut columns {
            column.values = order.iter().map(|&i| column.values[i].clone()).collect();
        }
    }

    if let Some(cap) = plan.row_cap {
        for column in &mut columns {
            column.values.truncate(cap);
        }
    }

    for column in &mut columns {
        if let Some(alias) = plan.rename.get(&column.name) {
            column.name = alias.clone();
        }
    }

    ResultTable { columns }
}

/// Pull one field out of every record, defaulting absent fields to null.
fn project_field(records: &[RawRecord], field: &str) -> Vec<Value> {
    records
        .iter()
        .map(|record| record.get(field).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Total order over JSON values for sorting: null < bool < number < string
/// < array < object; numbers compare as f64, composites by rendered text.
fn cmp_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}
