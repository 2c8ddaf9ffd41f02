//! Predicate extraction: flattens a conjunctive filter tree into an
//! ordered list of comparison triples.

use crate::error::ConnectorError;
use crate::query::{FilterExpr, Predicate};

/// Decompose a filter clause into a flat predicate list.
///
/// The returned order matches left-to-right appearance in the clause, so
/// downstream mapping decisions are deterministic when the same field
/// appears twice (last write wins). Disjunctions and non-comparison
/// operators fail with [`ConnectorError::UnsupportedQueryShape`].
pub fn extract_predicates(filter: &FilterExpr) -> Result<Vec<Predicate>, ConnectorError> {
    let mut predicates = Vec::new();
    walk(filter, &mut predicates)?;
    Ok(predicates)
}

fn walk(expr: &FilterExpr, out: &mut Vec<Predicate>) -> Result<(), ConnectorError> {
    match expr {
        FilterExpr::Cmp { op, field, value } => {
            if !op.is_comparison() {
                return Err(ConnectorError::UnsupportedQueryShape(format!(
                    "operator {} is outside the supported comparison set",
                    op
                )));
            }
            out.push(Predicate {
                op: *op,
                field: field.clone(),
                value: value.clone(),
            });
            Ok(())
        }
        FilterExpr::And { left, right } => {
            walk(left, out)?;
            walk(right, out)
        }
        FilterExpr::Or { .. } => Err(ConnectorError::UnsupportedQueryShape(
            "disjunctions are not supported".to_string(),
        )),
    }
}
