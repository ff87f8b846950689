//! Clause evaluation.

mod coercion;
mod operators;

pub use coercion::{compare_dates, parse_date, parse_number, DateValue, TYPE_NAMES};
pub use operators::apply_operator;

use crate::template::{interpolate, resolve_operand};
use branchcore::{Clause, EvalError, VariableSource};

/// Evaluate one clause: resolve the left field, interpolate the right-hand
/// value, then apply the operator.
pub fn evaluate(clause: &Clause, vars: &dyn VariableSource) -> Result<bool, EvalError> {
    let left = resolve_operand(&clause.input_field, vars)?;

    let right = match (&clause.value, clause.operator.requires_value()) {
        (Some(raw), true) => interpolate(raw, vars)?,
        (None, true) => {
            return Err(EvalError::InvalidOperand {
                operator: clause.operator.to_string(),
                operand: String::new(),
                reason: "missing value".to_string(),
            })
        }
        (_, false) => String::new(),
    };

    let result = apply_operator(clause.operator, &left, &right)?;
    tracing::debug!(
        clause_id = %clause.id,
        operator = %clause.operator,
        result,
        "evaluated clause"
    );
    Ok(result)
}
