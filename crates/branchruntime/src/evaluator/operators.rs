use super::coercion::{
    compare_dates, loosely_equal, parse_date, parse_number, to_number, to_scalar_text, DateValue,
    TYPE_NAMES,
};
use branchcore::{EvalError, OperatorKind, Value};
use regex::Regex;
use std::cmp::Ordering;

/// Apply `op` to a resolved left value and an interpolated right-hand text.
///
/// Unary operators ignore `right`.
pub fn apply_operator(op: OperatorKind, left: &Value, right: &str) -> Result<bool, EvalError> {
    match op {
        OperatorKind::Equals => Ok(loosely_equal(left, right)),
        OperatorKind::NotEquals => Ok(!loosely_equal(left, right)),

        OperatorKind::GreaterThan => compare_numbers(op, left, right, |o| o == Ordering::Greater),
        OperatorKind::GreaterOrEqual => compare_numbers(op, left, right, |o| o != Ordering::Less),
        OperatorKind::LessThan => compare_numbers(op, left, right, |o| o == Ordering::Less),
        OperatorKind::LessOrEqual => compare_numbers(op, left, right, |o| o != Ordering::Greater),

        OperatorKind::Contains => contains(op, left, right),
        OperatorKind::NotContains => contains(op, left, right).map(|found| !found),

        OperatorKind::StartsWith => Ok(text(op, left)?.starts_with(right)),
        OperatorKind::EndsWith => Ok(text(op, left)?.ends_with(right)),

        OperatorKind::IsEmpty => Ok(left.is_empty()),
        OperatorKind::IsNotEmpty => Ok(!left.is_empty()),

        OperatorKind::MatchesRegex => {
            let haystack = text(op, left)?;
            let pattern = Regex::new(right).map_err(|e| invalid(op, right, e.to_string()))?;
            Ok(pattern.is_match(&haystack))
        }

        OperatorKind::InList => in_list(op, left, right),
        OperatorKind::NotInList => in_list(op, left, right).map(|found| !found),

        OperatorKind::LengthEquals => compare_length(op, left, right, |o| o == Ordering::Equal),
        OperatorKind::LengthGreaterThan => {
            compare_length(op, left, right, |o| o == Ordering::Greater)
        }
        OperatorKind::LengthLessThan => compare_length(op, left, right, |o| o == Ordering::Less),

        OperatorKind::DateBefore => compare_date(op, left, right, |o| o == Ordering::Less),
        OperatorKind::DateAfter => compare_date(op, left, right, |o| o == Ordering::Greater),
        OperatorKind::DateEquals => compare_date(op, left, right, |o| o == Ordering::Equal),
        OperatorKind::DateBetween => date_between(op, left, right),

        OperatorKind::TypeEquals => {
            let expected = right.trim().to_ascii_lowercase();
            if !TYPE_NAMES.contains(&expected.as_str()) {
                return Err(invalid(op, right, format!("expected one of {}", TYPE_NAMES.join(", "))));
            }
            Ok(left.type_name() == expected)
        }
    }
}

fn invalid(op: OperatorKind, operand: &str, reason: impl Into<String>) -> EvalError {
    EvalError::InvalidOperand {
        operator: op.to_string(),
        operand: operand.to_string(),
        reason: reason.into(),
    }
}

fn mismatch(op: OperatorKind, expected: &str, found: &Value) -> EvalError {
    EvalError::TypeMismatch {
        operator: op.to_string(),
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    }
}

fn text(op: OperatorKind, left: &Value) -> Result<String, EvalError> {
    to_scalar_text(left).ok_or_else(|| mismatch(op, "string", left))
}

fn compare_numbers(
    op: OperatorKind,
    left: &Value,
    right: &str,
    accept: impl Fn(Ordering) -> bool,
) -> Result<bool, EvalError> {
    let a = to_number(left).ok_or_else(|| mismatch(op, "number", left))?;
    let b = parse_number(right).ok_or_else(|| EvalError::TypeMismatch {
        operator: op.to_string(),
        expected: "number".to_string(),
        found: format!("string '{}'", right),
    })?;
    Ok(a.partial_cmp(&b).map_or(false, accept))
}

fn contains(op: OperatorKind, left: &Value, right: &str) -> Result<bool, EvalError> {
    match left {
        Value::Array(items) => Ok(items.iter().any(|item| loosely_equal(item, right))),
        Value::Text(_) | Value::Number(_) | Value::Bool(_) => Ok(left.to_text().contains(right)),
        _ => Err(mismatch(op, "string or array", left)),
    }
}

fn in_list(op: OperatorKind, left: &Value, right: &str) -> Result<bool, EvalError> {
    let needle = text(op, left)?;
    Ok(right.split(',').map(str::trim).any(|item| item == needle))
}

fn compare_length(
    op: OperatorKind,
    left: &Value,
    right: &str,
    accept: impl Fn(Ordering) -> bool,
) -> Result<bool, EvalError> {
    let length = match left {
        Value::Text(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        _ => return Err(mismatch(op, "string or array", left)),
    };
    let expected = parse_number(right)
        .filter(|n| *n >= 0.0)
        .ok_or_else(|| invalid(op, right, "expected a non-negative number"))?;
    Ok((length as f64).partial_cmp(&expected).map_or(false, accept))
}

fn left_date(op: OperatorKind, left: &Value) -> Result<DateValue, EvalError> {
    match left {
        Value::Text(s) => parse_date(s).ok_or_else(|| EvalError::TypeMismatch {
            operator: op.to_string(),
            expected: "date".to_string(),
            found: format!("string '{}'", s),
        }),
        _ => Err(mismatch(op, "date", left)),
    }
}

fn right_date(op: OperatorKind, text: &str) -> Result<DateValue, EvalError> {
    parse_date(text).ok_or_else(|| invalid(op, text, "unrecognised date format"))
}

fn compare_date(
    op: OperatorKind,
    left: &Value,
    right: &str,
    accept: impl Fn(Ordering) -> bool,
) -> Result<bool, EvalError> {
    let a = left_date(op, left)?;
    let b = right_date(op, right)?;
    Ok(accept(compare_dates(&a, &b)))
}

fn date_between(op: OperatorKind, left: &Value, right: &str) -> Result<bool, EvalError> {
    let bounds: Vec<&str> = right.split(',').map(str::trim).collect();
    let [start, end] = bounds.as_slice() else {
        return Err(invalid(op, right, "expected two dates separated by ','"));
    };
    let start = right_date(op, start)?;
    let end = right_date(op, end)?;
    if compare_dates(&start, &end) == Ordering::Greater {
        return Err(invalid(op, right, "start date is after end date"));
    }
    let value = left_date(op, left)?;
    Ok(compare_dates(&value, &start) != Ordering::Less
        && compare_dates(&value, &end) != Ordering::Greater)
}
