//! First-true-path selection over a Condition node's paths.

use crate::evaluator::evaluate;
use branchcore::{EvalError, LogicalOperator, Path, RoutingMode, Selection, VariableSource};

/// Combine a path's clauses with its logical operator.
///
/// AND stops at the first false clause, OR at the first true one. A path
/// without clauses is true.
pub fn evaluate_path(path: &Path, vars: &dyn VariableSource) -> Result<bool, EvalError> {
    evaluate_clauses(path, vars).map_err(|(_, err)| err)
}

/// Like [`evaluate_path`], also naming the clause that failed.
fn evaluate_clauses(path: &Path, vars: &dyn VariableSource) -> Result<bool, (String, EvalError)> {
    if path.clauses.is_empty() {
        return Ok(true);
    }
    let stop_on = path.logical_operator == LogicalOperator::Or;
    for clause in &path.clauses {
        let result = evaluate(clause, vars).map_err(|err| (clause.id.clone(), err))?;
        if result == stop_on {
            return Ok(stop_on);
        }
    }
    Ok(!stop_on)
}

/// Pick the first path whose clauses hold, falling back to the last (Else)
/// path, which is never evaluated.
///
/// In [`RoutingMode::Strict`] the first clause error is returned. In
/// [`RoutingMode::Lenient`] the failing path counts as not matched and the
/// error is logged.
pub fn select_path(
    paths: &[Path],
    vars: &dyn VariableSource,
    mode: RoutingMode,
) -> Result<Selection, EvalError> {
    select_path_reporting(paths, vars, mode, |_, _, _| {})
}

/// [`select_path`] that also hands every lenient downgrade to `on_downgrade`
/// as `(path, clause_id, error)`.
pub fn select_path_reporting(
    paths: &[Path],
    vars: &dyn VariableSource,
    mode: RoutingMode,
    mut on_downgrade: impl FnMut(&Path, &str, &EvalError),
) -> Result<Selection, EvalError> {
    let Some((fallback, guarded)) = paths.split_last() else {
        return Err(EvalError::NoPaths);
    };

    for (index, path) in guarded.iter().enumerate() {
        let matched = match evaluate_clauses(path, vars) {
            Ok(matched) => matched,
            Err((clause_id, err)) if mode == RoutingMode::Lenient => {
                tracing::warn!(
                    path_id = %path.id,
                    clause_id = %clause_id,
                    error = %err,
                    "clause failed, treating path as not matched"
                );
                on_downgrade(path, &clause_id, &err);
                false
            }
            Err((_, err)) => return Err(err),
        };
        if matched {
            tracing::debug!(path_id = %path.id, index, "path matched");
            return Ok(Selection {
                path_id: path.id.clone(),
                path_name: path.name.clone(),
                matched: true,
                index,
            });
        }
    }

    tracing::debug!(path_id = %fallback.id, "no path matched, taking else");
    Ok(Selection {
        path_id: fallback.id.clone(),
        path_name: fallback.name.clone(),
        matched: false,
        index: guarded.len(),
    })
}
