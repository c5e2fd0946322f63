//! Host preconditions

use kiln_errors::EnvironmentError;
use kiln_types::{ConditionContext, Formula};

/// Fail with the first precondition whose condition holds
///
/// Runs before anything is fetched or spawned.
///
/// # Errors
///
/// Returns `EnvironmentError::PreconditionFailed` carrying the formula's message.
pub fn check_requirements(
    formula: &Formula,
    ctx: &ConditionContext<'_>,
) -> Result<(), EnvironmentError> {
    if let Some(failed) = formula.requirements.iter().find(|r| r.when.evaluate(ctx)) {
        return Err(EnvironmentError::PreconditionFailed {
            formula: formula.name.clone(),
            message: failed.message.clone(),
        });
    }
    Ok(())
}
