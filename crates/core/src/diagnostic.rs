//! Diagnostic placement: validates a `Diagnostic` event's per-skill scores
//! and dispatches into `bkt::initialize_from_diagnostic`. Kept as a thin
//! module in front of the stateful BKT engine so the facade's event router
//! has a single place to validate-then-dispatch a `Diagnostic` event.

use std::collections::BTreeMap;

use noesis_shared::{NoesisError, NoesisResult, SkillId};

use crate::bkt::{self, BktParams, LearnerModel};
use crate::events::DiagnosticResult;

/// Validates a diagnostic's score list: non-empty, every score in `[0,1]`,
/// no duplicate skill within one event.
pub fn validate(results: &[DiagnosticResult]) -> NoesisResult<()> {
    if results.is_empty() {
        return Err(NoesisError::invalid_diagnostic(
            "diagnostic must assess at least one skill",
        ));
    }
    let mut seen = std::collections::BTreeSet::new();
    for r in results {
        if !(0.0..=1.0).contains(&r.score) {
            return Err(NoesisError::invalid_diagnostic(format!(
                "score for skill {} must be in [0,1], got {}",
                r.skill_id, r.score
            )));
        }
        if !seen.insert(r.skill_id.clone()) {
            return Err(NoesisError::invalid_diagnostic(format!(
                "skill {} assessed more than once in a single diagnostic",
                r.skill_id
            )));
        }
    }
    Ok(())
}

/// Validates then applies a diagnostic's scores to a learner model.
pub fn apply(
    model: &mut LearnerModel,
    results: &[DiagnosticResult],
    defaults: BktParams,
    now: i64,
) -> NoesisResult<()> {
    validate(results)?;
    let scores: BTreeMap<SkillId, f64> = results
        .iter()
        .map(|r| (r.skill_id.clone(), r.score))
        .collect();
    bkt::initialize_from_diagnostic(model, &scores, defaults, now);
    Ok(())
}
