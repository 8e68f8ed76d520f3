//! Bayesian Knowledge Tracing: per-skill mastery probability, updated online
//! from `Practice` evidence. The update math is a pair of free functions
//! (`evidence_step`, `learning_step`) operating on plain `f64`s; everything
//! else is bookkeeping around the `LearnerModel` map they feed.

use std::collections::BTreeMap;

use noesis_shared::{LearnerId, NoesisError, NoesisResult, SkillId};
use serde::{Deserialize, Serialize};

/// Default BKT parameters, matching the spec's `{pInit=0.1, pLearn=0.1,
/// pSlip=0.1, pGuess=0.2}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BktParams {
    pub p_init: f64,
    pub p_learn: f64,
    pub p_slip: f64,
    pub p_guess: f64,
}

impl Default for BktParams {
    fn default() -> Self {
        Self {
            p_init: 0.1,
            p_learn: 0.1,
            p_slip: 0.1,
            p_guess: 0.2,
        }
    }
}

impl BktParams {
    /// `pSlip, pGuess` must be strictly in `(0,1)` and sum to less than 1,
    /// or the evidence step divides by zero or becomes unidentifiable.
    /// `pInit, pLearn` must lie in `[0,1]`.
    pub fn validate(&self) -> NoesisResult<()> {
        if !(0.0..1.0).contains(&self.p_slip) || self.p_slip <= 0.0 {
            return Err(NoesisError::invalid_bkt_params(format!(
                "pSlip must be in (0,1), got {}",
                self.p_slip
            )));
        }
        if !(0.0..1.0).contains(&self.p_guess) || self.p_guess <= 0.0 {
            return Err(NoesisError::invalid_bkt_params(format!(
                "pGuess must be in (0,1), got {}",
                self.p_guess
            )));
        }
        if self.p_slip + self.p_guess >= 1.0 {
            return Err(NoesisError::invalid_bkt_params(format!(
                "pSlip + pGuess must be < 1, got {}",
                self.p_slip + self.p_guess
            )));
        }
        if !(0.0..=1.0).contains(&self.p_init) {
            return Err(NoesisError::invalid_bkt_params(format!(
                "pInit must be in [0,1], got {}",
                self.p_init
            )));
        }
        if !(0.0..=1.0).contains(&self.p_learn) {
            return Err(NoesisError::invalid_bkt_params(format!(
                "pLearn must be in [0,1], got {}",
                self.p_learn
            )));
        }
        Ok(())
    }
}

/// Per-skill mastery state. `lastUpdated` is in epoch milliseconds, stamped
/// from the injected clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillProb {
    pub p_mastery: f64,
    pub p_slip: f64,
    pub p_guess: f64,
    pub p_learn: f64,
    pub last_updated: i64,
}

impl SkillProb {
    #[must_use]
    pub fn from_params(params: BktParams, now: i64) -> Self {
        Self {
            p_mastery: params.p_init,
            p_slip: params.p_slip,
            p_guess: params.p_guess,
            p_learn: params.p_learn,
            last_updated: now,
        }
    }
}

/// A learner's full knowledge state. `BTreeMap` so serialization is
/// structurally lexicographic-by-skill-id, per spec §4.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerModel {
    pub learner_id: LearnerId,
    pub skill_probabilities: BTreeMap<SkillId, SkillProb>,
    pub total_events: u64,
    pub created_at: i64,
    pub last_updated: i64,
}

impl LearnerModel {
    #[must_use]
    pub fn new(learner_id: LearnerId, now: i64) -> Self {
        Self {
            learner_id,
            skill_probabilities: BTreeMap::new(),
            total_events: 0,
            created_at: now,
            last_updated: now,
        }
    }
}

/// Evidence step of a BKT update: revises `p_mastery` given one observation.
/// `p`, `s`, `g` are `pMastery`, `pSlip`, `pGuess` respectively.
#[must_use]
pub fn evidence_step(p: f64, s: f64, g: f64, correct: bool) -> f64 {
    if correct {
        (p * (1.0 - s)) / (p * (1.0 - s) + (1.0 - p) * g)
    } else {
        (p * s) / (p * s + (1.0 - p) * (1.0 - g))
    }
}

/// Learning step: probability mass transfers from "not yet learned" to
/// "learned" at rate `learn`.
#[must_use]
pub fn learning_step(p: f64, learn: f64) -> f64 {
    p + (1.0 - p) * learn
}

/// Applies a single `Practice` observation to one skill's probability,
/// clamping the result into `[0,1]` against floating-point drift.
fn apply_practice(prob: &mut SkillProb, correct: bool, now: i64) {
    let evidenced = evidence_step(prob.p_mastery, prob.p_slip, prob.p_guess, correct);
    let learned = learning_step(evidenced, prob.p_learn);
    prob.p_mastery = learned.clamp(0.0, 1.0);
    prob.last_updated = now;
}

/// Records one practice observation against `skill_id`, lazily creating a
/// default-parameter entry for skills never seen before (the facade is
/// forgiving about unknown skills referenced by practice events).
pub fn record_practice(
    model: &mut LearnerModel,
    skill_id: &SkillId,
    correct: bool,
    defaults: BktParams,
    now: i64,
) {
    let prob = model
        .skill_probabilities
        .entry(skill_id.clone())
        .or_insert_with(|| SkillProb::from_params(defaults, now));
    apply_practice(prob, correct, now);
    model.total_events += 1;
    model.last_updated = now;
}

/// Initializes or overwrites `pMastery` for each assessed skill from a
/// diagnostic's per-skill scores, preserving every skill's other BKT
/// parameters. Creates entries for skills not previously seen. Idempotent:
/// calling twice with the same scores leaves the model unchanged beyond the
/// `lastUpdated` stamp.
pub fn initialize_from_diagnostic(
    model: &mut LearnerModel,
    scores: &BTreeMap<SkillId, f64>,
    defaults: BktParams,
    now: i64,
) {
    for (skill_id, &score) in scores {
        let prob = model
            .skill_probabilities
            .entry(skill_id.clone())
            .or_insert_with(|| SkillProb::from_params(defaults, now));
        prob.p_mastery = score.clamp(0.0, 1.0);
        prob.last_updated = now;
    }
    model.last_updated = now;
}

/// Skills with `pMastery < threshold`, sorted lexicographically by id.
#[must_use]
pub fn unmastered_skills(model: &LearnerModel, threshold: f64) -> Vec<SkillId> {
    model
        .skill_probabilities
        .iter()
        .filter(|(_, prob)| prob.p_mastery < threshold)
        .map(|(id, _)| id.clone())
        .collect()
}
