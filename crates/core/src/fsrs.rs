//! FSRS-style memory scheduler: stability, difficulty, retrievability, and
//! next-review time per skill. As in `bkt.rs`, the formulas
//! (`retrievability`, `interval_for_retention`, `review`) are free functions
//! over value types; `MemoryState` bookkeeping sits on top.

use noesis_shared::{NoesisError, NoesisResult, SkillId};
use serde::{Deserialize, Serialize};

pub const MS_PER_DAY: i64 = 86_400_000;

/// FSRS review rating. A failed recall is always `Again`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    #[must_use]
    pub fn value(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn recalled(self) -> bool {
        self != Rating::Again
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStateKind {
    New,
    Learning,
    Review,
    Relearning,
}

/// Tunable FSRS constants. `stability_multiplier` is carried but
/// deliberately unused: the spec documents it as reserved, matching the
/// source it was distilled from, and implementers should not invent a use
/// for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FsrsParams {
    pub initial_stability: [f64; 4],
    pub difficulty_decay: f64,
    pub stability_decay: f64,
    pub stability_multiplier: f64,
    pub requested_retention: f64,
    pub max_interval: f64,
    pub initial_difficulty: f64,
}

impl Default for FsrsParams {
    fn default() -> Self {
        Self {
            initial_stability: [0.4, 0.9, 2.3, 5.7],
            difficulty_decay: 0.7,
            stability_decay: 0.2,
            stability_multiplier: 1.0,
            requested_retention: 0.9,
            max_interval: 365.0,
            initial_difficulty: 0.5,
        }
    }
}

impl FsrsParams {
    /// Every initial stability must be positive, `requestedRetention` must
    /// lie in the open interval `(0,1)` (both ends make the interval
    /// formula degenerate), `maxInterval` must be positive, and
    /// `initialDifficulty` must lie in the same `[0.1,0.9]` band the
    /// running difficulty is clamped to.
    pub fn validate(&self) -> NoesisResult<()> {
        if self.initial_stability.iter().any(|&s| s <= 0.0) {
            return Err(NoesisError::invalid_config(
                "all initialStability entries must be > 0",
            ));
        }
        if !(0.0..1.0).contains(&self.requested_retention) || self.requested_retention <= 0.0 {
            return Err(NoesisError::invalid_config(format!(
                "requestedRetention must be in (0,1), got {}",
                self.requested_retention
            )));
        }
        if self.max_interval <= 0.0 {
            return Err(NoesisError::invalid_config(format!(
                "maxInterval must be > 0, got {}",
                self.max_interval
            )));
        }
        if !(0.1..=0.9).contains(&self.initial_difficulty) {
            return Err(NoesisError::invalid_config(format!(
                "initialDifficulty must be in [0.1,0.9], got {}",
                self.initial_difficulty
            )));
        }
        Ok(())
    }
}

/// Per-skill memory state, as owned by the facade keyed on
/// `(LearnerId, SkillId)`. Created on first interaction with a skill, due
/// immediately (`next_review == last_review`). `successCount` and
/// `failureCount` never decrease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    pub skill_id: SkillId,
    pub stability: f64,
    pub difficulty: f64,
    pub last_review: i64,
    pub next_review: i64,
    pub success_count: u64,
    pub failure_count: u64,
    pub state: MemoryStateKind,
}

impl MemoryState {
    #[must_use]
    pub fn new(skill_id: SkillId, params: &FsrsParams, now: i64) -> Self {
        Self {
            skill_id,
            stability: params.initial_stability[0],
            difficulty: params.initial_difficulty,
            last_review: now,
            next_review: now,
            success_count: 0,
            failure_count: 0,
            state: MemoryStateKind::New,
        }
    }

    /// Days the review is overdue as of `now`; zero or negative if not due.
    #[must_use]
    pub fn overdue_days(&self, now: i64) -> f64 {
        ((now - self.next_review) as f64) / (MS_PER_DAY as f64)
    }

    #[must_use]
    pub fn is_due(&self, now: i64) -> bool {
        self.next_review <= now
    }
}

/// Retention at elapsed time `t` (days) given stability `s` (days).
/// `R=1` when `t<=0`; `R=0` when `s<=0`.
#[must_use]
pub fn retrievability(elapsed_days: f64, stability: f64) -> f64 {
    if elapsed_days <= 0.0 {
        return 1.0;
    }
    if stability <= 0.0 {
        return 0.0;
    }
    (1.0 + elapsed_days / (9.0 * stability)).powi(-1)
}

/// Interval (days) from stability targeting retention `requested_retention`.
#[must_use]
pub fn interval_for_retention(stability: f64, requested_retention: f64) -> f64 {
    if requested_retention >= 1.0 {
        return 0.0;
    }
    if requested_retention <= 0.0 {
        return stability;
    }
    stability * 9.0 * (1.0 / requested_retention - 1.0)
}

/// New difficulty after a review with rating `r` (1..=4).
#[must_use]
pub fn next_difficulty(difficulty: f64, rating: Rating, difficulty_decay: f64) -> f64 {
    let r = f64::from(rating.value());
    (difficulty - (r - 3.0) * 0.1 * difficulty_decay).clamp(0.1, 0.9)
}

/// Rating modifier applied to the FSRS stability-update formula for
/// established (`review`/`relearning`-state) items.
fn rating_modifier(rating: Rating) -> f64 {
    match rating {
        Rating::Again => 0.8, // unreachable here: Again resets stability directly in `review`
        Rating::Hard => 0.8,
        Rating::Good => 1.0,
        Rating::Easy => 1.3,
    }
}

/// New stability for an established item recalled with `rating`, given its
/// prior stability, difficulty, and retrievability just before this review.
/// Growth slows as difficulty rises and as prior retrievability approaches
/// 1 (a recall that was already highly likely teaches the model less).
#[must_use]
pub fn grown_stability(
    prior_stability: f64,
    difficulty: f64,
    prior_retrievability: f64,
    rating: Rating,
    stability_decay: f64,
) -> f64 {
    let retention_gap = (1.0 - prior_retrievability).max(0.0);
    let growth = 1.0 + stability_decay * (1.0 - difficulty) * retention_gap.exp() * rating_modifier(rating);
    (prior_stability * growth).max(0.1)
}

/// Applies one review to a memory state, advancing stability, difficulty,
/// counts, state, and the next-review timestamp.
pub fn review(state: &mut MemoryState, rating: Rating, params: &FsrsParams, now: i64) {
    let elapsed_days = ((now - state.last_review) as f64 / MS_PER_DAY as f64).max(0.0);
    let prior_retrievability = retrievability(elapsed_days, state.stability);

    state.difficulty = next_difficulty(state.difficulty, rating, params.difficulty_decay);

    state.stability = match (state.state, rating) {
        (_, Rating::Again) => params.initial_stability[0],
        (MemoryStateKind::New | MemoryStateKind::Learning, _) => {
            params.initial_stability[(rating.value() - 1) as usize]
        }
        (MemoryStateKind::Review | MemoryStateKind::Relearning, _) => grown_stability(
            state.stability,
            state.difficulty,
            prior_retrievability,
            rating,
            params.stability_decay,
        ),
    };

    state.state = match (state.state, rating) {
        (_, Rating::Again) => {
            if state.state == MemoryStateKind::New {
                MemoryStateKind::Learning
            } else {
                MemoryStateKind::Relearning
            }
        }
        (MemoryStateKind::New | MemoryStateKind::Learning, r) if r.value() >= 3 => {
            MemoryStateKind::Review
        }
        (MemoryStateKind::New | MemoryStateKind::Learning, _) => MemoryStateKind::Learning,
        (MemoryStateKind::Review | MemoryStateKind::Relearning, _) => MemoryStateKind::Review,
    };

    let requested_interval = interval_for_retention(state.stability, params.requested_retention);
    let interval_days = requested_interval.min(params.max_interval);
    state.last_review = now;
    state.next_review = now + (interval_days * MS_PER_DAY as f64).round() as i64;

    if rating.recalled() {
        state.success_count += 1;
    } else {
        state.failure_count += 1;
    }
}

/// All due states (`nextReview <= now`), sorted by descending overdue
/// amount, ties broken lexicographically by skill id.
#[must_use]
pub fn due_skills(states: &[MemoryState], now: i64) -> Vec<MemoryState> {
    let mut due: Vec<MemoryState> = states.iter().filter(|s| s.is_due(now)).cloned().collect();
    due.sort_by(|a, b| {
        b.overdue_days(now)
            .partial_cmp(&a.overdue_days(now))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.skill_id.cmp(&b.skill_id))
    });
    due
}
