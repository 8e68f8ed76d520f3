//! Session planner: the five-tier priority policy that turns the current
//! skill graph, BKT model, memory states, and transfer gate into a single
//! next action, or a full session plan.
//!
//! Determinism is mandatory here above all other modules: every candidate
//! set this module scans is sorted by an explicit, documented key before a
//! winner is picked. No tier reads a clock or relies on map iteration order.

use std::collections::{BTreeSet, HashMap};

use noesis_shared::{ItemId, NoesisError, NoesisResult, SkillId, TestId};
use serde::{Deserialize, Serialize};

use crate::bkt::LearnerModel;
use crate::fsrs::{self, MemoryState};
use crate::graph::SkillGraph;
use crate::transfer::{self, TransferGateConfig, TransferTest, TransferTestResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Practice,
    Review,
    Diagnostic,
    TransferTest,
    Rest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAction {
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<SkillId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_id: Option<TestId>,
    pub reason: String,
    pub priority: f64,
}

impl SessionAction {
    fn rest() -> Self {
        Self {
            action_type: ActionType::Rest,
            skill_id: None,
            item_id: None,
            test_id: None,
            reason: "no eligible action in any tier".to_string(),
            priority: 0.0,
        }
    }
}

/// Per-call session configuration, carried on `SessionStart` events and
/// passed to `getNextAction`/`planSession`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub max_duration_minutes: u32,
    pub target_items: u32,
    pub mastery_threshold: f64,
    pub enforce_spaced_retrieval: bool,
    pub require_transfer_tests: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_duration_minutes: 30,
            target_items: 10,
            mastery_threshold: 0.8,
            enforce_spaced_retrieval: true,
            require_transfer_tests: true,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> NoesisResult<()> {
        if self.max_duration_minutes == 0 {
            return Err(NoesisError::invalid_config(
                "maxDurationMinutes must be > 0",
            ));
        }
        if self.target_items == 0 {
            return Err(NoesisError::invalid_config("targetItems must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.mastery_threshold) {
            return Err(NoesisError::invalid_config(format!(
                "masteryThreshold must be in [0,1], got {}",
                self.mastery_threshold
            )));
        }
        Ok(())
    }
}

/// Engine-level tuning constants for the five tiers, set once at
/// construction rather than per call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannerTuning {
    pub overdue_weight: f64,
    pub error_weight: f64,
    pub transfer_test_threshold: f64,
    pub max_error_focus_items: u32,
}

impl Default for PlannerTuning {
    fn default() -> Self {
        Self {
            overdue_weight: 2.0,
            error_weight: 1.5,
            transfer_test_threshold: 0.8,
            max_error_focus_items: 5,
        }
    }
}

impl PlannerTuning {
    pub fn validate(&self) -> NoesisResult<()> {
        if self.overdue_weight < 0.0 {
            return Err(NoesisError::invalid_config("overdueWeight must be >= 0"));
        }
        if self.error_weight < 0.0 {
            return Err(NoesisError::invalid_config("errorWeight must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.transfer_test_threshold) {
            return Err(NoesisError::invalid_config(format!(
                "transferTestThreshold must be in [0,1], got {}",
                self.transfer_test_threshold
            )));
        }
        if self.max_error_focus_items == 0 {
            return Err(NoesisError::invalid_config(
                "maxErrorFocusItems must be > 0",
            ));
        }
        Ok(())
    }
}

/// Everything the five tiers need to evaluate a single learner.
pub struct PlanContext<'a> {
    pub graph: &'a SkillGraph,
    pub model: &'a LearnerModel,
    pub memory_states: &'a [MemoryState],
    pub tests: &'a [TransferTest],
    pub transfer_results: &'a HashMap<TestId, Vec<TransferTestResult>>,
    pub transfer_gate: &'a TransferGateConfig,
    pub session: &'a SessionConfig,
    pub tuning: &'a PlannerTuning,
    pub now: i64,
}

fn p_mastery(model: &LearnerModel, skill_id: &SkillId) -> f64 {
    model
        .skill_probabilities
        .get(skill_id)
        .map_or(0.0, |p| p.p_mastery)
}

/// Tier 1: most-overdue memory state, skipping skills in `excluded`.
fn tier_due_review(ctx: &PlanContext, excluded: &BTreeSet<SkillId>) -> Option<SessionAction> {
    if !ctx.session.enforce_spaced_retrieval {
        return None;
    }
    let due = fsrs::due_skills(ctx.memory_states, ctx.now);
    let candidate = due.into_iter().find(|s| !excluded.contains(&s.skill_id))?;
    let overdue_days = candidate.overdue_days(ctx.now);
    let priority = (50.0 + overdue_days * ctx.tuning.overdue_weight).min(100.0);
    Some(SessionAction {
        action_type: ActionType::Review,
        skill_id: Some(candidate.skill_id.clone()),
        item_id: None,
        test_id: None,
        reason: format!(
            "{} is overdue for spaced review by {:.2} days",
            candidate.skill_id, overdue_days
        ),
        priority,
    })
}

/// Tier 2: the first skill in topological order that is mastered and has
/// an unpassed required transfer test.
fn tier_transfer_test(ctx: &PlanContext, excluded: &BTreeSet<SkillId>) -> Option<SessionAction> {
    if !ctx.session.require_transfer_tests {
        return None;
    }
    for skill_id in ctx.graph.topological_order() {
        if excluded.contains(&skill_id) {
            continue;
        }
        if p_mastery(ctx.model, &skill_id) < ctx.tuning.transfer_test_threshold {
            continue;
        }
        if let Some(test) = transfer::next_test(
            ctx.tests,
            ctx.transfer_results,
            &skill_id,
            ctx.transfer_gate,
        ) {
            return Some(SessionAction {
                action_type: ActionType::TransferTest,
                skill_id: Some(skill_id.clone()),
                item_id: None,
                test_id: Some(test.id.clone()),
                reason: format!(
                    "{} is mastered and awaits a {:?} transfer test",
                    skill_id, test.transfer_type
                ),
                priority: 75.0,
            });
        }
    }
    None
}

/// Tier 3: the relearning memory state with the highest failure count.
fn tier_error_focus(ctx: &PlanContext, excluded: &BTreeSet<SkillId>) -> Option<SessionAction> {
    let candidate = ctx
        .memory_states
        .iter()
        .filter(|s| {
            s.state == fsrs::MemoryStateKind::Relearning && !excluded.contains(&s.skill_id)
        })
        .max_by(|a, b| {
            a.failure_count
                .cmp(&b.failure_count)
                .then_with(|| b.skill_id.cmp(&a.skill_id))
        })?;
    let priority = 60.0 + candidate.failure_count as f64 * ctx.tuning.error_weight;
    Some(SessionAction {
        action_type: ActionType::Practice,
        skill_id: Some(candidate.skill_id.clone()),
        item_id: None,
        test_id: None,
        reason: format!(
            "{} is in relearning with {} prior failures",
            candidate.skill_id, candidate.failure_count
        ),
        priority,
    })
}

/// True if every direct prerequisite of `skill_id` is mastered (a skill
/// with no prerequisites trivially qualifies).
fn prerequisites_mastered(
    graph: &SkillGraph,
    model: &LearnerModel,
    skill_id: &SkillId,
    threshold: f64,
) -> bool {
    graph
        .get(skill_id)
        .map(|skill| {
            skill
                .prerequisites
                .iter()
                .all(|p| p_mastery(model, p) >= threshold)
        })
        .unwrap_or(true)
}

/// Tier 4: unmastered skill with all prerequisites mastered, breaking ties
/// by largest leverage (transitive dependent count), then lexicographically.
fn tier_new_skill(ctx: &PlanContext, excluded: &BTreeSet<SkillId>) -> Option<SessionAction> {
    let mut candidates: Vec<SkillId> = ctx
        .graph
        .skill_ids()
        .filter(|id| !excluded.contains(id))
        .filter(|id| p_mastery(ctx.model, id) < ctx.session.mastery_threshold)
        .filter(|id| {
            prerequisites_mastered(ctx.graph, ctx.model, id, ctx.session.mastery_threshold)
        })
        .cloned()
        .collect();
    candidates.sort();

    let chosen = candidates
        .into_iter()
        .map(|id| {
            let leverage = ctx.graph.leverage(&id);
            (id, leverage)
        })
        .max_by(|(a_id, a_lev), (b_id, b_lev)| {
            a_lev.cmp(b_lev).then_with(|| b_id.cmp(a_id))
        })?;

    let (skill_id, leverage) = chosen;
    Some(SessionAction {
        action_type: ActionType::Practice,
        skill_id: Some(skill_id.clone()),
        item_id: None,
        test_id: None,
        reason: format!(
            "{} is unmastered, prerequisites satisfied, leverage {}",
            skill_id, leverage
        ),
        priority: 40.0 + leverage as f64,
    })
}

/// Tier 5: partially-mastered skill closest to the mastery threshold.
fn tier_consolidation(ctx: &PlanContext, excluded: &BTreeSet<SkillId>) -> Option<SessionAction> {
    let candidate = ctx
        .graph
        .skill_ids()
        .filter(|id| !excluded.contains(*id))
        .filter_map(|id| {
            let p = p_mastery(ctx.model, id);
            (p >= 0.3 && p < ctx.session.mastery_threshold).then_some((id.clone(), p))
        })
        .max_by(|(a_id, a_p), (b_id, b_p)| {
            a_p.partial_cmp(b_p)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b_id.cmp(a_id))
        })?;

    let (skill_id, p) = candidate;
    Some(SessionAction {
        action_type: ActionType::Practice,
        skill_id: Some(skill_id.clone()),
        item_id: None,
        test_id: None,
        reason: format!("{} is consolidating at pMastery={:.3}", skill_id, p),
        priority: 30.0 + p * 10.0,
    })
}

/// Evaluates the five tiers in order, returning the first non-empty one, or
/// `rest` if none apply. `excluded` removes skills (and their memory
/// states) from consideration at every tier, per the spec's resolution of
/// the source's exclusion ambiguity.
#[must_use]
pub fn next_action(ctx: &PlanContext, excluded: &BTreeSet<SkillId>) -> SessionAction {
    tier_due_review(ctx, excluded)
        .or_else(|| tier_transfer_test(ctx, excluded))
        .or_else(|| tier_error_focus(ctx, excluded))
        .or_else(|| tier_new_skill(ctx, excluded))
        .or_else(|| tier_consolidation(ctx, excluded))
        .unwrap_or_else(SessionAction::rest)
}

/// Builds a full plan: iteratively invokes tiered selection excluding
/// already-planned skills, capping at `session.target_items` and stopping
/// early on `rest`. Error-focus selections beyond `tuning.max_error_focus_items`
/// are excluded so a single struggling skill cannot dominate a whole plan.
/// Returned in descending-priority order (stable: ties preserve the order
/// actions were selected in).
#[must_use]
pub fn plan_session(ctx: &PlanContext) -> Vec<SessionAction> {
    let mut excluded: BTreeSet<SkillId> = BTreeSet::new();
    let mut error_focus_count = 0u32;
    let mut actions = Vec::new();

    while actions.len() < ctx.session.target_items as usize {
        let mut local_excluded = excluded.clone();
        if error_focus_count >= ctx.tuning.max_error_focus_items {
            for state in ctx.memory_states {
                if state.state == fsrs::MemoryStateKind::Relearning {
                    local_excluded.insert(state.skill_id.clone());
                }
            }
        }

        let action = next_action(ctx, &local_excluded);
        if action.action_type == ActionType::Rest {
            break;
        }
        let is_error_focus = action.action_type == ActionType::Practice
            && action.skill_id.as_ref().is_some_and(|id| {
                ctx.memory_states
                    .iter()
                    .any(|s| &s.skill_id == id && s.state == fsrs::MemoryStateKind::Relearning)
            });
        if is_error_focus {
            error_focus_count += 1;
        }
        if let Some(skill_id) = &action.skill_id {
            excluded.insert(skill_id.clone());
        }
        actions.push(action);
    }

    actions.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bkt::{self, BktParams};
    use crate::fsrs::{FsrsParams, MemoryState as FsrsMemoryState, MemoryStateKind};
    use crate::graph::Skill;
    use noesis_shared::LearnerId;

    fn chain_graph() -> SkillGraph {
        SkillGraph::build([
            Skill::new("A", "Addition"),
            Skill::with_prerequisites("B", "Subtraction", [SkillId::from("A")]),
            Skill::with_prerequisites("C", "Multiplication", [SkillId::from("B")]),
        ])
        .unwrap()
    }

    #[test]
    fn mastery_and_leverage_pick_the_highest_leverage_unmastered_skill() {
        let graph = chain_graph();
        let mut model = LearnerModel::new(LearnerId::from("l1"), 0);
        let params = BktParams::default();
        for t in 0..10 {
            bkt::record_practice(&mut model, &SkillId::from("A"), true, params, t);
        }
        let session = SessionConfig {
            mastery_threshold: 0.85,
            ..SessionConfig::default()
        };
        let tuning = PlannerTuning {
            transfer_test_threshold: 0.8,
            ..PlannerTuning::default()
        };
        let gate = TransferGateConfig {
            require_near_transfer: false,
            require_far_transfer: false,
            grace_period_events: 3,
        };
        let ctx = PlanContext {
            graph: &graph,
            model: &model,
            memory_states: &[],
            tests: &[],
            transfer_results: &HashMap::new(),
            transfer_gate: &gate,
            session: &session,
            tuning: &tuning,
            now: 0,
        };
        let action = next_action(&ctx, &BTreeSet::new());
        assert_eq!(action.action_type, ActionType::Practice);
        assert_eq!(action.skill_id, Some(SkillId::from("B")));
    }

    #[test]
    fn due_review_outranks_everything_else() {
        let graph = chain_graph();
        let mut model = LearnerModel::new(LearnerId::from("l1"), 0);
        // Y has partial mastery, eligible for consolidation, but X is due.
        bkt::initialize_from_diagnostic(
            &mut model,
            &[(SkillId::from("A"), 0.5)].into_iter().collect(),
            BktParams::default(),
            0,
        );
        let fsrs_params = FsrsParams::default();
        let mut x = FsrsMemoryState::new(SkillId::from("X"), &fsrs_params, 0);
        x.state = MemoryStateKind::Review;
        x.next_review = -2 * fsrs::MS_PER_DAY;

        let session = SessionConfig::default();
        let tuning = PlannerTuning::default();
        let gate = TransferGateConfig::default();
        let ctx = PlanContext {
            graph: &graph,
            model: &model,
            memory_states: &[x],
            tests: &[],
            transfer_results: &HashMap::new(),
            transfer_gate: &gate,
            session: &session,
            tuning: &tuning,
            now: 0,
        };
        let action = next_action(&ctx, &BTreeSet::new());
        assert_eq!(action.action_type, ActionType::Review);
        assert_eq!(action.skill_id, Some(SkillId::from("X")));
        assert!(action.priority >= 50.0 + 2.0 * tuning.overdue_weight);
    }

    #[test]
    fn transfer_gate_blocks_then_unblocks_advancement() {
        let graph = chain_graph();
        let mut model = LearnerModel::new(LearnerId::from("l1"), 0);
        let params = BktParams::default();
        for t in 0..10 {
            bkt::record_practice(&mut model, &SkillId::from("A"), true, params, t);
        }
        let tests = vec![TransferTest {
            id: TestId::from("tA"),
            skill_id: SkillId::from("A"),
            transfer_type: transfer::TransferType::Near,
            context: "word problem".into(),
            passing_score: 0.7,
        }];
        let session = SessionConfig::default();
        let tuning = PlannerTuning::default();
        let gate = TransferGateConfig::default();

        let empty_results = HashMap::new();
        let ctx = PlanContext {
            graph: &graph,
            model: &model,
            memory_states: &[],
            tests: &tests,
            transfer_results: &empty_results,
            transfer_gate: &gate,
            session: &session,
            tuning: &tuning,
            now: 0,
        };
        let first = next_action(&ctx, &BTreeSet::new());
        assert_eq!(first.action_type, ActionType::TransferTest);
        assert_eq!(first.skill_id, Some(SkillId::from("A")));

        let mut results = HashMap::new();
        results.insert(
            TestId::from("tA"),
            vec![transfer::evaluate_attempt(&tests[0], 0.8, 0)],
        );
        let ctx2 = PlanContext {
            graph: &graph,
            model: &model,
            memory_states: &[],
            tests: &tests,
            transfer_results: &results,
            transfer_gate: &gate,
            session: &session,
            tuning: &tuning,
            now: 0,
        };
        let second = next_action(&ctx2, &BTreeSet::new());
        assert_eq!(second.action_type, ActionType::Practice);
        assert_eq!(second.skill_id, Some(SkillId::from("B")));
    }

    #[test]
    fn plan_session_is_sorted_by_descending_priority() {
        let graph = chain_graph();
        let model = LearnerModel::new(LearnerId::from("l1"), 0);
        let fsrs_params = FsrsParams::default();
        let mut x = FsrsMemoryState::new(SkillId::from("X"), &fsrs_params, 0);
        x.next_review = -1 * fsrs::MS_PER_DAY;
        let session = SessionConfig {
            target_items: 3,
            ..SessionConfig::default()
        };
        let tuning = PlannerTuning::default();
        let gate = TransferGateConfig::default();
        let ctx = PlanContext {
            graph: &graph,
            model: &model,
            memory_states: &[x],
            tests: &[],
            transfer_results: &HashMap::new(),
            transfer_gate: &gate,
            session: &session,
            tuning: &tuning,
            now: 0,
        };
        let plan = plan_session(&ctx);
        for window in plan.windows(2) {
            assert!(window[0].priority >= window[1].priority);
        }
    }

    #[test]
    fn no_prerequisites_candidate_from_the_start() {
        let graph = chain_graph();
        let model = LearnerModel::new(LearnerId::from("l1"), 0);
        let session = SessionConfig::default();
        let tuning = PlannerTuning::default();
        let gate = TransferGateConfig {
            require_near_transfer: false,
            require_far_transfer: false,
            grace_period_events: 3,
        };
        let ctx = PlanContext {
            graph: &graph,
            model: &model,
            memory_states: &[],
            tests: &[],
            transfer_results: &HashMap::new(),
            transfer_gate: &gate,
            session: &session,
            tuning: &tuning,
            now: 0,
        };
        let action = next_action(&ctx, &BTreeSet::new());
        assert_eq!(action.skill_id, Some(SkillId::from("A")));
    }

    #[test]
    fn rest_when_nothing_applies() {
        let graph = SkillGraph::empty();
        let model = LearnerModel::new(LearnerId::from("l1"), 0);
        let session = SessionConfig::default();
        let tuning = PlannerTuning::default();
        let gate = TransferGateConfig::default();
        let ctx = PlanContext {
            graph: &graph,
            model: &model,
            memory_states: &[],
            tests: &[],
            transfer_results: &HashMap::new(),
            transfer_gate: &gate,
            session: &session,
            tuning: &tuning,
            now: 0,
        };
        let action = next_action(&ctx, &BTreeSet::new());
        assert_eq!(action.action_type, ActionType::Rest);
    }
}
