//! Engine facade: the single owner of all per-learner state. Every public
//! method is a pure function of `(prior state, event)` given the injected
//! `Clock`/`IdGenerator`, so replaying the same event log against a fresh
//! `Engine` with the same clock/id-gen implementation reproduces identical
//! decisions, matching the determinism guarantee the session planner
//! already leans on.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use noesis_shared::{
    Clock, EventId, IdGenerator, LearnerId, NoesisError, NoesisResult, SkillId, TestId,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bkt::{self, BktParams, LearnerModel};
use crate::config::EngineConfig;
use crate::diagnostic;
use crate::events::{EventPayload, NoesisEvent};
use crate::fsrs::{self, FsrsParams, MemoryState};
use crate::graph::SkillGraph;
use crate::planner::{self, PlanContext, PlannerTuning, SessionAction, SessionConfig};
use crate::transfer::{self, TransferGateConfig, TransferTest, TransferTestResult};

/// Bumped whenever `EngineState`'s shape changes in a way that would make
/// an older export unsafe to import.
pub const SCHEMA_VERSION: u32 = 1;

/// Per-learner progress summary exposed to callers that don't need the raw
/// model internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerProgress {
    pub learner_id: LearnerId,
    pub mastered_skills: Vec<SkillId>,
    pub unmastered_skills: Vec<SkillId>,
    pub due_for_review: Vec<SkillId>,
    pub total_events: u64,
}

/// One learner's exported slice of state: their BKT model, FSRS memory
/// states, and transfer-test attempt history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerSnapshot {
    pub model: LearnerModel,
    pub memory_states: Vec<MemoryState>,
    pub transfer_results: HashMap<TestId, Vec<TransferTestResult>>,
}

/// The full serializable snapshot of engine state, versioned for
/// import/export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub schema_version: u32,
    pub graph: SkillGraph,
    pub config: EngineConfig,
    pub learner_models: BTreeMap<LearnerId, LearnerModel>,
    pub memory_states: BTreeMap<LearnerId, Vec<MemoryState>>,
    pub transfer_tests: Vec<TransferTest>,
    pub transfer_results: BTreeMap<LearnerId, HashMap<TestId, Vec<TransferTestResult>>>,
    pub event_log: Vec<NoesisEvent>,
}

/// Owns every learner's model state and processes events against it.
/// Holds its `Clock`/`IdGenerator` as trait objects so production code can
/// inject `SystemClock`/`Uuidv4Generator` while tests inject
/// `SequenceClock`/`SequenceIdGenerator` for deterministic replay.
pub struct Engine {
    graph: SkillGraph,
    config: EngineConfig,
    learner_models: BTreeMap<LearnerId, LearnerModel>,
    memory_states: BTreeMap<LearnerId, Vec<MemoryState>>,
    transfer_tests: Vec<TransferTest>,
    transfer_results: BTreeMap<LearnerId, HashMap<TestId, Vec<TransferTestResult>>>,
    event_log: Vec<NoesisEvent>,
    clock: Arc<dyn Clock>,
    id_gen: Arc<dyn IdGenerator>,
}

impl Engine {
    /// Rejects an invalid `config` up front rather than discovering it mid
    /// event-processing.
    pub fn new(
        graph: SkillGraph,
        config: EngineConfig,
        transfer_tests: Vec<TransferTest>,
        clock: Arc<dyn Clock>,
        id_gen: Arc<dyn IdGenerator>,
    ) -> NoesisResult<Self> {
        config.validate()?;
        Ok(Self {
            graph,
            config,
            learner_models: BTreeMap::new(),
            memory_states: BTreeMap::new(),
            transfer_tests,
            transfer_results: BTreeMap::new(),
            event_log: Vec::new(),
            clock,
            id_gen,
        })
    }

    fn learner_model_mut(&mut self, learner_id: &LearnerId, now: i64) -> &mut LearnerModel {
        self.learner_models
            .entry(learner_id.clone())
            .or_insert_with(|| LearnerModel::new(learner_id.clone(), now))
    }

    fn memory_states_mut(&mut self, learner_id: &LearnerId) -> &mut Vec<MemoryState> {
        self.memory_states.entry(learner_id.clone()).or_default()
    }

    fn memory_state_mut(
        &mut self,
        learner_id: &LearnerId,
        skill_id: &SkillId,
        params: &FsrsParams,
        now: i64,
    ) -> &mut MemoryState {
        let states = self.memory_states.entry(learner_id.clone()).or_default();
        if let Some(idx) = states.iter().position(|s| &s.skill_id == skill_id) {
            &mut states[idx]
        } else {
            states.push(MemoryState::new(skill_id.clone(), params, now));
            states.last_mut().unwrap()
        }
    }

    /// Applies one event to the engine, updating learner state and
    /// appending to the event log. Rejects malformed events and invalid
    /// configuration before mutating any state.
    pub fn process_event(&mut self, event: NoesisEvent) -> NoesisResult<()> {
        crate::events::validate(&event)?;
        let _span = tracing::debug_span!(
            "process_event",
            learner_id = %event.learner_id,
            event_type = event.kind()
        )
        .entered();

        match &event.payload {
            EventPayload::SessionStart { .. } | EventPayload::SessionEnd { .. } => {}
            EventPayload::Practice {
                skill_id,
                correct,
                ..
            } => {
                let now = event.timestamp;
                let learner_id = event.learner_id.clone();
                let defaults = self.config.bkt;
                {
                    let model = self.learner_model_mut(&learner_id, now);
                    bkt::record_practice(model, skill_id, *correct, defaults, now);
                }
                let fsrs_params = self.config.fsrs;
                let rating = if *correct {
                    fsrs::Rating::Good
                } else {
                    fsrs::Rating::Again
                };
                let state = self.memory_state_mut(&learner_id, skill_id, &fsrs_params, now);
                fsrs::review(state, rating, &fsrs_params, now);
            }
            EventPayload::Diagnostic { results, .. } => {
                let now = event.timestamp;
                let learner_id = event.learner_id.clone();
                let defaults = self.config.bkt;
                let model = self.learner_model_mut(&learner_id, now);
                diagnostic::apply(model, results, defaults, now)?;
            }
            EventPayload::TransferTest {
                test_id,
                score,
                passed,
                ..
            } => {
                let now = event.timestamp;
                let learner_id = event.learner_id.clone();
                let test = self
                    .transfer_tests
                    .iter()
                    .find(|t| &t.id == test_id)
                    .ok_or_else(|| {
                        NoesisError::malformed_event(format!("unknown transfer test {test_id}"))
                    })?;
                let result = transfer::evaluate_attempt(test, *score, now);
                if result.passed != *passed {
                    warn!(
                        test_id = %test_id,
                        expected = *passed,
                        computed = result.passed,
                        "transfer test event's reported pass/fail disagrees with recomputed grading"
                    );
                }
                self.transfer_results
                    .entry(learner_id)
                    .or_default()
                    .entry(test_id.clone())
                    .or_default()
                    .push(result);
            }
        }

        self.event_log.push(event);
        Ok(())
    }

    /// The single next-best action for a learner under `session`.
    #[must_use]
    pub fn get_next_action(&self, learner_id: &LearnerId, session: &SessionConfig) -> SessionAction {
        let now = self.clock.now_millis();
        let empty_model;
        let model = match self.learner_models.get(learner_id) {
            Some(m) => m,
            None => {
                empty_model = LearnerModel::new(learner_id.clone(), now);
                &empty_model
            }
        };
        let empty_states = Vec::new();
        let states = self
            .memory_states
            .get(learner_id)
            .unwrap_or(&empty_states);
        let empty_results = HashMap::new();
        let results = self
            .transfer_results
            .get(learner_id)
            .unwrap_or(&empty_results);

        let ctx = PlanContext {
            graph: &self.graph,
            model,
            memory_states: states,
            tests: &self.transfer_tests,
            transfer_results: results,
            transfer_gate: &self.config.transfer_gate,
            session,
            tuning: &self.config.planner,
            now,
        };
        planner::next_action(&ctx, &std::collections::BTreeSet::new())
    }

    /// A full ordered session plan for a learner under `session`.
    #[must_use]
    pub fn plan_session(&self, learner_id: &LearnerId, session: &SessionConfig) -> Vec<SessionAction> {
        let now = self.clock.now_millis();
        let empty_model;
        let model = match self.learner_models.get(learner_id) {
            Some(m) => m,
            None => {
                empty_model = LearnerModel::new(learner_id.clone(), now);
                &empty_model
            }
        };
        let empty_states = Vec::new();
        let states = self
            .memory_states
            .get(learner_id)
            .unwrap_or(&empty_states);
        let empty_results = HashMap::new();
        let results = self
            .transfer_results
            .get(learner_id)
            .unwrap_or(&empty_results);

        let ctx = PlanContext {
            graph: &self.graph,
            model,
            memory_states: states,
            tests: &self.transfer_tests,
            transfer_results: results,
            transfer_gate: &self.config.transfer_gate,
            session,
            tuning: &self.config.planner,
            now,
        };
        planner::plan_session(&ctx)
    }

    /// Summarizes a learner's current standing against the skill graph.
    #[must_use]
    pub fn get_learner_progress(&self, learner_id: &LearnerId) -> LearnerProgress {
        let now = self.clock.now_millis();
        let default_model = LearnerModel::new(learner_id.clone(), now);
        let model = self.learner_models.get(learner_id).unwrap_or(&default_model);
        let threshold = self.config.session.mastery_threshold;
        let unmastered = bkt::unmastered_skills(model, threshold);
        let unmastered_set: std::collections::BTreeSet<_> = unmastered.iter().cloned().collect();
        let mastered: Vec<SkillId> = self
            .graph
            .skill_ids()
            .filter(|id| !unmastered_set.contains(*id))
            .cloned()
            .collect();
        let empty_states = Vec::new();
        let states = self
            .memory_states
            .get(learner_id)
            .unwrap_or(&empty_states);
        let due = fsrs::due_skills(states, now)
            .into_iter()
            .map(|s| s.skill_id)
            .collect();

        LearnerProgress {
            learner_id: learner_id.clone(),
            mastered_skills: mastered,
            unmastered_skills: unmastered,
            due_for_review: due,
            total_events: model.total_events,
        }
    }

    /// Exports one learner's model, memory states, and transfer results.
    /// Unlike `export_state`/`process_event`, this is not forgiving of an
    /// unseen learner: there is no event to lazily create one from, so a
    /// learner id that has never appeared in a processed event is reported
    /// as `UnknownLearner` rather than synthesizing an empty view.
    pub fn export_learner_state(&self, learner_id: &LearnerId) -> NoesisResult<LearnerSnapshot> {
        let model = self
            .learner_models
            .get(learner_id)
            .ok_or_else(|| NoesisError::unknown_learner(learner_id))?;
        Ok(LearnerSnapshot {
            model: model.clone(),
            memory_states: self.memory_states.get(learner_id).cloned().unwrap_or_default(),
            transfer_results: self.transfer_results.get(learner_id).cloned().unwrap_or_default(),
        })
    }

    /// Exports a fully versioned snapshot of all engine state.
    #[must_use]
    pub fn export_state(&self) -> EngineState {
        EngineState {
            schema_version: SCHEMA_VERSION,
            graph: self.graph.clone(),
            config: self.config.clone(),
            learner_models: self.learner_models.clone(),
            memory_states: self.memory_states.clone(),
            transfer_tests: self.transfer_tests.clone(),
            transfer_results: self.transfer_results.clone(),
            event_log: self.event_log.clone(),
        }
    }

    /// Restores engine state from a prior export, rejecting a mismatched
    /// schema version rather than attempting a lossy upgrade.
    pub fn import_state(
        state: EngineState,
        clock: Arc<dyn Clock>,
        id_gen: Arc<dyn IdGenerator>,
    ) -> NoesisResult<Self> {
        if state.schema_version != SCHEMA_VERSION {
            return Err(NoesisError::state_version_mismatch(format!(
                "engine supports schema version {}, snapshot is version {}",
                SCHEMA_VERSION, state.schema_version
            )));
        }
        Ok(Self {
            graph: state.graph,
            config: state.config,
            learner_models: state.learner_models,
            memory_states: state.memory_states,
            transfer_tests: state.transfer_tests,
            transfer_results: state.transfer_results,
            event_log: state.event_log,
            clock,
            id_gen,
        })
    }

    #[must_use]
    pub fn next_event_id(&self) -> EventId {
        EventId::new(self.id_gen.next_id())
    }

    #[must_use]
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    #[must_use]
    pub fn graph(&self) -> &SkillGraph {
        &self.graph
    }
}

/// Concrete `Clock`/`IdGenerator` implementations: real ones for
/// production, deterministic sequence-based ones for tests and replay.
pub mod support {
    use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

    use noesis_shared::{Clock, IdGenerator};
    use uuid::Uuid;

    /// Wall-clock time via `chrono`, matching the rest of the crate's
    /// millisecond-epoch timestamp convention.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now_millis(&self) -> i64 {
            chrono::Utc::now().timestamp_millis()
        }
    }

    /// Random v4 UUIDs for production id generation.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct Uuidv4Generator;

    impl IdGenerator for Uuidv4Generator {
        fn next_id(&self) -> String {
            Uuid::new_v4().to_string()
        }
    }

    /// A clock that advances by a fixed step on every read, starting from a
    /// chosen instant. Used in tests and replay harnesses where two runs
    /// must observe identical timestamps.
    #[derive(Debug)]
    pub struct SequenceClock {
        current: AtomicI64,
        step_millis: i64,
    }

    impl SequenceClock {
        #[must_use]
        pub fn starting_at(start_millis: i64) -> Self {
            Self {
                current: AtomicI64::new(start_millis),
                step_millis: 0,
            }
        }

        #[must_use]
        pub fn stepping(start_millis: i64, step_millis: i64) -> Self {
            Self {
                current: AtomicI64::new(start_millis),
                step_millis,
            }
        }
    }

    impl Clock for SequenceClock {
        fn now_millis(&self) -> i64 {
            let value = self.current.load(Ordering::SeqCst);
            if self.step_millis != 0 {
                self.current.fetch_add(self.step_millis, Ordering::SeqCst);
            }
            value
        }
    }

    /// Monotonically increasing `"{prefix}-{n}"` ids, for deterministic
    /// replay tests.
    #[derive(Debug)]
    pub struct SequenceIdGenerator {
        prefix: String,
        counter: AtomicU64,
    }

    impl SequenceIdGenerator {
        #[must_use]
        pub fn with_prefix(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                counter: AtomicU64::new(0),
            }
        }
    }

    impl IdGenerator for SequenceIdGenerator {
        fn next_id(&self) -> String {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            format!("{}-{}", self.prefix, n)
        }
    }

}
