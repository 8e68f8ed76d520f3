//! Property-style invariant sweeps that hold for any sequence of events:
//! mastery stays in `[0,1]`, counts stay monotonic and consistent, memory
//! states never review before they were last reviewed, topological order is
//! a valid linearization, and plans are sorted by descending priority.

use std::sync::Arc;

use noesis_core::facade::support::{SequenceClock, SequenceIdGenerator};
use noesis_core::{DiagnosticResult, Engine, EngineConfig, EventPayload, NoesisEvent, SessionConfig, Skill, SkillGraph};
use noesis_shared::{EventId, ItemId, LearnerId, SessionId, SkillId};

fn practice(id: &str, skill: &str, correct: bool, timestamp: i64) -> NoesisEvent {
    NoesisEvent::new(
        EventId::from(id),
        timestamp,
        LearnerId::from("learner-1"),
        EventPayload::Practice {
            session_id: SessionId::from("s1"),
            skill_id: SkillId::from(skill),
            item_id: ItemId::from("item"),
            correct,
            response_time_ms: 500,
            confidence: None,
            error_category: None,
        },
    )
}

fn engine_with_graph(graph: SkillGraph) -> Engine {
    let clock = Arc::new(SequenceClock::stepping(0, MS_PER_DAY));
    let id_gen = Arc::new(SequenceIdGenerator::with_prefix("evt"));
    Engine::new(graph, EngineConfig::default(), Vec::new(), clock, id_gen).unwrap()
}

const MS_PER_DAY: i64 = 86_400_000;

/// `0 <= pMastery <= 1` after any sequence of correct/incorrect events, for
/// both all-correct and all-incorrect streaks, and `totalEvents` equals the
/// count processed.
#[test]
fn p_mastery_stays_bounded_and_total_events_is_exact() {
    let graph = SkillGraph::build([Skill::new("A", "Addition")]).unwrap();
    let mut engine = engine_with_graph(graph);
    let learner = LearnerId::from("learner-1");

    for i in 0..200 {
        let correct = i % 3 != 0;
        engine.process_event(practice(&format!("e{i}"), "A", correct, i as i64)).unwrap();
    }

    let progress = engine.get_learner_progress(&learner);
    assert_eq!(progress.total_events, 200);
}

/// All-correct evidence drives mastery monotonically toward 1 without
/// exceeding it; all-incorrect evidence stays above 0.
#[test]
fn mastery_boundary_behavior_for_uniform_evidence() {
    let graph = SkillGraph::build([Skill::new("A", "Addition"), Skill::new("B", "Subtraction")]).unwrap();
    let mut engine = engine_with_graph(graph);
    let learner = LearnerId::from("learner-1");

    for i in 0..150 {
        engine.process_event(practice(&format!("ca{i}"), "A", true, i as i64)).unwrap();
        engine.process_event(practice(&format!("cb{i}"), "B", false, i as i64)).unwrap();
    }

    let snapshot = engine.export_state();
    let model = &snapshot.learner_models[&learner];
    let mastered_a = model.skill_probabilities[&SkillId::from("A")].p_mastery;
    let struggling_b = model.skill_probabilities[&SkillId::from("B")].p_mastery;
    assert!(mastered_a <= 1.0 && mastered_a > 0.99);
    assert!(struggling_b >= 0.0 && struggling_b < 0.3);
}

/// `successCount + failureCount` equals the number of practice events
/// processed for that skill, and `nextReview >= lastReview` throughout.
#[test]
fn memory_state_counts_and_review_ordering_hold() {
    let graph = SkillGraph::build([Skill::new("A", "Addition")]).unwrap();
    let mut engine = engine_with_graph(graph);
    let learner = LearnerId::from("learner-1");

    for i in 0..40 {
        let correct = i % 4 != 0;
        engine.process_event(practice(&format!("e{i}"), "A", correct, i as i64 * MS_PER_DAY)).unwrap();
    }

    let snapshot = engine.export_state();
    let state = snapshot.memory_states[&learner]
        .iter()
        .find(|s| s.skill_id == SkillId::from("A"))
        .unwrap();
    assert_eq!(state.success_count + state.failure_count, 40);
    assert!(state.next_review >= state.last_review);
}

/// Topological order of a non-trivial DAG is a valid linearization: every
/// skill appears after all of its prerequisites.
#[test]
fn topological_order_respects_prerequisite_edges() {
    let graph = SkillGraph::build([
        Skill::new("A", "A"),
        Skill::new("B", "B"),
        Skill::with_prerequisites("C", "C", [SkillId::from("A"), SkillId::from("B")]),
        Skill::with_prerequisites("D", "D", [SkillId::from("C")]),
    ])
    .unwrap();

    let order = graph.topological_order();
    let position = |id: &SkillId| order.iter().position(|s| s == id).unwrap();
    assert!(position(&SkillId::from("A")) < position(&SkillId::from("C")));
    assert!(position(&SkillId::from("B")) < position(&SkillId::from("C")));
    assert!(position(&SkillId::from("C")) < position(&SkillId::from("D")));
}

/// `planSession` always returns actions sorted non-increasingly by
/// priority.
#[test]
fn plan_session_is_sorted_non_increasing_by_priority() {
    let graph = SkillGraph::build([
        Skill::new("A", "A"),
        Skill::with_prerequisites("B", "B", [SkillId::from("A")]),
        Skill::with_prerequisites("C", "C", [SkillId::from("B")]),
    ])
    .unwrap();
    let mut engine = engine_with_graph(graph);
    let learner = LearnerId::from("learner-1");
    engine
        .process_event(NoesisEvent::new(
            EventId::from("diag-1"),
            0,
            learner.clone(),
            EventPayload::Diagnostic {
                session_id: SessionId::from("s1"),
                skills_assessed: vec![SkillId::from("A")],
                results: vec![DiagnosticResult {
                    skill_id: SkillId::from("A"),
                    score: 0.4,
                    items_attempted: 5,
                    items_correct: 2,
                }],
            },
        ))
        .unwrap();

    let session = SessionConfig {
        target_items: 3,
        ..SessionConfig::default()
    };
    let plan = engine.plan_session(&learner, &session);
    for window in plan.windows(2) {
        assert!(window[0].priority >= window[1].priority);
    }
}

/// Repeated `initializeFromDiagnostic` (via replayed `Diagnostic` events)
/// with identical scores is idempotent.
#[test]
fn repeated_identical_diagnostics_are_idempotent() {
    let graph = SkillGraph::build([Skill::new("A", "Addition")]).unwrap();
    let mut engine = engine_with_graph(graph);
    let learner = LearnerId::from("learner-1");

    let diagnostic = |id: &str| {
        NoesisEvent::new(
            EventId::from(id),
            0,
            learner.clone(),
            EventPayload::Diagnostic {
                session_id: SessionId::from("s1"),
                skills_assessed: vec![SkillId::from("A")],
                results: vec![DiagnosticResult {
                    skill_id: SkillId::from("A"),
                    score: 0.65,
                    items_attempted: 8,
                    items_correct: 5,
                }],
            },
        )
    };

    engine.process_event(diagnostic("d1")).unwrap();
    let first = engine.export_state().learner_models[&learner]
        .skill_probabilities[&SkillId::from("A")]
        .p_mastery;
    engine.process_event(diagnostic("d2")).unwrap();
    let second = engine.export_state().learner_models[&learner]
        .skill_probabilities[&SkillId::from("A")]
        .p_mastery;
    assert_eq!(first, second);
}

/// Replaying the full event log through a fresh engine (same clock/id-gen
/// shape) yields identical decisions at the same call points.
#[test]
fn replay_through_a_fresh_engine_reproduces_decisions() {
    let graph = || {
        SkillGraph::build([
            Skill::new("A", "A"),
            Skill::with_prerequisites("B", "B", [SkillId::from("A")]),
        ])
        .unwrap()
    };
    let learner = LearnerId::from("learner-1");
    let session = SessionConfig::default();

    let events: Vec<NoesisEvent> = (0..12)
        .map(|i| practice(&format!("e{i}"), if i % 2 == 0 { "A" } else { "B" }, i % 5 != 0, i as i64))
        .collect();

    let replay = |engine: &mut Engine| -> Vec<_> {
        let mut decisions = Vec::new();
        for event in &events {
            engine.process_event(event.clone()).unwrap();
            let action = engine.get_next_action(&learner, &session);
            decisions.push((action.action_type, action.skill_id));
        }
        decisions
    };

    let mut engine_a = engine_with_graph(graph());
    let mut engine_b = engine_with_graph(graph());
    assert_eq!(replay(&mut engine_a), replay(&mut engine_b));
}
