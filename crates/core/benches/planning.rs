// Planning benchmarks: the tiered `plan_session` scan and the BKT update
// step are the two hot loops an embedder calling `getNextAction` per
// learner interaction actually pays for.

use std::collections::HashMap;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use noesis_core::bkt::{self, BktParams, LearnerModel};
use noesis_core::facade::support::{SequenceClock, SequenceIdGenerator};
use noesis_core::fsrs::{FsrsParams, MemoryState};
use noesis_core::graph::{Skill, SkillGraph};
use noesis_core::planner::{self, PlanContext, PlannerTuning, SessionConfig};
use noesis_core::transfer::TransferGateConfig;
use noesis_core::{Engine, EngineConfig};
use noesis_shared::{LearnerId, SkillId};

fn chain_graph(depth: usize) -> SkillGraph {
    let mut skills = Vec::with_capacity(depth);
    for i in 0..depth {
        let id = format!("skill-{i:04}");
        if i == 0 {
            skills.push(Skill::new(id, "root"));
        } else {
            let prereq = SkillId::from(format!("skill-{:04}", i - 1));
            skills.push(Skill::with_prerequisites(id, "node", [prereq]));
        }
    }
    SkillGraph::build(skills).unwrap()
}

fn bkt_update_step(c: &mut Criterion) {
    c.bench_function("bkt_record_practice", |b| {
        let params = BktParams::default();
        let mut model = LearnerModel::new(LearnerId::from("learner-1"), 0);
        let skill = SkillId::from("skill-0000");
        b.iter(|| {
            bkt::record_practice(&mut model, black_box(&skill), black_box(true), params, 0);
        });
    });
}

fn plan_session_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_session");

    for depth in [10usize, 100, 500] {
        let graph = chain_graph(depth);
        let mut model = LearnerModel::new(LearnerId::from("learner-1"), 0);
        let params = BktParams::default();
        for i in 0..depth / 2 {
            let skill = SkillId::from(format!("skill-{i:04}"));
            bkt::record_practice(&mut model, &skill, true, params, 0);
        }
        let fsrs_params = FsrsParams::default();
        let memory_states: Vec<MemoryState> = (0..depth / 4)
            .map(|i| MemoryState::new(SkillId::from(format!("skill-{i:04}")), &fsrs_params, 0))
            .collect();
        let session = SessionConfig {
            target_items: 10,
            ..SessionConfig::default()
        };
        let tuning = PlannerTuning::default();
        let gate = TransferGateConfig::default();
        let transfer_results = HashMap::new();

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                let ctx = PlanContext {
                    graph: &graph,
                    model: &model,
                    memory_states: &memory_states,
                    tests: &[],
                    transfer_results: &transfer_results,
                    transfer_gate: &gate,
                    session: &session,
                    tuning: &tuning,
                    now: 0,
                };
                black_box(planner::plan_session(&ctx));
            });
        });
    }
    group.finish();
}

fn end_to_end_event_processing(c: &mut Criterion) {
    c.bench_function("engine_process_event_practice", |b| {
        let clock = Arc::new(SequenceClock::stepping(0, 1_000));
        let id_gen = Arc::new(SequenceIdGenerator::with_prefix("evt"));
        let graph = chain_graph(20);
        let mut engine = Engine::new(graph, EngineConfig::default(), Vec::new(), clock, id_gen).unwrap();
        let learner = LearnerId::from("learner-1");
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            let event = noesis_core::NoesisEvent::new(
                noesis_shared::EventId::new(format!("e{counter}")),
                counter as i64,
                learner.clone(),
                noesis_core::EventPayload::Practice {
                    session_id: noesis_shared::SessionId::from("s1"),
                    skill_id: SkillId::from("skill-0000"),
                    item_id: noesis_shared::ItemId::from("item"),
                    correct: counter % 2 == 0,
                    response_time_ms: 500,
                    confidence: None,
                    error_category: None,
                },
            );
            engine.process_event(black_box(event)).unwrap();
        });
    });
}

criterion_group!(benches, bkt_update_step, plan_session_benchmark, end_to_end_event_processing);
criterion_main!(benches);
