//! Deterministic, event-driven adaptive-learning engine: a skill graph, a
//! BKT mastery model, an FSRS-style memory scheduler, a transfer-gate, and
//! a five-tier session planner, unified behind a single [`facade::Engine`].
//!
//! Every public operation is a pure function of `(prior state, event)`
//! given the engine's injected `Clock`/`IdGenerator` — replaying the same
//! event log against a fresh engine with the same clock/id-gen
//! implementation always reproduces identical decisions.

pub mod bkt;
pub mod config;
pub mod diagnostic;
pub mod events;
pub mod facade;
pub mod fsrs;
pub mod graph;
pub mod planner;
pub mod transfer;

pub use bkt::{BktParams, LearnerModel, SkillProb};
pub use config::EngineConfig;
pub use events::{DiagnosticResult, EventPayload, NoesisEvent};
pub use facade::{Engine, EngineState, LearnerProgress, LearnerSnapshot, SCHEMA_VERSION};
pub use fsrs::{FsrsParams, MemoryState, MemoryStateKind, Rating};
pub use graph::{Skill, SkillGraph, ValidationReport};
pub use planner::{ActionType, PlanContext, PlannerTuning, SessionAction, SessionConfig};
pub use transfer::{TransferGateConfig, TransferStatus, TransferTest, TransferTestResult, TransferType};

pub use noesis_shared::{
    Clock, EventId, GraphError, IdGenerator, ItemId, LearnerId, NoesisError, NoesisResult,
    SessionId, SkillId, TestId,
};
