//! Event model: the append-only log entries the facade accepts and replays.
//! `NoesisEvent` is internally tagged on `type` with the payload flattened
//! in, so wire JSON reads as `{"id", "type", "timestamp", "learnerId", ...}`
//! rather than a nested payload object.

use noesis_shared::{EventId, ItemId, LearnerId, NoesisError, NoesisResult, SessionId, SkillId, TestId};
use serde::{Deserialize, Serialize};

use crate::planner::SessionConfig;
use crate::transfer::TransferType;

/// A single assessed skill within a `Diagnostic` event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    pub skill_id: SkillId,
    pub score: f64,
    pub items_attempted: u32,
    pub items_correct: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    SessionStart {
        session_id: SessionId,
        config: SessionConfig,
    },
    SessionEnd {
        session_id: SessionId,
        summary: serde_json::Value,
    },
    Practice {
        session_id: SessionId,
        skill_id: SkillId,
        item_id: ItemId,
        correct: bool,
        response_time_ms: i64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        confidence: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error_category: Option<String>,
    },
    Diagnostic {
        session_id: SessionId,
        skills_assessed: Vec<SkillId>,
        results: Vec<DiagnosticResult>,
    },
    TransferTest {
        session_id: SessionId,
        test_id: TestId,
        skill_id: SkillId,
        transfer_type: TransferType,
        score: f64,
        passed: bool,
    },
}

impl EventPayload {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::SessionStart { .. } => "session_start",
            EventPayload::SessionEnd { .. } => "session_end",
            EventPayload::Practice { .. } => "practice",
            EventPayload::Diagnostic { .. } => "diagnostic",
            EventPayload::TransferTest { .. } => "transfer_test",
        }
    }
}

/// An envelope around one `EventPayload`: identity, timestamp, and learner.
/// `#[serde(flatten)]` inlines the tagged payload fields at the top level of
/// the JSON object alongside `id`/`timestamp`/`learnerId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoesisEvent {
    pub id: EventId,
    pub timestamp: i64,
    pub learner_id: LearnerId,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl NoesisEvent {
    #[must_use]
    pub fn new(id: EventId, timestamp: i64, learner_id: LearnerId, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            learner_id,
            payload,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

/// Validates and deserializes an event from its wire JSON representation,
/// mapping parse failures to `NoesisError::MalformedEvent` rather than
/// leaking a `serde_json::Error` across the facade boundary.
pub fn from_json(raw: &str) -> NoesisResult<NoesisEvent> {
    let event: NoesisEvent =
        serde_json::from_str(raw).map_err(|e| NoesisError::malformed_event(e.to_string()))?;
    validate(&event)?;
    Ok(event)
}

/// Structural validation beyond what serde's type-checking already
/// enforces: ids must be non-empty, scores and response times must be in
/// their legal ranges.
pub fn validate(event: &NoesisEvent) -> NoesisResult<()> {
    if event.id.as_str().is_empty() {
        return Err(NoesisError::malformed_event("event id must not be empty"));
    }
    if event.learner_id.as_str().is_empty() {
        return Err(NoesisError::malformed_event(
            "learnerId must not be empty",
        ));
    }
    match &event.payload {
        EventPayload::Practice {
            response_time_ms,
            confidence,
            ..
        } => {
            if *response_time_ms < 0 {
                return Err(NoesisError::malformed_event(
                    "responseTimeMs must be >= 0",
                ));
            }
            if let Some(c) = confidence {
                if !(0.0..=1.0).contains(c) {
                    return Err(NoesisError::malformed_event(
                        "confidence must be in [0,1] when present",
                    ));
                }
            }
        }
        EventPayload::Diagnostic {
            results,
            skills_assessed,
            ..
        } => {
            if results.is_empty() || skills_assessed.is_empty() {
                return Err(NoesisError::malformed_event(
                    "diagnostic event must assess at least one skill",
                ));
            }
        }
        EventPayload::TransferTest { score, .. } => {
            if !(0.0..=1.0).contains(score) {
                return Err(NoesisError::malformed_event(
                    "transfer test score must be in [0,1]",
                ));
            }
        }
        EventPayload::SessionStart { .. } | EventPayload::SessionEnd { .. } => {}
    }
    Ok(())
}

/// Stamps ids and timestamps onto raw payloads using the facade's injected
/// `Clock`/`IdGenerator`, keeping event construction centralized and
/// replayable rather than scattering `EventId::new(...)` calls at call
/// sites.
pub struct EventFactory<'a> {
    clock: &'a dyn noesis_shared::Clock,
    id_gen: &'a dyn noesis_shared::IdGenerator,
}

impl<'a> EventFactory<'a> {
    #[must_use]
    pub fn new(clock: &'a dyn noesis_shared::Clock, id_gen: &'a dyn noesis_shared::IdGenerator) -> Self {
        Self { clock, id_gen }
    }

    /// Builds and validates a `NoesisEvent` for `learner_id` from `payload`,
    /// stamping a fresh id and the current clock time.
    pub fn build(&self, learner_id: LearnerId, payload: EventPayload) -> NoesisResult<NoesisEvent> {
        let event = NoesisEvent::new(
            EventId::new(self.id_gen.next_id()),
            self.clock.now_millis(),
            learner_id,
            payload,
        );
        validate(&event)?;
        Ok(event)
    }
}
