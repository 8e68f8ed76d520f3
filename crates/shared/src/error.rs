use serde::{Deserialize, Serialize};

use crate::ids::SkillId;

/// Structured detail for `NoesisError::InvalidGraph`, so callers can act on
/// *which* skills are involved instead of parsing a message string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "reason", content = "detail")]
pub enum GraphError {
    #[error("cycle detected among skills: {skills:?}")]
    Cycle { skills: Vec<SkillId> },
    #[error("skill {skill} declares unknown prerequisite {prerequisite}")]
    DanglingPrerequisite {
        skill: SkillId,
        prerequisite: SkillId,
    },
    #[error("skill {skill} is already defined")]
    DuplicateSkill { skill: SkillId },
}

/// The core's single error type. Every public, fallible operation returns
/// `Result<T, NoesisError>`. Variants carry a `kind` discriminator over the
/// wire (via `#[serde(tag = "kind", content = "detail")]`) so an embedder
/// proxying this across a process boundary can match on it without parsing
/// the display message.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail")]
pub enum NoesisError {
    #[error("invalid skill graph: {0}")]
    InvalidGraph(GraphError),

    #[error("invalid BKT parameters: {0}")]
    InvalidBktParams(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid diagnostic: {0}")]
    InvalidDiagnostic(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("unknown learner: {0}")]
    UnknownLearner(String),

    #[error("unsupported state snapshot version: {0}")]
    StateVersionMismatch(String),
}

pub type NoesisResult<T> = std::result::Result<T, NoesisError>;

impl NoesisError {
    #[must_use]
    pub fn invalid_graph(err: GraphError) -> Self {
        Self::InvalidGraph(err)
    }

    #[must_use]
    pub fn invalid_bkt_params(message: impl Into<String>) -> Self {
        Self::InvalidBktParams(message.into())
    }

    #[must_use]
    pub fn invalid_diagnostic(message: impl Into<String>) -> Self {
        Self::InvalidDiagnostic(message.into())
    }

    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    #[must_use]
    pub fn malformed_event(message: impl Into<String>) -> Self {
        Self::MalformedEvent(message.into())
    }

    #[must_use]
    pub fn unknown_learner(id: impl std::fmt::Display) -> Self {
        Self::UnknownLearner(id.to_string())
    }

    #[must_use]
    pub fn state_version_mismatch(message: impl Into<String>) -> Self {
        Self::StateVersionMismatch(message.into())
    }
}
