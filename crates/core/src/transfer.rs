//! Transfer gate: tracks near/far transfer test requirements per skill and
//! decides whether a skill is unlocked for curricular advancement.

use std::collections::HashMap;

use noesis_shared::{NoesisError, NoesisResult, SkillId, TestId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    Near,
    Far,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferTest {
    pub id: TestId,
    pub skill_id: SkillId,
    pub transfer_type: TransferType,
    pub context: String,
    pub passing_score: f64,
}

/// Append-only attempt record; multiple attempts per test are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferTestResult {
    pub test_id: TestId,
    pub passed: bool,
    pub score: f64,
    pub timestamp: i64,
}

/// Grades a transfer-test attempt against the test's passing score.
#[must_use]
pub fn evaluate_attempt(test: &TransferTest, score: f64, timestamp: i64) -> TransferTestResult {
    TransferTestResult {
        test_id: test.id.clone(),
        passed: score >= test.passing_score,
        score,
        timestamp,
    }
}

/// Configurable transfer-gate policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferGateConfig {
    pub require_near_transfer: bool,
    pub require_far_transfer: bool,
    pub grace_period_events: u32,
}

impl Default for TransferGateConfig {
    fn default() -> Self {
        Self {
            require_near_transfer: true,
            require_far_transfer: false,
            grace_period_events: 3,
        }
    }
}

impl TransferGateConfig {
    /// No field combination is currently invalid.
    pub fn validate(&self) -> NoesisResult<()> {
        Ok(())
    }
}

/// Per-skill unlock status exposed to the session planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferStatus {
    pub is_unlocked: bool,
    pub required_tests: Vec<TestId>,
    pub passed_tests: Vec<TestId>,
    pub pending_tests: Vec<TestId>,
    pub attempts: u32,
    pub last_attempt: Option<i64>,
}

/// The lexicographically-first test of a given transfer type for a skill,
/// if any.
fn first_test_of_type<'a>(
    tests: &'a [TransferTest],
    skill_id: &SkillId,
    transfer_type: TransferType,
) -> Option<&'a TransferTest> {
    tests
        .iter()
        .filter(|t| &t.skill_id == skill_id && t.transfer_type == transfer_type)
        .min_by(|a, b| a.id.cmp(&b.id))
}

/// The tests required for a skill under `config`: the lexicographically
/// first near test if near transfer is required, plus the
/// lexicographically first far test if far transfer is required.
#[must_use]
pub fn required_tests<'a>(
    tests: &'a [TransferTest],
    skill_id: &SkillId,
    config: &TransferGateConfig,
) -> Vec<&'a TransferTest> {
    let mut required = Vec::new();
    if config.require_near_transfer {
        if let Some(t) = first_test_of_type(tests, skill_id, TransferType::Near) {
            required.push(t);
        }
    }
    if config.require_far_transfer {
        if let Some(t) = first_test_of_type(tests, skill_id, TransferType::Far) {
            required.push(t);
        }
    }
    required
}

fn has_passing_attempt(attempts: &[TransferTestResult], test_id: &TestId) -> bool {
    attempts
        .iter()
        .any(|a| &a.test_id == test_id && a.passed)
}

/// Full per-skill transfer status: unlock state, required/passed/pending
/// tests, attempt count, and the timestamp of the most recent attempt
/// against any required test.
#[must_use]
pub fn status(
    tests: &[TransferTest],
    attempts: &HashMap<TestId, Vec<TransferTestResult>>,
    skill_id: &SkillId,
    config: &TransferGateConfig,
) -> TransferStatus {
    let required = required_tests(tests, skill_id, config);
    let required_ids: Vec<TestId> = required.iter().map(|t| t.id.clone()).collect();

    let mut passed = Vec::new();
    let mut pending = Vec::new();
    let mut attempt_count = 0u32;
    let mut last_attempt: Option<i64> = None;

    for test in &required {
        let history = attempts.get(&test.id).map(Vec::as_slice).unwrap_or(&[]);
        attempt_count += history.len() as u32;
        if let Some(ts) = history.iter().map(|a| a.timestamp).max() {
            last_attempt = Some(last_attempt.map_or(ts, |prev| prev.max(ts)));
        }
        if has_passing_attempt(history, &test.id) {
            passed.push(test.id.clone());
        } else {
            pending.push(test.id.clone());
        }
    }

    TransferStatus {
        is_unlocked: pending.is_empty(),
        required_tests: required_ids,
        passed_tests: passed,
        pending_tests: pending,
        attempts: attempt_count,
        last_attempt,
    }
}

/// The first unpassed required test for a skill, near before far.
#[must_use]
pub fn next_test<'a>(
    tests: &'a [TransferTest],
    attempts: &HashMap<TestId, Vec<TransferTestResult>>,
    skill_id: &SkillId,
    config: &TransferGateConfig,
) -> Option<&'a TransferTest> {
    required_tests(tests, skill_id, config).into_iter().find(|t| {
        let history = attempts.get(&t.id).map(Vec::as_slice).unwrap_or(&[]);
        !has_passing_attempt(history, &t.id)
    })
}
