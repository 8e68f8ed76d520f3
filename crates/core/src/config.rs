//! Engine configuration: the aggregate of every tunable parameter group,
//! loadable from TOML via the `toml` crate the way a deployed engine would
//! read its config file.

use noesis_shared::NoesisResult;
use serde::{Deserialize, Serialize};

use crate::bkt::BktParams;
use crate::fsrs::FsrsParams;
use crate::planner::{PlannerTuning, SessionConfig};
use crate::transfer::TransferGateConfig;

/// Every parameter group the engine needs, aggregated so a single TOML file
/// configures the whole thing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub bkt: BktParams,
    #[serde(default)]
    pub fsrs: FsrsParams,
    #[serde(default)]
    pub planner: PlannerTuning,
    #[serde(default)]
    pub transfer_gate: TransferGateConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bkt: BktParams::default(),
            fsrs: FsrsParams::default(),
            planner: PlannerTuning::default(),
            transfer_gate: TransferGateConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validates every parameter group, short-circuiting on the first
    /// failure.
    pub fn validate(&self) -> NoesisResult<()> {
        self.bkt.validate()?;
        self.fsrs.validate()?;
        self.planner.validate()?;
        self.transfer_gate.validate()?;
        self.session.validate()?;
        Ok(())
    }

    /// Parses and validates an `EngineConfig` from a TOML document. Missing
    /// tables fall back to each group's `Default`.
    pub fn from_toml_str(raw: &str) -> NoesisResult<Self> {
        let config: EngineConfig = toml::from_str(raw)
            .map_err(|e| noesis_shared::NoesisError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
