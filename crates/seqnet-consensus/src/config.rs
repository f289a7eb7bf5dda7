// SEQUENCER CONFIGURATION
// Immutable configuration bundle with presets for the four topologies
//
// SAFETY INVARIANTS:
// 1. k >= 1
// 2. 0 < alpha <= 1, 0 < beta_1 <= 1, 0 < beta_2 <= 1
// 3. Presets are known-good defaults, never hard-coded engine behavior:
//    the engine accepts any config satisfying 1 and 2

use seqnet_core::codec::{as_object, f64_field, hex_field, u64_field, u64_or};
use seqnet_core::{PolicyId, WireCodec, WireError};
use serde_json::{json, Value};
use thiserror::Error;

/// Default committee size of the agent-mesh preset.
pub const DEFAULT_MESH_K: usize = 5;

pub const DEFAULT_ROUND_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_FINALITY_TIMEOUT_MS: u64 = 60_000;

/// Construction-time configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric invariant is violated.
    #[error("invalid config field `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("missing config field `{0}`")]
    MissingField(&'static str),

    #[error("unknown preset `{0}` (expected single-node, agent-mesh, blockchain or rollup)")]
    UnknownPreset(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}

/// Sequencer pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerConfig {
    /// Domain tag isolating this sequencer's ID space
    pub domain: Vec<u8>,
    /// Sample / committee size
    pub k: usize,
    /// Agreement threshold (fraction of k)
    pub alpha: f64,
    /// Soft finality threshold (fraction of k)
    pub beta_1: f64,
    /// Hard finality threshold (fraction of k)
    pub beta_2: f64,
    pub soft_policy: PolicyId,
    pub hard_policy: PolicyId,
    /// Consumed by an external driver loop; never enforced internally
    pub round_timeout_ms: u64,
    pub finality_timeout_ms: u64,
}

fn check_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        return Err(ConfigError::InvalidConfig {
            field,
            reason: format!("must satisfy 0 < {} <= 1, got {}", field, value),
        });
    }
    Ok(())
}

/// Convert a fractional threshold into an absolute count out of `k`.
///
/// Always in `1..=k` for a valid fraction and `k >= 1`.
pub fn threshold_count(fraction: f64, k: usize) -> usize {
    // Tolerance keeps e.g. 0.6 * 5 from rounding up to 4
    let raw = (fraction * k as f64 - 1e-9).ceil();
    (raw.max(1.0) as usize).min(k.max(1))
}

impl SequencerConfig {
    /// Build a validated configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        domain: impl Into<Vec<u8>>,
        k: usize,
        alpha: f64,
        beta_1: f64,
        beta_2: f64,
        soft_policy: PolicyId,
        hard_policy: PolicyId,
        round_timeout_ms: u64,
        finality_timeout_ms: u64,
    ) -> Result<Self, ConfigError> {
        let config = SequencerConfig {
            domain: domain.into(),
            k,
            alpha,
            beta_1,
            beta_2,
            soft_policy,
            hard_policy,
            round_timeout_ms,
            finality_timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the numeric invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k == 0 {
            return Err(ConfigError::InvalidConfig {
                field: "k",
                reason: "must be >= 1".to_string(),
            });
        }
        check_fraction("alpha", self.alpha)?;
        check_fraction("beta_1", self.beta_1)?;
        check_fraction("beta_2", self.beta_2)?;
        Ok(())
    }

    /// K=1 self-sequencing.
    pub fn single_node(domain: impl Into<Vec<u8>>) -> Self {
        SequencerConfig {
            domain: domain.into(),
            k: 1,
            alpha: 1.0,
            beta_1: 1.0,
            beta_2: 1.0,
            soft_policy: PolicyId::None,
            hard_policy: PolicyId::None,
            round_timeout_ms: 100,
            finality_timeout_ms: 100,
        }
    }

    /// K=3/5 agent mesh. A `k` of zero is raised to 1.
    pub fn agent_mesh(domain: impl Into<Vec<u8>>, k: usize) -> Self {
        SequencerConfig {
            domain: domain.into(),
            k: k.max(1),
            alpha: 0.6,
            beta_1: 0.5,
            beta_2: 0.8,
            soft_policy: PolicyId::Quorum,
            hard_policy: PolicyId::Quorum,
            round_timeout_ms: 5_000,
            finality_timeout_ms: 30_000,
        }
    }

    /// Large permissionless network: sampling for soft, post-quantum for hard.
    pub fn blockchain(domain: impl Into<Vec<u8>>) -> Self {
        SequencerConfig {
            domain: domain.into(),
            k: 20,
            alpha: 0.65,
            beta_1: 0.5,
            beta_2: 0.8,
            soft_policy: PolicyId::SampleConvergence,
            hard_policy: PolicyId::Quantum,
            round_timeout_ms: 1_000,
            finality_timeout_ms: 60_000,
        }
    }

    /// Rollup anchored on an external chain.
    pub fn rollup(domain: impl Into<Vec<u8>>) -> Self {
        SequencerConfig {
            domain: domain.into(),
            k: 1,
            alpha: 1.0,
            beta_1: 1.0,
            beta_2: 1.0,
            soft_policy: PolicyId::None,
            hard_policy: PolicyId::L1Inclusion,
            round_timeout_ms: 2_000,
            finality_timeout_ms: 600_000,
        }
    }

    /// Look a preset up by name (`single-node`, `agent-mesh`, `blockchain`, `rollup`).
    pub fn preset(name: &str, domain: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        match name {
            "single-node" => Ok(Self::single_node(domain)),
            "agent-mesh" => Ok(Self::agent_mesh(domain, DEFAULT_MESH_K)),
            "blockchain" => Ok(Self::blockchain(domain)),
            "rollup" => Ok(Self::rollup(domain)),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }

    /// Absolute agreement quorum out of `k`.
    pub fn alpha_count(&self) -> usize {
        threshold_count(self.alpha, self.k)
    }

    /// Absolute soft-finality threshold out of `k`.
    pub fn soft_threshold(&self) -> usize {
        threshold_count(self.beta_1, self.k)
    }

    /// Absolute hard-finality threshold out of `k`.
    pub fn hard_threshold(&self) -> usize {
        threshold_count(self.beta_2, self.k)
    }
}

impl WireCodec for SequencerConfig {
    fn to_wire(&self) -> Value {
        json!({
            "domain": hex::encode(&self.domain),
            "k": self.k,
            "alpha": self.alpha,
            "beta_1": self.beta_1,
            "beta_2": self.beta_2,
            "soft_policy": self.soft_policy.as_u8(),
            "hard_policy": self.hard_policy.as_u8(),
            "round_timeout_ms": self.round_timeout_ms,
            "finality_timeout_ms": self.finality_timeout_ms,
        })
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let obj = as_object(value, "config")?;
        let config = SequencerConfig {
            domain: hex_field(obj, "domain")?,
            k: u64_field(obj, "k")? as usize,
            alpha: f64_field(obj, "alpha")?,
            beta_1: f64_field(obj, "beta_1")?,
            beta_2: f64_field(obj, "beta_2")?,
            soft_policy: PolicyId::try_from(u64_field(obj, "soft_policy")?)?,
            hard_policy: PolicyId::try_from(u64_field(obj, "hard_policy")?)?,
            round_timeout_ms: u64_or(obj, "round_timeout_ms", DEFAULT_ROUND_TIMEOUT_MS)?,
            finality_timeout_ms: u64_or(obj, "finality_timeout_ms", DEFAULT_FINALITY_TIMEOUT_MS)?,
        };
        config.validate().map_err(|e| match e {
            ConfigError::InvalidConfig { field, reason } => WireError::InvalidField { field, reason },
            other => WireError::InvalidField {
                field: "config",
                reason: other.to_string(),
            },
        })?;
        Ok(config)
    }
}

/// Parameters of the reference quorum engine, in absolute vote counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Sample size
    pub k: usize,
    /// Votes required to accept a candidate
    pub alpha: usize,
}

impl EngineConfig {
    pub fn new(k: usize, alpha: usize) -> Result<Self, ConfigError> {
        if k == 0 {
            return Err(ConfigError::InvalidConfig {
                field: "k",
                reason: "must be >= 1".to_string(),
            });
        }
        // alpha may exceed k: votes are counted raw, not per sample
        if alpha == 0 {
            return Err(ConfigError::InvalidConfig {
                field: "alpha",
                reason: "quorum must be >= 1".to_string(),
            });
        }
        Ok(EngineConfig { k, alpha })
    }

    /// Engine parameters implied by a sequencer config: `alpha = ceil(alpha * k)`.
    pub fn from_sequencer(config: &SequencerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::new(config.k, config.alpha_count())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { k: 20, alpha: 20 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for config in [
            SequencerConfig::single_node(b"solo".to_vec()),
            SequencerConfig::agent_mesh(b"ai-mesh".to_vec(), 3),
            SequencerConfig::blockchain(b"mainnet".to_vec()),
            SequencerConfig::rollup(b"op".to_vec()),
        ] {
            assert!(config.validate().is_ok(), "{:?}", config);
        }
    }

    #[test]
    fn test_preset_table_values() {
        let mesh = SequencerConfig::agent_mesh("m", DEFAULT_MESH_K);
        assert_eq!((mesh.k, mesh.alpha, mesh.beta_1, mesh.beta_2), (5, 0.6, 0.5, 0.8));
        assert_eq!(mesh.soft_policy, PolicyId::Quorum);

        let chain = SequencerConfig::blockchain("c");
        assert_eq!((chain.k, chain.alpha), (20, 0.65));
        assert_eq!(chain.soft_policy, PolicyId::SampleConvergence);
        assert_eq!(chain.hard_policy, PolicyId::Quantum);

        let rollup = SequencerConfig::rollup("r");
        assert_eq!(rollup.hard_policy, PolicyId::L1Inclusion);
        assert_eq!(rollup.finality_timeout_ms, 600_000);
    }

    #[test]
    fn test_preset_by_name() {
        assert_eq!(
            SequencerConfig::preset("rollup", "r").unwrap(),
            SequencerConfig::rollup("r")
        );
        assert!(matches!(
            SequencerConfig::preset("mesh", "r"),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_invalid_alpha_rejected() {
        let err = SequencerConfig::new("d", 5, 0.0, 0.5, 0.5, PolicyId::None, PolicyId::None, 1, 1)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig { field: "alpha", .. }));

        let err = SequencerConfig::new("d", 5, 0.5, 1.5, 0.5, PolicyId::None, PolicyId::None, 1, 1)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig { field: "beta_1", .. }));

        let err = SequencerConfig::new("d", 5, 0.5, 0.5, f64::NAN, PolicyId::None, PolicyId::None, 1, 1)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig { field: "beta_2", .. }));
    }

    #[test]
    fn test_zero_k_rejected() {
        let err = SequencerConfig::new("d", 0, 0.5, 0.5, 0.5, PolicyId::None, PolicyId::None, 1, 1)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig { field: "k", .. }));
    }

    #[test]
    fn test_threshold_counts() {
        assert_eq!(threshold_count(0.6, 5), 3);
        assert_eq!(threshold_count(0.65, 20), 13);
        assert_eq!(threshold_count(0.8, 5), 4);
        assert_eq!(threshold_count(0.5, 5), 3);
        assert_eq!(threshold_count(1.0, 1), 1);
        assert_eq!(threshold_count(0.01, 3), 1);
    }

    #[test]
    fn test_engine_config_from_sequencer() {
        let engine = EngineConfig::from_sequencer(&SequencerConfig::agent_mesh("m", 5)).unwrap();
        assert_eq!(engine, EngineConfig { k: 5, alpha: 3 });
    }

    #[test]
    fn test_engine_config_bounds() {
        assert!(EngineConfig::new(0, 1).is_err());
        assert!(EngineConfig::new(3, 0).is_err());
        assert!(EngineConfig::new(3, 3).is_ok());
        assert_eq!(EngineConfig::new(3, 4).unwrap(), EngineConfig { k: 3, alpha: 4 });
    }

    #[test]
    fn test_config_wire_roundtrip() {
        let config = SequencerConfig::blockchain(b"mainnet".to_vec());
        assert_eq!(SequencerConfig::from_json(&config.to_json()).unwrap(), config);
    }

    #[test]
    fn test_config_wire_rejects_invalid_values() {
        let mut value = SequencerConfig::single_node("s").to_wire();
        value["alpha"] = json!(2.0);
        assert!(matches!(
            SequencerConfig::from_wire(&value),
            Err(WireError::InvalidField { field: "alpha", .. })
        ));

        let mut value = SequencerConfig::single_node("s").to_wire();
        value["hard_policy"] = json!(9);
        assert_eq!(
            SequencerConfig::from_wire(&value),
            Err(WireError::UnknownPolicyEnumerant(9))
        );
    }
}
