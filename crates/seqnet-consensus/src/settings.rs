// SEQUENCER SETTINGS LOADER
// Layered file + environment loading on top of the named presets
//
// Resolution order (later wins):
// 1. The named `preset`, if any
// 2. Explicit keys from the file
// 3. SEQNET_* environment variables (load_sequencer_config only)
//
// The result always passes SequencerConfig::validate().

use crate::config::{ConfigError, SequencerConfig, DEFAULT_MESH_K};
use ::config::{Config, Environment, File, FileFormat};
use log::{debug, info};
use seqnet_core::PolicyId;
use serde::Deserialize;
use std::path::Path;

pub const ENV_PREFIX: &str = "SEQNET";

/// Raw, partially specified sequencer settings as read from a source.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSequencerConfig {
    preset: Option<String>,
    domain: Option<String>,
    domain_hex: Option<String>,
    k: Option<usize>,
    alpha: Option<f64>,
    beta_1: Option<f64>,
    beta_2: Option<f64>,
    soft_policy: Option<PolicyId>,
    hard_policy: Option<PolicyId>,
    round_timeout_ms: Option<u64>,
    finality_timeout_ms: Option<u64>,
}

impl RawSequencerConfig {
    fn domain_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        match (&self.domain, &self.domain_hex) {
            (Some(_), Some(_)) => Err(ConfigError::InvalidConfig {
                field: "domain",
                reason: "set either `domain` or `domain_hex`, not both".to_string(),
            }),
            (Some(text), None) => Ok(text.as_bytes().to_vec()),
            (None, Some(hex_text)) => hex::decode(hex_text).map_err(|e| ConfigError::InvalidConfig {
                field: "domain_hex",
                reason: e.to_string(),
            }),
            (None, None) => Err(ConfigError::MissingField("domain")),
        }
    }

    fn resolve(self) -> Result<SequencerConfig, ConfigError> {
        let domain = self.domain_bytes()?;

        let mut resolved = match self.preset.as_deref() {
            // agent-mesh takes its committee size from the file when given
            Some("agent-mesh") => SequencerConfig::agent_mesh(domain, self.k.unwrap_or(DEFAULT_MESH_K)),
            Some(name) => SequencerConfig::preset(name, domain)?,
            None => SequencerConfig {
                domain,
                k: self.k.ok_or(ConfigError::MissingField("k"))?,
                alpha: self.alpha.ok_or(ConfigError::MissingField("alpha"))?,
                beta_1: self.beta_1.ok_or(ConfigError::MissingField("beta_1"))?,
                beta_2: self.beta_2.ok_or(ConfigError::MissingField("beta_2"))?,
                soft_policy: self.soft_policy.unwrap_or(PolicyId::None),
                hard_policy: self.hard_policy.unwrap_or(PolicyId::None),
                round_timeout_ms: crate::config::DEFAULT_ROUND_TIMEOUT_MS,
                finality_timeout_ms: crate::config::DEFAULT_FINALITY_TIMEOUT_MS,
            },
        };

        if let Some(k) = self.k {
            resolved.k = k;
        }
        if let Some(alpha) = self.alpha {
            resolved.alpha = alpha;
        }
        if let Some(beta_1) = self.beta_1 {
            resolved.beta_1 = beta_1;
        }
        if let Some(beta_2) = self.beta_2 {
            resolved.beta_2 = beta_2;
        }
        if let Some(policy) = self.soft_policy {
            resolved.soft_policy = policy;
        }
        if let Some(policy) = self.hard_policy {
            resolved.hard_policy = policy;
        }
        if let Some(ms) = self.round_timeout_ms {
            resolved.round_timeout_ms = ms;
        }
        if let Some(ms) = self.finality_timeout_ms {
            resolved.finality_timeout_ms = ms;
        }

        resolved.validate()?;
        Ok(resolved)
    }
}

fn build(config: Config) -> Result<SequencerConfig, ConfigError> {
    let raw: RawSequencerConfig = config.try_deserialize()?;
    debug!("Raw sequencer settings: {:?}", raw);
    raw.resolve()
}

/// Load a sequencer config from a file (format chosen by extension), with
/// `SEQNET_*` environment overrides.
pub fn load_sequencer_config(path: impl AsRef<Path>) -> Result<SequencerConfig, ConfigError> {
    let path = path.as_ref();
    let config = Config::builder()
        .add_source(File::from(path))
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()?;
    let resolved = build(config)?;
    info!(
        "Loaded sequencer config from {} (k={}, alpha={}, soft={}, hard={})",
        path.display(),
        resolved.k,
        resolved.alpha,
        resolved.soft_policy,
        resolved.hard_policy
    );
    Ok(resolved)
}

/// Parse a sequencer config from in-memory text. No environment layering.
pub fn parse_sequencer_config(contents: &str, format: FileFormat) -> Result<SequencerConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(contents, format))
        .build()?;
    build(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_only() {
        let config = parse_sequencer_config(
            "preset = \"blockchain\"\ndomain = \"mainnet\"\n",
            FileFormat::Toml,
        )
        .unwrap();
        assert_eq!(config, SequencerConfig::blockchain("mainnet"));
    }

    #[test]
    fn test_preset_with_overrides() {
        let config = parse_sequencer_config(
            "preset = \"agent-mesh\"\ndomain = \"ai\"\nk = 3\nhard_policy = \"NONE\"\nfinality_timeout_ms = 10\n",
            FileFormat::Toml,
        )
        .unwrap();
        assert_eq!(config.k, 3);
        assert_eq!(config.alpha, 0.6);
        assert_eq!(config.hard_policy, PolicyId::None);
        assert_eq!(config.finality_timeout_ms, 10);
        assert_eq!(config.round_timeout_ms, 5_000);
    }

    #[test]
    fn test_explicit_config_without_preset() {
        let config = parse_sequencer_config(
            r#"{"domain_hex": "abcd", "k": 4, "alpha": 0.75, "beta_1": 0.5, "beta_2": 1.0, "soft_policy": "QUORUM"}"#,
            FileFormat::Json,
        )
        .unwrap();
        assert_eq!(config.domain, vec![0xab, 0xcd]);
        assert_eq!(config.k, 4);
        assert_eq!(config.soft_policy, PolicyId::Quorum);
        assert_eq!(config.hard_policy, PolicyId::None);
        assert_eq!(config.round_timeout_ms, crate::config::DEFAULT_ROUND_TIMEOUT_MS);
    }

    #[test]
    fn test_missing_threshold_without_preset() {
        let err = parse_sequencer_config("domain = \"d\"\nk = 3\n", FileFormat::Toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("alpha")));
    }

    #[test]
    fn test_missing_domain() {
        let err = parse_sequencer_config("preset = \"rollup\"\n", FileFormat::Toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("domain")));
    }

    #[test]
    fn test_unknown_preset() {
        let err = parse_sequencer_config("preset = \"galaxy\"\ndomain = \"d\"\n", FileFormat::Toml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPreset(name) if name == "galaxy"));
    }

    #[test]
    fn test_override_is_validated() {
        let err = parse_sequencer_config(
            "preset = \"single-node\"\ndomain = \"d\"\nalpha = 0.0\n",
            FileFormat::Toml,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig { field: "alpha", .. }));
    }

    #[test]
    fn test_both_domain_forms_rejected() {
        let err = parse_sequencer_config(
            "preset = \"rollup\"\ndomain = \"d\"\ndomain_hex = \"64\"\n",
            FileFormat::Toml,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig { field: "domain", .. }));
    }

    #[test]
    fn test_unknown_policy_name_fails_to_load() {
        let err = parse_sequencer_config(
            "preset = \"rollup\"\ndomain = \"d\"\nhard_policy = \"MAGIC\"\n",
            FileFormat::Toml,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
