//! Decay, amplification and pruning of signals
//!
//! One dynamics pass, in order:
//! 1. every signal decays by the evaporation rate of its category
//! 2. signals are grouped by `(signalType, target)`
//! 3. every member of a group with more than one signal is boosted, capped at `maxAmplification`
//! 4. signals weaker than `signalPruneThreshold` are removed, survivors keep their order
//!
//! The pass is a pure function of its inputs. Configuration is validated when
//! it is turned into a `DynamicsConfig`, so a pass can never start on a config
//! that would fail halfway through.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::error::{MemeError, MemeResult};
use super::{DEFAULT_CATEGORY, MemeState};

/// Dynamics configuration as written on disk (`workflow_dynamics.json`)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDynamicsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaporation_rates: Option<IndexMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_amplification: Option<RawAmplification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_prune_threshold: Option<f64>,
    #[serde(default)]
    pub default_signal_strength: IndexMap<String, f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interpretation_logic: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAmplification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeated_signal_boost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amplification: Option<f64>,
}

/// One interpretation rule: a summary matching `pattern` produces a signal
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    /// Regular expression tested against the observation summary
    pub pattern: String,
    pub signal_type: String,
    #[serde(default = "default_rule_category")]
    pub category: String,
    /// Fixed target; defaults to the observation's project id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

fn default_rule_category() -> String {
    "state".to_string()
}

impl RawDynamicsConfig {
    /// Starter configuration written by `memes init`
    pub fn starter() -> Self {
        Self {
            evaporation_rates: Some(IndexMap::from([
                ("state".to_string(), 0.05),
                ("progress".to_string(), 0.2),
                (DEFAULT_CATEGORY.to_string(), 0.1),
            ])),
            signal_amplification: Some(RawAmplification {
                repeated_signal_boost: Some(1.5),
                max_amplification: Some(1.0),
            }),
            signal_prune_threshold: Some(0.05),
            default_signal_strength: IndexMap::from([
                ("state".to_string(), 1.0),
                ("progress".to_string(), 0.6),
                (DEFAULT_CATEGORY.to_string(), 0.5),
            ]),
            interpretation_logic: Vec::new(),
        }
    }
}

/// Validated dynamics configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicsConfig {
    evaporation_rates: IndexMap<String, f64>,
    default_rate: f64,
    pub repeated_signal_boost: f64,
    pub max_amplification: f64,
    pub prune_threshold: f64,
    default_signal_strength: IndexMap<String, f64>,
    pub interpretation_logic: Vec<RuleSpec>,
}

impl TryFrom<RawDynamicsConfig> for DynamicsConfig {
    type Error = MemeError;

    fn try_from(raw: RawDynamicsConfig) -> MemeResult<Self> {
        let evaporation_rates = raw
            .evaporation_rates
            .ok_or_else(|| MemeError::config("missing 'evaporationRates'"))?;
        let default_rate = *evaporation_rates
            .get(DEFAULT_CATEGORY)
            .ok_or_else(|| MemeError::config("'evaporationRates' has no 'default' entry"))?;
        for (category, rate) in &evaporation_rates {
            if !rate.is_finite() || !(0.0..=1.0).contains(rate) {
                return Err(MemeError::config(format!(
                    "evaporation rate for '{}' must be within [0, 1], got {}",
                    category, rate
                )));
            }
        }

        let amplification = raw
            .signal_amplification
            .ok_or_else(|| MemeError::config("missing 'signalAmplification'"))?;
        let repeated_signal_boost = amplification
            .repeated_signal_boost
            .ok_or_else(|| MemeError::config("missing 'signalAmplification.repeatedSignalBoost'"))?;
        let max_amplification = amplification
            .max_amplification
            .ok_or_else(|| MemeError::config("missing 'signalAmplification.maxAmplification'"))?;
        if !repeated_signal_boost.is_finite() || repeated_signal_boost < 1.0 {
            return Err(MemeError::config(format!(
                "'repeatedSignalBoost' must be at least 1, got {}",
                repeated_signal_boost
            )));
        }
        ensure_non_negative("maxAmplification", max_amplification)?;

        let prune_threshold = raw
            .signal_prune_threshold
            .ok_or_else(|| MemeError::config("missing 'signalPruneThreshold'"))?;
        ensure_non_negative("signalPruneThreshold", prune_threshold)?;

        for (category, strength) in &raw.default_signal_strength {
            ensure_non_negative(&format!("defaultSignalStrength.{}", category), *strength)?;
        }

        Ok(Self {
            evaporation_rates,
            default_rate,
            repeated_signal_boost,
            max_amplification,
            prune_threshold,
            default_signal_strength: raw.default_signal_strength,
            interpretation_logic: raw.interpretation_logic,
        })
    }
}

fn ensure_non_negative(key: &str, value: f64) -> MemeResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(MemeError::config(format!(
            "'{}' must be a finite non-negative number, got {}",
            key, value
        )));
    }
    Ok(())
}

impl DynamicsConfig {
    /// Read and validate a dynamics configuration file
    pub fn load(path: &Path) -> MemeResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| MemeError::io(path, e))?;
        let config = Self::parse(&content, path)?;
        log::info!("Loaded dynamics config from: {}", path.display());
        Ok(config)
    }

    /// Parse a dynamics document; `origin` only labels errors
    pub fn parse(content: &str, origin: &Path) -> MemeResult<Self> {
        let raw: RawDynamicsConfig =
            serde_json::from_str(content).map_err(|e| MemeError::deserialization(origin, e))?;
        Self::try_from(raw)
    }

    /// Decay rate for a category, falling back to the `default` rate
    pub fn rate_for(&self, category: &str) -> f64 {
        self.evaporation_rates
            .get(category)
            .copied()
            .unwrap_or(self.default_rate)
    }

    /// Initial strength for a new signal of this category
    pub fn initial_strength(&self, category: &str) -> MemeResult<f64> {
        self.default_signal_strength
            .get(category)
            .or_else(|| self.default_signal_strength.get(DEFAULT_CATEGORY))
            .copied()
            .ok_or_else(|| {
                MemeError::config(format!(
                    "'defaultSignalStrength' has no entry for '{}' and no 'default'",
                    category
                ))
            })
    }
}

/// What one pass did, for logging and CLI output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DynamicsReport {
    pub decayed: usize,
    pub amplified: usize,
    pub pruned: usize,
    pub surviving: usize,
}

/// Apply one dynamics pass and return the next state
#[allow(dead_code)] // the CLI uses run_pass for the report
pub fn apply_dynamics(mut state: MemeState, config: &DynamicsConfig) -> MemeState {
    run_pass(&mut state, config);
    state
}

/// Apply one dynamics pass in place
pub fn run_pass(state: &mut MemeState, config: &DynamicsConfig) -> DynamicsReport {
    let mut report = DynamicsReport::default();

    // Decay
    for signal in state.signals.iter_mut() {
        let rate = config.rate_for(signal.category());
        let decayed = (signal.strength.value() * (1.0 - rate)).max(0.0);
        if signal.strength != decayed {
            report.decayed += 1;
        }
        signal.strength.set(decayed);
    }

    // Duplicate groups, counted over every post-decay signal
    let duplicated: Vec<bool> = {
        let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
        for signal in &state.signals {
            *counts.entry(signal.group_key()).or_default() += 1;
        }
        state
            .signals
            .iter()
            .map(|s| counts.get(&s.group_key()).copied().unwrap_or(0) > 1)
            .collect()
    };

    // Amplification
    for (signal, is_duplicate) in state.signals.iter_mut().zip(duplicated) {
        if is_duplicate {
            let boosted = (signal.strength.value() * config.repeated_signal_boost).min(config.max_amplification);
            signal.strength.set(boosted);
            report.amplified += 1;
        }
    }

    // Prune
    let before = state.signals.len();
    state.signals.retain(|s| s.strength >= config.prune_threshold);
    report.pruned = before - state.signals.len();
    report.surviving = state.signals.len();

    log::debug!(
        "Dynamics pass: {} decayed, {} amplified, {} pruned, {} surviving",
        report.decayed,
        report.amplified,
        report.pruned,
        report.surviving
    );
    report
}
