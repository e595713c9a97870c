//! Interpreters shipped with the scribe
//!
//! - `InitializationRule`: the baseline, recognises "initialization complete"
//! - `RuleInterpreter`: ordered regex rules from `interpretationLogic` in the dynamics config

use indexmap::IndexMap;
use lazy_regex::regex_is_match;
use regex::Regex;

use super::{Interpreter, Observation, SignalDraft};
use crate::meme::dynamics::RuleSpec;
use crate::meme::{DynamicsConfig, MemeError, MemeResult};

pub const INITIALIZATION_SIGNAL: &str = "project_initialization_complete";

fn draft(observation: &Observation, signal_type: &str, target: &str, category: &str) -> SignalDraft {
    SignalDraft {
        signal_type: signal_type.to_string(),
        target: target.to_string(),
        category: category.to_string(),
        message: observation.summary.clone(),
        data: IndexMap::from([(
            "handoff_reason".to_string(),
            serde_json::Value::String(observation.handoff_reason.clone()),
        )]),
    }
}

/// Baseline single-rule matcher
#[derive(Debug, Clone, Copy, Default)]
pub struct InitializationRule;

impl Interpreter for InitializationRule {
    fn name(&self) -> &str {
        "initialization"
    }

    fn interpret(&self, observation: &Observation) -> Option<SignalDraft> {
        if regex_is_match!(r"(?i)initialization complete", &observation.summary) {
            Some(draft(observation, INITIALIZATION_SIGNAL, observation.target(), "state"))
        } else {
            None
        }
    }
}

struct CompiledRule {
    pattern: Regex,
    spec: RuleSpec,
}

/// First matching rule wins
pub struct RuleInterpreter {
    rules: Vec<CompiledRule>,
}

impl RuleInterpreter {
    pub fn new(specs: &[RuleSpec]) -> MemeResult<Self> {
        let rules = specs
            .iter()
            .map(|spec| {
                Regex::new(&spec.pattern)
                    .map(|pattern| CompiledRule {
                        pattern,
                        spec: spec.clone(),
                    })
                    .map_err(|e| {
                        MemeError::config(format!(
                            "invalid interpretation pattern '{}' for '{}': {}",
                            spec.pattern, spec.signal_type, e
                        ))
                    })
            })
            .collect::<MemeResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Interpreter for RuleInterpreter {
    fn name(&self) -> &str {
        "rules"
    }

    fn interpret(&self, observation: &Observation) -> Option<SignalDraft> {
        let rule = self.rules.iter().find(|r| r.pattern.is_match(&observation.summary))?;
        log::debug!("Summary matched rule for '{}'", rule.spec.signal_type);

        let target = rule.spec.target.as_deref().unwrap_or(observation.target());
        Some(draft(observation, &rule.spec.signal_type, target, &rule.spec.category))
    }
}

/// Pick the interpreter a dynamics config asks for
pub fn interpreter_for(config: &DynamicsConfig) -> MemeResult<Box<dyn Interpreter>> {
    if config.interpretation_logic.is_empty() {
        Ok(Box::new(InitializationRule))
    } else {
        let interpreter = RuleInterpreter::new(&config.interpretation_logic)?;
        log::info!("Using {} interpretation rules from config", interpreter.rule_count());
        Ok(Box::new(interpreter))
    }
}
