//! Scribe: turns agent session observations into signals
//!
//! The scribe runs between orchestrator turns. It reads what the task
//! orchestrator reported, asks an `Interpreter` whether that warrants a new
//! signal, then runs one dynamics pass over the store and saves it.

use indexmap::IndexMap;

use crate::meme::store::{SignalStore, update};
use crate::meme::{DynamicsConfig, DynamicsReport, MemeResult, Signal, dynamics};

pub mod rules;

pub use rules::interpreter_for;

/// Target used when the session carries no project id
pub const UNKNOWN_TARGET: &str = "unknown";

/// The slice of agent session state the scribe looks at
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub summary: String,
    pub handoff_reason: String,
    pub project_id: Option<String>,
}

impl Observation {
    pub fn new(summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            ..Default::default()
        }
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.handoff_reason = reason.to_string();
        self
    }

    pub fn with_project(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    /// Read the orchestrator's session state keys.
    ///
    /// A present `project_id` is kept as given: strings verbatim (even empty),
    /// numbers and booleans in their JSON form. Only absent or `null` falls
    /// back to `UNKNOWN_TARGET`.
    pub fn from_session(state: &serde_json::Value) -> Self {
        let text = |key: &str| state.get(key).and_then(|v| v.as_str()).map(|s| s.to_string());

        let project_id = match state.get("project_id") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        Self {
            summary: text("task_orchestrator_summary").unwrap_or_default(),
            handoff_reason: text("handoff_reason").unwrap_or_default(),
            project_id,
        }
    }

    pub fn target(&self) -> &str {
        self.project_id.as_deref().unwrap_or(UNKNOWN_TARGET)
    }
}

/// A signal an interpreter wants created; strength and identity come later
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDraft {
    pub signal_type: String,
    pub target: String,
    pub category: String,
    pub message: String,
    pub data: IndexMap<String, serde_json::Value>,
}

/// Strategy deciding which observations produce a signal
pub trait Interpreter {
    fn name(&self) -> &str;
    fn interpret(&self, observation: &Observation) -> Option<SignalDraft>;
}

impl<F> Interpreter for F
where
    F: Fn(&Observation) -> Option<SignalDraft>,
{
    fn name(&self) -> &str {
        "closure"
    }

    fn interpret(&self, observation: &Observation) -> Option<SignalDraft> {
        self(observation)
    }
}

/// Materialize a draft: fresh id, current timestamps, strength from config
pub fn create_signal(draft: SignalDraft, config: &DynamicsConfig) -> MemeResult<Signal> {
    let strength = config.initial_strength(&draft.category)?;
    let mut signal =
        Signal::new(&draft.signal_type, &draft.target, &draft.category, strength).with_message(&draft.message);
    signal.data = Some(draft.data);
    Ok(signal)
}

/// Result of one scribe run
#[derive(Debug, Clone)]
pub struct ScribeOutcome {
    pub appended: Option<Signal>,
    pub report: DynamicsReport,
}

pub struct Scribe<'a> {
    interpreter: &'a dyn Interpreter,
}

impl<'a> Scribe<'a> {
    pub fn new(interpreter: &'a dyn Interpreter) -> Self {
        Self { interpreter }
    }

    /// Locked load → optional append → dynamics pass → save.
    /// The signal is stamped once the lock is held.
    pub fn record<S>(&self, store: &S, config: &DynamicsConfig, observation: &Observation) -> MemeResult<ScribeOutcome>
    where
        S: SignalStore + ?Sized,
    {
        let draft = self.interpreter.interpret(observation);
        if draft.is_none() {
            log::debug!("Interpreter '{}' produced no signal", self.interpreter.name());
        }

        let (appended, report) = update(store, |state| {
            let appended = match draft {
                Some(draft) => {
                    let signal = create_signal(draft, config)?;
                    state.push(signal.clone());
                    Some(signal)
                }
                None => None,
            };
            Ok((appended, dynamics::run_pass(state, config)))
        })?;

        log::info!(
            "Scribe run on {}: {} signal appended, {} pruned, {} surviving",
            store.location(),
            if appended.is_some() { "1" } else { "no" },
            report.pruned,
            report.surviving
        );
        Ok(ScribeOutcome { appended, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::rules::InitializationRule;
    use crate::meme::dynamics::RawDynamicsConfig;
    use crate::meme::MemeState;
    use crate::meme::store::MemoryStore;
    use chrono::{DateTime, SubsecRound, Utc};
    use std::path::Path;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    fn config() -> DynamicsConfig {
        DynamicsConfig::parse(
            r#"{
                "evaporationRates": {"state": 0.5, "default": 0.1},
                "signalAmplification": {"repeatedSignalBoost": 2, "maxAmplification": 0.9},
                "signalPruneThreshold": 0.4,
                "defaultSignalStrength": {"state": 1.0}
            }"#,
            Path::new("workflow_dynamics.json"),
        )
        .unwrap()
    }

    #[test]
    fn test_observation_from_session() {
        let session = serde_json::json!({
            "task_orchestrator_summary": "Initialization complete",
            "handoff_reason": "bootstrap done",
            "project_id": "p1",
            "other": 3
        });
        let obs = Observation::from_session(&session);
        assert_eq!(obs.summary, "Initialization complete");
        assert_eq!(obs.handoff_reason, "bootstrap done");
        assert_eq!(obs.target(), "p1");

        let empty = Observation::from_session(&serde_json::json!({}));
        assert_eq!(empty.summary, "");
        assert_eq!(empty.target(), UNKNOWN_TARGET);
    }

    #[test]
    fn test_project_id_kept_as_given() {
        let target = |id: serde_json::Value| {
            Observation::from_session(&serde_json::json!({"project_id": id}))
                .target()
                .to_string()
        };
        assert_eq!(target(serde_json::json!("")), "");
        assert_eq!(target(serde_json::json!(42)), "42");
        assert_eq!(target(serde_json::json!(true)), "true");
        assert_eq!(target(serde_json::Value::Null), UNKNOWN_TARGET);
    }

    #[test]
    fn test_create_signal_uses_default_strength() {
        let draft = SignalDraft {
            signal_type: "x".to_string(),
            target: "p1".to_string(),
            category: "state".to_string(),
            message: "m".repeat(400),
            data: IndexMap::from([("k".to_string(), serde_json::json!(1))]),
        };
        let signal = create_signal(draft, &config()).unwrap();

        assert_eq!(signal.strength, 1.0);
        assert_eq!(signal.message().len(), crate::meme::MESSAGE_MAX_CHARS);
        assert_eq!(signal.data.as_ref().unwrap()["k"], 1);
        assert_eq!(signal.timestamp_created, signal.last_updated_timestamp);
    }

    #[test]
    fn test_create_signal_without_strength_is_config_error() {
        let draft = SignalDraft {
            signal_type: "x".to_string(),
            target: "p1".to_string(),
            category: "progress".to_string(),
            message: String::new(),
            data: IndexMap::new(),
        };
        assert!(matches!(create_signal(draft, &config()), Err(crate::meme::MemeError::Config(_))));
    }

    #[test]
    fn test_record_appends_and_decays() {
        let store = MemoryStore::new();
        let rule = InitializationRule;
        let scribe = Scribe::new(&rule);
        let obs = Observation::new("Project initialization complete.")
            .with_reason("ready")
            .with_project("p1");

        let outcome = scribe.record(&store, &config(), &obs).unwrap();
        assert!(outcome.appended.is_some());

        let state = store.load().unwrap();
        assert_eq!(state.signals.len(), 1);
        let signal = &state.signals[0];
        assert_eq!(signal.signal_type, "project_initialization_complete");
        assert_eq!(signal.target, "p1");
        // created at 1.0, one pass at rate 0.5
        assert_eq!(signal.strength, 0.5);
        assert_eq!(signal.data.as_ref().unwrap()["handoff_reason"], "ready");
    }

    #[test]
    fn test_record_without_match_still_runs_dynamics() {
        let store = MemoryStore::new();
        let rule = InitializationRule;
        let scribe = Scribe::new(&rule);
        let obs = Observation::new("Initialization complete").with_project("p1");

        scribe.record(&store, &config(), &obs).unwrap();
        let outcome = scribe
            .record(&store, &config(), &Observation::new("still working"))
            .unwrap();

        assert!(outcome.appended.is_none());
        // 0.5 decays to 0.25, below the 0.4 threshold
        assert_eq!(outcome.report.pruned, 1);
        assert!(store.load().unwrap().signals.is_empty());
    }

    #[test]
    fn test_repeated_reports_amplify() {
        let store = MemoryStore::new();
        let rule = InitializationRule;
        let scribe = Scribe::new(&rule);
        let obs = Observation::new("initialization complete").with_project("p1");

        scribe.record(&store, &config(), &obs).unwrap();
        scribe.record(&store, &config(), &obs).unwrap();

        let state = store.load().unwrap();
        assert_eq!(state.signals.len(), 2);
        // 0.5 -> 0.25 -> x2 = 0.5, and 1.0 -> 0.5 -> x2 = 1.0 capped at 0.9
        assert_eq!(state.signals[0].strength, 0.5);
        assert_eq!(state.signals[1].strength, 0.9);
    }

    #[test]
    fn test_closure_interpreter() {
        let store = MemoryStore::new();
        let always = |obs: &Observation| {
            Some(SignalDraft {
                signal_type: "handoff".to_string(),
                target: obs.target().to_string(),
                category: "state".to_string(),
                message: obs.handoff_reason.clone(),
                data: IndexMap::new(),
            })
        };
        let scribe = Scribe::new(&always);

        scribe
            .record(&store, &config(), &Observation::new("").with_reason("blocked"))
            .unwrap();
        let state = store.load().unwrap();
        assert_eq!(state.signals[0].target, UNKNOWN_TARGET);
        assert_eq!(state.signals[0].message(), "blocked");
    }

    /// Store whose load takes over a second, like a writer queued behind another
    struct SlowStore {
        inner: MemoryStore,
        loaded_at: Mutex<Option<DateTime<Utc>>>,
    }

    impl SignalStore for SlowStore {
        fn load(&self) -> MemeResult<MemeState> {
            thread::sleep(Duration::from_millis(1100));
            *self.loaded_at.lock().unwrap() = Some(Utc::now().trunc_subsecs(0));
            self.inner.load()
        }

        fn save(&self, state: &MemeState) -> MemeResult<()> {
            self.inner.save(state)
        }

        fn location(&self) -> String {
            self.inner.location()
        }
    }

    #[test]
    fn test_signal_stamped_after_store_is_loaded() {
        let store = SlowStore {
            inner: MemoryStore::new(),
            loaded_at: Mutex::new(None),
        };
        let rule = InitializationRule;
        let obs = Observation::new("initialization complete").with_project("p1");

        let outcome = Scribe::new(&rule).record(&store, &config(), &obs).unwrap();
        let signal = outcome.appended.unwrap();
        let created = DateTime::parse_from_rfc3339(signal.timestamp_created.as_deref().unwrap())
            .unwrap()
            .with_timezone(&Utc);
        let loaded_at = store.loaded_at.lock().unwrap().unwrap();
        assert!(created >= loaded_at, "stamped {} before load finished at {}", created, loaded_at);
    }

    #[test]
    fn test_config_error_leaves_store_untouched() {
        let store = MemoryStore::new();
        let rule = InitializationRule;
        let scribe = Scribe::new(&rule);
        let mut raw = RawDynamicsConfig::starter();
        raw.default_signal_strength.clear();
        let cfg = DynamicsConfig::try_from(raw).unwrap();

        let result = scribe.record(&store, &cfg, &Observation::new("initialization complete"));
        assert!(result.is_err());
        assert!(store.content().is_none());
    }
}
