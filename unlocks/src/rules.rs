//! Predicates bound 1:1 to unlockable ids.

use {
    bevy::{platform::collections::HashMap, prelude::*},
    std::sync::Arc,
    thiserror::Error,
    unlocks_events::DomainEvent,
    unlocks_resources::{ProgressState, TransactionLog},
};

/// Why a rule could not decide. Always treated as "not satisfied".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("counter `{0}` has never been recorded")]
    UnknownCounter(String),
    #[error("history is only available to card rules")]
    HistoryUnavailable,
    #[error("{0}")]
    Failed(String),
}

/// Everything a rule may look at.
#[derive(Clone, Copy)]
pub struct RuleInput<'a> {
    pub event: &'a DomainEvent,
    pub state: &'a ProgressState,
    /// Present on the card path only.
    pub history: Option<&'a TransactionLog>,
}

impl<'a> RuleInput<'a> {
    pub fn achievement(event: &'a DomainEvent, state: &'a ProgressState) -> Self {
        Self {
            event,
            state,
            history: None,
        }
    }

    pub fn card(
        event: &'a DomainEvent,
        state: &'a ProgressState,
        history: &'a TransactionLog,
    ) -> Self {
        Self {
            event,
            state,
            history: Some(history),
        }
    }
}

/// A pure predicate over an event, the progress state and (for cards) history.
pub trait Rule: Send + Sync {
    fn evaluate(&self, input: &RuleInput<'_>) -> Result<bool, RuleError>;
}

impl<F> Rule for F
where
    F: Fn(&RuleInput<'_>) -> Result<bool, RuleError> + Send + Sync,
{
    fn evaluate(&self, input: &RuleInput<'_>) -> Result<bool, RuleError> {
        self(input)
    }
}

/// Rules keyed by unlockable id.
#[derive(Clone, Default)]
pub struct RuleSet {
    rules: HashMap<String, Arc<dyn Rule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `rule` to `id`, replacing any previous rule.
    pub fn insert(&mut self, id: impl Into<String>, rule: Arc<dyn Rule>) {
        self.rules.insert(id.into(), rule);
    }

    /// Binds a closure rule to `id`.
    pub fn register<F>(&mut self, id: impl Into<String>, rule: F) -> &mut Self
    where
        F: Fn(&RuleInput<'_>) -> Result<bool, RuleError> + Send + Sync + 'static,
    {
        self.insert(id, Arc::new(rule));
        self
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluates the rule for `id`. A missing rule or a failing rule counts
    /// as not satisfied; failures are logged and never abort the caller's pass.
    pub fn is_satisfied(&self, id: &str, input: &RuleInput<'_>) -> bool {
        let Some(rule) = self.rules.get(id) else {
            trace!(unlock_id = %id, "no rule bound, skipping");
            return false;
        };

        match rule.evaluate(input) {
            Ok(satisfied) => satisfied,
            Err(err) => {
                warn!(unlock_id = %id, error = %err, "rule evaluation failed, treating as not satisfied");
                false
            }
        }
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.rules.keys().collect();
        ids.sort();
        f.debug_struct("RuleSet").field("ids", &ids).finish()
    }
}
