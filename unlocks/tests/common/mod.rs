#![allow(dead_code)]

use {
    chrono::NaiveDate,
    std::sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    unlocks::{PersistenceError, ProgressStore},
    unlocks_assets::*,
    unlocks_events::*,
    unlocks_resources::*,
};

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
}

pub fn tx(kind: TransactionKind, category: &str, amount: f64) -> Transaction {
    Transaction {
        kind,
        category: category.to_string(),
        amount,
        date: day(1),
        status: PaymentStatus::Paid,
    }
}

pub fn expense(category: &str, amount: f64) -> DomainEvent {
    tx(TransactionKind::Expense, category, amount).into()
}

pub fn income(category: &str, amount: f64) -> DomainEvent {
    tx(TransactionKind::Income, category, amount).into()
}

pub fn onboarding() -> DomainEvent {
    SystemSignal::OnboardingCompleted.into()
}

/// State with an established profile.
pub fn profiled_state() -> ProgressState {
    let mut state = ProgressState::default();
    state.complete_onboarding(Profile {
        name: "Ada".to_string(),
        currency: "EUR".to_string(),
        created_on: day(1),
    });
    state
}

pub fn expenses_at_least(count: f64) -> ConditionNode {
    ConditionNode::Stat {
        stat: Stat::ExpenseCount,
        op: ComparisonOp::Ge,
        target: count,
    }
}

pub fn achievement(id: &str, category: &str, condition: ConditionNode) -> UnlockableDefinition {
    UnlockableDefinition {
        id: id.to_string(),
        display_name: Some(id.replace('_', " ")),
        description: None,
        rarity: Rarity::Common,
        reward: format!("badge:{id}"),
        kind: UnlockKind::Achievement {
            category: category.to_string(),
            capstone: false,
        },
        condition: Some(condition),
        triggers: Vec::new(),
    }
}

pub fn capstone(id: &str, category: &str) -> UnlockableDefinition {
    UnlockableDefinition {
        kind: UnlockKind::Achievement {
            category: category.to_string(),
            capstone: true,
        },
        condition: None,
        ..achievement(id, category, ConditionNode::True)
    }
}

pub fn card(
    id: &str,
    rarity: Rarity,
    condition: ConditionNode,
    triggers: Vec<TriggerTag>,
) -> UnlockableDefinition {
    UnlockableDefinition {
        id: id.to_string(),
        display_name: None,
        description: None,
        rarity,
        reward: format!("card:{id}"),
        kind: UnlockKind::Card {
            series: "ledger".to_string(),
        },
        condition: Some(condition),
        triggers,
    }
}

/// Store whose saves can be switched to fail from the outside.
#[derive(Clone, Default)]
pub struct FlakyStore {
    failing: Arc<AtomicBool>,
    failures_left: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Rejects only the next `count` saves.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }
}

impl ProgressStore for FlakyStore {
    fn save(&mut self, _state: &ProgressState) -> Result<(), PersistenceError> {
        let one_off = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if one_off || self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}
