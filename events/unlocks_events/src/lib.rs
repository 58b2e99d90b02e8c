use {
    bevy::prelude::*,
    chrono::NaiveDate,
    serde::{Deserialize, Serialize},
};

/// Direction of money movement for a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Income,
    Expense,
}

/// Settlement state of a ledger entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    Paid,
    Pending,
}

/// A single ledger entry as recorded by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TransactionKind,
    /// Free-form category name (e.g. "groceries", "salary").
    pub category: String,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub status: PaymentStatus,
}

/// Lifecycle signals that let state-only rules run without a real transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemSignal {
    /// The user finished the first-run setup.
    OnboardingCompleted,
    /// Neutral re-check; carries no transaction data.
    Check,
}

/// The immutable occurrence the unlock engine evaluates against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainEvent {
    Transaction(Transaction),
    Signal(SystemSignal),
}

impl DomainEvent {
    /// Event used for warm-up passes and state-only re-checks.
    pub const NEUTRAL: DomainEvent = DomainEvent::Signal(SystemSignal::Check);

    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            DomainEvent::Transaction(tx) => Some(tx),
            DomainEvent::Signal(_) => None,
        }
    }

    pub fn kind(&self) -> Option<TransactionKind> {
        self.transaction().map(|tx| tx.kind)
    }

    pub fn category(&self) -> Option<&str> {
        self.transaction().map(|tx| tx.category.as_str())
    }

    pub fn signal(&self) -> Option<SystemSignal> {
        match self {
            DomainEvent::Signal(signal) => Some(*signal),
            DomainEvent::Transaction(_) => None,
        }
    }
}

impl From<Transaction> for DomainEvent {
    fn from(tx: Transaction) -> Self {
        DomainEvent::Transaction(tx)
    }
}

impl From<SystemSignal> for DomainEvent {
    fn from(signal: SystemSignal) -> Self {
        DomainEvent::Signal(signal)
    }
}

/// Published by the host after it has applied `event` to `ProgressState`.
///
/// This **Observer** event is the "state changed" channel of the unlock engine.
///
/// # Observers
/// - `unlocks::on_progress_changed`: grants every newly satisfied achievement,
///   then at most one collectible card.
#[derive(Event, Debug, Clone)]
pub struct ProgressChanged {
    pub event: DomainEvent,
}

/// Published by the host when the user navigates to a view.
///
/// The unlock engine records the view on `ProgressState` and re-evaluates
/// with a neutral check so view-based rules can fire.
#[derive(Event, Debug, Clone)]
pub struct ViewOpened {
    pub view: String,
}

/// Operator/test entry point that grants an unlockable without rule evaluation.
#[derive(Event, Debug, Clone)]
pub struct ForceGrant {
    pub id: String,
}
