use {
    bevy::prelude::*,
    chrono::{DateTime, Days, NaiveDate, Utc},
    serde::{Deserialize, Serialize},
    std::collections::{BTreeMap, BTreeSet},
    unlocks_events::{PaymentStatus, Transaction, TransactionKind},
};

/// Identity established by the host's first-run setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub currency: String,
    pub created_on: NaiveDate,
}

/// Metadata stored alongside a granted achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub granted_at: DateTime<Utc>,
    /// True when granted through the operator entry point instead of a rule.
    #[serde(default)]
    pub forced: bool,
}

impl GrantRecord {
    pub fn now(forced: bool) -> Self {
        Self {
            granted_at: Utc::now(),
            forced,
        }
    }
}

/// Aggregates the rules read. Maintained by `ProgressState::record_transaction`
/// plus whatever the host writes directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressStats {
    pub income_count: u32,
    pub expense_count: u32,
    pub total_income: f64,
    pub total_expense: f64,
    pub paid_count: u32,
    pub pending_count: u32,
    pub category_counts: BTreeMap<String, u32>,
    pub active_days: BTreeSet<NaiveDate>,
    pub budgets_created: u32,
    /// Host-maintained named counters.
    pub counters: BTreeMap<String, f64>,
}

impl ProgressStats {
    pub fn transaction_count(&self) -> u32 {
        self.income_count + self.expense_count
    }

    pub fn balance(&self) -> f64 {
        self.total_income - self.total_expense
    }

    /// Consecutive active days ending at the most recent active day.
    pub fn current_streak(&self) -> u32 {
        let mut days = self.active_days.iter().rev();
        let Some(&latest) = days.next() else {
            return 0;
        };

        let mut streak = 1;
        let mut expected = latest.checked_sub_days(Days::new(1));
        for &day in days {
            if Some(day) != expected {
                break;
            }
            streak += 1;
            expected = day.checked_sub_days(Days::new(1));
        }
        streak
    }

    /// Longest run of consecutive active days.
    pub fn longest_streak(&self) -> u32 {
        let mut longest = 0;
        let mut run = 0;
        let mut previous: Option<NaiveDate> = None;

        for &day in &self.active_days {
            let continues = previous.and_then(|p| p.checked_add_days(Days::new(1))) == Some(day);
            run = if continues { run + 1 } else { 1 };
            longest = longest.max(run);
            previous = Some(day);
        }
        longest
    }
}

/// Persistent state tracking the user's progress and everything granted so far.
///
/// Owned by the host; the unlock engine only reads aggregates and inserts
/// grants. An id, once granted, stays granted.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    #[serde(default)]
    pub profile: Option<Profile>,
    /// Granted achievement ids with grant metadata.
    #[serde(default)]
    pub achievements: BTreeMap<String, GrantRecord>,
    /// Granted card ids in grant order.
    #[serde(default)]
    pub cards: Vec<String>,
    #[serde(default)]
    pub stats: ProgressStats,
    #[serde(default)]
    pub opened_views: BTreeSet<String>,
    #[serde(default)]
    pub onboarding_completed: bool,
}

impl ProgressState {
    /// False until the host's initial setup produced a profile.
    pub fn has_identity(&self) -> bool {
        self.profile.is_some()
    }

    pub fn is_achievement_granted(&self, id: &str) -> bool {
        self.achievements.contains_key(id)
    }

    pub fn is_card_granted(&self, id: &str) -> bool {
        self.cards.iter().any(|card| card == id)
    }

    pub fn is_granted(&self, id: &str) -> bool {
        self.is_achievement_granted(id) || self.is_card_granted(id)
    }

    /// Returns false if the achievement was already granted.
    pub fn insert_achievement(&mut self, id: &str, record: GrantRecord) -> bool {
        if self.is_achievement_granted(id) {
            return false;
        }
        self.achievements.insert(id.to_string(), record);
        true
    }

    /// Returns false if the card was already granted.
    pub fn insert_card(&mut self, id: &str) -> bool {
        if self.is_card_granted(id) {
            return false;
        }
        self.cards.push(id.to_string());
        true
    }

    /// Drops a staged achievement grant whose persistence failed.
    pub fn revert_achievement(&mut self, id: &str) {
        self.achievements.remove(id);
    }

    /// Drops a staged card grant whose persistence failed.
    pub fn revert_card(&mut self, id: &str) {
        if let Some(position) = self.cards.iter().rposition(|card| card == id) {
            self.cards.remove(position);
        }
    }

    /// Folds a new ledger entry into the aggregates.
    pub fn record_transaction(&mut self, tx: &Transaction) {
        let stats = &mut self.stats;
        match tx.kind {
            TransactionKind::Income => {
                stats.income_count += 1;
                stats.total_income += tx.amount;
            }
            TransactionKind::Expense => {
                stats.expense_count += 1;
                stats.total_expense += tx.amount;
            }
        }
        match tx.status {
            PaymentStatus::Paid => stats.paid_count += 1,
            PaymentStatus::Pending => stats.pending_count += 1,
        }
        *stats.category_counts.entry(tx.category.clone()).or_default() += 1;
        stats.active_days.insert(tx.date);
    }

    /// Returns true the first time a view is recorded.
    pub fn record_view(&mut self, view: &str) -> bool {
        self.opened_views.insert(view.to_string())
    }

    pub fn complete_onboarding(&mut self, profile: Profile) {
        self.profile = Some(profile);
        self.onboarding_completed = true;
    }

    pub fn bump_counter(&mut self, name: &str, by: f64) {
        *self.stats.counters.entry(name.to_string()).or_default() += by;
    }
}

/// Ordered history of recorded transactions, read by history-aware card rules.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionLog {
    pub entries: Vec<Transaction>,
}

impl TransactionLog {
    pub fn push(&mut self, tx: Transaction) {
        self.entries.push(tx);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counts entries matching the optional kind and category filters.
    pub fn count_matching(&self, kind: Option<TransactionKind>, category: Option<&str>) -> usize {
        self.iter()
            .filter(|tx| kind.is_none_or(|kind| tx.kind == kind))
            .filter(|tx| category.is_none_or(|category| tx.category == category))
            .count()
    }
}
