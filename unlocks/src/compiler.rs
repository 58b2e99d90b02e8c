//! Compiles catalog definitions into the runtime rule set.

use {
    crate::rules::{Rule, RuleError, RuleInput, RuleSet},
    bevy::prelude::*,
    std::sync::Arc,
    unlocks_assets::*,
    unlocks_resources::ProgressState,
};

/// Compares values using the specified operator.
pub fn compare_op(current: f64, target: f64, op: ComparisonOp) -> bool {
    match op {
        ComparisonOp::Ge => current >= target,
        ComparisonOp::Le => current <= target,
        ComparisonOp::Eq => (current - target).abs() < f64::EPSILON,
        ComparisonOp::Gt => current > target,
        ComparisonOp::Lt => current < target,
    }
}

/// Reads an aggregate from the progress state.
pub fn stat_value(stat: &Stat, state: &ProgressState) -> Result<f64, RuleError> {
    let stats = &state.stats;
    let value = match stat {
        Stat::TransactionCount => f64::from(stats.transaction_count()),
        Stat::IncomeCount => f64::from(stats.income_count),
        Stat::ExpenseCount => f64::from(stats.expense_count),
        Stat::TotalIncome => stats.total_income,
        Stat::TotalExpense => stats.total_expense,
        Stat::Balance => stats.balance(),
        Stat::PaidCount => f64::from(stats.paid_count),
        Stat::PendingCount => f64::from(stats.pending_count),
        Stat::CategoriesUsed => stats.category_counts.len() as f64,
        Stat::CategoryCount(category) => stats
            .category_counts
            .get(category)
            .map_or(0.0, |&count| f64::from(count)),
        Stat::ActiveDays => stats.active_days.len() as f64,
        Stat::CurrentStreak => f64::from(stats.current_streak()),
        Stat::LongestStreak => f64::from(stats.longest_streak()),
        Stat::BudgetsCreated => f64::from(stats.budgets_created),
        Stat::AchievementsGranted => state.achievements.len() as f64,
        Stat::CardsGranted => state.cards.len() as f64,
        Stat::Counter(name) => *stats
            .counters
            .get(name)
            .ok_or_else(|| RuleError::UnknownCounter(name.clone()))?,
    };
    Ok(value)
}

/// Recursively evaluates a condition tree.
pub fn evaluate_condition(node: &ConditionNode, input: &RuleInput<'_>) -> Result<bool, RuleError> {
    let event = input.event;
    let met = match node {
        ConditionNode::And(children) => {
            for child in children {
                if !evaluate_condition(child, input)? {
                    return Ok(false);
                }
            }
            true
        }
        ConditionNode::Or(children) => {
            for child in children {
                if evaluate_condition(child, input)? {
                    return Ok(true);
                }
            }
            false
        }
        ConditionNode::Not(child) => !evaluate_condition(child, input)?,
        ConditionNode::True => true,
        ConditionNode::Stat { stat, op, target } => {
            compare_op(stat_value(stat, input.state)?, *target, *op)
        }
        ConditionNode::ViewOpened(view) => input.state.opened_views.contains(view),
        ConditionNode::Granted(id) => input.state.is_granted(id),
        ConditionNode::EventKind(kind) => event.kind() == Some(*kind),
        ConditionNode::EventCategory(category) => event.category() == Some(category.as_str()),
        ConditionNode::EventAmount { op, target } => event
            .transaction()
            .is_some_and(|tx| compare_op(tx.amount, *target, *op)),
        ConditionNode::EventStatus(status) => {
            event.transaction().is_some_and(|tx| tx.status == *status)
        }
        ConditionNode::Signal(signal) => event.signal() == Some(*signal),
        ConditionNode::History {
            kind,
            category,
            op,
            target,
        } => {
            let history = input.history.ok_or(RuleError::HistoryUnavailable)?;
            let count = history.count_matching(*kind, category.as_deref());
            compare_op(count as f64, *target, *op)
        }
    };
    Ok(met)
}

/// Rule backed by a data-driven condition tree.
pub struct ConditionRule(pub ConditionNode);

impl Rule for ConditionRule {
    fn evaluate(&self, input: &RuleInput<'_>) -> Result<bool, RuleError> {
        evaluate_condition(&self.0, input)
    }
}

/// Satisfied once every listed prerequisite is granted. A capstone without
/// prerequisites never fires.
pub struct CapstoneRule {
    pub prerequisites: Vec<String>,
}

impl Rule for CapstoneRule {
    fn evaluate(&self, input: &RuleInput<'_>) -> Result<bool, RuleError> {
        Ok(!self.prerequisites.is_empty()
            && self
                .prerequisites
                .iter()
                .all(|id| input.state.is_achievement_granted(id)))
    }
}

/// Builds the rule set for `catalog`.
///
/// Precedence per id: host rule from `custom`, then the generated capstone
/// rule, then the definition's condition tree. Ids left without a rule are
/// logged once and never satisfiable.
pub fn compile_rules(catalog: &UnlockCatalog, custom: &RuleSet) -> RuleSet {
    let mut rules = RuleSet::new();

    for definition in catalog.iter() {
        let id = definition.id.as_str();

        if let Some(rule) = custom.get(id) {
            debug!(unlock_id = %id, "using host rule");
            rules.insert(id, Arc::clone(rule));
            continue;
        }

        if let Some(category) = definition.category()
            && definition.is_capstone()
        {
            let prerequisites: Vec<String> = catalog
                .prerequisites_of(category)
                .map(|prerequisite| prerequisite.id.clone())
                .collect();
            debug!(unlock_id = %id, %category, count = prerequisites.len(), "compiling capstone");
            rules.insert(id, Arc::new(CapstoneRule { prerequisites }));
            continue;
        }

        match &definition.condition {
            Some(condition) => {
                trace!(unlock_id = %id, "compiling condition tree");
                rules.insert(id, Arc::new(ConditionRule(condition.clone())));
            }
            None => {
                warn!(unlock_id = %id, "unlockable has no rule, it can never be granted automatically");
            }
        }
    }

    for id in custom_ids_outside(catalog, custom) {
        debug!(unlock_id = %id, "host rule has no catalog entry, ignoring");
    }

    rules
}

fn custom_ids_outside<'a>(catalog: &UnlockCatalog, custom: &'a RuleSet) -> Vec<&'a str> {
    let mut ids: Vec<&str> = custom
        .ids()
        .filter(|id| !catalog.contains(id))
        .collect();
    ids.sort_unstable();
    ids
}
