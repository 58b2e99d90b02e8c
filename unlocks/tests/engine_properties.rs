mod common;

use {
    common::*,
    unlocks::*,
    unlocks_assets::*,
    unlocks_events::*,
    unlocks_resources::*,
};

fn engine_with(
    definitions: Vec<UnlockableDefinition>,
    welcome: Option<&str>,
    rules: RuleSet,
    state: &ProgressState,
) -> UnlockEngine {
    let catalog = UnlockCatalog::new(definitions, welcome.map(str::to_string)).unwrap();
    let mut engine = UnlockEngine::new(MemoryStore::new()).with_rules(rules);
    engine.load_catalog(catalog, state, &TransactionLog::default());
    engine
}

fn tiers() -> Vec<UnlockableDefinition> {
    [1.0, 5.0, 10.0, 25.0, 50.0]
        .into_iter()
        .map(|target| achievement(&format!("expenses_{target}"), "tracking", expenses_at_least(target)))
        .collect()
}

#[test]
fn granting_twice_grants_once() {
    let store = MemoryStore::new();
    let catalog =
        UnlockCatalog::new(vec![card("welcome", Rarity::Common, ConditionNode::True, vec![])], None)
            .unwrap();
    let mut state = profiled_state();
    let mut engine = UnlockEngine::new(store.clone());
    engine.load_catalog(catalog, &state, &TransactionLog::default());

    assert!(engine.force_grant("welcome", &mut state).unwrap());
    let after_first = state.clone();
    assert!(!engine.force_grant("welcome", &mut state).unwrap());

    assert_eq!(state, after_first);
    assert_eq!(state.cards, ["welcome"]);
    assert_eq!(store.saves(), 1);
}

#[test]
fn at_most_one_card_per_event() {
    let mut state = profiled_state();
    let mut engine = engine_with(
        vec![
            card("coffee_1", Rarity::Common, expenses_at_least(1.0), vec![]),
            card("coffee_2", Rarity::Rare, expenses_at_least(1.0), vec![]),
            card("coffee_3", Rarity::Epic, expenses_at_least(1.0), vec![]),
            card("coffee_4", Rarity::Uncommon, expenses_at_least(1.0), vec![]),
        ],
        None,
        RuleSet::new(),
        &state,
    );
    let history = TransactionLog::default();

    let event = expense("coffee", 3.2);
    state.record_transaction(event.transaction().unwrap());
    let granted = engine.select_grant(&event, &mut state, &history).unwrap();

    assert_eq!(granted.as_deref(), Some("coffee_3"));
    assert_eq!(state.cards.len(), 1);

    // The rest queue up and surface one per later event.
    let next = engine.select_grant(&event, &mut state, &history).unwrap();
    assert_eq!(next.as_deref(), Some("coffee_2"));
    assert_eq!(state.cards.len(), 2);
}

#[test]
fn novel_card_beats_cached_higher_rarity() {
    let mut state = profiled_state();
    let mut engine = engine_with(
        vec![
            card("backlog_legend", Rarity::Legendary, ConditionNode::True, vec![TriggerTag::Always]),
            card("fresh_common", Rarity::Common, expenses_at_least(1.0), vec![]),
        ],
        None,
        RuleSet::new(),
        &state,
    );
    assert!(engine.cache().contains("backlog_legend"));
    assert!(!engine.cache().contains("fresh_common"));

    let event = expense("groceries", 40.0);
    state.record_transaction(event.transaction().unwrap());
    let granted = engine
        .select_grant(&event, &mut state, &TransactionLog::default())
        .unwrap();

    assert_eq!(granted.as_deref(), Some("fresh_common"));
    // Yesterday's novelty is today's backlog.
    assert!(engine.cache().contains("fresh_common"));
}

#[test]
fn higher_rarity_wins_among_novel_cards() {
    let mut state = profiled_state();
    let mut engine = engine_with(
        vec![
            card("rare", Rarity::Rare, expenses_at_least(1.0), vec![]),
            card("epic", Rarity::Epic, expenses_at_least(1.0), vec![]),
        ],
        None,
        RuleSet::new(),
        &state,
    );

    let event = expense("travel", 300.0);
    state.record_transaction(event.transaction().unwrap());
    let ranked: Vec<_> = engine
        .preview_cards(&event, &state, &TransactionLog::default())
        .iter()
        .map(|card| (card.definition.id.clone(), card.novel))
        .collect();
    assert_eq!(
        ranked,
        [("epic".to_string(), true), ("rare".to_string(), true)]
    );

    let granted = engine
        .select_grant(&event, &mut state, &TransactionLog::default())
        .unwrap();
    assert_eq!(granted.as_deref(), Some("epic"));
}

#[test]
fn welcome_card_overrides_novelty_and_rarity() {
    let mut state = profiled_state();
    let mut engine = engine_with(
        vec![
            card(
                "legend",
                Rarity::Legendary,
                ConditionNode::Signal(SystemSignal::OnboardingCompleted),
                vec![TriggerTag::Onboarding],
            ),
            card("welcome", Rarity::Common, ConditionNode::True, vec![TriggerTag::Always]),
        ],
        Some("welcome"),
        RuleSet::new(),
        &state,
    );
    // Welcome is backlog after warm-up; legend becomes novel on onboarding.
    assert!(engine.cache().contains("welcome"));

    let granted = engine
        .select_grant(&onboarding(), &mut state, &TransactionLog::default())
        .unwrap();
    assert_eq!(granted.as_deref(), Some("welcome"));
}

#[test]
fn warm_up_suppresses_cold_start_novelty() {
    let mut state = profiled_state();
    state.stats.expense_count = 12;
    let history = TransactionLog::default();

    let catalog = UnlockCatalog::new(
        vec![
            card("ten_expenses", Rarity::Uncommon, expenses_at_least(10.0), vec![]),
            card("five_expenses", Rarity::Common, expenses_at_least(5.0), vec![]),
            card("one_expense", Rarity::Rare, expenses_at_least(1.0), vec![]),
            card("hundred_expenses", Rarity::Legendary, expenses_at_least(100.0), vec![]),
            card(
                "operator_gift",
                Rarity::Epic,
                ConditionNode::True,
                vec![TriggerTag::Manual],
            ),
        ],
        None,
    )
    .unwrap();
    let mut engine = UnlockEngine::new(MemoryStore::new());
    let backlog = engine.load_catalog(catalog, &state, &history);

    assert_eq!(backlog, 3);
    assert!(!engine.cache().contains("operator_gift"));

    let event = expense("coffee", 2.0);
    let preview = engine.preview_cards(&event, &state, &history);
    assert_eq!(preview.len(), 3);
    assert!(preview.iter().all(|card| !card.novel));

    // With no novelty, the backlog drains by rarity.
    let granted = engine.select_grant(&event, &mut state, &history).unwrap();
    assert_eq!(granted.as_deref(), Some("one_expense"));
}

#[test]
fn sweep_grants_every_crossed_tier() {
    let mut state = profiled_state();
    let mut engine = engine_with(tiers(), None, RuleSet::new(), &state);

    // A bulk import jumps straight past every threshold.
    state.stats.expense_count = 60;
    let granted = engine.sweep(&DomainEvent::NEUTRAL, &mut state).unwrap();

    assert_eq!(
        granted,
        [
            "expenses_1",
            "expenses_5",
            "expenses_10",
            "expenses_25",
            "expenses_50"
        ]
    );
    assert_eq!(state.achievements.len(), 5);

    // Nothing left to grant on the next event.
    assert!(engine.sweep(&DomainEvent::NEUTRAL, &mut state).unwrap().is_empty());
}

#[test]
fn sweep_requires_an_identity() {
    let mut state = ProgressState::default();
    state.stats.expense_count = 60;
    let mut engine = engine_with(tiers(), None, RuleSet::new(), &state);

    let granted = engine.sweep(&expense("rent", 900.0), &mut state).unwrap();
    assert!(granted.is_empty());
    assert!(state.achievements.is_empty());
}

#[test]
fn filtered_card_rule_is_never_invoked() {
    let mut rules = RuleSet::new();
    rules.register("payday", |input: &RuleInput<'_>| {
        assert_ne!(
            input.event.kind(),
            Some(TransactionKind::Expense),
            "income-only rule evaluated for an expense"
        );
        Ok(input.event.kind() == Some(TransactionKind::Income))
    });

    let mut state = profiled_state();
    let mut engine = engine_with(
        vec![card(
            "payday",
            Rarity::Rare,
            ConditionNode::True,
            vec![TriggerTag::Kind(TransactionKind::Income)],
        )],
        None,
        rules,
        &state,
    );

    let event = expense("salary", 2000.0);
    assert!(!engine.is_relevant("payday", &event));
    let granted = engine
        .select_grant(&event, &mut state, &TransactionLog::default())
        .unwrap();
    assert_eq!(granted, None);
}

#[test]
fn capstone_lands_with_its_last_prerequisite() {
    let mut state = profiled_state();
    let mut engine = engine_with(
        vec![
            capstone("tracking_master", "tracking"),
            achievement("first_expense", "tracking", expenses_at_least(1.0)),
            achievement("ten_expenses", "tracking", expenses_at_least(10.0)),
            achievement("first_income", "earning", ConditionNode::Stat {
                stat: Stat::IncomeCount,
                op: ComparisonOp::Ge,
                target: 1.0,
            }),
        ],
        None,
        RuleSet::new(),
        &state,
    );

    state.stats.expense_count = 1;
    let granted = engine.sweep(&expense("coffee", 3.0), &mut state).unwrap();
    assert_eq!(granted, ["first_expense"]);

    state.stats.expense_count = 10;
    let granted = engine.sweep(&expense("coffee", 3.0), &mut state).unwrap();
    assert_eq!(granted, ["ten_expenses", "tracking_master"]);
    assert!(!state.is_achievement_granted("first_income"));
}

#[test]
fn failing_rule_does_not_block_later_rules() {
    let mut rules = RuleSet::new();
    rules.register("broken", |_: &RuleInput<'_>| {
        Err(RuleError::Failed("division by zero".to_string()))
    });

    let mut state = profiled_state();
    state.stats.expense_count = 3;
    let mut engine = engine_with(
        vec![
            achievement("broken", "misc", ConditionNode::True),
            achievement("first_expense", "tracking", expenses_at_least(1.0)),
        ],
        None,
        rules,
        &state,
    );

    let granted = engine.sweep(&expense("coffee", 3.0), &mut state).unwrap();
    assert_eq!(granted, ["first_expense"]);
    assert!(!state.is_achievement_granted("broken"));
}

#[test]
fn failed_persistence_rolls_back_and_reports_earlier_grants() {
    let store = FlakyStore::default();
    let mut state = profiled_state();
    let catalog = UnlockCatalog::new(tiers(), None).unwrap();
    let mut engine = UnlockEngine::new(store.clone());
    engine.load_catalog(catalog, &state, &TransactionLog::default());

    state.stats.expense_count = 5;
    store.set_failing(true);
    let err = engine.sweep(&DomainEvent::NEUTRAL, &mut state).unwrap_err();
    match err {
        UnlockError::Persistence { id, granted, .. } => {
            assert_eq!(id, "expenses_1");
            assert!(granted.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(state.achievements.is_empty());

    // Once the store recovers, the same state grants normally.
    store.set_failing(false);
    let granted = engine.sweep(&DomainEvent::NEUTRAL, &mut state).unwrap();
    assert_eq!(granted, ["expenses_1", "expenses_5"]);
}

#[test]
fn handle_event_runs_both_paths() {
    let mut state = profiled_state();
    let mut engine = engine_with(
        vec![
            achievement("first_expense", "tracking", expenses_at_least(1.0)),
            card("first_receipt", Rarity::Common, expenses_at_least(1.0), vec![
                TriggerTag::Kind(TransactionKind::Expense),
            ]),
        ],
        None,
        RuleSet::new(),
        &state,
    );

    let event = expense("coffee", 3.0);
    let mut history = TransactionLog::default();
    state.record_transaction(event.transaction().unwrap());
    history.push(event.transaction().unwrap().clone());

    let granted = engine.handle_event(&event, &mut state, &history).unwrap();
    assert_eq!(granted, ["first_expense", "first_receipt"]);
}

#[test]
fn handle_event_drops_card_after_failed_achievement_save() {
    let store = FlakyStore::default();
    let mut state = profiled_state();
    let catalog = UnlockCatalog::new(
        vec![
            achievement("first_expense", "tracking", expenses_at_least(1.0)),
            achievement("any_transaction", "tracking", ConditionNode::Stat {
                stat: Stat::TransactionCount,
                op: ComparisonOp::Ge,
                target: 1.0,
            }),
            card("first_receipt", Rarity::Common, expenses_at_least(1.0), vec![]),
        ],
        None,
    )
    .unwrap();
    let mut engine = UnlockEngine::new(store.clone());
    engine.load_catalog(catalog, &state, &TransactionLog::default());

    let event = expense("coffee", 3.0);
    let mut history = TransactionLog::default();
    state.record_transaction(event.transaction().unwrap());
    history.push(event.transaction().unwrap().clone());

    store.fail_next(1);
    let err = engine
        .handle_event(&event, &mut state, &history)
        .unwrap_err();
    match err {
        UnlockError::Persistence { id, granted, .. } => {
            assert_eq!(id, "first_expense");
            assert_eq!(granted, ["first_receipt"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(state.cards, ["first_receipt"]);
    assert!(!state.is_achievement_granted("first_expense"));
    // The sweep stops at its first failed save.
    assert!(!state.is_achievement_granted("any_transaction"));

    // Both achievements land on the next event.
    let granted = engine.handle_event(&event, &mut state, &history).unwrap();
    assert_eq!(granted, ["first_expense", "any_transaction"]);
}

#[test]
fn force_grant_rejects_unknown_ids() {
    let mut state = profiled_state();
    let mut engine = engine_with(tiers(), None, RuleSet::new(), &state);

    let err = engine.force_grant("nope", &mut state).unwrap_err();
    assert!(matches!(err, UnlockError::Unknown(id) if id == "nope"));

    assert!(engine.force_grant("expenses_50", &mut state).unwrap());
    assert!(state.achievements["expenses_50"].forced);
}
