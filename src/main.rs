use {
    bevy::{app::ScheduleRunnerPlugin, log::LogPlugin, prelude::*},
    save_load::{RonFileStore, SaveLoadPlugin, SaveProgress},
    serde::Deserialize,
    std::{collections::VecDeque, fs, time::Duration},
    unlocks::{
        CatalogInstalled, GrantPersistFailed, MemoryStore, RuleInput, RuleSet, UnlockCatalogPlugin,
        UnlockEngine, UnlockGranted, UnlocksPlugin,
    },
    unlocks_events::{DomainEvent, ForceGrant, ProgressChanged, SystemSignal, Transaction, ViewOpened},
    unlocks_resources::{Profile, ProgressState, TransactionLog},
};

const DEMO_IMPORT: &str = "assets/demo/import.ron";

fn main() -> AppExit {
    App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1.0 / 60.0,
            ))),
        )
        .add_plugins(LogPlugin {
            filter: "error,fortune_ledger=info,\
                unlocks=debug,\
                unlocks_assets=debug,\
                save_load=debug"
                .into(),
            level: bevy::log::Level::TRACE,
            ..Default::default()
        })
        .add_plugins(AssetPlugin::default())
        .add_plugins(UnlocksPlugin)
        .add_plugins(UnlockCatalogPlugin::default())
        .add_plugins(SaveLoadPlugin::default())
        .init_resource::<DemoImport>()
        .add_systems(Startup, restore_progress)
        .add_systems(Update, replay_demo_step)
        .add_observer(start_demo_import)
        .add_observer(announce_grant)
        .add_observer(announce_failure)
        .run()
}

/// Host rules that are easier to write in code than as catalog conditions.
fn host_rules() -> RuleSet {
    let mut rules = RuleSet::new();
    rules.register("round_number", |input: &RuleInput<'_>| {
        Ok(input
            .event
            .transaction()
            .is_some_and(|tx| tx.amount >= 100.0 && tx.amount % 100.0 == 0.0))
    });
    rules
}

/// Loads saved progress and builds the engine around the file store.
fn restore_progress(mut commands: Commands, mut exit: MessageWriter<AppExit>) {
    let store = RonFileStore::default();
    match store.load() {
        Ok(state) => {
            commands.insert_resource(state);
            commands.insert_resource(UnlockEngine::new(store).with_rules(host_rules()));
        }
        Err(err) => {
            error!(path = %store.path().display(), error = %err, "Refusing to overwrite unreadable progress");
            commands.insert_resource(UnlockEngine::new(MemoryStore::new()).with_rules(host_rules()));
            exit.write(AppExit::error());
        }
    }
}

/// One line of the demo import script.
#[derive(Debug, Deserialize)]
enum DemoStep {
    Onboard(Profile),
    OpenView(String),
    Record(Transaction),
    CreateBudget,
    ForceGrant(String),
}

#[derive(Resource, Default)]
struct DemoImport {
    steps: VecDeque<DemoStep>,
    running: bool,
}

fn start_demo_import(trigger: On<CatalogInstalled>, mut import: ResMut<DemoImport>) {
    let installed = trigger.event();
    info!(
        unlockables = installed.unlockables,
        backlog = installed.backlog,
        "Catalog ready, replaying demo import"
    );

    let steps = fs::read_to_string(DEMO_IMPORT)
        .map_err(|err| err.to_string())
        .and_then(|text| ron::from_str::<Vec<DemoStep>>(&text).map_err(|err| err.to_string()));
    match steps {
        Ok(steps) => import.steps = steps.into(),
        Err(err) => error!(path = DEMO_IMPORT, error = %err, "Could not read demo import"),
    }
    import.running = true;
}

/// Applies one step per frame so every event is fully handled before the next.
fn replay_demo_step(
    mut import: ResMut<DemoImport>,
    mut state: ResMut<ProgressState>,
    mut history: ResMut<TransactionLog>,
    mut commands: Commands,
    mut exit: MessageWriter<AppExit>,
) {
    if !import.running {
        return;
    }
    let Some(step) = import.steps.pop_front() else {
        info!(
            achievements = state.achievements.len(),
            cards = state.cards.len(),
            "Demo import finished"
        );
        import.running = false;
        commands.trigger(SaveProgress);
        exit.write(AppExit::Success);
        return;
    };

    debug!(?step, "Replaying");
    match step {
        DemoStep::Onboard(profile) => {
            info!(name = %profile.name, "Onboarding completed");
            state.complete_onboarding(profile);
            commands.trigger(ProgressChanged {
                event: SystemSignal::OnboardingCompleted.into(),
            });
        }
        DemoStep::OpenView(view) => {
            commands.trigger(ViewOpened { view });
        }
        DemoStep::Record(tx) => {
            state.record_transaction(&tx);
            history.push(tx.clone());
            commands.trigger(ProgressChanged { event: tx.into() });
        }
        DemoStep::CreateBudget => {
            state.stats.budgets_created += 1;
            commands.trigger(ProgressChanged {
                event: DomainEvent::NEUTRAL,
            });
        }
        DemoStep::ForceGrant(id) => {
            commands.trigger(ForceGrant { id });
        }
    }
}

fn announce_grant(trigger: On<UnlockGranted>) {
    let definition = &trigger.event().definition;
    info!(
        unlock_id = %definition.id,
        rarity = ?definition.rarity,
        reward = %definition.reward,
        "Unlocked {}",
        definition.label()
    );
}

fn announce_failure(trigger: On<GrantPersistFailed>) {
    let failed = trigger.event();
    warn!(unlock_id = %failed.unlock_id, reason = %failed.reason, "Unlock will be retried on the next event");
}
