use {
    crate::{engine::UnlockEngine, error::UnlockError, events::*},
    bevy::prelude::*,
    unlocks_assets::{UnlockCatalog, UnlockCatalogAsset},
    unlocks_events::{DomainEvent, ForceGrant, ProgressChanged, ViewOpened},
    unlocks_resources::{ProgressState, TransactionLog},
};

/// Where the catalog asset lives and whether it has been installed yet.
#[derive(Resource)]
pub struct CatalogSource {
    pub path: String,
    handle: Option<Handle<UnlockCatalogAsset>>,
    installed: bool,
}

impl CatalogSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            handle: None,
            installed: false,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

/// Startup system that starts loading the catalog asset.
pub fn request_catalog(asset_server: Res<AssetServer>, mut source: ResMut<CatalogSource>) {
    debug!(path = %source.path, "Requesting unlock catalog");
    let handle = asset_server.load(source.path.clone());
    source.handle = Some(handle);
}

/// System that installs the catalog into the engine once the asset is loaded.
pub fn install_loaded_catalog(
    mut source: ResMut<CatalogSource>,
    assets: Res<Assets<UnlockCatalogAsset>>,
    mut engine: ResMut<UnlockEngine>,
    state: Res<ProgressState>,
    history: Res<TransactionLog>,
    mut commands: Commands,
) {
    if source.installed {
        return;
    }
    let Some(asset) = source.handle.as_ref().and_then(|handle| assets.get(handle)) else {
        return;
    };
    let asset = asset.clone();
    source.installed = true;

    match UnlockCatalog::from_asset(asset) {
        Ok(catalog) => {
            let unlockables = catalog.len();
            let backlog = engine.load_catalog(catalog, &state, &history);
            info!(unlockables, backlog, "Unlock catalog installed");
            commands.trigger(CatalogInstalled {
                unlockables,
                backlog,
            });
        }
        Err(err) => {
            error!(path = %source.path, error = %err, "Invalid unlock catalog, nothing can unlock");
        }
    }
}

/// Observer on the "state changed" channel.
///
/// Runs the achievement sweep and then the card drop. The two paths report
/// independently, so a failed achievement save does not hold back the card.
pub fn on_progress_changed(
    trigger: On<ProgressChanged>,
    mut engine: ResMut<UnlockEngine>,
    mut state: ResMut<ProgressState>,
    history: Res<TransactionLog>,
    mut commands: Commands,
) {
    let event = &trigger.event().event;
    trace!(?event, "progress changed, evaluating unlocks");

    let swept = engine.sweep(event, &mut state);
    report_grants(&engine, swept, &mut commands);

    let dropped = engine
        .select_grant(event, &mut state, &history)
        .map(|card| card.into_iter().collect());
    report_grants(&engine, dropped, &mut commands);
}

/// Observer that records an opened view and re-checks state-only rules.
pub fn on_view_opened(
    trigger: On<ViewOpened>,
    mut state: ResMut<ProgressState>,
    mut commands: Commands,
) {
    let view = &trigger.event().view;
    if !state.record_view(view) {
        return;
    }

    debug!(%view, "view opened for the first time, re-checking unlocks");
    commands.trigger(ProgressChanged {
        event: DomainEvent::NEUTRAL,
    });
}

/// Observer for the operator/test force-grant entry point.
pub fn on_force_grant(
    trigger: On<ForceGrant>,
    mut engine: ResMut<UnlockEngine>,
    mut state: ResMut<ProgressState>,
    mut commands: Commands,
) {
    let id = &trigger.event().id;
    let result = engine
        .force_grant(id, &mut state)
        .map(|granted| if granted { vec![id.clone()] } else { Vec::new() });
    report_grants(&engine, result, &mut commands);
}

/// Signals persisted grants outward and reports failures.
fn report_grants(
    engine: &UnlockEngine,
    result: Result<Vec<String>, UnlockError>,
    commands: &mut Commands,
) {
    let granted = match result {
        Ok(granted) => granted,
        Err(UnlockError::Persistence {
            id,
            granted,
            source,
        }) => {
            error!(unlock_id = %id, error = %source, "Grant could not be persisted");
            commands.trigger(GrantPersistFailed {
                unlock_id: id,
                reason: source.to_string(),
            });
            granted
        }
        Err(err) => {
            warn!(error = %err, "Unlock request rejected");
            return;
        }
    };

    for id in granted {
        let Some(definition) = engine.catalog().get(&id) else {
            continue;
        };
        commands.trigger(UnlockGranted {
            definition: definition.clone(),
        });
    }
}
