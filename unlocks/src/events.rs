use {bevy::prelude::*, unlocks_assets::UnlockableDefinition};

/// Fired globally for every grant, strictly after it was persisted.
///
/// The engine does not wait on observers of this event; presentation
/// (toasts, animations, reward hand-out) is entirely theirs.
#[derive(Event, Debug, Clone)]
pub struct UnlockGranted {
    pub definition: UnlockableDefinition,
}

/// Fired when a grant was rolled back because the store rejected the save.
#[derive(Event, Debug, Clone)]
pub struct GrantPersistFailed {
    pub unlock_id: String,
    pub reason: String,
}

/// Fired once the catalog asset has been validated and installed.
#[derive(Event, Debug, Clone)]
pub struct CatalogInstalled {
    pub unlockables: usize,
    /// Cards already satisfiable at install time (the warm-up backlog).
    pub backlog: usize,
}
