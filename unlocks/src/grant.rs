//! The single funnel every grant goes through.

use {
    bevy::prelude::*,
    std::sync::{Arc, Mutex},
    thiserror::Error,
    unlocks_assets::{UnlockKind, UnlockableDefinition},
    unlocks_resources::{GrantRecord, ProgressState},
};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to serialize progress: {0}")]
    Serialize(String),
    #[error("failed to write progress: {0}")]
    Io(#[from] std::io::Error),
    #[error("progress store unavailable: {0}")]
    Unavailable(String),
}

/// Injected save operation. Must tolerate being called once per grant.
pub trait ProgressStore: Send + Sync {
    fn save(&mut self, state: &ProgressState) -> Result<(), PersistenceError>;
}

/// Store that keeps the last saved snapshot in memory.
///
/// Clones share the same snapshot, so a host can keep one handle while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemorySnapshot>>,
}

#[derive(Debug, Default)]
struct MemorySnapshot {
    saves: usize,
    last: Option<ProgressState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far.
    pub fn saves(&self) -> usize {
        self.inner.lock().map_or(0, |snapshot| snapshot.saves)
    }

    pub fn last_saved(&self) -> Option<ProgressState> {
        self.inner
            .lock()
            .ok()
            .and_then(|snapshot| snapshot.last.clone())
    }
}

impl ProgressStore for MemoryStore {
    fn save(&mut self, state: &ProgressState) -> Result<(), PersistenceError> {
        let mut snapshot = self
            .inner
            .lock()
            .map_err(|err| PersistenceError::Unavailable(err.to_string()))?;
        snapshot.saves += 1;
        snapshot.last = Some(state.clone());
        Ok(())
    }
}

/// Grants `definition` on `state` and persists it.
///
/// Returns `Ok(false)` without touching the store when already granted. The
/// insert is staged: if the save fails it is reverted and the error returned,
/// so a caller never signals an unlock that did not reach the store.
pub fn grant(
    definition: &UnlockableDefinition,
    state: &mut ProgressState,
    store: &mut dyn ProgressStore,
    forced: bool,
) -> Result<bool, PersistenceError> {
    let id = definition.id.as_str();
    let staged = match definition.kind {
        UnlockKind::Achievement { .. } => state.insert_achievement(id, GrantRecord::now(forced)),
        UnlockKind::Card { .. } => state.insert_card(id),
    };

    if !staged {
        trace!(unlock_id = %id, "already granted, skipping");
        return Ok(false);
    }

    if let Err(err) = store.save(state) {
        error!(unlock_id = %id, error = %err, "failed to persist grant, reverting");
        match definition.kind {
            UnlockKind::Achievement { .. } => state.revert_achievement(id),
            UnlockKind::Card { .. } => state.revert_card(id),
        }
        return Err(err);
    }

    info!(unlock_id = %id, rarity = ?definition.rarity, forced, "Unlock granted");
    Ok(true)
}
