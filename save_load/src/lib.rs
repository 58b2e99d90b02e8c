//! Save/Load for the player's progress.
//!
//! This crate provides:
//! - `RonFileStore`, the file-backed `ProgressStore` handed to the unlock engine
//! - `load_progress` to restore the state on startup
//! - Automatic saves every 1 minute, so stats recorded between grants survive
//! - A `SaveProgress` event for saving on demand

use {
    bevy::prelude::*,
    ron::ser::PrettyConfig,
    std::{
        fs, io,
        path::{Path, PathBuf},
    },
    thiserror::Error,
    unlocks::{PersistenceError, ProgressStore},
    unlocks_resources::ProgressState,
};

pub const SAVES_DIR: &str = "saves";
pub const PROGRESS_FILE: &str = "progress.ron";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read progress file: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt progress file: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Writes the whole progress state to a single RON file.
///
/// Each save goes to a sibling temp file first and is then renamed over the
/// target, so a crash mid-write leaves the previous save intact.
#[derive(Debug, Clone)]
pub struct RonFileStore {
    path: PathBuf,
}

impl RonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for `progress.ron` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(PROGRESS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ProgressState, LoadError> {
        load_progress(&self.path)
    }
}

impl Default for RonFileStore {
    fn default() -> Self {
        Self::in_dir(SAVES_DIR)
    }
}

impl ProgressStore for RonFileStore {
    fn save(&mut self, state: &ProgressState) -> Result<(), PersistenceError> {
        let serialized = ron::ser::to_string_pretty(state, PrettyConfig::default())
            .map_err(|err| PersistenceError::Serialize(err.to_string()))?;

        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }

        let staging = self.path.with_extension("ron.tmp");
        fs::write(&staging, serialized)?;
        fs::rename(&staging, &self.path)?;

        trace!(path = %self.path.display(), "Progress saved");
        Ok(())
    }
}

/// Reads progress from `path`. A missing file is a fresh start.
pub fn load_progress(path: impl AsRef<Path>) -> Result<ProgressState, LoadError> {
    let path = path.as_ref();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No progress file, starting fresh");
            return Ok(ProgressState::default());
        }
        Err(err) => return Err(err.into()),
    };

    let state: ProgressState = ron::from_str(&text)?;
    info!(
        path = %path.display(),
        achievements = state.achievements.len(),
        cards = state.cards.len(),
        "Progress loaded"
    );
    Ok(state)
}

/// Event to save the current progress right away.
#[derive(Event, Debug, Clone, Copy)]
pub struct SaveProgress;

/// Timer resource for automatic saves.
#[derive(Resource)]
pub struct AutosaveTimer(Timer);

impl Default for AutosaveTimer {
    fn default() -> Self {
        // 1 minute autosave interval
        Self(Timer::from_seconds(60.0, TimerMode::Repeating))
    }
}

/// The file progress is saved to outside of grants.
#[derive(Resource, Debug, Clone, Default, Deref, DerefMut)]
pub struct ProgressFile(pub RonFileStore);

#[derive(Default)]
pub struct SaveLoadPlugin {
    pub store: RonFileStore,
}

impl Plugin for SaveLoadPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AutosaveTimer>()
            .insert_resource(ProgressFile(self.store.clone()))
            .add_systems(PostUpdate, tick_autosave)
            .add_observer(execute_save);
    }
}

fn tick_autosave(time: Res<Time>, mut timer: ResMut<AutosaveTimer>, mut commands: Commands) {
    if timer.0.tick(time.delta()).just_finished() {
        debug!("Autosave triggered");
        commands.trigger(SaveProgress);
    }
}

/// Observer that handles the SaveProgress event.
pub fn execute_save(
    _trigger: On<SaveProgress>,
    state: Res<ProgressState>,
    mut file: ResMut<ProgressFile>,
    mut timer: ResMut<AutosaveTimer>,
) {
    // Avoid back-to-back saves
    timer.0.reset();

    match file.save(&state) {
        Ok(()) => info!(path = %file.path().display(), "Progress saved"),
        Err(err) => error!(path = %file.path().display(), error = %err, "Failed to save progress"),
    }
}
