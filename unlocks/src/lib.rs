//! Gamification unlock engine.
//!
//! Achievements are granted by a multi-winner sweep; collectible cards by a
//! single-winner drop that prefers novel, rarer cards. Both paths funnel
//! through one idempotent grant that persists before signalling.

mod cache;
mod compiler;
mod engine;
mod error;
mod events;
mod filter;
mod grant;
mod rules;
mod selector;
mod sweep;
mod systems;


pub use cache::*;
pub use compiler::*;
pub use engine::*;
pub use error::*;
pub use events::*;
pub use filter::*;
pub use grant::*;
pub use rules::*;
pub use selector::*;
pub use sweep::*;
pub use systems::{
    CatalogSource, install_loaded_catalog, on_force_grant, on_progress_changed, on_view_opened,
    request_catalog,
};

use {
    bevy::prelude::*,
    unlocks_assets::UnlocksAssetsPlugin,
    unlocks_resources::{ProgressState, TransactionLog},
};

/// Wires the engine onto the event bus.
///
/// The host must insert an [`UnlockEngine`] resource (constructed with its
/// store) before publishing any `ProgressChanged`.
pub struct UnlocksPlugin;

impl Plugin for UnlocksPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ProgressState>()
            .init_resource::<TransactionLog>()
            .add_observer(on_progress_changed)
            // Auxiliary inputs
            .add_observer(on_view_opened)
            .add_observer(on_force_grant);
    }
}

/// Loads the catalog asset from `path` and installs it into the engine.
pub struct UnlockCatalogPlugin {
    pub path: String,
}

impl Default for UnlockCatalogPlugin {
    fn default() -> Self {
        Self {
            path: "unlocks/fortune.catalog.ron".to_string(),
        }
    }
}

impl Plugin for UnlockCatalogPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(UnlocksAssetsPlugin)
            .insert_resource(CatalogSource::new(self.path.clone()))
            .add_systems(Startup, request_catalog)
            .add_systems(Update, install_loaded_catalog);
    }
}
