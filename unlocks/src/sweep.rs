//! Multi-winner achievement evaluation.

use {
    crate::{
        error::UnlockError,
        grant::{ProgressStore, grant},
        rules::{RuleInput, RuleSet},
    },
    bevy::prelude::*,
    unlocks_assets::{UnlockCatalog, UnlockableDefinition},
    unlocks_events::DomainEvent,
    unlocks_resources::ProgressState,
};

/// Evaluates every ungranted achievement against one event and grants all
/// that are satisfied.
///
/// Runs in two phases. The tier phase evaluates every non-capstone against
/// the state as it was when the event arrived. The capstone phase then reads
/// the granted set left by the tier phase, so a capstone lands in the same
/// sweep as its last prerequisite.
pub struct AchievementSweep<'a> {
    pub catalog: &'a UnlockCatalog,
    pub rules: &'a RuleSet,
}

impl<'a> AchievementSweep<'a> {
    pub fn run(
        &self,
        event: &DomainEvent,
        state: &mut ProgressState,
        store: &mut dyn ProgressStore,
    ) -> Result<Vec<String>, UnlockError> {
        if !state.has_identity() {
            debug!("no profile yet, skipping achievement sweep");
            return Ok(Vec::new());
        }

        let mut granted = Vec::new();

        let tiers = self.satisfied(event, state, false);
        self.grant_all(tiers, state, store, &mut granted)?;

        let capstones = self.satisfied(event, state, true);
        self.grant_all(capstones, state, store, &mut granted)?;

        if !granted.is_empty() {
            debug!(count = granted.len(), "achievement sweep granted");
        }
        Ok(granted)
    }

    /// Ungranted achievements of one phase whose rule holds, in catalog order.
    fn satisfied(
        &self,
        event: &DomainEvent,
        state: &ProgressState,
        capstones: bool,
    ) -> Vec<&'a UnlockableDefinition> {
        let input = RuleInput::achievement(event, state);
        self.catalog
            .achievements()
            .filter(|definition| definition.is_capstone() == capstones)
            .filter(|definition| !state.is_achievement_granted(&definition.id))
            .filter(|definition| self.rules.is_satisfied(&definition.id, &input))
            .collect()
    }

    fn grant_all(
        &self,
        definitions: Vec<&UnlockableDefinition>,
        state: &mut ProgressState,
        store: &mut dyn ProgressStore,
        granted: &mut Vec<String>,
    ) -> Result<(), UnlockError> {
        for definition in definitions {
            match grant(definition, state, store, false) {
                Ok(true) => granted.push(definition.id.clone()),
                Ok(false) => {}
                Err(source) => {
                    return Err(UnlockError::Persistence {
                        id: definition.id.clone(),
                        granted: std::mem::take(granted),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}
