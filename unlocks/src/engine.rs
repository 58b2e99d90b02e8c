//! The unlock engine: one explicitly constructed instance per host.

use {
    crate::{
        cache::EligibilityCache,
        compiler::compile_rules,
        error::UnlockError,
        filter::TriggerFilter,
        grant::{ProgressStore, grant},
        rules::RuleSet,
        selector::{CardDropSelector, RankedCard},
        sweep::AchievementSweep,
    },
    bevy::prelude::*,
    unlocks_assets::UnlockCatalog,
    unlocks_events::DomainEvent,
    unlocks_resources::{ProgressState, TransactionLog},
};

/// Owns the catalog, compiled rules, trigger filter, eligibility cache and
/// the injected store.
///
/// Construct once, install a catalog with [`UnlockEngine::load_catalog`], and
/// hand the instance to whoever needs to evaluate. Inserted as a resource
/// when driven by [`crate::UnlocksPlugin`].
#[derive(Resource)]
pub struct UnlockEngine {
    catalog: UnlockCatalog,
    custom_rules: RuleSet,
    rules: RuleSet,
    filter: TriggerFilter,
    cache: EligibilityCache,
    store: Box<dyn ProgressStore>,
}

impl UnlockEngine {
    pub fn new(store: impl ProgressStore + 'static) -> Self {
        Self {
            catalog: UnlockCatalog::default(),
            custom_rules: RuleSet::new(),
            rules: RuleSet::new(),
            filter: TriggerFilter::default(),
            cache: EligibilityCache::default(),
            store: Box::new(store),
        }
    }

    /// Host rules; they take precedence over catalog conditions with the same id.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.custom_rules = rules;
        self
    }

    /// Installs `catalog`, compiles its rules and warms up the eligibility
    /// cache against the current state. Returns the warm-up count.
    pub fn load_catalog(
        &mut self,
        catalog: UnlockCatalog,
        state: &ProgressState,
        history: &TransactionLog,
    ) -> usize {
        info!(unlockables = catalog.len(), "Loading unlock catalog");
        self.rules = compile_rules(&catalog, &self.custom_rules);
        self.filter = TriggerFilter::from_catalog(&catalog);
        self.catalog = catalog;
        self.cache = EligibilityCache::default();
        self.warm_up(state, history)
    }

    pub fn catalog(&self) -> &UnlockCatalog {
        &self.catalog
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn filter(&self) -> &TriggerFilter {
        &self.filter
    }

    pub fn cache(&self) -> &EligibilityCache {
        &self.cache
    }

    pub fn is_relevant(&self, id: &str, event: &DomainEvent) -> bool {
        self.filter.is_relevant(id, event)
    }

    /// Seeds the eligibility cache without granting anything.
    pub fn warm_up(&mut self, state: &ProgressState, history: &TransactionLog) -> usize {
        let selector = CardDropSelector {
            catalog: &self.catalog,
            rules: &self.rules,
            filter: &self.filter,
        };
        selector.warm_up(state, history, &mut self.cache)
    }

    /// Grants every achievement newly satisfied by `event`.
    pub fn sweep(
        &mut self,
        event: &DomainEvent,
        state: &mut ProgressState,
    ) -> Result<Vec<String>, UnlockError> {
        let sweep = AchievementSweep {
            catalog: &self.catalog,
            rules: &self.rules,
        };
        sweep.run(event, state, self.store.as_mut())
    }

    /// Grants at most one card for `event`.
    pub fn select_grant(
        &mut self,
        event: &DomainEvent,
        state: &mut ProgressState,
        history: &TransactionLog,
    ) -> Result<Option<String>, UnlockError> {
        if !self.cache.is_seeded() {
            warn!("card drop before warm-up, warming up now");
            self.warm_up(state, history);
        }

        let selector = CardDropSelector {
            catalog: &self.catalog,
            rules: &self.rules,
            filter: &self.filter,
        };
        selector.select(event, state, history, &mut self.cache, self.store.as_mut())
    }

    /// Runs the achievement sweep and then the card drop for one event.
    /// Returns every id granted, achievements first.
    ///
    /// The card drop runs even when an achievement save failed. The first
    /// failure is returned, carrying every id that did persist.
    pub fn handle_event(
        &mut self,
        event: &DomainEvent,
        state: &mut ProgressState,
        history: &TransactionLog,
    ) -> Result<Vec<String>, UnlockError> {
        let (mut granted, mut failure) = match self.sweep(event, state) {
            Ok(granted) => (granted, None),
            Err(UnlockError::Persistence {
                id,
                granted,
                source,
            }) => (granted, Some((id, source))),
            Err(err) => return Err(err),
        };

        match self.select_grant(event, state, history) {
            Ok(card) => granted.extend(card),
            Err(UnlockError::Persistence { id, source, .. }) => {
                failure.get_or_insert((id, source));
            }
            Err(err) => return Err(err),
        }

        match failure {
            Some((id, source)) => Err(UnlockError::Persistence {
                id,
                granted,
                source,
            }),
            None => Ok(granted),
        }
    }

    /// Ranks the cards `event` would qualify, without granting or touching
    /// the cache.
    pub fn preview_cards(
        &self,
        event: &DomainEvent,
        state: &ProgressState,
        history: &TransactionLog,
    ) -> Vec<RankedCard<'_>> {
        let selector = self.selector();
        let candidates = selector.candidates(event, state, history);
        selector.rank(&candidates, &self.cache)
    }

    /// Grants `id` bypassing rules and the trigger filter. Still idempotent
    /// and still persisted before returning.
    pub fn force_grant(&mut self, id: &str, state: &mut ProgressState) -> Result<bool, UnlockError> {
        let Some(definition) = self.catalog.get(id) else {
            return Err(UnlockError::Unknown(id.to_string()));
        };
        info!(unlock_id = %id, "Force-granting unlockable");
        grant(definition, state, self.store.as_mut(), true).map_err(|source| {
            UnlockError::Persistence {
                id: id.to_string(),
                granted: Vec::new(),
                source,
            }
        })
    }

    fn selector(&self) -> CardDropSelector<'_> {
        CardDropSelector {
            catalog: &self.catalog,
            rules: &self.rules,
            filter: &self.filter,
        }
    }
}
