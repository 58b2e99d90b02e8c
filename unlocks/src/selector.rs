//! Single-winner card drop.

use {
    crate::{
        cache::EligibilityCache,
        error::UnlockError,
        filter::TriggerFilter,
        grant::{ProgressStore, grant},
        rules::{RuleInput, RuleSet},
    },
    bevy::prelude::*,
    std::cmp::Reverse,
    unlocks_assets::{UnlockCatalog, UnlockableDefinition},
    unlocks_events::DomainEvent,
    unlocks_resources::{ProgressState, TransactionLog},
};

/// A card that qualified for an event, classified against the cache.
#[derive(Debug, Clone, Copy)]
pub struct RankedCard<'a> {
    pub definition: &'a UnlockableDefinition,
    /// Not in the eligibility cache before this evaluation.
    pub novel: bool,
}

/// Picks at most one card per event.
///
/// Candidates are ranked novel-first, then by rarity (highest first), then by
/// catalog order. The welcome card, when present, jumps to the front. Only the
/// front card is granted; the rest stay eligible and surface on later events.
pub struct CardDropSelector<'a> {
    pub catalog: &'a UnlockCatalog,
    pub rules: &'a RuleSet,
    pub filter: &'a TriggerFilter,
}

impl<'a> CardDropSelector<'a> {
    /// Ungranted cards relevant to `event` whose rule holds, in catalog order.
    pub fn candidates(
        &self,
        event: &DomainEvent,
        state: &ProgressState,
        history: &TransactionLog,
    ) -> Vec<&'a UnlockableDefinition> {
        let input = RuleInput::card(event, state, history);
        self.catalog
            .cards()
            .filter(|definition| !state.is_card_granted(&definition.id))
            .filter(|definition| self.filter.is_relevant(&definition.id, event))
            .filter(|definition| self.rules.is_satisfied(&definition.id, &input))
            .collect()
    }

    /// Orders `candidates` for granting without touching the cache.
    pub fn rank(
        &self,
        candidates: &[&'a UnlockableDefinition],
        cache: &EligibilityCache,
    ) -> Vec<RankedCard<'a>> {
        let mut ranked: Vec<RankedCard<'a>> = candidates
            .iter()
            .map(|&definition| RankedCard {
                definition,
                novel: !cache.contains(&definition.id),
            })
            .collect();

        // Stable sort keeps catalog order between equal keys.
        ranked.sort_by_key(|card| (Reverse(card.novel), Reverse(card.definition.rarity)));

        if let Some(welcome) = self.catalog.welcome_card()
            && let Some(position) = ranked.iter().position(|card| card.definition.id == welcome)
        {
            let card = ranked.remove(position);
            ranked.insert(0, card);
        }

        ranked
    }

    /// Evaluates `event`, updates the cache and grants the front card.
    pub fn select(
        &self,
        event: &DomainEvent,
        state: &mut ProgressState,
        history: &TransactionLog,
        cache: &mut EligibilityCache,
        store: &mut dyn ProgressStore,
    ) -> Result<Option<String>, UnlockError> {
        let candidates = self.candidates(event, state, history);
        if candidates.is_empty() {
            return Ok(None);
        }

        let ranked = self.rank(&candidates, cache);
        let absorbed = cache.absorb(candidates.iter().map(|definition| definition.id.as_str()));
        trace!(candidates = candidates.len(), absorbed, "card candidates ranked");

        let Some(winner) = ranked.first() else {
            return Ok(None);
        };
        let definition = winner.definition;
        debug!(
            unlock_id = %definition.id,
            novel = winner.novel,
            rarity = ?definition.rarity,
            waiting = ranked.len() - 1,
            "card drop selected"
        );

        match grant(definition, state, store, false) {
            Ok(true) => Ok(Some(definition.id.clone())),
            Ok(false) => Ok(None),
            Err(source) => Err(UnlockError::Persistence {
                id: definition.id.clone(),
                granted: Vec::new(),
                source,
            }),
        }
    }

    /// Seeds `cache` with every card already satisfiable before any real
    /// event, so an existing backlog is not mistaken for fresh unlocks.
    /// Grants nothing. Manual cards are never evaluated.
    pub fn warm_up(
        &self,
        state: &ProgressState,
        history: &TransactionLog,
        cache: &mut EligibilityCache,
    ) -> usize {
        let neutral = DomainEvent::NEUTRAL;
        let input = RuleInput::card(&neutral, state, history);
        let satisfiable: Vec<&str> = self
            .catalog
            .cards()
            .filter(|definition| !state.is_card_granted(&definition.id))
            .filter(|definition| !self.filter.is_manual(&definition.id))
            .filter(|definition| self.rules.is_satisfied(&definition.id, &input))
            .map(|definition| definition.id.as_str())
            .collect();

        let seeded = cache.seed(satisfiable);
        debug!(seeded, "eligibility cache warmed up");
        seeded
    }
}
