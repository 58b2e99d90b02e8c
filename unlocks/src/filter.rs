//! Cheap event-shape pre-check in front of card rules.

use {
    bevy::platform::collections::HashMap,
    unlocks_assets::{TriggerTag, UnlockCatalog},
    unlocks_events::{DomainEvent, SystemSignal},
};

/// Maps card ids to the trigger tags they care about.
#[derive(Debug, Clone, Default)]
pub struct TriggerFilter {
    entries: HashMap<String, Vec<TriggerTag>>,
}

impl TriggerFilter {
    /// Collects the tags of every card that declares any.
    pub fn from_catalog(catalog: &UnlockCatalog) -> Self {
        let entries = catalog
            .cards()
            .filter(|definition| !definition.triggers.is_empty())
            .map(|definition| (definition.id.clone(), definition.triggers.clone()))
            .collect();
        Self { entries }
    }

    pub fn insert(&mut self, id: impl Into<String>, tags: Vec<TriggerTag>) {
        self.entries.insert(id.into(), tags);
    }

    pub fn tags(&self, id: &str) -> Option<&[TriggerTag]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    pub fn is_manual(&self, id: &str) -> bool {
        self.tags(id)
            .is_some_and(|tags| tags.contains(&TriggerTag::Manual))
    }

    /// Whether the rule for `id` should be evaluated against `event`.
    ///
    /// Ids without an entry are always relevant, so freshly added cards are
    /// never silently skipped.
    pub fn is_relevant(&self, id: &str, event: &DomainEvent) -> bool {
        let Some(tags) = self.tags(id).filter(|tags| !tags.is_empty()) else {
            return true;
        };

        if tags.contains(&TriggerTag::Manual) {
            return false;
        }
        if tags.contains(&TriggerTag::Always) {
            return true;
        }
        if tags.contains(&TriggerTag::Onboarding)
            && event.signal() == Some(SystemSignal::OnboardingCompleted)
        {
            return true;
        }

        let Some(tx) = event.transaction() else {
            return false;
        };

        let kinds: Vec<_> = tags
            .iter()
            .filter_map(|tag| match tag {
                TriggerTag::Kind(kind) => Some(*kind),
                _ => None,
            })
            .collect();
        let categories: Vec<&str> = tags
            .iter()
            .filter_map(|tag| match tag {
                TriggerTag::Category(category) => Some(category.as_str()),
                _ => None,
            })
            .collect();

        // Only the onboarding tag was present.
        if kinds.is_empty() && categories.is_empty() {
            return false;
        }

        let kind_matches = kinds.is_empty() || kinds.contains(&tx.kind);
        let category_matches = categories.is_empty() || categories.contains(&tx.category.as_str());
        kind_matches && category_matches
    }
}
