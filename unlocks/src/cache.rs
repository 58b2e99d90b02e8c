use bevy::platform::collections::HashSet;

/// Card ids known to be satisfiable as of the last evaluation.
///
/// Lives only as long as the engine. Seeded once by warm-up, then grown on
/// every real evaluation; ids are never removed, so it stays a superset of
/// the eligible-but-ungranted cards.
#[derive(Debug, Clone, Default)]
pub struct EligibilityCache {
    ids: HashSet<String>,
    seeded: bool,
}

impl EligibilityCache {
    /// Seeds the cache from a warm-up pass. Returns how many ids were added.
    pub fn seed<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> usize {
        self.seeded = true;
        self.absorb(ids)
    }

    /// Unions `ids` into the cache. Returns how many were new.
    pub fn absorb<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> usize {
        ids.into_iter()
            .filter(|id| self.ids.insert((*id).to_string()))
            .count()
    }

    /// Whether `id` was already known, i.e. it is backlog rather than novel.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
