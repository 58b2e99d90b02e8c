use {
    bevy::{platform::collections::HashMap, prelude::*},
    bevy_common_assets::ron::RonAssetPlugin,
    serde::{Deserialize, Serialize},
    thiserror::Error,
    unlocks_events::{PaymentStatus, SystemSignal, TransactionKind},
};

pub struct UnlocksAssetsPlugin;

impl Plugin for UnlocksAssetsPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RonAssetPlugin::<UnlockCatalogAsset>::new(&["catalog.ron"]));
    }
}

/// Ordinal tier of an unlockable. Only used to break ties when several
/// cards compete for the same event, never as a drop probability.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// Which grant path an unlockable belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum UnlockKind {
    /// Badge evaluated by the multi-winner achievement sweep.
    Achievement {
        category: String,
        /// Satisfied once every other achievement in `category` is granted.
        #[serde(default)]
        capstone: bool,
    },
    /// Collectible granted by the single-winner card drop.
    Card { series: String },
}

/// Pre-filter tag deciding which events a card's rule is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum TriggerTag {
    /// Only transactions of this kind.
    Kind(TransactionKind),
    /// Only transactions in this category (ORed with other category tags).
    Category(String),
    /// Every event; used by rules that only read state.
    Always,
    /// Only the onboarding-completed signal.
    Onboarding,
    /// Never evaluated automatically; reachable through a forced grant only.
    Manual,
}

/// Comparison operators for numeric conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum ComparisonOp {
    #[default]
    Ge, // >=
    Le, // <=
    Eq, // ==
    Gt, // >
    Lt, // <
}

/// Aggregate values a condition can read from the progress state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum Stat {
    TransactionCount,
    IncomeCount,
    ExpenseCount,
    TotalIncome,
    TotalExpense,
    /// Total income minus total expense.
    Balance,
    PaidCount,
    PendingCount,
    /// Number of distinct categories with at least one transaction.
    CategoriesUsed,
    CategoryCount(String),
    ActiveDays,
    CurrentStreak,
    LongestStreak,
    BudgetsCreated,
    AchievementsGranted,
    CardsGranted,
    /// Host-maintained named counter.
    Counter(String),
}

/// A node in the logical condition tree of an unlockable.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ConditionNode {
    // --- Logic Gates ---
    /// Requires ALL sub-conditions to be true.
    And(Vec<ConditionNode>),
    /// Requires ANY sub-condition to be true.
    Or(Vec<ConditionNode>),
    /// Inverts the result of the sub-condition.
    Not(Box<ConditionNode>),
    /// Always true - for unlockables with no prerequisites.
    True,

    // --- State Sensors ---
    /// Checks if an aggregate meets a threshold.
    Stat {
        stat: Stat,
        #[serde(default)]
        op: ComparisonOp,
        target: f64,
    },
    /// Checks if the host recorded the view as opened.
    ViewOpened(String),
    /// Checks if another unlockable has already been granted.
    Granted(String),

    // --- Event Sensors ---
    EventKind(TransactionKind),
    EventCategory(String),
    EventAmount {
        #[serde(default)]
        op: ComparisonOp,
        target: f64,
    },
    EventStatus(PaymentStatus),
    Signal(SystemSignal),

    // --- History Sensors (card path only) ---
    /// Counts logged transactions matching the optional filters.
    History {
        #[serde(default)]
        kind: Option<TransactionKind>,
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        op: ComparisonOp,
        target: f64,
    },
}

/// The definition of a single achievement or collectible card.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UnlockableDefinition {
    /// Unique key for this unlockable (e.g., "first_expense").
    pub id: String,
    /// Optional metadata for UI display.
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rarity: Rarity,
    /// Abstract identifier for the reward (processed by downstream systems).
    #[serde(default)]
    pub reward: String,
    pub kind: UnlockKind,
    /// Data-driven rule. Hosts may instead register a code rule under `id`.
    #[serde(default)]
    pub condition: Option<ConditionNode>,
    /// Card pre-filter tags. Empty means every event is relevant.
    #[serde(default)]
    pub triggers: Vec<TriggerTag>,
}

impl UnlockableDefinition {
    pub fn is_card(&self) -> bool {
        matches!(self.kind, UnlockKind::Card { .. })
    }

    pub fn is_achievement(&self) -> bool {
        matches!(self.kind, UnlockKind::Achievement { .. })
    }

    pub fn is_capstone(&self) -> bool {
        matches!(self.kind, UnlockKind::Achievement { capstone: true, .. })
    }

    /// Achievement category, `None` for cards.
    pub fn category(&self) -> Option<&str> {
        match &self.kind {
            UnlockKind::Achievement { category, .. } => Some(category),
            UnlockKind::Card { .. } => None,
        }
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// On-disk form of the catalog (`*.catalog.ron`).
#[derive(Asset, TypePath, Debug, Clone, Default, Deserialize, Serialize)]
pub struct UnlockCatalogAsset {
    /// Card that always wins the drop while it is eligible.
    #[serde(default)]
    pub welcome_card: Option<String>,
    pub unlockables: Vec<UnlockableDefinition>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate unlockable id `{0}`")]
    DuplicateId(String),
    #[error("category `{category}` has more than one capstone (`{first}`, `{second}`)")]
    DuplicateCapstone {
        category: String,
        first: String,
        second: String,
    },
    #[error("welcome card `{0}` is not a card in the catalog")]
    InvalidWelcomeCard(String),
}

/// Validated, immutable catalog. Iteration follows insertion order, which is
/// also the final tie-break between equally ranked cards.
#[derive(Debug, Clone, Default)]
pub struct UnlockCatalog {
    definitions: Vec<UnlockableDefinition>,
    index: HashMap<String, usize>,
    welcome_card: Option<String>,
}

impl UnlockCatalog {
    pub fn new(
        definitions: Vec<UnlockableDefinition>,
        welcome_card: Option<String>,
    ) -> Result<Self, CatalogError> {
        let mut index = HashMap::default();
        let mut capstones: HashMap<String, String> = HashMap::default();

        for (position, definition) in definitions.iter().enumerate() {
            if index.insert(definition.id.clone(), position).is_some() {
                return Err(CatalogError::DuplicateId(definition.id.clone()));
            }

            if let UnlockKind::Achievement {
                category,
                capstone: true,
            } = &definition.kind
                && let Some(first) = capstones.insert(category.clone(), definition.id.clone())
            {
                return Err(CatalogError::DuplicateCapstone {
                    category: category.clone(),
                    first,
                    second: definition.id.clone(),
                });
            }
        }

        if let Some(welcome) = &welcome_card {
            let is_card = index
                .get(welcome)
                .is_some_and(|&position| definitions[position].is_card());
            if !is_card {
                return Err(CatalogError::InvalidWelcomeCard(welcome.clone()));
            }
        }

        Ok(Self {
            definitions,
            index,
            welcome_card,
        })
    }

    pub fn from_asset(asset: UnlockCatalogAsset) -> Result<Self, CatalogError> {
        Self::new(asset.unlockables, asset.welcome_card)
    }

    pub fn get(&self, id: &str) -> Option<&UnlockableDefinition> {
        self.index.get(id).map(|&position| &self.definitions[position])
    }

    /// Insertion position of `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnlockableDefinition> {
        self.definitions.iter()
    }

    pub fn achievements(&self) -> impl Iterator<Item = &UnlockableDefinition> {
        self.iter().filter(|definition| definition.is_achievement())
    }

    pub fn cards(&self) -> impl Iterator<Item = &UnlockableDefinition> {
        self.iter().filter(|definition| definition.is_card())
    }

    /// Non-capstone achievements in `category`.
    pub fn prerequisites_of<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a UnlockableDefinition> {
        self.achievements()
            .filter(move |definition| definition.category() == Some(category))
            .filter(|definition| !definition.is_capstone())
    }

    pub fn welcome_card(&self) -> Option<&str> {
        self.welcome_card.as_deref()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
