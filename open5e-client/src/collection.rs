use std::collections::HashMap;

use lazy_static::lazy_static;
use serde_json::Value;
use strum_macros::{Display, EnumIter, EnumString};

use crate::record::Record;

/// A named category of records with its own endpoint, page size, and
/// declared filter/sort schema. The lowercase form is the API path segment.
#[derive(Debug, Display, EnumString, EnumIter, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum CollectionType {
    Monsters,
    Spells,
    MagicItems,
    Feats,
    Races,
    Classes,
    Sections,
}

/// Where a collection's records come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionSource {
    /// Paginated listing endpoint on the remote API.
    Remote,
    /// Local JSON file whose record array sits under the named top-level
    /// field. Treated identically to a remote collection once loaded.
    LocalFile { field: &'static str },
}

impl CollectionType {
    pub fn source(self) -> CollectionSource {
        match self {
            CollectionType::Feats => CollectionSource::LocalFile { field: "feats" },
            _ => CollectionSource::Remote,
        }
    }

    /// Whether the whole collection is materialized up front and cached for
    /// the rest of the process lifetime.
    pub fn bulk_cached(self) -> bool {
        matches!(
            self,
            CollectionType::Spells | CollectionType::MagicItems | CollectionType::Feats
        )
    }

    /// Page size for listing requests. Bulk-cached types use a large page
    /// to keep the request count down.
    pub fn page_size(self) -> usize {
        if self.bulk_cached() {
            500
        } else {
            50
        }
    }

    /// Filter facets available for this collection.
    pub fn filter_categories(self) -> &'static [FilterCategory] {
        match self {
            CollectionType::Spells => &[FilterCategory::Source, FilterCategory::SpellClass],
            CollectionType::MagicItems => &[FilterCategory::Source, FilterCategory::Rarity],
            _ => &[FilterCategory::Source],
        }
    }

    /// Columns this collection can be sorted by.
    pub fn sort_columns(self) -> &'static [SortColumn] {
        match self {
            CollectionType::Spells => &[
                SortColumn::Name,
                SortColumn::Level,
                SortColumn::School,
                SortColumn::Source,
            ],
            CollectionType::MagicItems => &[
                SortColumn::Name,
                SortColumn::ItemType,
                SortColumn::Rarity,
                SortColumn::Source,
            ],
            CollectionType::Monsters => &[
                SortColumn::Name,
                SortColumn::MonsterType,
                SortColumn::Source,
            ],
            _ => &[SortColumn::Name, SortColumn::Source],
        }
    }
}

/// A filter facet declared for a collection. A record carries zero or more
/// values for a facet and passes when any of them is selected.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterCategory {
    /// Publication source (`document__title`, defaulting to SRD).
    Source,
    /// Magic item rarity.
    Rarity,
    /// Character classes a spell belongs to.
    SpellClass,
}

impl FilterCategory {
    /// Facet values the record carries, as the API spells them.
    pub fn values(self, record: &Record) -> Vec<String> {
        match self {
            FilterCategory::Source => vec![record.source().to_string()],
            FilterCategory::Rarity => record
                .str_field("rarity")
                .map(|rarity| vec![rarity.to_string()])
                .unwrap_or_default(),
            FilterCategory::SpellClass => spell_classes(record),
        }
    }
}

/// The API stores a spell's classes as one comma-separated string, e.g.
/// "Bard, Sorcerer, Wizard".
fn spell_classes(record: &Record) -> Vec<String> {
    record
        .str_field("dnd_class")
        .map(|classes| {
            classes
                .split(',')
                .map(|class| class.trim().to_string())
                .filter(|class| !class.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// A sortable column with a per-collection field extractor.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortColumn {
    Name,
    /// Spell level; cantrips count as level 0.
    Level,
    /// Magic item rarity, ordered by rank rather than alphabetically.
    Rarity,
    /// Magic item type.
    ItemType,
    /// Monster creature type.
    MonsterType,
    School,
    Source,
}

/// Comparable key extracted from a record for the active sort column.
///
/// Text sorts case-insensitively, numbers numerically, and `Missing`
/// (absent or unranked fields) after everything else regardless of sort
/// direction. The derived ordering handles the within-variant cases; the
/// pipeline special-cases `Missing`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Number(i64),
    Text(String),
    Missing,
}

impl SortKey {
    fn text(value: &str) -> Self {
        SortKey::Text(value.to_lowercase())
    }
}

impl SortColumn {
    /// Extract this column's sort key from a record.
    pub fn key(self, record: &Record) -> SortKey {
        match self {
            SortColumn::Name => text_key(record.str_field("name")),
            SortColumn::ItemType | SortColumn::MonsterType => text_key(record.str_field("type")),
            SortColumn::School => text_key(record.str_field("school")),
            SortColumn::Source => SortKey::text(record.source()),
            SortColumn::Level => spell_level(record),
            SortColumn::Rarity => rarity_rank(record),
        }
    }
}

fn text_key(value: Option<&str>) -> SortKey {
    value.map(SortKey::text).unwrap_or(SortKey::Missing)
}

/// Spell levels arrive as strings like "Cantrip" or "3rd-level". Cantrips
/// count as level 0 and unparseable levels fall back to 0 as well; only a
/// genuinely absent field sorts as missing.
fn spell_level(record: &Record) -> SortKey {
    match record.get("level") {
        None => SortKey::Missing,
        Some(Value::Number(level)) => SortKey::Number(level.as_i64().unwrap_or(0)),
        Some(Value::String(level)) if level.eq_ignore_ascii_case("cantrip") => SortKey::Number(0),
        Some(Value::String(level)) => {
            let digits: String = level
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            SortKey::Number(digits.parse().unwrap_or(0))
        }
        Some(_) => SortKey::Missing,
    }
}

lazy_static! {
    /// Display rank per rarity; anything unranked sorts last.
    static ref RARITY_RANKS: HashMap<&'static str, i64> = {
        let mut ranks = HashMap::new();
        for (rank, rarity) in [
            "common",
            "uncommon",
            "rare",
            "very rare",
            "legendary",
            "artifact",
        ]
        .iter()
        .enumerate()
        {
            ranks.insert(*rarity, rank as i64);
        }
        ranks
    };
}

fn rarity_rank(record: &Record) -> SortKey {
    record
        .str_field("rarity")
        .and_then(|rarity| RARITY_RANKS.get(rarity.to_lowercase().as_str()).copied())
        .map(SortKey::Number)
        .unwrap_or(SortKey::Missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).expect("record literal")
    }

    #[test]
    fn endpoint_segments_are_lowercase() {
        assert_eq!(CollectionType::MagicItems.to_string(), "magicitems");
        assert_eq!(CollectionType::Monsters.to_string(), "monsters");
        assert_eq!(
            "spells".parse::<CollectionType>().unwrap(),
            CollectionType::Spells
        );
    }

    #[test]
    fn bulk_types_use_large_pages() {
        assert_eq!(CollectionType::Spells.page_size(), 500);
        assert_eq!(CollectionType::Monsters.page_size(), 50);
        assert!(CollectionType::Feats.bulk_cached());
        assert!(!CollectionType::Races.bulk_cached());
    }

    #[test]
    fn spell_level_treats_cantrip_as_zero() {
        assert_eq!(
            SortColumn::Level.key(&record(json!({"level": "Cantrip"}))),
            SortKey::Number(0)
        );
        assert_eq!(
            SortColumn::Level.key(&record(json!({"level": "3rd-level"}))),
            SortKey::Number(3)
        );
        assert_eq!(
            SortColumn::Level.key(&record(json!({"level": 5}))),
            SortKey::Number(5)
        );
        assert_eq!(
            SortColumn::Level.key(&record(json!({"name": "Wish"}))),
            SortKey::Missing
        );
    }

    #[test]
    fn rarity_ranks_order_by_power_not_alphabet() {
        let uncommon = SortColumn::Rarity.key(&record(json!({"rarity": "Uncommon"})));
        let legendary = SortColumn::Rarity.key(&record(json!({"rarity": "Legendary"})));
        let unranked = SortColumn::Rarity.key(&record(json!({"rarity": "Unique"})));

        assert!(uncommon < legendary);
        assert_eq!(unranked, SortKey::Missing);
    }

    #[test]
    fn spell_class_facet_splits_the_class_list() {
        let spell = record(json!({"name": "Fireball", "dnd_class": "Sorcerer, Wizard"}));
        assert_eq!(
            FilterCategory::SpellClass.values(&spell),
            vec!["Sorcerer".to_string(), "Wizard".to_string()]
        );
        assert!(FilterCategory::SpellClass
            .values(&record(json!({"name": "Bite"})))
            .is_empty());
    }

    #[test]
    fn schemas_are_declared_per_collection() {
        assert!(CollectionType::MagicItems
            .filter_categories()
            .contains(&FilterCategory::Rarity));
        assert!(!CollectionType::Monsters
            .filter_categories()
            .contains(&FilterCategory::Rarity));
        assert!(CollectionType::Spells
            .sort_columns()
            .contains(&SortColumn::Level));
    }
}
