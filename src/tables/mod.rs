//! Immutable lookup tables passed explicitly to every pass.
//!
//! The defaults live in `tables.toml` next to this file and are compiled in.
//! A user-supplied file with the same layout replaces whole sections.

use std::{fmt::Debug, path::PathBuf, str::FromStr};

use anyhow::{bail, Context};
use hashbrown::HashMap;
use indexmap::IndexMap;
use ingredient_scraping_utils::fs_json_util::read_toml;
use log::debug;
use serde::Deserialize;

use crate::{
    normalize::{normalize_name, NormalizedName},
    schema::{Category, Effect, IngredientId, Subcategory},
};

const BUILTIN_TABLES: &str = include_str!("tables.toml");

/// Monster-part id to subcategory.
#[derive(Clone, Default, Debug)]
pub struct SubcategoryTable(HashMap<IngredientId, Subcategory>);
impl SubcategoryTable {
    pub fn get(&self, id: &IngredientId) -> Option<Subcategory> {
        self.0.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl FromIterator<(IngredientId, Subcategory)> for SubcategoryTable {
    fn from_iter<T: IntoIterator<Item = (IngredientId, Subcategory)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Hand-maintained fuse values keyed by id, for names the spreadsheet spells differently.
#[derive(Clone, Default, Debug)]
pub struct FuseOverrideTable(HashMap<IngredientId, i64>);
impl FuseOverrideTable {
    pub fn get(&self, id: &IngredientId) -> Option<i64> {
        self.0.get(id).copied()
    }
}
impl FromIterator<(IngredientId, i64)> for FuseOverrideTable {
    fn from_iter<T: IntoIterator<Item = (IngredientId, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Fuse values read from the spreadsheet, keyed by normalized item name.
/// Later rows overwrite earlier ones.
#[derive(Clone, Default, Debug)]
pub struct PrimaryFuseTable(HashMap<NormalizedName, i64>);
impl PrimaryFuseTable {
    pub fn get(&self, name: &NormalizedName) -> Option<i64> {
        self.0.get(name).copied()
    }

    pub fn insert(&mut self, name: &str, value: i64) {
        self.0.insert(normalize_name(name), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl<'a> FromIterator<(&'a str, i64)> for PrimaryFuseTable {
    fn from_iter<T: IntoIterator<Item = (&'a str, i64)>>(iter: T) -> Self {
        let mut table = Self::default();
        for (name, value) in iter {
            table.insert(name, value);
        }
        table
    }
}

/// Ordered phrase-to-effect table; the first phrase contained in a text wins.
#[derive(Clone, Default, Debug)]
pub struct EffectPhrases(IndexMap<String, Effect>);
impl EffectPhrases {
    /// Case-insensitive substring search in table order.
    pub fn find_in(&self, text: &str) -> Option<Effect> {
        let text = text.to_lowercase();
        self.0
            .iter()
            .find(|(phrase, _)| text.contains(&phrase.to_lowercase()))
            .map(|(_, &effect)| effect)
    }
}
impl FromIterator<(String, Effect)> for EffectPhrases {
    fn from_iter<T: IntoIterator<Item = (String, Effect)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Clone, Debug)]
pub struct Tables {
    pub subcategories: SubcategoryTable,
    pub fuse_overrides: FuseOverrideTable,
    /// Wiki category page name to category, in scraping order.
    pub wiki_categories: IndexMap<String, Category>,
    /// Infobox `Effect` adjectives ("Mighty", "Spicy", ...).
    pub effect_names: EffectPhrases,
    /// `Use(s)` keywords ("attack up", "cold resistance", ...).
    pub effect_keywords: EffectPhrases,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TablesFile {
    subcategories: Option<IndexMap<String, Vec<String>>>,
    fuse_overrides: Option<IndexMap<String, i64>>,
    wiki_categories: Option<IndexMap<String, Category>>,
    effect_names: Option<IndexMap<String, Effect>>,
    effect_keywords: Option<IndexMap<String, Effect>>,
}

impl Tables {
    pub fn builtin() -> anyhow::Result<Self> {
        let file: TablesFile =
            toml::from_str(BUILTIN_TABLES).context("While parsing the built-in tables")?;
        Self::from_file(file, None)
    }

    /// Built-in tables with every section present in `path` replaced.
    pub fn load(path: impl Into<PathBuf> + Debug) -> anyhow::Result<Self> {
        let builtin: TablesFile = toml::from_str(BUILTIN_TABLES)?;
        let user: TablesFile = read_toml(path)?;
        Self::from_file(user, Some(builtin))
    }

    fn from_file(file: TablesFile, fallback: Option<TablesFile>) -> anyhow::Result<Self> {
        let fallback = fallback.unwrap_or_default();
        macro_rules! section {
            ($name: ident) => {
                match file.$name.or(fallback.$name) {
                    Some(section) => section,
                    None => bail!("Table section `{}` is missing", stringify!($name)),
                }
            };
        }

        let mut subcategories = vec![];
        for (name, ids) in section!(subcategories) {
            let subcategory = Subcategory::from_str(&name)
                .with_context(|| format!("Unknown subcategory {name:?}"))?;
            subcategories.extend(ids.into_iter().map(|id| (IngredientId::from(id), subcategory)));
        }
        let tables = Self {
            subcategories: subcategories.into_iter().collect(),
            fuse_overrides: section!(fuse_overrides)
                .into_iter()
                .map(|(id, value)| (IngredientId::from(id), value))
                .collect(),
            wiki_categories: section!(wiki_categories),
            effect_names: section!(effect_names).into_iter().collect(),
            effect_keywords: section!(effect_keywords).into_iter().collect(),
        };
        debug!(
            "Loaded tables: {} subcategory ids, {} wiki categories",
            tables.subcategories.len(),
            tables.wiki_categories.len()
        );
        Ok(tables)
    }
}
