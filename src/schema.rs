use std::fmt::Display;

use derive_more::{AsRef, From, Into};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;
use typed_builder::TypedBuilder;

use crate::normalize::slugify;

/// Stable identifier of a record, a lowercase hyphenated slug.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    From,
    Into,
    AsRef,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
#[as_ref(forward)]
pub struct IngredientId(String);
impl IngredientId {
    pub fn from_name(name: &str) -> Self {
        Self(slugify(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid_slug(&self) -> bool {
        !self.0.is_empty()
            && !self.0.starts_with('-')
            && !self.0.ends_with('-')
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }
}
impl From<&str> for IngredientId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    From,
    Into,
    AsRef,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
#[as_ref(forward)]
pub struct IngredientName(String);
impl IngredientName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for IngredientName {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Relative path of the icon asset, e.g. `images/ingredients/golden-apple.png`.
#[derive(
    Clone,
    Default,
    PartialEq,
    Eq,
    Hash,
    Debug,
    From,
    Into,
    AsRef,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
#[as_ref(forward)]
pub struct IconPath(String);
impl IconPath {
    pub fn for_id(prefix: &str, id: &IngredientId) -> Self {
        Self(format!("{}/{}.png", prefix.trim_end_matches('/'), id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    strum::Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Category {
    Fruit,
    Vegetable,
    Mushroom,
    Meat,
    Fish,
    Seafood,
    Herb,
    Nut,
    Bug,
    Lizard,
    Frog,
    MonsterPart,
    DragonPart,
    Mineral,
}
impl Category {
    pub fn ingredient_type(self) -> IngredientType {
        use Category::*;
        match self {
            Fruit | Vegetable | Mushroom | Meat | Fish | Seafood | Herb | Nut => {
                IngredientType::Food
            }
            Bug | Lizard | Frog => IngredientType::Critter,
            MonsterPart => IngredientType::Monster,
            DragonPart => IngredientType::Dragon,
            Mineral => IngredientType::Mineral,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    strum::Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum IngredientType {
    Food,
    Critter,
    Monster,
    Dragon,
    Mineral,
}
impl IngredientType {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Refinement of [`Category::MonsterPart`].
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    strum::Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Subcategory {
    Eyeballs,
    Wings,
    Horns,
    Fangs,
    Tails,
    Guts,
    Claws,
    Jellies,
    Zonai,
    Other,
}

/// Status effect granted when the ingredient is cooked.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    strum::Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Effect {
    AttackUp,
    DefenseUp,
    SpeedUp,
    StealthUp,
    ColdResist,
    HeatResist,
    ShockResist,
    FlameGuard,
    Energizing,
    Enduring,
    Hearty,
    GloomResist,
    SwimSpeedUp,
    Bright,
    SlipResist,
}

/// One row of the dataset.
///
/// Every value of this type upholds the record invariants:
/// no potency or duration without an effect,
/// a subcategory only for monster parts,
/// and a type that agrees with the category.
/// Rows coming from files go through [`IngredientRecordRaw`] first.
#[derive(Clone, PartialEq, Debug, Getters, CopyGetters, Serialize, Deserialize)]
#[serde(try_from = "IngredientRecordRaw", into = "IngredientRecordRaw")]
pub struct IngredientRecord {
    #[getset(get = "pub")]
    pub(crate) id: IngredientId,
    #[getset(get = "pub")]
    pub(crate) name: IngredientName,
    #[getset(get_copy = "pub")]
    pub(crate) category: Category,
    #[getset(get_copy = "pub")]
    pub(crate) subcategory: Option<Subcategory>,
    #[getset(get_copy = "pub")]
    pub(crate) effect: Option<Effect>,
    #[getset(get_copy = "pub")]
    pub(crate) effect_potency: u32,
    #[getset(get_copy = "pub")]
    pub(crate) effect_duration_sec: u32,
    #[getset(get_copy = "pub")]
    pub(crate) hearts: f64,
    #[getset(get_copy = "pub")]
    pub(crate) sell_price: u32,
    #[getset(get = "pub")]
    pub(crate) icon: IconPath,
    #[getset(get_copy = "pub")]
    pub(crate) fuse_value: Option<i64>,
}

impl IngredientRecord {
    pub fn ingredient_type(&self) -> IngredientType {
        self.category.ingredient_type()
    }

    /// Key of the dataset order, compared as the strings written to disk.
    pub fn sort_key(&self) -> (&'static str, &'static str, &str) {
        (
            self.ingredient_type().as_str(),
            self.category.as_str(),
            self.name.as_str(),
        )
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        validate_fields(
            &self.id,
            self.category,
            self.subcategory,
            self.effect,
            self.effect_potency,
            self.effect_duration_sec,
            self.hearts,
        )
    }
}

fn validate_fields(
    id: &IngredientId,
    category: Category,
    subcategory: Option<Subcategory>,
    effect: Option<Effect>,
    effect_potency: u32,
    effect_duration_sec: u32,
    hearts: f64,
) -> Result<(), RecordError> {
    if !id.is_valid_slug() {
        return Err(RecordError::InvalidId(id.clone()));
    }
    if effect.is_none() && (effect_potency != 0 || effect_duration_sec != 0) {
        return Err(RecordError::EffectlessPotency {
            id: id.clone(),
            potency: effect_potency,
            duration_sec: effect_duration_sec,
        });
    }
    if let Some(subcategory) = subcategory {
        if category != Category::MonsterPart {
            return Err(RecordError::StraySubcategory {
                id: id.clone(),
                category,
                subcategory,
            });
        }
    }
    if !hearts.is_finite() || hearts < 0. {
        return Err(RecordError::InvalidHearts {
            id: id.clone(),
            hearts,
        });
    }
    Ok(())
}

#[derive(Clone, PartialEq, Debug, Error)]
pub enum RecordError {
    #[error("Id {0:?} is not a lowercase hyphenated slug")]
    InvalidId(IngredientId),
    #[error("{id}: effect is null but potency is {potency} and duration is {duration_sec}s")]
    EffectlessPotency {
        id: IngredientId,
        potency: u32,
        duration_sec: u32,
    },
    #[error("{id}: subcategory {subcategory} is only allowed for monster parts, not {category}")]
    StraySubcategory {
        id: IngredientId,
        category: Category,
        subcategory: Subcategory,
    },
    #[error("{id}: category {category} implies type {expected}, but {found} was given")]
    TypeMismatch {
        id: IngredientId,
        category: Category,
        expected: IngredientType,
        found: IngredientType,
    },
    #[error("{id}: hearts must be a finite non-negative number, found {hearts}")]
    InvalidHearts { id: IngredientId, hearts: f64 },
}

/// A dataset row as it appears in JSON, before any invariant is checked.
#[derive(Clone, PartialEq, Debug, TypedBuilder, Serialize, Deserialize)]
pub struct IngredientRecordRaw {
    #[builder(setter(into))]
    pub id: IngredientId,
    #[builder(setter(into))]
    pub name: IngredientName,
    pub category: Category,
    #[serde(default)]
    #[builder(default)]
    pub subcategory: Option<Subcategory>,
    #[serde(default)]
    #[builder(default)]
    pub effect: Option<Effect>,
    #[serde(default)]
    #[builder(default)]
    pub effect_potency: u32,
    #[serde(default)]
    #[builder(default)]
    pub effect_duration_sec: u32,
    #[serde(default)]
    #[builder(default)]
    pub hearts: f64,
    #[serde(default)]
    #[builder(default)]
    pub sell_price: u32,
    #[serde(rename = "type", default)]
    #[builder(default)]
    pub ingredient_type: Option<IngredientType>,
    #[serde(default)]
    #[builder(default, setter(into))]
    pub icon: IconPath,
    #[serde(default)]
    #[builder(default)]
    pub fuse_value: Option<i64>,
}

impl IngredientRecordRaw {
    /// Fixes the violations that have an obvious repair and returns them.
    ///
    /// Only legacy dataset rows are repaired this way; candidates are rejected instead.
    pub fn repair(&mut self) -> Vec<RecordError> {
        let mut repaired = vec![];
        if self.effect.is_none() && (self.effect_potency != 0 || self.effect_duration_sec != 0) {
            repaired.push(RecordError::EffectlessPotency {
                id: self.id.clone(),
                potency: self.effect_potency,
                duration_sec: self.effect_duration_sec,
            });
            self.effect_potency = 0;
            self.effect_duration_sec = 0;
        }
        if let Some(subcategory) = self.subcategory {
            if self.category != Category::MonsterPart {
                repaired.push(RecordError::StraySubcategory {
                    id: self.id.clone(),
                    category: self.category,
                    subcategory,
                });
                self.subcategory = None;
            }
        }
        let expected = self.category.ingredient_type();
        if let Some(found) = self.ingredient_type {
            if found != expected {
                repaired.push(RecordError::TypeMismatch {
                    id: self.id.clone(),
                    category: self.category,
                    expected,
                    found,
                });
            }
        }
        self.ingredient_type = Some(expected);
        repaired
    }
}

impl TryFrom<IngredientRecordRaw> for IngredientRecord {
    type Error = RecordError;

    fn try_from(raw: IngredientRecordRaw) -> Result<Self, Self::Error> {
        validate_fields(
            &raw.id,
            raw.category,
            raw.subcategory,
            raw.effect,
            raw.effect_potency,
            raw.effect_duration_sec,
            raw.hearts,
        )?;
        let expected = raw.category.ingredient_type();
        if let Some(found) = raw.ingredient_type {
            if found != expected {
                return Err(RecordError::TypeMismatch {
                    id: raw.id,
                    category: raw.category,
                    expected,
                    found,
                });
            }
        }
        Ok(Self {
            id: raw.id,
            name: raw.name,
            category: raw.category,
            subcategory: raw.subcategory,
            effect: raw.effect,
            effect_potency: raw.effect_potency,
            effect_duration_sec: raw.effect_duration_sec,
            hearts: raw.hearts,
            sell_price: raw.sell_price,
            icon: raw.icon,
            fuse_value: raw.fuse_value,
        })
    }
}

impl From<IngredientRecord> for IngredientRecordRaw {
    fn from(record: IngredientRecord) -> Self {
        let ingredient_type = Some(record.ingredient_type());
        Self {
            id: record.id,
            name: record.name,
            category: record.category,
            subcategory: record.subcategory,
            effect: record.effect,
            effect_potency: record.effect_potency,
            effect_duration_sec: record.effect_duration_sec,
            hearts: record.hearts,
            sell_price: record.sell_price,
            ingredient_type,
            icon: record.icon,
            fuse_value: record.fuse_value,
        }
    }
}

impl Display for IngredientRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
