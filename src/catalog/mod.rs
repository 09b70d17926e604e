//! Curated ingredients that are added to the dataset by the `expand` pass.

use anyhow::Context;
use serde::Deserialize;

use crate::schema::{
    Category, Effect, IconPath, IngredientId, IngredientName, IngredientRecord, IngredientRecordRaw,
};

const NEW_INGREDIENTS: &str = include_str!("new_ingredients.toml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    ingredient: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogEntry {
    id: String,
    name: String,
    category: Category,
    #[serde(default)]
    effect: Option<Effect>,
    #[serde(default)]
    effect_potency: u32,
    #[serde(default)]
    effect_duration_sec: u32,
    #[serde(default)]
    hearts: f64,
    #[serde(default)]
    sell_price: u32,
}

impl CatalogEntry {
    fn into_record(self, icon_prefix: &str) -> anyhow::Result<IngredientRecord> {
        let id = IngredientId::from(self.id);
        let raw = IngredientRecordRaw {
            icon: IconPath::for_id(icon_prefix, &id),
            id,
            name: IngredientName::from(self.name),
            category: self.category,
            subcategory: None,
            effect: self.effect,
            effect_potency: self.effect_potency,
            effect_duration_sec: self.effect_duration_sec,
            hearts: self.hearts,
            sell_price: self.sell_price,
            ingredient_type: None,
            fuse_value: None,
        };
        Ok(IngredientRecord::try_from(raw)?)
    }
}

/// Complete candidates for every curated ingredient, in catalog order.
pub fn new_ingredients(icon_prefix: &str) -> anyhow::Result<Vec<IngredientRecord>> {
    let file: CatalogFile =
        toml::from_str(NEW_INGREDIENTS).context("While parsing the curated catalog")?;
    file.ingredient
        .into_iter()
        .map(|entry| {
            let id = entry.id.clone();
            entry
                .into_record(icon_prefix)
                .with_context(|| format!("Invalid catalog entry {id:?}"))
        })
        .collect()
}
