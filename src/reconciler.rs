//! Merging newly observed data into the ingredient collection.
//!
//! Everything here is pure: the passes in [`crate::collector`] gather
//! candidates and observations, and this module decides what changes.

use hashbrown::{HashMap, HashSet};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use thiserror::Error;

use crate::{
    normalize::{normalize_name, NormalizedName},
    schema::{Category, Effect, IconPath, IngredientId, IngredientRecord, RecordError, Subcategory},
    tables::{FuseOverrideTable, PrimaryFuseTable, SubcategoryTable},
};

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct MergeReport {
    pub added: Vec<IngredientId>,
    pub skipped: Vec<IngredientId>,
}

/// Appends every candidate that is not already present and re-sorts the collection.
///
/// A candidate is a duplicate if its id is taken, or if its normalized name
/// equals that of a record with another id.
/// Duplicates are skipped; existing records are never touched.
pub fn merge_new_records(
    mut existing: Vec<IngredientRecord>,
    candidates: impl IntoIterator<Item = IngredientRecord>,
) -> (Vec<IngredientRecord>, MergeReport) {
    let mut ids: HashSet<IngredientId> = existing.iter().map(|x| x.id().clone()).collect();
    let mut names: HashMap<NormalizedName, IngredientId> = existing
        .iter()
        .map(|x| (normalize_name(x.name().as_str()), x.id().clone()))
        .collect();
    let mut report = MergeReport::default();

    for candidate in candidates {
        let id = candidate.id().clone();
        if ids.contains(&id) {
            debug!("{id} already exists");
            report.skipped.push(id);
            continue;
        }
        let name = normalize_name(candidate.name().as_str());
        if let Some(other) = names.get(&name) {
            warn!(
                "{} ({id}) has the same name as {other}; skipping it",
                candidate.name()
            );
            report.skipped.push(id);
            continue;
        }
        ids.insert(id.clone());
        names.insert(name, id.clone());
        existing.push(candidate);
        report.added.push(id);
    }

    sort_records(&mut existing);
    (existing, report)
}

/// Stable sort by `(type, category, name)`, comparing the strings written to disk.
pub fn sort_records(records: &mut [IngredientRecord]) {
    records.sort_by(|x, y| x.sort_key().cmp(&y.sort_key()));
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EnrichPolicy {
    /// Write whenever a value was observed.
    OverwriteAlways,
    /// Write only while the current value is null, zero or empty.
    FillIfAbsent,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    Effect,
    SellPrice,
    Icon,
    FuseValue,
    Hearts,
}
impl Field {
    pub fn default_policy(self) -> EnrichPolicy {
        match self {
            Field::Effect | Field::Hearts => EnrichPolicy::FillIfAbsent,
            Field::SellPrice | Field::Icon | Field::FuseValue => EnrichPolicy::OverwriteAlways,
        }
    }
}

/// A freshly observed value for one field. `None` means the source had no usable value.
#[derive(Clone, PartialEq, Debug)]
pub enum Observation {
    /// Effect, potency and duration always travel together.
    Effect {
        effect: Option<Effect>,
        potency: u32,
        duration_sec: u32,
    },
    SellPrice(Option<u32>),
    Icon(Option<IconPath>),
    FuseValue(Option<i64>),
    Hearts(Option<f64>),
}
impl Observation {
    pub fn field(&self) -> Field {
        match self {
            Observation::Effect { .. } => Field::Effect,
            Observation::SellPrice(_) => Field::SellPrice,
            Observation::Icon(_) => Field::Icon,
            Observation::FuseValue(_) => Field::FuseValue,
            Observation::Hearts(_) => Field::Hearts,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Enrichment {
    Updated,
    /// Nothing observed, the policy kept the current value, or the value was already equal.
    Retained,
    /// The observation would have broken a record invariant.
    Rejected,
}

/// Applies one observation to `record` under `policy`.
pub fn enrich_field(
    record: &mut IngredientRecord,
    observation: Observation,
    policy: EnrichPolicy,
) -> Enrichment {
    let fill_only = policy == EnrichPolicy::FillIfAbsent;
    let outcome = match observation {
        Observation::Effect {
            effect: None,
            potency: 0,
            duration_sec: 0,
        } => Enrichment::Retained,
        Observation::Effect { effect: None, .. } => Enrichment::Rejected,
        Observation::Effect {
            effect: Some(effect),
            potency,
            duration_sec,
        } => {
            let current = (record.effect, record.effect_potency, record.effect_duration_sec);
            if fill_only && record.effect.is_some() {
                Enrichment::Retained
            } else if current == (Some(effect), potency, duration_sec) {
                Enrichment::Retained
            } else {
                record.effect = Some(effect);
                record.effect_potency = potency;
                record.effect_duration_sec = duration_sec;
                Enrichment::Updated
            }
        }
        Observation::SellPrice(value) => {
            let present = record.sell_price != 0;
            assign(&mut record.sell_price, value, fill_only && present)
        }
        Observation::Icon(Some(value)) if value.is_empty() => Enrichment::Retained,
        Observation::Icon(value) => {
            let present = !record.icon.is_empty();
            assign(&mut record.icon, value, fill_only && present)
        }
        Observation::FuseValue(value) => {
            let present = record.fuse_value.is_some();
            assign(&mut record.fuse_value, value.map(Some), fill_only && present)
        }
        Observation::Hearts(Some(value)) if !value.is_finite() || value < 0. => {
            Enrichment::Rejected
        }
        Observation::Hearts(value) => {
            let present = record.hearts != 0.;
            assign(&mut record.hearts, value, fill_only && present)
        }
    };
    if outcome == Enrichment::Rejected {
        warn!("{record}: rejected an observation that would break the record invariants");
    }
    outcome
}

fn assign<T: PartialEq>(slot: &mut T, value: Option<T>, keep_current: bool) -> Enrichment {
    match value {
        Some(value) if !keep_current && *slot != value => {
            *slot = value;
            Enrichment::Updated
        }
        _ => Enrichment::Retained,
    }
}

/// [`enrich_field`] with the policy registered for the observed field.
pub fn enrich_with_default_policy(
    record: &mut IngredientRecord,
    observation: Observation,
) -> Enrichment {
    let policy = observation.field().default_policy();
    enrich_field(record, observation, policy)
}

/// Gives every monster part a subcategory, falling back to [`Subcategory::Other`].
///
/// Returns the assigned subcategory, or `None` for other categories, which are left as they are.
pub fn assign_subcategory(
    record: &mut IngredientRecord,
    table: &SubcategoryTable,
) -> Option<Subcategory> {
    if record.category != Category::MonsterPart {
        return None;
    }
    let subcategory = table.get(&record.id).unwrap_or(Subcategory::Other);
    record.subcategory = Some(subcategory);
    Some(subcategory)
}

/// Resolves the fuse value: spreadsheet name match first, then the id override, else unknown.
pub fn lookup_fuse_value(
    record: &IngredientRecord,
    primary: &PrimaryFuseTable,
    overrides: &FuseOverrideTable,
) -> Option<i64> {
    primary
        .get(&normalize_name(record.name.as_str()))
        .or_else(|| overrides.get(&record.id))
}

#[derive(Clone, PartialEq, Debug, Error)]
pub enum InvariantViolation {
    #[error("Duplicating id: {0}")]
    DuplicateId(IngredientId),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("{id} at position {index} is out of (type, category, name) order")]
    Unsorted { index: usize, id: IngredientId },
}

/// Every violation of the collection invariants, in collection order.
pub fn check_invariants(records: &[IngredientRecord]) -> Vec<InvariantViolation> {
    let mut violations = vec![];
    let mut ids = HashSet::new();
    for (index, record) in records.iter().enumerate() {
        if !ids.insert(record.id()) {
            violations.push(InvariantViolation::DuplicateId(record.id().clone()));
        }
        if let Err(e) = record.validate() {
            violations.push(e.into());
        }
        if index > 0 && records[index - 1].sort_key() > record.sort_key() {
            violations.push(InvariantViolation::Unsorted {
                index,
                id: record.id().clone(),
            });
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use crate::{
        normalize::normalize_name,
        schema::{
            Category, Effect, IconPath, IngredientId, IngredientRecord, IngredientRecordRaw,
            IngredientType, Subcategory,
        },
        tables::{FuseOverrideTable, PrimaryFuseTable, SubcategoryTable},
    };

    use super::{
        assign_subcategory, check_invariants, enrich_field, enrich_with_default_policy,
        lookup_fuse_value, merge_new_records, sort_records, EnrichPolicy, Enrichment, Field,
        InvariantViolation, Observation,
    };

    fn record(id: &str, name: &str, category: Category) -> IngredientRecord {
        IngredientRecordRaw::builder()
            .id(id)
            .name(name)
            .category(category)
            .sell_price(5)
            .icon(IconPath::for_id("images/ingredients", &id.into()))
            .build()
            .try_into()
            .unwrap()
    }

    fn with_effect(id: &str, name: &str, effect: Effect, potency: u32) -> IngredientRecord {
        IngredientRecordRaw::builder()
            .id(id)
            .name(name)
            .category(Category::Fruit)
            .effect(Some(effect))
            .effect_potency(potency)
            .icon(IconPath::for_id("images/ingredients", &id.into()))
            .build()
            .try_into()
            .unwrap()
    }

    fn ids(records: &[IngredientRecord]) -> Vec<&str> {
        records.iter().map(|x| x.id().as_str()).collect()
    }

    fn assert_consistent(records: &[IngredientRecord]) {
        let violations = check_invariants(records);
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn test_merge_into_empty() {
        let apple = with_effect("golden-apple", "Golden Apple", Effect::Hearty, 1);
        let (updated, report) = merge_new_records(vec![], [apple.clone()]);
        assert_eq!(updated, vec![apple]);
        assert_eq!(report.added, vec![IngredientId::from("golden-apple")]);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_merge_skips_existing_id() {
        let curated = with_effect("golden-apple", "Golden Apple", Effect::Hearty, 3);
        let noisy = with_effect("golden-apple", "Golden Apple", Effect::Hearty, 1);
        let (updated, report) = merge_new_records(vec![curated.clone()], [noisy]);
        assert_eq!(updated, vec![curated]);
        assert!(report.added.is_empty());
        assert_eq!(report.skipped, vec![IngredientId::from("golden-apple")]);
    }

    #[test]
    fn test_merge_is_idempotent_and_sorted() {
        let existing = vec![
            record("hylian-tomato", "Hylian Tomato", Category::Vegetable),
            record("bokoblin-horn", "Bokoblin Horn", Category::MonsterPart),
        ];
        let candidates = vec![
            record("sticky-frog", "Sticky Frog", Category::Frog),
            record("farosh-scale", "Farosh's Scale", Category::DragonPart),
            record("palm-fruit", "Palm Fruit", Category::Fruit),
            record("apple", "Apple", Category::Fruit),
            record("amber", "Amber", Category::Mineral),
        ];

        let (once, report) = merge_new_records(existing.clone(), candidates.clone());
        assert_eq!(report.added.len(), 5);
        assert_eq!(
            ids(&once),
            [
                "sticky-frog",
                "farosh-scale",
                "apple",
                "palm-fruit",
                "hylian-tomato",
                "amber",
                "bokoblin-horn",
            ]
        );
        assert_consistent(&once);
        for record in &existing {
            assert!(once.contains(record));
        }

        let (twice, report) = merge_new_records(once.clone(), candidates);
        assert_eq!(twice, once);
        assert!(report.added.is_empty());
        assert_eq!(report.skipped.len(), 5);
    }

    #[test]
    fn test_merge_skips_same_name_and_repeated_candidates() {
        let existing = vec![record("dinraals-claw", "Dinraal's Claw", Category::DragonPart)];
        let candidates = vec![
            record("dinarals-claw", "Dinraal’s Claw", Category::DragonPart),
            record("fire-fruit", "Fire Fruit", Category::Fruit),
            record("fire-fruit", "Fire Fruit", Category::Fruit),
        ];
        let (updated, report) = merge_new_records(existing, candidates);
        assert_eq!(ids(&updated), ["dinraals-claw", "fire-fruit"]);
        assert_eq!(report.added, vec![IngredientId::from("fire-fruit")]);
        assert_eq!(
            report.skipped,
            vec![IngredientId::from("dinarals-claw"), IngredientId::from("fire-fruit")]
        );
    }

    #[test]
    fn test_sort_uses_string_order() {
        // "dragon" < "food" as strings, although Food is declared first.
        let mut records = vec![
            record("apple", "Apple", Category::Fruit),
            record("farosh-scale", "Farosh's Scale", Category::DragonPart),
            record("acorn", "Acorn", Category::Nut),
            record("zapshroom", "Zapshroom", Category::Mushroom),
            record("big-hearty-radish", "Big Hearty Radish", Category::Vegetable),
            record("banana", "Banana", Category::Fruit),
        ];
        sort_records(&mut records);
        assert_eq!(
            ids(&records),
            ["farosh-scale", "apple", "banana", "zapshroom", "acorn", "big-hearty-radish"]
        );
        assert_eq!(records[0].ingredient_type(), IngredientType::Dragon);
    }

    #[test]
    fn test_fill_if_absent_effect() {
        let mut apple = record("apple", "Apple", Category::Fruit);
        let outcome = enrich_field(
            &mut apple,
            Observation::Effect {
                effect: Some(Effect::Hearty),
                potency: 1,
                duration_sec: 0,
            },
            EnrichPolicy::FillIfAbsent,
        );
        assert_eq!(outcome, Enrichment::Updated);
        assert_eq!(apple.effect(), Some(Effect::Hearty));
        assert_eq!(apple.effect_potency(), 1);

        let outcome = enrich_field(
            &mut apple,
            Observation::Effect {
                effect: Some(Effect::AttackUp),
                potency: 2,
                duration_sec: 60,
            },
            EnrichPolicy::FillIfAbsent,
        );
        assert_eq!(outcome, Enrichment::Retained);
        assert_eq!(apple.effect(), Some(Effect::Hearty));
        assert_eq!(apple.effect_potency(), 1);
        assert_eq!(apple.effect_duration_sec(), 0);
    }

    #[test]
    fn test_overwrite_always_replaces_effect() {
        let mut apple = with_effect("apple", "Apple", Effect::Hearty, 1);
        let outcome = enrich_field(
            &mut apple,
            Observation::Effect {
                effect: Some(Effect::AttackUp),
                potency: 2,
                duration_sec: 60,
            },
            EnrichPolicy::OverwriteAlways,
        );
        assert_eq!(outcome, Enrichment::Updated);
        assert_eq!(apple.effect(), Some(Effect::AttackUp));
        assert_eq!(apple.effect_potency(), 2);
        assert_eq!(apple.effect_duration_sec(), 60);

        let outcome = enrich_field(
            &mut apple,
            Observation::Effect {
                effect: Some(Effect::AttackUp),
                potency: 2,
                duration_sec: 60,
            },
            EnrichPolicy::OverwriteAlways,
        );
        assert_eq!(outcome, Enrichment::Retained);
    }

    #[test]
    fn test_effectless_potency_is_rejected() {
        let mut apple = record("apple", "Apple", Category::Fruit);
        let before = apple.clone();
        let outcome = enrich_field(
            &mut apple,
            Observation::Effect {
                effect: None,
                potency: 2,
                duration_sec: 90,
            },
            EnrichPolicy::OverwriteAlways,
        );
        assert_eq!(outcome, Enrichment::Rejected);
        assert_eq!(apple, before);
        assert_consistent(&[apple]);
    }

    #[test]
    fn test_overwrite_always_keeps_value_on_missing_observation() {
        let mut apple = record("apple", "Apple", Category::Fruit);
        assert_eq!(
            enrich_field(
                &mut apple,
                Observation::SellPrice(None),
                EnrichPolicy::OverwriteAlways
            ),
            Enrichment::Retained
        );
        assert_eq!(apple.sell_price(), 5);

        assert_eq!(
            enrich_with_default_policy(&mut apple, Observation::SellPrice(Some(8))),
            Enrichment::Updated
        );
        assert_eq!(apple.sell_price(), 8);

        assert_eq!(
            enrich_with_default_policy(&mut apple, Observation::SellPrice(Some(8))),
            Enrichment::Retained
        );

        let icon = IconPath::from("images/ingredients/apple-2.png".to_owned());
        enrich_with_default_policy(&mut apple, Observation::Icon(Some(icon.clone())));
        assert_eq!(apple.icon(), &icon);
        enrich_with_default_policy(&mut apple, Observation::Icon(Some(IconPath::default())));
        assert_eq!(apple.icon(), &icon);
    }

    #[test]
    fn test_fill_if_absent_scalars() {
        let mut apple = record("apple", "Apple", Category::Fruit);
        assert_eq!(
            enrich_field(
                &mut apple,
                Observation::SellPrice(Some(9)),
                EnrichPolicy::FillIfAbsent
            ),
            Enrichment::Retained
        );
        assert_eq!(
            enrich_field(
                &mut apple,
                Observation::FuseValue(Some(3)),
                EnrichPolicy::FillIfAbsent
            ),
            Enrichment::Updated
        );
        assert_eq!(
            enrich_field(
                &mut apple,
                Observation::FuseValue(Some(4)),
                EnrichPolicy::FillIfAbsent
            ),
            Enrichment::Retained
        );
        assert_eq!(apple.fuse_value(), Some(3));

        assert_eq!(
            enrich_with_default_policy(&mut apple, Observation::Hearts(Some(-1.))),
            Enrichment::Rejected
        );
        assert_eq!(
            enrich_with_default_policy(&mut apple, Observation::Hearts(Some(0.5))),
            Enrichment::Updated
        );
        assert_eq!(
            enrich_with_default_policy(&mut apple, Observation::Hearts(Some(2.))),
            Enrichment::Retained
        );
        assert_eq!(apple.hearts(), 0.5);
    }

    #[test]
    fn test_default_policies() {
        assert_eq!(Field::Effect.default_policy(), EnrichPolicy::FillIfAbsent);
        assert_eq!(
            Field::SellPrice.default_policy(),
            EnrichPolicy::OverwriteAlways
        );
        assert_eq!(Field::Icon.default_policy(), EnrichPolicy::OverwriteAlways);
        assert_eq!(
            Observation::FuseValue(None).field().to_string(),
            "fuse_value"
        );
        assert_eq!(
            "fill-if-absent".parse::<EnrichPolicy>().unwrap(),
            EnrichPolicy::FillIfAbsent
        );
    }

    #[test]
    fn test_assign_subcategory() {
        let table: SubcategoryTable = [(IngredientId::from("keese-wing"), Subcategory::Wings)]
            .into_iter()
            .collect();
        let mut records = vec![
            record("keese-wing", "Keese Wing", Category::MonsterPart),
            record("lynel-guts", "Lynel Guts", Category::MonsterPart),
            record("apple", "Apple", Category::Fruit),
        ];
        let assigned = records
            .iter_mut()
            .map(|x| assign_subcategory(x, &table))
            .collect_vec();
        assert_eq!(
            assigned,
            [Some(Subcategory::Wings), Some(Subcategory::Other), None]
        );
        assert!(records
            .iter()
            .filter(|x| x.category() == Category::MonsterPart)
            .all(|x| x.subcategory().is_some()));
        assert_eq!(records[2].subcategory(), None);
        sort_records(&mut records);
        assert_consistent(&records);
    }

    #[test]
    fn test_lookup_fuse_value() {
        let primary: PrimaryFuseTable = [("Keese Wing", 2), ("Frox Fingernail", 9)]
            .into_iter()
            .collect();
        let overrides: FuseOverrideTable = [
            (IngredientId::from("frox-fang"), 14),
            (IngredientId::from("keese-wing"), 7),
        ]
            .into_iter()
            .collect();

        let fang = record("frox-fang", "Frox Fang", Category::MonsterPart);
        assert_eq!(primary.get(&normalize_name("Frox Fang")), None);
        assert_eq!(lookup_fuse_value(&fang, &primary, &overrides), Some(14));

        let wing = record("keese-wing", "Keese Wing", Category::MonsterPart);
        assert_eq!(lookup_fuse_value(&wing, &primary, &overrides), Some(2));

        let nail = record("frox-nail", "Frox fingernail", Category::MonsterPart);
        assert_eq!(lookup_fuse_value(&nail, &primary, &overrides), Some(9));

        let apple = record("apple", "Apple", Category::Fruit);
        assert_eq!(lookup_fuse_value(&apple, &primary, &overrides), None);
    }

    #[test]
    fn test_check_invariants() {
        let records = vec![
            record("apple", "Apple", Category::Fruit),
            record("amber", "Amber", Category::Mineral),
            record("apple", "Apple", Category::Fruit),
        ];
        let violations = check_invariants(&records);
        assert!(matches!(
            violations.as_slice(),
            [
                InvariantViolation::Unsorted { index: 2, .. },
                InvariantViolation::DuplicateId(_),
            ] | [
                InvariantViolation::DuplicateId(_),
                InvariantViolation::Unsorted { index: 2, .. },
            ]
        ));
    }
}
