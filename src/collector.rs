//! The four passes over the dataset.
//!
//! Each pass gathers candidates or observations from one source
//! and hands them to [`crate::reconciler`].

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    path::{Path, PathBuf},
};

use itertools::Itertools;
use log::{debug, info, warn};
use url::Url;

use crate::{
    catalog,
    config::Config,
    reconciler::{
        assign_subcategory, enrich_with_default_policy, lookup_fuse_value, merge_new_records,
        sort_records, Enrichment, Field, MergeReport, Observation,
    },
    schema::{IconPath, IngredientId, IngredientRecord, Subcategory},
    tables::{PrimaryFuseTable, Tables},
    wiki::{
        article_url, category_url,
        parser::{
            absolutize, category_members, find_icon_url, parse_ingredient_page, parse_sell_price,
            Infobox,
        },
        WikiSource,
    },
};

fn icon_dest(config: &Config, id: &IngredientId) -> PathBuf {
    config.paths.image_dir.join(format!("{id}.png"))
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IconFetch {
    AlreadyPresent,
    Downloaded,
    NotFound,
    Failed,
}

async fn download_if_missing(source: &impl WikiSource, url: &Url, dest: &Path) -> IconFetch {
    if dest.exists() {
        debug!("  [SKIP] {dest:?} already exists");
        IconFetch::AlreadyPresent
    } else if source.download_asset(url, dest).await {
        IconFetch::Downloaded
    } else {
        IconFetch::Failed
    }
}

/// Looks up the inventory icon on the article of `name` and stores it at `dest` unless present.
async fn fetch_article_icon(
    source: &impl WikiSource,
    base: &Url,
    name: &str,
    dest: &Path,
) -> anyhow::Result<IconFetch> {
    if dest.exists() {
        debug!("  [SKIP] {dest:?} already exists");
        return Ok(IconFetch::AlreadyPresent);
    }
    let url = article_url(base, name)?;
    let Some(icon_url) = source
        .fetch_document(&url)
        .await
        .and_then(|html| find_icon_url(&html, name))
        .and_then(|src| absolutize(&url, &src))
    else {
        warn!("  No icon found for {name}");
        return Ok(IconFetch::NotFound);
    };
    Ok(download_if_missing(source, &icon_url, dest).await)
}

/// Tally of icon fetches over one pass.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct IconReport {
    pub present: usize,
    pub downloaded: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl IconReport {
    pub fn count(&mut self, fetch: IconFetch) {
        match fetch {
            IconFetch::AlreadyPresent => self.present += 1,
            IconFetch::Downloaded => self.downloaded += 1,
            IconFetch::NotFound => self.not_found += 1,
            IconFetch::Failed => self.failed += 1,
        }
    }

    pub fn missing(&self) -> usize {
        self.not_found + self.failed
    }
}

impl Display for IconReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Icons: {} downloaded, {} already present, {} missing",
            self.downloaded,
            self.present,
            self.missing()
        )
    }
}

#[derive(Clone, Default, Debug)]
pub struct ScrapeReport {
    pub merge: MergeReport,
    pub failed_pages: Vec<Url>,
    pub icons: IconReport,
}

/// Walks every wiki category, parses each member page and merges the new ingredients.
pub async fn scrape(
    source: &impl WikiSource,
    tables: &Tables,
    config: &Config,
    records: Vec<IngredientRecord>,
) -> anyhow::Result<(Vec<IngredientRecord>, ScrapeReport)> {
    let wiki = &config.wiki;
    let mut candidates = vec![];
    let mut failed_pages = vec![];
    let mut icons = IconReport::default();

    for (wiki_category, &category) in &tables.wiki_categories {
        info!("--- Category: {wiki_category} -> {category} ---");
        let url = category_url(&wiki.fandom_base_url, &wiki.game_slug, wiki_category)?;
        let Some(listing) = source.fetch_document(&url).await else {
            continue;
        };
        let members = category_members(&listing, &url);
        drop(listing);
        info!("  Found {} pages", members.len());

        for page_url in members {
            let Some(html) = source.fetch_document(&page_url).await else {
                failed_pages.push(page_url);
                continue;
            };
            let page = parse_ingredient_page(
                &html,
                &page_url,
                category,
                &tables.effect_names,
                &config.paths.icon_prefix,
            );
            drop(html);
            match page {
                Ok(page) => {
                    let record = page.record;
                    info!(
                        "  {record} (effect={:?}, hearts={}, sell={})",
                        record.effect(),
                        record.hearts(),
                        record.sell_price()
                    );
                    let fetch = match &page.icon_url {
                        Some(icon_url) => {
                            download_if_missing(source, icon_url, &icon_dest(config, record.id()))
                                .await
                        }
                        None => IconFetch::NotFound,
                    };
                    icons.count(fetch);
                    candidates.push(record);
                }
                Err(e) => {
                    warn!("  {e}");
                    failed_pages.push(page_url);
                }
            }
        }
    }

    let (records, merge) = merge_new_records(records, candidates);
    info!(
        "Scraped: {} added, {} already present, {} pages failed",
        merge.added.len(),
        merge.skipped.len(),
        failed_pages.len()
    );
    for url in &failed_pages {
        warn!("  Failed page: {url}");
    }
    info!("{icons}");
    Ok((
        records,
        ScrapeReport {
            merge,
            failed_pages,
            icons,
        },
    ))
}

#[derive(Clone, Default, Debug)]
pub struct ExpandReport {
    pub merge: MergeReport,
    pub icons: IconReport,
}

/// Merges the curated catalog and fetches icons for the records it added.
pub async fn expand(
    source: &impl WikiSource,
    config: &Config,
    records: Vec<IngredientRecord>,
    fetch_icons: bool,
) -> anyhow::Result<(Vec<IngredientRecord>, ExpandReport)> {
    let candidates = catalog::new_ingredients(&config.paths.icon_prefix)?;
    info!(
        "Existing ingredients: {}, catalog entries: {}",
        records.len(),
        candidates.len()
    );
    let (records, merge) = merge_new_records(records, candidates);
    let mut icons = IconReport::default();

    if fetch_icons {
        for id in &merge.added {
            let Some(record) = records.iter().find(|x| x.id() == id) else {
                continue;
            };
            info!("  + {record}");
            let fetch = fetch_article_icon(
                source,
                &config.wiki.zeldawiki_base_url,
                record.name().as_str(),
                &icon_dest(config, id),
            )
            .await?;
            icons.count(fetch);
        }
    }
    info!(
        "Expanded: {} added, {} already existed, {} total",
        merge.added.len(),
        merge.skipped.len(),
        records.len()
    );
    if fetch_icons {
        info!("{icons}");
    }
    Ok((records, ExpandReport { merge, icons }))
}

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct RefreshReport {
    pub unavailable: Vec<IngredientId>,
    pub updated: BTreeMap<String, usize>,
    pub icons: IconReport,
}

impl RefreshReport {
    fn count(&mut self, field: Field, outcome: Enrichment) {
        if outcome == Enrichment::Updated {
            *self.updated.entry(field.to_string()).or_default() += 1;
        }
    }
}

impl Display for RefreshReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.icons)?;
        for (field, count) in &self.updated {
            writeln!(f, "  {field}: {count} updated")?;
        }
        write!(f, "  {} pages unavailable", self.unavailable.len())
    }
}

/// Re-reads every record's article: sell price, missing effect and icon.
pub async fn refresh(
    source: &impl WikiSource,
    tables: &Tables,
    config: &Config,
    records: &mut [IngredientRecord],
) -> anyhow::Result<RefreshReport> {
    let base = &config.wiki.zeldawiki_base_url;
    let mut report = RefreshReport::default();

    for record in records.iter_mut() {
        info!("  Fetching: {record}");
        let url = article_url(base, record.name().as_str())?;
        let dest = icon_dest(config, record.id());

        if let Some(html) = source.fetch_document(&url).await {
            let infobox = Infobox::parse(&html).unwrap_or_default();
            let sell_price = infobox.get("Value").and_then(parse_sell_price);
            let effect = infobox
                .get("Use(s)")
                .and_then(|x| tables.effect_keywords.find_in(x));
            let icon_url = find_icon_url(&html, record.name().as_str())
                .and_then(|src| absolutize(&url, &src));
            drop(html);

            let outcome = enrich_with_default_policy(record, Observation::SellPrice(sell_price));
            report.count(Field::SellPrice, outcome);
            if let Some(effect) = effect {
                let outcome = enrich_with_default_policy(
                    record,
                    Observation::Effect {
                        effect: Some(effect),
                        potency: 0,
                        duration_sec: 0,
                    },
                );
                report.count(Field::Effect, outcome);
            }

            let fetch = match icon_url {
                Some(icon_url) => {
                    debug!("  Icon: {icon_url}");
                    download_if_missing(source, &icon_url, &dest).await
                }
                None => {
                    warn!("  No icon found for {record}");
                    IconFetch::NotFound
                }
            };
            report.icons.count(fetch);
            let icon = IconPath::for_id(&config.paths.icon_prefix, record.id());
            let outcome = enrich_with_default_policy(record, Observation::Icon(Some(icon)));
            report.count(Field::Icon, outcome);
        } else {
            report.unavailable.push(record.id().clone());
            report.icons.count(if dest.exists() {
                IconFetch::AlreadyPresent
            } else {
                IconFetch::NotFound
            });
        }
    }
    sort_records(records);
    Ok(report)
}

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct FuseReport {
    pub matched: Vec<IngredientId>,
    pub unknown: Vec<IngredientId>,
    pub subcategories: BTreeMap<Subcategory, usize>,
}

impl Display for FuseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== fuse_value summary ===")?;
        writeln!(f, "  Matched (non-null): {}", self.matched.len())?;
        writeln!(f, "  Null (not found):   {}", self.unknown.len())?;
        for id in self.unknown.iter().sorted() {
            writeln!(f, "    - {id}")?;
        }
        write!(f, "=== subcategory summary (monster-parts) ===")?;
        for (subcategory, count) in &self.subcategories {
            write!(f, "\n  {:20}: {count}", subcategory.to_string())?;
        }
        Ok(())
    }
}

/// Sets `fuse_value` from the spreadsheet and override tables and gives monster parts a subcategory.
///
/// The value is recomputed on every run, so a record matched by neither table is reset to null.
pub fn update_fuse(
    tables: &Tables,
    primary: &PrimaryFuseTable,
    records: &mut [IngredientRecord],
) -> FuseReport {
    let mut report = FuseReport::default();
    for record in records.iter_mut() {
        let value = lookup_fuse_value(record, primary, &tables.fuse_overrides);
        if record.fuse_value != value {
            debug!("  {record}: fuse_value {:?} -> {value:?}", record.fuse_value);
        }
        record.fuse_value = value;
        match value {
            Some(_) => report.matched.push(record.id().clone()),
            None => report.unknown.push(record.id().clone()),
        }
        if let Some(subcategory) = assign_subcategory(record, &tables.subcategories) {
            *report.subcategories.entry(subcategory).or_default() += 1;
        }
    }
    sort_records(records);
    report
}
