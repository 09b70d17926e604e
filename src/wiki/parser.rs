use std::borrow::Cow;

use indexmap::IndexMap;
use ingredient_scraping_utils::{regex, selector};
use itertools::Itertools;
use log::{debug, trace};
use scraper::{ElementRef, Html};
use thiserror::Error;
use url::Url;

use crate::{
    schema::{
        Category, IconPath, IngredientId, IngredientName, IngredientRecord, IngredientRecordRaw,
        RecordError,
    },
    tables::EffectPhrases,
};

fn element_text(e: ElementRef) -> String {
    e.text().map(str::trim).filter(|x| !x.is_empty()).join(" ")
}

/// Label-value pairs of the first infobox of a page.
#[derive(Clone, Debug, Default)]
pub struct Infobox {
    fields: IndexMap<String, String>,
    icon_src: Option<String>,
}

impl Infobox {
    /// Reads the portable infobox, or the first `table.wikitable` if there is none.
    pub fn parse(html: &Html) -> Option<Self> {
        if let Some(aside) = html.select(selector!("aside.portable-infobox")).next() {
            let fields = aside
                .select(selector!("div.pi-item"))
                .filter_map(|item| {
                    let label = item.select(selector!(".pi-data-label")).next()?;
                    let value = item.select(selector!(".pi-data-value")).next()?;
                    Some((element_text(label), element_text(value)))
                })
                .collect();
            return Some(Self {
                fields,
                icon_src: aside.select(selector!("img")).next().and_then(image_source),
            });
        }
        let table = html.select(selector!("table.wikitable")).next()?;
        let fields = table
            .select(selector!("tr"))
            .filter_map(|row| {
                let label = row.select(selector!("th")).next()?;
                let value = row.select(selector!("td")).next()?;
                Some((element_text(label), element_text(value)))
            })
            .collect();
        Some(Self {
            fields,
            icon_src: table.select(selector!("img")).next().and_then(image_source),
        })
    }

    /// Value whose trimmed label equals `label` exactly.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields.get(label).map(|x| x.as_str())
    }

    /// Value of the first of `labels` present, ignoring ASCII case.
    pub fn get_any(&self, labels: &[&str]) -> Option<&str> {
        labels.iter().find_map(|label| {
            self.fields
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(label))
                .map(|(_, value)| value.as_str())
        })
    }

    /// Source of the first image inside the infobox.
    pub fn icon_src(&self) -> Option<&str> {
        self.icon_src.as_deref()
    }
}

pub fn extract_labeled_field(html: &Html, label: &str) -> Option<String> {
    Infobox::parse(html)?.get(label).map(str::to_owned)
}

fn first_integer(text: &str) -> Option<u32> {
    regex!(r"\d+").find(text)?.as_str().parse().ok()
}

/// Rupee value listed for this game, else the first rupee value, e.g. `BotW: 3 Rupees TotK: 5 Rupees`.
pub fn parse_sell_price(text: &str) -> Option<u32> {
    regex!(r"(?:TotK|Tears of the Kingdom)[^0-9]*?(\d+)\s*Rupees")
        .captures(text)
        .or_else(|| regex!(r"(\d+)\s*Rupees").captures(text))?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// First integer of the text; 1 if the text has none but an effect was found, else 0.
pub fn parse_potency(text: Option<&str>, effect_found: bool) -> u32 {
    text.and_then(first_integer)
        .unwrap_or(if effect_found { 1 } else { 0 })
}

/// `m:ss` in seconds, else the first integer, else 0. An `m:ss` too large for `u32` gives 0.
pub fn parse_duration(text: Option<&str>) -> u32 {
    let Some(text) = text else { return 0 };
    if let Some(captures) = regex!(r"(\d+):(\d+)").captures(text) {
        let minutes: u32 = captures[1].parse().unwrap_or(0);
        let seconds: u32 = captures[2].parse().unwrap_or(0);
        return minutes
            .checked_mul(60)
            .and_then(|x| x.checked_add(seconds))
            .unwrap_or(0);
    }
    first_integer(text).unwrap_or(0)
}

pub fn parse_hearts(text: Option<&str>) -> f64 {
    text.and_then(|text| regex!(r"\d+(?:\.\d+)?").find(text))
        .and_then(|x| x.as_str().parse().ok())
        .unwrap_or(0.)
}

/// Fandom thumbnails carry their scaling after `/revision/`; this asks for the original file.
pub fn strip_revision(src: &str) -> Cow<str> {
    match src.split_once("/revision/") {
        Some((head, _)) => format!("{head}/revision/latest?format=original").into(),
        None => src.into(),
    }
}

fn image_source(img: ElementRef) -> Option<String> {
    let value = img.value();
    [value.attr("src"), value.attr("data-src")]
        .into_iter()
        .flatten()
        .find(|x| !x.is_empty() && !x.starts_with("data:"))
        .map(str::to_owned)
}

/// Decoded file name of an image URL, ignoring the query and any Fandom revision suffix.
fn file_name(src: &str) -> String {
    let path = src.split_once("/revision/").map_or(src, |x| x.0);
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let name = path.rsplit('/').next().unwrap_or(path);
    urlencoding::decode(name).map_or_else(|_| name.to_owned(), |x| x.into_owned())
}

fn is_full_size_icon(file_name: &str, game: &str) -> bool {
    file_name.starts_with(&format!("{game}_"))
        && file_name.contains("_Icon.png")
        && !file_name.contains("px-")
}

/// Inventory icon of `name`: `TotK_<Name>_Icon.png` if present,
/// else the last full-size `TotK_*_Icon.png`, else the first full-size `BotW_*_Icon.png`.
pub fn find_icon_url(html: &Html, name: &str) -> Option<String> {
    let base = name.trim().replace(' ', "_");
    let expected = [
        format!("TotK_{base}_Icon.png"),
        format!("TotK_{}_Icon.png", base.replace(['\'', '\u{2019}'], "")),
    ];
    let sources = html
        .select(selector!("img"))
        .filter_map(image_source)
        .collect_vec();

    let mut fallback = None;
    for src in &sources {
        let file = file_name(src);
        if expected.contains(&file) {
            return Some(src.clone());
        }
        if is_full_size_icon(&file, "TotK") {
            fallback = Some(src);
        }
    }
    fallback
        .or_else(|| {
            sources
                .iter()
                .find(|src| is_full_size_icon(&file_name(src), "BotW"))
        })
        .cloned()
}

/// Resolves protocol-relative and root-relative sources against the wiki URL.
pub fn absolutize(base: &Url, src: &str) -> Option<Url> {
    base.join(src).ok()
}

pub fn page_title(html: &Html, url: &Url) -> String {
    if let Some(h1) = html.select(selector!("h1.page-header__title")).next() {
        let title = element_text(h1);
        if !title.is_empty() {
            return title;
        }
    }
    let segment = url
        .path_segments()
        .and_then(|x| x.last())
        .unwrap_or_default();
    urlencoding::decode(segment)
        .map_or_else(|_| segment.to_owned(), |x| x.into_owned())
        .replace('_', " ")
}

/// Article links of a category page. Links to other namespaces and anchors are ignored.
pub fn category_members(html: &Html, base: &Url) -> Vec<Url> {
    let mut links = html
        .select(selector!(
            "div.category-page__members a.category-page__member-link"
        ))
        .peekable();
    let links = if links.peek().is_some() {
        links.collect_vec()
    } else {
        html.select(selector!("div#mw-pages a")).collect_vec()
    };
    links
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !href.is_empty() && !href.contains([':', '#']))
        .filter_map(|href| absolutize(base, href))
        .unique()
        .collect()
}

#[derive(Clone, Debug)]
pub struct ScrapedPage {
    pub record: IngredientRecord,
    pub icon_url: Option<Url>,
}

#[derive(Debug, Error)]
pub enum PageRejection {
    #[error("No infobox found at {0}")]
    NoInfobox(Url),
    #[error("No usable title at {0}")]
    NoTitle(Url),
    #[error(transparent)]
    InvalidRecord(#[from] RecordError),
}

/// Builds a complete candidate from an ingredient article.
///
/// Potency and duration are read only when the effect is recognized,
/// so a page never yields potency without an effect.
pub fn parse_ingredient_page(
    html: &Html,
    url: &Url,
    category: Category,
    effect_names: &EffectPhrases,
    icon_prefix: &str,
) -> Result<ScrapedPage, PageRejection> {
    let infobox = Infobox::parse(html).ok_or_else(|| PageRejection::NoInfobox(url.clone()))?;
    let name = page_title(html, url);
    let id = IngredientId::from_name(&name);
    if id.as_str().is_empty() {
        return Err(PageRejection::NoTitle(url.clone()));
    }
    trace!("{url}: {infobox:?}");

    let effect = infobox
        .get_any(&["effect", "cooking effect"])
        .and_then(|x| effect_names.find_in(x));
    let (effect_potency, effect_duration_sec) = match effect {
        Some(_) => (
            parse_potency(infobox.get_any(&["effect potency", "potency"]), true),
            parse_duration(infobox.get_any(&["duration", "effect duration"])),
        ),
        None => (0, 0),
    };
    let sell_price = infobox
        .get_any(&["selling price", "sell price", "value"])
        .and_then(|x| parse_sell_price(x).or_else(|| first_integer(x)))
        .unwrap_or(0);

    let raw = IngredientRecordRaw {
        icon: IconPath::for_id(icon_prefix, &id),
        id,
        name: IngredientName::from(name),
        category,
        subcategory: None,
        effect,
        effect_potency,
        effect_duration_sec,
        hearts: parse_hearts(infobox.get_any(&["hearts restored", "hearts"])),
        sell_price,
        ingredient_type: None,
        fuse_value: None,
    };
    let icon_url = infobox
        .icon_src()
        .and_then(|src| absolutize(url, &strip_revision(src)));
    debug!("Parsed {} from {url}", raw.name);
    Ok(ScrapedPage {
        record: IngredientRecord::try_from(raw)?,
        icon_url,
    })
}
