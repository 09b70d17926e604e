//! Name handling shared by every source.
//!
//! Wiki pages, the spreadsheet and the curated catalog spell the same item
//! differently ("Dinraal's Claw", "Dinraal’s claw", "dinraals-claw"),
//! so cross-source matching always goes through [`normalize_name`].

use derive_more::{AsRef, Display};
use ingredient_scraping_utils::regex;
use serde::Serialize;

/// Lowercased name with every character outside `[a-z0-9]` removed.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, AsRef, Display, Serialize)]
#[as_ref(forward)]
pub struct NormalizedName(String);
impl NormalizedName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn normalize_name(name: &str) -> NormalizedName {
    NormalizedName(
        name.to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            .collect(),
    )
}

/// Turns a display name into an id: `Light Dragon's Claw` becomes `light-dragons-claw`.
pub fn slugify(name: &str) -> String {
    let name = name.to_lowercase().replace(['\'', '\u{2019}'], "");
    regex!(r"[^a-z0-9]+")
        .replace_all(&name, "-")
        .trim_matches('-')
        .to_owned()
}
