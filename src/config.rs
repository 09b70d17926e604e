use std::{fmt::Debug, path::PathBuf, time::Duration};

use ingredient_scraping_utils::fs_json_util::read_toml;
use serde::Deserialize;
use typed_builder::TypedBuilder;
use url::Url;

/// Run configuration. Every key is optional; see `Default` for the values used otherwise.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[builder(default)]
    pub paths: PathsConfig,
    #[builder(default)]
    pub wiki: WikiConfig,
}

#[derive(Clone, Debug, Deserialize, TypedBuilder)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    #[builder(setter(into))]
    pub data_file: PathBuf,
    #[builder(setter(into))]
    pub image_dir: PathBuf,
    /// Prefix of the `icon` field, relative to the site root.
    #[builder(setter(into))]
    pub icon_prefix: String,
}
impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_file: "data/ingredients.json".into(),
            image_dir: "images/ingredients".into(),
            icon_prefix: "images/ingredients".into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, TypedBuilder)]
#[serde(default, deny_unknown_fields)]
pub struct WikiConfig {
    /// Base of the wiki walked by `scrape`, ending with a slash.
    pub fandom_base_url: Url,
    /// Base of the wiki read by `refresh` and `expand`, ending with a slash.
    pub zeldawiki_base_url: Url,
    /// Prefix of category page names, as in `Category:<slug>_Fruits`.
    #[builder(setter(into))]
    pub game_slug: String,
    #[builder(setter(into))]
    pub user_agent: String,
    pub request_delay_secs: f64,
    pub asset_delay_secs: f64,
    pub timeout_secs: u64,
}
impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            fandom_base_url: Url::parse("https://zelda.fandom.com/wiki/")
                .expect("Static URL is valid"),
            zeldawiki_base_url: Url::parse("https://zeldawiki.wiki/wiki/")
                .expect("Static URL is valid"),
            game_slug: "Tears_of_the_Kingdom".into(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
            request_delay_secs: 1.1,
            asset_delay_secs: 0.4,
            timeout_secs: 15,
        }
    }
}
impl WikiConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_secs_f64(self.request_delay_secs.max(0.))
    }

    pub fn asset_delay(&self) -> Duration {
        Duration::from_secs_f64(self.asset_delay_secs.max(0.))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf> + Debug) -> anyhow::Result<Self> {
        read_toml(path)
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, path::Path, time::Duration};

    use super::{Config, PathsConfig};

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(
            config.paths.data_file.as_path(),
            Path::new("data/ingredients.json")
        );
        assert_eq!(config.wiki.game_slug, "Tears_of_the_Kingdom");
        assert_eq!(
            config.wiki.fandom_base_url.join("./Category:X").unwrap().as_str(),
            "https://zelda.fandom.com/wiki/Category:X"
        );
        assert_eq!(config.wiki.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[paths]\nimage_dir = \"public/icons\"\n\n[wiki]\nrequest_delay_secs = 0.0\n"
        )
        .unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.paths.image_dir.as_path(), Path::new("public/icons"));
        assert_eq!(config.paths.icon_prefix, "images/ingredients");
        assert_eq!(config.wiki.request_delay(), Duration::ZERO);
        assert_eq!(config.wiki.timeout_secs, 15);
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[paths]\ndata = \"x.json\"\n").unwrap();
        assert!(Config::load(file.path()).is_err());

        let paths = PathsConfig::builder()
            .data_file("x.json")
            .image_dir("img")
            .icon_prefix("img")
            .build();
        assert_eq!(paths.icon_prefix, "img");
    }
}
