//! Fetching wiki pages and assets.
//!
//! Requests are sequential and each one is preceded by a fixed delay.
//! A failed request is never fatal: it is logged and reported as `None` / `false`.

pub mod parser;

use std::{path::Path, time::Duration};

use log::{info, warn};
use reqwest::StatusCode;
use scraper::Html;
use tokio::time::sleep;
use url::Url;

use crate::config::WikiConfig;

#[allow(async_fn_in_trait)]
pub trait WikiSource {
    async fn fetch_document(&self, url: &Url) -> Option<Html>;

    /// Writes the body of `url` to `dest`. Callers skip assets that already exist.
    async fn download_asset(&self, url: &Url, dest: &Path) -> bool;
}

pub struct WikiClient {
    client: reqwest::Client,
    request_delay: Duration,
    asset_delay: Duration,
}

impl WikiClient {
    pub fn new(config: &WikiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            request_delay: config.request_delay(),
            asset_delay: config.asset_delay(),
        })
    }

    async fn get(&self, url: &Url) -> anyhow::Result<Option<reqwest::Response>> {
        let response = self.client.get(url.clone()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?))
    }
}

impl WikiSource for WikiClient {
    async fn fetch_document(&self, url: &Url) -> Option<Html> {
        sleep(self.request_delay).await;
        let body = async {
            match self.get(url).await? {
                Some(response) => Ok(Some(response.text().await?)),
                None => anyhow::Ok(None),
            }
        };
        match body.await {
            Ok(Some(body)) => Some(Html::parse_document(&body)),
            Ok(None) => {
                info!("  [SKIP] 404 at {url}");
                None
            }
            Err(e) => {
                warn!("  Failed to fetch {url}: {e:#}");
                None
            }
        }
    }

    async fn download_asset(&self, url: &Url, dest: &Path) -> bool {
        sleep(self.asset_delay).await;
        let result = async {
            let Some(response) = self.get(url).await? else {
                anyhow::bail!("404 Not Found");
            };
            let bytes = response.bytes().await?;
            if let Some(parent) = dest.parent() {
                fs_err::create_dir_all(parent)?;
            }
            fs_err::write(dest, &bytes)?;
            anyhow::Ok(bytes.len())
        };
        match result.await {
            Ok(len) => {
                info!("  Saved {dest:?} ({len} bytes)");
                true
            }
            Err(e) => {
                warn!("  Download of {url} failed: {e:#}");
                false
            }
        }
    }
}

/// `Category:<game>_<name>` under `base`, e.g. `Category:Tears_of_the_Kingdom_Monster_Parts`.
pub fn category_url(base: &Url, game_slug: &str, wiki_category: &str) -> anyhow::Result<Url> {
    // "./" keeps `Category:` from being read as a URL scheme.
    Ok(base.join(&format!(
        "./Category:{game_slug}_{}",
        wiki_category.trim().replace(' ', "_")
    ))?)
}

/// Article of `name` under `base`, with spaces written as underscores.
pub fn article_url(base: &Url, name: &str) -> anyhow::Result<Url> {
    Ok(base.join(&format!("./{}", name.trim().replace(' ', "_")))?)
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::{article_url, category_url};

    #[test]
    fn test_urls() {
        let base = Url::parse("https://zelda.fandom.com/wiki/").unwrap();
        assert_eq!(
            category_url(&base, "Tears_of_the_Kingdom", "Monster Parts")
                .unwrap()
                .as_str(),
            "https://zelda.fandom.com/wiki/Category:Tears_of_the_Kingdom_Monster_Parts"
        );
        let base = Url::parse("https://zeldawiki.wiki/wiki/").unwrap();
        assert_eq!(
            article_url(&base, " Hylian Shroom ").unwrap().as_str(),
            "https://zeldawiki.wiki/wiki/Hylian_Shroom"
        );
        assert_eq!(
            article_url(&base, "Dinraal's Claw").unwrap().as_str(),
            "https://zeldawiki.wiki/wiki/Dinraal's_Claw"
        );
    }
}
