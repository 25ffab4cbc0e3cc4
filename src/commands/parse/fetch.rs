use std::time::Duration;

use anyhow::{Context, Result};
use scraper::Html;
use url::Url;

const USER_AGENT: &str =
    "Theological-Syntopticon-Parser/1.0 (https://github.com/jfhutson/Theological-Syntopticon)";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct FetchedPage {
    pub document: Html,
    pub final_url: Url,
}

/// Blocking page fetcher with a politeness delay between successive fetches.
pub struct PageFetcher {
    client: reqwest::blocking::Client,
    delay: Duration,
}

impl PageFetcher {
    pub fn new(delay_ms: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            delay: Duration::from_millis(delay_ms),
        })
    }

    /// Fetch a page and parse it. `final_url` reflects any redirects, so
    /// relatedness checks run against the URL the content actually lives at.
    pub fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("request for {url} returned an error status"))?;

        let final_url = response.url().clone();
        let body = response
            .text()
            .with_context(|| format!("failed to read body of {url}"))?;

        Ok(FetchedPage {
            document: Html::parse_document(&body),
            final_url,
        })
    }

    pub fn polite_pause(&self) {
        std::thread::sleep(self.delay);
    }
}
