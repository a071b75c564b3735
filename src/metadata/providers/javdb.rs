//! JavDB scraper.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use metaforge_common::{Candidate, Record};
use regex::Regex;
use scraper::Html;

use super::{element_text, squash};
use crate::fetch::{FetchError, ThrottledFetcher};
use crate::keys;
use crate::metadata::merge::union;
use crate::metadata::provider::{fetch_detail, query_variants, ProviderClient, SiteAdapter, SiteConfig};

pub const NAME: &str = "javdb";
pub const DEFAULT_BASE_URL: &str = "https://javdb.com/";

const SESSION_COOKIE: &str = "over18=1; locale=zh";

selector!(ITEM, "div.movie-list div.item a.box");
selector!(ITEM_NUM, "div.video-title strong");
selector!(ITEM_TITLE, "div.video-title");
selector!(ITEM_COVER, "div.cover img");
selector!(ITEM_DATE, "div.meta");
selector!(HEADING, "h2.title strong.current-title");
selector!(HEADING_NUM, "h2.title strong");
selector!(COVER, "div.column-video-cover img.video-cover");
selector!(PANEL_BLOCK, "nav.movie-panel-info div.panel-block");
selector!(PANEL_LABEL, "strong");
selector!(PANEL_VALUE, "span.value");
selector!(LINK, "a");
selector!(SAMPLE, "div.tile-images a.tile-item");

static RATING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").unwrap());

pub struct JavDb {
    site: SiteConfig,
    fetcher: Arc<ThrottledFetcher>,
}

impl JavDb {
    pub fn new(site: SiteConfig, fetcher: Arc<ThrottledFetcher>) -> Self {
        Self { site, fetcher }
    }
}

#[async_trait]
impl SiteAdapter for JavDb {
    fn site(&self) -> &SiteConfig {
        &self.site
    }

    fn check_key(&self, key: &str) -> bool {
        !keys::is_fc2(key)
    }

    async fn search(&self, variant: &str) -> Result<Vec<Candidate>, FetchError> {
        let mut url = self
            .site
            .base_url
            .join("search")
            .map_err(|e| FetchError::Other(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", variant)
            .append_pair("f", "all");
        let html = self
            .fetcher
            .get_page(url.as_str(), Some(&self.site.origin()), Some(SESSION_COOKIE))
            .await?;
        Ok(parse_search(&html))
    }

    async fn detail(&self, remote_ref: &str) -> Result<Option<Record>, FetchError> {
        let html = self
            .fetcher
            .get_page(remote_ref, Some(&self.site.origin()), Some(SESSION_COOKIE))
            .await?;
        Ok(parse_detail(&html))
    }
}

#[async_trait]
impl ProviderClient for JavDb {
    fn name(&self) -> &str {
        &self.site.name
    }

    fn check_key(&self, key: &str) -> bool {
        SiteAdapter::check_key(self, key)
    }

    async fn query(&self, key: &str) -> Vec<Candidate> {
        query_variants(self, key).await
    }

    async fn fetch(&self, remote_ref: &str) -> Option<Record> {
        fetch_detail(self, remote_ref).await
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_search(html: &str) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    document
        .select(&ITEM)
        .filter_map(|item| {
            let href = item.value().attr("href")?;
            let num = item
                .select(&ITEM_NUM)
                .next()
                .map(|n| element_text(&n))
                .unwrap_or_default();
            let title = item
                .value()
                .attr("title")
                .map(squash)
                .filter(|t| !t.is_empty())
                .or_else(|| {
                    item.select(&ITEM_TITLE).next().map(|t| {
                        let text = element_text(&t);
                        text.strip_prefix(num.as_str()).unwrap_or(&text).trim().to_string()
                    })
                })
                .unwrap_or_default();
            Some(Candidate {
                provider: NAME.to_string(),
                remote_ref: href.to_string(),
                title,
                cover: item
                    .select(&ITEM_COVER)
                    .next()
                    .and_then(|i| i.value().attr("src"))
                    .unwrap_or_default()
                    .to_string(),
                date: item
                    .select(&ITEM_DATE)
                    .next()
                    .map(|d| element_text(&d))
                    .unwrap_or_default(),
                num,
            })
        })
        .collect()
}

fn parse_detail(html: &str) -> Option<Record> {
    let document = Html::parse_document(html);
    let mut record = Record::new(NAME, "");

    for block in document.select(&PANEL_BLOCK) {
        let Some(label) = block.select(&PANEL_LABEL).next().map(|l| element_text(&l)) else {
            continue;
        };
        let Some(value) = block.select(&PANEL_VALUE).next() else {
            continue;
        };
        let text = element_text(&value);
        let links: Vec<String> = value
            .select(&LINK)
            .map(|a| element_text(&a))
            .filter(|t| !t.is_empty())
            .collect();

        match label.trim_end_matches([':', '：']) {
            "番號" | "番号" | "ID" => record.num = text,
            "日期" | "Released Date" => record.date = text,
            "時長" | "时长" | "Duration" => record.runtime = text,
            "導演" | "导演" | "Director" => record.director = text,
            "片商" | "Maker" => record.maker = text,
            "發行" | "发行" | "Publisher" => record.studio = text,
            "系列" | "Series" => record.set = text,
            "評分" | "评分" | "Rating" => {
                record.rating = RATING
                    .captures(&text)
                    .and_then(|c| c[1].parse::<f32>().ok())
                    .map(|r| r * 2.0);
            }
            "類別" | "类别" | "Tags" => {
                union(&mut record.genres, &links);
            }
            "演員" | "演员" | "Actor(s)" => {
                union(&mut record.actors, &links);
            }
            _ => {}
        }
    }

    if record.num.is_empty() {
        record.num = document
            .select(&HEADING_NUM)
            .next()
            .map(|n| element_text(&n))
            .unwrap_or_default();
    }
    if record.num.is_empty() {
        return None;
    }

    record.title = document
        .select(&HEADING)
        .next()
        .map(|h| element_text(&h))
        .unwrap_or_default();
    record.cover = document
        .select(&COVER)
        .next()
        .and_then(|i| i.value().attr("src"))
        .unwrap_or_default()
        .to_string();
    record.samples = document
        .select(&SAMPLE)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect();

    Some(record)
}
