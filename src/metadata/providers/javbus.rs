//! JavBus scraper.
//!
//! Search pages list `a.movie-box` tiles; detail pages carry an info column
//! of `span.header` labels. The site has no synopsis, so the plot is filled
//! from [`PlotLookup`] when one is configured.

use std::sync::Arc;

use async_trait::async_trait;
use metaforge_common::{Candidate, Record};
use scraper::Html;
use tracing::debug;

use super::{element_text, squash};
use crate::fetch::{FetchError, ThrottledFetcher};
use crate::keys;
use crate::metadata::merge::union;
use crate::metadata::plot::PlotLookup;
use crate::metadata::provider::{fetch_detail, query_variants, ProviderClient, SiteAdapter, SiteConfig};

pub const NAME: &str = "javbus";
pub const DEFAULT_BASE_URL: &str = "https://www.javbus.com/";

/// Skips the age gate and shows every title kind.
const SESSION_COOKIE: &str = "existmag=all; age=verified; dv=1";

selector!(MOVIE_BOX, "a.movie-box");
selector!(BOX_IMAGE, "div.photo-frame img");
selector!(BOX_DATE, "div.photo-info date");
selector!(TITLE, "div.container h3");
selector!(COVER, "a.bigImage");
selector!(INFO_LINE, "div.info p");
selector!(INFO_HEADER, "span.header");
selector!(GENRE, r#"div.info span.genre a[href*="/genre/"]"#);
selector!(ACTOR, r#"div.info span.genre a[href*="/star/"], div.star-name a"#);
selector!(SAMPLE, "a.sample-box");

pub struct JavBus {
    site: SiteConfig,
    fetcher: Arc<ThrottledFetcher>,
    plots: Option<Arc<PlotLookup>>,
}

impl JavBus {
    pub fn new(site: SiteConfig, fetcher: Arc<ThrottledFetcher>, plots: Option<Arc<PlotLookup>>) -> Self {
        Self { site, fetcher, plots }
    }

    async fn search_page(&self, path: &str) -> Result<Vec<Candidate>, FetchError> {
        let url = self.site.url(path);
        match self
            .fetcher
            .get_page(&url, Some(&self.site.origin()), Some(SESSION_COOKIE))
            .await
        {
            Ok(html) => Ok(parse_search(&html)),
            // The site answers an empty search with 404.
            Err(FetchError::Status { status: 404, .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl SiteAdapter for JavBus {
    fn site(&self) -> &SiteConfig {
        &self.site
    }

    fn check_key(&self, key: &str) -> bool {
        !keys::is_fc2(key)
    }

    async fn search(&self, variant: &str) -> Result<Vec<Candidate>, FetchError> {
        let hits = self.search_page(&format!("search/{variant}&type=1")).await?;
        if !hits.is_empty() {
            return Ok(hits);
        }
        debug!(variant = %variant, "No censored hits, trying uncensored search");
        self.search_page(&format!("uncensored/search/{variant}&type=1"))
            .await
    }

    async fn detail(&self, remote_ref: &str) -> Result<Option<Record>, FetchError> {
        let html = self
            .fetcher
            .get_page(remote_ref, Some(&self.site.origin()), Some(SESSION_COOKIE))
            .await?;
        let Some(mut record) = parse_detail(&html) else {
            return Ok(None);
        };

        if record.plot.is_empty() {
            if let Some(plots) = &self.plots {
                if let Some(plot) = plots.lookup(&record.num).await {
                    record.plot = plot;
                }
            }
        }
        Ok(Some(record))
    }
}

#[async_trait]
impl ProviderClient for JavBus {
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
        .select(&MOVIE_BOX)
        .filter_map(|tile| {
            let href = tile.value().attr("href")?;
            let img = tile.select(&BOX_IMAGE).next();
            let mut dates = tile.select(&BOX_DATE).map(|d| element_text(&d));
            Some(Candidate {
                provider: NAME.to_string(),
                remote_ref: href.to_string(),
                num: dates.next().unwrap_or_default(),
                date: dates.next().unwrap_or_default(),
                title: img
                    .and_then(|i| i.value().attr("title"))
                    .map(squash)
                    .unwrap_or_default(),
                cover: img
                    .and_then(|i| i.value().attr("src"))
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

fn parse_detail(html: &str) -> Option<Record> {
    let document = Html::parse_document(html);
    let heading = document.select(&TITLE).next().map(|h| element_text(&h))?;

    let mut record = Record::new(NAME, "");
    for line in document.select(&INFO_LINE) {
        let Some(header) = line.select(&INFO_HEADER).next() else {
            continue;
        };
        let label = element_text(&header);
        let text = element_text(&line);
        let value = text.strip_prefix(label.as_str()).unwrap_or(&text).trim().to_string();
        if value.is_empty() {
            continue;
        }

        let field = match label.trim_end_matches([':', '：']) {
            "識別碼" | "识别码" => &mut record.num,
            "發行日期" | "发行日期" => &mut record.date,
            "長度" | "长度" => &mut record.runtime,
            "導演" | "导演" => &mut record.director,
            "製作商" | "制作商" => &mut record.maker,
            "發行商" | "发行商" => &mut record.studio,
            "系列" => &mut record.set,
            _ => continue,
        };
        *field = value;
    }

    if record.num.is_empty() {
        return None;
    }

    record.title = strip_num(&heading, &record.num);
    record.cover = document
        .select(&COVER)
        .next()
        .and_then(|a| a.value().attr("href"))
        .unwrap_or_default()
        .to_string();

    let genres: Vec<String> = document.select(&GENRE).map(|a| element_text(&a)).collect();
    union(&mut record.genres, &genres);
    let actors: Vec<String> = document.select(&ACTOR).map(|a| element_text(&a)).collect();
    union(&mut record.actors, &actors);
    record.samples = document
        .select(&SAMPLE)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect();

    Some(record)
}

/// Drop a leading title code from a heading.
fn strip_num(heading: &str, num: &str) -> String {
    match heading.get(..num.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(num) => heading[num.len()..].trim().to_string(),
        _ => heading.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchOptions, Pacing};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SEARCH_PAGE: &str = r#"<html><body><div id="waterfall">
      <div class="item"><a class="movie-box" href="/ABC-1234">
        <div class="photo-frame"><img src="/pics/thumb/x1.jpg" title="Other  Title"></div>
        <div class="photo-info"><span>Other Title<br><date>ABC-1234</date> / <date>2020-02-02</date></span></div>
      </a></div>
      <div class="item"><a class="movie-box" href="/ABC-123">
        <div class="photo-frame"><img src="/pics/thumb/x2.jpg" title="Right Title"></div>
        <div class="photo-info"><span>Right Title<br><date>ABC-123</date> / <date>2021-01-01</date></span></div>
      </a></div>
    </div></body></html>"#;

    const DETAIL_PAGE: &str = r#"<html><body><div class="container">
      <h3>ABC-123 Right Title</h3>
      <div class="row movie">
        <div class="col-md-9 screencap"><a class="bigImage" href="/pics/cover/abc_b.jpg"><img src="/pics/cover/abc_b.jpg"></a></div>
        <div class="col-md-3 info">
          <p><span class="header">識別碼:</span> <span>ABC-123</span></p>
          <p><span class="header">發行日期:</span> 2021-01-01</p>
          <p><span class="header">長度:</span> 120分鐘</p>
          <p><span class="header">導演:</span> <a href="/director/1">Dee</a></p>
          <p><span class="header">製作商:</span> <a href="/studio/1">Maker Co</a></p>
          <p><span class="header">發行商:</span> <a href="/label/1">Label Co</a></p>
          <p><span class="header">系列:</span> <a href="/series/1">Series One</a></p>
          <p class="header">類別:</p>
          <p><span class="genre"><label><a href="/genre/1">Drama</a></label></span>
             <span class="genre"><label><a href="/genre/2">drama</a></label></span>
             <span class="genre"><label><a href="/genre/3">Comedy</a></label></span></p>
          <p><span class="genre"><a href="/star/1">Alice</a></span></p>
        </div>
      </div>
      <div id="sample-waterfall">
        <a class="sample-box" href="/pics/sample/abc_1.jpg"></a>
        <a class="sample-box" href="https://img.example/abc_2.jpg"></a>
      </div>
    </div></body></html>"#;

    #[test]
    fn test_parse_search() {
        let hits = parse_search(SEARCH_PAGE);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].num, "ABC-1234");
        assert_eq!(hits[0].title, "Other Title");
        assert_eq!(hits[1].remote_ref, "/ABC-123");
        assert_eq!(hits[1].date, "2021-01-01");
        assert_eq!(hits[1].cover, "/pics/thumb/x2.jpg");
    }

    #[test]
    fn test_parse_detail() {
        let record = parse_detail(DETAIL_PAGE).unwrap();
        assert_eq!(record.num, "ABC-123");
        assert_eq!(record.title, "Right Title");
        assert_eq!(record.date, "2021-01-01");
        assert_eq!(record.runtime, "120分鐘");
        assert_eq!(record.director, "Dee");
        assert_eq!(record.maker, "Maker Co");
        assert_eq!(record.studio, "Label Co");
        assert_eq!(record.set, "Series One");
        assert_eq!(record.cover, "/pics/cover/abc_b.jpg");
        assert_eq!(record.genres, vec!["Drama", "Comedy"]);
        assert_eq!(record.actors, vec!["Alice"]);
        assert_eq!(record.samples.len(), 2);
    }

    #[test]
    fn test_parse_detail_without_code() {
        assert!(parse_detail("<div class=\"container\"><h3>Nothing</h3></div>").is_none());
        assert!(parse_detail("<html></html>").is_none());
    }

    #[test]
    fn test_strip_num() {
        assert_eq!(strip_num("abc-123  Title", "ABC-123"), "Title");
        assert_eq!(strip_num("Title", "ABC-123"), "Title");
        assert_eq!(strip_num("日本語タイトル", "ABC-123"), "日本語タイトル");
    }

    #[tokio::test]
    async fn test_query_and_fetch_against_site() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/ABC-123&type=1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ABC-123"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
            .mount(&server)
            .await;

        let fetcher = ThrottledFetcher::new(FetchOptions {
            pacing: Pacing::none(),
            ..FetchOptions::default()
        })
        .unwrap();
        let provider = JavBus::new(
            SiteConfig::new(NAME, &server.uri()).unwrap(),
            Arc::new(fetcher),
            None,
        );

        let hits = provider.query("ABC-123").await;
        assert_eq!(hits[0].num, "ABC-123");
        assert_eq!(hits[0].remote_ref, format!("{}/ABC-123", server.uri()));

        let record = provider.fetch(&hits[0].remote_ref).await.unwrap();
        assert_eq!(record.provider, NAME);
        assert_eq!(record.cover, format!("{}/pics/cover/abc_b.jpg", server.uri()));
        assert_eq!(record.original_title, "Right Title");
        assert!(record.plot.is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_uncensored_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/XYZ-001&type=1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/uncensored/search/XYZ-001&type=1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = ThrottledFetcher::new(FetchOptions {
            pacing: Pacing::none(),
            ..FetchOptions::default()
        })
        .unwrap();
        let provider = JavBus::new(
            SiteConfig::new(NAME, &server.uri()).unwrap(),
            Arc::new(fetcher),
            None,
        );
        let hits = SiteAdapter::search(&provider, "XYZ-001").await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_refuses_fc2() {
        let fetcher = ThrottledFetcher::new(FetchOptions::default()).unwrap();
        let provider = JavBus::new(
            SiteConfig::new(NAME, DEFAULT_BASE_URL).unwrap(),
            Arc::new(fetcher),
            None,
        );
        assert!(!ProviderClient::check_key(&provider, "FC2-PPV-1234567"));
        assert!(ProviderClient::check_key(&provider, "ABC-123"));
    }
}
