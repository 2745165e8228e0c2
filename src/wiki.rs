//! Talking to the wiki: MediaWiki API queries and scraping of rendered pages.

use crate::article::{Article, SourceFormat};
use crate::config::Config;
use crate::error::{Error, Result};
use reqwest::Url;
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};

/// Where articles come from. [`WikiClient`] is the only production
/// implementation; tests substitute canned pages.
pub trait WikiSource {
    /// Every non-redirect article in the main namespace.
    fn all_pages(&mut self) -> Result<Vec<Article>>;
    /// Articles whose latest revision is newer than `since`.
    fn recent_changes(&mut self, since: OffsetDateTime) -> Result<Vec<Article>>;
    /// Rendered HTML body of one article.
    fn rendered_html(&mut self, title: &str) -> Result<String>;
    /// Raw HTML of an arbitrary page, for scraping.
    fn fetch_page(&mut self, url: &str) -> Result<String>;
}

pub struct WikiClient {
    client: Client,
    api_url: Url,
    batch_size: u32,
    request_count: usize,
}

impl WikiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_url = Url::parse(&config.api_url).map_err(|e| Error::InvalidUrl {
            url: config.api_url.clone(),
            message: e.to_string(),
        })?;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_url,
            batch_size: config.batch_size,
            request_count: 0,
        })
    }

    fn get_text(&mut self, url: Url) -> Result<String> {
        self.request_count += 1;
        debug!(target: "arch_wiki_md", %url, "GET");
        let resp = self.client.get(url.clone()).send()?;
        if !resp.status().is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.text()?)
    }

    fn query_json<T: for<'de> Deserialize<'de>>(&mut self, params: &BTreeMap<String, String>) -> Result<T> {
        let url = build_api_url(&self.api_url, params);
        let body = self.get_text(url)?;
        let value: Value = serde_json::from_str(&body)?;
        if let Some(error) = value.get("error") {
            return Err(api_error(error));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Run a page generator query to exhaustion, following `continue` tokens.
    fn query_pages(&mut self, mut params: BTreeMap<String, String>) -> Result<Vec<Article>> {
        let mut pages: Vec<PagePayload> = Vec::new();

        loop {
            let resp: QueryResponse = self.query_json(&params)?;
            let batch = resp.query.map(|q| q.pages).unwrap_or_default();
            debug!(target: "arch_wiki_md", pages = batch.len(), "received batch");
            merge_pages(&mut pages, batch);

            match resp.continuation {
                Some(next) => apply_continuation(&mut params, &next),
                None => break,
            }
        }

        let articles: Vec<Article> = pages.into_iter().filter_map(page_to_article).collect();
        info!(target: "arch_wiki_md", articles = articles.len(), requests = self.request_count, "query complete");
        Ok(articles)
    }
}

impl WikiSource for WikiClient {
    fn all_pages(&mut self) -> Result<Vec<Article>> {
        self.query_pages(all_pages_params(self.batch_size))
    }

    fn recent_changes(&mut self, since: OffsetDateTime) -> Result<Vec<Article>> {
        self.query_pages(recent_changes_params(since, self.batch_size)?)
    }

    fn rendered_html(&mut self, title: &str) -> Result<String> {
        let resp: ParseResponse = self.query_json(&parse_params(title))?;
        Ok(resp.parse.text)
    }

    fn fetch_page(&mut self, url: &str) -> Result<String> {
        let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        self.get_text(parsed)
    }
}

fn base_params() -> BTreeMap<String, String> {
    [("action", "query"), ("format", "json"), ("formatversion", "2")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn page_props(params: &mut BTreeMap<String, String>) {
    params.insert("prop".into(), "info|revisions".into());
    params.insert("rvprop".into(), "content|timestamp".into());
    params.insert("inprop".into(), "url".into());
}

pub fn all_pages_params(batch_size: u32) -> BTreeMap<String, String> {
    let mut params = base_params();
    params.insert("generator".into(), "allpages".into());
    params.insert("gaplimit".into(), batch_size.to_string());
    params.insert("gapfilterredir".into(), "nonredirects".into());
    params.insert("gapnamespace".into(), "0".into());
    page_props(&mut params);
    params
}

pub fn recent_changes_params(since: OffsetDateTime, batch_size: u32) -> Result<BTreeMap<String, String>> {
    let mut params = base_params();
    params.insert("generator".into(), "recentchanges".into());
    params.insert("grcend".into(), to_api_timestamp(since)?);
    params.insert("grcnamespace".into(), "0".into());
    params.insert("grclimit".into(), batch_size.to_string());
    params.insert("grctoponly".into(), "true".into());
    page_props(&mut params);
    Ok(params)
}

fn parse_params(title: &str) -> BTreeMap<String, String> {
    let mut params = base_params();
    params.insert("action".into(), "parse".into());
    params.insert("page".into(), title.to_string());
    params.insert("prop".into(), "text".into());
    params.insert("disableeditsection".into(), "true".into());
    params
}

/// The API wants UTC timestamps with a `Z` suffix.
pub fn to_api_timestamp(at: OffsetDateTime) -> Result<String> {
    Ok(at.to_offset(time::UtcOffset::UTC).format(&Rfc3339)?)
}

pub fn build_api_url(api_url: &Url, params: &BTreeMap<String, String>) -> Url {
    let mut url = api_url.clone();
    {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in params {
            pairs.append_pair(k, v);
        }
    }
    url
}

/// Copy every `continue` key into the next request.
fn apply_continuation(params: &mut BTreeMap<String, String>, next: &BTreeMap<String, Value>) {
    for (k, v) in next {
        let v = match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        params.insert(k.clone(), v);
    }
}

/// Revision content of one page may arrive in a later batch than its info.
fn merge_pages(pages: &mut Vec<PagePayload>, batch: Vec<PagePayload>) {
    for page in batch {
        match pages.iter_mut().find(|p| p.pageid.is_some() && p.pageid == page.pageid) {
            Some(existing) if existing.revisions.is_empty() => *existing = page,
            Some(_) => {}
            None => pages.push(page),
        }
    }
}

fn api_error(error: &Value) -> Error {
    let code = error.get("code").and_then(Value::as_str).unwrap_or("unknown_error");
    let info = error.get("info").and_then(Value::as_str).unwrap_or("unknown info");
    Error::Api(format!("[{code}] {info}"))
}

fn page_to_article(page: PagePayload) -> Option<Article> {
    if page.missing {
        return None;
    }
    let revision = page.revisions.into_iter().next()?;
    let content = revision
        .content
        .or_else(|| revision.slots.and_then(|s| s.main).and_then(|m| m.content))?;

    Some(Article {
        page_id: page.pageid?,
        url: page.fullurl.unwrap_or_default(),
        last_revision_id: page.lastrevid.unwrap_or_default(),
        last_modified: revision.timestamp,
        title: page.title,
        content,
        format: SourceFormat::Wikitext,
    })
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<QueryPayload>,
    #[serde(default, rename = "continue")]
    continuation: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize, Default)]
struct QueryPayload {
    #[serde(default)]
    pages: Vec<PagePayload>,
}

#[derive(Debug, Deserialize)]
struct PagePayload {
    pageid: Option<u64>,
    title: String,
    #[serde(default)]
    missing: bool,
    lastrevid: Option<u64>,
    fullurl: Option<String>,
    #[serde(default)]
    revisions: Vec<RevisionPayload>,
}

#[derive(Debug, Deserialize)]
struct RevisionPayload {
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    content: Option<String>,
    slots: Option<SlotsPayload>,
}

#[derive(Debug, Deserialize)]
struct SlotsPayload {
    main: Option<SlotPayload>,
}

#[derive(Debug, Deserialize)]
struct SlotPayload {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    parse: ParsePayload,
}

#[derive(Debug, Deserialize)]
struct ParsePayload {
    text: String,
}

// --- scraping -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPage {
    pub title: String,
    pub articles: Vec<String>,
    pub subcategories: Vec<CategoryLink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedArticle {
    pub title: String,
    /// Inner HTML of `#content`, or `#mw-content-text` when a skin lacks it.
    pub html: String,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| Error::Selector(css.to_string()))
}

/// Prefix root-relative links with the wiki's base URL.
pub fn make_absolute(base_url: &str, href: &str) -> String {
    if href.starts_with('/') && !href.starts_with("//") {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    } else {
        href.to_string()
    }
}

fn decoded_text(el: scraper::ElementRef<'_>) -> String {
    let text: String = el.text().collect();
    html_escape::decode_html_entities(text.trim()).to_string()
}

/// Absolute category URLs linked from the table of contents, first
/// occurrence wins.
pub fn parse_toc(html: &str, base_url: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let links = selector("#mw-content-text dd a")?;

    let mut urls: Vec<String> = Vec::new();
    for a in document.select(&links) {
        if let Some(href) = a.value().attr("href") {
            let url = make_absolute(base_url, href);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    Ok(urls)
}

pub fn parse_category(html: &str, base_url: &str) -> Result<CategoryPage> {
    let document = Html::parse_document(html);
    let heading = selector("h1#firstHeading")?;
    let pages = selector("#mw-pages li a")?;
    let subcategories = selector("#mw-subcategories li a")?;

    let title = document
        .select(&heading)
        .next()
        .map(decoded_text)
        .unwrap_or_default();
    let title = title.strip_prefix("Category:").unwrap_or(&title).to_string();

    let articles = document
        .select(&pages)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| make_absolute(base_url, href))
        .collect();

    let subcategories = document
        .select(&subcategories)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(CategoryLink {
                title: decoded_text(a),
                url: make_absolute(base_url, href),
            })
        })
        .collect();

    Ok(CategoryPage {
        title,
        articles,
        subcategories,
    })
}

pub fn parse_article(html: &str, url: &str) -> Result<ScrapedArticle> {
    let document = Html::parse_document(html);
    let heading = selector("#firstHeading")?;
    let content = selector("#content")?;
    let content_text = selector("#mw-content-text")?;

    let title = document
        .select(&heading)
        .next()
        .map(decoded_text)
        .ok_or_else(|| Error::MissingElement {
            what: "#firstHeading",
            url: url.to_string(),
        })?;
    let html = document
        .select(&content)
        .next()
        .or_else(|| document.select(&content_text).next())
        .map(|el| el.inner_html())
        .ok_or_else(|| Error::MissingElement {
            what: "#content",
            url: url.to_string(),
        })?;

    Ok(ScrapedArticle { title, html })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const CATEGORY_HTML: &str = r#"<html><body><h1 id="firstHeading">Category:A Title</h1><p>This should be ignored</p><div id="mw-subcategories">More to ignore.<ul><li><a href="/index.php/Category:testing">first cat title</a></li><li><a href="/index.php/Category:another_test">second cat title</a></li></ul></div><div id="mw-pages">This should get <strong>ignored</strong>.<ul><li><a href="/test-one.html">One link</a></li><li><a href="/test-two.html">Link two</a></li></ul></div><p>This should be ignored</p></body></html>"#;

    #[test]
    fn build_api_url_encodes_params() {
        let api = Url::parse("https://wiki.archlinux.org/api.php").unwrap();
        let url = build_api_url(&api, &all_pages_params(50));
        let pairs: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("generator").unwrap(), "allpages");
        assert_eq!(pairs.get("gaplimit").unwrap(), "50");
        assert_eq!(pairs.get("prop").unwrap(), "info|revisions");
        assert_eq!(pairs.get("formatversion").unwrap(), "2");
        assert!(url.as_str().contains("prop=info%7Crevisions"));
    }

    #[test]
    fn recent_changes_end_at_since() {
        let params = recent_changes_params(datetime!(2016-03-04 00:00 UTC), 50).unwrap();
        assert_eq!(params["generator"], "recentchanges");
        assert_eq!(params["grcend"], "2016-03-04T00:00:00Z");
        assert_eq!(params["grctoponly"], "true");
    }

    #[test]
    fn continuation_overrides_params() {
        let mut params = all_pages_params(50);
        let next: BTreeMap<String, Value> = serde_json::from_str(
            r#"{"gapcontinue": "Foo", "continue": "gapcontinue||"}"#,
        )
        .unwrap();
        apply_continuation(&mut params, &next);
        assert_eq!(params["gapcontinue"], "Foo");
        assert_eq!(params["continue"], "gapcontinue||");
    }

    #[test]
    fn reads_pages_from_query_response() {
        let body = r#"{
            "continue": {"rvcontinue": "12|34", "continue": "||"},
            "query": {"pages": [
                {"pageid": 1, "ns": 0, "title": "Pacman", "lastrevid": 10,
                 "fullurl": "https://wiki.archlinux.org/title/Pacman",
                 "revisions": [{"timestamp": "2016-03-04T05:06:07Z", "content": "'''pacman'''"}]},
                {"pageid": 2, "ns": 0, "title": "Systemd", "lastrevid": 11,
                 "revisions": [{"timestamp": "2016-03-04T05:06:07Z",
                                "slots": {"main": {"content": "init"}}}]},
                {"pageid": 3, "ns": 0, "title": "Pending"},
                {"ns": 0, "title": "Gone", "missing": true}
            ]}
        }"#;
        let resp: QueryResponse = serde_json::from_str(body).unwrap();
        assert!(resp.continuation.is_some());

        let articles: Vec<Article> = resp
            .query
            .unwrap()
            .pages
            .into_iter()
            .filter_map(page_to_article)
            .collect();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Pacman");
        assert_eq!(articles[0].last_revision_id, 10);
        assert_eq!(articles[0].last_modified, datetime!(2016-03-04 05:06:07 UTC));
        assert_eq!(articles[1].content, "init");
    }

    #[test]
    fn later_batches_fill_in_revisions() {
        let first: QueryPayload =
            serde_json::from_str(r#"{"pages": [{"pageid": 3, "title": "Pending"}]}"#).unwrap();
        let second: QueryPayload = serde_json::from_str(
            r#"{"pages": [{"pageid": 3, "title": "Pending", "revisions": [{"timestamp": "2016-03-04T05:06:07Z", "content": "x"}]}]}"#,
        )
        .unwrap();
        let mut pages = Vec::new();
        merge_pages(&mut pages, first.pages);
        merge_pages(&mut pages, second.pages);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].revisions.len(), 1);
    }

    #[test]
    fn api_errors_are_reported() {
        let value: Value =
            serde_json::from_str(r#"{"code": "badvalue", "info": "Unrecognized value"}"#).unwrap();
        let err = api_error(&value);
        assert_eq!(err.to_string(), "wiki api error: [badvalue] Unrecognized value");
    }

    #[test]
    fn toc_urls_are_unique() {
        let html = r#"<html><body><p>This should be ignored</p><div id="mw-content-text">This should get <strong>ignored</strong>.<dd><a href="/title/Category:Test_One">A test</a></dd><dd><a href="https://other.org/Category:Test_Two">Test</a></dd><dd><a href="/title/Category:Test_One">A duplicate</a></dd></div><p>This should be ignored</p></body></html>"#;
        let urls = parse_toc(html, "https://wiki.archlinux.org").unwrap();
        assert_eq!(
            urls,
            vec![
                "https://wiki.archlinux.org/title/Category:Test_One",
                "https://other.org/Category:Test_Two",
            ]
        );
    }

    #[test]
    fn category_title_articles_and_subcategories() {
        let page = parse_category(CATEGORY_HTML, "https://wiki.archlinux.org").unwrap();
        assert_eq!(page.title, "A Title");
        assert_eq!(page.articles[1], "https://wiki.archlinux.org/test-two.html");
        assert_eq!(page.subcategories.len(), 2);
        assert_eq!(page.subcategories[1].title, "second cat title");
        assert_eq!(
            page.subcategories[1].url,
            "https://wiki.archlinux.org/index.php/Category:another_test"
        );
    }

    #[test]
    fn article_title_and_content() {
        let html = r#"<html><body><h1 id="firstHeading">Article Title</h1><p>This should be ignored</p><div id="content">This should get <strong>picked up</strong>.</div><p>This should be ignored</p></body></html>"#;
        let article = parse_article(html, "some-url.com/article_title").unwrap();
        assert_eq!(article.title, "Article Title");
        assert_eq!(crate::html::convert_html(&article.html), "This should get **picked up**.");

        let err = parse_article("<html><body></body></html>", "x").unwrap_err();
        assert!(matches!(err, Error::MissingElement { what: "#firstHeading", .. }));
    }

    #[test]
    fn article_content_falls_back_to_content_text() {
        let html = r#"<html><body><h1 id="firstHeading">Grep</h1><div id="mw-content-text"><p>Body.</p></div></body></html>"#;
        let article = parse_article(html, "x").unwrap();
        assert_eq!(crate::html::convert_html(&article.html), "Body.");

        let err = parse_article(r#"<h1 id="firstHeading">Grep</h1>"#, "x").unwrap_err();
        assert!(matches!(err, Error::MissingElement { what: "#content", .. }));
    }

    #[test]
    fn absolute_links() {
        assert_eq!(make_absolute("https://a.org/", "/x"), "https://a.org/x");
        assert_eq!(make_absolute("https://a.org", "https://b.org/y"), "https://b.org/y");
        assert_eq!(make_absolute("https://a.org", "//cdn/z"), "//cdn/z");
    }
}
