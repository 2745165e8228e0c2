pub mod article;
pub mod config;
pub mod describe;
pub mod error;
pub mod frontmatter;
pub mod html;
pub mod lang;
pub mod logging;
pub mod normalize;
pub mod store;
pub mod wiki;

pub use article::{Article, ProcessedArticle, SourceFormat, process_article};
pub use config::Config;
pub use error::{Error, Result};
pub use lang::{Language, detect_language, split_by_language};
pub use store::{Manifest, Store};
pub use wiki::{WikiClient, WikiSource};

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::Path;
use std::time::Instant;
use time::{OffsetDateTime, Time, UtcOffset};
use tracing::{info, warn};

/// Full mode: enumerate every article, skip the ones already current in the
/// manifest and write the rest. Returns the number of articles written.
pub fn build(config: &Config, source: &mut impl WikiSource) -> Result<usize> {
    let store = Store::new(&config.target_dir);
    let manifest_path = store.manifest_path();
    let now = OffsetDateTime::now_utc();
    let mut manifest = Manifest::load(&manifest_path)?.unwrap_or_else(|| Manifest::new(now));

    info!(target: "arch_wiki_md", api = %config.api_url, dir = %config.target_dir.display(), "fetching article list");
    let articles = source.all_pages()?;
    let written = process_and_save(config, source, &store, &mut manifest, articles)?;

    manifest.updated = now;
    manifest.store(&manifest_path)?;
    info!(target: "arch_wiki_md", written, total = manifest.article_count(), "build finished");
    Ok(written)
}

/// Incremental mode: fetch what changed since midnight (UTC) of the
/// manifest's last update. Needs a manifest from an earlier `build`.
pub fn sync(config: &Config, source: &mut impl WikiSource) -> Result<usize> {
    let store = Store::new(&config.target_dir);
    let manifest_path = store.manifest_path();
    let mut manifest =
        Manifest::load(&manifest_path)?.ok_or_else(|| Error::MissingManifest(manifest_path.clone()))?;

    let since = sync_start(manifest.updated);
    info!(target: "arch_wiki_md", %since, "fetching recent changes");
    let articles = source.recent_changes(since)?;
    let written = process_and_save(config, source, &store, &mut manifest, articles)?;

    manifest.updated = OffsetDateTime::now_utc();
    manifest.store(&manifest_path)?;
    info!(target: "arch_wiki_md", written, "synced articles");
    Ok(written)
}

/// Midnight UTC of the day `updated` falls on.
pub fn sync_start(updated: OffsetDateTime) -> OffsetDateTime {
    updated.to_offset(UtcOffset::UTC).replace_time(Time::MIDNIGHT)
}

/// Crawl mode: table of contents, then categories (recursively), then the
/// rendered article pages. Always converts from HTML.
pub fn scrape(config: &Config, source: &mut impl WikiSource) -> Result<usize> {
    let store = Store::new(&config.target_dir);
    let manifest_path = store.manifest_path();
    let now = OffsetDateTime::now_utc();
    let mut manifest = Manifest::load(&manifest_path)?.unwrap_or_else(|| Manifest::new(now));

    let toc_html = if config.toc.starts_with("http://") || config.toc.starts_with("https://") {
        source.fetch_page(&config.toc)?
    } else {
        fs::read_to_string(&config.toc).map_err(|e| Error::io(&config.toc, e))?
    };

    let mut queue: VecDeque<String> = wiki::parse_toc(&toc_html, &config.base_url)?.into();
    let mut visited: HashSet<String> = HashSet::new();
    let mut article_urls: Vec<String> = Vec::new();
    let mut seen_articles: HashSet<String> = HashSet::new();

    while let Some(url) = queue.pop_front() {
        if !visited.insert(url.clone()) {
            continue;
        }
        let category = match source
            .fetch_page(&url)
            .and_then(|html| wiki::parse_category(&html, &config.base_url))
        {
            Ok(category) => category,
            Err(e) => {
                warn!(target: "arch_wiki_md", %url, error = %e, "skipping category");
                continue;
            }
        };
        info!(target: "arch_wiki_md", category = %category.title, articles = category.articles.len(), "category");

        for sub in category.subcategories {
            if !visited.contains(&sub.url) {
                queue.push_back(sub.url);
            }
        }
        for article in category.articles {
            if seen_articles.insert(article.clone()) {
                article_urls.push(article);
            }
        }
    }

    let mut articles = Vec::with_capacity(article_urls.len());
    for url in article_urls {
        match source.fetch_page(&url).and_then(|html| wiki::parse_article(&html, &url)) {
            Ok(scraped) => articles.push(Article {
                page_id: 0,
                title: scraped.title,
                url,
                last_revision_id: 0,
                last_modified: now,
                content: scraped.html,
                format: SourceFormat::Html,
            }),
            Err(e) => warn!(target: "arch_wiki_md", %url, error = %e, "skipping article"),
        }
    }

    let mut processed = Vec::with_capacity(articles.len());
    let started = Instant::now();
    let total = articles.len();
    for (i, article) in articles.into_iter().enumerate() {
        processed.push(process_with_progress(article, i + 1, total, started));
    }

    let written = store.save_buckets(split_by_language(processed), &mut manifest)?;
    manifest.updated = now;
    manifest.store(&manifest_path)?;
    info!(target: "arch_wiki_md", written, categories = visited.len(), "scrape finished");
    Ok(written)
}

/// Offline conversion of a single file. Returns Markdown, or the
/// description when `describe` is set.
pub fn convert_file(path: &Path, format: SourceFormat, describe: bool) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;

    // invalid UTF-8 falls back to lossy conversion.
    let content = String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());

    let markdown = match format {
        SourceFormat::Wikitext => {
            if describe {
                return Ok(describe::extract_description(&content));
            }
            normalize::normalize(&content)
        }
        SourceFormat::Html => html::convert_html(&content),
    };
    if describe {
        return Ok(describe::extract_description(&markdown));
    }
    Ok(markdown)
}

fn process_and_save(
    config: &Config,
    source: &mut impl WikiSource,
    store: &Store,
    manifest: &mut Manifest,
    articles: Vec<Article>,
) -> Result<usize> {
    let fetched = articles.len();
    let pending: Vec<Article> = articles
        .into_iter()
        .filter(|a| !manifest.is_current(&a.title, a.last_revision_id))
        .collect();
    info!(target: "arch_wiki_md", fetched, pending = pending.len(), "articles to process");

    let started = Instant::now();
    let total = pending.len();
    let mut processed = Vec::with_capacity(total);

    for (i, mut article) in pending.into_iter().enumerate() {
        if config.format == SourceFormat::Html {
            match source.rendered_html(&article.title) {
                Ok(html) => {
                    article.content = html;
                    article.format = SourceFormat::Html;
                }
                Err(e) => {
                    warn!(target: "arch_wiki_md", title = %article.title, error = %e, "skipping article");
                    continue;
                }
            }
        }
        processed.push(process_with_progress(article, i + 1, total, started));
    }

    store.save_buckets(split_by_language(processed), manifest)
}

fn process_with_progress(article: Article, count: usize, total: usize, started: Instant) -> ProcessedArticle {
    let processed = process_article(article);
    info!(
        target: "arch_wiki_md",
        "[{:>4}/{:>4}] [{}] {}",
        count,
        total,
        elapsed_stamp(started),
        processed.relative_path()
    );
    processed
}

/// `mm:ss.mmm` since `started`.
fn elapsed_stamp(started: Instant) -> String {
    let total_ms = started.elapsed().as_millis();
    let mins = total_ms / 60_000;
    let secs = (total_ms % 60_000) / 1_000;
    let ms = total_ms % 1_000;
    format!("{:02}:{:02}.{:03}", mins, secs, ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn sync_starts_at_utc_midnight() {
        assert_eq!(
            sync_start(datetime!(2016-03-04 17:45:12 UTC)),
            datetime!(2016-03-04 0:00 UTC)
        );
        assert_eq!(
            sync_start(datetime!(2016-03-05 01:00 +02:00)),
            datetime!(2016-03-04 0:00 UTC)
        );
    }

    #[test]
    fn elapsed_stamp_format() {
        let stamp = elapsed_stamp(Instant::now());
        assert_eq!(stamp.len(), "00:00.000".len());
        assert!(stamp.starts_with("00:00."));
    }
}
