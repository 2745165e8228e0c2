//! Article records and the per-article processing step.

use crate::describe::extract_description;
use crate::html::convert_html;
use crate::lang::{Language, Titled, detect_language};
use crate::normalize::normalize;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// What `Article::content` holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Wikitext,
    Html,
}

/// A fetched wiki page. Never modified after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub page_id: u64,
    pub title: String,
    pub url: String,
    pub last_revision_id: u64,
    pub last_modified: OffsetDateTime,
    pub content: String,
    pub format: SourceFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedArticle {
    pub article: Article,
    pub markdown: String,
    pub description: String,
    pub lang: Language,
    pub sanitized_title: String,
}

/// Manifest entry for a written article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub pageid: u64,
    pub title: String,
    pub url: String,
    pub lastrevid: u64,
    #[serde(rename = "lastMod", with = "time::serde::rfc3339")]
    pub last_mod: OffsetDateTime,
    pub description: String,
    pub path: String,
}

impl Titled for Article {
    fn title(&self) -> &str {
        &self.title
    }
}

impl Titled for ProcessedArticle {
    fn title(&self) -> &str {
        &self.article.title
    }
}

impl Titled for ArticleRecord {
    fn title(&self) -> &str {
        &self.title
    }
}

/// Convert, describe and classify one article.
pub fn process_article(article: Article) -> ProcessedArticle {
    let (markdown, description) = match article.format {
        SourceFormat::Wikitext => (normalize(&article.content), extract_description(&article.content)),
        SourceFormat::Html => {
            let markdown = convert_html(&article.content);
            let description = extract_description(&markdown);
            (markdown, description)
        }
    };

    ProcessedArticle {
        lang: detect_language(&article.title),
        sanitized_title: sanitize_title(&article.title),
        markdown,
        description,
        article,
    }
}

/// Replace every character that is not alphanumeric with `-`.
///
/// Non-ASCII letters are kept so translated titles stay readable.
pub fn sanitize_title(title: &str) -> String {
    let id: String = title
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    if id.is_empty() { "Untitled".to_string() } else { id }
}

impl ProcessedArticle {
    /// Path of the Markdown file relative to the target directory.
    pub fn relative_path(&self) -> String {
        format!("{}/{}.md", self.lang.code(), self.sanitized_title)
    }

    pub fn record(&self) -> ArticleRecord {
        ArticleRecord {
            pageid: self.article.page_id,
            title: self.article.title.clone(),
            url: self.article.url.clone(),
            lastrevid: self.article.last_revision_id,
            last_mod: self.article.last_modified,
            description: self.description.clone(),
            path: self.relative_path(),
        }
    }
}
