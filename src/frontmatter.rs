//! YAML frontmatter for generated Markdown files.

use crate::article::ProcessedArticle;
use crate::error::Result;
use crate::lang::Language;
use serde::{Deserialize, Serialize};
use time::macros::format_description;

/// Frontmatter written at the top of every article file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontmatter {
    pub title: String,
    /// Omitted from the YAML when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub lang: Language,
    pub source_url: String,
    pub page_id: u64,
    pub last_revision_id: u64,
    /// `YYYY-MM-DD` of the last revision.
    pub last_modified: String,
    pub generated_by: String,
}

impl Frontmatter {
    pub fn for_article(processed: &ProcessedArticle) -> Result<Self> {
        let fmt = format_description!("[year]-[month]-[day]");
        let article = &processed.article;
        Ok(Self {
            title: article.title.clone(),
            description: processed.description.clone(),
            lang: processed.lang,
            source_url: article.url.clone(),
            page_id: article.page_id,
            last_revision_id: article.last_revision_id,
            last_modified: article.last_modified.format(&fmt)?,
            generated_by: concat!("arch-wiki-md ", env!("CARGO_PKG_VERSION")).to_string(),
        })
    }

    /// Serialize including both `---` delimiter lines.
    pub fn to_yaml_string(&self) -> Result<String> {
        let body = serde_yaml::to_string(self)?;
        let body = strip_yaml_document_markers(&body);
        let mut out = String::with_capacity(body.len() + 8);
        out.push_str("---\n");
        out.push_str(&body);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("---\n");
        Ok(out)
    }

    /// Parse the frontmatter block at the top of a generated file, returning
    /// it together with the Markdown body.
    pub fn parse(document: &str) -> Option<Result<(Self, &str)>> {
        let (block, rest) = split_yaml_frontmatter(document)?;
        let inner = block
            .lines()
            .skip(1)
            .take_while(|line| line.trim_end() != "---")
            .collect::<Vec<_>>()
            .join("\n");
        Some(
            serde_yaml::from_str(&inner)
                .map(|fm| (fm, rest.trim_start_matches(['\n', '\r'])))
                .map_err(Into::into),
        )
    }
}

/// Full file contents for an article: frontmatter, a blank line, then the body.
pub fn render_document(processed: &ProcessedArticle) -> Result<String> {
    let mut out = Frontmatter::for_article(processed)?.to_yaml_string()?;
    out.push('\n');
    out.push_str(processed.markdown.trim_start_matches(['\n', '\r']));
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// If `text` starts with YAML frontmatter (`---` ... `---`), return the block
/// verbatim (both delimiter lines included) and the remainder of the document.
pub fn split_yaml_frontmatter(text: &str) -> Option<(&str, &str)> {
    if !(text.starts_with("---\n") || text.starts_with("---\r\n")) {
        return None;
    }

    let mut lines = text.split_inclusive('\n');
    let mut pos = lines.next()?.len();
    for line in lines {
        pos += line.len();
        if line.trim_end_matches(['\n', '\r']) == "---" {
            return Some((&text[..pos], &text[pos..]));
        }
    }
    None
}

fn strip_yaml_document_markers(s: &str) -> &str {
    let s = s.strip_prefix("---\n").unwrap_or(s);
    s.strip_suffix("...\n").unwrap_or(s)
}
