//! Picks a one-line summary out of raw article markup.
//!
//! Articles usually open with navigation templates, interlanguage links and
//! magic words before the first prose paragraph; those are skipped.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static INTERLANGUAGE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\[(?:[a-z]{2,3}(?:-[a-z]{2,4})?|[Cc]ategory):").unwrap()
});
static HTML_CATEGORY_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[[^\]]*\]\([^)]*category:").unwrap());
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:=|#{1,6}\s)").unwrap());
static MAGIC_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^__[A-Z]+__$").unwrap());
static TEMPLATE_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\{\{([^|}]+)").unwrap());
static SKIPPED_TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)lowercase|related|note|tip|displaytitle").unwrap());
static INLINE_TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{([^|}]+)\|([^}]*)\}\}(.*)$").unwrap());
static PACKAGE_TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(pkg|aur|ic|hc)\s*$").unwrap());

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[(?:[^\]|]*\|)?([^\]|]*)\]\]").unwrap());
static NAMED_EXTERNAL_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?:https?|ftp)://[^\s\]]+\s+([^\]]+)\]").unwrap());
static BARE_EXTERNAL_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[((?:https?|ftp)://[^\s\]]+)\]").unwrap());
static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^{}]*)\}\}").unwrap());
static QUOTE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'{2,5}").unwrap());
static UNDERSCORE_EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\s)_([^_]+)_").unwrap());
static HEADER_MARKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"={2,}").unwrap());
static STRAY_MARKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[*"{}|\t]"#).unwrap());
static LEADING_COLONS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*:+").unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());

enum Verdict<'a> {
    Skip,
    Describe(std::borrow::Cow<'a, str>),
}

/// Return the first paragraph that reads like prose, cleaned to plain text.
///
/// Blank lines are not paragraphs. Headings are passed over while anything
/// follows them. Once fewer than three paragraphs remain the next one is
/// taken as is, so short articles always yield something.
pub fn extract_description(markup: &str) -> String {
    let paragraphs: Vec<&str> = markup
        .split('\n')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let mut cursor = 0;

    while cursor < paragraphs.len() {
        let remaining = &paragraphs[cursor..];
        cursor += 1;
        if remaining.len() > 1 && HEADING.is_match(remaining[0]) {
            continue;
        }
        if remaining.len() < 3 {
            return clean_description(remaining[0]);
        }

        match judge(remaining[0]) {
            Verdict::Skip => continue,
            Verdict::Describe(text) => return clean_description(&text),
        }
    }

    String::new()
}

fn judge(paragraph: &str) -> Verdict<'_> {
    if paragraph.starts_with("From")
        || INTERLANGUAGE_LINK.is_match(paragraph)
        || HTML_CATEGORY_LINK.is_match(paragraph)
        || MAGIC_WORD.is_match(paragraph)
    {
        return Verdict::Skip;
    }

    if !paragraph.starts_with('{') {
        return Verdict::Describe(paragraph.into());
    }

    let Some(name) = TEMPLATE_NAME.captures(paragraph).map(|c| c[1].to_string()) else {
        return Verdict::Describe(paragraph.into());
    };
    if SKIPPED_TEMPLATE.is_match(&name) {
        return Verdict::Skip;
    }
    if let Some(caps) = INLINE_TEMPLATE.captures(paragraph)
        && PACKAGE_TEMPLATE.is_match(&caps[1])
    {
        return Verdict::Describe(format!("{}{}", &caps[2], &caps[3]).into());
    }
    Verdict::Skip
}

/// Reduce a paragraph of wikitext or Markdown to plain text.
pub fn clean_description(paragraph: &str) -> String {
    let text = MARKDOWN_LINK.replace_all(paragraph, "$1");
    let text = WIKI_LINK.replace_all(&text, "$1");
    let text = NAMED_EXTERNAL_LINK.replace_all(&text, "$1");
    let text = BARE_EXTERNAL_LINK.replace_all(&text, "$1");
    let text = TEMPLATE.replace_all(&text, |caps: &Captures| last_argument(&caps[1]).to_string());
    let text = QUOTE_RUN.replace_all(&text, "");
    let text = UNDERSCORE_EMPHASIS.replace_all(&text, "$1$2");
    let text = HEADER_MARKS.replace_all(&text, "");
    let text = STRAY_MARKS.replace_all(&text, "");
    let text = LEADING_COLONS.replace(&text, "");
    let text = SPACES.replace_all(&text, " ");
    text.trim().to_string()
}

fn last_argument(body: &str) -> &str {
    match body.rsplit_once('|') {
        Some((_, last)) => last.trim(),
        None => "",
    }
}
