//! Rendered HTML -> Markdown converter.
//!
//! The DOM is walked once. At every element the first matching entry of
//! [`HTML_RULES`] decides the output; elements no rule claims fall back to
//! plain Markdown conversions. Boilerplate rules come first so that stripped
//! containers never reach the generic `div` wrapping.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// A named element rewrite. `replacement` receives the already converted
/// inner Markdown of the element.
pub struct HtmlRule {
    pub name: &'static str,
    pub filter: fn(&ElementRef) -> bool,
    pub replacement: fn(&ElementRef, &str) -> String,
}

/// Element rules, in evaluation order.
pub static HTML_RULES: &[HtmlRule] = &[
    HtmlRule { name: "boilerplate", filter: is_boilerplate, replacement: strip },
    HtmlRule { name: "edit-section-anchor", filter: is_edit_section_anchor, replacement: strip },
    HtmlRule { name: "edit-section-span", filter: is_edit_section_span, replacement: strip },
    HtmlRule { name: "emphasis", filter: is_emphasis, replacement: emphasis },
    HtmlRule { name: "unwrap", filter: is_unwrapped, replacement: unwrap },
    HtmlRule { name: "anchor", filter: is_anchor, replacement: anchor },
    HtmlRule { name: "div", filter: is_div, replacement: block },
    HtmlRule { name: "pre", filter: is_pre, replacement: pre },
    HtmlRule { name: "dl", filter: is_dl, replacement: block },
    HtmlRule { name: "dt-dd", filter: is_dt_dd, replacement: definition },
    HtmlRule { name: "sup", filter: is_sup, replacement: strip },
];

static BOILERPLATE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)siteSub|siteNotice|jump-to-nav|catlinks").unwrap());
static FLOAT_RIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)float\s*:\s*right").unwrap());
static CLEAR_RIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)clear\s*:\s*(right|both)").unwrap());
static EDIT_SECTION_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)edit section").unwrap());
static EDIT_SECTION_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)editsection").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static BLANK_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]+$").unwrap());
static ESCAPED_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\\n").unwrap());
static MANY_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static EMPTY_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[\s*\]\]|\[\s*\]\(\s*\)").unwrap());
static WIKIPEDIA_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#" ?"wikipedia:[^"]*""#).unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());

/// Convert an HTML fragment to Markdown.
pub fn convert_html(fragment: &str) -> String {
    let html = Html::parse_fragment(fragment);
    postprocess(&convert_children(&html.root_element(), false))
}

fn convert_element(el: &ElementRef, in_pre: bool) -> String {
    let name = el.value().name();
    let in_pre = in_pre || name == "pre";

    if let Some(rule) = HTML_RULES.iter().find(|rule| (rule.filter)(el)) {
        let inner = convert_children(el, in_pre);
        return (rule.replacement)(el, &inner);
    }

    match name {
        "script" | "style" | "noscript" | "head" | "title" => String::new(),
        "table" => table(el),
        _ => {
            let inner = convert_children(el, in_pre);
            fallback(el, &inner, in_pre)
        }
    }
}

fn convert_children(el: &ElementRef, in_pre: bool) -> String {
    let mut out = String::new();
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            push_joined(&mut out, &convert_element(&child_el, in_pre));
        } else if let Some(text) = child.value().as_text() {
            if in_pre {
                out.push_str(text);
            } else {
                push_joined(&mut out, &WHITESPACE_RUN.replace_all(text, " "));
            }
        }
    }
    out
}

/// Append without doubling a space at the seam.
fn push_joined(out: &mut String, piece: &str) {
    if out.ends_with(' ') && piece.starts_with(' ') {
        out.push_str(&piece[1..]);
    } else {
        out.push_str(piece);
    }
}

fn fallback(el: &ElementRef, inner: &str, in_pre: bool) -> String {
    let name = el.value().name();
    match name {
        "p" => format!("\n\n{}\n\n", inner.trim()),
        "strong" | "b" => wrap_inline(inner, "**"),
        "code" | "tt" | "kbd" | "samp" if !in_pre => wrap_inline(inner, "`"),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            format!("\n\n{} {}\n\n", "#".repeat(level), inner.trim())
        }
        "br" => "  \n".to_string(),
        "hr" => "\n\n---\n\n".to_string(),
        "ul" | "ol" => format!("\n\n{}\n\n", inner.trim_matches('\n')),
        "li" => list_item(el, inner),
        "blockquote" => {
            let quoted: Vec<String> = inner
                .trim()
                .lines()
                .map(|line| format!("> {}", line).trim_end().to_string())
                .collect();
            format!("\n\n{}\n\n", quoted.join("\n"))
        }
        "img" => {
            let alt = el.value().attr("alt").unwrap_or("");
            let src = el.value().attr("src").unwrap_or("");
            format!("![{}]({})", alt, src)
        }
        _ => inner.to_string(),
    }
}

fn wrap_inline(inner: &str, marker: &str) -> String {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{marker}{trimmed}{marker}")
}

fn list_item(el: &ElementRef, inner: &str) -> String {
    let ordered = el
        .parent()
        .and_then(|p| p.value().as_element().map(|e| e.name() == "ol"))
        .unwrap_or(false);

    let prefix = if ordered {
        let position = el
            .prev_siblings()
            .filter(|n| n.value().as_element().is_some_and(|e| e.name() == "li"))
            .count()
            + 1;
        format!("{}. ", position)
    } else {
        "* ".to_string()
    };

    let body = inner.trim_matches('\n').trim().replace('\n', "\n    ");
    format!("{}{}\n", prefix, body)
}

fn table(el: &ElementRef) -> String {
    let mut lines: Vec<String> = Vec::new();

    for (index, row) in el.select(&ROW).enumerate() {
        let mut cells: Vec<String> = Vec::new();
        let mut all_headers = true;
        for cell in row.children().filter_map(ElementRef::wrap) {
            let name = cell.value().name();
            if name != "th" && name != "td" {
                continue;
            }
            all_headers &= name == "th";
            let text = convert_children(&cell, false);
            let text = WHITESPACE_RUN.replace_all(text.trim(), " ").replace('|', r"\|");
            cells.push(text);
        }
        if cells.is_empty() {
            continue;
        }

        lines.push(format!("| {} |", cells.join(" | ")));
        if index == 0 {
            if !all_headers {
                // GFM needs a header row; promote an empty one.
                let empty = vec![" "; cells.len()].join("|");
                lines.insert(0, format!("|{}|", empty));
            }
            lines.push(format!("| {} |", vec!["---"; cells.len()].join(" | ")));
        }
    }

    if lines.is_empty() {
        return String::new();
    }
    format!("\n\n{}\n\n", lines.join("\n"))
}

fn postprocess(markdown: &str) -> String {
    let text = ESCAPED_NEWLINE.replace_all(markdown, "\n");
    let text = BLANK_LINE.replace_all(&text, "");
    let text = MANY_NEWLINES.replace_all(&text, "\n\n");
    let text = EMPTY_BRACKETS.replace_all(&text, "");
    let text = WIKIPEDIA_TITLE.replace_all(&text, "");
    text.trim_matches(|c| c == '\n' || c == ' ').to_string()
}

fn has_class(el: &ElementRef, needle: &str) -> bool {
    el.value().classes().any(|c| c.eq_ignore_ascii_case(needle))
}

fn is_boilerplate(el: &ElementRef) -> bool {
    let value = el.value();
    if value.id().is_some_and(|id| BOILERPLATE_ID.is_match(id)) {
        return true;
    }
    if value.classes().any(|c| c.to_ascii_lowercase().contains("noprint")) {
        return true;
    }
    value.name() == "div"
        && value
            .attr("style")
            .is_some_and(|style| FLOAT_RIGHT.is_match(style) && CLEAR_RIGHT.is_match(style))
}

fn is_edit_section_anchor(el: &ElementRef) -> bool {
    el.value().name() == "a"
        && el
            .value()
            .attr("title")
            .is_some_and(|title| EDIT_SECTION_TITLE.is_match(title))
}

fn is_edit_section_span(el: &ElementRef) -> bool {
    el.value().classes().any(|c| EDIT_SECTION_CLASS.is_match(c))
}

fn is_emphasis(el: &ElementRef) -> bool {
    matches!(el.value().name(), "em" | "i")
}

fn is_unwrapped(el: &ElementRef) -> bool {
    match el.value().name() {
        "span" => true,
        "a" => el
            .value()
            .id()
            .is_some_and(|id| id.eq_ignore_ascii_case("top") || id.eq_ignore_ascii_case("toggleLink")),
        _ => false,
    }
}

fn is_anchor(el: &ElementRef) -> bool {
    el.value().name() == "a"
}

fn is_div(el: &ElementRef) -> bool {
    el.value().name() == "div"
}

fn is_pre(el: &ElementRef) -> bool {
    el.value().name() == "pre"
}

fn is_dl(el: &ElementRef) -> bool {
    el.value().name() == "dl"
}

fn is_dt_dd(el: &ElementRef) -> bool {
    matches!(el.value().name(), "dt" | "dd")
}

fn is_sup(el: &ElementRef) -> bool {
    el.value().name() == "sup"
}

fn strip(_: &ElementRef, _: &str) -> String {
    String::new()
}

fn unwrap(_: &ElementRef, inner: &str) -> String {
    inner.to_string()
}

fn emphasis(_: &ElementRef, inner: &str) -> String {
    wrap_inline(inner, "*")
}

fn anchor(el: &ElementRef, inner: &str) -> String {
    let label = inner.trim();
    if label.is_empty() {
        return String::new();
    }
    match el.value().attr("href") {
        Some(href) if has_class(el, "external") => format!("**{}** (_{}_)", label, href),
        _ => format!("**{}**", label),
    }
}

fn block(_: &ElementRef, inner: &str) -> String {
    format!("\n\n{}\n\n", inner)
}

fn pre(_: &ElementRef, inner: &str) -> String {
    let code = inner.trim_end_matches('\n');
    if code.contains('\n') {
        format!("\n\n```\n{}\n```\n\n", code)
    } else {
        format!(" `{}` ", code)
    }
}

fn definition(_: &ElementRef, inner: &str) -> String {
    format!("\n\t{}\n", inner.trim())
}
