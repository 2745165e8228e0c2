//! Wikitext -> Markdown normalizer.
//!
//! Conversion is line oriented: every line runs through [`LINE_RULES`] in
//! declaration order, then indented preformatted runs are fenced and the
//! whole text gets a final cleanup. Later rules see the output of earlier
//! ones, so the order of the table is part of the contract (templates are
//! rewritten after inline code, tables after links, ...).
//!
//! Nothing in here fails. A rule whose pattern does not match leaves the
//! line alone, so malformed markup degrades to literal text.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Outcome of applying one rule to one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    Unchanged,
    Replaced(String),
    /// The line carries no content in Markdown (table delimiters, row separators).
    Dropped,
}

impl From<Cow<'_, str>> for Rewrite {
    fn from(value: Cow<'_, str>) -> Self {
        match value {
            Cow::Borrowed(_) => Rewrite::Unchanged,
            Cow::Owned(s) => Rewrite::Replaced(s),
        }
    }
}

/// A named line rewrite.
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&str) -> Rewrite,
}

/// Per-line rules, in application order.
pub static LINE_RULES: &[Rule] = &[
    Rule { name: "list-markers", apply: list_markers },
    Rule { name: "section-links", apply: section_links },
    Rule { name: "piped-links", apply: piped_links },
    Rule { name: "plain-links", apply: plain_links },
    Rule { name: "named-external-links", apply: named_external_links },
    Rule { name: "bare-external-links", apply: bare_external_links },
    Rule { name: "strike-underline", apply: strike_underline },
    Rule { name: "comments", apply: comments },
    Rule { name: "bold-italic", apply: bold_italic },
    Rule { name: "headers", apply: headers },
    Rule { name: "definition-lists", apply: definition_lists },
    Rule { name: "inline-code", apply: inline_code },
    Rule { name: "block-code", apply: block_code },
    Rule { name: "colon-indent", apply: colon_indent },
    Rule { name: "templates", apply: templates },
    Rule { name: "tables", apply: tables },
];

const FENCE: &str = "```";

static LIST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([*#]{1,8}) ?").unwrap());
static SECTION_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\[\]|#]*)#([^\[\]|]+)(?:\|([^\[\]]+))?\]\]").unwrap()
});
static PIPED_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\[\]|\s][^\[\]|]*)\|([^\[\]]+)\]\]").unwrap());
static PLAIN_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\[([^\[\]|\s][^\[\]|]*)\]\]").unwrap());
static NAMED_EXTERNAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[((?:https?|ftp)://[^\s\[\]]+)(?:\s+([^\[\]]+))?\]").unwrap()
});
static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(^|[^*\w/|=])((?:https?|ftp)://[^\s\[\]<>"|{}*]+)"#).unwrap()
});
static STRIKE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<s>(.*?)</s>").unwrap());
static UNDERLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<u>(.*?)</u>").unwrap());
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static BOLD_ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'''''(.+?)'''''").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'''(.+?)'''").unwrap());
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"''(.+?)''").unwrap());
static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(={2,6})\s*(.*?)\s*=+\s*$").unwrap());
static DEF_TERM_AND_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^;\s*([^:]+?)\s*:\s*(.+)$").unwrap());
static DEF_TERM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^;\s*(.+?)\s*$").unwrap());
static DEF_DEFINITION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^:\s+(\S.*)$").unwrap());
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{ic\|(?:1=)?(.*?)\}\}").unwrap());
static HEADED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{\{hc\|(?:1=)?([^|]*?)\|(?:2=)?(.*?)\}\}").unwrap()
});
static BARE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{bc\|(?:1=)?(.*?)\}\}").unwrap());
static COLON_INDENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(:+)\s*").unwrap());
static TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}|]+)\|([^{}]*)\}\}").unwrap());
static PACKAGE_TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(pkg|aur|grp)$").unwrap());
static BLOCK_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*\{\{(bc|hc)\|(.*)$").unwrap());
static NOWIKI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</?nowiki>").unwrap());
static MANY_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static EMPTY_BRACKETS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\[\s*\]\]").unwrap());
static WIKIPEDIA_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#" ?"wikipedia:[^"]*""#).unwrap());

/// Output line, tagged so the fencing pass leaves code blocks alone.
enum Line {
    Text(String),
    Verbatim(String),
}

/// Convert a full wikitext document to Markdown.
pub fn normalize(wikitext: &str) -> String {
    // comments may span lines; the per-line rule only sees single-line ones.
    let text = COMMENT.replace_all(wikitext, "");

    let mut lines: Vec<Line> = Vec::new();
    let mut in_block_code = false;

    for raw in text.lines() {
        if in_block_code {
            let trimmed = raw.trim_end();
            if let Some(body) = trimmed.strip_suffix("}}") {
                let body = NOWIKI.replace_all(body, "");
                if !body.trim().is_empty() {
                    lines.push(Line::Verbatim(body.into_owned()));
                }
                lines.push(Line::Verbatim(FENCE.to_string()));
                in_block_code = false;
            } else {
                lines.push(Line::Verbatim(NOWIKI.replace_all(raw, "").into_owned()));
            }
            continue;
        }

        if let Some(caps) = BLOCK_OPEN.captures(raw)
            && !caps[2].contains("}}")
        {
            in_block_code = true;
            lines.push(Line::Verbatim(FENCE.to_string()));
            let rest = NOWIKI.replace_all(&caps[2], "");
            let rest = rest.strip_prefix("1=").unwrap_or(&*rest);
            if caps[1].eq_ignore_ascii_case("hc") {
                let (header, body) = rest.split_once('|').unwrap_or((rest, ""));
                lines.push(Line::Verbatim(header.to_string()));
                let body = body.strip_prefix("2=").unwrap_or(body);
                if !body.trim().is_empty() {
                    lines.push(Line::Verbatim(body.to_string()));
                }
            } else if !rest.trim().is_empty() {
                lines.push(Line::Verbatim(rest.to_string()));
            }
            continue;
        }

        if let Some(line) = apply_line_rules(raw) {
            lines.push(Line::Text(line));
        }
    }

    if in_block_code {
        lines.push(Line::Verbatim(FENCE.to_string()));
    }

    cleanup(&fence_indented(lines).join("\n"))
}

/// Run every rule over a single line. `None` means the line was dropped.
pub fn apply_line_rules(line: &str) -> Option<String> {
    let mut current = line.to_string();
    for rule in LINE_RULES {
        match (rule.apply)(&current) {
            Rewrite::Unchanged => {}
            Rewrite::Replaced(next) => current = next,
            Rewrite::Dropped => return None,
        }
    }
    Some(current)
}

fn fence_indented(lines: Vec<Line>) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    let mut fenced = false;

    for line in lines {
        match line {
            Line::Verbatim(s) => {
                if fenced {
                    out.push(FENCE.to_string());
                    fenced = false;
                }
                out.push(s);
            }
            Line::Text(s) => {
                let indented = s.starts_with(' ') && !s.trim().is_empty() && !is_fence_exempt(&s);
                if indented {
                    if !fenced {
                        out.push(FENCE.to_string());
                        fenced = true;
                    }
                    out.push(s[1..].to_string());
                } else {
                    if fenced {
                        out.push(FENCE.to_string());
                        fenced = false;
                    }
                    out.push(s);
                }
            }
        }
    }

    if fenced {
        out.push(FENCE.to_string());
    }
    out
}

/// List items are indented on purpose; table leftovers are not code.
fn is_fence_exempt(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("+ ")
        || t.starts_with("1. ")
        || t.starts_with('|')
        || t.starts_with('!')
        || t.starts_with("{|")
}

fn cleanup(text: &str) -> String {
    let text = MANY_NEWLINES.replace_all(text, "\n\n");
    let text = EMPTY_BRACKETS.replace_all(&text, "");
    let text = WIKIPEDIA_TITLE.replace_all(&text, "");
    text.trim_matches('\n').to_string()
}

fn list_markers(line: &str) -> Rewrite {
    let Some(caps) = LIST.captures(line) else {
        return Rewrite::Unchanged;
    };
    let markers = &caps[1];
    let rest = &line[caps[0].len()..];

    let mut out = "  ".repeat(markers.len() - 1);
    out.push_str(if markers.ends_with('#') { "1. " } else { "+ " });
    out.push_str(rest);
    Rewrite::Replaced(out)
}

fn section_links(line: &str) -> Rewrite {
    SECTION_LINK
        .replace_all(line, |caps: &Captures| {
            let label = caps.get(3).map_or(&caps[2], |m| m.as_str());
            format!("**{}**", label.trim())
        })
        .into()
}

fn piped_links(line: &str) -> Rewrite {
    PIPED_LINK
        .replace_all(line, |caps: &Captures| format!("**{}**", caps[2].trim()))
        .into()
}

fn plain_links(line: &str) -> Rewrite {
    PLAIN_LINK
        .replace_all(line, |caps: &Captures| format!("**{}**", caps[1].trim()))
        .into()
}

fn named_external_links(line: &str) -> Rewrite {
    NAMED_EXTERNAL
        .replace_all(line, |caps: &Captures| match caps.get(2) {
            Some(label) => format!("**{}** (*{}*)", label.as_str().trim(), &caps[1]),
            None => format!("*{}*", &caps[1]),
        })
        .into()
}

fn bare_external_links(line: &str) -> Rewrite {
    BARE_URL
        .replace_all(line, |caps: &Captures| {
            let url = &caps[2];
            // sentence punctuation directly after a url is not part of it.
            let trimmed = url.trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
            format!("{}*{}*{}", &caps[1], trimmed, &url[trimmed.len()..])
        })
        .into()
}

fn strike_underline(line: &str) -> Rewrite {
    let struck = STRIKE.replace_all(line, "~~${1}~~");
    let underlined = UNDERLINE.replace_all(&struck, "_${1}_");
    if matches!(struck, Cow::Borrowed(_)) && matches!(underlined, Cow::Borrowed(_)) {
        Rewrite::Unchanged
    } else {
        Rewrite::Replaced(underlined.into_owned())
    }
}

fn comments(line: &str) -> Rewrite {
    COMMENT.replace_all(line, "").into()
}

fn bold_italic(line: &str) -> Rewrite {
    // longest run first so ''''' is never split into ''' + ''.
    let text = BOLD_ITALIC.replace_all(line, "**_${1}_**");
    let text = BOLD.replace_all(&text, "**${1}**").into_owned();
    let text = ITALIC.replace_all(&text, "*${1}*").into_owned();
    if text == line {
        Rewrite::Unchanged
    } else {
        Rewrite::Replaced(text)
    }
}

fn headers(line: &str) -> Rewrite {
    let Some(caps) = HEADER.captures(line) else {
        return Rewrite::Unchanged;
    };
    let level = caps[1].len();
    Rewrite::Replaced(format!("{} {}", "#".repeat(level), caps[2].trim()))
}

fn definition_lists(line: &str) -> Rewrite {
    if let Some(caps) = DEF_TERM_AND_DEF.captures(line) {
        return Rewrite::Replaced(format!("**{}**\n\t{}", &caps[1], caps[2].trim()));
    }
    if let Some(caps) = DEF_TERM.captures(line) {
        return Rewrite::Replaced(format!("**{}**", &caps[1]));
    }
    if let Some(caps) = DEF_DEFINITION.captures(line) {
        return Rewrite::Replaced(format!("\t{}", &caps[1]));
    }
    Rewrite::Unchanged
}

fn inline_code(line: &str) -> Rewrite {
    INLINE_CODE.replace_all(line, "`${1}`").into()
}

fn block_code(line: &str) -> Rewrite {
    let headed = fence_matches(line, &HEADED_CODE, |caps| format!("{}\n{}", &caps[1], &caps[2]));
    let current = headed.as_deref().unwrap_or(line);
    match fence_matches(current, &BARE_CODE, |caps| caps[1].to_string()).or(headed) {
        Some(fenced) => Rewrite::Replaced(fenced),
        None => Rewrite::Unchanged,
    }
}

/// Replace every match with a fenced block that starts and ends on a line
/// of its own. `None` when nothing matched.
fn fence_matches(line: &str, re: &Regex, body: impl Fn(&Captures) -> String) -> Option<String> {
    let mut out = String::new();
    let mut last = 0;
    for caps in re.captures_iter(line) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(line[last..whole.start()].trim_end());
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("{FENCE}\n{}\n{FENCE}", body(&caps)));
        last = whole.end();
    }
    if last == 0 {
        return None;
    }

    let rest = line[last..].trim();
    if !rest.is_empty() {
        out.push('\n');
        out.push_str(rest);
    }
    Some(out)
}

fn colon_indent(line: &str) -> Rewrite {
    COLON_INDENT
        .replace(line, |caps: &Captures| "\t".repeat(caps[1].len()))
        .into()
}

fn templates(line: &str) -> Rewrite {
    TEMPLATE
        .replace_all(line, |caps: &Captures| {
            let name = caps[1].trim();
            let text = caps[2].trim();
            if PACKAGE_TEMPLATE.is_match(name) {
                format!("**{}** (*{}*)", text, name)
            } else {
                format!("**{}**: *{}*", name, text)
            }
        })
        .into()
}

fn tables(line: &str) -> Rewrite {
    if line.starts_with("{|") || line.starts_with("|}") || line.starts_with("|-") {
        return Rewrite::Dropped;
    }

    if let Some(caption) = line.strip_prefix("|+") {
        return Rewrite::Replaced(format!("**_{}_**", cell_content(caption)));
    }

    if let Some(header) = line.strip_prefix('!') {
        let cells: Vec<&str> = header.split("!!").map(cell_content).collect();
        let separator = vec!["---"; cells.len()].join(" | ");
        return Rewrite::Replaced(format!("{}\n{}", cells.join(" | "), separator));
    }

    if let Some(row) = line.strip_prefix('|') {
        let cells: Vec<&str> = row.split("||").map(cell_content).collect();
        return Rewrite::Replaced(cells.join(" | "));
    }

    Rewrite::Unchanged
}

/// Cell text without a leading `attrs |` section.
fn cell_content(segment: &str) -> &str {
    // only treat the first '|' as an attribute separator when the left side
    // looks like attributes, so content such as `a | b` survives.
    if let Some((left, right)) = split_once_unquoted(segment, '|')
        && left.contains('=')
    {
        return right.trim();
    }
    segment.trim()
}

fn split_once_unquoted(s: &str, needle: char) -> Option<(&str, &str)> {
    let mut in_quotes = false;
    for (i, ch) in s.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == needle && !in_quotes => {
                return Some((&s[..i], &s[i + needle.len_utf8()..]));
            }
            _ => {}
        }
    }
    None
}
