//! Language detection from article titles and per-language bucketing.
//!
//! Translated ArchWiki pages carry their language as a trailing
//! parenthesized suffix written in that language, e.g. `Installation guide (Español)`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use time::OffsetDateTime;

/// Canonical language codes. Serialized as the lowercase variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Arabic,
    Bosnian,
    Bulgarian,
    Catalan,
    ChineseSim,
    ChineseTrad,
    Croatian,
    Czech,
    Danish,
    Dutch,
    English,
    Esperanto,
    Finnish,
    French,
    German,
    Greek,
    Hebrew,
    Hungarian,
    Indonesian,
    Italian,
    Japanese,
    Korean,
    Lithuanian,
    Norwegian,
    Persian,
    Polish,
    Portuguese,
    Romanian,
    Russian,
    Serbian,
    Slovak,
    Spanish,
    Swedish,
    Thai,
    Turkish,
    Ukrainian,
    Vietnamese,
}

impl Language {
    pub const ALL: [Language; 37] = [
        Language::Arabic,
        Language::Bosnian,
        Language::Bulgarian,
        Language::Catalan,
        Language::ChineseSim,
        Language::ChineseTrad,
        Language::Croatian,
        Language::Czech,
        Language::Danish,
        Language::Dutch,
        Language::English,
        Language::Esperanto,
        Language::Finnish,
        Language::French,
        Language::German,
        Language::Greek,
        Language::Hebrew,
        Language::Hungarian,
        Language::Indonesian,
        Language::Italian,
        Language::Japanese,
        Language::Korean,
        Language::Lithuanian,
        Language::Norwegian,
        Language::Persian,
        Language::Polish,
        Language::Portuguese,
        Language::Romanian,
        Language::Russian,
        Language::Serbian,
        Language::Slovak,
        Language::Spanish,
        Language::Swedish,
        Language::Thai,
        Language::Turkish,
        Language::Ukrainian,
        Language::Vietnamese,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Language::Arabic => "arabic",
            Language::Bosnian => "bosnian",
            Language::Bulgarian => "bulgarian",
            Language::Catalan => "catalan",
            Language::ChineseSim => "chinesesim",
            Language::ChineseTrad => "chinesetrad",
            Language::Croatian => "croatian",
            Language::Czech => "czech",
            Language::Danish => "danish",
            Language::Dutch => "dutch",
            Language::English => "english",
            Language::Esperanto => "esperanto",
            Language::Finnish => "finnish",
            Language::French => "french",
            Language::German => "german",
            Language::Greek => "greek",
            Language::Hebrew => "hebrew",
            Language::Hungarian => "hungarian",
            Language::Indonesian => "indonesian",
            Language::Italian => "italian",
            Language::Japanese => "japanese",
            Language::Korean => "korean",
            Language::Lithuanian => "lithuanian",
            Language::Norwegian => "norwegian",
            Language::Persian => "persian",
            Language::Polish => "polish",
            Language::Portuguese => "portuguese",
            Language::Romanian => "romanian",
            Language::Russian => "russian",
            Language::Serbian => "serbian",
            Language::Slovak => "slovak",
            Language::Spanish => "spanish",
            Language::Swedish => "swedish",
            Language::Thai => "thai",
            Language::Turkish => "turkish",
            Language::Ukrainian => "ukrainian",
            Language::Vietnamese => "vietnamese",
        }
    }

    /// The native name the wiki appends to translated titles.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::Arabic => "العربية",
            Language::Bosnian => "Bosanski",
            Language::Bulgarian => "Български",
            Language::Catalan => "Català",
            Language::ChineseSim => "简体中文",
            Language::ChineseTrad => "正體中文",
            Language::Croatian => "Hrvatski",
            Language::Czech => "Česky",
            Language::Danish => "Dansk",
            Language::Dutch => "Nederlands",
            Language::English => "English",
            Language::Esperanto => "Esperanto",
            Language::Finnish => "Suomi",
            Language::French => "Français",
            Language::German => "Deutsch",
            Language::Greek => "Ελληνικά",
            Language::Hebrew => "עברית",
            Language::Hungarian => "Magyar",
            Language::Indonesian => "Bahasa Indonesia",
            Language::Italian => "Italiano",
            Language::Japanese => "日本語",
            Language::Korean => "한국어",
            Language::Lithuanian => "Lietuvių",
            Language::Norwegian => "Norsk Bokmål",
            Language::Persian => "فارسی",
            Language::Polish => "Polski",
            Language::Portuguese => "Português",
            Language::Romanian => "Română",
            Language::Russian => "Русский",
            Language::Serbian => "Српски",
            Language::Slovak => "Slovenský",
            Language::Spanish => "Español",
            Language::Swedish => "Svenska",
            Language::Thai => "ไทย",
            Language::Turkish => "Türkçe",
            Language::Ukrainian => "Українська",
            Language::Vietnamese => "Tiếng Việt",
        }
    }

    /// Exact, case-sensitive lookup of a display name.
    pub fn from_display_name(name: &str) -> Option<Language> {
        DISPLAY_NAMES.get(name).copied()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

static DISPLAY_NAMES: LazyLock<HashMap<&'static str, Language>> = LazyLock::new(|| {
    Language::ALL
        .iter()
        .map(|lang| (lang.display_name(), *lang))
        .collect()
});

static TITLE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]+)\)\s*$").unwrap());

/// Language of a title, from its trailing `(Display name)` suffix.
pub fn detect_language(title: &str) -> Language {
    TITLE_SUFFIX
        .captures(title)
        .and_then(|caps| Language::from_display_name(&caps[1]))
        .unwrap_or(Language::English)
}

/// Anything that can be classified by its wiki title.
pub trait Titled {
    fn title(&self) -> &str;
}

impl Titled for String {
    fn title(&self) -> &str {
        self
    }
}

impl Titled for &str {
    fn title(&self) -> &str {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageBucket<A> {
    pub lang: Language,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    pub articles: Vec<A>,
}

impl<A> LanguageBucket<A> {
    pub fn new(lang: Language, last_updated: OffsetDateTime) -> Self {
        Self {
            lang,
            last_updated,
            articles: Vec::new(),
        }
    }
}

/// Partition articles by language, stamping every bucket with the current time.
pub fn split_by_language<A: Titled>(articles: impl IntoIterator<Item = A>) -> Vec<LanguageBucket<A>> {
    split_by_language_at(articles, OffsetDateTime::now_utc())
}

/// Like [`split_by_language`] with an explicit timestamp.
///
/// Buckets come out in the order their language was first seen.
pub fn split_by_language_at<A: Titled>(
    articles: impl IntoIterator<Item = A>,
    now: OffsetDateTime,
) -> Vec<LanguageBucket<A>> {
    let mut buckets: Vec<LanguageBucket<A>> = Vec::new();

    for article in articles {
        let lang = detect_language(article.title());
        match buckets.iter_mut().find(|b| b.lang == lang) {
            Some(bucket) => bucket.articles.push(article),
            None => {
                let mut bucket = LanguageBucket::new(lang, now);
                bucket.articles.push(article);
                buckets.push(bucket);
            }
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_language_from_suffix() {
        assert_eq!(detect_language("The Arch Way (简体中文)"), Language::ChineseSim);
        assert_eq!(detect_language("The Arch Way (简体中文)").code(), "chinesesim");
        assert_eq!(detect_language("Installation guide (Español)"), Language::Spanish);
        assert_eq!(detect_language("Systemd (Norsk Bokmål)"), Language::Norwegian);
    }

    #[test]
    fn unknown_or_missing_suffix_is_english() {
        assert_eq!(detect_language("The Arch Way"), Language::English);
        assert_eq!(detect_language("The Arch Way (foo bar)"), Language::English);
        assert_eq!(detect_language("Xorg (italiano)"), Language::English);
        assert_eq!(detect_language(""), Language::English);
    }

    #[test]
    fn only_the_trailing_group_counts() {
        assert_eq!(detect_language("Foo (Deutsch) bar"), Language::English);
        assert_eq!(detect_language("Foo (bar) (Deutsch)"), Language::German);
    }

    #[test]
    fn display_names_are_unique() {
        assert_eq!(DISPLAY_NAMES.len(), Language::ALL.len());
        for lang in Language::ALL {
            assert_eq!(Language::from_display_name(lang.display_name()), Some(lang));
        }
    }

    #[test]
    fn splits_in_first_seen_order() {
        let titles = ["foo", "foo (Italiano)", "foo (简体中文)", "bar (简体中文)"];
        let buckets = split_by_language(titles);

        let summary: Vec<(Language, usize)> =
            buckets.iter().map(|b| (b.lang, b.articles.len())).collect();
        assert_eq!(
            summary,
            vec![
                (Language::English, 1),
                (Language::Italian, 1),
                (Language::ChineseSim, 2),
            ]
        );
        assert_eq!(buckets[2].articles, vec!["foo (简体中文)", "bar (简体中文)"]);
    }

    #[test]
    fn language_serializes_as_code() {
        let json = serde_json::to_string(&Language::ChineseTrad).unwrap();
        assert_eq!(json, "\"chinesetrad\"");
        for lang in Language::ALL {
            let json = serde_json::to_string(&lang).unwrap();
            assert_eq!(json, format!("\"{}\"", lang.code()));
        }
    }
}
