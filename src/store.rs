//! The on-disk mirror: Markdown files per language plus the `db.json` manifest.

use crate::article::{ArticleRecord, ProcessedArticle};
use crate::error::{Error, Result};
use crate::frontmatter::render_document;
use crate::lang::{Language, LanguageBucket, Titled};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Everything written so far, grouped by language. Lets `sync` skip
/// articles whose revision has not changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(with = "time::serde::rfc3339")]
    pub updated: OffsetDateTime,
    pub db: Vec<LanguageBucket<ArticleRecord>>,
}

impl Manifest {
    pub fn new(updated: OffsetDateTime) -> Self {
        Self {
            updated,
            db: Vec::new(),
        }
    }

    /// `Ok(None)` when no manifest has been written yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(path, e)),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');

        // write then rename so an interrupted run never leaves a torn manifest.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| Error::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;
        debug!(target: "arch_wiki_md", path = %path.display(), "manifest stored");
        Ok(())
    }

    pub fn find(&self, title: &str) -> Option<&ArticleRecord> {
        self.db
            .iter()
            .flat_map(|bucket| bucket.articles.iter())
            .find(|record| record.title == title)
    }

    /// Already written at this revision.
    pub fn is_current(&self, title: &str, revision_id: u64) -> bool {
        self.find(title).is_some_and(|r| r.lastrevid == revision_id)
    }

    pub fn article_count(&self) -> usize {
        self.db.iter().map(|b| b.articles.len()).sum()
    }

    /// Fold freshly written records in. Same-title records are replaced in
    /// place, new ones appended, missing languages get a new bucket.
    pub fn merge(&mut self, buckets: Vec<LanguageBucket<ArticleRecord>>, now: OffsetDateTime) {
        for incoming in buckets {
            let bucket = match self.db.iter().position(|b| b.lang == incoming.lang) {
                Some(i) => &mut self.db[i],
                None => {
                    self.db.push(LanguageBucket::new(incoming.lang, now));
                    let last = self.db.len() - 1;
                    &mut self.db[last]
                }
            };
            for record in incoming.articles {
                match bucket.articles.iter_mut().find(|r| r.title == record.title) {
                    Some(existing) => *existing = record,
                    None => bucket.articles.push(record),
                }
            }
            bucket.last_updated = now;
        }
        self.updated = now;
    }
}

/// Writes processed articles under a target directory.
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("db.json")
    }

    /// Write one article to `<root>/<lang>/<sanitized title>.md`.
    pub fn write_article(&self, processed: &ProcessedArticle) -> Result<PathBuf> {
        let path = self.root.join(processed.relative_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let document = render_document(processed)?;
        fs::write(&path, document).map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }

    /// Write every article of every bucket and merge the results into
    /// `manifest`, storing it after each bucket. An article that fails to
    /// write is logged and left out of the manifest.
    pub fn save_buckets(
        &self,
        buckets: Vec<LanguageBucket<ProcessedArticle>>,
        manifest: &mut Manifest,
    ) -> Result<usize> {
        let manifest_path = self.manifest_path();
        let mut written = 0usize;

        for bucket in buckets {
            let lang: Language = bucket.lang;
            let mut records = LanguageBucket::new(lang, bucket.last_updated);

            for processed in &bucket.articles {
                match self.write_article(processed) {
                    Ok(path) => {
                        debug!(target: "arch_wiki_md", title = processed.title(), path = %path.display(), "written");
                        records.articles.push(processed.record());
                    }
                    Err(e) => {
                        warn!(target: "arch_wiki_md", title = processed.title(), error = %e, "skipping article");
                    }
                }
            }

            written += records.articles.len();
            info!(target: "arch_wiki_md", %lang, articles = records.articles.len(), "language saved");
            manifest.merge(vec![records], bucket.last_updated);
            manifest.store(&manifest_path)?;
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn record(title: &str, rev: u64) -> ArticleRecord {
        ArticleRecord {
            pageid: 1,
            title: title.to_string(),
            url: String::new(),
            lastrevid: rev,
            last_mod: datetime!(2016-01-01 0:00 UTC),
            description: String::new(),
            path: format!("english/{title}.md"),
        }
    }

    fn bucket(lang: Language, records: Vec<ArticleRecord>) -> LanguageBucket<ArticleRecord> {
        LanguageBucket {
            lang,
            last_updated: datetime!(2016-01-01 0:00 UTC),
            articles: records,
        }
    }

    #[test]
    fn merge_replaces_and_appends() {
        let mut manifest = Manifest::new(datetime!(2016-01-01 0:00 UTC));
        manifest.db.push(bucket(Language::English, vec![record("A", 1), record("B", 1)]));

        let now = datetime!(2016-02-02 12:00 UTC);
        manifest.merge(
            vec![
                bucket(Language::English, vec![record("B", 2), record("C", 1)]),
                bucket(Language::German, vec![record("A (Deutsch)", 5)]),
            ],
            now,
        );

        assert_eq!(manifest.updated, now);
        assert_eq!(manifest.db.len(), 2);
        let titles: Vec<&str> = manifest.db[0].articles.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
        assert!(manifest.is_current("B", 2));
        assert!(!manifest.is_current("B", 1));
        assert!(!manifest.is_current("Z", 1));
        assert_eq!(manifest.db[1].lang, Language::German);
        assert_eq!(manifest.db[1].last_updated, now);
        assert_eq!(manifest.article_count(), 4);
    }

    #[test]
    fn manifest_json_shape() {
        let mut manifest = Manifest::new(datetime!(2016-01-01 0:00 UTC));
        manifest.db.push(bucket(Language::ChineseSim, vec![record("A", 1)]));
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["updated"], "2016-01-01T00:00:00Z");
        assert_eq!(json["db"][0]["lang"], "chinesesim");
        assert_eq!(json["db"][0]["lastUpdated"], "2016-01-01T00:00:00Z");
        assert_eq!(json["db"][0]["articles"][0]["lastrevid"], 1);
    }
}
