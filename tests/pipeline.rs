use arch_wiki_md::frontmatter::Frontmatter;
use arch_wiki_md::{Article, Config, Error, Language, Manifest, Result, SourceFormat, WikiSource};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use time::OffsetDateTime;
use time::macros::datetime;

/// Canned wiki: fixed page lists and a url -> html map for scraping.
#[derive(Default)]
struct FakeWiki {
    all: Vec<Article>,
    changed: Vec<Article>,
    pages: HashMap<String, String>,
    since: Option<OffsetDateTime>,
    rendered: usize,
}

impl WikiSource for FakeWiki {
    fn all_pages(&mut self) -> Result<Vec<Article>> {
        Ok(self.all.clone())
    }

    fn recent_changes(&mut self, since: OffsetDateTime) -> Result<Vec<Article>> {
        self.since = Some(since);
        Ok(self.changed.clone())
    }

    fn rendered_html(&mut self, title: &str) -> Result<String> {
        self.rendered += 1;
        Ok(format!("<p>Rendered <b>{title}</b>.</p>"))
    }

    fn fetch_page(&mut self, url: &str) -> Result<String> {
        if !url.starts_with("https://") {
            return Err(Error::InvalidUrl {
                url: url.to_string(),
                message: "relative URL without a base".to_string(),
            });
        }
        self.pages.get(url).cloned().ok_or_else(|| Error::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

fn article(page_id: u64, title: &str, rev: u64, content: &str) -> Article {
    Article {
        page_id,
        title: title.to_string(),
        url: format!("https://wiki.archlinux.org/title/{}", title.replace(' ', "_")),
        last_revision_id: rev,
        last_modified: datetime!(2016-03-04 05:06:07 UTC),
        content: content.to_string(),
        format: SourceFormat::Wikitext,
    }
}

fn config(dir: &Path) -> Config {
    Config {
        target_dir: dir.to_path_buf(),
        ..Config::default()
    }
}

#[test]
fn build_writes_articles_and_manifest() {
    let dir = tempdir().unwrap();
    let mut wiki = FakeWiki {
        all: vec![
            article(1, "Pacman", 10, "'''pacman''' manages packages.\n== Usage =="),
            article(2, "Pacman (Italiano)", 11, "'''pacman''' gestisce i pacchetti."),
            article(3, "Systemd", 12, "{{Related articles}}\n'''systemd''' is an init.\nmore\nmore"),
        ],
        ..FakeWiki::default()
    };

    let written = arch_wiki_md::build(&config(dir.path()), &mut wiki).unwrap();
    assert_eq!(written, 3);

    let doc = fs::read_to_string(dir.path().join("english").join("Pacman.md")).unwrap();
    let (fm, body) = Frontmatter::parse(&doc).unwrap().unwrap();
    assert_eq!(fm.title, "Pacman");
    assert_eq!(fm.description, "pacman manages packages.");
    assert_eq!(body, "**pacman** manages packages.\n## Usage\n");
    assert!(dir.path().join("italian").join("Pacman--Italiano-.md").exists());

    let manifest = Manifest::load(&dir.path().join("db.json")).unwrap().unwrap();
    let langs: Vec<Language> = manifest.db.iter().map(|b| b.lang).collect();
    assert_eq!(langs, vec![Language::English, Language::Italian]);
    assert_eq!(manifest.article_count(), 3);
    assert!(manifest.is_current("Systemd", 12));
    assert_eq!(manifest.find("Systemd").unwrap().description, "systemd is an init.");

    // a second build skips everything already current.
    assert_eq!(arch_wiki_md::build(&config(dir.path()), &mut wiki).unwrap(), 0);
}

#[test]
fn sync_merges_changes_since_midnight() {
    let dir = tempdir().unwrap();
    let mut wiki = FakeWiki {
        all: vec![article(1, "Pacman", 10, "old text")],
        ..FakeWiki::default()
    };
    arch_wiki_md::build(&config(dir.path()), &mut wiki).unwrap();

    let manifest_path = dir.path().join("db.json");
    let mut manifest = Manifest::load(&manifest_path).unwrap().unwrap();
    manifest.updated = datetime!(2016-05-06 18:30 UTC);
    manifest.store(&manifest_path).unwrap();

    wiki.changed = vec![
        article(1, "Pacman", 20, "new text"),
        article(4, "Xorg (Deutsch)", 5, "Xorg auf Deutsch."),
    ];
    let written = arch_wiki_md::sync(&config(dir.path()), &mut wiki).unwrap();
    assert_eq!(written, 2);
    assert_eq!(wiki.since, Some(datetime!(2016-05-06 0:00 UTC)));

    let manifest = Manifest::load(&manifest_path).unwrap().unwrap();
    assert_eq!(manifest.article_count(), 2);
    assert!(manifest.is_current("Pacman", 20));
    assert!(manifest.updated > datetime!(2016-05-06 18:30 UTC));

    let doc = fs::read_to_string(dir.path().join("english").join("Pacman.md")).unwrap();
    assert!(doc.ends_with("new text\n"));
    assert!(dir.path().join("german").join("Xorg--Deutsch-.md").exists());
}

#[test]
fn sync_requires_manifest() {
    let dir = tempdir().unwrap();
    let err = arch_wiki_md::sync(&config(dir.path()), &mut FakeWiki::default()).unwrap_err();
    assert!(matches!(err, Error::MissingManifest(_)));
}

#[test]
fn html_format_uses_rendered_pages() {
    let dir = tempdir().unwrap();
    let mut wiki = FakeWiki {
        all: vec![article(1, "Pacman", 10, "ignored wikitext")],
        ..FakeWiki::default()
    };
    let config = Config {
        format: SourceFormat::Html,
        ..config(dir.path())
    };

    arch_wiki_md::build(&config, &mut wiki).unwrap();
    assert_eq!(wiki.rendered, 1);

    let doc = fs::read_to_string(dir.path().join("english").join("Pacman.md")).unwrap();
    assert!(doc.ends_with("Rendered **Pacman**.\n"));
}

#[test]
fn scrape_walks_toc_categories_and_articles() {
    let dir = tempdir().unwrap();
    let base = "https://wiki.archlinux.org";
    let toc_path = dir.path().join("toc.html");
    fs::write(
        &toc_path,
        r#"<html><body><div id="mw-content-text"><dd><a href="/title/Category:Tools">Tools</a></dd><dd><a href="/title/Category:Tools">again</a></dd></div></body></html>"#,
    )
    .unwrap();

    let mut pages = HashMap::new();
    pages.insert(
        format!("{base}/title/Category:Tools"),
        r#"<html><body><h1 id="firstHeading">Category:Tools</h1><div id="mw-subcategories"><ul><li><a href="/title/Category:Editors">Editors</a></li><li><a href="/title/Category:Tools">loop</a></li></ul></div><div id="mw-pages"><ul><li><a href="/title/Grep">Grep</a></li><li><a href="/title/Missing">Missing</a></li></ul></div></body></html>"#.to_string(),
    );
    pages.insert(
        format!("{base}/title/Category:Editors"),
        r#"<html><body><h1 id="firstHeading">Category:Editors</h1><div id="mw-pages"><ul><li><a href="/title/Vim_(Español)">Vim</a></li><li><a href="/title/Grep">Grep</a></li></ul></div></body></html>"#.to_string(),
    );
    pages.insert(
        format!("{base}/title/Grep"),
        r#"<html><body><div id="content"><h1 id="firstHeading">Grep</h1><div id="siteSub">From ArchWiki</div><p><b>grep</b> searches text.</p></div></body></html>"#.to_string(),
    );
    pages.insert(
        format!("{base}/title/Vim_(Español)"),
        r#"<html><body><h1 id="firstHeading">Vim (Español)</h1><div id="content"><p>Un editor.</p></div></body></html>"#.to_string(),
    );

    let mut wiki = FakeWiki {
        pages,
        ..FakeWiki::default()
    };
    let config = Config {
        toc: toc_path.to_string_lossy().into_owned(),
        ..config(dir.path())
    };

    let written = arch_wiki_md::scrape(&config, &mut wiki).unwrap();
    assert_eq!(written, 2);

    let doc = fs::read_to_string(dir.path().join("english").join("Grep.md")).unwrap();
    let (fm, body) = Frontmatter::parse(&doc).unwrap().unwrap();
    assert_eq!(fm.description, "grep searches text.");
    assert_eq!(body, "# Grep\n\n**grep** searches text.\n");
    assert!(dir.path().join("spanish").join("Vim--Español-.md").exists());
}
