use crate::article::SourceFormat;
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://wiki.archlinux.org/api.php";
pub const DEFAULT_BASE_URL: &str = "https://wiki.archlinux.org";
pub const DEFAULT_TOC_URL: &str = "https://wiki.archlinux.org/title/Table_of_contents";
pub const DEFAULT_USER_AGENT: &str = concat!(
    "arch-wiki-md/",
    env!("CARGO_PKG_VERSION"),
    " (offline ArchWiki mirror in Markdown)"
);

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// MediaWiki `api.php` endpoint.
    pub api_url: String,
    /// Prefix for the relative links found on scraped pages.
    pub base_url: String,
    /// Table of contents page or local HTML file used by `scrape`.
    pub toc: String,
    pub user_agent: String,
    pub target_dir: PathBuf,
    pub format: SourceFormat,
    /// Pages per API request.
    pub batch_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            toc: DEFAULT_TOC_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            target_dir: PathBuf::from("content"),
            format: SourceFormat::Wikitext,
            batch_size: 50,
        }
    }
}
