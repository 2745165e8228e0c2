//! Error types for the fetch and storage layers.
//!
//! The conversion core never fails; everything in here comes from I/O, HTTP
//! or (de)serialization at the edges.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("wiki api error: {0}")]
    Api(String),

    #[error("invalid css selector `{0}`")]
    Selector(String),

    #[error("{what} not found in page {url}")]
    MissingElement { what: &'static str, url: String },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("time formatting error: {0}")]
    TimeFormat(#[from] time::error::Format),

    #[error("no manifest at {}; run `build` at least once before `sync`", .0.display())]
    MissingManifest(PathBuf),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
