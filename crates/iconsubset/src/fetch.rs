//! Reading stylesheets and fonts from the site or over HTTP.

use std::{
    fmt,
    path::{Component, Path, PathBuf},
};

use sha2::{Digest, Sha256};
use url::Url;

use crate::errors::Error;

/// Location of a stylesheet or a font.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// Local file.
    Local(PathBuf),
    /// Remote resource fetched over HTTP(S).
    Remote(Url),
}

impl fmt::Display for Location {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => fmt::Display::fmt(&path.display(), formatter),
            Self::Remote(url) => fmt::Display::fmt(url, formatter),
        }
    }
}

/// Removes `.` and `..` components without touching the file system.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => { /* skip */ }
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            _ => normalized.push(component),
        }
    }
    normalized
}

impl Location {
    /// Resolves `href` found in the resource at this location (e.g., a `src` URL
    /// in a stylesheet, or a `<link>` href in a markup file).
    ///
    /// Absolute URLs are returned as is. Relative references are joined with the URL
    /// of a remote resource; for a local resource, they are resolved relative to its directory
    /// with the query and fragment stripped, and root-relative references are resolved
    /// against `site_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `href` or the joined URL is malformed.
    pub fn resolve(&self, href: &str, site_root: &Path) -> Result<Self, Error> {
        let href = href.trim();
        let url_error = |source| Error::Url {
            url: href.to_owned(),
            source,
        };

        if let Some(rest) = href.strip_prefix("//") {
            let url = format!("https://{rest}");
            return Url::parse(&url).map(Self::Remote).map_err(url_error);
        }
        if href.starts_with("http://") || href.starts_with("https://") {
            return Url::parse(href).map(Self::Remote).map_err(url_error);
        }

        match self {
            Self::Remote(base) => base.join(href).map(Self::Remote).map_err(url_error),
            Self::Local(path) => {
                let path_end = href.find(['?', '#']).unwrap_or(href.len());
                let relative = &href[..path_end];
                let resolved = if let Some(root_relative) = relative.strip_prefix('/') {
                    site_root.join(root_relative)
                } else {
                    path.parent().unwrap_or(Path::new("")).join(relative)
                };
                Ok(Self::Local(normalize_path(&resolved)))
            }
        }
    }

    /// Returns the lower-cased extension of the file or URL path.
    pub fn extension(&self) -> Option<String> {
        let file_name = match self {
            Self::Local(path) => path.file_name()?.to_str()?,
            Self::Remote(url) => url.path_segments()?.next_back()?,
        };
        let (_, extension) = file_name.rsplit_once('.')?;
        Some(extension.to_ascii_lowercase())
    }
}

/// Fetches resources from the file system and over HTTP. HTTP responses are cached on disk
/// keyed by the SHA-256 digest of the URL; the cache is never evicted.
#[derive(Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    cache_dir: Option<PathBuf>,
}

impl Fetcher {
    /// Creates a fetcher with the specified cache directory. If the directory is not specified,
    /// HTTP responses are not cached.
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache_dir,
        }
    }

    fn cache_path(&self, url: &Url) -> Option<PathBuf> {
        let digest = Sha256::digest(url.as_str().as_bytes());
        Some(self.cache_dir.as_ref()?.join(hex::encode(digest)))
    }

    /// Fetches the resource at `location`.
    ///
    /// # Errors
    ///
    /// Returns an error if a local file cannot be read, an HTTP request fails, or the server
    /// responds with a non-successful status.
    pub async fn fetch(&self, location: &Location) -> Result<Vec<u8>, Error> {
        match location {
            Location::Local(path) => tokio::fs::read(path).await.map_err(Error::io(path)),
            Location::Remote(url) => self.fetch_remote(url).await,
        }
    }

    /// Fetches the resource at `location` as text. Invalid UTF-8 sequences are replaced.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::fetch()`].
    pub async fn fetch_text(&self, location: &Location) -> Result<String, Error> {
        let bytes = self.fetch(location).await?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        })
    }

    async fn fetch_remote(&self, url: &Url) -> Result<Vec<u8>, Error> {
        let cache_path = self.cache_path(url);
        if let Some(path) = &cache_path {
            if let Ok(bytes) = tokio::fs::read(path).await {
                tracing::debug!(%url, path = %path.display(), "using cached response");
                return Ok(bytes);
            }
        }

        tracing::info!(%url, "fetching");
        let fetch_error = |source| Error::Fetch {
            url: url.to_string(),
            source,
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(fetch_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(fetch_error)?.to_vec();

        if let Some(path) = cache_path {
            if let Some(dir) = path.parent() {
                tokio::fs::create_dir_all(dir).await.map_err(Error::io(dir))?;
            }
            tokio::fs::write(&path, &bytes)
                .await
                .map_err(Error::io(&path))?;
        }
        Ok(bytes)
    }
}
