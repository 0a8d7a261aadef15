//! Site files: indexing, `<link>` discovery and rewriting.

use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};

use regex::Regex;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::errors::Error;

/// Files of a site grouped by their lower-cased extension.
#[derive(Debug, Default)]
pub struct SiteIndex {
    files: BTreeMap<String, Vec<PathBuf>>,
}

impl SiteIndex {
    /// Walks the `root` directory. Directories in `skipped_dirs` are not descended into.
    /// Files are listed in the order of their paths.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be read.
    pub fn scan(root: &Path, skipped_dirs: &[PathBuf]) -> Result<Self, Error> {
        let mut files = BTreeMap::<_, Vec<_>>::new();
        let entries = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !skipped_dirs.iter().any(|dir| entry.path() == dir));
        for entry in entries {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(extension) = entry.path().extension().and_then(|ext| ext.to_str()) else {
                continue;
            };
            files
                .entry(extension.to_ascii_lowercase())
                .or_default()
                .push(entry.into_path());
        }

        let file_count: usize = files.values().map(Vec::len).sum();
        tracing::debug!(root = %root.display(), file_count, "indexed site");
        Ok(Self { files })
    }

    /// Iterates over files with any of the specified extensions.
    pub fn files<'a>(&'a self, extensions: &'a [String]) -> impl Iterator<Item = &'a Path> + 'a {
        extensions
            .iter()
            .filter_map(|extension| self.files.get(&extension.to_ascii_lowercase()))
            .flatten()
            .map(PathBuf::as_path)
    }
}

/// Finds and rewrites stylesheet `<link>` tags in markup.
#[derive(Debug)]
pub struct LinkScanner {
    tag: Regex,
    rel: Regex,
    href: Regex,
}

impl LinkScanner {
    /// Creates a scanner.
    ///
    /// # Errors
    ///
    /// Propagates regex compilation errors.
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            tag: Regex::new(r"(?is)<link\b[^>]*>")?,
            rel: Regex::new(r#"(?i)\brel\s*=\s*["']?[^"'>]*\bstylesheet\b"#)?,
            href: Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)?,
        })
    }

    /// Iterates over `(start, end)` byte ranges of stylesheet hrefs in `text`.
    fn href_ranges<'t>(&'t self, text: &'t str) -> impl Iterator<Item = (usize, usize)> + 't {
        self.tag
            .find_iter(text)
            .filter(|tag| self.rel.is_match(tag.as_str()))
            .filter_map(|tag| {
                let captures = self.href.captures(tag.as_str())?;
                let value = (1..=3).find_map(|i| captures.get(i))?;
                Some((tag.start() + value.start(), tag.start() + value.end()))
            })
    }

    /// Returns hrefs of stylesheet links in `text` in the order of their appearance.
    pub fn find_stylesheet_links<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.href_ranges(text)
            .map(|(start, end)| text[start..end].trim())
            .collect()
    }

    /// Replaces stylesheet hrefs equal to `old_href` with `new_href`. Returns `None` if `text`
    /// has no such hrefs.
    pub fn rewrite_links(&self, text: &str, old_href: &str, new_href: &str) -> Option<String> {
        let mut output = String::with_capacity(text.len());
        let mut last_end = 0;
        for (start, end) in self.href_ranges(text) {
            if text[start..end].trim() == old_href {
                output.push_str(&text[last_end..start]);
                output.push_str(new_href);
                last_end = end;
            }
        }
        if last_end == 0 {
            return None;
        }
        output.push_str(&text[last_end..]);
        Some(output)
    }
}

/// Returns the relative URL of the `to` path from the `from_dir` directory. Both paths must
/// be normalized and either absolute, or relative to the same base.
pub fn relative_url(from_dir: &Path, to: &Path) -> String {
    let from: Vec<_> = from_dir
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();
    let to: Vec<_> = to
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();
    let common_len = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    let parents = (common_len..from.len()).map(|_| "..".to_owned());
    let rest = to[common_len..]
        .iter()
        .map(|component| component.as_os_str().to_string_lossy().into_owned());
    parents.chain(rest).collect::<Vec<_>>().join("/")
}

/// Returns the first 8 hex digits of the SHA-256 digest of `data`.
pub fn content_hash(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(&digest[..4])
}
