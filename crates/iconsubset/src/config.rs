//! Configuration of a minification run.

use std::{fs, path::{Path, PathBuf}};

use regex::Regex;
use serde::Deserialize;

use crate::{errors::Error, remap::AmbiguousVariant};

/// Output font format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FontFormat {
    /// WOFF2 with Brotli-compressed tables.
    Woff2,
    /// Uncompressed TrueType.
    Truetype,
}

impl FontFormat {
    /// Returns the file extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Woff2 => "woff2",
            Self::Truetype => "ttf",
        }
    }

    /// Returns the format name used in `@font-face` `src` descriptors.
    pub fn css_name(self) -> &'static str {
        match self {
            Self::Woff2 => "woff2",
            Self::Truetype => "truetype",
        }
    }
}

/// Configuration of a minification run.
///
/// Can be deserialized from TOML; all fields are optional and fall back to [defaults](Self::default).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root directory of the site.
    pub root: PathBuf,
    /// Extensions of files crawled for icon classes.
    pub extensions: Vec<String>,
    /// Extensions of markup files scanned for stylesheet `<link>`s.
    pub link_extensions: Vec<String>,
    /// Regexes selecting source stylesheets by their URL.
    pub stylesheet_patterns: Vec<String>,
    /// Classes allowed in crawled class combinations besides prefixed ones.
    pub extra_classes: Vec<String>,
    /// File stem of generated files.
    pub output_stem: String,
    /// Output directory for the stylesheet, relative to the root.
    pub css_dir: PathBuf,
    /// Output directory for fonts, relative to the root.
    pub font_dir: PathBuf,
    /// Family name of the generated font.
    pub font_family: String,
    /// Whether to rewrite `<link>` hrefs in markup files.
    pub rewrite_links: bool,
    /// Whether to add a content hash to generated file names.
    pub content_hash: bool,
    /// First codepoint allocated for packed glyphs.
    pub codepoint_base: u32,
    /// Whether all stylesheets share a single codepoint allocator.
    pub share_codepoints: bool,
    /// Policy for icons whose modifiers select several font faces.
    pub ambiguous_variant: AmbiguousVariant,
    /// Formats of generated fonts.
    pub formats: Vec<FontFormat>,
    /// Whether to minify the generated stylesheet.
    pub minify: bool,
    /// Directory for cached HTTP responses, relative to the root.
    pub cache_dir: PathBuf,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|&s| s.to_owned()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            extensions: strings(&["html", "htm", "php", "js"]),
            link_extensions: strings(&["html", "htm", "php"]),
            stylesheet_patterns: strings(&[
                r"font-?awesome[^/]*\.css([?#].*)?$",
                r"(^|/)(all|brands|solid|regular)(\.min)?\.css([?#].*)?$",
            ]),
            extra_classes: strings(&["fa", "fas", "far", "fal", "fad", "fab", "fat"]),
            output_stem: "icons".to_owned(),
            css_dir: PathBuf::from("css"),
            font_dir: PathBuf::from("fonts"),
            font_family: "Icons".to_owned(),
            rewrite_links: true,
            content_hash: false,
            codepoint_base: 0xe000,
            share_codepoints: false,
            ambiguous_variant: AmbiguousVariant::default(),
            formats: vec![FontFormat::Woff2, FontFormat::Truetype],
            minify: true,
            cache_dir: PathBuf::from(".iconsubset-cache"),
        }
    }
}

impl Config {
    /// Name of the configuration file looked up in the site root.
    pub const FILE_NAME: &'static str = "iconsubset.toml";

    /// Parses configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = fs::read_to_string(path).map_err(Error::io(path))?;
        toml::from_str(&raw).map_err(|source| Error::Config {
            path: path.to_owned(),
            source,
        })
    }

    /// Returns the first allocated codepoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the base is not a Unicode scalar value.
    pub fn codepoint_base(&self) -> Result<char, Error> {
        char::from_u32(self.codepoint_base).ok_or(Error::InvalidCodepointBase(self.codepoint_base))
    }

    pub(crate) fn compile_patterns(&self) -> Result<Vec<Regex>, Error> {
        self.stylesheet_patterns
            .iter()
            .map(|pattern| Regex::new(pattern).map_err(Error::from))
            .collect()
    }

    pub(crate) fn cache_dir(&self) -> PathBuf {
        self.root.join(&self.cache_dir)
    }
}
