//! Error types.

use std::{io, path::PathBuf};

/// Errors aborting a minification pass for a stylesheet.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Reading or writing a local file failed.
    #[error("I/O error accessing `{}`", path.display())]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Walking the site directory failed.
    #[error("failed walking the site directory")]
    Walk(#[from] walkdir::Error),
    /// Sending an HTTP request failed.
    #[error("failed fetching `{url}`")]
    Fetch {
        /// Requested URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// Server responded with a non-successful HTTP status.
    #[error("fetching `{url}` returned HTTP status {status}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },
    /// Stylesheet or font URL cannot be resolved.
    #[error("invalid URL `{url}`")]
    Url {
        /// URL as written in the markup or stylesheet.
        url: String,
        /// Underlying error.
        #[source]
        source: url::ParseError,
    },
    /// Crawled class combination names several icons at once.
    #[error("ambiguous icon markup in `{}`: `{classes}` names more than one icon", path.display())]
    AmbiguousIcon {
        /// File containing the markup.
        path: PathBuf,
        /// Normalized class combination.
        classes: String,
    },
    /// Icon used on the site has no `:before` content rule in the stylesheet.
    #[error("icon `{name}` has no codepoint in the stylesheet")]
    MissingCodepoint {
        /// Icon class.
        name: String,
    },
    /// Font face selected for an icon has no glyph for its codepoint.
    #[error("font face {face} has no glyph for icon `{icon}` (U+{codepoint:04X})")]
    MissingGlyph {
        /// Human-readable font face descriptor.
        face: String,
        /// Icon selector.
        icon: String,
        /// Legacy codepoint of the icon.
        codepoint: u32,
    },
    /// Icon modifiers select several font faces, and the policy forbids this.
    #[error("icon `{icon}` selects several font faces: {faces}")]
    AmbiguousVariant {
        /// Icon selector.
        icon: String,
        /// Comma-separated font face descriptors.
        faces: String,
    },
    /// Configured first codepoint is not a Unicode scalar value.
    #[error("invalid codepoint base U+{0:04X}")]
    InvalidCodepointBase(u32),
    /// Codepoint allocator left the Unicode scalar range.
    #[error("ran out of codepoints to allocate")]
    CodepointsExhausted,
    /// None of the sources of a font face is a readable TrueType font.
    #[error("font face {face} has no usable TrueType source")]
    NoFontSource {
        /// Human-readable font face descriptor.
        face: String,
    },
    /// Font data is malformed.
    #[error("failed reading font `{location}`")]
    FontParse {
        /// Path or URL of the font.
        location: String,
        /// Underlying error.
        #[source]
        source: glyph_pack::ParseError,
    },
    /// Copying glyphs into the output font failed.
    #[error("failed packing glyphs")]
    Pack(#[from] glyph_pack::PackError),
    /// Stylesheet pattern is not a valid regex.
    #[error("invalid stylesheet pattern")]
    Pattern(#[from] regex::Error),
    /// Configuration file is malformed.
    #[error("invalid configuration in `{}`", path.display())]
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },
    /// Generated stylesheet cannot be minified.
    #[error("failed minifying CSS: {message}")]
    Minify {
        /// Error message from the minifier.
        message: String,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
