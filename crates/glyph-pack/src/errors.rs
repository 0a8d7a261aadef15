use core::{fmt, ops};

use crate::TableTag;

/// Kind of a font [`ParseError`].
#[derive(Debug)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// Unexpected end of the font data.
    UnexpectedEof,
    /// Unexpected font version (e.g., a CFF-flavored or WOFF-wrapped font).
    UnexpectedFontVersion(u32),
    /// Missing required font table (e.g., `head`).
    MissingTable,
    /// No supported subtable in the `cmap` table.
    NoSupportedCmap,
    /// Range inferred from the table data is out of bounds.
    RangeOutOfBounds {
        /// Inferred range.
        range: ops::Range<usize>,
        /// Length of the indexed data.
        len: usize,
    },
    /// Unexpected table version.
    UnexpectedTableVersion {
        /// Version read from the table.
        version: u32,
    },
    /// Unexpected table length.
    UnexpectedTableLen {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
    /// Unexpected table format (e.g., for a `cmap` subtable).
    UnexpectedTableFormat {
        /// Format read from the table.
        format: u16,
    },
    /// Unexpected `indexToLocFormat` value in the `head` table.
    UnexpectedLocaFormat(u16),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => formatter.write_str("unexpected end of the font data"),
            Self::UnexpectedFontVersion(val) => {
                write!(formatter, "unexpected font version ({val:#010x})")
            }
            Self::MissingTable => formatter.write_str("missing required font table"),
            Self::NoSupportedCmap => {
                formatter.write_str("no supported subtable in the `cmap` table")
            }
            Self::RangeOutOfBounds { range, len } => {
                write!(
                    formatter,
                    "range ({range:?}) inferred from the table data is out of bounds (..{len})"
                )
            }
            Self::UnexpectedTableVersion { version } => {
                write!(formatter, "unexpected table version ({version})")
            }
            Self::UnexpectedTableLen { expected, actual } => {
                write!(
                    formatter,
                    "unexpected table length: expected {expected}, got {actual}"
                )
            }
            Self::UnexpectedTableFormat { format } => {
                write!(formatter, "unexpected table format ({format})")
            }
            Self::UnexpectedLocaFormat(val) => {
                write!(formatter, "unexpected `loca` format ({val})")
            }
        }
    }
}

impl std::error::Error for ParseErrorKind {}

/// Errors that can occur when parsing an OpenType [`Font`](crate::Font).
#[derive(Debug)]
pub struct ParseError {
    pub(crate) kind: ParseErrorKind,
    pub(crate) offset: usize,
    pub(crate) table: Option<TableTag>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(table) = self.table {
            write!(formatter, "[{table}] ")?;
        }
        if self.offset > 0 {
            write!(formatter, "{}: ", self.offset)?;
        }
        fmt::Display::fmt(&self.kind, formatter)
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl ParseError {
    pub(crate) fn missing_table(tag: TableTag) -> Self {
        Self {
            kind: ParseErrorKind::MissingTable,
            offset: 0,
            table: Some(tag),
        }
    }

    pub(crate) fn with_table(mut self, tag: TableTag) -> Self {
        self.table.get_or_insert(tag);
        self
    }

    /// Gets the error kind.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Gets the table this error relates to.
    pub fn table(&self) -> Option<TableTag> {
        self.table
    }

    /// Gets the offset in the font data.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Errors that can occur when mapping a char to a glyph index.
#[derive(Debug)]
#[non_exhaustive]
pub enum MapError {
    /// The char is outside the range covered by the `cmap` subtable.
    CharTooLarge,
    /// The `cmap` subtable points outside its glyph ID array.
    InvalidOffset,
}

impl fmt::Display for MapError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CharTooLarge => formatter.write_str("char is not covered by the `cmap` subtable"),
            Self::InvalidOffset => {
                formatter.write_str("`cmap` subtable points outside its glyph ID array")
            }
        }
    }
}

impl std::error::Error for MapError {}

/// Errors that can occur when adding glyphs to a [`GlyphPack`](crate::GlyphPack).
#[derive(Debug)]
#[non_exhaustive]
pub enum PackError {
    /// Error parsing glyph data of a source font.
    Parse(ParseError),
    /// Error mapping a char to a glyph in a source font.
    Map(MapError),
    /// The source font has no glyph for the requested char.
    MissingGlyph {
        /// Index of the source font.
        source: usize,
        /// Requested char.
        ch: char,
    },
    /// The source font index is out of bounds.
    UnknownSource(usize),
    /// The char is already mapped in the pack.
    DuplicateChar(char),
    /// The pack would exceed the maximum number of glyphs in a font.
    TooManyGlyphs,
}

impl fmt::Display for PackError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(formatter, "failed reading source glyph: {err}"),
            Self::Map(err) => write!(formatter, "failed mapping char: {err}"),
            Self::MissingGlyph { source, ch } => {
                write!(
                    formatter,
                    "source font #{source} has no glyph for U+{:04X}",
                    u32::from(*ch)
                )
            }
            Self::UnknownSource(idx) => write!(formatter, "unknown source font #{idx}"),
            Self::DuplicateChar(ch) => {
                write!(formatter, "U+{:04X} is already packed", u32::from(*ch))
            }
            Self::TooManyGlyphs => formatter.write_str("too many glyphs in the pack"),
        }
    }
}

impl std::error::Error for PackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Map(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseError> for PackError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<MapError> for PackError {
    fn from(err: MapError) -> Self {
        Self::Map(err)
    }
}
