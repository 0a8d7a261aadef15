//! OpenType parsing logic.

use core::{fmt, ops};

pub(crate) use self::{
    cmap::{CmapTable, SegmentDeltas, SegmentedCoverage},
    glyph::{Glyph, GlyphWithMetrics},
};
use crate::errors::{MapError, ParseError, ParseErrorKind};

mod cmap;
mod glyph;

/// Four-byte tag of an OpenType table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableTag(pub(crate) [u8; 4]);

impl fmt::Debug for TableTag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, formatter)
    }
}

impl fmt::Display for TableTag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            let ch = if byte.is_ascii_graphic() || byte == b' ' {
                char::from(byte)
            } else {
                '?'
            };
            write!(formatter, "{ch}")?;
        }
        Ok(())
    }
}

impl TableTag {
    /// Character to glyph mapping.
    pub const CMAP: Self = Self(*b"cmap");
    /// Font header.
    pub const HEAD: Self = Self(*b"head");
    /// Horizontal header.
    pub const HHEA: Self = Self(*b"hhea");
    /// Horizontal metrics.
    pub const HMTX: Self = Self(*b"hmtx");
    /// Maximum profile.
    pub const MAXP: Self = Self(*b"maxp");
    /// Naming table.
    pub const NAME: Self = Self(*b"name");
    /// OS/2 and Windows-specific metrics.
    pub const OS2: Self = Self(*b"OS/2");
    /// PostScript information.
    pub const POST: Self = Self(*b"post");
    /// Index to location.
    pub const LOCA: Self = Self(*b"loca");
    /// Glyph data.
    pub const GLYF: Self = Self(*b"glyf");
    /// Control value table.
    pub const CVT: Self = Self(*b"cvt ");
    /// Font program.
    pub const FPGM: Self = Self(*b"fpgm");
    /// Control value program.
    pub const PREP: Self = Self(*b"prep");

    /// Returns the raw bytes of this tag.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

/// Read-only view into font data that keeps track of its offset for error reporting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor<'a> {
    pub(crate) bytes: &'a [u8],
    offset: usize,
    table: Option<TableTag>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            table: None,
        }
    }

    fn for_table(bytes: &'a [u8], tag: TableTag) -> Self {
        Self {
            bytes,
            offset: 0,
            table: Some(tag),
        }
    }

    pub(crate) fn err(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            kind,
            offset: self.offset,
            table: self.table,
        }
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), ParseError> {
        if self.bytes.len() < n {
            return Err(self.err(ParseErrorKind::UnexpectedEof));
        }
        self.bytes = &self.bytes[n..];
        self.offset += n;
        Ok(())
    }

    /// Splits off the first `len` bytes, advancing this cursor past them.
    pub(crate) fn split_at(&mut self, len: usize) -> Result<Self, ParseError> {
        if self.bytes.len() < len {
            return Err(self.err(ParseErrorKind::UnexpectedEof));
        }
        let (head, tail) = self.bytes.split_at(len);
        let head = Self {
            bytes: head,
            ..*self
        };
        self.bytes = tail;
        self.offset += len;
        Ok(head)
    }

    pub(crate) fn range(&self, range: ops::Range<usize>) -> Result<Self, ParseError> {
        let bytes = self.bytes.get(range.clone()).ok_or_else(|| {
            self.err(ParseErrorKind::RangeOutOfBounds {
                range: range.clone(),
                len: self.bytes.len(),
            })
        })?;
        Ok(Self {
            bytes,
            offset: self.offset + range.start,
            table: self.table,
        })
    }

    pub(crate) fn read_byte_array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let head = self.split_at(N)?;
        let mut array = [0_u8; N];
        array.copy_from_slice(head.bytes);
        Ok(array)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, ParseError> {
        self.read_byte_array().map(u16::from_be_bytes)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, ParseError> {
        self.read_byte_array().map(u32::from_be_bytes)
    }

    pub(crate) fn read_u16_checked<T>(
        &mut self,
        check: impl FnOnce(u16) -> Result<T, ParseErrorKind>,
    ) -> Result<T, ParseError> {
        let start = *self;
        let value = self.read_u16()?;
        check(value).map_err(|kind| start.err(kind))
    }

    pub(crate) fn read_u32_checked<T>(
        &mut self,
        check: impl FnOnce(u32) -> Result<T, ParseErrorKind>,
    ) -> Result<T, ParseError> {
        let start = *self;
        let value = self.read_u32()?;
        check(value).map_err(|kind| start.err(kind))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct HheaTable<'a> {
    pub(crate) raw: &'a [u8],
    pub(crate) number_of_h_metrics: u16,
}

impl<'a> HheaTable<'a> {
    pub(crate) const EXPECTED_LEN: usize = 36; // 18 words

    fn parse(cursor: Cursor<'a>) -> Result<Self, ParseError> {
        if cursor.bytes.len() != Self::EXPECTED_LEN {
            return Err(cursor.err(ParseErrorKind::UnexpectedTableLen {
                expected: Self::EXPECTED_LEN,
                actual: cursor.bytes.len(),
            }));
        }
        let mut tail = cursor.range(Self::EXPECTED_LEN - 2..Self::EXPECTED_LEN)?;
        Ok(Self {
            raw: cursor.bytes,
            number_of_h_metrics: tail.read_u16()?,
        })
    }
}

#[derive(Debug)]
pub(crate) struct HmtxTable<'a> {
    raw: Cursor<'a>,
    number_of_h_metrics: u16,
}

impl HmtxTable<'_> {
    fn advance_and_lsb(&self, glyph_idx: u16) -> Result<(u16, u16), ParseError> {
        let (advance, lsb);
        if glyph_idx < self.number_of_h_metrics {
            let mut cursor = self.raw;
            cursor.skip(usize::from(glyph_idx) * 4)?;
            advance = cursor.read_u16()?;
            lsb = cursor.read_u16()?;
        } else {
            let mut cursor = self.raw;
            cursor.skip(usize::from(self.number_of_h_metrics - 1) * 4)?;
            advance = cursor.read_u16()?;

            let mut cursor = self.raw;
            cursor.skip(
                usize::from(self.number_of_h_metrics) * 4
                    + usize::from(glyph_idx - self.number_of_h_metrics) * 2,
            )?;
            lsb = cursor.read_u16()?;
        }
        Ok((advance, lsb))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum LocaFormat {
    Short,
    Long,
}

impl LocaFormat {
    const fn bytes_per_offset(self) -> usize {
        match self {
            Self::Short => 2,
            Self::Long => 4,
        }
    }
}

#[derive(Debug)]
pub(crate) struct LocaTable<'a> {
    format: LocaFormat,
    cursor: Cursor<'a>,
}

impl<'a> LocaTable<'a> {
    fn new(format: LocaFormat, glyph_count: u16, cursor: Cursor<'a>) -> Result<Self, ParseError> {
        let expected_len = format.bytes_per_offset() * (usize::from(glyph_count) + 1);
        // Some fonts pad `loca` beyond the last offset; shorter tables are broken though.
        if cursor.bytes.len() < expected_len {
            return Err(cursor.err(ParseErrorKind::UnexpectedTableLen {
                expected: expected_len,
                actual: cursor.bytes.len(),
            }));
        }
        Ok(Self { format, cursor })
    }

    fn glyph_range(&self, glyph_idx: u16) -> Result<ops::Range<usize>, ParseError> {
        let glyph_idx = usize::from(glyph_idx);
        let mut cursor = self.cursor;
        Ok(match self.format {
            LocaFormat::Short => {
                cursor.skip(glyph_idx * 2)?;
                let start_offset = usize::from(cursor.read_u16()?) * 2;
                let end_offset = usize::from(cursor.read_u16()?) * 2;
                start_offset..end_offset
            }
            LocaFormat::Long => {
                cursor.skip(glyph_idx * 4)?;
                let start_offset = cursor.read_u32()? as usize;
                let end_offset = cursor.read_u32()? as usize;
                start_offset..end_offset
            }
        })
    }
}

/// TrueType font (i.e., an OpenType font with `glyf` outlines) borrowing its data.
#[derive(Debug)]
pub struct Font<'a> {
    pub(crate) cmap: CmapTable<'a>,
    pub(crate) head: &'a [u8],
    pub(crate) hhea: HheaTable<'a>,
    pub(crate) hmtx: HmtxTable<'a>,
    pub(crate) maxp: &'a [u8],
    pub(crate) name: &'a [u8],
    pub(crate) os2: &'a [u8],
    pub(crate) post: &'a [u8],
    pub(crate) loca: LocaTable<'a>,
    pub(crate) glyf: Cursor<'a>,
    pub(crate) cvt: Option<&'a [u8]>,
    pub(crate) fpgm: Option<&'a [u8]>,
    pub(crate) prep: Option<&'a [u8]>,
    glyph_count: u16,
}

impl<'a> Font<'a> {
    pub(crate) const SFNT_VERSION: u32 = 0x_0001_0000;
    pub(crate) const SFNT_CHECKSUM: u32 = 0x_b1b0_afba;
    pub(crate) const HEAD_CHECKSUM_OFFSET: usize = 8;
    const HEAD_LEN: usize = 54;
    const MIN_POST_LEN: usize = 32;

    /// Parses a font from the provided bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the font is not a TrueType font (e.g., it's a WOFF / WOFF2 container,
    /// or has CFF outlines), if a required table is missing, or if table data is malformed.
    pub fn new(bytes: &'a [u8]) -> Result<Self, ParseError> {
        let font_cursor = Cursor::new(bytes);
        let mut cursor = font_cursor;
        cursor.read_u32_checked(|version| {
            if version != Self::SFNT_VERSION {
                return Err(ParseErrorKind::UnexpectedFontVersion(version));
            }
            Ok(())
        })?;
        let table_count = cursor.read_u16()?;
        cursor.skip(6)?; // searchRange, entrySelector, rangeShift

        let (mut cmap, mut head, mut hhea, mut maxp, mut hmtx) = (None, None, None, None, None);
        let (mut name, mut os2, mut post, mut loca, mut glyf) = (None, None, None, None, None);
        let (mut cvt, mut fpgm, mut prep) = (None, None, None);
        for _ in 0..table_count {
            let (tag, table) = Self::parse_table_record(&mut cursor, font_cursor)?;
            match tag {
                TableTag::CMAP => cmap = Some(table),
                TableTag::HEAD => head = Some(table),
                TableTag::HHEA => hhea = Some(table),
                TableTag::HMTX => hmtx = Some(table),
                TableTag::MAXP => maxp = Some(table),
                TableTag::NAME => name = Some(table.bytes),
                TableTag::OS2 => os2 = Some(table.bytes),
                TableTag::POST => post = Some(table),
                TableTag::LOCA => loca = Some(table),
                TableTag::GLYF => glyf = Some(table),
                TableTag::CVT => cvt = Some(table.bytes),
                TableTag::FPGM => fpgm = Some(table.bytes),
                TableTag::PREP => prep = Some(table.bytes),
                _ => { /* skip table */ }
            }
        }

        let head = head.ok_or_else(|| ParseError::missing_table(TableTag::HEAD))?;
        let loca_format = Self::parse_loca_format(head)?;
        let maxp = maxp.ok_or_else(|| ParseError::missing_table(TableTag::MAXP))?;
        let glyph_count = Self::parse_glyph_count(maxp)?;
        let loca = loca.ok_or_else(|| ParseError::missing_table(TableTag::LOCA))?;
        let loca = LocaTable::new(loca_format, glyph_count, loca)?;
        let hhea = hhea.ok_or_else(|| ParseError::missing_table(TableTag::HHEA))?;
        let hhea = HheaTable::parse(hhea)?;
        let hmtx = HmtxTable {
            raw: hmtx.ok_or_else(|| ParseError::missing_table(TableTag::HMTX))?,
            number_of_h_metrics: hhea.number_of_h_metrics,
        };
        if hmtx.number_of_h_metrics == 0 {
            return Err(hmtx.raw.err(ParseErrorKind::UnexpectedTableLen {
                expected: 4,
                actual: 0,
            }));
        }
        let post = post.ok_or_else(|| ParseError::missing_table(TableTag::POST))?;
        if post.bytes.len() < Self::MIN_POST_LEN {
            return Err(post.err(ParseErrorKind::UnexpectedTableLen {
                expected: Self::MIN_POST_LEN,
                actual: post.bytes.len(),
            }));
        }
        let cmap = cmap.ok_or_else(|| ParseError::missing_table(TableTag::CMAP))?;

        Ok(Self {
            cmap: CmapTable::parse(cmap)?,
            head: head.bytes,
            hhea,
            hmtx,
            maxp: maxp.bytes,
            name: name.ok_or_else(|| ParseError::missing_table(TableTag::NAME))?,
            os2: os2.ok_or_else(|| ParseError::missing_table(TableTag::OS2))?,
            post: post.bytes,
            loca,
            glyf: glyf.ok_or_else(|| ParseError::missing_table(TableTag::GLYF))?,
            cvt,
            fpgm,
            prep,
            glyph_count,
        })
    }

    fn parse_table_record(
        header: &mut Cursor<'_>,
        font: Cursor<'a>,
    ) -> Result<(TableTag, Cursor<'a>), ParseError> {
        let tag = TableTag(header.read_byte_array()?);
        header.skip(4)?; // checksum
        let offset = header.read_u32()? as usize;
        let len = header.read_u32()? as usize;
        let table = font
            .range(offset..offset + len)
            .map_err(|err| err.with_table(tag))?;
        Ok((tag, Cursor::for_table(table.bytes, tag)))
    }

    fn parse_loca_format(mut head: Cursor<'_>) -> Result<LocaFormat, ParseError> {
        if head.bytes.len() < Self::HEAD_LEN {
            return Err(head.err(ParseErrorKind::UnexpectedTableLen {
                expected: Self::HEAD_LEN,
                actual: head.bytes.len(),
            }));
        }
        head.read_u32_checked(|version| {
            if version != 0x_0001_0000 {
                return Err(ParseErrorKind::UnexpectedTableVersion { version });
            }
            Ok(())
        })?;
        head.skip(46)?;
        // ^ fontRevision, checksumAdjustment, magicNumber, flags, unitsPerEm, created, modified,
        // bounding box, macStyle, lowestRecPPEM, fontDirectionHint

        head.read_u16_checked(|raw_format| match raw_format {
            0 => Ok(LocaFormat::Short),
            1 => Ok(LocaFormat::Long),
            _ => Err(ParseErrorKind::UnexpectedLocaFormat(raw_format)),
        })
    }

    fn parse_glyph_count(mut maxp: Cursor<'_>) -> Result<u16, ParseError> {
        maxp.read_u32_checked(|version| {
            if version != 0x_0000_5000 && version != 0x_0001_0000 {
                return Err(ParseErrorKind::UnexpectedTableVersion { version });
            }
            Ok(())
        })?;
        maxp.read_u16()
    }

    /// Returns the number of glyphs in this font.
    pub fn glyph_count(&self) -> u16 {
        self.glyph_count
    }

    /// Maps a char to the glyph index using the `cmap` table. Returns 0 (the missing glyph)
    /// if the char is not mapped.
    ///
    /// # Errors
    ///
    /// Returns an error if the `cmap` table is malformed.
    pub fn map_char(&self, ch: char) -> Result<u16, MapError> {
        self.cmap.map_char(ch)
    }

    /// Checks whether the font has a glyph for the specified char.
    pub fn contains_char(&self, ch: char) -> bool {
        self.map_char(ch)
            .is_ok_and(|idx| idx != 0 && idx < self.glyph_count)
    }

    pub(crate) fn glyph(&self, glyph_idx: u16) -> Result<GlyphWithMetrics<'a>, ParseError> {
        let range = self.loca.glyph_range(glyph_idx)?;
        let inner = Glyph::new(self.glyf.range(range)?)?;
        let (advance, lsb) = self.hmtx.advance_and_lsb(glyph_idx)?;
        Ok(GlyphWithMetrics {
            inner,
            advance,
            lsb,
        })
    }

    pub(crate) fn checksum(data: &[u8]) -> u32 {
        let mut chunks = data.chunks_exact(4);
        let mut checksum = chunks.by_ref().fold(0_u32, |acc, chunk| {
            let word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            acc.wrapping_add(word)
        });
        let remainder = chunks.remainder();
        if !remainder.is_empty() {
            let mut padded = [0_u8; 4];
            padded[..remainder.len()].copy_from_slice(remainder);
            checksum = checksum.wrapping_add(u32::from_be_bytes(padded));
        }
        checksum
    }
}
