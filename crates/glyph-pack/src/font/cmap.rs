//! `cmap` table: reading char mappings of source fonts and building the mapping of a pack.

use core::mem;

use super::Cursor;
use crate::{
    errors::{MapError, ParseErrorKind},
    ParseError,
};

#[derive(Debug)]
enum CmapTableFormat {
    /// Segment mapping to delta values (format 4).
    SegmentDeltas,
    /// Segmented coverage (format 12).
    SegmentedCoverage,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SegmentWithDelta {
    pub(crate) start_code: u16,
    pub(crate) end_code: u16,
    pub(crate) id_delta: u16,
    pub(crate) id_range_offset: u16,
}

/// Segment mapping to delta values (format 4) subtable of the `cmap` table.
#[derive(Debug, Clone)]
pub(crate) struct SegmentDeltas<'a> {
    pub(crate) segments: Vec<SegmentWithDelta>,
    pub(crate) glyph_id_array: &'a [u8],
}

impl<'a> SegmentDeltas<'a> {
    fn parse(mut cursor: Cursor<'a>) -> Result<Self, ParseError> {
        cursor.read_u16_checked(|format| {
            if format != 4 {
                return Err(ParseErrorKind::UnexpectedTableFormat { format });
            }
            Ok(())
        })?;

        let remaining_len = cursor.read_u16_checked(|subtable_len| {
            Ok(subtable_len
                .checked_sub(4)
                .ok_or(ParseErrorKind::UnexpectedEof)? as usize)
        })?;
        // Some fonts declare a format 4 subtable longer than the remaining table data;
        // the declared length is clamped in this case.
        cursor = cursor.range(0..remaining_len.min(cursor.bytes.len()))?;

        cursor.skip(2)?; // language
        let segment_count = cursor.read_u16()? / 2;
        cursor.skip(6)?; // searchRange, entrySelector, rangeShift

        let vec_len = 2 * usize::from(segment_count);
        let mut end_codes = cursor.split_at(vec_len)?;
        cursor.skip(2)?; // reserved padding
        let mut start_codes = cursor.split_at(vec_len)?;
        let mut id_deltas = cursor.split_at(vec_len)?;
        let mut id_range_offsets = cursor.split_at(vec_len)?;

        let segments = (0..segment_count).map(|_| {
            Ok(SegmentWithDelta {
                start_code: start_codes.read_u16()?,
                end_code: end_codes.read_u16()?,
                id_delta: id_deltas.read_u16()?,
                id_range_offset: id_range_offsets.read_u16()?,
            })
        });

        Ok(Self {
            segments: segments.collect::<Result<_, ParseError>>()?,
            glyph_id_array: cursor.bytes,
        })
    }

    fn map_code(&self, segment_idx: usize, code: u16) -> Result<u16, MapError> {
        let segment = &self.segments[segment_idx];
        if segment.id_range_offset == 0 {
            return Ok(segment.id_delta.wrapping_add(code));
        }

        // Offset is counted from the start of `idRangeOffsets`
        let mut byte_offset = 2 * segment_idx;
        byte_offset += usize::from(segment.id_range_offset);
        byte_offset += 2 * usize::from(code - segment.start_code);

        // Shift the offset to count from the start of `glyphIdArray`
        byte_offset = byte_offset
            .checked_sub(2 * self.segments.len())
            .ok_or(MapError::InvalidOffset)?;
        let Some(&[hi, lo]) = self.glyph_id_array.get(byte_offset..byte_offset + 2) else {
            return Err(MapError::InvalidOffset);
        };
        let glyph_id = u16::from_be_bytes([hi, lo]);
        Ok(if glyph_id == 0 {
            0
        } else {
            segment.id_delta.wrapping_add(glyph_id)
        })
    }

    fn map_char(&self, ch: char) -> Result<u16, MapError> {
        let code = u16::try_from(u32::from(ch)).map_err(|_| MapError::CharTooLarge)?;

        let segment_idx = self
            .segments
            .binary_search_by_key(&code, |segment| segment.end_code)
            .unwrap_or_else(|pos| pos);
        let Some(segment) = self.segments.get(segment_idx) else {
            return Ok(0); // `code` exceeds `end_code` for the last segment
        };
        if segment.start_code > code {
            return Ok(0); // missing glyph
        }
        self.map_code(segment_idx, code)
    }

    #[cfg(test)]
    fn mapped_chars(&self) -> impl Iterator<Item = (char, u16)> + '_ {
        self.segments
            .iter()
            .enumerate()
            .flat_map(move |(segment_idx, segment)| {
                (segment.start_code..=segment.end_code).filter_map(move |code| {
                    let ch = char::from_u32(code.into())?;
                    let glyph_idx = self.map_code(segment_idx, code).ok()?;
                    (glyph_idx != 0).then_some((ch, glyph_idx))
                })
            })
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SequentialMapGroup {
    pub(crate) start_char_code: u32,
    pub(crate) end_char_code: u32,
    pub(crate) start_glyph_id: u32,
}

impl SequentialMapGroup {
    pub(crate) fn map_unchecked(&self, ch: char) -> u32 {
        u32::from(ch) - self.start_char_code + self.start_glyph_id
    }
}

/// Segmented coverage (format 12) subtable of the `cmap` table.
#[derive(Debug, Default, Clone)]
pub(crate) struct SegmentedCoverage {
    pub(crate) groups: Vec<SequentialMapGroup>,
}

impl SegmentedCoverage {
    fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        cursor.read_u16_checked(|format| {
            if format != 12 {
                return Err(ParseErrorKind::UnexpectedTableFormat { format });
            }
            Ok(())
        })?;

        cursor.skip(2)?; // reserved

        let remaining_len = cursor.read_u32_checked(|subtable_len| {
            Ok(subtable_len
                .checked_sub(8)
                .ok_or(ParseErrorKind::UnexpectedEof)? as usize)
        })?;
        cursor = cursor.range(0..remaining_len)?;

        cursor.skip(4)?; // language
        let num_groups = cursor.read_u32()?;
        let groups = (0..num_groups).map(|_| {
            Ok(SequentialMapGroup {
                start_char_code: cursor.read_u32()?,
                end_char_code: cursor.read_u32()?,
                start_glyph_id: cursor.read_u32()?,
            })
        });

        Ok(Self {
            groups: groups.collect::<Result<_, ParseError>>()?,
        })
    }

    fn map_char(&self, ch: char) -> Result<u16, MapError> {
        let code = u32::from(ch);
        let group_idx = self
            .groups
            .binary_search_by_key(&code, |group| group.end_char_code)
            .unwrap_or_else(|pos| pos);
        let Some(group) = self.groups.get(group_idx) else {
            return Ok(0); // `ch` exceeds `end_char_code` for the last segment
        };
        if group.start_char_code > code {
            return Ok(0); // missing glyph
        }
        u16::try_from(group.map_unchecked(ch)).map_err(|_| MapError::InvalidOffset)
    }

    #[cfg(test)]
    fn mapped_chars(&self) -> impl Iterator<Item = (char, u16)> + '_ {
        self.groups.iter().flat_map(|group| {
            (group.start_char_code..=group.end_char_code).filter_map(|code| {
                let ch = char::from_u32(code)?;
                let glyph_idx = u16::try_from(group.map_unchecked(ch)).ok()?;
                (glyph_idx != 0).then_some((ch, glyph_idx))
            })
        })
    }

    /// Groups a char map sorted by chars into runs of consecutive chars mapped
    /// to consecutive glyphs.
    fn from_sorted_map(map: &[(char, u16)]) -> Self {
        let mut groups = vec![];
        let [(first_char, first_idx), rest @ ..] = map else {
            return Self::default();
        };
        let mut current_group = SequentialMapGroup {
            start_char_code: (*first_char).into(),
            end_char_code: (*first_char).into(),
            start_glyph_id: (*first_idx).into(),
        };

        for &(ch, glyph_idx) in rest {
            if u32::from(ch) == current_group.end_char_code + 1
                && u32::from(glyph_idx) == current_group.map_unchecked(ch)
            {
                current_group.end_char_code += 1;
            } else {
                let prev_group = mem::replace(
                    &mut current_group,
                    SequentialMapGroup {
                        start_char_code: ch.into(),
                        end_char_code: ch.into(),
                        start_glyph_id: glyph_idx.into(),
                    },
                );
                groups.push(prev_group);
            }
        }

        groups.push(current_group);
        Self { groups }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum CmapTable<'a> {
    Deltas(SegmentDeltas<'a>),
    Coverage(SegmentedCoverage),
}

impl<'a> CmapTable<'a> {
    pub(crate) const UNICODE_PLATFORM: u16 = 0;
    const WINDOWS_PLATFORM: u16 = 3;

    pub(super) fn parse(mut cursor: Cursor<'a>) -> Result<Self, ParseError> {
        let table_cursor = cursor;
        cursor.read_u16_checked(|version| {
            if version != 0 {
                return Err(ParseErrorKind::UnexpectedTableVersion {
                    version: version.into(),
                });
            }
            Ok(())
        })?;

        let num_tables = cursor.read_u16()?;
        let mut deltas = None;
        let mut coverage = None;
        for _ in 0..num_tables {
            let platform_id = cursor.read_u16()?;
            let encoding_id = cursor.read_u16()?;
            let offset = cursor.read_u32()?;
            let format = match (platform_id, encoding_id) {
                (Self::UNICODE_PLATFORM, 3) | (Self::WINDOWS_PLATFORM, 1) => {
                    CmapTableFormat::SegmentDeltas
                }
                (Self::UNICODE_PLATFORM, 4) | (Self::WINDOWS_PLATFORM, 10) => {
                    CmapTableFormat::SegmentedCoverage
                }
                _ => continue, // unsupported table format
            };

            let mut subtable = table_cursor;
            subtable.skip(offset as usize)?;
            match format {
                CmapTableFormat::SegmentDeltas if deltas.is_none() => {
                    deltas = Some(SegmentDeltas::parse(subtable)?);
                }
                CmapTableFormat::SegmentedCoverage if coverage.is_none() => {
                    coverage = Some(SegmentedCoverage::parse(subtable)?);
                }
                _ => { /* We've already got a table of this format; do nothing */ }
            }
        }

        // Format 12 is a superset of format 4, so it's preferred if both are present.
        coverage
            .map(Self::Coverage)
            .or(deltas.map(Self::Deltas))
            .ok_or_else(|| cursor.err(ParseErrorKind::NoSupportedCmap))
    }

    pub(super) fn map_char(&self, ch: char) -> Result<u16, MapError> {
        match self {
            Self::Deltas(deltas) => deltas.map_char(ch),
            Self::Coverage(coverage) => coverage.map_char(ch),
        }
    }
}

impl CmapTable<'static> {
    /// Builds a table from the char map sorted by chars. Uses format 4 if all chars
    /// fit into the BMP, and format 12 otherwise.
    pub(crate) fn from_map(map: &[(char, u16)]) -> Self {
        let coverage = SegmentedCoverage::from_sorted_map(map);
        let can_be_encoded_as_deltas = map
            .last()
            .is_none_or(|&(ch, _)| u32::from(ch) < u32::from(u16::MAX));
        if !can_be_encoded_as_deltas {
            return Self::Coverage(coverage);
        }

        #[allow(clippy::cast_possible_truncation)]
        // `_ as u16` is safe due to the `can_be_encoded_as_deltas` check
        let delta_segments = coverage.groups.iter().map(|group| {
            let start_code = group.start_char_code as u16;
            SegmentWithDelta {
                start_code,
                end_code: group.end_char_code as u16,
                id_delta: (group.start_glyph_id as u16).wrapping_sub(start_code),
                id_range_offset: 0,
            }
        });
        // Add an empty segment with `start_code == end_code == 0xffff` required by the `cmap` format.
        let delta_segments = delta_segments.chain([SegmentWithDelta {
            start_code: u16::MAX,
            end_code: u16::MAX,
            id_delta: 1, // will map `start_code` to glyph #0 (the missing glyph) as recommended
            id_range_offset: 0,
        }]);
        Self::Deltas(SegmentDeltas {
            segments: delta_segments.collect(),
            glyph_id_array: &[],
        })
    }
}
