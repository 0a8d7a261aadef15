//! Logic for serializing `GlyphPack`s in OpenType and WOFF2 formats.

use core::iter;
use std::collections::BTreeSet;

use crate::{
    font::{CmapTable, GlyphWithMetrics, HheaTable, HmtxTable, LocaFormat, LocaTable, SegmentDeltas, SegmentedCoverage},
    Font, GlyphPack, TableTag,
};

mod brotli;

pub(crate) fn write_u16(writer: &mut Vec<u8>, value: u16) {
    writer.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn write_u32(writer: &mut Vec<u8>, value: u32) {
    writer.extend_from_slice(&value.to_be_bytes());
}

fn uint_base128_len(val: u32) -> usize {
    if val == 0 {
        1
    } else {
        val.ilog2() as usize / 7 + 1
    }
}

#[allow(clippy::cast_possible_truncation)] // intentional
fn write_uint_base128(buffer: &mut Vec<u8>, val: u32) {
    //let mut prev_len = buffer.len();
    if val >= 1 << 28 {
        buffer.push(0x80 | (val >> 28) as u8);
    }
    if val >= 1 << 21 {
        buffer.push(0x80 | (val >> 21) as u8);
    }
    if val >= 1 << 14 {
        buffer.push(0x80 | (val >> 14) as u8);
    }
    if val >= 1 << 7 {
        buffer.push(0x80 | (val >> 7) as u8);
    }
    buffer.push((val & 127) as u8);
}

impl CmapTable<'_> {
    pub(crate) fn write(&self, writer: &mut Vec<u8>) {
        write_u16(writer, 0); // table version
        write_u16(writer, 1); // num_tables

        write_u16(writer, CmapTable::UNICODE_PLATFORM);
        let encoding_id = match self {
            Self::Deltas(_) => 3,
            Self::Coverage(_) => 4,
        };
        write_u16(writer, encoding_id);
        write_u32(writer, 12); // subtable_offset

        match self {
            Self::Deltas(deltas) => deltas.write(writer),
            Self::Coverage(coverage) => coverage.write(writer),
        }
    }
}

impl SegmentDeltas<'_> {
    fn subtable_len(&self) -> usize {
        16 + 8 * self.segments.len()
    }

    fn write(&self, writer: &mut Vec<u8>) {
        write_u16(writer, 4); // subtable format
        write_u16(
            writer,
            self.subtable_len()
                .try_into()
                .expect("subtable_len overflow"),
        );
        write_u16(writer, 0); // language

        let segment_count = u16::try_from(self.segments.len()).expect("segments.len() overflow");
        write_u16(writer, 2 * segment_count);
        let entry_selector = u16::try_from(segment_count.ilog2()).unwrap();
        let search_range = 1 << (entry_selector + 1);
        write_u16(writer, search_range);
        write_u16(writer, entry_selector);
        let range_shift = 2 * segment_count - search_range;
        write_u16(writer, range_shift);

        for segment in &self.segments {
            write_u16(writer, segment.end_code);
        }
        write_u16(writer, 0); // reserved padding
        for segment in &self.segments {
            write_u16(writer, segment.start_code);
        }
        for segment in &self.segments {
            write_u16(writer, segment.id_delta);
        }
        for segment in &self.segments {
            write_u16(writer, segment.id_range_offset);
        }
        writer.extend_from_slice(self.glyph_id_array);
    }
}

impl SegmentedCoverage {
    fn subtable_len(&self) -> usize {
        16 + 12 * self.groups.len()
    }

    fn write(&self, writer: &mut Vec<u8>) {
        write_u16(writer, 12); // subtable format
        write_u16(writer, 0); // reserved

        write_u32(
            writer,
            self.subtable_len()
                .try_into()
                .expect("subtable_len overflow"),
        );
        write_u32(writer, 0); // language
        write_u32(
            writer,
            self.groups.len().try_into().expect("groups.len() overflow"),
        );
        for group in &self.groups {
            write_u32(writer, group.start_char_code);
            write_u32(writer, group.end_char_code);
            write_u32(writer, group.start_glyph_id);
        }
    }
}

impl GlyphPack<'_> {
    /// Serializes this pack to the OpenType (TrueType) format.
    pub fn to_truetype(&self) -> Vec<u8> {
        self.to_writer().into_opentype()
    }

    /// Serializes this pack to the WOFF2 format.
    pub fn to_woff2(&self) -> Vec<u8> {
        self.to_writer().into_woff2()
    }

    /// Indices of source fonts contributing at least one glyph.
    fn used_sources(&self) -> BTreeSet<usize> {
        self.old_to_new_glyph_idx
            .keys()
            .map(|&(source, _)| source)
            .collect()
    }

    fn to_writer(&self) -> FontWriter {
        let template = self.template();
        let used_sources = self.used_sources();
        // Hinting programs are only meaningful for glyphs of the font they come from.
        let keep_hinting = used_sources.len() == 1;

        let char_map: Vec<_> = self.char_map.iter().map(|(&ch, &idx)| (ch, idx)).collect();
        let cmap = CmapTable::from_map(&char_map);

        let mut writer = FontWriter::default();
        writer.write_table(TableTag::CMAP, |buffer| cmap.write(buffer));
        if keep_hinting {
            if let Some(cvt) = template.cvt {
                writer.write_raw_table(TableTag::CVT, cvt);
            }
            if let Some(fpgm) = template.fpgm {
                writer.write_raw_table(TableTag::FPGM, fpgm);
            }
        }

        let number_of_h_metrics = writer.write_table(TableTag::HMTX, |buffer| {
            HmtxTable::write_for_glyphs(&self.glyphs, buffer)
        });
        let mut hhea = template.hhea;
        hhea.number_of_h_metrics = number_of_h_metrics;
        writer.write_table(TableTag::HHEA, |buffer| {
            hhea.write(buffer);
        });

        writer.write_table(TableTag::MAXP, |buffer| {
            self.write_maxp_table(&used_sources, buffer);
        });

        writer.write_raw_table(TableTag::NAME, template.name);
        writer.write_raw_table(TableTag::OS2, template.os2);

        let post = template.post;
        writer.write_table(TableTag::POST, |buffer| {
            // Truncate the `post` table to not contain glyph names
            write_u32(buffer, 0x_0003_0000); // version
            buffer.extend_from_slice(&post[4..32]);
        });

        if keep_hinting {
            if let Some(prep) = template.prep {
                writer.write_raw_table(TableTag::PREP, prep);
            }
        }

        let locations = writer.write_table(TableTag::GLYF, |buffer| {
            let mut locations = vec![0];
            let initial_offset = buffer.len();
            for glyph in &self.glyphs {
                glyph.inner.write(buffer);
                // Keep glyph offsets even so that the short `loca` format can be used.
                if (buffer.len() - initial_offset) % 2 == 1 {
                    buffer.push(0);
                }
                locations.push(buffer.len() - initial_offset);
            }
            locations
        });

        let loca_format = writer.write_table(TableTag::LOCA, |buffer| {
            LocaTable::write(&locations, buffer)
        });
        writer.write_table(TableTag::HEAD, |buffer| {
            Self::write_head_table(template.head, loca_format, buffer);
        });

        writer
    }

    /// Writes the `maxp` table of the template with the number of glyphs patched. For version 1.0
    /// tables, limits (max points, contours, component depth etc.) are taken as maximums
    /// over all sources contributing glyphs.
    fn write_maxp_table(&self, used_sources: &BTreeSet<usize>, writer: &mut Vec<u8>) {
        const VERSION_1_LEN: usize = 32;

        let maxp = self.template().maxp;
        let start = writer.len();
        writer.extend_from_slice(&maxp[..4]);
        // `unwrap()` is safe: the number of glyphs is checked when adding them to the pack.
        write_u16(writer, self.glyphs.len().try_into().unwrap());
        writer.extend_from_slice(&maxp[6..]);

        if maxp.len() < VERSION_1_LEN || maxp[..4] != [0, 1, 0, 0] {
            return;
        }
        for &source in used_sources {
            let source_maxp = self.sources[source].maxp;
            if source_maxp.len() < VERSION_1_LEN {
                continue;
            }
            for offset in (6..VERSION_1_LEN).step_by(2) {
                let current = [writer[start + offset], writer[start + offset + 1]];
                let candidate = [source_maxp[offset], source_maxp[offset + 1]];
                if u16::from_be_bytes(candidate) > u16::from_be_bytes(current) {
                    writer[start + offset..start + offset + 2].copy_from_slice(&candidate);
                }
            }
        }
    }

    fn write_head_table(original: &[u8], loca_format: LocaFormat, writer: &mut Vec<u8>) {
        const LOCA_FORMAT_OFFSET: usize = 50;

        writer.extend_from_slice(&original[..Font::HEAD_CHECKSUM_OFFSET]);
        write_u32(writer, 0); // The checksum is zeroed; it will be adjusted later
        writer.extend_from_slice(&original[Font::HEAD_CHECKSUM_OFFSET + 4..LOCA_FORMAT_OFFSET]);
        write_u16(
            writer,
            match loca_format {
                LocaFormat::Short => 0,
                LocaFormat::Long => 1,
            },
        );
        writer.extend_from_slice(&original[LOCA_FORMAT_OFFSET + 2..]);
    }
}

impl HmtxTable<'_> {
    fn write_for_glyphs(glyphs: &[GlyphWithMetrics<'_>], writer: &mut Vec<u8>) -> u16 {
        let mut number_of_h_metrics = glyphs.len();
        while let Some([prev, current]) = glyphs[..number_of_h_metrics].last_chunk::<2>() {
            if prev.advance != current.advance {
                break;
            }
            number_of_h_metrics -= 1;
        }

        for (i, glyph) in glyphs.iter().enumerate() {
            if i < number_of_h_metrics {
                write_u16(writer, glyph.advance);
                write_u16(writer, glyph.lsb);
            } else {
                write_u16(writer, glyph.lsb);
            }
        }

        // `unwrap()` should be safe: `number_of_h_metrics` <= number of glyphs, which doesn't exceed u16::MAX
        number_of_h_metrics.try_into().unwrap()
    }
}

impl HheaTable<'_> {
    fn write(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.raw[..Self::EXPECTED_LEN - 2]);
        write_u16(writer, self.number_of_h_metrics);
    }
}

impl LocaTable<'_> {
    fn write(locations: &[usize], writer: &mut Vec<u8>) -> LocaFormat {
        let all_even = locations.iter().all(|&loc| loc % 2 == 0);
        let in_bounds = locations
            .last()
            .is_none_or(|&loc| loc <= usize::from(u16::MAX) * 2);
        if all_even && in_bounds {
            for &loc in locations {
                #[allow(clippy::cast_possible_truncation)]
                // doesn't happen due to the preceding check
                write_u16(writer, (loc / 2) as u16);
            }
            LocaFormat::Short
        } else {
            for &loc in locations {
                write_u32(writer, u32::try_from(loc).expect("glyph location overflow"));
            }
            LocaFormat::Long
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(test, derive(PartialEq))]
struct TableRecord {
    tag: TableTag,
    checksum: u32,
    /// Offset is initially recorded relative to the table data start. It's always 4-byte aligned.
    offset: u32,
    length: u32,
}

impl TableRecord {
    const BYTE_LEN: usize = 16;

    fn write_opentype(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.tag.0);
        write_u32(writer, self.checksum);
        write_u32(writer, self.offset);
        write_u32(writer, self.length);
    }

    fn self_checksum(&self) -> u32 {
        u32::from_be_bytes(self.tag.0)
            .wrapping_add(self.checksum)
            .wrapping_add(self.offset)
            .wrapping_add(self.length)
    }

    fn woff2_len(&self) -> usize {
        1 /* flags */ + uint_base128_len(self.length)
    }

    fn write_woff2(&self, buffer: &mut Vec<u8>) {
        const NULL_TRANSFORM: u8 = 0b_1100_0000;

        let flags = match self.tag {
            TableTag::CMAP => 0,
            TableTag::HEAD => 1,
            TableTag::HHEA => 2,
            TableTag::HMTX => 3,
            TableTag::MAXP => 4,
            TableTag::NAME => 5,
            TableTag::OS2 => 6,
            TableTag::POST => 7,
            TableTag::CVT => 8,
            TableTag::FPGM => 9,
            TableTag::GLYF => 10 | NULL_TRANSFORM,
            TableTag::LOCA => 11 | NULL_TRANSFORM,
            TableTag::PREP => 12,
            _ => unreachable!("subsetting only produces well-known tables"),
        };
        buffer.push(flags);
        write_uint_base128(buffer, self.length);
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FontWriter {
    tables: Vec<TableRecord>,
    /// Contains *aligned* table data
    table_data: Vec<u8>,
}

impl FontWriter {
    const SFNT_HEADER_LEN: usize = 12;
    const WOFF2_HEADER_LEN: usize = 48;

    pub(crate) fn write_table<T>(
        &mut self,
        tag: TableTag,
        with: impl FnOnce(&mut Vec<u8>) -> T,
    ) -> T {
        let offset = self.table_data.len();
        debug_assert_eq!(offset % 4, 0, "unaligned offset: {offset}");

        let output = with(&mut self.table_data);
        let length = self.table_data.len() - offset;
        // Pad the table heap to a 4-byte boundary.
        if length % 4 > 0 {
            let zero_padding = 4 - length % 4;
            self.table_data.extend(iter::repeat_n(0_u8, zero_padding));
        }

        let checksum = Font::checksum(&self.table_data[offset..]);
        self.tables.push(TableRecord {
            tag,
            checksum,
            offset: u32::try_from(offset).expect("table offset overflow"),
            length: u32::try_from(length).expect("table length overflow"),
        });
        output
    }

    pub(crate) fn write_raw_table(&mut self, tag: TableTag, content: &[u8]) {
        self.write_table(tag, |buffer| buffer.extend_from_slice(content));
    }

    fn write_sfnt_header(&self) -> Vec<u8> {
        let mut buffer = vec![];
        write_u32(&mut buffer, Font::SFNT_VERSION);

        // `unwrap()`s are safe: we don't have many tables written.
        let table_count = u16::try_from(self.tables.len()).unwrap();
        write_u16(&mut buffer, table_count);
        let entry_selector = u16::try_from(table_count.ilog2()).unwrap();
        let search_range = 1 << (4 + entry_selector);
        write_u16(&mut buffer, search_range);
        write_u16(&mut buffer, entry_selector);
        let range_shift = 16 * table_count - search_range;
        write_u16(&mut buffer, range_shift);

        debug_assert_eq!(buffer.len(), Self::SFNT_HEADER_LEN);
        buffer
    }

    /// Returns the starting offset of table data.
    fn data_offset(&self) -> usize {
        Self::SFNT_HEADER_LEN + self.tables.len() * TableRecord::BYTE_LEN
    }

    pub(crate) fn into_opentype(mut self) -> Vec<u8> {
        let mut buffer = self.write_sfnt_header();
        self.adjust_data(Font::checksum(&buffer));

        self.tables.sort_unstable_by_key(|record| record.tag.0);
        for record in &self.tables {
            record.write_opentype(&mut buffer);
        }
        buffer.extend(self.table_data);
        buffer
    }

    fn adjust_data(&mut self, sfnt_header_checksum: u32) {
        let data_offset = self.data_offset();
        let data_offset_u32 = u32::try_from(data_offset).expect("data_offset overflow");

        let mut file_checksum = sfnt_header_checksum;
        for record in &mut self.tables {
            record.offset += data_offset_u32;
            file_checksum = file_checksum
                .wrapping_add(record.self_checksum())
                .wrapping_add(record.checksum);
        }
        self.patch_head_table(file_checksum, data_offset);
    }

    fn checksum_adjustment_offset(&self) -> usize {
        let head_table = self
            .tables
            .iter()
            .find(|record| record.tag == TableTag::HEAD)
            .expect("head table is always present");
        head_table.offset as usize + Font::HEAD_CHECKSUM_OFFSET
    }

    fn patch_head_table(&mut self, file_checksum: u32, data_offset: usize) {
        let checksum_adjustment = Font::SFNT_CHECKSUM.wrapping_sub(file_checksum);

        // At this point, the table offset already includes the heap offset, so we need to subtract it.
        let offset = self.checksum_adjustment_offset() - data_offset;
        self.table_data[offset..offset + 4].copy_from_slice(&checksum_adjustment.to_be_bytes());
    }

    pub(crate) fn into_woff2(mut self) -> Vec<u8> {
        const WOFF2_SIGNATURE: u32 = 0x_774f_4632;

        self.adjust_data(Font::checksum(&self.write_sfnt_header()));

        let compressed_data = self.compress_data();
        let tables_len = self
            .tables
            .iter()
            .map(TableRecord::woff2_len)
            .sum::<usize>();
        let mut file_len = Self::WOFF2_HEADER_LEN + tables_len + compressed_data.len();
        if file_len % 4 != 0 {
            file_len += 4 - file_len % 4;
        }

        let mut buffer = vec![];
        write_u32(&mut buffer, WOFF2_SIGNATURE);
        write_u32(&mut buffer, Font::SFNT_VERSION);
        write_u32(
            &mut buffer,
            file_len.try_into().expect("file length overflow"),
        );
        // `unwrap()` is safe: we don't write many tables
        write_u16(&mut buffer, self.tables.len().try_into().unwrap());
        write_u16(&mut buffer, 0); // reserved

        let decompressed_len = self.data_offset() + self.table_data.len();
        // `unwrap`s are safe, since `file_len` fits into u32.
        write_u32(&mut buffer, decompressed_len.try_into().unwrap());
        write_u32(&mut buffer, compressed_data.len().try_into().unwrap());
        write_u32(&mut buffer, 0); // WOFF version
        write_u32(&mut buffer, 0); // metadata offset
        write_u32(&mut buffer, 0); // metadata length
        write_u32(&mut buffer, 0); // original metadata length
        write_u32(&mut buffer, 0); // private block offset
        write_u32(&mut buffer, 0); // private block length
        debug_assert_eq!(buffer.len(), Self::WOFF2_HEADER_LEN);

        for record in &self.tables {
            record.write_woff2(&mut buffer);
        }
        debug_assert_eq!(buffer.len(), Self::WOFF2_HEADER_LEN + tables_len);
        buffer.extend(compressed_data);

        // Pad `buffer` to be 4-byte aligned. This is required even though we don't have metadata or private blocks.
        if buffer.len() % 4 != 0 {
            let padding = 4 - buffer.len() % 4;
            buffer.extend(iter::repeat_n(0, padding));
        }
        //debug_assert_eq!(file_len, buffer.len());
        buffer
    }
}
