//! Brotli compression of the table data for WOFF2.

use std::{io, ops};

use super::FontWriter;

/// Reads table data of a [`FontWriter`] skipping the alignment padding between tables,
/// as WOFF2 requires.
struct TableDataReader<'a> {
    writer: &'a FontWriter,
    data_offset: u32,
    table_idx: usize,
    pos_in_table: usize,
}

impl<'a> TableDataReader<'a> {
    fn new(writer: &'a FontWriter) -> Self {
        debug_assert!(
            writer
                .tables
                .windows(2)
                .all(|window| window[0].offset + window[0].length <= window[1].offset),
            "table records need to be ordered by offsets"
        );
        let data_offset = writer.tables.first().map_or(0, |record| record.offset);

        Self {
            writer,
            data_offset,
            table_idx: 0,
            pos_in_table: 0,
        }
    }

    fn read_chunk<'data>(
        &self,
        range: ops::Range<usize>,
        data: &'data mut [u8],
    ) -> (usize, Option<&'data mut [u8]>) {
        let remaining = &self.writer.table_data[range];
        if remaining.len() < data.len() {
            let (head, tail) = data.split_at_mut(remaining.len());
            head.copy_from_slice(remaining);
            // Continue reading from the next table
            (remaining.len(), Some(tail))
        } else {
            data.copy_from_slice(&remaining[..data.len()]);
            (data.len(), None)
        }
    }
}

impl io::Read for TableDataReader<'_> {
    fn read(&mut self, mut data: &mut [u8]) -> io::Result<usize> {
        let mut total_read = 0;
        loop {
            let Some(table) = self.writer.tables.get(self.table_idx) else {
                return Ok(total_read); // nothing left to read
            };

            let adjusted_offset = (table.offset - self.data_offset) as usize;
            let start_offset = adjusted_offset + self.pos_in_table;
            let end_offset = adjusted_offset + table.length as usize;
            let (read, remaining_data) = self.read_chunk(start_offset..end_offset, data);
            total_read += read;

            if let Some(remaining_data) = remaining_data {
                // Move to the next table
                self.table_idx += 1;
                self.pos_in_table = 0;
                data = remaining_data;
            } else {
                // Run out of the output buffer
                self.pos_in_table += read;
                debug_assert!(self.pos_in_table <= table.length as usize);
                return Ok(total_read);
            }
        }
    }
}

impl FontWriter {
    pub(super) fn compress_data(&self) -> Vec<u8> {
        let mut buffer = vec![];
        ::brotli::enc::BrotliCompress(
            &mut TableDataReader::new(self),
            &mut buffer,
            &::brotli::enc::BrotliEncoderParams::default(),
        )
        .expect("reading table data and writing to Vec never fail");
        buffer
    }
}
