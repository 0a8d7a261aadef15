use std::collections::BTreeMap;

use crate::{
    errors::PackError,
    font::{Font, GlyphWithMetrics},
};

/// Font assembled from glyphs of one or more source [`Font`]s, each glyph mapped
/// to a new char.
///
/// One of the sources acts as the *template*: its global tables (`head`, `hhea`, `name`, `OS/2`
/// etc.) are reused for the packed font, while the glyph set is replaced wholly
/// by the packed glyphs. Source fonts are never modified; glyphs are copied.
///
/// Glyphs are deduplicated per source: packing the same source glyph under several chars,
/// or referencing it from several composite glyphs, stores it once.
#[derive(Debug)]
pub struct GlyphPack<'a> {
    pub(crate) sources: &'a [Font<'a>],
    pub(crate) template: usize,
    pub(crate) char_map: BTreeMap<char, u16>,
    pub(crate) old_to_new_glyph_idx: BTreeMap<(usize, u16), u16>,
    pub(crate) glyphs: Vec<GlyphWithMetrics<'a>>,
}

impl<'a> GlyphPack<'a> {
    /// Creates an empty pack. The missing glyph (glyph #0) is taken from the `template` font.
    ///
    /// # Errors
    ///
    /// Returns an error if `template` is out of bounds, or if the missing glyph
    /// of the template font cannot be read.
    pub fn new(sources: &'a [Font<'a>], template: usize) -> Result<Self, PackError> {
        let template_font = sources
            .get(template)
            .ok_or(PackError::UnknownSource(template))?;
        let missing_glyph = template_font.glyph(0)?;
        Ok(Self {
            sources,
            template,
            char_map: BTreeMap::new(),
            // The 0th glyph must always be mapped to itself
            old_to_new_glyph_idx: BTreeMap::from([((template, 0), 0)]),
            glyphs: vec![missing_glyph],
        })
    }

    pub(crate) fn template(&self) -> &Font<'a> {
        &self.sources[self.template]
    }

    /// Returns the number of source fonts.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Checks whether the `source` font has a glyph for `ch`.
    pub fn contains(&self, source: usize, ch: char) -> bool {
        self.sources
            .get(source)
            .is_some_and(|font| font.contains_char(ch))
    }

    /// Returns the number of glyphs in the pack, including the missing glyph
    /// and glyphs only referenced by composite glyphs.
    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Iterates over chars mapped by the pack in the increasing order.
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.char_map.keys().copied()
    }

    fn ensure_glyph(&mut self, source: usize, old_idx: u16) -> Result<u16, PackError> {
        if let Some(new_idx) = self.old_to_new_glyph_idx.get(&(source, old_idx)) {
            return Ok(*new_idx);
        }

        let mut glyph = self.sources[source].glyph(old_idx)?;
        for component_idx in glyph.inner.component_indices_mut() {
            *component_idx = self.ensure_glyph(source, *component_idx)?;
        }

        let new_idx = u16::try_from(self.glyphs.len()).map_err(|_| PackError::TooManyGlyphs)?;
        self.glyphs.push(glyph);
        self.old_to_new_glyph_idx.insert((source, old_idx), new_idx);
        Ok(new_idx)
    }

    /// Copies the glyph mapped to `source_char` in the `source` font, and maps it
    /// to `new_char` in the pack.
    ///
    /// # Errors
    ///
    /// Returns an error if the source font doesn't have a glyph for `source_char`,
    /// if `new_char` is already mapped, or if glyph data cannot be read.
    pub fn push_glyph(
        &mut self,
        source: usize,
        source_char: char,
        new_char: char,
    ) -> Result<(), PackError> {
        let font = self
            .sources
            .get(source)
            .ok_or(PackError::UnknownSource(source))?;
        if self.char_map.contains_key(&new_char) {
            return Err(PackError::DuplicateChar(new_char));
        }
        let old_idx = font.map_char(source_char)?;
        if old_idx == 0 || old_idx >= font.glyph_count() {
            return Err(PackError::MissingGlyph {
                source,
                ch: source_char,
            });
        }

        let new_idx = self.ensure_glyph(source, old_idx)?;
        self.char_map.insert(new_char, new_idx);
        Ok(())
    }
}
