//! [`GlyphStore`] backed by a [`GlyphPack`].

use std::collections::HashMap;

use glyph_pack::{Font, GlyphPack};

use crate::{errors::Error, font_face::FaceId, remap::GlyphStore};

/// Glyph store packing glyphs from font faces into a single font. The font of the first face
/// is the template for the packed font.
#[derive(Debug)]
pub struct PackStore<'a> {
    pack: GlyphPack<'a>,
    sources: HashMap<FaceId, usize>,
}

impl<'a> PackStore<'a> {
    /// Creates a store. `fonts[i]` is the font of `faces[i]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template font is malformed.
    pub fn new(faces: &[FaceId], fonts: &'a [Font<'a>]) -> Result<Self, Error> {
        debug_assert_eq!(faces.len(), fonts.len());
        Ok(Self {
            pack: GlyphPack::new(fonts, 0)?,
            sources: faces.iter().enumerate().map(|(i, &face)| (face, i)).collect(),
        })
    }

    /// Returns the packed glyphs.
    pub fn into_pack(self) -> GlyphPack<'a> {
        self.pack
    }
}

impl GlyphStore for PackStore<'_> {
    fn contains(&self, face: FaceId, codepoint: char) -> bool {
        self.sources
            .get(&face)
            .is_some_and(|&source| self.pack.contains(source, codepoint))
    }

    fn copy(&mut self, face: FaceId, legacy: char, new: char) -> Result<(), Error> {
        let source = self.sources.get(&face).copied().ok_or(
            glyph_pack::PackError::UnknownSource(face.0),
        )?;
        self.pack.push_glyph(source, legacy, new)?;
        Ok(())
    }
}
