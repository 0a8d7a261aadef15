//! Remapping icons to a compact codepoint range.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    errors::Error,
    font_face::{FaceId, FontFaces},
    icon::Icon,
};

/// Policy for icons whose modifiers select more than one font face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguousVariant {
    /// Use the first selected face in the declaration order.
    #[default]
    First,
    /// Fail the pass.
    Error,
    /// Use every selected face.
    ExpandAll,
}

/// Allocator of new codepoints. Codepoints are allocated sequentially, skipping surrogates.
#[derive(Debug, Clone)]
pub struct CodepointAllocator {
    next: u32,
}

impl CodepointAllocator {
    /// Creates an allocator starting from `base`.
    pub fn new(base: char) -> Self {
        Self { next: base.into() }
    }

    /// Allocates the next codepoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator is exhausted.
    pub fn allocate(&mut self) -> Result<char, Error> {
        const SURROGATES: std::ops::RangeInclusive<u32> = 0xd800..=0xdfff;

        if SURROGATES.contains(&self.next) {
            self.next = SURROGATES.end() + 1;
        }
        let codepoint = char::from_u32(self.next).ok_or(Error::CodepointsExhausted)?;
        self.next += 1;
        Ok(codepoint)
    }
}

/// Access to glyphs of font faces.
pub trait GlyphStore {
    /// Checks whether the font of `face` has a glyph for `codepoint`.
    fn contains(&self, face: FaceId, codepoint: char) -> bool;

    /// Copies the glyph for `legacy` codepoint from the font of `face` to the output font
    /// under the `new` codepoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the glyph cannot be copied.
    fn copy(&mut self, face: FaceId, legacy: char, new: char) -> Result<(), Error>;
}

/// Selectors for each new codepoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorGroup {
    selectors: BTreeMap<char, Vec<String>>,
}

impl SelectorGroup {
    pub(crate) fn push(&mut self, codepoint: char, selector: String) {
        let selectors = self.selectors.entry(codepoint).or_default();
        if !selectors.contains(&selector) {
            selectors.push(selector);
        }
    }

    /// Returns the number of codepoints.
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    /// Checks whether the group is empty.
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Returns selectors for the specified codepoint.
    pub fn get(&self, codepoint: char) -> Option<&[String]> {
        self.selectors.get(&codepoint).map(Vec::as_slice)
    }

    /// Iterates over codepoints and their selectors in the ascending codepoint order.
    pub fn iter(&self) -> impl Iterator<Item = (char, &[String])> + '_ {
        self.selectors
            .iter()
            .map(|(&codepoint, selectors)| (codepoint, selectors.as_slice()))
    }
}

/// Outcome of remapping icons.
#[derive(Debug, Default)]
pub struct Remapping {
    /// Selectors for each new codepoint.
    pub selectors: SelectorGroup,
    /// Legacy to new codepoint mapping for each face.
    pub assignments: BTreeMap<FaceId, BTreeMap<char, char>>,
}

impl Remapping {
    /// Returns the total number of copied glyphs.
    pub fn glyph_count(&self) -> usize {
        self.assignments.values().map(BTreeMap::len).sum()
    }
}

/// Remaps icons to new codepoints, copying their glyphs to a [`GlyphStore`].
#[derive(Debug)]
pub struct Remapper<'a, S> {
    faces: &'a FontFaces,
    active: Vec<FaceId>,
    codepoints: &'a IndexMap<String, char>,
    policy: AmbiguousVariant,
    allocator: &'a mut CodepointAllocator,
    store: &'a mut S,
    output: Remapping,
}

impl<'a, S: GlyphStore> Remapper<'a, S> {
    /// Creates a remapper.
    pub fn new(
        faces: &'a FontFaces,
        codepoints: &'a IndexMap<String, char>,
        policy: AmbiguousVariant,
        allocator: &'a mut CodepointAllocator,
        store: &'a mut S,
    ) -> Self {
        Self {
            faces,
            active: faces.active_ids(),
            codepoints,
            policy,
            allocator,
            store,
            output: Remapping::default(),
        }
    }

    fn face_name(&self, face: FaceId) -> String {
        self.faces[face].key.to_string()
    }

    /// Returns the new codepoint for the glyph, copying the glyph on first request.
    fn assign(&mut self, face: FaceId, legacy: char) -> Result<char, Error> {
        let assignments = self.output.assignments.entry(face).or_default();
        if let Some(&new) = assignments.get(&legacy) {
            return Ok(new);
        }
        let new = self.allocator.allocate()?;
        self.store.copy(face, legacy, new)?;
        assignments.insert(legacy, new);
        Ok(new)
    }

    fn resolve(&mut self, face: FaceId, icon: &Icon, legacy: char) -> Result<(), Error> {
        if !self.store.contains(face, legacy) {
            return Err(Error::MissingGlyph {
                face: self.face_name(face),
                icon: icon.selector(),
                codepoint: legacy.into(),
            });
        }
        let new = self.assign(face, legacy)?;
        self.output.selectors.push(new, icon.selector());
        Ok(())
    }

    /// Resolves every face containing the glyph, deriving an icon for each class of the face.
    fn expand(&mut self, icon: &Icon, legacy: char) -> Result<(), Error> {
        let faces = self.faces;
        let mut found = false;
        for face in self.active.clone() {
            if !self.store.contains(face, legacy) {
                continue;
            }
            found = true;
            let new = self.assign(face, legacy)?;
            for class in &faces[face].classes {
                let derived = icon.with_modifier(class);
                self.output.selectors.push(new, derived.selector());
            }
        }
        if !found {
            tracing::warn!(%icon, "no font face has a glyph for icon");
        }
        Ok(())
    }

    /// Remaps a single icon.
    ///
    /// # Errors
    ///
    /// Returns an error if the icon has no codepoint, if the selected face has no glyph for it,
    /// or if the icon selects several faces and the policy forbids this.
    pub fn add_icon(&mut self, icon: &Icon) -> Result<(), Error> {
        let legacy = *self
            .codepoints
            .get(&icon.name)
            .ok_or_else(|| Error::MissingCodepoint {
                name: icon.name.clone(),
            })?;

        if let [face] = self.active[..] {
            return self.resolve(face, icon, legacy);
        }

        let faces = self.faces;
        let selected: Vec<_> = self
            .active
            .iter()
            .copied()
            .filter(|&face| {
                faces[face]
                    .classes
                    .iter()
                    .any(|class| icon.modifiers.contains(class))
            })
            .collect();
        match (selected.as_slice(), self.policy) {
            ([], _) => self.expand(icon, legacy),
            ([face], _) | ([face, ..], AmbiguousVariant::First) => {
                self.resolve(*face, icon, legacy)
            }
            (_, AmbiguousVariant::Error) => Err(Error::AmbiguousVariant {
                icon: icon.selector(),
                faces: selected
                    .iter()
                    .map(|&face| self.face_name(face))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
            (_, AmbiguousVariant::ExpandAll) => {
                for &face in &selected {
                    self.resolve(face, icon, legacy)?;
                }
                Ok(())
            }
        }
    }

    /// Finishes remapping.
    pub fn finish(self) -> Remapping {
        self.output
    }
}
