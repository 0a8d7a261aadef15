//! Shared test fixtures.

use std::{
    collections::{BTreeSet, HashSet},
    fmt::Write as _,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;

use crate::{
    css::{class_codepoints, parse_rules},
    errors::Error,
    fetch::Location,
    font_face::{FaceId, FontFaces},
    icon::Icon,
    remap::GlyphStore,
};

/// Font Awesome 5-like stylesheet with brands (`fab`) and solid (`fa`, `fas`) faces.
pub(crate) const FA_CSS: &str = r#"
@charset "UTF-8";
/*! Font Awesome-like test stylesheet */
:root { --fa-primary-opacity: 1 }
.fa, .fab, .fas { display: inline-block; -webkit-font-smoothing: antialiased; font-style: normal; }
.fa-spin { animation: fa-spin 2s infinite linear }
.fa-pulse { animation: fa-spin 1s steps(8) infinite }
.fa-2x { font-size: 2em }
.sr-only { position: absolute; width: 1px }
@keyframes fa-spin { 0% { transform: rotate(0deg) } to { transform: rotate(360deg) } }
.fa-home:before { content: "\f015" }
.fa-user:before { content: "\f007" }
.fa-star:before { content: "\f005" }
.fa-github:before { content: "\f09b" }
.fa-google:before { content: "\f1a0" }
@font-face {
    font-family: "Font Awesome 5 Brands";
    font-style: normal;
    font-weight: 400;
    src: url("../webfonts/fa-brands-400.woff2") format("woff2"),
        url("../webfonts/fa-brands-400.ttf") format("truetype");
}
.fab { font-family: "Font Awesome 5 Brands"; font-weight: 400 }
@font-face {
    font-family: "Font Awesome 5 Free";
    font-style: normal;
    font-weight: 900;
    src: url("../webfonts/fa-solid-900.woff2") format("woff2"),
        url("../webfonts/fa-solid-900.ttf") format("truetype");
}
.fa, .fas { font-family: "Font Awesome 5 Free"; font-weight: 900 }
"#;

/// Glyphs of the brands font for [`FA_CSS`].
pub(crate) const BRANDS_GLYPHS: &[(char, i16)] = &[('\u{f1a0}', 200), ('\u{f09b}', 240)];
/// Glyphs of the solid font for [`FA_CSS`].
pub(crate) const SOLID_GLYPHS: &[(char, i16)] =
    &[('\u{f015}', 100), ('\u{f007}', 120), ('\u{f005}', 140)];

pub(crate) fn icon(name: &str, modifiers: &[&str]) -> Icon {
    Icon {
        name: name.to_owned(),
        modifiers: modifiers.iter().map(|&class| class.to_owned()).collect::<BTreeSet<_>>(),
    }
}

/// Creates normal / 400 faces for each family selected by the specified classes,
/// together with a codepoint table for common icons.
pub(crate) fn scenario_faces(
    families: &[(&str, &[&str])],
) -> (FontFaces, IndexMap<String, char>) {
    let mut css = String::new();
    for (name, cp) in [
        ("fa-home", 0xf015),
        ("fa-house", 0xf015),
        ("fa-user", 0xf007),
        ("fa-star", 0xf005),
        ("fa-google", 0xf1a0),
        ("fa-github", 0xf09b),
    ] {
        writeln!(css, ".{name}:before {{ content: \"\\{cp:x}\"; }}").unwrap();
    }
    for (family, classes) in families {
        writeln!(
            css,
            "@font-face {{ font-family: \"{family}\"; font-style: normal; font-weight: 400; \
             src: url(\"{family}.ttf\"); }}"
        )
        .unwrap();
        let selector: Vec<_> = classes.iter().map(|class| format!(".{class}")).collect();
        writeln!(css, "{} {{ font-family: \"{family}\"; }}", selector.join(", ")).unwrap();
    }

    let rules = parse_rules(&css);
    let stylesheet = Location::Local(PathBuf::from("/site/css/icons.css"));
    let faces = FontFaces::associate(&rules, &stylesheet, Path::new("/site"));
    assert_eq!(faces.active_ids().len(), families.len(), "{css}");
    (faces, class_codepoints(&rules))
}

/// In-memory glyph store; the font of face #i contains the specified chars.
#[derive(Debug)]
pub(crate) struct FakeStore {
    fonts: Vec<HashSet<char>>,
    pub(crate) copied: Vec<(FaceId, char, char)>,
}

impl FakeStore {
    pub(crate) fn new(fonts: &[&[char]]) -> Self {
        Self {
            fonts: fonts.iter().map(|chars| chars.iter().copied().collect()).collect(),
            copied: vec![],
        }
    }
}

impl GlyphStore for FakeStore {
    fn contains(&self, face: FaceId, codepoint: char) -> bool {
        self.fonts
            .get(face.0)
            .is_some_and(|chars| chars.contains(&codepoint))
    }

    fn copy(&mut self, face: FaceId, legacy: char, new: char) -> Result<(), Error> {
        if !self.contains(face, legacy) {
            return Err(Error::MissingGlyph {
                face: face.to_string(),
                icon: String::new(),
                codepoint: legacy.into(),
            });
        }
        self.copied.push((face, legacy, new));
        Ok(())
    }
}

fn push_u16(buffer: &mut Vec<u8>, value: u16) {
    buffer.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(buffer: &mut Vec<u8>, value: u32) {
    buffer.extend_from_slice(&value.to_be_bytes());
}

fn square_glyph(side: i16) -> Vec<u8> {
    let mut buffer = vec![];
    push_u16(&mut buffer, 1); // numberOfContours
    for coord in [0, 0, side, side] {
        buffer.extend_from_slice(&coord.to_be_bytes());
    }
    push_u16(&mut buffer, 3); // endPtsOfContours[0]
    push_u16(&mut buffer, 0); // instructionLength
    buffer.extend_from_slice(&[0x01; 4]); // on-curve points, int16 deltas
    for delta in [0, side, 0, -side, 0, 0, side, 0] {
        buffer.extend_from_slice(&delta.to_be_bytes());
    }
    buffer
}

/// Synthesizes a TrueType font with a square glyph of the specified side for each char.
pub(crate) fn test_font(glyphs: &[(char, i16)]) -> Vec<u8> {
    let mut glyphs = glyphs.to_vec();
    glyphs.sort_unstable_by_key(|&(ch, _)| ch);
    let glyph_count = u16::try_from(glyphs.len() + 1).unwrap();
    let mut tables: Vec<([u8; 4], Vec<u8>)> = vec![];

    let mut cmap = vec![];
    push_u16(&mut cmap, 0); // version
    push_u16(&mut cmap, 1); // numTables
    push_u16(&mut cmap, 3); // platformID: Windows
    push_u16(&mut cmap, 10); // encodingID: full Unicode
    push_u32(&mut cmap, 12); // offset
    push_u16(&mut cmap, 12); // format
    push_u16(&mut cmap, 0); // reserved
    push_u32(&mut cmap, 16 + 12 * u32::try_from(glyphs.len()).unwrap());
    push_u32(&mut cmap, 0); // language
    push_u32(&mut cmap, u32::try_from(glyphs.len()).unwrap());
    for ((ch, _), glyph_id) in glyphs.iter().zip(1_u32..) {
        push_u32(&mut cmap, u32::from(*ch));
        push_u32(&mut cmap, u32::from(*ch));
        push_u32(&mut cmap, glyph_id);
    }
    tables.push((*b"cmap", cmap));

    let mut head = vec![];
    push_u32(&mut head, 0x_0001_0000); // version
    push_u32(&mut head, 0x_0001_0000); // fontRevision
    push_u32(&mut head, 0); // checksumAdjustment
    push_u32(&mut head, 0x_5f0f_3cf5); // magicNumber
    push_u16(&mut head, 0x000b); // flags
    push_u16(&mut head, 1000); // unitsPerEm
    head.extend_from_slice(&[0; 16]); // created, modified
    for coord in [0, 0, 1000, 1000] {
        push_u16(&mut head, coord);
    }
    push_u16(&mut head, 0); // macStyle
    push_u16(&mut head, 8); // lowestRecPPEM
    push_u16(&mut head, 2); // fontDirectionHint
    push_u16(&mut head, 1); // indexToLocFormat: long
    push_u16(&mut head, 0); // glyphDataFormat
    tables.push((*b"head", head));

    let mut hhea = vec![];
    push_u32(&mut hhea, 0x_0001_0000);
    for field in [800_i16, -200, 0, 1000, 0, 0, 1000, 1, 0, 0, 0, 0, 0, 0, 0] {
        hhea.extend_from_slice(&field.to_be_bytes());
    }
    push_u16(&mut hhea, glyph_count); // numberOfHMetrics
    tables.push((*b"hhea", hhea));

    let mut hmtx = vec![];
    for _ in 0..glyph_count {
        push_u16(&mut hmtx, 1000);
        push_u16(&mut hmtx, 0);
    }
    tables.push((*b"hmtx", hmtx));

    let mut maxp = vec![];
    push_u32(&mut maxp, 0x_0001_0000);
    push_u16(&mut maxp, glyph_count);
    for field in [4, 1, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0] {
        push_u16(&mut maxp, field);
    }
    tables.push((*b"maxp", maxp));

    tables.push((*b"name", vec![0, 0, 0, 0, 0, 6]));
    let mut os2 = vec![];
    push_u16(&mut os2, 4);
    os2.extend_from_slice(&[0; 94]);
    tables.push((*b"OS/2", os2));
    let mut post = vec![];
    push_u32(&mut post, 0x_0003_0000);
    post.extend_from_slice(&[0; 28]);
    tables.push((*b"post", post));

    let mut glyf = vec![];
    let mut loca = vec![];
    push_u32(&mut loca, 0);
    push_u32(&mut loca, 0); // empty missing glyph
    for &(_, side) in &glyphs {
        glyf.extend(square_glyph(side));
        push_u32(&mut loca, u32::try_from(glyf.len()).unwrap());
    }
    tables.push((*b"glyf", glyf));
    tables.push((*b"loca", loca));

    tables.sort_unstable_by_key(|(tag, _)| *tag);
    let table_count = u16::try_from(tables.len()).unwrap();
    let mut font = vec![];
    push_u32(&mut font, 0x_0001_0000);
    push_u16(&mut font, table_count);
    let entry_selector = table_count.ilog2();
    let search_range = 16_u16 << entry_selector;
    push_u16(&mut font, search_range);
    push_u16(&mut font, u16::try_from(entry_selector).unwrap());
    push_u16(&mut font, 16 * table_count - search_range);

    let mut offset = 12 + 16 * tables.len();
    let mut data = vec![];
    for (tag, table) in &tables {
        font.extend_from_slice(tag);
        push_u32(&mut font, 0); // checksum
        push_u32(&mut font, u32::try_from(offset).unwrap());
        push_u32(&mut font, u32::try_from(table.len()).unwrap());
        data.extend_from_slice(table);
        while data.len() % 4 != 0 {
            data.push(0);
        }
        offset = 12 + 16 * tables.len() + data.len();
    }
    font.extend(data);
    font
}

#[test]
fn synthesized_font_can_be_read() {
    let bytes = test_font(SOLID_GLYPHS);
    let font = glyph_pack::Font::new(&bytes).unwrap();
    assert_eq!(font.glyph_count(), 4);
    assert_eq!(font.map_char('\u{f005}').unwrap(), 1);
    assert_eq!(font.map_char('\u{f015}').unwrap(), 3);
    assert!(!font.contains_char('\u{f09b}'));
}
