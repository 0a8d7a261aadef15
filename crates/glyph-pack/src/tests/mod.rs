use std::{env, fmt, io::Write, process::Command, sync::OnceLock};

use allsorts::{binary::read::ReadScope, font_data::FontData, tables::FontTableProvider};
use test_casing::{test_casing, Product};

use crate::{
    font::{CmapTable, Glyph},
    write::{write_u16, write_u32, FontWriter},
    Font, GlyphPack, PackError, TableTag,
};

/// Outline of a glyph in a synthetic test font.
#[derive(Debug, Clone, Copy)]
pub(crate) enum TestGlyph {
    /// Square with the specified side.
    Square(i16),
    /// Composite glyph referencing a single component by its glyph index.
    Composite(u16),
}

impl TestGlyph {
    fn write(self, buffer: &mut Vec<u8>) {
        match self {
            Self::Square(side) => {
                write_u16(buffer, 1); // numberOfContours
                for coord in [0, 0, side, side] {
                    buffer.extend_from_slice(&coord.to_be_bytes());
                }
                write_u16(buffer, 3); // endPtsOfContours[0]
                write_u16(buffer, 0); // instructionLength
                buffer.extend_from_slice(&[0x01; 4]); // on-curve points, int16 deltas
                for dx in [0, side, 0, -side] {
                    buffer.extend_from_slice(&dx.to_be_bytes());
                }
                for dy in [0, 0, side, 0] {
                    buffer.extend_from_slice(&dy.to_be_bytes());
                }
            }
            Self::Composite(component) => {
                write_u16(buffer, u16::MAX); // numberOfContours = -1
                buffer.extend_from_slice(&[0; 8]); // bounding box
                write_u16(buffer, 0x0003); // ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES
                write_u16(buffer, component);
                write_u32(buffer, 0); // dx, dy
            }
        }
    }
}

/// Minimal TrueType font synthesized from scratch.
#[derive(Clone, Copy)]
pub(crate) struct TestFont {
    pub(crate) name: &'static str,
    /// Glyph #i + 1 is mapped to `glyphs[i].0`.
    pub(crate) glyphs: &'static [(char, TestGlyph)],
    pub(crate) hinting: bool,
    pub(crate) max_points: u16,
}

impl fmt::Debug for TestFont {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.name, formatter)
    }
}

const SOLID_FONT: TestFont = TestFont {
    name: "solid",
    glyphs: &[
        ('\u{f015}', TestGlyph::Square(100)),
        ('\u{f007}', TestGlyph::Square(120)),
        ('\u{f005}', TestGlyph::Square(140)),
        ('\u{f0e0}', TestGlyph::Composite(1)),
    ],
    hinting: true,
    max_points: 4,
};

const BRANDS_FONT: TestFont = TestFont {
    name: "brands",
    glyphs: &[
        ('\u{f1a0}', TestGlyph::Square(200)),
        ('\u{f005}', TestGlyph::Square(220)),
        ('\u{f09b}', TestGlyph::Square(240)),
    ],
    hinting: false,
    max_points: 40,
};

pub(crate) const FONTS: [TestFont; 2] = [SOLID_FONT, BRANDS_FONT];

impl TestFont {
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let glyph_count = u16::try_from(self.glyphs.len() + 1).unwrap();
        let mut writer = FontWriter::default();

        let mut char_map: Vec<_> = self
            .glyphs
            .iter()
            .zip(1_u16..)
            .map(|(&(ch, _), idx)| (ch, idx))
            .collect();
        char_map.sort_unstable();
        let cmap = CmapTable::from_map(&char_map);
        writer.write_table(TableTag::CMAP, |buffer| cmap.write(buffer));

        writer.write_table(TableTag::HEAD, Self::write_head);
        writer.write_table(TableTag::HHEA, |buffer| {
            write_u32(buffer, 0x_0001_0000); // version
            let fields: [i16; 15] = [800, -200, 0, 1000, 0, 0, 1000, 1, 0, 0, 0, 0, 0, 0, 0];
            for field in fields {
                buffer.extend_from_slice(&field.to_be_bytes());
            }
            write_u16(buffer, glyph_count); // numberOfHMetrics
        });
        writer.write_table(TableTag::HMTX, |buffer| {
            for _ in 0..glyph_count {
                write_u16(buffer, 1000); // advance
                write_u16(buffer, 0); // lsb
            }
        });
        writer.write_table(TableTag::MAXP, |buffer| {
            write_u32(buffer, 0x_0001_0000); // version
            write_u16(buffer, glyph_count);
            write_u16(buffer, self.max_points);
            for field in [1, 4, 1, 2, 0, 0, 0, 0, 0, 0, 1, 1] {
                write_u16(buffer, field);
            }
        });
        writer.write_raw_table(TableTag::NAME, &[0, 0, 0, 0, 0, 6]);
        writer.write_table(TableTag::OS2, |buffer| {
            write_u16(buffer, 4); // version
            buffer.extend_from_slice(&[0; 94]);
        });
        writer.write_table(TableTag::POST, |buffer| {
            write_u32(buffer, 0x_0003_0000); // version
            buffer.extend_from_slice(&[0; 28]);
        });
        if self.hinting {
            writer.write_raw_table(TableTag::FPGM, &[0xb0, 0x01]);
            writer.write_raw_table(TableTag::PREP, &[0xb0, 0x00, 0x1d]);
        }

        let offsets = writer.write_table(TableTag::GLYF, |buffer| {
            // Offsets are relative to the start of the table; the missing glyph is empty.
            let mut offsets = vec![0, 0];
            let initial_offset = buffer.len();
            for (_, glyph) in self.glyphs {
                glyph.write(buffer);
                offsets.push(buffer.len() - initial_offset);
            }
            offsets
        });
        writer.write_table(TableTag::LOCA, |buffer| {
            for offset in offsets {
                write_u16(buffer, u16::try_from(offset / 2).unwrap());
            }
        });

        writer.into_opentype()
    }

    fn write_head(buffer: &mut Vec<u8>) {
        write_u32(buffer, 0x_0001_0000); // version
        write_u32(buffer, 0x_0001_0000); // fontRevision
        write_u32(buffer, 0); // checksumAdjustment
        write_u32(buffer, 0x_5f0f_3cf5); // magicNumber
        write_u16(buffer, 0x000b); // flags
        write_u16(buffer, 1000); // unitsPerEm
        buffer.extend_from_slice(&[0; 16]); // created, modified
        for coord in [0, 0, 1000, 1000] {
            write_u16(buffer, coord);
        }
        write_u16(buffer, 0); // macStyle
        write_u16(buffer, 8); // lowestRecPPEM
        write_u16(buffer, 2); // fontDirectionHint
        write_u16(buffer, 0); // indexToLocFormat: short
        write_u16(buffer, 0); // glyphDataFormat
    }
}

/// Chars packed from a single source font. Chars not present in the font are skipped.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PackedChars(pub(crate) &'static [char]);

pub(crate) const PACKED_CHARS: [PackedChars; 2] = [
    PackedChars(&['\u{f015}', '\u{f005}']),
    PackedChars(&['\u{f005}', '\u{f0e0}', '\u{f1a0}', '\u{f09b}']),
];

impl PackedChars {
    pub(crate) fn pack<'a>(self, fonts: &'a [Font<'a>], source: usize) -> GlyphPack<'a> {
        let mut pack = GlyphPack::new(fonts, source).unwrap();
        let chars: Vec<_> = self
            .0
            .iter()
            .copied()
            .filter(|&ch| pack.contains(source, ch))
            .collect();
        for (ch, new_char) in chars.into_iter().zip('\u{e000}'..) {
            pack.push_glyph(source, ch, new_char).unwrap();
        }
        pack
    }
}

#[derive(Debug)]
struct OpenTypeSanitizer {
    path: Option<String>,
}

impl Default for OpenTypeSanitizer {
    fn default() -> Self {
        let Ok(path) = env::var("OTS_SANITIZER") else {
            return Self { path: None };
        };
        let output = Command::new(&path)
            .arg("--version")
            .output()
            .unwrap_or_else(|err| {
                panic!("failed getting version for ots-sanitize at {path}: {err}");
            });
        assert!(
            output.status.success(),
            "failed getting version for ots-sanitize at {path}: non-zero exit code"
        );
        let version = String::from_utf8(output.stdout).unwrap_or_else(|err| {
            panic!("failed getting version for ots-sanitize at {path}: {err}");
        });
        println!("ots-sanitize version: {version}");
        Self { path: Some(path) }
    }
}

impl OpenTypeSanitizer {
    fn get() -> &'static Self {
        static SANITIZER: OnceLock<OpenTypeSanitizer> = OnceLock::new();
        SANITIZER.get_or_init(Self::default)
    }

    fn validate(&self, content: &[u8]) {
        let Some(path) = &self.path else {
            println!("OTS_SANITIZER env var is missing; skipping checks");
            return;
        };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.as_file_mut().write_all(content).unwrap();
        file.as_file_mut().flush().unwrap();
        let file_path = file.into_temp_path();

        let output = Command::new(path)
            .arg(&file_path)
            .output()
            .expect("failed running ots-sanitize");
        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            panic!("ots-sanitize failed:\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}");
        }
    }
}

fn simple_glyph<'a>(font: &Font<'a>, ch: char) -> &'a [u8] {
    let idx = font.map_char(ch).unwrap();
    assert_ne!(idx, 0, "{ch:?} is not mapped");
    match font.glyph(idx).unwrap().inner {
        Glyph::Simple(bytes) => bytes,
        other => panic!("unexpected glyph for {ch:?}: {other:?}"),
    }
}

#[test_casing(2, FONTS)]
fn reading_synthetic_font(test_font: TestFont) {
    let bytes = test_font.to_bytes();
    let font = Font::new(&bytes).unwrap();
    assert_eq!(
        usize::from(font.glyph_count()),
        test_font.glyphs.len() + 1
    );
    assert!(!font.contains_char('\u{e000}'));
    assert_eq!(font.map_char('\u{e000}').unwrap(), 0);

    let font_file = ReadScope::new(&bytes).read::<FontData>().unwrap();
    let provider = font_file.table_provider(0).unwrap();
    assert!(provider.has_table(u32::from_be_bytes(*TableTag::GLYF.as_bytes())));

    for (&(ch, glyph), expected_idx) in test_font.glyphs.iter().zip(1_u16..) {
        assert!(font.contains_char(ch));
        assert_eq!(font.map_char(ch).unwrap(), expected_idx);
        match (glyph, font.glyph(expected_idx).unwrap().inner) {
            (TestGlyph::Square(side), Glyph::Simple(bytes)) => {
                assert_eq!(bytes.len(), 34);
                assert_eq!(bytes[6..8], side.to_be_bytes(), "xMax of {ch:?}");
            }
            (TestGlyph::Composite(component), mut parsed @ Glyph::Composite { .. }) => {
                let indices: Vec<_> = parsed.component_indices_mut().map(|idx| *idx).collect();
                assert_eq!(indices, [component]);
            }
            (expected, parsed) => panic!("unexpected glyph: {parsed:?}, expected {expected:?}"),
        }
    }
}

#[test]
fn packing_glyphs_from_single_source() {
    let bytes = SOLID_FONT.to_bytes();
    let fonts = [Font::new(&bytes).unwrap()];
    let mut pack = GlyphPack::new(&fonts, 0).unwrap();
    pack.push_glyph(0, '\u{f015}', '\u{e000}').unwrap();
    pack.push_glyph(0, '\u{f005}', '\u{e001}').unwrap();
    assert_eq!(pack.glyph_count(), 3);
    assert_eq!(pack.chars().collect::<Vec<_>>(), ['\u{e000}', '\u{e001}']);

    let ttf = pack.to_truetype();
    let packed = Font::new(&ttf).unwrap();
    assert_eq!(packed.glyph_count(), 3);
    assert!(!packed.contains_char('\u{f015}'));
    assert_eq!(
        simple_glyph(&packed, '\u{e000}'),
        simple_glyph(&fonts[0], '\u{f015}')
    );
    assert_eq!(
        simple_glyph(&packed, '\u{e001}'),
        simple_glyph(&fonts[0], '\u{f005}')
    );
}

#[test]
fn packing_glyphs_from_multiple_sources() {
    let [solid, brands] = FONTS.map(|font| font.to_bytes());
    let fonts = [Font::new(&solid).unwrap(), Font::new(&brands).unwrap()];
    let mut pack = GlyphPack::new(&fonts, 0).unwrap();
    assert_eq!(pack.source_count(), 2);
    // `\u{f005}` is present in both sources with different outlines.
    pack.push_glyph(0, '\u{f005}', '\u{e000}').unwrap();
    pack.push_glyph(1, '\u{f005}', '\u{e001}').unwrap();
    pack.push_glyph(1, '\u{f1a0}', '\u{e002}').unwrap();
    assert_eq!(pack.glyph_count(), 4);

    let ttf = pack.to_truetype();
    let packed = Font::new(&ttf).unwrap();
    let solid_star = simple_glyph(&packed, '\u{e000}');
    let brands_star = simple_glyph(&packed, '\u{e001}');
    assert_ne!(solid_star, brands_star);
    assert_eq!(solid_star, simple_glyph(&fonts[0], '\u{f005}'));
    assert_eq!(brands_star, simple_glyph(&fonts[1], '\u{f005}'));
    assert_eq!(
        simple_glyph(&packed, '\u{e002}'),
        simple_glyph(&fonts[1], '\u{f1a0}')
    );
}

#[test]
fn same_source_glyph_is_stored_once() {
    let bytes = SOLID_FONT.to_bytes();
    let fonts = [Font::new(&bytes).unwrap()];
    let mut pack = GlyphPack::new(&fonts, 0).unwrap();
    pack.push_glyph(0, '\u{f007}', '\u{e000}').unwrap();
    pack.push_glyph(0, '\u{f007}', '\u{e001}').unwrap();
    assert_eq!(pack.glyph_count(), 2);

    let ttf = pack.to_truetype();
    let packed = Font::new(&ttf).unwrap();
    assert_eq!(
        packed.map_char('\u{e000}').unwrap(),
        packed.map_char('\u{e001}').unwrap()
    );
}

#[test]
fn composite_glyph_components_are_remapped() {
    let bytes = SOLID_FONT.to_bytes();
    let fonts = [Font::new(&bytes).unwrap()];
    let mut pack = GlyphPack::new(&fonts, 0).unwrap();
    pack.push_glyph(0, '\u{f005}', '\u{e000}').unwrap();
    // References `\u{f015}` (glyph #1 in the source), which is not packed explicitly.
    pack.push_glyph(0, '\u{f0e0}', '\u{e001}').unwrap();
    assert_eq!(pack.glyph_count(), 4);

    let ttf = pack.to_truetype();
    let packed = Font::new(&ttf).unwrap();
    let composite_idx = packed.map_char('\u{e001}').unwrap();
    let mut composite = packed.glyph(composite_idx).unwrap().inner;
    let components: Vec<_> = composite.component_indices_mut().map(|idx| *idx).collect();
    assert_eq!(components.len(), 1);
    let component_idx = components[0];
    assert_ne!(component_idx, 1);
    assert!(component_idx < packed.glyph_count());

    let Glyph::Simple(component) = packed.glyph(component_idx).unwrap().inner else {
        panic!("component is not a simple glyph");
    };
    assert_eq!(component, simple_glyph(&fonts[0], '\u{f015}'));
}

#[test]
fn packing_errors() {
    let bytes = SOLID_FONT.to_bytes();
    let fonts = [Font::new(&bytes).unwrap()];
    let mut pack = GlyphPack::new(&fonts, 0).unwrap();

    let err = pack.push_glyph(0, '\u{f1a0}', '\u{e000}').unwrap_err();
    assert!(
        matches!(err, PackError::MissingGlyph { source: 0, ch: '\u{f1a0}' }),
        "{err:?}"
    );
    let err = pack.push_glyph(1, '\u{f015}', '\u{e000}').unwrap_err();
    assert!(matches!(err, PackError::UnknownSource(1)), "{err:?}");

    pack.push_glyph(0, '\u{f015}', '\u{e000}').unwrap();
    let err = pack.push_glyph(0, '\u{f007}', '\u{e000}').unwrap_err();
    assert!(matches!(err, PackError::DuplicateChar('\u{e000}')), "{err:?}");

    let err = GlyphPack::new(&fonts, 3).unwrap_err();
    assert!(matches!(err, PackError::UnknownSource(3)), "{err:?}");
}

#[test]
fn reading_non_truetype_data() {
    let mut bytes = SOLID_FONT.to_bytes();
    bytes[..4].copy_from_slice(b"wOF2");
    let err = Font::new(&bytes).unwrap_err();
    assert!(err.to_string().contains("version"), "{err}");

    let err = Font::new(&[0, 1]).unwrap_err();
    assert_eq!(err.offset(), 0);
}

#[test_casing(4, Product((FONTS, PACKED_CHARS)))]
fn packed_fonts_are_valid(font: TestFont, chars: PackedChars) {
    let bytes = font.to_bytes();
    let fonts = [Font::new(&bytes).unwrap()];
    let pack = chars.pack(&fonts, 0);
    let ttf = pack.to_truetype();
    let woff2 = pack.to_woff2();
    assert!(woff2.starts_with(b"wOF2"));

    let packed = Font::new(&ttf).unwrap();
    assert_eq!(usize::from(packed.glyph_count()), pack.glyph_count());
    for new_char in pack.chars() {
        assert!(packed.contains_char(new_char));
    }
    for &source_char in chars.0 {
        assert!(!packed.contains_char(source_char));
    }

    let ttf_file = ReadScope::new(&ttf).read::<FontData>().unwrap();
    let ttf_provider = ttf_file.table_provider(0).unwrap();
    let woff2_file = ReadScope::new(&woff2).read::<FontData>().unwrap();
    let woff2_provider = woff2_file.table_provider(0).unwrap();
    for tag in [TableTag::CMAP, TableTag::GLYF, TableTag::LOCA, TableTag::HMTX] {
        let tag = u32::from_be_bytes(*tag.as_bytes());
        assert_eq!(
            ttf_provider.read_table_data(tag).unwrap(),
            woff2_provider.read_table_data(tag).unwrap()
        );
    }

    let sanitizer = OpenTypeSanitizer::get();
    sanitizer.validate(&ttf);
    sanitizer.validate(&woff2);
}
