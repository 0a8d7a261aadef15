//! Packing glyphs of TrueType fonts under new codepoints.
//!
//! This crate reads TrueType fonts (OpenType fonts with `glyf` outlines), copies selected glyphs
//! from one or more of them into a [`GlyphPack`] under new chars (e.g., a dense range
//! in the Unicode Private Use Area), and writes the result as a TrueType or WOFF2 font.
//!
//! # Examples
//!
//! ```no_run
//! use glyph_pack::{Font, GlyphPack};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let solid = std::fs::read("fa-solid-900.ttf")?;
//! let brands = std::fs::read("fa-brands-400.ttf")?;
//! let fonts = [Font::new(&solid)?, Font::new(&brands)?];
//!
//! let mut pack = GlyphPack::new(&fonts, 0)?;
//! pack.push_glyph(0, '\u{f015}', '\u{e000}')?; // house
//! pack.push_glyph(1, '\u{f1a0}', '\u{e001}')?; // google
//! let woff2: Vec<u8> = pack.to_woff2();
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/glyph-pack/0.1.0")]

mod errors;
mod font;
mod pack;
#[cfg(test)]
pub(crate) mod tests;
mod write;

pub use crate::{
    errors::{MapError, PackError, ParseError, ParseErrorKind},
    font::{Font, TableTag},
    pack::GlyphPack,
};

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
