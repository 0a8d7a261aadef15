//! Shrinking icon webfonts (e.g., Font Awesome) to the icons actually used by a static site.
//!
//! A minification pass takes a source stylesheet linked from the site markup and:
//!
//! 1. Splits the stylesheet into [rules](css::Rule), builds the table mapping icon classes
//!    to their codepoints, and [associates](font_face::FontFaces::associate) `@font-face` rules
//!    with the variant classes selecting them (e.g., `.fab` for brand icons).
//! 2. [Crawls](icon::CrawlResult::crawl) site files for icon class combinations
//!    like `fa fa-home`.
//! 3. [Remaps](remap::Remapper) used icons to a dense codepoint range in the Private Use Area,
//!    packing their glyphs from all variant fonts into a single font.
//! 4. [Synthesizes](synth::Synthesizer) a stylesheet for the packed font and rewrites
//!    stylesheet links in the site markup.
//!
//! [`Pipeline`] runs passes for all source stylesheets.
//!
//! # Examples
//!
//! ```no_run
//! use iconsubset::{Config, Pipeline};
//!
//! # async fn test_wrapper() -> Result<(), iconsubset::Error> {
//! let config = Config {
//!     root: "public".into(),
//!     ..Config::default()
//! };
//! let summary = Pipeline::new(config)?.run().await?;
//! for report in &summary.reports {
//!     println!("{report}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod css;
mod errors;
pub mod fetch;
pub mod font_face;
pub mod icon;
pub mod pass;
pub mod remap;
pub mod site;
pub mod store;
pub mod synth;
#[cfg(test)]
pub(crate) mod tests;

pub use crate::{
    config::{Config, FontFormat},
    errors::Error,
    pass::{Pipeline, Report, Summary},
    remap::AmbiguousVariant,
};
