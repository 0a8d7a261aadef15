//! Minification passes over source stylesheets.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use glyph_pack::Font;
use indexmap::IndexMap;
use regex::Regex;

use crate::{
    config::{Config, FontFormat},
    css,
    errors::Error,
    fetch::{normalize_path, Fetcher, Location},
    font_face::{FaceId, FontFaces},
    icon::{infer_prefix, CrawlResult, Crawler},
    remap::{CodepointAllocator, Remapper},
    site::{content_hash, relative_url, LinkScanner, SiteIndex},
    store::PackStore,
    synth::{minify, FontFile, Synthesizer},
};

/// Font files that cannot be read by the font codec.
const SKIPPED_FONT_EXTENSIONS: &[&str] = &["eot", "svg", "woff", "woff2"];

/// Stylesheet linked from site markup.
#[derive(Debug)]
pub struct SourceStylesheet {
    /// Location of the stylesheet.
    pub location: Location,
    /// Markup files linking to the stylesheet, together with the href used in the link.
    pub links: Vec<(PathBuf, String)>,
}

/// Outcome of a successful pass.
#[derive(Debug)]
pub struct Report {
    /// Source stylesheet.
    pub stylesheet: Location,
    /// Path to the generated stylesheet.
    pub css_path: PathBuf,
    /// Paths to the generated fonts.
    pub font_paths: Vec<PathBuf>,
    /// Number of distinct icons used on the site.
    pub icon_count: usize,
    /// Number of glyphs in the generated font.
    pub glyph_count: usize,
    /// Size of the source stylesheet in bytes.
    pub css_before: usize,
    /// Size of the generated stylesheet in bytes.
    pub css_after: usize,
    /// Total size of the source fonts in bytes.
    pub fonts_before: usize,
    /// Total size of the generated fonts in bytes.
    pub fonts_after: usize,
}

impl fmt::Display for Report {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} -> {}: {} icons in {} glyphs; stylesheet {} -> {} bytes, fonts {} -> {} bytes",
            self.stylesheet,
            self.css_path.display(),
            self.icon_count,
            self.glyph_count,
            self.css_before,
            self.css_after,
            self.fonts_before,
            self.fonts_after
        )
    }
}

/// Failed pass.
#[derive(Debug)]
pub struct Failure {
    /// Source stylesheet.
    pub stylesheet: Location,
    /// Error aborting the pass.
    pub error: Error,
}

/// Outcome of a run over all source stylesheets.
#[derive(Debug, Default)]
pub struct Summary {
    /// Reports for successful passes.
    pub reports: Vec<Report>,
    /// Failed passes.
    pub failures: Vec<Failure>,
}

impl Summary {
    /// Checks whether all passes succeeded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), Error> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(Error::io(dir))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(Error::io(path))
}

/// Runs minification passes for all stylesheets linked from a site.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    patterns: Vec<Regex>,
    generated_css: Regex,
    links: LinkScanner,
    fetcher: Fetcher,
}

impl Pipeline {
    /// Creates a pipeline. The site root is canonicalized.
    ///
    /// # Errors
    ///
    /// Returns an error if the site root does not exist, or the configuration is invalid.
    pub fn new(mut config: Config) -> Result<Self, Error> {
        config.root = std::fs::canonicalize(&config.root).map_err(Error::io(&config.root))?;
        config.codepoint_base()?;
        let patterns = config.compile_patterns()?;
        let generated_css = format!(
            r"^{}(-[0-9]+)?(\.[0-9a-f]{{8}})?\.css$",
            regex::escape(&config.output_stem)
        );
        let generated_css = Regex::new(&generated_css)?;
        let fetcher = Fetcher::new(Some(config.cache_dir()));
        Ok(Self {
            config,
            patterns,
            generated_css,
            links: LinkScanner::new()?,
            fetcher,
        })
    }

    /// Returns the configuration with the canonicalized site root.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Checks whether `location` is a stylesheet generated by a previous run,
    /// e.g. `css/icons.css` or `css/icons-2.0123abcd.css`.
    fn is_generated(&self, location: &Location) -> bool {
        let Location::Local(path) = location else {
            return false;
        };
        let css_dir = normalize_path(&self.config.root.join(&self.config.css_dir));
        path.parent() == Some(css_dir.as_path())
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| self.generated_css.is_match(name))
    }

    /// Finds source stylesheets linked from site markup. Stylesheets generated by previous runs
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a markup file cannot be read.
    pub async fn discover(&self, index: &SiteIndex) -> Result<Vec<SourceStylesheet>, Error> {
        let mut stylesheets = IndexMap::<Location, Vec<(PathBuf, String)>>::new();
        for path in index.files(&self.config.link_extensions) {
            let markup = Location::Local(path.to_owned());
            let text = self.fetcher.fetch_text(&markup).await?;
            for href in self.links.find_stylesheet_links(&text) {
                if !self.patterns.iter().any(|pattern| pattern.is_match(href)) {
                    continue;
                }
                match markup.resolve(href, &self.config.root) {
                    Ok(location) if self.is_generated(&location) => {
                        tracing::debug!(%location, "skipping generated stylesheet");
                    }
                    Ok(location) => {
                        stylesheets
                            .entry(location)
                            .or_default()
                            .push((path.to_owned(), href.to_owned()));
                    }
                    Err(err) => {
                        tracing::warn!(
                            path = %path.display(),
                            href,
                            error = &err as &dyn std::error::Error,
                            "skipping unresolvable stylesheet link"
                        );
                    }
                }
            }
        }

        Ok(stylesheets
            .into_iter()
            .map(|(location, links)| SourceStylesheet { location, links })
            .collect())
    }

    /// Runs passes for all source stylesheets sequentially. Failed passes do not affect
    /// other passes and are collected in the returned summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the site cannot be indexed or its markup cannot be read.
    pub async fn run(&self) -> Result<Summary, Error> {
        let config = &self.config;
        let index = SiteIndex::scan(&config.root, &[config.cache_dir()])?;
        let stylesheets = self.discover(&index).await?;
        if stylesheets.is_empty() {
            tracing::info!(root = %config.root.display(), "no source stylesheets found");
        }

        let mut shared_allocator = if config.share_codepoints {
            Some(CodepointAllocator::new(config.codepoint_base()?))
        } else {
            None
        };
        let mut summary = Summary::default();
        for (i, stylesheet) in stylesheets.iter().enumerate() {
            let stem = if i == 0 {
                config.output_stem.clone()
            } else {
                format!("{}-{}", config.output_stem, i + 1)
            };
            tracing::info!(stylesheet = %stylesheet.location, stem = %stem, "starting pass");

            match self
                .process(&index, stylesheet, &stem, shared_allocator.as_mut())
                .await
            {
                Ok(Some(report)) => {
                    tracing::info!(%report, "finished pass");
                    summary.reports.push(report);
                }
                Ok(None) => { /* nothing to do */ }
                Err(error) => {
                    tracing::error!(
                        stylesheet = %stylesheet.location,
                        error = &error as &dyn std::error::Error,
                        "pass failed"
                    );
                    summary.failures.push(Failure {
                        stylesheet: stylesheet.location.clone(),
                        error,
                    });
                }
            }
        }
        Ok(summary)
    }

    fn file_name(&self, stem: &str, extension: &str, contents: &[u8]) -> String {
        if self.config.content_hash {
            format!("{stem}.{}.{extension}", content_hash(contents))
        } else {
            format!("{stem}.{extension}")
        }
    }

    /// Loads the first readable TrueType source of each face.
    async fn load_fonts(
        &self,
        faces: &FontFaces,
        active: &[FaceId],
    ) -> Result<Vec<(Location, Vec<u8>)>, Error> {
        let mut loaded_fonts = Vec::with_capacity(active.len());
        for &face_id in active {
            let face = &faces[face_id];
            let mut loaded = None;
            let mut parse_error = None;
            for location in &face.sources {
                let extension = location.extension();
                if extension.is_some_and(|ext| SKIPPED_FONT_EXTENSIONS.contains(&ext.as_str())) {
                    tracing::debug!(face = %face.key, font = %location, "skipping font source");
                    continue;
                }

                let bytes = self.fetcher.fetch(location).await?;
                match Font::new(&bytes).map(drop) {
                    Ok(()) => {
                        loaded = Some((location.clone(), bytes));
                        break;
                    }
                    Err(source) => {
                        tracing::warn!(
                            face = %face.key,
                            font = %location,
                            error = &source as &dyn std::error::Error,
                            "font source is not a TrueType font"
                        );
                        parse_error = Some(Error::FontParse {
                            location: location.to_string(),
                            source,
                        });
                    }
                }
            }

            let (location, bytes) = match (loaded, parse_error) {
                (Some(loaded), _) => loaded,
                (None, Some(err)) => return Err(err),
                (None, None) => {
                    return Err(Error::NoFontSource {
                        face: face.key.to_string(),
                    })
                }
            };
            tracing::debug!(face = %face.key, font = %location, len = bytes.len(), "loaded font");
            loaded_fonts.push((location, bytes));
        }
        Ok(loaded_fonts)
    }

    async fn process(
        &self,
        index: &SiteIndex,
        stylesheet: &SourceStylesheet,
        stem: &str,
        shared_allocator: Option<&mut CodepointAllocator>,
    ) -> Result<Option<Report>, Error> {
        let config = &self.config;
        let text = self.fetcher.fetch_text(&stylesheet.location).await?;
        let rules = css::parse_rules(&text);
        let codepoints = css::class_codepoints(&rules);
        let faces = FontFaces::associate(&rules, &stylesheet.location, &config.root);
        let active = faces.active_ids();
        if active.is_empty() || codepoints.is_empty() {
            tracing::warn!(
                stylesheet = %stylesheet.location,
                faces = faces.len(),
                codepoints = codepoints.len(),
                "stylesheet has no icon font faces or icon codepoints"
            );
            return Ok(None);
        }

        let prefix = infer_prefix(codepoints.keys().map(String::as_str));
        tracing::debug!(prefix = %prefix, icon_classes = codepoints.len(), "inferred icon class prefix");
        let crawler = Crawler::new(
            &prefix,
            &config.extra_classes,
            codepoints.keys().map(String::as_str),
        )?;
        let mut files = vec![];
        for path in index.files(&config.extensions) {
            let text = self
                .fetcher
                .fetch_text(&Location::Local(path.to_owned()))
                .await?;
            files.push((path, text));
        }
        let crawl = CrawlResult::crawl(
            &crawler,
            files.iter().map(|(path, text)| (*path, text.as_str())),
            |class| codepoints.contains_key(class),
        )?;
        if crawl.icons.is_empty() {
            tracing::warn!(stylesheet = %stylesheet.location, "no icons are used on the site");
            return Ok(None);
        }

        let font_data = self.load_fonts(&faces, &active).await?;
        let fonts = font_data
            .iter()
            .map(|(location, bytes)| {
                Font::new(bytes).map_err(|source| Error::FontParse {
                    location: location.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut store = PackStore::new(&active, &fonts)?;

        let mut own_allocator;
        let allocator = if let Some(allocator) = shared_allocator {
            allocator
        } else {
            own_allocator = CodepointAllocator::new(config.codepoint_base()?);
            &mut own_allocator
        };
        let mut remapper = Remapper::new(
            &faces,
            &codepoints,
            config.ambiguous_variant,
            allocator,
            &mut store,
        );
        for icon in &crawl.icons {
            remapper.add_icon(icon)?;
        }
        let remapping = remapper.finish();
        let pack = store.into_pack();
        tracing::info!(
            stylesheet = %stylesheet.location,
            icons = crawl.icons.len(),
            glyphs = pack.glyph_count(),
            "packed glyphs"
        );

        let css_dir = config.root.join(&config.css_dir);
        let font_dir = config.root.join(&config.font_dir);
        let mut font_files = vec![];
        let mut font_paths = vec![];
        let mut fonts_after = 0;
        for format in [FontFormat::Woff2, FontFormat::Truetype] {
            if !config.formats.contains(&format) {
                continue;
            }
            let bytes = match format {
                FontFormat::Woff2 => pack.to_woff2(),
                FontFormat::Truetype => pack.to_truetype(),
            };
            let path = font_dir.join(self.file_name(stem, format.extension(), &bytes));
            write_file(&path, &bytes).await?;
            fonts_after += bytes.len();
            font_files.push(FontFile {
                href: relative_url(&css_dir, &path),
                format,
            });
            font_paths.push(path);
        }

        let synthesizer = Synthesizer {
            family: &config.font_family,
            fonts: &font_files,
            rules: &rules,
            faces: &faces,
            used_classes: &crawl.used_classes,
            selectors: &remapping.selectors,
        };
        let mut css = synthesizer.synthesize();
        if config.minify {
            match minify(&css) {
                Ok(minified) => css = minified,
                Err(err) => {
                    tracing::warn!(
                        error = &err as &dyn std::error::Error,
                        "using unminified stylesheet"
                    );
                }
            }
        }
        let css_path = css_dir.join(self.file_name(stem, "css", css.as_bytes()));
        write_file(&css_path, css.as_bytes()).await?;

        if config.rewrite_links {
            for (markup, href) in &stylesheet.links {
                let markup_dir = markup.parent().unwrap_or(&config.root);
                let new_href = relative_url(markup_dir, &css_path);
                let markup_location = Location::Local(markup.clone());
                let text = self.fetcher.fetch_text(&markup_location).await?;
                if let Some(rewritten) = self.links.rewrite_links(&text, href, &new_href) {
                    write_file(markup, rewritten.as_bytes()).await?;
                    tracing::info!(
                        path = %markup.display(),
                        href = %href,
                        new_href = %new_href,
                        "rewrote stylesheet link"
                    );
                }
            }
        }

        Ok(Some(Report {
            stylesheet: stylesheet.location.clone(),
            css_path,
            font_paths,
            icon_count: crawl.icons.len(),
            glyph_count: remapping.glyph_count(),
            css_before: text.len(),
            css_after: css.len(),
            fonts_before: font_data.iter().map(|(_, bytes)| bytes.len()).sum(),
            fonts_after,
        }))
    }
}
