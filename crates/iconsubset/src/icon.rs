//! Crawling site files for icon class combinations.

use std::{
    collections::BTreeSet,
    fmt,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use regex::Regex;

use crate::errors::Error;

/// Icon used on the site: an icon class together with modifier classes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Icon {
    /// Icon class, e.g. `fa-home`.
    pub name: String,
    /// Other classes in the combination, e.g. `fa` or `fa-2x`.
    pub modifiers: BTreeSet<String>,
}

impl fmt::Display for Icon {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, ".{}", self.name)?;
        for modifier in &self.modifiers {
            write!(formatter, ".{modifier}")?;
        }
        Ok(())
    }
}

impl Icon {
    /// Classifies a class combination. Returns `Ok(None)` if the combination contains
    /// no icon classes.
    ///
    /// # Errors
    ///
    /// Returns the names of icon classes if there are several of them.
    pub fn parse<'a>(
        classes: &[&'a str],
        is_icon: impl Fn(&str) -> bool,
    ) -> Result<Option<Self>, Vec<&'a str>> {
        let names: Vec<_> = classes.iter().copied().filter(|&class| is_icon(class)).collect();
        match names.as_slice() {
            [] => Ok(None),
            [name] => Ok(Some(Self {
                name: (*name).to_owned(),
                modifiers: classes
                    .iter()
                    .filter(|&class| class != name)
                    .map(|&class| class.to_owned())
                    .collect(),
            })),
            _ => Err(names),
        }
    }

    /// Returns a copy of this icon with an additional modifier.
    pub fn with_modifier(&self, class: &str) -> Self {
        let mut derived = self.clone();
        derived.modifiers.insert(class.to_owned());
        derived
    }

    /// Returns the selector matching this icon, e.g. `.fa-home.fa`.
    pub fn selector(&self) -> String {
        self.to_string()
    }
}

/// Infers the common prefix of icon classes (e.g., `fa-`) from a sample of classes.
pub fn infer_prefix<'a>(classes: impl ExactSizeIterator<Item = &'a str> + Clone) -> String {
    let len = classes.len();
    if len == 0 {
        return String::new();
    }

    let mut sample = (0..4).map(|i| i * len / 4).filter_map(|idx| classes.clone().nth(idx));
    let Some(first) = sample.next() else {
        return String::new();
    };
    let mut prefix_len = first.len();
    for class in sample {
        prefix_len = first
            .char_indices()
            .zip(class.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map_or(0, |((pos, ch), _)| pos + ch.len_utf8())
            .min(prefix_len);
    }
    first[..prefix_len].to_owned()
}

/// Sorts classes in a whitespace-separated combination, so that combinations
/// differing only in class order are equal.
pub fn normalize(combination: &str) -> String {
    let mut classes: Vec<_> = combination.split_whitespace().collect();
    classes.sort_unstable();
    classes.dedup();
    classes.join(" ")
}

/// Finds icon class combinations in text files.
#[derive(Debug)]
pub struct Crawler {
    regex: Regex,
}

impl Crawler {
    /// Creates a crawler for classes starting with `prefix` and `extra_classes`.
    /// If `prefix` is empty, only `known_classes` are matched. If `prefix` is itself
    /// a known class (e.g., the stylesheet declares a single icon), it is matched as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting regex is too large.
    pub fn new<'a>(
        prefix: &str,
        extra_classes: &[String],
        mut known_classes: impl Iterator<Item = &'a str>,
    ) -> Result<Self, Error> {
        let mut alternatives: Vec<_> = extra_classes
            .iter()
            .map(|class| regex::escape(class))
            .collect();
        if prefix.is_empty() {
            alternatives.extend(known_classes.map(regex::escape));
        } else {
            alternatives.push(format!("{}[a-z0-9-]+", regex::escape(prefix)));
            if known_classes.any(|class| class == prefix) {
                alternatives.push(regex::escape(prefix));
            }
        }
        // Prefer longer alternatives, e.g. `fab` over `fa`.
        alternatives.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let token = format!("(?:{})", alternatives.join("|"));
        let pattern = format!(
            r"(?:^|[^A-Za-z0-9_-])({token}(?:\s+{token})*)(?:$|[^A-Za-z0-9_-])"
        );
        Ok(Self {
            regex: Regex::new(&pattern)?,
        })
    }

    /// Returns raw class combinations found in `text`.
    pub fn scan<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut combinations = vec![];
        let mut start = 0;
        while let Some(combination) = self
            .regex
            .captures_at(text, start)
            .and_then(|captures| captures.get(1))
        {
            combinations.push(combination.as_str());
            // The trailing boundary char may start the next match.
            start = combination.end();
        }
        combinations
    }
}

/// Icons and classes found on the site.
#[derive(Debug, Default)]
pub struct CrawlResult {
    /// Deduplicated icons in the order of their first occurrence.
    pub icons: Vec<Icon>,
    /// All classes in crawled combinations, including ones without an icon.
    pub used_classes: BTreeSet<String>,
}

impl CrawlResult {
    /// Crawls `files` (pairs of a path and file contents).
    ///
    /// # Errors
    ///
    /// Returns an error if a combination contains several icon classes.
    pub fn crawl<'a>(
        crawler: &Crawler,
        files: impl IntoIterator<Item = (&'a Path, &'a str)>,
        is_icon: impl Fn(&str) -> bool,
    ) -> Result<Self, Error> {
        let mut combinations = IndexMap::<String, PathBuf>::new();
        for (path, text) in files {
            for raw in crawler.scan(text) {
                combinations
                    .entry(normalize(raw))
                    .or_insert_with(|| path.to_owned());
            }
        }

        let mut result = Self::default();
        for (combination, path) in &combinations {
            let classes: Vec<_> = combination.split(' ').collect();
            result
                .used_classes
                .extend(classes.iter().map(|&class| class.to_owned()));
            match Icon::parse(&classes, &is_icon) {
                Ok(Some(icon)) => result.icons.push(icon),
                Ok(None) => {
                    tracing::debug!(combination = %combination, path = %path.display(), "no icon classes");
                }
                Err(_) => {
                    return Err(Error::AmbiguousIcon {
                        path: path.clone(),
                        classes: combination.clone(),
                    });
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use test_casing::test_casing;

    use super::*;

    fn crawler() -> Crawler {
        let extra = ["fa", "fas", "fab"].map(String::from);
        Crawler::new("fa-", &extra, std::iter::empty()).unwrap()
    }

    #[test]
    fn inferring_prefix() {
        let classes = ["fa-500px", "fa-address-book", "fa-home", "fa-user", "fa-zoom"];
        assert_eq!(infer_prefix(classes.iter().copied()), "fa-");

        let classes = ["icon-a", "icon-b"];
        assert_eq!(infer_prefix(classes.iter().copied()), "icon-");
        assert_eq!(infer_prefix(["x"].into_iter()), "x");
        assert_eq!(infer_prefix(["abc", "xyz"].into_iter()), "");
        assert_eq!(infer_prefix([].into_iter()), "");
    }

    #[test_casing(5, [
        (r#"<i class="fa fa-home"></i>"#, &["fa fa-home"] as &[_]),
        (r#"<i class="fas  fa-user fa-2x extra"></i>"#, &["fas  fa-user fa-2x"] as &[_]),
        (
            "el.className = 'fab fa-github';\nspan('fa-star')",
            &["fab fa-github", "fa-star"] as &[_],
        ),
        ("my-fa-home not-fa fa-home_x", &[] as &[_]),
        ("fa-home", &["fa-home"] as &[_]),
    ])]
    fn scanning_text(text: &str, expected: &[&str]) {
        assert_eq!(crawler().scan(text), expected);
    }

    #[test]
    fn prefix_equal_to_icon_class_is_crawled() {
        let known = ["fa-home"];
        let prefix = infer_prefix(known.iter().copied());
        assert_eq!(prefix, "fa-home");

        let extra = ["fa".to_owned()];
        let crawler = Crawler::new(&prefix, &extra, known.iter().copied()).unwrap();
        assert_eq!(
            crawler.scan(r#"<i class="fa fa-home"></i> <i class="fa fa-home-alt">"#),
            ["fa fa-home", "fa fa-home-alt"]
        );

        let files = [(Path::new("index.html"), r#"<i class="fa fa-home"></i>"#)];
        let result = CrawlResult::crawl(&crawler, files, |class| known.contains(&class)).unwrap();
        let selectors: Vec<_> = result.icons.iter().map(Icon::selector).collect();
        assert_eq!(selectors, [".fa-home.fa"]);
    }

    #[test]
    fn normalization_is_order_independent() {
        assert_eq!(normalize("fa-home fa"), normalize("fa  fa-home"));
        assert_eq!(normalize("fab fa-github fa-2x"), "fa-2x fa-github fab");
    }

    #[test]
    fn classifying_combinations() {
        let is_icon = |class: &str| matches!(class, "fa-home" | "fa-user");

        let icon = Icon::parse(&["fa", "fa-home", "fa-2x"], is_icon).unwrap().unwrap();
        assert_eq!(icon.name, "fa-home");
        assert_eq!(icon.selector(), ".fa-home.fa.fa-2x");
        assert_eq!(icon.with_modifier("fab").selector(), ".fa-home.fa.fa-2x.fab");

        assert_eq!(Icon::parse(&["fa", "fa-spin"], is_icon), Ok(None));
        assert_eq!(
            Icon::parse(&["fa-home", "fa-user"], is_icon),
            Err(vec!["fa-home", "fa-user"])
        );
    }

    #[test]
    fn crawling_deduplicates_icons() {
        let files = [
            (Path::new("a.html"), r#"<i class="fa fa-home"></i><i class="fa-home fa"></i>"#),
            (Path::new("b.js"), "icon('fa fa-spin'); icon('fa-user fa')"),
        ];
        let is_icon = |class: &str| matches!(class, "fa-home" | "fa-user");
        let result = CrawlResult::crawl(&crawler(), files, is_icon).unwrap();

        let selectors: Vec<_> = result.icons.iter().map(Icon::selector).collect();
        assert_eq!(selectors, [".fa-home.fa", ".fa-user.fa"]);
        let used: Vec<_> = result.used_classes.iter().map(String::as_str).collect();
        assert_eq!(used, ["fa", "fa-home", "fa-spin", "fa-user"]);
    }

    #[test]
    fn ambiguous_markup_is_an_error() {
        let files = [(Path::new("page.html"), r#"<i class="fa-home fa-user"></i>"#)];
        let is_icon = |class: &str| matches!(class, "fa-home" | "fa-user");
        let err = CrawlResult::crawl(&crawler(), files, is_icon).unwrap_err();
        assert!(
            matches!(&err, Error::AmbiguousIcon { path, classes }
                if path == Path::new("page.html") && classes == "fa-home fa-user"),
            "{err:?}"
        );
    }
}
