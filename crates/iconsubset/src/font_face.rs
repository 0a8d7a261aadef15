//! Associating `@font-face` rules with the variant classes selecting them.

use std::{fmt, ops, path::Path};

use indexmap::{IndexMap, IndexSet};

use crate::{
    css::{first_family, src_urls, FontShorthand, FontStyle, FontWeight, Rule},
    fetch::Location,
};

/// Index of a font face in [`FontFaces`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(pub(crate) usize);

impl fmt::Display for FaceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// Font face triple used to match classes with `@font-face` rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FaceKey {
    /// Font family.
    pub family: String,
    /// Font style.
    pub style: FontStyle,
    /// Font weight.
    pub weight: FontWeight,
}

impl fmt::Display for FaceKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "\"{}\" {} {}",
            self.family, self.style, self.weight
        )
    }
}

/// Font face declared in a stylesheet.
#[derive(Debug, Clone)]
pub struct FontFaceDescriptor {
    /// Family, style and weight of the face.
    pub key: FaceKey,
    /// Sources in the declaration order.
    pub sources: Vec<Location>,
    /// Classes selecting this face.
    pub classes: IndexSet<String>,
}

/// Family, style and weight accumulated for a class that may select a font face.
#[derive(Debug, Default)]
struct VariantCandidate {
    family: Option<String>,
    style: Option<FontStyle>,
    weight: Option<FontWeight>,
}

impl VariantCandidate {
    fn update(&mut self, rule: &Rule) {
        for (property, value) in rule.declarations() {
            match property.as_str() {
                "font-family" => self.family = first_family(value),
                "font-style" => self.style = FontStyle::parse(value),
                "font-weight" => self.weight = FontWeight::parse(value),
                "font" => {
                    if let Some(font) = FontShorthand::parse(value) {
                        self.family = Some(font.family);
                        self.style = Some(font.style);
                        self.weight = Some(font.weight);
                    }
                }
                _ => { /* unrelated property */ }
            }
        }
    }

    /// Style and weight not set by any rule take their initial values.
    fn matches(&self, key: &FaceKey) -> bool {
        self.family.as_ref() == Some(&key.family)
            && self.style.unwrap_or_default() == key.style
            && self.weight.unwrap_or_default() == key.weight
    }
}

fn declares_family(rule: &Rule) -> bool {
    rule.declarations()
        .iter()
        .any(|(property, value)| match property.as_str() {
            "font-family" => true,
            "font" => FontShorthand::parse(value).is_some(),
            _ => false,
        })
}

/// Arena of font faces declared in a stylesheet.
#[derive(Debug, Default)]
pub struct FontFaces {
    faces: Vec<FontFaceDescriptor>,
}

impl ops::Index<FaceId> for FontFaces {
    type Output = FontFaceDescriptor;

    fn index(&self, index: FaceId) -> &Self::Output {
        &self.faces[index.0]
    }
}

impl FontFaces {
    /// Reads `@font-face` rules and associates them with variant classes.
    ///
    /// `stylesheet` is the location of the stylesheet used to resolve font sources.
    pub fn associate(rules: &[Rule], stylesheet: &Location, site_root: &Path) -> Self {
        let mut candidates = IndexMap::<&str, VariantCandidate>::new();
        for rule in rules.iter().filter(|rule| !rule.is_at_rule()) {
            if declares_family(rule) {
                for class in rule.classes() {
                    candidates.entry(class).or_default();
                }
            }
        }

        let mut faces: Vec<_> = rules
            .iter()
            .filter(|rule| rule.is_font_face())
            .filter_map(|rule| Self::parse_font_face(rule, stylesheet, site_root))
            .collect();

        for rule in rules.iter().filter(|rule| !rule.is_at_rule()) {
            for class in rule.classes() {
                if let Some(candidate) = candidates.get_mut(class) {
                    candidate.update(rule);
                }
            }
        }

        for face in &mut faces {
            candidates.retain(|&class, candidate| {
                if candidate.matches(&face.key) {
                    face.classes.insert(class.to_owned());
                    false
                } else {
                    true
                }
            });
        }
        for (class, candidate) in &candidates {
            tracing::debug!(class, ?candidate, "class does not select a declared font face");
        }

        Self { faces }
    }

    fn parse_font_face(
        rule: &Rule,
        stylesheet: &Location,
        site_root: &Path,
    ) -> Option<FontFaceDescriptor> {
        let (mut family, mut style, mut weight) = (None, None, None);
        let mut sources = vec![];
        for (property, value) in rule.declarations() {
            match property.as_str() {
                "font-family" => family = first_family(value),
                "font-style" => style = FontStyle::parse(value),
                "font-weight" => weight = FontWeight::parse(value),
                "src" => {
                    for url in src_urls(value) {
                        if url.starts_with("data:") {
                            continue;
                        }
                        match stylesheet.resolve(&url, site_root) {
                            Ok(location) => sources.push(location),
                            Err(err) => {
                                tracing::warn!(url = %url, %err, "skipping unresolvable font source");
                            }
                        }
                    }
                }
                _ => { /* unrelated descriptor */ }
            }
        }

        let (Some(family), Some(style), Some(weight)) = (family, style, weight) else {
            tracing::warn!(
                body = %rule.body,
                "skipping @font-face rule without family, style or weight"
            );
            return None;
        };
        Some(FontFaceDescriptor {
            key: FaceKey {
                family,
                style,
                weight,
            },
            sources,
            classes: IndexSet::new(),
        })
    }

    /// Returns the total number of declared faces, including inactive ones.
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Checks whether no faces are declared.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Iterates over faces selected by at least one class, in the declaration order.
    pub fn active(&self) -> impl Iterator<Item = (FaceId, &FontFaceDescriptor)> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, face)| !face.classes.is_empty())
            .map(|(idx, face)| (FaceId(idx), face))
    }

    /// Returns IDs of active faces in the declaration order.
    pub fn active_ids(&self) -> Vec<FaceId> {
        self.active().map(|(id, _)| id).collect()
    }

    /// Returns all classes associated with active faces.
    pub fn variant_classes(&self) -> IndexSet<&str> {
        self.active()
            .flat_map(|(_, face)| face.classes.iter().map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::css::parse_rules;

    const FA5_CSS: &str = r#"
        .fa, .fab, .fas, .far { display: inline-block; font-style: normal; }
        @font-face {
            font-family: "Font Awesome 5 Brands";
            font-style: normal;
            font-weight: 400;
            src: url("../webfonts/fa-brands-400.eot");
            src: url("../webfonts/fa-brands-400.woff2") format("woff2"),
                url("../webfonts/fa-brands-400.ttf") format("truetype");
        }
        .fab { font-family: "Font Awesome 5 Brands"; font-weight: 400; }
        @font-face {
            font-family: "Font Awesome 5 Free";
            font-style: normal;
            font-weight: 400;
            src: url("../webfonts/fa-regular-400.ttf");
        }
        .far { font-family: "Font Awesome 5 Free"; font-weight: 400; }
        @font-face {
            font-family: "Font Awesome 5 Free";
            font-style: normal;
            font-weight: 900;
            src: url("../webfonts/fa-solid-900.ttf");
        }
        .fa, .fas { font-family: "Font Awesome 5 Free"; }
        .fa, .fas { font-weight: 900; }
        @font-face { font-family: "Broken"; src: url(broken.ttf); }
    "#;

    fn associate(css: &str) -> FontFaces {
        let stylesheet = Location::Local(PathBuf::from("/site/fa/css/all.css"));
        FontFaces::associate(&parse_rules(css), &stylesheet, Path::new("/site"))
    }

    fn classes(faces: &FontFaces, idx: usize) -> Vec<&str> {
        faces[FaceId(idx)].classes.iter().map(String::as_str).collect()
    }

    #[test]
    fn associating_font_awesome_faces() {
        let faces = associate(FA5_CSS);

        assert_eq!(faces.len(), 3);
        assert_eq!(classes(&faces, 0), ["fab"]);
        assert_eq!(classes(&faces, 1), ["far"]);
        assert_eq!(classes(&faces, 2), ["fa", "fas"]);
        assert_eq!(faces.active_ids(), [FaceId(0), FaceId(1), FaceId(2)]);
        assert_eq!(
            faces.variant_classes().into_iter().collect::<Vec<_>>(),
            ["fab", "far", "fa", "fas"]
        );

        let brands = &faces[FaceId(0)];
        assert_eq!(brands.key.to_string(), "\"Font Awesome 5 Brands\" normal 400");
        let sources: Vec<_> = brands.sources.iter().map(ToString::to_string).collect();
        assert_eq!(
            sources,
            [
                "/site/fa/webfonts/fa-brands-400.eot",
                "/site/fa/webfonts/fa-brands-400.woff2",
                "/site/fa/webfonts/fa-brands-400.ttf",
            ]
        );
    }

    #[test]
    fn later_rules_override_earlier_ones() {
        let faces = associate(
            r#"
            @font-face { font-family: X; font-style: normal; font-weight: bold; src: url(x.ttf); }
            .icon { font-family: X; font-weight: 400; }
            .icon-bold { font-family: Y; }
            .icon-bold { font: 700 1em/1 "X", sans-serif; }
            .icon { font-weight: 700; }
            "#,
        );
        assert_eq!(faces.len(), 1);
        assert_eq!(classes(&faces, 0), ["icon", "icon-bold"]);
    }

    #[test]
    fn faces_without_classes_are_inactive() {
        let faces = associate(
            r#"
            @font-face { font-family: X; font-style: normal; font-weight: 400; src: url(x.ttf); }
            @font-face { font-family: X; font-style: italic; font-weight: 400; src: url(xi.ttf); }
            .x { font-family: X; }
            "#,
        );
        assert_eq!(faces.len(), 2);
        assert_eq!(faces.active_ids(), [FaceId(0)]);
    }
}
