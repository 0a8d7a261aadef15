//! Generating the stylesheet for the packed font.

use std::collections::BTreeSet;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

use crate::{
    config::FontFormat,
    css::{decode_content, extract_classes_before_only, FontShorthand, Rule},
    errors::Error,
    font_face::FontFaces,
    remap::SelectorGroup,
};

/// Generated font file referenced from the stylesheet.
#[derive(Debug, Clone)]
pub struct FontFile {
    /// URL relative to the stylesheet.
    pub href: String,
    /// Font format.
    pub format: FontFormat,
}

/// Inputs for the generated stylesheet.
#[derive(Debug)]
pub struct Synthesizer<'a> {
    /// Family name of the packed font.
    pub family: &'a str,
    /// Font files in the order they should be listed in `@font-face`.
    pub fonts: &'a [FontFile],
    /// Rules of the source stylesheet.
    pub rules: &'a [Rule],
    /// Font faces of the source stylesheet.
    pub faces: &'a FontFaces,
    /// Classes used on the site.
    pub used_classes: &'a BTreeSet<String>,
    /// Selectors for each packed codepoint.
    pub selectors: &'a SelectorGroup,
}

fn is_icon_content_rule(rule: &Rule) -> bool {
    !extract_classes_before_only(&rule.selector).is_empty()
        && rule.declared("content").and_then(decode_content).is_some()
}

fn write_rule(output: &mut String, selector: &str, body: &str) {
    output.push_str(selector);
    output.push('{');
    output.push_str(body);
    output.push_str("}\n");
}

impl Synthesizer<'_> {
    fn quoted_family(&self) -> String {
        format!("\"{}\"", self.family.replace('"', "\\\""))
    }

    fn write_font_face(&self, output: &mut String) {
        let sources: Vec<_> = self
            .fonts
            .iter()
            .map(|font| format!("url(\"{}\") format(\"{}\")", font.href, font.format.css_name()))
            .collect();
        let body = format!(
            "font-family:{};font-style:normal;font-weight:normal;font-display:block;src:{}",
            self.quoted_family(),
            sources.join(",")
        );
        write_rule(output, "@font-face", &body);
    }

    /// Returns the body of a retained rule, or `None` if the rule should be dropped.
    fn retained_body(&self, rule: &Rule, variant_classes: &BTreeSet<&str>) -> Option<String> {
        let classes = rule.classes();
        if !classes.iter().any(|&class| self.used_classes.contains(class)) {
            return None;
        }
        if !classes.iter().any(|class| variant_classes.contains(class)) {
            return Some(rule.body.clone());
        }

        let mut declarations = vec![];
        for (property, value) in rule.declarations() {
            match property.as_str() {
                "font-family" | "font-style" | "font-weight" => { /* drop */ }
                "font" => {
                    let value = FontShorthand::parse(value).map_or_else(
                        || value.to_owned(),
                        |font| format!("normal normal normal {} {}", font.size, self.quoted_family()),
                    );
                    declarations.push(format!("font:{value}"));
                }
                _ => declarations.push(format!("{property}:{value}")),
            }
        }
        (!declarations.is_empty()).then(|| declarations.join(";"))
    }

    /// Generates the stylesheet.
    pub fn synthesize(&self) -> String {
        let mut output = String::new();
        self.write_font_face(&mut output);

        for rule in self.rules.iter().filter(|rule| rule.selector.starts_with(":root")) {
            write_rule(&mut output, &rule.selector, &rule.body);
        }

        let variant_classes: BTreeSet<_> = self.faces.variant_classes().into_iter().collect();
        let mut animations = BTreeSet::new();
        let retained_rules = self
            .rules
            .iter()
            .filter(|rule| !rule.is_at_rule() && !is_icon_content_rule(rule));
        for rule in retained_rules {
            let Some(body) = self.retained_body(rule, &variant_classes) else {
                continue;
            };
            for (property, value) in crate::css::declarations(&body) {
                if property.ends_with("animation") || property.ends_with("animation-name") {
                    animations.extend(
                        value
                            .split(|ch: char| ch.is_whitespace() || ch == ',')
                            .filter(|token| !token.is_empty())
                            .map(str::to_owned),
                    );
                }
            }
            write_rule(&mut output, &rule.selector, &body);
        }

        let base_selector = self
            .faces
            .variant_classes()
            .into_iter()
            .map(|class| format!(".{class}"))
            .collect::<Vec<_>>()
            .join(",");
        if !base_selector.is_empty() {
            let body = format!(
                "font-family:{};font-style:normal;font-weight:normal",
                self.quoted_family()
            );
            write_rule(&mut output, &base_selector, &body);
        }

        for rule in self.rules {
            if rule
                .keyframes_name()
                .is_some_and(|name| animations.contains(name))
            {
                write_rule(&mut output, &rule.selector, &rule.body);
            }
        }

        for (codepoint, selectors) in self.selectors.iter() {
            let selector = selectors
                .iter()
                .map(|selector| format!("{selector}:before"))
                .collect::<Vec<_>>()
                .join(",");
            let body = format!("content:\"\\{:x}\"", u32::from(codepoint));
            write_rule(&mut output, &selector, &body);
        }
        output
    }
}

/// Minifies CSS.
///
/// # Errors
///
/// Returns an error if the CSS cannot be parsed or printed.
pub fn minify(css: &str) -> Result<String, Error> {
    let minify_error = |message: String| Error::Minify { message };
    let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|err| minify_error(err.to_string()))?;
    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|err| minify_error(err.to_string()))?;
    let output = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|err| minify_error(err.to_string()))?;
    Ok(output.code)
}
