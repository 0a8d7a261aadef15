//! Parsing of declaration values relevant to icon fonts.

use std::fmt;

use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};

/// Parses a declaration value, allowing it to end with `!important`. The value must be consumed
/// by `parse` completely.
fn parse_value<'i, T, F>(value: &'i str, parse: F) -> Option<T>
where
    F: for<'tt> FnOnce(&mut Parser<'i, 'tt>) -> Result<T, ParseError<'i, ()>>,
{
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let output = parser.parse_until_before(Delimiter::Bang, parse).ok()?;
    if parser.try_parse(|parser| parser.expect_delim('!')).is_ok() {
        parser.expect_ident_matching("important").ok()?;
    }
    parser.expect_exhausted().ok()?;
    Some(output)
}

/// Reads a family name, either quoted or a sequence of identifiers.
fn family_name<'i>(parser: &mut Parser<'i, '_>) -> Result<String, ParseError<'i, ()>> {
    if let Ok(name) = parser.try_parse(|parser| parser.expect_string().cloned()) {
        return Ok(name.trim().to_owned());
    }
    let mut words = vec![parser.expect_ident()?.to_string()];
    while let Ok(word) = parser.try_parse(|parser| parser.expect_ident().cloned()) {
        words.push(word.to_string());
    }
    Ok(words.join(" "))
}

/// Decodes the codepoint of a `content` value, either a CSS hex escape (`"\f015"`)
/// or a single literal char (`"★"`).
pub fn decode_content(value: &str) -> Option<char> {
    let content = parse_value(value, |parser| Ok(parser.expect_string()?.clone()))?;
    let mut chars = content.chars();
    let ch = chars.next()?;
    chars.next().is_none().then_some(ch)
}

/// Returns the first family name of a `font-family` list with quotes stripped.
pub fn first_family(value: &str) -> Option<String> {
    let family = parse_value(value, |parser| {
        let family = parser.parse_until_before(Delimiter::Comma, |parser| family_name(parser))?;
        while parser.next().is_ok() {}
        Ok(family)
    })?;
    (!family.is_empty()).then_some(family)
}

/// Extracts all `url(...)` references from a `src` descriptor.
pub fn src_urls(value: &str) -> Vec<String> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut urls = vec![];
    while let Ok(token) = parser.next() {
        let url = match token.clone() {
            Token::UnquotedUrl(url) => Some(url.to_string()),
            Token::Function(name) if name.eq_ignore_ascii_case("url") => parser
                .parse_nested_block(|parser| {
                    Ok::<_, ParseError<'_, ()>>(parser.expect_string()?.to_string())
                })
                .ok(),
            _ => None,
        };
        urls.extend(url.filter(|url| !url.is_empty()));
    }
    urls
}

/// Font style recognized in `@font-face` descriptors and `font-style` declarations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FontStyle {
    /// `normal` style.
    #[default]
    Normal,
    /// `italic` style.
    Italic,
}

impl fmt::Display for FontStyle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Normal => "normal",
            Self::Italic => "italic",
        })
    }
}

impl FontStyle {
    /// Parses a `font-style` value. Returns `None` for unsupported values (e.g., `oblique`).
    pub fn parse(value: &str) -> Option<Self> {
        parse_value(value, |parser| Ok(Self::from_keyword(parser.expect_ident()?))).flatten()
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        if keyword.eq_ignore_ascii_case("normal") {
            Some(Self::Normal)
        } else if keyword.eq_ignore_ascii_case("italic") {
            Some(Self::Italic)
        } else {
            None
        }
    }
}

/// Numeric font weight, one of `100`, `200`, ..., `900`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontWeight(u16);

impl Default for FontWeight {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for FontWeight {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, formatter)
    }
}

impl FontWeight {
    /// `normal` weight.
    pub const NORMAL: Self = Self(400);
    /// `bold` weight.
    pub const BOLD: Self = Self(700);

    /// Parses a `font-weight` value. Returns `None` for relative weights, ranges,
    /// or values that are not a multiple of 100.
    pub fn parse(value: &str) -> Option<Self> {
        parse_value(value, |parser| {
            Ok(match parser.next()? {
                Token::Ident(keyword) => Self::from_keyword(keyword),
                Token::Number {
                    int_value: Some(weight),
                    ..
                } => Self::from_number(*weight),
                _ => None,
            })
        })
        .flatten()
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        if keyword.eq_ignore_ascii_case("normal") {
            Some(Self::NORMAL)
        } else if keyword.eq_ignore_ascii_case("bold") {
            Some(Self::BOLD)
        } else {
            None
        }
    }

    fn from_number(weight: i32) -> Option<Self> {
        let weight = u16::try_from(weight).ok()?;
        ((100..=900).contains(&weight) && weight % 100 == 0).then_some(Self(weight))
    }

    /// Returns the numeric value of this weight.
    pub fn get(self) -> u16 {
        self.0
    }
}

const SIZE_KEYWORDS: &[&str] = &[
    "xx-small", "x-small", "small", "medium", "large", "x-large", "xx-large", "smaller", "larger",
];
/// Keywords of the `font` shorthand that do not affect font face selection.
const IGNORED_KEYWORDS: &[&str] = &["normal", "small-caps", "oblique", "condensed", "expanded"];

fn is_keyword(keywords: &[&str], ident: &str) -> bool {
    keywords
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(ident))
}

/// Parsed `font` shorthand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontShorthand {
    /// First family from the family list.
    pub family: String,
    /// Explicit or implied (`normal`) style.
    pub style: FontStyle,
    /// Explicit or implied (`normal`) weight.
    pub weight: FontWeight,
    /// Font size, optionally followed by `/` and line height.
    pub size: String,
}

impl FontShorthand {
    /// Parses a `font` shorthand value. Returns `None` for values without a family
    /// (e.g., `inherit` or `var(--font)`).
    pub fn parse(value: &str) -> Option<Self> {
        parse_value(value, |parser| {
            let (mut style, mut weight) = (None, None);
            let mut size = loop {
                let start = parser.position();
                match parser.next()?.clone() {
                    Token::Ident(ident) if is_keyword(SIZE_KEYWORDS, &ident) => {
                        break parser.slice_from(start).trim().to_owned();
                    }
                    Token::Ident(ident) if is_keyword(IGNORED_KEYWORDS, &ident) => {}
                    Token::Ident(ident) => {
                        if let Some(parsed) = FontWeight::from_keyword(&ident) {
                            weight = Some(parsed);
                        } else if let Some(parsed) = FontStyle::from_keyword(&ident) {
                            style = Some(parsed);
                        } else {
                            return Ok(None);
                        }
                    }
                    Token::Number {
                        int_value: Some(number),
                        ..
                    } => match FontWeight::from_number(number) {
                        Some(parsed) => weight = Some(parsed),
                        None => return Ok(None),
                    },
                    Token::Dimension { .. } | Token::Percentage { .. } => {
                        break parser.slice_from(start).trim().to_owned();
                    }
                    _ => return Ok(None),
                }
            };

            if parser.try_parse(|parser| parser.expect_delim('/')).is_ok() {
                let start = parser.position();
                parser.next()?;
                size = format!("{size}/{}", parser.slice_from(start).trim());
            }
            let family = parser.parse_until_before(Delimiter::Comma, |parser| family_name(parser))?;
            while parser.next().is_ok() {}

            Ok((!family.is_empty()).then(|| Self {
                family,
                style: style.unwrap_or_default(),
                weight: weight.unwrap_or_default(),
                size,
            }))
        })
        .flatten()
    }
}
