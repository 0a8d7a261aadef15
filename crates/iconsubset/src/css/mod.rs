//! Lightweight reader for stylesheet rules and declarations.
//!
//! The reader is built on `cssparser` tokens and only splits stylesheets into top-level blocks;
//! nested blocks (`@media`, `@keyframes` etc.) are kept in the body of the enclosing rule.

use cssparser::{Delimiter, ParseError, Parser, ParserInput, SourcePosition, Token};
use indexmap::IndexMap;

pub use self::values::{
    decode_content, first_family, src_urls, FontShorthand, FontStyle, FontWeight,
};

mod values;

/// Single top-level CSS rule or at-rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Selector, or the at-rule prelude including the `@` keyword.
    pub selector: String,
    /// Contents between the outer braces.
    pub body: String,
}

impl Rule {
    /// Checks whether this is an at-rule (e.g., `@font-face` or `@media`).
    pub fn is_at_rule(&self) -> bool {
        self.selector.starts_with('@')
    }

    /// Checks whether this is an `@font-face` rule.
    pub fn is_font_face(&self) -> bool {
        self.selector.eq_ignore_ascii_case("@font-face")
    }

    /// Returns the name of a `@keyframes` or `@-webkit-keyframes` rule.
    pub fn keyframes_name(&self) -> Option<&str> {
        let (keyword, name) = self.selector.split_once(char::is_whitespace)?;
        matches!(keyword, "@keyframes" | "@-webkit-keyframes").then(|| name.trim())
    }

    /// Returns classes of the selector, see [`extract_classes()`].
    pub fn classes(&self) -> Vec<&str> {
        extract_classes(&self.selector)
    }

    /// Returns declarations in the body, see [`declarations()`].
    pub fn declarations(&self) -> Vec<(String, &str)> {
        declarations(&self.body)
    }

    /// Returns the value of the last declaration of `property` in the body.
    pub fn declared(&self, property: &str) -> Option<&str> {
        declarations(&self.body)
            .into_iter()
            .rev()
            .find_map(|(name, value)| (name == property).then_some(value))
    }
}

type ReadError<'i> = ParseError<'i, ()>;

fn closing_char(token: &Token<'_>) -> Option<char> {
    match token {
        Token::Function(_) | Token::ParenthesisBlock => Some(')'),
        Token::SquareBracketBlock => Some(']'),
        Token::CurlyBracketBlock => Some('}'),
        _ => None,
    }
}

/// Appends the source of a token that starts at `start` and was just read by `parser`.
/// If the token opens a block, the block contents and the closing char are appended as well.
fn push_token(
    parser: &mut Parser<'_, '_>,
    start: SourcePosition,
    closing: Option<char>,
    output: &mut String,
) {
    output.push_str(parser.slice_from(start));
    if let Some(closing) = closing {
        let _ = parser.parse_nested_block(|parser| {
            push_remaining(parser, output);
            Ok::<_, ReadError<'_>>(())
        });
        output.push(closing);
    }
}

/// Appends the source of all remaining tokens with comments removed.
fn push_remaining(parser: &mut Parser<'_, '_>, output: &mut String) {
    loop {
        let start = parser.position();
        let Ok(token) = parser.next_including_whitespace_and_comments() else {
            return;
        };
        if !matches!(token, Token::Comment(_)) {
            let closing = closing_char(token);
            push_token(parser, start, closing, output);
        }
    }
}

/// Splits stylesheet text into top-level rules.
///
/// Comments are removed. Statements without a block (e.g., `@charset` or `@import`) are skipped,
/// as is a trailing unterminated block.
pub fn parse_rules(text: &str) -> Vec<Rule> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    let mut rules = vec![];
    let mut prelude = String::new();

    loop {
        let start = parser.position();
        let Ok(token) = parser.next_including_whitespace_and_comments() else {
            break;
        };
        match token {
            Token::Comment(_) => { /* skip */ }
            Token::Semicolon | Token::CloseCurlyBracket => prelude.clear(),
            Token::CurlyBracketBlock => {
                let mut body = String::new();
                let _ = parser.parse_nested_block(|parser| {
                    push_remaining(parser, &mut body);
                    Ok::<_, ReadError<'_>>(())
                });
                if parser.slice_from(start).ends_with('}') {
                    rules.push(Rule {
                        selector: prelude.trim().to_owned(),
                        body: body.trim().to_owned(),
                    });
                } else {
                    tracing::debug!(selector = prelude.trim(), "skipping unterminated block");
                }
                prelude.clear();
            }
            token => {
                let closing = closing_char(token);
                push_token(&mut parser, start, closing, &mut prelude);
            }
        }
    }
    rules
}

/// Extracts classes from a selector in the order of their first occurrence.
///
/// At-rules and selectors starting with a pseudo-class (e.g., `:root`) have no classes.
/// Pseudo-classes, pseudo-elements and attribute selectors following a class are cut off.
pub fn extract_classes(selector: &str) -> Vec<&str> {
    let selector = selector.trim();
    if selector.starts_with('@') || selector.starts_with(':') {
        return vec![];
    }

    let mut input = ParserInput::new(selector);
    let mut parser = Parser::new(&mut input);
    let mut classes = vec![];
    // Set after a pseudo-class or an attribute selector until the end of the compound selector.
    let mut is_suffix = false;
    while let Ok(token) = parser.next_including_whitespace() {
        match token {
            Token::Delim('.') if !is_suffix => {
                let start = parser.position();
                if matches!(parser.next_including_whitespace(), Ok(Token::Ident(_))) {
                    let class = parser.slice_from(start);
                    if !classes.contains(&class) {
                        classes.push(class);
                    }
                }
            }
            Token::Colon | Token::SquareBracketBlock => is_suffix = true,
            Token::WhiteSpace(_) | Token::Comma | Token::Delim('>' | '+' | '~') => {
                is_suffix = false;
            }
            _ => { /* other selector parts */ }
        }
    }
    classes
}

/// Reads `.class:before` or `.class::before`.
fn before_only_class<'i>(parser: &mut Parser<'i, '_>) -> Result<&'i str, ReadError<'i>> {
    parser.expect_delim('.')?;
    let start = parser.position();
    if !matches!(parser.next_including_whitespace()?, Token::Ident(_)) {
        return Err(parser.new_custom_error(()));
    }
    let class = parser.slice_from(start);

    if !matches!(parser.next_including_whitespace()?, Token::Colon) {
        return Err(parser.new_custom_error(()));
    }
    let is_before = match parser.next_including_whitespace()? {
        Token::Ident(name) => name.eq_ignore_ascii_case("before"),
        Token::Colon => matches!(
            parser.next_including_whitespace()?,
            Token::Ident(name) if name.eq_ignore_ascii_case("before")
        ),
        _ => false,
    };
    if is_before {
        Ok(class)
    } else {
        Err(parser.new_custom_error(()))
    }
}

/// Extracts classes from a selector consisting of `.class:before` / `.class::before` parts only.
/// Other parts are skipped.
pub fn extract_classes_before_only(selector: &str) -> Vec<&str> {
    let mut input = ParserInput::new(selector);
    let mut parser = Parser::new(&mut input);
    let mut classes = vec![];
    while !parser.is_exhausted() {
        let start = parser.position();
        match parser.parse_until_before(Delimiter::Comma, |parser| before_only_class(parser)) {
            Ok(class) => classes.push(class),
            Err(_) => {
                let part = parser.slice_from(start).trim();
                tracing::debug!(part, "skipping complex selector in content rule");
            }
        }
        // Skip the comma
        let _ = parser.next();
    }
    classes
}

/// Splits a rule body into `(property, value)` declarations. Properties are lower-cased;
/// values are trimmed and retain `!important`.
pub fn declarations(body: &str) -> Vec<(String, &str)> {
    let mut input = ParserInput::new(body);
    let mut parser = Parser::new(&mut input);
    let mut declarations = vec![];
    while !parser.is_exhausted() {
        let declaration = parser.parse_until_before(Delimiter::Semicolon, |parser| {
            let property = parser.expect_ident()?.to_ascii_lowercase();
            parser.expect_colon()?;
            let start = parser.position();
            while parser.next().is_ok() {}
            Ok::<_, ReadError<'_>>((property, parser.slice_from(start).trim()))
        });
        match declaration {
            Ok((property, value)) if !value.is_empty() => declarations.push((property, value)),
            _ => { /* invalid or empty declaration */ }
        }
        // Skip the semicolon
        let _ = parser.next();
    }
    declarations
}

/// Builds the table mapping icon classes to their legacy codepoints from `:before` content rules,
/// in the order classes are first encountered. As in the cascade, a later rule for a class
/// overrides an earlier one.
pub fn class_codepoints(rules: &[Rule]) -> IndexMap<String, char> {
    let mut table = IndexMap::new();
    for rule in rules.iter().filter(|rule| !rule.is_at_rule()) {
        let Some(content) = rule.declared("content") else {
            continue;
        };
        let classes = extract_classes_before_only(&rule.selector);
        if classes.is_empty() {
            continue;
        }
        let Some(codepoint) = decode_content(content) else {
            tracing::warn!(selector = %rule.selector, content, "cannot decode icon content");
            continue;
        };
        for class in classes {
            table.insert(class.to_owned(), codepoint);
        }
    }
    table
}
