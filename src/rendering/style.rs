//! Minimal CSS cascade for print templates.
//!
//! Stylesheets are tokenized with `cssparser`; selectors are matched with
//! `scraper`. Only what the layout needs is resolved: box edges, sizes,
//! `display`, `white-space`, font size, line height and `break-inside`.
//! Everything else is carried through as raw text.

use std::collections::BTreeMap;

use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};
use log::debug;
use scraper::{ElementRef, Selector};

/// Default font size of the root element, in pixels
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// User-agent defaults for the elements print templates commonly use
pub const USER_AGENT_CSS: &str = r#"
body { margin: 8px }
h1 { font-size: 2em; margin: 0.67em 0 }
h2 { font-size: 1.5em; margin: 0.83em 0 }
h3 { font-size: 1.17em; margin: 1em 0 }
h4 { margin: 1.33em 0 }
h5 { font-size: 0.83em; margin: 1.67em 0 }
h6 { font-size: 0.67em; margin: 2.33em 0 }
p, pre, ul, ol, dl, table { margin: 1em 0 }
blockquote, figure { margin: 1em 40px }
ul, ol { padding-left: 40px }
dd { margin-left: 40px }
pre { white-space: pre }
small, sub, sup { font-size: 0.83em }
td, th { padding: 1px }
"#;

/// Properties whose computed value passes from parent to child
const INHERITED: &[&str] = &["font-size", "line-height", "white-space"];

/// A single `property: value` pair
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// (id, class, type) selector weight
pub type Specificity = (u32, u32, u32);

/// Where a rule came from; later origins win at equal importance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    UserAgent,
    Author,
    Inline,
}

/// One compound selector with its declarations
pub struct StyleRule {
    pub selector_text: String,
    pub selector: Selector,
    pub specificity: Specificity,
    pub declarations: Vec<Declaration>,
}

#[derive(Default)]
pub struct StyleSheet {
    pub rules: Vec<StyleRule>,
}

impl StyleSheet {
    pub fn parse(css: &str) -> Self {
        parse_stylesheet(css)
    }
}

/// Resolved style of one element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedStyle {
    values: BTreeMap<String, String>,
}

impl ComputedStyle {
    pub fn get(&self, property: &str) -> Option<&str> {
        self.values.get(property).map(String::as_str)
    }

    pub fn set(&mut self, property: impl Into<String>, value: impl Into<String>) {
        self.values.insert(property.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    /// Resolved font size in pixels
    pub fn font_size(&self) -> f64 {
        self.get("font-size")
            .and_then(|v| parse_length(v, 0.0, DEFAULT_FONT_SIZE))
            .unwrap_or(DEFAULT_FONT_SIZE)
    }

    /// Line height in pixels (`normal` is 1.2 times the font size)
    pub fn line_height(&self) -> f64 {
        let font_size = self.font_size();
        match self.get("line-height").map(str::trim) {
            None | Some("normal") => font_size * 1.2,
            Some(v) => match v.parse::<f64>() {
                Ok(factor) => factor * font_size,
                Err(_) => parse_length(v, font_size, font_size).unwrap_or(font_size * 1.2),
            },
        }
    }

    /// A length-valued property resolved against `percent_base`; `None` for
    /// `auto`, `none`, or anything unparseable
    pub fn length(&self, property: &str, percent_base: f64) -> Option<f64> {
        self.get(property)
            .and_then(|v| parse_length(v, percent_base, self.font_size()))
    }
}

/// Ordered set of stylesheets applied to a document
pub struct Cascade {
    sheets: Vec<(Origin, StyleSheet)>,
}

impl Cascade {
    /// Cascade with the user-agent defaults followed by `author` sheets in order
    pub fn new(author: impl IntoIterator<Item = StyleSheet>) -> Self {
        let mut sheets = vec![(Origin::UserAgent, StyleSheet::parse(USER_AGENT_CSS))];
        sheets.extend(author.into_iter().map(|s| (Origin::Author, s)));
        Self { sheets }
    }

    /// Compute the style of `element` given its parent's computed style
    pub fn compute(&self, element: ElementRef<'_>, parent: Option<&ComputedStyle>) -> ComputedStyle {
        let inline = element
            .value()
            .attr("style")
            .map(parse_declarations)
            .unwrap_or_default();

        let mut matched: Vec<(bool, Origin, Specificity, usize, &Declaration)> = Vec::new();
        let mut order = 0usize;
        for (origin, sheet) in &self.sheets {
            for rule in &sheet.rules {
                order += 1;
                if rule.selector.matches(&element) {
                    for decl in &rule.declarations {
                        matched.push((decl.important, *origin, rule.specificity, order, decl));
                    }
                }
            }
        }
        for decl in &inline {
            order += 1;
            matched.push((decl.important, Origin::Inline, (0, 0, 0), order, decl));
        }
        matched.sort_by(|a, b| (a.0, a.1, a.2, a.3).cmp(&(b.0, b.1, b.2, b.3)));

        let mut style = ComputedStyle::default();
        for (.., decl) in matched {
            for (property, value) in expand_shorthand(&decl.property, &decl.value) {
                style.set(property, value);
            }
        }

        let parent_font = parent.map(ComputedStyle::font_size).unwrap_or(DEFAULT_FONT_SIZE);
        for property in INHERITED {
            let explicit = style.get(property).map(str::trim);
            if matches!(explicit, None | Some("inherit")) {
                match parent.and_then(|p| p.get(property)) {
                    Some(v) => style.set(*property, v.to_string()),
                    None => {
                        style.values.remove(*property);
                    }
                }
            }
        }
        let font_size = style
            .get("font-size")
            .and_then(|v| resolve_font_size(v, parent_font))
            .unwrap_or(parent_font);
        style.set("font-size", format!("{}px", font_size));
        style
    }
}

/// Parse a stylesheet, skipping rules that fail to parse
pub fn parse_stylesheet(css: &str) -> StyleSheet {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    StyleSheet {
        rules: parse_rule_list(&mut parser),
    }
}

fn parse_rule_list<'i>(parser: &mut Parser<'i, '_>) -> Vec<StyleRule> {
    let mut rules = Vec::new();
    while !parser.is_exhausted() {
        match parse_rule(parser) {
            Ok(parsed) => rules.extend(parsed),
            Err(e) => {
                debug!("skipping malformed CSS rule: {:?}", e);
                // Recover by skipping to the end of the next block
                while !parser.is_exhausted() {
                    if let Ok(Token::CurlyBracketBlock) = parser.next() {
                        break;
                    }
                }
            }
        }
    }
    rules
}

fn parse_rule<'i>(parser: &mut Parser<'i, '_>) -> Result<Vec<StyleRule>, ParseError<'i, ()>> {
    let at_keyword = parser
        .try_parse(|p| -> Result<String, ParseError<'i, ()>> {
            let location = p.current_source_location();
            let keyword = match p.next()? {
                Token::AtKeyword(kw) => Some(kw.to_ascii_lowercase()),
                _ => None,
            };
            keyword.ok_or_else(|| location.new_custom_error(()))
        })
        .ok();

    let prelude = parser.parse_until_before(Delimiter::CurlyBracketBlock | Delimiter::Semicolon, |p| {
        let start = p.position();
        while p.next().is_ok() {}
        Ok::<_, ParseError<'i, ()>>(p.slice_from(start).trim().to_string())
    })?;

    if let Some(keyword) = at_keyword {
        // Statement at-rules (@import, @charset) end at a semicolon
        if parser.try_parse(|p| p.expect_semicolon()).is_ok() || parser.is_exhausted() {
            return Ok(Vec::new());
        }
        parser.expect_curly_bracket_block()?;
        if keyword == "media" && media_applies_to_print(&prelude) {
            return parser.parse_nested_block(|p| Ok::<_, ParseError<'i, ()>>(parse_rule_list(p)));
        }
        parser.parse_nested_block(|p| {
            while p.next().is_ok() {}
            Ok::<_, ParseError<'i, ()>>(())
        })?;
        return Ok(Vec::new());
    }

    parser.expect_curly_bracket_block()?;
    let declarations = parser.parse_nested_block(|p| Ok::<_, ParseError<'i, ()>>(parse_declaration_list(p)))?;

    let mut rules = Vec::new();
    for selector_text in split_selector_list(&prelude) {
        match Selector::parse(selector_text) {
            Ok(selector) => rules.push(StyleRule {
                selector_text: selector_text.to_string(),
                selector,
                specificity: specificity(selector_text),
                declarations: declarations.clone(),
            }),
            Err(_) => debug!("unsupported selector '{}'", selector_text),
        }
    }
    Ok(rules)
}

/// Parse the body of a declaration block or a `style` attribute
pub fn parse_declarations(text: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    parse_declaration_list(&mut parser)
}

fn parse_declaration_list<'i>(parser: &mut Parser<'i, '_>) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    while !parser.is_exhausted() {
        let parsed = parser.parse_until_after(Delimiter::Semicolon, |p| {
            let property = p.expect_ident()?.to_ascii_lowercase();
            p.expect_colon()?;
            let start = p.position();
            while p.next().is_ok() {}
            let raw = p.slice_from(start).trim().trim_end_matches(';').trim_end();
            let (value, important) = strip_important(raw);
            Ok::<_, ParseError<'i, ()>>(Declaration {
                property,
                value: value.to_string(),
                important,
            })
        });
        match parsed {
            Ok(decl) if !decl.value.is_empty() => declarations.push(decl),
            Ok(_) => {}
            Err(e) => debug!("skipping malformed declaration: {:?}", e),
        }
    }
    declarations
}

fn strip_important(raw: &str) -> (&str, bool) {
    let lower = raw.to_ascii_lowercase();
    if let Some(bang) = lower.rfind('!') {
        if lower[bang + 1..].trim() == "important" {
            return (raw[..bang].trim_end(), true);
        }
    }
    (raw, false)
}

/// Whether a media query list matches the print medium.
///
/// Only the media type of each query is evaluated; feature expressions
/// such as `(max-width: 600px)` are assumed to match.
pub(crate) fn media_applies_to_print(query: &str) -> bool {
    let q = query.to_ascii_lowercase();
    q.trim().is_empty() || q.split(',').any(media_query_applies)
}

fn media_query_applies(query: &str) -> bool {
    let mut words = query.split_whitespace();
    let (negated, media_type) = match words.next() {
        Some("not") => (true, words.next()),
        Some("only") => (false, words.next()),
        first => (false, first),
    };
    let matches = match media_type {
        None => true,
        Some(t) if t.starts_with('(') => true,
        Some(t) => t == "print" || t == "all",
    };
    matches != negated
}

/// Split a selector list on top-level commas
fn split_selector_list(prelude: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in prelude.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(prelude[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(prelude[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Specificity of a single complex selector
pub fn specificity(selector: &str) -> Specificity {
    let (mut ids, mut classes, mut types) = (0u32, 0u32, 0u32);
    let mut chars = selector.chars().peekable();
    let mut compound_start = true;

    fn skip_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
        while matches!(chars.peek(), Some(c) if c.is_alphanumeric() || *c == '-' || *c == '_') {
            chars.next();
        }
    }

    while let Some(c) = chars.next() {
        match c {
            '#' => {
                ids += 1;
                skip_ident(&mut chars);
                compound_start = false;
            }
            '.' => {
                classes += 1;
                skip_ident(&mut chars);
                compound_start = false;
            }
            '[' => {
                classes += 1;
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                }
                compound_start = false;
            }
            ':' => {
                if chars.peek() == Some(&':') {
                    chars.next();
                    types += 1;
                } else {
                    classes += 1;
                }
                skip_ident(&mut chars);
                if chars.peek() == Some(&'(') {
                    let mut depth = 0;
                    for c in chars.by_ref() {
                        match c {
                            '(' => depth += 1,
                            ')' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                }
                compound_start = false;
            }
            ' ' | '>' | '+' | '~' => compound_start = true,
            '*' => compound_start = false,
            c if compound_start && c.is_alphabetic() => {
                types += 1;
                skip_ident(&mut chars);
                compound_start = false;
            }
            _ => {}
        }
    }
    (ids, classes, types)
}

/// Expand the shorthands the layout reads into longhands
fn expand_shorthand(property: &str, value: &str) -> Vec<(String, String)> {
    match property {
        "margin" | "padding" => box_sides(value)
            .map(|[t, r, b, l]| {
                vec![
                    (format!("{property}-top"), t),
                    (format!("{property}-right"), r),
                    (format!("{property}-bottom"), b),
                    (format!("{property}-left"), l),
                ]
            })
            .unwrap_or_default(),
        "border-width" => box_sides(value)
            .map(|[t, r, b, l]| {
                vec![
                    ("border-top-width".to_string(), t),
                    ("border-right-width".to_string(), r),
                    ("border-bottom-width".to_string(), b),
                    ("border-left-width".to_string(), l),
                ]
            })
            .unwrap_or_default(),
        "border" | "border-top" | "border-right" | "border-bottom" | "border-left" => {
            let width = value
                .split_whitespace()
                .find_map(border_width_token)
                .unwrap_or_else(|| "0".to_string());
            let sides: &[&str] = match property {
                "border" => &["top", "right", "bottom", "left"],
                other => &[other.trim_start_matches("border-")],
            };
            sides
                .iter()
                .map(|side| (format!("border-{side}-width"), width.clone()))
                .collect()
        }
        // Legacy alias
        "page-break-inside" => vec![("break-inside".to_string(), value.to_string())],
        _ => vec![(property.to_string(), value.to_string())],
    }
}

fn box_sides(value: &str) -> Option<[String; 4]> {
    let parts: Vec<String> = value.split_whitespace().map(str::to_string).collect();
    match parts.as_slice() {
        [a] => Some([a.clone(), a.clone(), a.clone(), a.clone()]),
        [v, h] => Some([v.clone(), h.clone(), v.clone(), h.clone()]),
        [t, h, b] => Some([t.clone(), h.clone(), b.clone(), h.clone()]),
        [t, r, b, l] => Some([t.clone(), r.clone(), b.clone(), l.clone()]),
        _ => None,
    }
}

fn border_width_token(token: &str) -> Option<String> {
    match token {
        "thin" => Some("1px".to_string()),
        "medium" => Some("3px".to_string()),
        "thick" => Some("5px".to_string()),
        t if parse_length(t, 0.0, DEFAULT_FONT_SIZE).is_some() => Some(t.to_string()),
        _ => None,
    }
}

fn resolve_font_size(value: &str, parent_font: f64) -> Option<f64> {
    let v = value.trim().to_ascii_lowercase();
    let keyword = match v.as_str() {
        "xx-small" => Some(9.0),
        "x-small" => Some(10.0),
        "small" => Some(13.0),
        "medium" => Some(16.0),
        "large" => Some(18.0),
        "x-large" => Some(24.0),
        "xx-large" => Some(32.0),
        "smaller" => Some(parent_font / 1.2),
        "larger" => Some(parent_font * 1.2),
        _ => None,
    };
    keyword.or_else(|| parse_length(&v, parent_font, parent_font))
}

/// Resolve a CSS length to pixels at 96 dpi.
///
/// `%` is relative to `percent_base`, `em` to `font_size`, `rem` to the
/// default root font size. Returns `None` for keywords such as `auto`.
pub fn parse_length(value: &str, percent_base: f64, font_size: f64) -> Option<f64> {
    let v = value.trim().to_ascii_lowercase();
    if v == "0" {
        return Some(0.0);
    }
    let split = v
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(v.len());
    let (number, unit) = v.split_at(split);
    let n: f64 = number.parse().ok()?;
    let px = match unit {
        "px" => n,
        "%" => n * percent_base / 100.0,
        "em" => n * font_size,
        "rem" => n * DEFAULT_FONT_SIZE,
        "pt" => n * 96.0 / 72.0,
        "pc" => n * 16.0,
        "in" => n * 96.0,
        "cm" => n * 96.0 / 2.54,
        "mm" => n * 96.0 / 25.4,
        "q" => n * 96.0 / 101.6,
        _ => return None,
    };
    px.is_finite().then_some(px)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn first<'a>(doc: &'a Html, sel: &str) -> ElementRef<'a> {
        doc.select(&Selector::parse(sel).unwrap()).next().unwrap()
    }

    #[test]
    fn parses_rules_and_declarations() {
        let sheet = parse_stylesheet("h1, .title { font-size: 20px; margin: 0 !important } #x{width:10px}");
        assert_eq!(sheet.rules.len(), 3);
        assert_eq!(sheet.rules[0].selector_text, "h1");
        assert_eq!(sheet.rules[1].selector_text, ".title");
        let decls = &sheet.rules[1].declarations;
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[1].property, "margin");
        assert_eq!(decls[1].value, "0");
        assert!(decls[1].important);
        assert_eq!(sheet.rules[2].declarations[0].value, "10px");
    }

    #[test]
    fn skips_screen_media_and_keeps_print_media() {
        let sheet = parse_stylesheet(
            "@charset \"utf-8\"; @media screen { .a { width: 1px } } @media print { .b { width: 2px } } @font-face { font-family: x } .c { width: 3px }",
        );
        let selectors: Vec<&str> = sheet.rules.iter().map(|r| r.selector_text.as_str()).collect();
        assert_eq!(selectors, vec![".b", ".c"]);
    }

    #[test]
    fn media_queries_match_on_media_type() {
        assert!(media_applies_to_print(""));
        assert!(media_applies_to_print("print"));
        assert!(media_applies_to_print("screen, print"));
        assert!(media_applies_to_print("only print and (orientation: portrait)"));
        assert!(media_applies_to_print("not screen"));
        assert!(media_applies_to_print("(min-width: 100px)"));
        assert!(!media_applies_to_print("not print"));
        assert!(!media_applies_to_print("small"));
        assert!(!media_applies_to_print("screen and (min-width: 100px)"));
    }

    #[test]
    fn specificity_counts_ids_classes_and_types() {
        assert_eq!(specificity("div"), (0, 0, 1));
        assert_eq!(specificity("#panel"), (1, 0, 0));
        assert_eq!(specificity("div.box > p:first-child"), (0, 2, 2));
        assert_eq!(specificity("ul li a[href]"), (0, 1, 3));
        assert_eq!(specificity("*"), (0, 0, 0));
    }

    #[test]
    fn cascade_orders_by_specificity_then_inline() {
        let doc = Html::parse_document(
            r#"<html><body><div id="p" class="box" style="height: 5px">x</div></body></html>"#,
        );
        let cascade = Cascade::new(vec![parse_stylesheet(
            "#p { width: 300px } .box { width: 100px; height: 50px } div { break-inside: auto } .box { page-break-inside: avoid }",
        )]);
        let style = cascade.compute(first(&doc, "#p"), None);
        assert_eq!(style.get("width"), Some("300px"));
        assert_eq!(style.get("height"), Some("5px"));
        assert_eq!(style.get("break-inside"), Some("avoid"));
    }

    #[test]
    fn important_beats_inline() {
        let doc = Html::parse_document(r#"<div class="w" style="width: 10px"></div>"#);
        let cascade = Cascade::new(vec![parse_stylesheet(".w { width: 900px !important }")]);
        let style = cascade.compute(first(&doc, ".w"), None);
        assert_eq!(style.length("width", 0.0), Some(900.0));
    }

    #[test]
    fn font_size_inherits_and_resolves_em() {
        let doc = Html::parse_document(r#"<div id="a"><p id="b">x</p></div>"#);
        let cascade = Cascade::new(vec![parse_stylesheet("#a { font-size: 20px } #b { font-size: 1.5em }")]);
        let a = cascade.compute(first(&doc, "#a"), None);
        assert_eq!(a.font_size(), 20.0);
        let b = cascade.compute(first(&doc, "#b"), Some(&a));
        assert_eq!(b.font_size(), 30.0);
        assert_eq!(b.line_height(), 36.0);
    }

    #[test]
    fn shorthand_edges_expand() {
        let doc = Html::parse_document(r#"<div id="a" style="margin: 1px 2px 3px; border: thin solid red; padding: 4px 5px"></div>"#);
        let style = Cascade::new(Vec::new()).compute(first(&doc, "#a"), None);
        assert_eq!(style.get("margin-left"), Some("2px"));
        assert_eq!(style.get("margin-bottom"), Some("3px"));
        assert_eq!(style.get("border-top-width"), Some("1px"));
        assert_eq!(style.get("padding-right"), Some("5px"));
        assert_eq!(style.get("padding-top"), Some("4px"));
    }

    #[test]
    fn lengths_resolve_to_pixels() {
        assert_eq!(parse_length("12pt", 0.0, 16.0), Some(16.0));
        assert_eq!(parse_length("50%", 600.0, 16.0), Some(300.0));
        assert_eq!(parse_length("2em", 0.0, 10.0), Some(20.0));
        assert_eq!(parse_length("1in", 0.0, 16.0), Some(96.0));
        assert_eq!(parse_length("auto", 0.0, 16.0), None);
        assert_eq!(parse_length("0", 0.0, 16.0), Some(0.0));
    }

    #[test]
    fn malformed_declarations_are_skipped() {
        let decls = parse_declarations("width: 10px; : broken; height 5px; color: red");
        let names: Vec<&str> = decls.iter().map(|d| d.property.as_str()).collect();
        assert_eq!(names, vec!["width", "color"]);
    }
}
