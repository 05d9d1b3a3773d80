//! Parser and matcher for the selector subset the engine emits.
//!
//! Generated selectors are compound selectors (`tag`, `#id`, `.class`,
//! `[attr="value"]`, `:nth-of-type(n)`) joined by child (`>`) or descendant
//! (whitespace) combinators. Parsing is hand-rolled over a peekable char
//! stream; anything outside the subset is an [`RecorderError::InvalidSelector`].

use std::iter::Peekable;
use std::str::Chars;

use crate::dom::Element;
use crate::errors::{RecorderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

/// One compound selector: `input.search[name="q"]:nth-of-type(2)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// Attribute constraints; `None` value means presence-only (`[disabled]`).
    pub attrs: Vec<(String, Option<String>)>,
    pub nth_of_type: Option<usize>,
}

/// A full selector path. Each part carries the combinator that relates it to
/// the part before it; the first part's combinator is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub parts: Vec<(Combinator, Compound)>,
}

pub fn parse(input: &str) -> Result<Path> {
    let mut chars = input.chars().peekable();
    let mut parts = Vec::new();
    let mut combinator = Combinator::Descendant;

    loop {
        skip_whitespace(&mut chars);
        if chars.peek() == Some(&'>') {
            chars.next();
            combinator = Combinator::Child;
            skip_whitespace(&mut chars);
        }
        if chars.peek().is_none() {
            break;
        }
        let compound = parse_compound(&mut chars, input)?;
        parts.push((combinator, compound));
        combinator = Combinator::Descendant;
    }

    if parts.is_empty() {
        return Err(RecorderError::InvalidSelector(format!(
            "empty selector: {input:?}"
        )));
    }
    Ok(Path { parts })
}

fn skip_whitespace(chars: &mut Peekable<Chars>) {
    while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
        chars.next();
    }
}

/// Reads an identifier, honoring backslash escapes.
fn parse_ident(chars: &mut Peekable<Chars>) -> String {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        match c {
            '\\' => {
                chars.next();
                if let Some(escaped) = chars.next() {
                    ident.push(escaped);
                }
            }
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() => {
                ident.push(c);
                chars.next();
            }
            _ => break,
        }
    }
    ident
}

fn parse_compound(chars: &mut Peekable<Chars>, input: &str) -> Result<Compound> {
    let mut compound = Compound::default();

    if matches!(chars.peek(), Some(&'*')) {
        chars.next();
    } else if matches!(chars.peek(), Some(c) if c.is_ascii_alphanumeric() || *c == '\\') {
        compound.tag = Some(parse_ident(chars).to_ascii_lowercase());
    }

    loop {
        match chars.peek() {
            Some('#') => {
                chars.next();
                compound.id = Some(parse_ident(chars));
            }
            Some('.') => {
                chars.next();
                compound.classes.push(parse_ident(chars));
            }
            Some('[') => {
                chars.next();
                let name = parse_ident(chars);
                let value = if chars.peek() == Some(&'=') {
                    chars.next();
                    Some(parse_attr_value(chars, input)?)
                } else {
                    None
                };
                if chars.next() != Some(']') {
                    return Err(RecorderError::InvalidSelector(format!(
                        "unterminated attribute selector in {input:?}"
                    )));
                }
                compound.attrs.push((name, value));
            }
            Some(':') => {
                chars.next();
                let name = parse_ident(chars);
                if name != "nth-of-type" {
                    return Err(RecorderError::InvalidSelector(format!(
                        "unsupported pseudo-class :{name} in {input:?}"
                    )));
                }
                if chars.next() != Some('(') {
                    return Err(RecorderError::InvalidSelector(format!(
                        "expected ( after :nth-of-type in {input:?}"
                    )));
                }
                let mut digits = String::new();
                while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
                    digits.push(chars.next().unwrap());
                }
                if chars.next() != Some(')') || digits.is_empty() {
                    return Err(RecorderError::InvalidSelector(format!(
                        "malformed :nth-of-type in {input:?}"
                    )));
                }
                compound.nth_of_type = digits.parse().ok();
            }
            _ => break,
        }
    }

    if compound == Compound::default() {
        return Err(RecorderError::InvalidSelector(format!(
            "expected a compound selector in {input:?}"
        )));
    }
    Ok(compound)
}

fn parse_attr_value(chars: &mut Peekable<Chars>, input: &str) -> Result<String> {
    if chars.next() != Some('"') {
        return Err(RecorderError::InvalidSelector(format!(
            "attribute values must be double-quoted in {input:?}"
        )));
    }
    let mut value = String::new();
    loop {
        match chars.next() {
            Some('\\') => {
                if let Some(escaped) = chars.next() {
                    value.push(escaped);
                }
            }
            Some('"') => return Ok(value),
            Some(c) => value.push(c),
            None => {
                return Err(RecorderError::InvalidSelector(format!(
                    "unterminated attribute value in {input:?}"
                )))
            }
        }
    }
}

impl Compound {
    pub fn matches(&self, el: &Element) -> bool {
        if el.is_shadow_root() {
            return false;
        }
        if let Some(tag) = &self.tag {
            if el.tag() != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.id_attr().as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = el.classes();
            if !self.classes.iter().all(|c| classes.iter().any(|e| e == c)) {
                return false;
            }
        }
        for (name, expected) in &self.attrs {
            match (el.attr(name), expected) {
                (Some(actual), Some(expected)) if actual == *expected => {}
                (Some(_), None) => {}
                _ => return false,
            }
        }
        if let Some(n) = self.nth_of_type {
            if el.nth_of_type() != n {
                return false;
            }
        }
        true
    }
}

impl Path {
    pub fn matches(&self, el: &Element) -> bool {
        matches_at(&self.parts, self.parts.len() - 1, el)
    }
}

fn matches_at(parts: &[(Combinator, Compound)], idx: usize, el: &Element) -> bool {
    if !parts[idx].1.matches(el) {
        return false;
    }
    if idx == 0 {
        return true;
    }
    match parts[idx].0 {
        Combinator::Child => el
            .parent()
            .is_some_and(|p| matches_at(parts, idx - 1, &p)),
        Combinator::Descendant => {
            let mut cur = el.parent();
            while let Some(p) = cur {
                // A descendant walk never crosses a shadow boundary.
                if p.is_shadow_root() {
                    return false;
                }
                if matches_at(parts, idx - 1, &p) {
                    return true;
                }
                cur = p.parent();
            }
            false
        }
    }
}

/// All elements under `scope` (inclusive) matching `path`, document order.
pub fn select_all(scope: &Element, path: &Path) -> Vec<Element> {
    scope
        .subtree()
        .into_iter()
        .filter(|el| path.matches(el))
        .collect()
}

pub fn count_matches(scope: &Element, path: &Path) -> usize {
    scope.subtree().iter().filter(|el| path.matches(el)).count()
}

/// Escapes a string for use as a CSS identifier (ids, classes).
pub fn css_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Escapes a string for use inside a double-quoted attribute value.
pub fn attr_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    fn fixture() -> (Document, Element, Element) {
        let doc = Document::new("https://example.com/");
        let form = Element::new("form");
        let input = Element::new("input");
        input.set_attr("id", "q").set_attr("class", "search main");
        input.set_attr("name", "query");
        doc.body().append_child(&form);
        form.append_child(&input);
        (doc, form, input)
    }

    #[test]
    fn test_parse_compound_parts() {
        let path = parse("input.search[name=\"query\"]:nth-of-type(1)").unwrap();
        assert_eq!(path.parts.len(), 1);
        let compound = &path.parts[0].1;
        assert_eq!(compound.tag.as_deref(), Some("input"));
        assert_eq!(compound.classes, vec!["search".to_string()]);
        assert_eq!(
            compound.attrs,
            vec![("name".to_string(), Some("query".to_string()))]
        );
        assert_eq!(compound.nth_of_type, Some(1));
    }

    #[test]
    fn test_parse_rejects_unknown_pseudo() {
        assert!(parse("div:hover").is_err());
        assert!(parse("").is_err());
        assert!(parse("[name=\"unterminated").is_err());
    }

    #[test]
    fn test_match_id_and_class() {
        let (doc, _, input) = fixture();
        assert!(parse("#q").unwrap().matches(&input));
        assert!(parse(".search").unwrap().matches(&input));
        assert!(parse("input.search.main").unwrap().matches(&input));
        assert!(!parse(".missing").unwrap().matches(&input));
        assert_eq!(count_matches(&doc.body(), &parse("#q").unwrap()), 1);
    }

    #[test]
    fn test_match_child_and_descendant() {
        let (doc, _, input) = fixture();
        assert!(parse("form > input").unwrap().matches(&input));
        assert!(parse("body input").unwrap().matches(&input));
        assert!(!parse("body > input").unwrap().matches(&input));
        assert_eq!(
            select_all(&doc.body(), &parse("body > form > input").unwrap()).len(),
            1
        );
    }

    #[test]
    fn test_attr_value_escaping_round_trip() {
        let doc = Document::new("https://example.com/");
        let el = Element::new("div");
        el.set_attr("data-testid", "a\"b");
        doc.body().append_child(&el);

        let sel = format!("[data-testid=\"{}\"]", attr_escape("a\"b"));
        assert!(parse(&sel).unwrap().matches(&el));
    }

    #[test]
    fn test_descendant_walk_stops_at_shadow_boundary() {
        let doc = Document::new("https://example.com/");
        let host = Element::new("div");
        host.set_attr("id", "host");
        doc.body().append_child(&host);
        let shadow = host.attach_shadow();
        let button = Element::new("button");
        shadow.append_child(&button);

        assert!(!parse("body button").unwrap().matches(&button));
        assert!(parse("button").unwrap().matches(&button));
    }
}
