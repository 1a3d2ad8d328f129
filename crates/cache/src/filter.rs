// SPDX-License-Identifier: MIT

//! A minimal LDAP search filter: enough of RFC 4515 to evaluate the
//! `filter`/`attributes` gates handler manifests declare (`&`, `|`, `!`,
//! equality, presence, and `*`-substrings). Scope and base are accepted for
//! API parity with `handlers.c`'s `struct filter` but are not evaluated
//! against a directory tree here -- this daemon matches filters against the
//! entry the pump already fetched, not against a live subtree search
//! (see DESIGN.md's note on `handlers_filter()`).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    pub base: Option<String>,
    pub filter: String,
}

impl SearchFilter {
    pub fn new(filter: impl Into<String>) -> Self {
        Self { base: None, filter: filter.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    Present(String),
    Equals(String, String),
    Substring(String, Vec<SubPart>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SubPart {
    Any,
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterParseError(String);

impl fmt::Display for FilterParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid LDAP filter: {}", self.0)
    }
}
impl std::error::Error for FilterParseError {}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { chars: input.chars().peekable() }
    }

    fn expect(&mut self, c: char) -> Result<(), FilterParseError> {
        match self.chars.next() {
            Some(x) if x == c => Ok(()),
            other => Err(FilterParseError(format!("expected '{c}', found {other:?}"))),
        }
    }

    fn parse_filter(&mut self) -> Result<Node, FilterParseError> {
        self.expect('(')?;
        let node = match self.chars.peek().copied() {
            Some('&') => {
                self.chars.next();
                Node::And(self.parse_filter_list()?)
            }
            Some('|') => {
                self.chars.next();
                Node::Or(self.parse_filter_list()?)
            }
            Some('!') => {
                self.chars.next();
                Node::Not(Box::new(self.parse_filter()?))
            }
            _ => self.parse_item()?,
        };
        self.expect(')')?;
        Ok(node)
    }

    fn parse_filter_list(&mut self) -> Result<Vec<Node>, FilterParseError> {
        let mut nodes = Vec::new();
        while self.chars.peek() == Some(&'(') {
            nodes.push(self.parse_filter()?);
        }
        Ok(nodes)
    }

    fn parse_item(&mut self) -> Result<Node, FilterParseError> {
        let mut attr = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == '=' {
                break;
            }
            attr.push(c);
            self.chars.next();
        }
        self.expect('=')?;
        let mut value = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == ')' {
                break;
            }
            value.push(c);
            self.chars.next();
        }
        if value == "*" {
            return Ok(Node::Present(attr));
        }
        if value.contains('*') {
            let parts = value
                .split('*')
                .map(|p| {
                    if p.is_empty() {
                        SubPart::Any
                    } else {
                        SubPart::Literal(p.to_string())
                    }
                })
                .collect();
            return Ok(Node::Substring(attr, parts));
        }
        Ok(Node::Equals(attr, value))
    }
}

fn parse(filter: &str) -> Result<Node, FilterParseError> {
    let mut parser = Parser::new(filter.trim());
    let node = parser.parse_filter()?;
    if parser.chars.next().is_some() {
        return Err(FilterParseError("trailing input after filter".into()));
    }
    Ok(node)
}

fn bytes_eq_ci(values: &[Vec<u8>], want: &str) -> bool {
    values.iter().any(|v| {
        std::str::from_utf8(v)
            .map(|s| s.eq_ignore_ascii_case(want))
            .unwrap_or(false)
    })
}

fn substring_match(values: &[Vec<u8>], parts: &[SubPart]) -> bool {
    values.iter().any(|v| {
        let Ok(s) = std::str::from_utf8(v) else { return false };
        let s = s.to_ascii_lowercase();
        let mut pos = 0usize;
        let mut first = true;
        for part in parts {
            match part {
                SubPart::Any => first = false,
                SubPart::Literal(lit) => {
                    let lit = lit.to_ascii_lowercase();
                    if first {
                        if !s[pos..].starts_with(&lit) {
                            return false;
                        }
                        pos += lit.len();
                        first = false;
                    } else if let Some(idx) = s[pos..].find(&lit) {
                        pos += idx + lit.len();
                    } else {
                        return false;
                    }
                }
            }
        }
        true
    })
}

fn eval(node: &Node, attrs: &std::collections::BTreeMap<String, Vec<Vec<u8>>>) -> bool {
    match node {
        Node::And(children) => children.iter().all(|c| eval(c, attrs)),
        Node::Or(children) => children.iter().any(|c| eval(c, attrs)),
        Node::Not(inner) => !eval(inner, attrs),
        Node::Present(attr) => attrs.get(attr).map(|v| !v.is_empty()).unwrap_or(false),
        Node::Equals(attr, value) => attrs.get(attr).map(|v| bytes_eq_ci(v, value)).unwrap_or(false),
        Node::Substring(attr, parts) => attrs.get(attr).map(|v| substring_match(v, parts)).unwrap_or(false),
    }
}

/// Evaluate `filter` against an entry's attributes. A malformed filter
/// string is treated as non-matching rather than panicking -- a handler's
/// manifest typo shouldn't take the pump down.
pub fn matches(filter: &SearchFilter, attrs: &std::collections::BTreeMap<String, Vec<Vec<u8>>>) -> bool {
    match parse(&filter.filter) {
        Ok(node) => eval(&node, attrs),
        Err(e) => {
            tracing::warn!(filter = %filter.filter, error = %e, "unparseable handler filter treated as non-matching");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, Vec<Vec<u8>>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), vec![v.as_bytes().to_vec()]))
            .collect()
    }

    #[test]
    fn equality_matches_case_insensitively() {
        let f = SearchFilter::new("(objectClass=Person)");
        assert!(matches(&f, &attrs(&[("objectClass", "person")])));
        assert!(!matches(&f, &attrs(&[("objectClass", "group")])));
    }

    #[test]
    fn presence_requires_nonempty_values() {
        let f = SearchFilter::new("(mail=*)");
        assert!(matches(&f, &attrs(&[("mail", "a@example.com")])));
        assert!(!matches(&f, &attrs(&[("cn", "a")])));
    }

    #[test]
    fn and_or_not_compose() {
        let f = SearchFilter::new("(&(objectClass=person)(!(cn=admin)))");
        assert!(matches(&f, &attrs(&[("objectClass", "person"), ("cn", "alice")])));
        assert!(!matches(&f, &attrs(&[("objectClass", "person"), ("cn", "admin")])));
    }

    #[test]
    fn substring_matches_prefix_and_infix() {
        let f = SearchFilter::new("(cn=al*ce)");
        assert!(matches(&f, &attrs(&[("cn", "alice")])));
        assert!(!matches(&f, &attrs(&[("cn", "bob")])));
    }

    #[test]
    fn malformed_filter_does_not_match() {
        let f = SearchFilter::new("(unbalanced");
        assert!(!matches(&f, &attrs(&[("cn", "alice")])));
    }
}
