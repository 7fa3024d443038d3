//! Distinguished-name handling for mirror entries.
//!
//! Every entry the mirror writes is addressed by a path-like name rooted at
//! a configured base (`cn=Jane Doe,ou=Users,dc=mirror`). Parsing is strict
//! so malformed names surface early; values with reserved characters are
//! escaped on render so a display name containing a comma cannot corrupt
//! the tree structure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use idmirror_core::Error as CoreError;

/// Errors that can occur when parsing distinguished names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnError {
    /// The distinguished name was empty.
    #[error("distinguished name cannot be empty")]
    Empty,
    /// A component was not an `attribute=value` pair.
    #[error("invalid distinguished name component: {0}")]
    InvalidComponent(String),
    /// A component was missing the attribute to the left of the `=`.
    #[error("distinguished name component missing attribute: {0}")]
    MissingAttribute(String),
    /// A component was missing the value to the right of the `=`.
    #[error("distinguished name component missing value for attribute {0}")]
    MissingValue(String),
    /// The distinguished name ended with an escape character.
    #[error("distinguished name contains an unterminated escape sequence")]
    UnterminatedEscape,
}

impl From<DnError> for CoreError {
    fn from(err: DnError) -> Self {
        CoreError::InvalidName(err.to_string())
    }
}

/// A single `attribute=value` naming component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rdn {
    attribute: String,
    value: String,
}

impl Rdn {
    /// Create a new relative distinguished name.
    #[must_use]
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Attribute portion (e.g. `cn`).
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Value portion, unescaped.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// True if this component's attribute matches (attribute names are
    /// case-insensitive in directory naming).
    #[must_use]
    pub fn matches_attribute(&self, attribute: &str) -> bool {
        self.attribute.eq_ignore_ascii_case(attribute)
    }
}

/// Strongly-typed distinguished name.
///
/// Keeps a canonical escaped string form alongside the parsed components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dn {
    raw: String,
    rdns: Vec<Rdn>,
}

impl Dn {
    /// Parses a distinguished name from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`DnError`] on empty input or malformed components.
    pub fn parse(input: impl AsRef<str>) -> std::result::Result<Self, DnError> {
        let raw = input.as_ref().trim();
        if raw.is_empty() {
            return Err(DnError::Empty);
        }

        let mut rdns = Vec::new();
        for component in split_escaped(raw)? {
            let (attribute, value) = split_attribute_value(&component)?;
            rdns.push(Rdn::new(attribute, value));
        }

        Ok(Self::from_rdns(rdns))
    }

    fn from_rdns(rdns: Vec<Rdn>) -> Self {
        Self {
            raw: render(&rdns),
            rdns,
        }
    }

    /// Borrows the canonical escaped string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The naming components, leading (most specific) first.
    #[must_use]
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// The leading (most specific) component.
    #[must_use]
    pub fn leading(&self) -> &Rdn {
        // Parsing rejects empty names, so there is always at least one.
        &self.rdns[0]
    }

    /// Looks up the value of the first component matching `attribute`.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.rdns
            .iter()
            .find(|rdn| rdn.matches_attribute(attribute))
            .map(Rdn::value)
    }

    /// Builds a child name one level beneath this one.
    #[must_use]
    pub fn child(&self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        let mut rdns = Vec::with_capacity(self.rdns.len() + 1);
        rdns.push(Rdn::new(attribute, value));
        rdns.extend(self.rdns.iter().cloned());
        Self::from_rdns(rdns)
    }

    /// The parent name, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.rdns.len() <= 1 {
            return None;
        }
        Some(Self::from_rdns(self.rdns[1..].to_vec()))
    }

    /// True if this name sits strictly beneath `base`.
    #[must_use]
    pub fn is_descendant_of(&self, base: &Dn) -> bool {
        if self.rdns.len() <= base.rdns.len() {
            return false;
        }
        let offset = self.rdns.len() - base.rdns.len();
        self.rdns[offset..]
            .iter()
            .zip(base.rdns.iter())
            .all(|(a, b)| {
                a.matches_attribute(b.attribute()) && a.value().eq_ignore_ascii_case(b.value())
            })
    }
}

impl PartialEq for Dn {
    fn eq(&self, other: &Self) -> bool {
        self.raw.eq_ignore_ascii_case(&other.raw)
    }
}

impl Eq for Dn {}

impl std::hash::Hash for Dn {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Dn {
    type Err = DnError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Dn> for String {
    fn from(dn: Dn) -> Self {
        dn.raw
    }
}

fn split_escaped(input: &str) -> std::result::Result<Vec<String>, DnError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            current.push(ch);
            escape = false;
        } else if ch == '\\' {
            current.push(ch);
            escape = true;
        } else if ch == ',' {
            parts.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(ch);
        }
    }

    if escape {
        return Err(DnError::UnterminatedEscape);
    }

    parts.push(current.trim().to_string());
    if parts.iter().any(String::is_empty) {
        return Err(DnError::InvalidComponent(input.to_string()));
    }
    Ok(parts)
}

fn split_attribute_value(component: &str) -> std::result::Result<(String, String), DnError> {
    let idx = component
        .find('=')
        .ok_or_else(|| DnError::InvalidComponent(component.to_string()))?;

    let attribute = component[..idx].trim();
    let value = component[idx + 1..].trim_start();

    if attribute.is_empty() {
        return Err(DnError::MissingAttribute(component.to_string()));
    }
    if value.is_empty() {
        return Err(DnError::MissingValue(attribute.to_string()));
    }

    Ok((attribute.to_string(), unescape(value)?))
}

fn unescape(value: &str) -> std::result::Result<String, DnError> {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            let next = chars.next().ok_or(DnError::UnterminatedEscape)?;
            result.push(next);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn escape(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut escaped = String::with_capacity(value.len());

    for (idx, ch) in chars.iter().enumerate() {
        let needs_escape = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (idx == 0 && (*ch == ' ' || *ch == '#'))
            || (idx == chars.len() - 1 && *ch == ' ');

        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(*ch);
    }

    escaped
}

fn render(rdns: &[Rdn]) -> String {
    rdns.iter()
        .map(|rdn| format!("{}={}", rdn.attribute(), escape(rdn.value())))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_dn() {
        let dn = Dn::parse("cn=Jane Doe,ou=Users,dc=mirror").unwrap();
        assert_eq!(dn.get("cn"), Some("Jane Doe"));
        assert_eq!(dn.get("ou"), Some("Users"));
        assert_eq!(dn.leading().value(), "Jane Doe");
        assert_eq!(dn.to_string(), "cn=Jane Doe,ou=Users,dc=mirror");
    }

    #[test]
    fn parse_unescapes_and_render_reescapes() {
        let dn = Dn::parse("cn=Doe\\, Jane,ou=Users,dc=mirror").unwrap();
        assert_eq!(dn.leading().value(), "Doe, Jane");
        assert!(dn.as_str().starts_with("cn=Doe\\, Jane,"));
    }

    #[test]
    fn child_escapes_reserved_characters() {
        let base = Dn::parse("ou=Users,dc=mirror").unwrap();
        let dn = base.child("cn", "Doe, Jane");
        assert_eq!(dn.as_str(), "cn=Doe\\, Jane,ou=Users,dc=mirror");
        assert_eq!(dn.leading().value(), "Doe, Jane");
    }

    #[test]
    fn equality_is_case_insensitive() {
        let a = Dn::parse("CN=jane,OU=Users,DC=mirror").unwrap();
        let b = Dn::parse("cn=Jane,ou=users,dc=mirror").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parent_walks_up_one_level() {
        let dn = Dn::parse("cn=jane,ou=Users,dc=mirror").unwrap();
        let parent = dn.parent().unwrap();
        assert_eq!(parent.as_str(), "ou=Users,dc=mirror");
        assert!(Dn::parse("dc=mirror").unwrap().parent().is_none());
    }

    #[test]
    fn descendant_check() {
        let root = Dn::parse("dc=mirror").unwrap();
        let users = Dn::parse("ou=Users,dc=mirror").unwrap();
        let jane = Dn::parse("cn=jane,ou=Users,dc=mirror").unwrap();

        assert!(jane.is_descendant_of(&users));
        assert!(jane.is_descendant_of(&root));
        assert!(!users.is_descendant_of(&jane));
        assert!(!users.is_descendant_of(&users));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(matches!(Dn::parse(""), Err(DnError::Empty)));
        assert!(matches!(
            Dn::parse("cn=jane,"),
            Err(DnError::InvalidComponent(_))
        ));
        assert!(matches!(
            Dn::parse("=jane,dc=mirror"),
            Err(DnError::MissingAttribute(_))
        ));
        assert!(matches!(
            Dn::parse("cn=,dc=mirror"),
            Err(DnError::MissingValue(_))
        ));
        assert!(matches!(
            Dn::parse("cn=jane\\"),
            Err(DnError::UnterminatedEscape)
        ));
        assert!(matches!(
            Dn::parse("janedoe"),
            Err(DnError::InvalidComponent(_))
        ));
    }
}
