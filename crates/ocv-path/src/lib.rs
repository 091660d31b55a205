//! Structured gNMI xpath type: parsing, canonical form, wildcard matching

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid xpaths
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("empty element name")]
    EmptyElementName,

    #[error("unbalanced brackets in element '{element}'")]
    UnbalancedBrackets { element: String },

    #[error("key specifier '{group}' is missing '='")]
    MissingKeyValue { group: String },

    #[error("empty key name in element '{element}'")]
    EmptyKeyName { element: String },

    #[error("unexpected text between key specifiers in element '{element}'")]
    TextBetweenKeys { element: String },
}

/// One element of an xpath: a name plus optional `[key=value]` list keys.
///
/// Keys are held in a sorted map, so two elements that differ only in the
/// textual order of their key specifiers compare equal and render
/// identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathElement {
    name: String,
    keys: BTreeMap<String, String>,
}

impl PathElement {
    /// Element name (never empty).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// List keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value of a single list key, if present.
    pub fn key(&self, name: &str) -> Option<&str> {
        self.keys.get(name).map(String::as_str)
    }

    fn parse(segment: &str) -> Result<Self, PathError> {
        let (name, mut rest) = match segment.find('[') {
            Some(i) => (&segment[..i], &segment[i..]),
            None => (segment, ""),
        };
        if name.is_empty() {
            return Err(PathError::EmptyElementName);
        }

        let mut keys = BTreeMap::new();
        while !rest.is_empty() {
            if !rest.starts_with('[') {
                return Err(PathError::TextBetweenKeys {
                    element: segment.to_string(),
                });
            }
            let close = rest.find(']').ok_or_else(|| PathError::UnbalancedBrackets {
                element: segment.to_string(),
            })?;
            let group = &rest[1..close];
            // Split at the first '=': values may contain '=', keys may not.
            let eq = group.find('=').ok_or_else(|| PathError::MissingKeyValue {
                group: group.to_string(),
            })?;
            let (key, value) = (&group[..eq], &group[eq + 1..]);
            if key.is_empty() {
                return Err(PathError::EmptyKeyName {
                    element: segment.to_string(),
                });
            }
            keys.insert(key.to_string(), value.to_string());
            rest = &rest[close + 1..];
        }

        Ok(Self {
            name: name.to_string(),
            keys,
        })
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (key, value) in &self.keys {
            write!(f, "[{}={}]", key, value)?;
        }
        Ok(())
    }
}

/// A parsed gNMI xpath (e.g. `/interfaces/interface[name=eth0]/state`)
///
/// Paths are ordered element sequences; the empty sequence is the root path
/// and renders as `/`. Parsing accepts list-key values containing `/` (as in
/// `[name=ethernet1/2]`) and the wildcard value `*`. `Display` produces the
/// canonical form: leading `/`, no trailing `/`, keys in sorted order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    /// The root path `/`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse an xpath string into its structured form.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let body = s.strip_prefix('/').unwrap_or(s);
        let body = body.strip_suffix('/').unwrap_or(body);
        if body.is_empty() {
            return Ok(Self::root());
        }

        let mut elements = Vec::new();
        for segment in split_outside_brackets(body)? {
            elements.push(PathElement::parse(segment)?);
        }
        Ok(Self { elements })
    }

    /// True for the root path (no elements).
    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Last element, if any.
    pub fn leaf(&self) -> Option<&PathElement> {
        self.elements.last()
    }

    /// Append a relative suffix (e.g. `config/enabled`) to this path.
    pub fn join(&self, suffix: &str) -> Result<Self, PathError> {
        let tail = Self::parse(suffix)?;
        let mut elements = self.elements.clone();
        elements.extend(tail.elements);
        Ok(Self { elements })
    }

    /// Match this path against a pattern that may carry `*` wildcards.
    ///
    /// True when the pattern equals this path or addresses one of its
    /// ancestors, with `*` standing for any non-empty run of characters in
    /// the canonical form. The root pattern matches every path.
    pub fn matches(&self, pattern: &Path) -> bool {
        if pattern.is_root() {
            return true;
        }
        let escaped = regex::escape(&pattern.to_string()).replace("\\*", ".+");
        match Regex::new(&format!("^{}(/.*)?$", escaped)) {
            Ok(re) => re.is_match(&self.to_string()),
            Err(_) => false,
        }
    }

    /// True when this path matches at least one of the given patterns.
    pub fn matches_any(&self, patterns: &[Path]) -> bool {
        patterns.iter().any(|pattern| self.matches(pattern))
    }
}

/// String-level form of [`Path::matches_any`].
///
/// Parses the candidate and every pattern, then checks containment. Callers
/// holding raw xpath strings (subscription lists, model leaf paths) use this
/// instead of parsing on their own.
pub fn is_path_in(path: &str, patterns: &[&str]) -> Result<bool, PathError> {
    let candidate = Path::parse(path)?;
    let mut parsed = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        parsed.push(Path::parse(pattern)?);
    }
    Ok(candidate.matches_any(&parsed))
}

/// Split on `/` at bracket depth zero, so key values may contain `/`.
fn split_outside_brackets(body: &str) -> Result<Vec<&str>, PathError> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| PathError::UnbalancedBrackets {
                        element: body[start..].to_string(),
                    })?;
            }
            '/' if depth == 0 => {
                segments.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(PathError::UnbalancedBrackets {
            element: body[start..].to_string(),
        });
    }
    segments.push(&body[start..]);
    Ok(segments)
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Path {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Path> for String {
    fn from(path: Path) -> String {
        path.to_string()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elements.is_empty() {
            return write!(f, "/");
        }
        for element in &self.elements {
            write!(f, "/{}", element)?;
        }
        Ok(())
    }
}
