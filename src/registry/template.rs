//! Resource address templates
//!
//! A template is `scheme://seg/seg/...` where each segment is either a
//! literal or a `{param}` placeholder. Matching is exact per segment; there
//! are no wildcards, optional segments or query strings.

use crate::{Error, Result};

/// Separator between scheme and path
pub const SCHEME_SEPARATOR: &str = "://";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Parsed resource address template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    scheme: String,
    segments: Vec<Segment>,
}

/// Split an address into scheme and path segments.
///
/// `survey://` has no segments; an empty segment anywhere else is rejected.
fn split(address: &str) -> Option<(&str, Vec<&str>)> {
    let (scheme, path) = address.split_once(SCHEME_SEPARATOR)?;
    if scheme.is_empty() {
        return None;
    }
    if path.is_empty() {
        return Some((scheme, Vec::new()));
    }
    let segments: Vec<&str> = path.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some((scheme, segments))
}

impl UriTemplate {
    /// Parse a template such as `participant://{token}/survey/{sid}`
    pub fn parse(template: &str) -> Result<Self> {
        let (scheme, raw_segments) = split(template)
            .ok_or_else(|| Error::Config(format!("Invalid resource template: {template}")))?;

        let mut segments = Vec::with_capacity(raw_segments.len());
        for raw in raw_segments {
            let segment = match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) if !name.is_empty() && !name.contains(['{', '}']) => {
                    Segment::Param(name.to_string())
                }
                Some(_) => {
                    return Err(Error::Config(format!(
                        "Invalid placeholder '{raw}' in resource template {template}"
                    )));
                }
                None if raw.contains(['{', '}']) => {
                    return Err(Error::Config(format!(
                        "Stray brace in segment '{raw}' of resource template {template}"
                    )));
                }
                None => Segment::Literal(raw.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            scheme: scheme.to_string(),
            segments,
        })
    }

    /// Placeholder names in path order
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Number of literal path segments, used to rank competing matches
    #[must_use]
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Whether the template has no placeholders
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        self.params().next().is_none()
    }

    /// Match an address, returning placeholder bindings in path order
    #[must_use]
    pub fn matches(&self, address: &str) -> Option<Vec<(String, String)>> {
        let (scheme, segments) = split(address)?;
        if scheme != self.scheme || segments.len() != self.segments.len() {
            return None;
        }

        let mut bindings = Vec::new();
        for (pattern, actual) in self.segments.iter().zip(segments) {
            match pattern {
                Segment::Literal(literal) if literal == actual => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => bindings.push((name.clone(), actual.to_string())),
            }
        }
        Some(bindings)
    }
}
