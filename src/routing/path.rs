//! Path patterns and request path splitting.
//!
//! Pattern syntax: `/literal/:name/*rest`. A `:name` segment matches exactly
//! one path segment, a `*name` segment matches all remaining segments
//! (including none) and must come last.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Wildcard bindings captured during lookup.
pub type Params = HashMap<String, String>;

/// One segment of a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Wildcard(String),
    FreeWildcard(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path {0:?} is not absolute")]
    NotAbsolute(String),

    #[error("free wildcard must be the last segment in {0:?}")]
    FreeWildcardNotLast(String),
}

/// A parsed path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PathError> {
        if !pattern.starts_with('/') {
            return Err(PathError::NotAbsolute(pattern.to_string()));
        }

        let parts = split_path(pattern);
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix(':') {
                Segment::Wildcard(name.to_string())
            } else if let Some(name) = part.strip_prefix('*') {
                if i + 1 != parts.len() {
                    return Err(PathError::FreeWildcardNotLast(pattern.to_string()));
                }
                Segment::FreeWildcard(name.to_string())
            } else {
                Segment::Literal(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Collects the wildcard bindings of this pattern against a request
    /// path that is already known to match it structurally.
    pub fn bind(&self, path: &[&str]) -> Params {
        let mut params = Params::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(_) => {}
                Segment::Wildcard(name) => {
                    if let Some(value) = path.get(i) {
                        params.insert(name.clone(), (*value).to_string());
                    }
                }
                Segment::FreeWildcard(name) => {
                    let rest = path.get(i..).unwrap_or_default();
                    params.insert(name.clone(), format!("/{}", rest.join("/")));
                }
            }
        }
        params
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Splits a path into its non-empty segments.
///
/// `/a/b`, `/a/b/` and `//a//b` all yield `["a", "b"]`. No decoding or case
/// folding is applied.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        let pattern = PathPattern::parse("/api/:version/users/*rest").unwrap();
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Literal("api".into()),
                Segment::Wildcard("version".into()),
                Segment::Literal("users".into()),
                Segment::FreeWildcard("rest".into()),
            ]
        );
        assert_eq!(pattern.as_str(), "/api/:version/users/*rest");
    }

    #[test]
    fn test_root_pattern_has_no_segments() {
        assert!(PathPattern::parse("/").unwrap().segments().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            PathPattern::parse("api/v1"),
            Err(PathError::NotAbsolute("api/v1".into()))
        );
        assert!(matches!(
            PathPattern::parse("/files/*rest/tail"),
            Err(PathError::FreeWildcardNotLast(_))
        ));
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/a/b"), vec!["a", "b"]);
        assert_eq!(split_path("/a/b/"), vec!["a", "b"]);
        assert_eq!(split_path("//a//b"), vec!["a", "b"]);
        assert!(split_path("/").is_empty());
        assert_eq!(split_path("/A%20b"), vec!["A%20b"]);
    }

    #[test]
    fn test_bind() {
        let pattern = PathPattern::parse("/users/:id/files/*path").unwrap();
        let params = pattern.bind(&["users", "42", "files", "a", "b.txt"]);
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert_eq!(params.get("path").map(String::as_str), Some("/a/b.txt"));

        let params = pattern.bind(&["users", "42", "files"]);
        assert_eq!(params.get("path").map(String::as_str), Some("/"));
    }
}
