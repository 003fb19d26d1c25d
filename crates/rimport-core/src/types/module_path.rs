//! Dotted module paths and namespace prefixes.

use crate::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A dotted module path such as `demo.a.b`, stored as its segments.
///
/// Namespace prefixes use the same type: a prefix matches a module path when
/// the path's segments start with the prefix's segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModulePath {
    segments: Vec<String>,
}

impl ModulePath {
    /// Parse a dotted module path
    pub fn parse(path: &str) -> ImportResult<Self> {
        let invalid = |reason: &str| ImportError::InvalidModulePath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if path.is_empty() {
            return Err(invalid("module path is empty"));
        }

        let mut segments = Vec::new();
        for segment in path.split('.') {
            if segment.is_empty() {
                return Err(invalid("empty segment"));
            }
            if !Self::is_valid_segment(segment) {
                return Err(invalid(&format!("'{}' is not an identifier", segment)));
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    /// Check if a single segment is a valid identifier
    pub fn is_valid_segment(segment: &str) -> bool {
        let mut chars = segment.chars();
        match chars.next() {
            Some(first) if first.is_alphabetic() || first == '_' => {
                chars.all(|c| c.is_alphanumeric() || c == '_')
            },
            _ => false,
        }
    }

    /// The individual segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; a module path has at least one segment
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment (`c` for `a.b.c`)
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Segment-wise prefix test: `a.b.c` starts with `a.b` but not with `a.bc`
    pub fn starts_with(&self, prefix: &ModulePath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments.iter().zip(&prefix.segments).all(|(a, b)| a == b)
    }

    /// Parent package, if any
    pub fn parent(&self) -> Option<ModulePath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Child module with the given segment
    pub fn child(&self, name: &str) -> ImportResult<ModulePath> {
        if !Self::is_valid_segment(name) {
            return Err(ImportError::InvalidModulePath {
                path: format!("{}.{}", self, name),
                reason: format!("'{}' is not an identifier", name),
            });
        }
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self { segments })
    }

    /// Filesystem-like relative path, segments joined with `/`
    pub fn to_relative_path(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for ModulePath {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ModulePath {
    type Error = ImportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModulePath> for String {
    fn from(path: ModulePath) -> Self {
        path.to_string()
    }
}
