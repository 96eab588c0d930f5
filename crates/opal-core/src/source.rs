//! Source file management for diagnostics.
//!
//! The [`SourceMap`] owns every source file fed to a compilation and hands
//! out [`SourceId`]s so diagnostics can point back into the right file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub u32);

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// A source file with its content and metadata.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: SourceId,
    /// Optional file path (None for inline sources).
    pub path: Option<PathBuf>,
    pub content: String,
}

impl Source {
    /// Display name for this source.
    pub fn name(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("<source#{}>", self.id.0))
    }

    /// Line and column (1-based) for a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let mut line = 1;
        let mut col = 1;
        for (i, ch) in self.content.char_indices() {
            if i >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }

    /// A numbered snippet of the line at `line`.
    pub fn snippet(&self, line: usize) -> String {
        self.content
            .lines()
            .nth(line.saturating_sub(1))
            .map(|l| format!("{:4} | {}", line, l))
            .unwrap_or_default()
    }
}

/// Collection of all source files in a compilation.
#[derive(Debug, Default, Clone)]
pub struct SourceMap {
    sources: Vec<Source>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source file with a path.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> SourceId {
        let id = SourceId(self.sources.len() as u32);
        self.sources.push(Source {
            id,
            path: Some(path.into()),
            content: content.into(),
        });
        id
    }

    /// Add an inline source (no path).
    pub fn add_inline(&mut self, content: impl Into<String>) -> SourceId {
        let id = SourceId(self.sources.len() as u32);
        self.sources.push(Source {
            id,
            path: None,
            content: content.into(),
        });
        id
    }

    pub fn get(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(id.0 as usize)
    }
}

/// A byte range in one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub source: SourceId,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(source: SourceId, start: usize, end: usize) -> Self {
        Self { source, start, end }
    }

    /// Merge two spans of the same source (smallest start to largest end).
    pub fn merge(self, other: Self) -> Self {
        debug_assert_eq!(self.source, other.source);
        Self {
            source: self.source,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self {
            source: SourceId(0),
            start: 0,
            end: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_counts_from_one() {
        let mut map = SourceMap::new();
        let id = map.add_inline("ab\ncd\n");
        let src = map.get(id).unwrap();
        assert_eq!(src.line_col(0), (1, 1));
        assert_eq!(src.line_col(3), (2, 1));
        assert_eq!(src.line_col(4), (2, 2));
    }

    #[test]
    fn merge_spans() {
        let a = Span::new(SourceId(0), 4, 8);
        let b = Span::new(SourceId(0), 6, 12);
        let m = a.merge(b);
        assert_eq!((m.start, m.end), (4, 12));
    }
}
