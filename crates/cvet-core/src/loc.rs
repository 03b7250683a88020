use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub file_id: u32,
    pub line: u32,
    pub column: u32,
}

pub const INVALID_SPAN: SourceSpan = SourceSpan {
    file_id: u32::MAX,
    line: 0,
    column: 0,
};

impl SourceSpan {
    pub fn new(file_id: u32, line: u32, column: u32) -> Self {
        Self {
            file_id,
            line,
            column,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.file_id != u32::MAX
    }
}

impl Default for SourceSpan {
    fn default() -> Self {
        INVALID_SPAN
    }
}

impl std::fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Registry of checked files; spans refer to files by id.
#[derive(Debug, Clone, Default)]
pub struct SourceFiles {
    paths: Vec<PathBuf>,
}

impl SourceFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: PathBuf) -> u32 {
        self.paths.push(path);
        (self.paths.len() - 1) as u32
    }

    pub fn path(&self, file_id: u32) -> Option<&PathBuf> {
        self.paths.get(file_id as usize)
    }

    pub fn display(&self, span: SourceSpan) -> String {
        match self.path(span.file_id) {
            Some(p) => format!("{}:{}:{}", p.display(), span.line, span.column),
            None => format!("<unknown>:{}:{}", span.line, span.column),
        }
    }
}
