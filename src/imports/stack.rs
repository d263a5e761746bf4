//! Cycle guard for recursive expansion.
//!
//! An [`ExpansionStack`] holds the canonical paths of files currently being
//! expanded along one recursive chain. It is passed down by value: each
//! nested expansion gets its own extended copy via [`ExpansionStack::descend`],
//! so sibling imports never see each other's entries. Diamonds (the same file
//! imported twice by non-nested siblings) are therefore allowed while
//! back-edges are rejected.

use std::path::{Path, PathBuf};

/// Ordered set of canonical paths mid-expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionStack {
    paths: Vec<PathBuf>,
}

impl ExpansionStack {
    /// An empty stack, used when expanding text that has no file of origin.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            paths: Vec::new(),
        }
    }

    /// A stack seeded with the root document.
    #[must_use]
    pub fn root(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
        }
    }

    /// Whether `path` is already being expanded on this chain.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Push `path`, or return the rendered cycle chain if it is already present.
    pub fn push(&mut self, path: impl Into<PathBuf>) -> Result<(), String> {
        let path = path.into();
        if self.contains(&path) {
            return Err(self.chain_with(&path));
        }
        self.paths.push(path);
        Ok(())
    }

    /// Leave the innermost expansion.
    pub fn pop(&mut self) -> Option<PathBuf> {
        self.paths.pop()
    }

    /// A copy of this stack extended with `path`, for a nested expansion.
    pub fn descend(&self, path: &Path) -> Result<Self, String> {
        let mut next = self.clone();
        next.push(path)?;
        Ok(next)
    }

    /// Render the chain as `A -> B -> path`.
    #[must_use]
    pub fn chain_with(&self, path: &Path) -> String {
        self.paths
            .iter()
            .map(|p| p.as_path())
            .chain(std::iter::once(path))
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Depth of the current chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether nothing is being expanded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
