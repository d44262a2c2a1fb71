//! The authoritative breakpoint set.
//!
//! The store is the source of truth; the adapter only ever hears complete
//! per-path sets (`setBreakpoints`) or the complete function list
//! (`setFunctionBreakpoints`), never deltas. Mutation methods report whether
//! anything changed so the backend reconciles exactly when needed.

use crate::types::{Breakpoint, FunctionBreakpoint, SourceBreakpoint};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

#[derive(Default)]
pub struct BreakpointStore {
    sources: IndexMap<PathBuf, Vec<SourceBreakpoint>>,
    functions: Vec<FunctionBreakpoint>,
}

impl BreakpointStore {
    /// Append a source breakpoint unless one already exists at that line.
    pub fn add_source(&mut self, path: &Path, breakpoint: SourceBreakpoint) -> bool {
        let entries = self.sources.entry(path.to_path_buf()).or_default();
        if entries.iter().any(|existing| existing.line == breakpoint.line) {
            return false;
        }
        entries.push(breakpoint);
        true
    }

    /// Drop the breakpoint at `line`; the path entry disappears with its last
    /// breakpoint.
    pub fn remove_source(&mut self, path: &Path, line: u32) -> bool {
        let Some(entries) = self.sources.get_mut(path) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|breakpoint| breakpoint.line != line);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.sources.shift_remove(path);
        }
        removed
    }

    /// The complete per-path set, in insertion order. Empty for unknown paths
    /// (which is exactly what reconciliation sends for a cleared path).
    pub fn source_set(&self, path: &Path) -> Vec<SourceBreakpoint> {
        self.sources.get(path).cloned().unwrap_or_default()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.sources.keys().cloned().collect()
    }

    pub fn add_function(&mut self, breakpoint: FunctionBreakpoint) -> bool {
        if self.functions.iter().any(|existing| existing.name == breakpoint.name) {
            return false;
        }
        self.functions.push(breakpoint);
        true
    }

    pub fn remove_function(&mut self, name: &str) -> bool {
        let before = self.functions.len();
        self.functions.retain(|breakpoint| breakpoint.name != name);
        self.functions.len() != before
    }

    pub fn function_set(&self) -> Vec<FunctionBreakpoint> {
        self.functions.clone()
    }

    pub fn has_functions(&self) -> bool {
        !self.functions.is_empty()
    }

    /// Snapshot of everything, sources first in path insertion order.
    pub fn all(&self) -> Vec<Breakpoint> {
        let sources = self.sources.iter().flat_map(|(path, entries)| {
            entries.iter().map(|breakpoint| Breakpoint::Source {
                path: path.clone(),
                breakpoint: breakpoint.clone(),
            })
        });
        let functions = self.functions.iter().cloned().map(Breakpoint::Function);
        sources.chain(functions).collect()
    }

    /// Drop everything; returns the source paths that held breakpoints.
    pub fn clear(&mut self) -> Vec<PathBuf> {
        let paths = self.paths();
        self.sources.clear();
        self.functions.clear();
        paths
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.functions.is_empty()
    }
}
