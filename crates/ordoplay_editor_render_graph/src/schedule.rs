// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pass scheduling and resource alias canonicalization.

use crate::pipeline::Pass;
use std::collections::{BTreeSet, HashMap};

/// Result of scheduling a pass list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    /// Indices into the scheduled pass list, in execution order
    pub order: Vec<usize>,
    /// In-place aliases: resource name to the canonical name it shares a buffer with
    pub canonical: HashMap<String, String>,
}

/// Orders passes so every resource is written before it is read
pub trait Scheduler: Send + Sync {
    /// Order the passes and canonicalize in-place alias chains
    fn schedule(&self, passes: &[Pass]) -> Result<Schedule, ScheduleError>;
}

/// Default scheduler: Kahn's algorithm over writer -> reader edges.
///
/// Ties are broken by position in the input list, so an already valid order
/// is kept unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologicalScheduler;

impl Scheduler for TopologicalScheduler {
    fn schedule(&self, passes: &[Pass]) -> Result<Schedule, ScheduleError> {
        let mut writers: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, pass) in passes.iter().enumerate() {
            for name in pass.writes() {
                writers.entry(name).or_default().push(index);
            }
        }

        let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); passes.len()];
        for (reader, pass) in passes.iter().enumerate() {
            for name in pass.reads() {
                for &writer in writers.get(name).into_iter().flatten() {
                    if writer != reader {
                        successors[writer].insert(reader);
                    }
                }
            }
        }

        let mut in_degree = vec![0usize; passes.len()];
        for edges in &successors {
            for &next in edges {
                in_degree[next] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = (0..passes.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(passes.len());
        while let Some(index) = ready.pop_first() {
            order.push(index);
            for &next in &successors[index] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() < passes.len() {
            let remaining = (0..passes.len())
                .filter(|&i| in_degree[i] > 0)
                .map(|i| passes[i].name.clone())
                .collect();
            return Err(ScheduleError::Cycle(remaining));
        }

        let ordered: Vec<&Pass> = order.iter().map(|&i| &passes[i]).collect();
        Ok(Schedule {
            canonical: AliasSet::from_passes(ordered).into_map(),
            order,
        })
    }
}

/// Disjoint set of resource names that share one buffer.
///
/// The first assignment of a name wins: once a name points at a buffer,
/// later assignments of the same name are ignored.
#[derive(Debug, Clone, Default)]
pub struct AliasSet {
    parent: HashMap<String, String>,
}

impl AliasSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the in-place declarations of passes, in the given order
    pub fn from_passes<'a>(passes: impl IntoIterator<Item = &'a Pass>) -> Self {
        let mut set = Self::new();
        for pass in passes {
            for alias in &pass.inplace {
                set.assign(&alias.output, &alias.input);
            }
        }
        set
    }

    /// Build from a name -> canonical map
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let mut entries: Vec<(&String, &String)> = map.iter().collect();
        entries.sort();
        let mut set = Self::new();
        for (alias, target) in entries {
            set.assign(alias, target);
        }
        set
    }

    /// Record that `alias` shares the buffer of `target`.
    ///
    /// Returns `false` when the alias was already assigned or the assignment
    /// would close a cycle.
    pub fn assign(&mut self, alias: &str, target: &str) -> bool {
        if alias == target || self.parent.contains_key(alias) {
            return false;
        }
        let root = self.find(target);
        if root == alias {
            return false;
        }
        self.parent.insert(alias.to_string(), root);
        true
    }

    /// Canonical name of a resource, compressing the path walked
    pub fn find(&mut self, name: &str) -> String {
        let root = self.canonical(name);
        let mut current = name.to_string();
        while let Some(next) = self.parent.get(&current).cloned() {
            if next == root {
                break;
            }
            self.parent.insert(current, root.clone());
            current = next;
        }
        root
    }

    /// Canonical name of a resource without modifying the set
    pub fn canonical(&self, name: &str) -> String {
        let mut current = name;
        while let Some(next) = self.parent.get(current) {
            current = next;
        }
        current.to_string()
    }

    /// Number of aliased names
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Whether no alias was recorded
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Flatten to name -> canonical name
    pub fn into_map(self) -> HashMap<String, String> {
        self.parent
            .keys()
            .map(|name| (name.clone(), self.canonical(name)))
            .collect()
    }
}

/// Error raised by a scheduler
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    /// Passes depend on each other
    #[error("Pass dependencies contain a cycle: {0:?}")]
    Cycle(Vec<String>),

    /// Scheduler returned something other than a permutation of the passes
    #[error("Scheduler returned an invalid order: {0}")]
    InvalidOrder(String),
}
