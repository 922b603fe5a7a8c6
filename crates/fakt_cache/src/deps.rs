//! Contract dependency tracking and invalidation.
//!
//! Edges point from a dependent contract to the contracts it references. A
//! reverse index answers "who depends on X" without scanning every entry.
//! Traversals keep a visited set, so cyclic input always terminates.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::store::StoreEntry;

/// Directed dependency edges between contracts, keyed by fully-qualified name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    forward: BTreeMap<String, BTreeSet<String>>,
    reverse: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from the dependency sets recorded in store entries.
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = (&'a String, &'a StoreEntry)>,
    ) -> Self {
        let mut graph = Self::new();
        for (name, entry) in entries {
            graph.record_dependencies(name, entry.depends_on.iter().cloned());
        }
        graph
    }

    /// Replaces the dependency set of `contract`.
    pub fn record_dependencies(
        &mut self,
        contract: &str,
        depends_on: impl IntoIterator<Item = String>,
    ) {
        self.remove(contract);
        let deps: BTreeSet<String> = depends_on.into_iter().collect();
        for dep in &deps {
            self.reverse
                .entry(dep.clone())
                .or_default()
                .insert(contract.to_string());
        }
        if !deps.is_empty() {
            self.forward.insert(contract.to_string(), deps);
        }
    }

    /// Drops the outgoing edges of `contract`. Edges pointing at it stay.
    pub fn remove(&mut self, contract: &str) {
        let Some(old) = self.forward.remove(contract) else {
            return;
        };
        for dep in old {
            if let Some(dependents) = self.reverse.get_mut(&dep) {
                dependents.remove(contract);
                if dependents.is_empty() {
                    self.reverse.remove(&dep);
                }
            }
        }
    }

    /// Returns the recorded dependencies of `contract`.
    pub fn dependencies_of(&self, contract: &str) -> BTreeSet<String> {
        self.forward.get(contract).cloned().unwrap_or_default()
    }

    /// Returns every contract whose dependency set contains `changed`.
    pub fn find_dependents(&self, changed: &str) -> BTreeSet<String> {
        self.reverse.get(changed).cloned().unwrap_or_default()
    }

    /// Returns every contract that depends on `changed` directly or transitively.
    ///
    /// `changed` itself is included only when it lies on a dependency cycle.
    pub fn find_transitive_dependents(&self, changed: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([changed]);
        while let Some(current) = queue.pop_front() {
            let Some(dependents) = self.reverse.get(current) else {
                continue;
            };
            for dependent in dependents {
                if found.insert(dependent.clone()) {
                    queue.push_back(dependent);
                }
            }
        }
        found
    }

    /// Returns the union of transitive dependents of every name in `changed`.
    pub fn invalidated_by<'a>(
        &self,
        changed: impl IntoIterator<Item = &'a String>,
    ) -> BTreeSet<String> {
        changed
            .into_iter()
            .flat_map(|name| self.find_transitive_dependents(name))
            .collect()
    }

    /// Returns the number of contracts with at least one dependency.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns `true` if no edges are recorded.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fakt_common::Signature;
    use proptest::prelude::*;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn deps(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn direct_dependents() {
        let mut g = DependencyGraph::new();
        g.record_dependencies("A", deps(&["B"]));
        g.record_dependencies("C", deps(&["B", "D"]));
        assert_eq!(g.find_dependents("B"), names(&["A", "C"]));
        assert_eq!(g.find_dependents("D"), names(&["C"]));
        assert!(g.find_dependents("A").is_empty());
    }

    #[test]
    fn record_replaces_prior_edges() {
        let mut g = DependencyGraph::new();
        g.record_dependencies("A", deps(&["B"]));
        g.record_dependencies("A", deps(&["C"]));
        assert!(g.find_dependents("B").is_empty());
        assert_eq!(g.find_dependents("C"), names(&["A"]));
        assert_eq!(g.dependencies_of("A"), names(&["C"]));
    }

    #[test]
    fn empty_set_clears() {
        let mut g = DependencyGraph::new();
        g.record_dependencies("A", deps(&["B"]));
        g.record_dependencies("A", Vec::new());
        assert!(g.is_empty());
        assert!(g.find_dependents("B").is_empty());
    }

    #[test]
    fn transitive_chain() {
        let mut g = DependencyGraph::new();
        g.record_dependencies("A", deps(&["B"]));
        g.record_dependencies("B", deps(&["C"]));
        g.record_dependencies("X", deps(&["A"]));
        assert_eq!(g.find_transitive_dependents("C"), names(&["A", "B", "X"]));
        assert_eq!(g.find_transitive_dependents("A"), names(&["X"]));
    }

    #[test]
    fn cycle_terminates_and_includes_self() {
        let mut g = DependencyGraph::new();
        g.record_dependencies("A", deps(&["B"]));
        g.record_dependencies("B", deps(&["A"]));
        assert_eq!(g.find_transitive_dependents("A"), names(&["A", "B"]));
    }

    #[test]
    fn self_dependency() {
        let mut g = DependencyGraph::new();
        g.record_dependencies("A", deps(&["A"]));
        assert_eq!(g.find_transitive_dependents("A"), names(&["A"]));
    }

    #[test]
    fn unknown_name_has_no_dependents() {
        let g = DependencyGraph::new();
        assert!(g.find_transitive_dependents("Nope").is_empty());
    }

    #[test]
    fn invalidated_by_unions() {
        let mut g = DependencyGraph::new();
        g.record_dependencies("A", deps(&["B"]));
        g.record_dependencies("C", deps(&["D"]));
        let changed = names(&["B", "D"]);
        assert_eq!(g.invalidated_by(&changed), names(&["A", "C"]));
    }

    #[test]
    fn remove_keeps_incoming_edges() {
        let mut g = DependencyGraph::new();
        g.record_dependencies("A", deps(&["B"]));
        g.record_dependencies("B", deps(&["C"]));
        g.remove("B");
        assert_eq!(g.find_dependents("B"), names(&["A"]));
        assert!(g.find_dependents("C").is_empty());
    }

    #[test]
    fn from_store_entries() {
        let sig = Signature::from_content(b"x");
        let mut entries = BTreeMap::new();
        entries.insert(
            "A".to_string(),
            StoreEntry::new(sig).with_dependencies(names(&["B"])),
        );
        entries.insert("B".to_string(), StoreEntry::new(sig));
        let g = DependencyGraph::from_entries(&entries);
        assert_eq!(g.find_dependents("B"), names(&["A"]));
        assert_eq!(g.len(), 1);
    }

    fn edge_list() -> impl Strategy<Value = Vec<(u8, u8)>> {
        prop::collection::vec((0u8..12, 0u8..12), 0..40)
    }

    fn build(edges: &[(u8, u8)]) -> DependencyGraph {
        let mut adj: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (from, to) in edges {
            adj.entry(format!("N{from}"))
                .or_default()
                .insert(format!("N{to}"));
        }
        let mut g = DependencyGraph::new();
        for (name, set) in adj {
            g.record_dependencies(&name, set);
        }
        g
    }

    proptest! {
        #[test]
        fn dependents_are_closed_under_dependents(edges in edge_list(), start in 0u8..12) {
            let g = build(&edges);
            let start = format!("N{start}");
            let closure = g.find_transitive_dependents(&start);
            for name in &closure {
                for dependent in g.find_dependents(name) {
                    prop_assert!(closure.contains(&dependent));
                }
            }
            for direct in g.find_dependents(&start) {
                prop_assert!(closure.contains(&direct));
            }
        }

        #[test]
        fn every_dependent_reaches_start(edges in edge_list(), start in 0u8..12) {
            let g = build(&edges);
            let start = format!("N{start}");
            for name in g.find_transitive_dependents(&start) {
                // Walking forward edges from a dependent must reach the start
                let mut seen = BTreeSet::new();
                let mut stack = vec![name.clone()];
                let mut reached = false;
                while let Some(n) = stack.pop() {
                    for dep in g.dependencies_of(&n) {
                        if dep == start {
                            reached = true;
                        }
                        if seen.insert(dep.clone()) {
                            stack.push(dep);
                        }
                    }
                }
                prop_assert!(reached);
            }
        }
    }
}
