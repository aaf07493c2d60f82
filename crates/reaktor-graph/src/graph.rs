//! Module dependency graph construction and topological sorting.
//!
//! Only dependencies between modules of the same reactor become edges;
//! references to anything outside the module set are ignored here and left
//! to artifact resolution. The sort is deterministic: modules with no
//! ordering constraint between them keep their input order.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::debug;

use reaktor_core::module::{Module, ModuleId};
use reaktor_util::errors::{ReaktorError, ReaktorResult};

/// A directed acyclic graph over the reactor's modules.
///
/// Construction fails on duplicate modules and dependency cycles; once
/// built, the graph is immutable.
#[derive(Debug)]
pub struct ModuleGraph {
    graph: DiGraph<ModuleId, ()>,
    indices: HashMap<String, NodeIndex>,
    modules: HashMap<ModuleId, Module>,
    /// Direct intra-reactor dependencies in declaration order.
    direct: HashMap<ModuleId, Vec<ModuleId>>,
    order: Vec<ModuleId>,
    position: HashMap<ModuleId, usize>,
}

/// DFS visit state.
#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl ModuleGraph {
    /// Build the graph from a list of modules and their declared dependencies.
    ///
    /// Modules are matched by `group:artifact`; the declared version is not
    /// consulted when deciding whether a dependency points into the reactor.
    pub fn build(modules: Vec<Module>) -> ReaktorResult<Self> {
        let mut graph = DiGraph::new();
        let mut indices: HashMap<String, NodeIndex> = HashMap::new();
        let mut by_key: HashMap<String, ModuleId> = HashMap::new();

        for module in &modules {
            let key = module.id.key();
            if by_key.contains_key(&key) {
                return Err(ReaktorError::DuplicateModule {
                    id: module.id.to_string(),
                }
                .into());
            }
            let idx = graph.add_node(module.id.clone());
            indices.insert(key.clone(), idx);
            by_key.insert(key, module.id.clone());
        }

        // Collect intra-reactor edges, keeping declaration order and
        // dropping repeats of the same dependency.
        let mut direct: HashMap<ModuleId, Vec<ModuleId>> = HashMap::new();
        for module in &modules {
            let mut deps = Vec::new();
            let mut seen = HashSet::new();
            for declared in &module.dependencies {
                let key = declared.key();
                if key == module.id.key() {
                    // A self-edge is the smallest possible cycle.
                    return Err(ReaktorError::Cycle {
                        members: vec![module.id.to_string(), module.id.to_string()],
                    }
                    .into());
                }
                if let Some(target) = by_key.get(&key) {
                    if seen.insert(key) {
                        graph.add_edge(indices[&module.id.key()], indices[&target.key()], ());
                        deps.push(target.clone());
                    }
                }
            }
            direct.insert(module.id.clone(), deps);
        }

        let order = topological_sort(&modules, &direct)?;
        let position: HashMap<ModuleId, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        debug!(modules = order.len(), "module graph sorted");

        Ok(Self {
            graph,
            indices,
            modules: modules.into_iter().map(|m| (m.id.clone(), m)).collect(),
            direct,
            order,
            position,
        })
    }

    /// Modules in topological order, dependencies first.
    pub fn sorted_order(&self) -> &[ModuleId] {
        &self.order
    }

    /// Look up a module by identity.
    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    /// Topological position of a module, for deterministic ordering of
    /// query results.
    pub fn position(&self, id: &ModuleId) -> Option<usize> {
        self.position.get(id).copied()
    }

    /// Dependencies of `id`, direct or transitive, in global topological order.
    pub fn dependencies(&self, id: &ModuleId, transitive: bool) -> ReaktorResult<Vec<ModuleId>> {
        let deps = self
            .direct
            .get(id)
            .ok_or_else(|| ReaktorError::UnknownModule { id: id.to_string() })?;
        let mut result: Vec<ModuleId> = if transitive {
            let mut visited = HashSet::new();
            let mut stack: Vec<&ModuleId> = deps.iter().collect();
            while let Some(dep) = stack.pop() {
                if visited.insert(dep.clone()) {
                    stack.extend(self.direct[dep].iter());
                }
            }
            visited.into_iter().collect()
        } else {
            deps.clone()
        };
        result.sort_by_key(|m| self.position[m]);
        Ok(result)
    }

    /// Modules that depend on `id`, direct or transitive, in global
    /// topological order.
    pub fn dependents(&self, id: &ModuleId, transitive: bool) -> ReaktorResult<Vec<ModuleId>> {
        let idx = self
            .indices
            .get(&id.key())
            .ok_or_else(|| ReaktorError::UnknownModule { id: id.to_string() })?;
        let mut visited = HashSet::new();
        let mut stack = vec![*idx];
        while let Some(current) = stack.pop() {
            for neighbor in self.graph.neighbors_directed(current, Direction::Incoming) {
                if visited.insert(neighbor) && transitive {
                    stack.push(neighbor);
                }
            }
        }
        let mut result: Vec<ModuleId> = visited.into_iter().map(|i| self.graph[i].clone()).collect();
        result.sort_by_key(|m| self.position[m]);
        Ok(result)
    }

    /// Number of modules in the reactor.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Depth-first topological sort with cycle detection.
///
/// Modules are visited in input order and dependencies in declaration
/// order, so unrelated modules keep stable input-order ties. A back-edge
/// produces `Cycle` with the members in encounter order, closed by
/// repeating the first member.
fn topological_sort<'a>(
    modules: &'a [Module],
    direct: &'a HashMap<ModuleId, Vec<ModuleId>>,
) -> ReaktorResult<Vec<ModuleId>> {
    let mut marks: HashMap<&ModuleId, Mark> = modules.iter().map(|m| (&m.id, Mark::Unvisited)).collect();
    let mut order = Vec::with_capacity(modules.len());
    let mut path: Vec<&ModuleId> = Vec::new();

    fn visit<'a>(
        id: &'a ModuleId,
        direct: &'a HashMap<ModuleId, Vec<ModuleId>>,
        marks: &mut HashMap<&'a ModuleId, Mark>,
        path: &mut Vec<&'a ModuleId>,
        order: &mut Vec<ModuleId>,
    ) -> Result<(), ReaktorError> {
        marks.insert(id, Mark::InProgress);
        path.push(id);
        for dep in &direct[id] {
            match marks[dep] {
                Mark::Done => {}
                Mark::Unvisited => visit(dep, direct, marks, path, order)?,
                Mark::InProgress => {
                    let start = path.iter().position(|m| *m == dep).unwrap_or(0);
                    let mut members: Vec<String> =
                        path[start..].iter().map(|m| m.to_string()).collect();
                    members.push(dep.to_string());
                    return Err(ReaktorError::Cycle { members });
                }
            }
        }
        path.pop();
        marks.insert(id, Mark::Done);
        order.push(id.clone());
        Ok(())
    }

    for module in modules {
        if marks[&module.id] == Mark::Unvisited {
            visit(&module.id, direct, &mut marks, &mut path, &mut order)?;
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str, deps: &[&str]) -> Module {
        let mut m = Module::new(ModuleId::new("com.example", name, "1.0"), name);
        for dep in deps {
            m = m.with_dependency(ModuleId::new("com.example", dep, "1.0"));
        }
        m
    }

    fn id(name: &str) -> ModuleId {
        ModuleId::new("com.example", name, "1.0")
    }

    fn names(ids: &[ModuleId]) -> Vec<String> {
        ids.iter().map(|m| m.artifact.clone()).collect()
    }

    #[test]
    fn sorted_order_respects_edges() {
        let graph = ModuleGraph::build(vec![
            module("app", &["lib", "util"]),
            module("lib", &["util"]),
            module("util", &[]),
        ])
        .unwrap();
        let order = names(graph.sorted_order());
        assert_eq!(order, ["util", "lib", "app"]);
    }

    #[test]
    fn unrelated_modules_keep_input_order() {
        let graph = ModuleGraph::build(vec![
            module("c", &[]),
            module("a", &[]),
            module("b", &[]),
        ])
        .unwrap();
        assert_eq!(names(graph.sorted_order()), ["c", "a", "b"]);
    }

    #[test]
    fn external_dependencies_are_ignored() {
        let mut m = module("app", &[]);
        m = m.with_dependency(ModuleId::new("org.external", "guava", "33.0"));
        let graph = ModuleGraph::build(vec![m]).unwrap();
        assert!(graph.dependencies(&id("app"), false).unwrap().is_empty());
    }

    #[test]
    fn cycle_is_detected_and_named() {
        let err = ModuleGraph::build(vec![
            module("a", &["b"]),
            module("b", &["c"]),
            module("c", &["a"]),
        ])
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cycle"), "got: {msg}");
        assert!(
            msg.contains("com.example:a:1.0 -> com.example:b:1.0 -> com.example:c:1.0 -> com.example:a:1.0"),
            "got: {msg}"
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        assert!(ModuleGraph::build(vec![module("a", &["a"])]).is_err());
    }

    #[test]
    fn duplicate_module_rejected() {
        let err = ModuleGraph::build(vec![module("a", &[]), module("a", &[])]).unwrap_err();
        assert!(err.to_string().contains("Duplicate module"), "got: {err}");
    }

    #[test]
    fn transitive_dependencies_in_topological_order() {
        let graph = ModuleGraph::build(vec![
            module("util", &[]),
            module("lib", &["util"]),
            module("app", &["lib"]),
        ])
        .unwrap();
        let deps = graph.dependencies(&id("app"), true).unwrap();
        assert_eq!(names(&deps), ["util", "lib"]);
        let direct = graph.dependencies(&id("app"), false).unwrap();
        assert_eq!(names(&direct), ["lib"]);
    }

    #[test]
    fn transitive_dependents_in_topological_order() {
        let graph = ModuleGraph::build(vec![
            module("util", &[]),
            module("lib", &["util"]),
            module("app", &["lib"]),
        ])
        .unwrap();
        let dependents = graph.dependents(&id("util"), true).unwrap();
        assert_eq!(names(&dependents), ["lib", "app"]);
        let direct = graph.dependents(&id("util"), false).unwrap();
        assert_eq!(names(&direct), ["lib"]);
    }

    #[test]
    fn unknown_module_query_fails() {
        let graph = ModuleGraph::build(vec![module("a", &[])]).unwrap();
        assert!(graph.dependencies(&id("zzz"), false).is_err());
        assert!(graph.dependents(&id("zzz"), false).is_err());
    }

    #[test]
    fn diamond_order() {
        let graph = ModuleGraph::build(vec![
            module("a", &[]),
            module("b", &["a"]),
            module("c", &["a"]),
            module("x", &["b", "c"]),
        ])
        .unwrap();
        assert_eq!(names(graph.sorted_order()), ["a", "b", "c", "x"]);
    }
}
