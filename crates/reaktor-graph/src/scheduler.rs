//! Thread-safe scheduling state over a sorted module graph.
//!
//! The scheduler is the single synchronization point for build order: all
//! of its state lives behind one mutex, and the check-count-and-transition
//! step for each dependent happens atomically inside `mark_finished`.
//! Whether a failed module counts as finished is the caller's policy (see
//! [`crate::executor`]); the scheduler itself only tracks completion.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tracing::{debug, trace};

use reaktor_core::module::ModuleId;
use reaktor_util::errors::{ReaktorError, ReaktorResult};

use crate::graph::ModuleGraph;

struct SchedulerState {
    finished: HashSet<ModuleId>,
    unfinished: HashSet<ModuleId>,
    /// Per module, the number of direct dependencies not yet finished.
    active_deps: HashMap<ModuleId, usize>,
}

/// Tracks which modules have finished and which become schedulable next.
///
/// Safe to share across worker threads; a module is never reported
/// schedulable twice, and never before all of its dependencies finished.
pub struct ReactorScheduler {
    direct_deps: HashMap<ModuleId, Vec<ModuleId>>,
    direct_dependents: HashMap<ModuleId, Vec<ModuleId>>,
    position: HashMap<ModuleId, usize>,
    state: Mutex<SchedulerState>,
}

impl ReactorScheduler {
    /// Snapshot the graph's structure into fresh scheduling state.
    pub fn new(graph: &ModuleGraph) -> Self {
        let mut direct_deps = HashMap::new();
        let mut direct_dependents = HashMap::new();
        let mut active_deps = HashMap::new();
        let mut position = HashMap::new();

        for (pos, id) in graph.sorted_order().iter().enumerate() {
            // Both queries are infallible for ids taken from the graph itself.
            let deps = graph.dependencies(id, false).unwrap_or_default();
            let dependents = graph.dependents(id, false).unwrap_or_default();
            active_deps.insert(id.clone(), deps.len());
            direct_deps.insert(id.clone(), deps);
            direct_dependents.insert(id.clone(), dependents);
            position.insert(id.clone(), pos);
        }

        Self {
            direct_deps,
            direct_dependents,
            position,
            state: Mutex::new(SchedulerState {
                finished: HashSet::new(),
                unfinished: graph.sorted_order().iter().cloned().collect(),
                active_deps,
            }),
        }
    }

    /// Modules with no dependencies at all, in topological order.
    pub fn root_schedulable(&self) -> Vec<ModuleId> {
        let mut roots: Vec<ModuleId> = self
            .direct_deps
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        roots.sort_by_key(|id| self.position[id]);
        roots
    }

    /// Record `id` as finished and return the dependents that just became
    /// schedulable, in topological order.
    ///
    /// Idempotent: finishing an already-finished module is a no-op that
    /// returns an empty list. A dependency-count underflow means the
    /// scheduler was driven incorrectly and fails loudly instead of
    /// corrupting the remaining counts.
    pub fn mark_finished(&self, id: &ModuleId) -> ReaktorResult<Vec<ModuleId>> {
        let dependents = self
            .direct_dependents
            .get(id)
            .ok_or_else(|| ReaktorError::UnknownModule { id: id.to_string() })?;

        let mut state = self.state.lock().expect("scheduler mutex poisoned");
        if state.finished.contains(id) {
            trace!(module = %id, "already finished");
            return Ok(Vec::new());
        }
        state.unfinished.remove(id);
        state.finished.insert(id.clone());

        let mut unblocked = Vec::new();
        for dependent in dependents {
            let count = state.active_deps.get_mut(dependent).ok_or_else(|| {
                ReaktorError::Scheduling {
                    message: format!("no dependency count for {dependent}"),
                }
            })?;
            if *count == 0 {
                return Err(ReaktorError::Scheduling {
                    message: format!(
                        "dependency count underflow for {dependent} when finishing {id}"
                    ),
                }
                .into());
            }
            *count -= 1;
            if *count == 0 {
                unblocked.push(dependent.clone());
            }
        }
        unblocked.sort_by_key(|m| self.position[m]);
        debug!(module = %id, unblocked = unblocked.len(), "module finished");
        Ok(unblocked)
    }

    /// Direct dependencies of `id` that have not finished yet, in
    /// topological order.
    pub fn active_dependencies(&self, id: &ModuleId) -> ReaktorResult<Vec<ModuleId>> {
        let deps = self
            .direct_deps
            .get(id)
            .ok_or_else(|| ReaktorError::UnknownModule { id: id.to_string() })?;
        let state = self.state.lock().expect("scheduler mutex poisoned");
        Ok(deps
            .iter()
            .filter(|d| !state.finished.contains(d))
            .cloned()
            .collect())
    }

    /// `true` once every module has finished.
    pub fn is_complete(&self) -> bool {
        self.state
            .lock()
            .expect("scheduler mutex poisoned")
            .unfinished
            .is_empty()
    }

    /// Modules not yet finished, in topological order. With the set of
    /// modules the caller has given up on, this is enough to decide whether
    /// the remaining work is permanently blocked.
    pub fn unfinished(&self) -> Vec<ModuleId> {
        let state = self.state.lock().expect("scheduler mutex poisoned");
        let mut remaining: Vec<ModuleId> = state.unfinished.iter().cloned().collect();
        drop(state);
        remaining.sort_by_key(|m| self.position[m]);
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reaktor_core::module::Module;

    fn diamond() -> ModuleGraph {
        // A; B -> A; C -> A; X -> B, C
        let a = ModuleId::new("g", "a", "1");
        let b = ModuleId::new("g", "b", "1");
        let c = ModuleId::new("g", "c", "1");
        ModuleGraph::build(vec![
            Module::new(a.clone(), "a"),
            Module::new(b.clone(), "b").with_dependency(a.clone()),
            Module::new(c.clone(), "c").with_dependency(a.clone()),
            Module::new(ModuleId::new("g", "x", "1"), "x")
                .with_dependency(b)
                .with_dependency(c),
        ])
        .unwrap()
    }

    fn id(name: &str) -> ModuleId {
        ModuleId::new("g", name, "1")
    }

    fn names(ids: &[ModuleId]) -> Vec<String> {
        ids.iter().map(|m| m.artifact.clone()).collect()
    }

    #[test]
    fn diamond_scheduling() {
        let graph = diamond();
        let scheduler = ReactorScheduler::new(&graph);

        assert_eq!(names(&scheduler.root_schedulable()), ["a"]);

        let unblocked = scheduler.mark_finished(&id("a")).unwrap();
        assert_eq!(names(&unblocked), ["b", "c"]);

        // Repeat finish is a no-op.
        assert!(scheduler.mark_finished(&id("a")).unwrap().is_empty());

        let after_b = scheduler.mark_finished(&id("b")).unwrap();
        assert!(after_b.is_empty());
        assert_eq!(names(&scheduler.active_dependencies(&id("x")).unwrap()), ["c"]);

        let after_c = scheduler.mark_finished(&id("c")).unwrap();
        assert_eq!(names(&after_c), ["x"]);

        assert!(!scheduler.is_complete());
        scheduler.mark_finished(&id("x")).unwrap();
        assert!(scheduler.is_complete());
    }

    #[test]
    fn unknown_module_is_rejected() {
        let scheduler = ReactorScheduler::new(&diamond());
        assert!(scheduler.mark_finished(&id("nope")).is_err());
        assert!(scheduler.active_dependencies(&id("nope")).is_err());
    }

    #[test]
    fn unfinished_shrinks_in_topological_order() {
        let scheduler = ReactorScheduler::new(&diamond());
        assert_eq!(names(&scheduler.unfinished()), ["a", "b", "c", "x"]);
        scheduler.mark_finished(&id("a")).unwrap();
        assert_eq!(names(&scheduler.unfinished()), ["b", "c", "x"]);
    }

    #[test]
    fn concurrent_finishes_never_unblock_twice() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        // Run the diamond many times with b and c finishing from racing
        // threads; x must be reported schedulable exactly once.
        for _ in 0..50 {
            let graph = diamond();
            let scheduler = ReactorScheduler::new(&graph);
            scheduler.mark_finished(&id("a")).unwrap();

            let x_unblocked = AtomicUsize::new(0);
            std::thread::scope(|scope| {
                for name in ["b", "c"] {
                    let scheduler = &scheduler;
                    let x_unblocked = &x_unblocked;
                    scope.spawn(move || {
                        let unblocked = scheduler.mark_finished(&id(name)).unwrap();
                        if unblocked.contains(&id("x")) {
                            x_unblocked.fetch_add(1, Ordering::SeqCst);
                        }
                    });
                }
            });
            assert_eq!(x_unblocked.load(Ordering::SeqCst), 1);
        }
    }
}
