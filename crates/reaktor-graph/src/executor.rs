//! Bounded worker pool that drives module builds through the scheduler.
//!
//! The executor owns the dispatch loop: it seeds the pool with the root
//! schedulable modules, hands each finished module back to the scheduler,
//! and dispatches whatever that unblocks. Module builds run without any
//! inter-module locking; the scheduler transition is the only
//! synchronization point, and the muxer keeps worker output attributable.

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use reaktor_core::config::FailureMode;
use reaktor_core::module::{Module, ModuleId};
use reaktor_util::errors::ReaktorResult;

use crate::graph::ModuleGraph;
use crate::muxer::OutputMuxer;
use crate::scheduler::ReactorScheduler;

/// What happens to the rest of the reactor when one module's build fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop dispatching new modules; in-flight builds finish.
    FailFast,
    /// Leave the failed module unfinished so its transitive dependents are
    /// skipped, but keep building unrelated modules.
    FailAtEnd,
    /// Mark the failed module finished anyway so dependents still build.
    FailNever,
}

impl From<FailureMode> for FailurePolicy {
    fn from(mode: FailureMode) -> Self {
        match mode {
            FailureMode::FailFast => Self::FailFast,
            FailureMode::FailAtEnd => Self::FailAtEnd,
            FailureMode::FailNever => Self::FailNever,
        }
    }
}

/// Outcome of one reactor run, each list in topological order.
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub built: Vec<ModuleId>,
    pub failed: Vec<(ModuleId, String)>,
    pub skipped: Vec<ModuleId>,
}

impl BuildSummary {
    pub fn success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Executes module builds across a bounded pool of worker threads.
pub struct BuildExecutor {
    jobs: usize,
    policy: FailurePolicy,
}

impl BuildExecutor {
    pub fn new(jobs: usize, policy: FailurePolicy) -> Self {
        Self {
            jobs: jobs.max(1),
            policy,
        }
    }

    /// Build every module in the graph, honoring dependency order.
    ///
    /// `build` is invoked once per module from a worker thread that has
    /// already been associated with the module's output buffer; anything it
    /// writes through the muxer stays attributable.
    pub fn execute<F>(
        &self,
        graph: &ModuleGraph,
        muxer: &OutputMuxer,
        build: F,
    ) -> ReaktorResult<BuildSummary>
    where
        F: Fn(&Module) -> ReaktorResult<()> + Sync,
    {
        let scheduler = ReactorScheduler::new(graph);
        let (job_tx, job_rx) = mpsc::channel::<ModuleId>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, result_rx) = mpsc::channel::<(ModuleId, Result<(), String>)>();

        let mut built: Vec<ModuleId> = Vec::new();
        let mut failed: Vec<(ModuleId, String)> = Vec::new();
        let mut loop_error = None;

        std::thread::scope(|scope| {
            for _ in 0..self.jobs {
                let job_rx = Arc::clone(&job_rx);
                let result_tx = result_tx.clone();
                let build = &build;
                scope.spawn(move || loop {
                    let job = {
                        let rx = job_rx.lock().expect("job queue poisoned");
                        rx.recv()
                    };
                    let Ok(id) = job else { break };
                    let Some(module) = graph.module(&id) else {
                        let _ = result_tx.send((id, Err("module not in graph".to_string())));
                        continue;
                    };
                    muxer.associate(&id);
                    let outcome = build(module).map_err(|e| e.to_string());
                    muxer.complete(&id);
                    let _ = result_tx.send((id, outcome));
                });
            }
            // Workers hold their own sender clones; dropping ours lets the
            // result loop end instead of hanging if a worker dies.
            drop(result_tx);

            let mut in_flight = 0usize;
            let mut stopping = false;
            for id in scheduler.root_schedulable() {
                debug!(module = %id, "dispatching");
                let _ = job_tx.send(id);
                in_flight += 1;
            }

            while in_flight > 0 {
                let Ok((id, outcome)) = result_rx.recv() else { break };
                in_flight -= 1;
                match outcome {
                    Ok(()) => {
                        built.push(id.clone());
                        match scheduler.mark_finished(&id) {
                            Ok(unblocked) => {
                                if !stopping {
                                    for next in unblocked {
                                        debug!(module = %next, "dispatching");
                                        let _ = job_tx.send(next);
                                        in_flight += 1;
                                    }
                                }
                            }
                            Err(e) => {
                                loop_error = Some(e);
                                stopping = true;
                            }
                        }
                    }
                    Err(message) => {
                        warn!(module = %id, error = %message, "module build failed");
                        failed.push((id.clone(), message));
                        match self.policy {
                            FailurePolicy::FailFast => stopping = true,
                            FailurePolicy::FailAtEnd => {
                                // Dependents stay blocked; unrelated modules continue.
                            }
                            FailurePolicy::FailNever => match scheduler.mark_finished(&id) {
                                Ok(unblocked) => {
                                    if !stopping {
                                        for next in unblocked {
                                            let _ = job_tx.send(next);
                                            in_flight += 1;
                                        }
                                    }
                                }
                                Err(e) => {
                                    loop_error = Some(e);
                                    stopping = true;
                                }
                            },
                        }
                    }
                }
            }
            drop(job_tx);
        });

        if let Some(e) = loop_error {
            return Err(e);
        }

        let failed_ids: HashSet<&ModuleId> = failed.iter().map(|(id, _)| id).collect();
        let skipped: Vec<ModuleId> = scheduler
            .unfinished()
            .into_iter()
            .filter(|id| !failed_ids.contains(id))
            .collect();

        let position = |id: &ModuleId| graph.position(id).unwrap_or(usize::MAX);
        built.sort_by_key(|id| position(id));
        failed.sort_by_key(|(id, _)| position(id));

        Ok(BuildSummary {
            built,
            failed,
            skipped,
        })
    }
}
