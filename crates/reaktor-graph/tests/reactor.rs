//! End-to-end reactor runs: scheduling order plus output muxing.

use std::io::Write;
use std::time::Duration;

use reaktor_core::module::{Module, ModuleId};
use reaktor_graph::executor::{BuildExecutor, FailurePolicy};
use reaktor_graph::graph::ModuleGraph;
use reaktor_graph::muxer::OutputMuxer;
use reaktor_graph::scheduler::ReactorScheduler;
use reaktor_util::errors::ReaktorError;

fn id(name: &str) -> ModuleId {
    ModuleId::new("com.example", name, "1.0")
}

/// A; B -> A; C -> A; X -> B, C.
fn diamond() -> ModuleGraph {
    ModuleGraph::build(vec![
        Module::new(id("a"), "a"),
        Module::new(id("b"), "b").with_dependency(id("a")),
        Module::new(id("c"), "c").with_dependency(id("a")),
        Module::new(id("x"), "x")
            .with_dependency(id("b"))
            .with_dependency(id("c")),
    ])
    .unwrap()
}

#[test]
fn diamond_scheduling_properties() {
    let graph = diamond();
    let scheduler = ReactorScheduler::new(&graph);

    assert_eq!(scheduler.root_schedulable(), vec![id("a")]);
    assert_eq!(scheduler.mark_finished(&id("a")).unwrap(), vec![id("b"), id("c")]);
    assert!(scheduler.mark_finished(&id("a")).unwrap().is_empty());

    scheduler.mark_finished(&id("b")).unwrap();
    assert_eq!(scheduler.active_dependencies(&id("x")).unwrap(), vec![id("c")]);
}

#[test]
fn muxed_output_follows_discovery_order_not_completion_order() {
    // a, b, c, x write "Paid", "In", "Full" and nothing, from workers that
    // finish in whatever order the sleeps dictate; the muxed output must
    // still read in declared order.
    let graph = diamond();
    let muxer = OutputMuxer::new(graph.sorted_order().iter().cloned());
    let executor = BuildExecutor::new(4, FailurePolicy::FailFast);

    let summary = executor
        .execute(&graph, &muxer, |module| {
            let (text, delay_ms) = match module.id.artifact.as_str() {
                "a" => ("Paid", 30),
                "b" => ("In", 40),
                "c" => ("Full", 5),
                _ => ("", 0),
            };
            std::thread::sleep(Duration::from_millis(delay_ms));
            let mut out = &muxer;
            write!(out, "{text}").map_err(ReaktorError::Io)?;
            Ok(())
        })
        .unwrap();

    assert!(summary.success());
    let mut sink = Vec::new();
    muxer.close(&mut sink).unwrap();
    assert_eq!(String::from_utf8(sink).unwrap(), "PaidInFull");
}

#[test]
fn repeated_runs_are_reproducible() {
    for _ in 0..10 {
        let graph = diamond();
        let muxer = OutputMuxer::new(graph.sorted_order().iter().cloned());
        let executor = BuildExecutor::new(3, FailurePolicy::FailFast);
        let summary = executor
            .execute(&graph, &muxer, |module| {
                let mut out = &muxer;
                writeln!(out, "building {}", module.id).map_err(ReaktorError::Io)?;
                Ok(())
            })
            .unwrap();
        assert_eq!(summary.built, graph.sorted_order());

        let mut sink = Vec::new();
        muxer.close(&mut sink).unwrap();
        let output = String::from_utf8(sink).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            [
                "building com.example:a:1.0",
                "building com.example:b:1.0",
                "building com.example:c:1.0",
                "building com.example:x:1.0",
            ]
        );
    }
}

#[test]
fn scheduler_never_releases_a_module_before_its_dependencies() {
    use std::sync::Mutex;

    // Record the order modules start building; every module must start
    // after all of its dependencies.
    let graph = diamond();
    let muxer = OutputMuxer::new(graph.sorted_order().iter().cloned());
    let executor = BuildExecutor::new(4, FailurePolicy::FailFast);
    let started: Mutex<Vec<ModuleId>> = Mutex::new(Vec::new());

    executor
        .execute(&graph, &muxer, |module| {
            started.lock().unwrap().push(module.id.clone());
            Ok(())
        })
        .unwrap();

    let order = started.into_inner().unwrap();
    for module in graph.sorted_order() {
        let module_pos = order.iter().position(|m| m == module).unwrap();
        for dep in graph.dependencies(module, false).unwrap() {
            let dep_pos = order.iter().position(|m| m == &dep).unwrap();
            assert!(dep_pos < module_pos, "{dep} must start before {module}");
        }
    }
}
