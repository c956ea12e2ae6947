//! End-to-end runs through the public API: plan a reactor, load a priority
//! file from disk, build with closure executors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pbuild_builder::{
    BuildOrchestrator, BuildStatus, ModuleExecutor, ModuleStatus, PriorityConfig,
    SegmentOutcome, PRIORITY_CONFIG_PATH,
};
use pbuild_builder::scheduler::submission_order;
use pbuild_core::{
    BuilderConfig, Module, ModuleId, ProjectBuildList, ReactorContext, Session, TaskSegment,
};
use tempfile::TempDir;

fn reactor(names: &[&str]) -> Vec<Module> {
    names.iter().map(|n| Module::new("org.acme", *n)).collect()
}

fn config(root: &TempDir, threads: i64) -> BuilderConfig {
    BuilderConfig {
        threads,
        harvest_poll_ms: 5,
        root_dir: root.path().to_path_buf(),
        priority_file: None,
    }
}

fn write_priority_file(root: &TempDir, body: &str) {
    let path = root.path().join(PRIORITY_CONFIG_PATH);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

// ── Priority from disk ──────────────────────────────────────

#[test]
fn priority_file_on_disk_drives_submission_order() {
    let root = TempDir::new().unwrap();
    write_priority_file(
        &root,
        r#"{"prioritizedModules": ["org.acme:web", "org.acme:api"]}"#,
    );
    let cfg = config(&root, 1);
    let priority = PriorityConfig::load(&cfg).unwrap();

    let modules = reactor(&["core", "api", "util", "web"]);
    let segments = vec![TaskSegment::new(["install"])];
    let session = Session::root();
    let builds = ProjectBuildList::plan(&session, &modules, &segments);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let executor: Arc<dyn ModuleExecutor> = {
        let seen = Arc::clone(&seen);
        Arc::new(move |module: &Module, _: &TaskSegment| -> anyhow::Result<()> {
            seen.lock().unwrap().push(module.short_name().to_string());
            Ok(())
        })
    };

    let summary = BuildOrchestrator::new(executor, cfg)
        .build(
            &session,
            &Arc::new(ReactorContext::default()),
            &builds,
            &segments,
            &priority,
        )
        .unwrap();

    assert!(summary.is_success());
    // One worker executes strictly in submission order.
    assert_eq!(*seen.lock().unwrap(), vec!["web", "api", "core", "util"]);
}

#[test]
fn missing_priority_file_keeps_planned_order() {
    let root = TempDir::new().unwrap();
    let priority = PriorityConfig::load(&config(&root, 2)).unwrap();
    assert!(priority.is_empty());

    let modules = reactor(&["c", "a", "b"]);
    let segments = vec![TaskSegment::new(["compile"])];
    let builds = ProjectBuildList::plan(&Session::root(), &modules, &segments);

    let order: Vec<&str> = submission_order(0, &builds, &priority)
        .into_iter()
        .map(|b| b.module.short_name())
        .collect();
    assert_eq!(order, vec!["c", "a", "b"]);
}

#[test]
fn malformed_priority_file_is_a_configuration_error() {
    let root = TempDir::new().unwrap();
    write_priority_file(&root, r#"{"prioritizedModules": "org.acme:web"}"#);
    assert!(PriorityConfig::load(&config(&root, 2)).is_err());
}

#[test]
fn priority_groups_listed_modules_first_and_stays_stable() {
    // Every rotation of the reactor: listed modules lead in list order and
    // the rest keep their relative input order.
    let names = ["a", "b", "c", "d", "e", "f"];
    let priority = PriorityConfig::new(["org.acme:e", "org.acme:b"]);
    let segments = vec![TaskSegment::new(["compile"])];

    for shift in 0..names.len() {
        let mut rotated = names.to_vec();
        rotated.rotate_left(shift);
        let modules = reactor(&rotated);
        let builds = ProjectBuildList::plan(&Session::root(), &modules, &segments);

        let order: Vec<&str> = submission_order(0, &builds, &priority)
            .into_iter()
            .map(|b| b.module.short_name())
            .collect();

        assert_eq!(&order[..2], &["e", "b"], "rotation {}", shift);
        let rest: Vec<&str> = rotated.iter().copied().filter(|n| *n != "e" && *n != "b").collect();
        assert_eq!(&order[2..], rest.as_slice(), "rotation {}", shift);
    }
}

// ── Multi-segment runs ──────────────────────────────────────

#[test]
fn segments_run_in_order_with_a_barrier_between_them() {
    let root = TempDir::new().unwrap();
    let modules = reactor(&["a", "b", "c", "d"]);
    let segments = vec![
        TaskSegment::new(["clean"]),
        TaskSegment::new(["install"]),
        TaskSegment::new(["site"]).aggregating(),
    ];
    let session = Session::root();
    let builds = ProjectBuildList::plan(&session, &modules, &segments);

    // Segment index of every call, in call order.
    let journal = Arc::new(Mutex::new(Vec::new()));
    let executor: Arc<dyn ModuleExecutor> = {
        let journal = Arc::clone(&journal);
        Arc::new(move |_: &Module, segment: &TaskSegment| -> anyhow::Result<()> {
            let idx = match segment.tasks[0].as_str() {
                "clean" => 0,
                "install" => 1,
                _ => 2,
            };
            std::thread::sleep(Duration::from_millis(5));
            journal.lock().unwrap().push(idx);
            Ok(())
        })
    };

    let summary = BuildOrchestrator::new(executor, config(&root, 4))
        .build(
            &session,
            &Arc::new(ReactorContext::default()),
            &builds,
            &segments,
            &PriorityConfig::default(),
        )
        .unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.succeeded_modules(), 12);
    let journal = journal.lock().unwrap();
    assert_eq!(journal.len(), 12);
    assert!(journal.windows(2).all(|w| w[0] <= w[1]), "segments interleaved: {:?}", *journal);
}

#[test]
fn identical_segments_each_build_every_module() {
    let root = TempDir::new().unwrap();
    let modules = reactor(&["api", "web"]);
    let segments = vec![
        TaskSegment::new(["install"]),
        TaskSegment::new(["site:aggregate"]).aggregating(),
        TaskSegment::new(["install"]),
    ];
    let session = Session::root();
    let builds = ProjectBuildList::plan(&session, &modules, &segments);

    let calls = Arc::new(AtomicUsize::new(0));
    let executor: Arc<dyn ModuleExecutor> = {
        let calls = Arc::clone(&calls);
        Arc::new(move |_: &Module, _: &TaskSegment| -> anyhow::Result<()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };

    let summary = BuildOrchestrator::new(executor, config(&root, 2))
        .build(
            &session,
            &Arc::new(ReactorContext::default()),
            &builds,
            &segments,
            &PriorityConfig::default(),
        )
        .unwrap();

    assert_eq!(summary.status, BuildStatus::Success);
    assert!(!session.result().has_exceptions());
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(summary.succeeded_modules(), 6);
}

#[test]
fn segment_may_cover_a_subset_of_modules() {
    let root = TempDir::new().unwrap();
    let modules = reactor(&["a", "b", "c"]);
    let compile = TaskSegment::new(["compile"]);
    let deploy = TaskSegment::new(["deploy"]);
    let session = Session::root();

    let mut builds = ProjectBuildList::plan(&session, &modules, std::slice::from_ref(&compile));
    let only_b = &modules[1];
    builds.push(pbuild_core::ProjectBuild::new(
        only_b.clone(),
        1,
        deploy.clone(),
        session.fork(only_b.key()),
    ));

    let calls = Arc::new(AtomicUsize::new(0));
    let executor: Arc<dyn ModuleExecutor> = {
        let calls = Arc::clone(&calls);
        Arc::new(move |_: &Module, _: &TaskSegment| -> anyhow::Result<()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };

    let summary = BuildOrchestrator::new(executor, config(&root, 8))
        .build(
            &session,
            &Arc::new(ReactorContext::default()),
            &builds,
            &[compile, deploy],
            &PriorityConfig::default(),
        )
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(summary.degree_of_concurrency, 3);
    assert_eq!(summary.segments[1].modules.len(), 1);
    assert_eq!(summary.segments[1].modules[0].module, ModuleId::new("org.acme", "b"));
}

#[test]
fn first_failure_fails_the_build_and_is_reported_once() {
    let root = TempDir::new().unwrap();
    let modules = reactor(&["a", "b", "c", "d"]);
    let segments = vec![TaskSegment::new(["compile"]), TaskSegment::new(["test"])];
    let session = Session::root();
    let builds = ProjectBuildList::plan(&session, &modules, &segments);

    let executor: Arc<dyn ModuleExecutor> = Arc::new(|module: &Module, segment: &TaskSegment| {
        if module.short_name() == "c" && segment.tasks == ["compile"] {
            anyhow::bail!("syntax error in Main.java");
        }
        Ok(())
    });

    let summary = BuildOrchestrator::new(executor, config(&root, 2))
        .build(
            &session,
            &Arc::new(ReactorContext::default()),
            &builds,
            &segments,
            &PriorityConfig::default(),
        )
        .unwrap();

    assert_eq!(summary.status, BuildStatus::Failed);
    assert_eq!(summary.failed_modules(), 1);
    assert_eq!(session.result().exception_count(), 1);
    assert_eq!(
        session.result().messages(),
        vec!["Failed to build org.acme:c: syntax error in Main.java".to_string()]
    );
    assert_eq!(summary.segments[1].outcome, SegmentOutcome::Skipped);

    // Every module session reports into the same root result.
    for build in &builds {
        assert!(Arc::ptr_eq(build.session.result(), session.result()));
    }
}

#[test]
fn summary_serializes_for_reporting() {
    let root = TempDir::new().unwrap();
    let modules = reactor(&["a", "b"]);
    let segments = vec![TaskSegment::new(["compile"])];
    let session = Session::root();
    let builds = ProjectBuildList::plan(&session, &modules, &segments);
    let executor: Arc<dyn ModuleExecutor> = Arc::new(|module: &Module, _: &TaskSegment| {
        if module.short_name() == "b" {
            anyhow::bail!("boom");
        }
        Ok(())
    });

    let summary = BuildOrchestrator::new(executor, config(&root, 1))
        .build(
            &session,
            &Arc::new(ReactorContext::default()),
            &builds,
            &segments,
            &PriorityConfig::default(),
        )
        .unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["status"], "failed");
    assert_eq!(json["degree_of_concurrency"], 1);
    let statuses: HashMap<String, String> = json["segments"][0]["modules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| {
            (
                m["module"]["artifactId"].as_str().unwrap().to_string(),
                m["status"]["status"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(statuses["a"], "succeeded");
    assert_eq!(statuses["b"], "failed");
    assert!(matches!(
        summary.segments[0].status_of(&ModuleId::new("org.acme", "b")),
        Some(ModuleStatus::Failed { .. })
    ));
}
