// tests/incremental_build.rs

mod common;
use crate::common::{site_project, site_workspace};

use yesbuild::dag::MtimeCache;
use yesbuild::dependency::{DepLiteral, Dependencies};
use yesbuild::engine::{build, configure};
use yesbuild::errors::YesbuildError;
use yesbuild::types::BuildFlags;
use yesbuild::{Parallel, Project, TaskBody};

#[tokio::test]
async fn first_build_configures_and_second_is_a_no_op() {
    let mut ws = site_workspace();
    let project = site_project();

    build(&project, &ws.session, &ws.options("site")).await.unwrap();
    let first = ws.take_report();
    assert_eq!(first.task_count, 2);
    assert!(first.errors.is_empty());
    assert_eq!(ws.read("build/site/about.md").as_deref(), Some("# about"));
    assert_eq!(ws.read("build/assets/app.css").as_deref(), Some("body {}"));

    build(&project, &ws.session, &ws.options("site")).await.unwrap();
    let second = ws.take_report();
    assert_eq!(second.task_count, 0);
    assert!(second.outputs.is_empty());
}

#[tokio::test]
async fn changed_input_rebuilds_its_task_and_dependents() {
    let mut ws = site_workspace();
    let project = site_project();
    build(&project, &ws.session, &ws.options("site")).await.unwrap();
    ws.take_report();

    ws.file("static/app.css", "body { color: red }");
    build(&project, &ws.session, &ws.options("site")).await.unwrap();
    let report = ws.take_report();
    assert_eq!(report.task_count, 2);
    assert_eq!(
        ws.read("build/assets/app.css").as_deref(),
        Some("body { color: red }")
    );

    build(&project, &ws.session, &ws.options("site")).await.unwrap();
    assert_eq!(ws.take_report().task_count, 0);
}

#[tokio::test]
async fn changed_leaf_input_does_not_rebuild_dependencies() {
    let mut ws = site_workspace();
    let project = site_project();
    build(&project, &ws.session, &ws.options("site")).await.unwrap();
    ws.take_report();

    ws.file("pages/index.md", "# new home");
    build(&project, &ws.session, &ws.options("site")).await.unwrap();
    let report = ws.take_report();
    assert_eq!(report.task_count, 1);
    assert_eq!(ws.read("build/site/index.md").as_deref(), Some("# new home"));
}

#[tokio::test]
async fn configure_twice_writes_identical_task_files() {
    let ws = site_workspace();
    let project = site_project();

    configure(&project, &ws.session, &mut ws.graph(), None)
        .await
        .unwrap();
    let first = ws.read("build/yesbuild.site.json").unwrap();

    configure(&project, &ws.session, &mut ws.graph(), None)
        .await
        .unwrap();
    assert_eq!(ws.read("build/yesbuild.site.json").unwrap(), first);
}

#[tokio::test]
async fn recorded_dependencies_are_sorted_and_complete() {
    let ws = site_workspace();
    configure(&site_project(), &ws.session, &mut ws.graph(), None)
        .await
        .unwrap();

    let site = ws.task_node("site").unwrap();
    assert_eq!(
        site.deps,
        Some(Dependencies::List(vec![
            DepLiteral::file("pages/about.md"),
            DepLiteral::file("pages/index.md"),
            DepLiteral::task("assets"),
        ]))
    );
    assert_eq!(site.products, vec!["build/site/index.md", "build/site/about.md"]);
}

#[tokio::test]
async fn all_tasks_and_force_rebuild_without_changes() {
    let mut ws = site_workspace();
    let project = site_project();
    build(&project, &ws.session, &ws.options("site")).await.unwrap();
    ws.take_report();

    build(&project, &ws.session, &ws.options("*")).await.unwrap();
    assert_eq!(ws.take_report().task_count, 2);

    let forced = ws.options("assets").with_flags(BuildFlags {
        force: true,
        ignore_meta: false,
    });
    build(&project, &ws.session, &forced).await.unwrap();
    assert_eq!(ws.take_report().task_count, 1);
}

#[tokio::test]
async fn touching_a_meta_input_reconfigures() {
    let mut ws = site_workspace();
    ws.file("site.rs", "fn main() {}");
    let mut project = site_project();
    project.depend_file("site.rs");

    build(&project, &ws.session, &ws.options("site")).await.unwrap();
    ws.take_report();
    build(&project, &ws.session, &ws.options("site")).await.unwrap();
    assert_eq!(ws.take_report().task_count, 0);

    ws.touch("site.rs");
    build(&project, &ws.session, &ws.options("site")).await.unwrap();
    // Every task is driven again; nothing is stale afterwards.
    assert_eq!(ws.take_report().task_count, 2);

    build(&project, &ws.session, &ws.options("site")).await.unwrap();
    assert_eq!(ws.take_report().task_count, 0);
}

#[tokio::test]
async fn failed_configure_keeps_siblings_and_skips_meta() {
    let mut ws = site_workspace();
    let mut project = site_project();
    project.define("broken", |_| {
        TaskBody::sequence(async { anyhow::bail!("no entry point") })
    });

    let err = build(&project, &ws.session, &ws.options("site"))
        .await
        .unwrap_err();
    assert!(matches!(err, YesbuildError::ConfigError(ref msg) if msg.contains("broken")));

    let report = ws.take_report();
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].message.contains("no entry point"));
    assert!(ws.task_node("site").is_some());
    assert!(ws.read("build/yesbuild.json").is_none());
}

#[tokio::test]
async fn parallel_tasks_always_run_and_report_child_failures() {
    let mut ws = site_workspace();
    let mut project = site_project();
    project.define("all", |_| TaskBody::action(Parallel::new(["assets", "site"])));

    build(&project, &ws.session, &ws.options("all")).await.unwrap();
    ws.take_report();
    assert_eq!(ws.task_node("all").unwrap().deps, Some(Dependencies::Always));

    let plan = ws
        .graph()
        .check_dependencies_updated("all", false, &mut MtimeCache::new(ws.session.fs.clone()))
        .unwrap();
    assert_eq!(plan.order, vec!["all"]);

    // The test session's child program does not exist.
    build(&project, &ws.session, &ws.options("all")).await.unwrap();
    let report = ws.take_report();
    assert_eq!(report.task_count, 1);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors.iter().all(|e| e.message.contains("failed to run")));
}

#[tokio::test]
async fn unknown_entry_task_is_an_error() {
    let ws = site_workspace();
    let project = site_project();
    build(&project, &ws.session, &ws.options("site")).await.unwrap();

    let err = build(&project, &ws.session, &ws.options("deploy"))
        .await
        .unwrap_err();
    assert!(matches!(err, YesbuildError::TaskNotFound(ref t) if t == "deploy"));
}

#[tokio::test]
async fn empty_project_configures_to_an_empty_graph() {
    let ws = site_workspace();
    configure(&Project::new(), &ws.session, &mut ws.graph(), None)
        .await
        .unwrap();
    assert!(ws.graph().known_tasks().unwrap().is_empty());
    assert!(ws.read("build/yesbuild.json").is_some());
}

#[tokio::test]
async fn persisted_task_files_alone_replay_to_the_same_nodes() {
    let mut ws = site_workspace();
    configure(&site_project(), &ws.session, &mut ws.graph(), None)
        .await
        .unwrap();
    let assets = ws.task_node("assets").unwrap();
    let site = ws.task_node("site").unwrap();
    ws.take_report();

    ws.file("static/app.css", "body { margin: 0 }");
    // No task definitions: everything comes from the task files on disk.
    let options = ws.options("site").with_flags(BuildFlags {
        force: true,
        ignore_meta: true,
    });
    build(&Project::new(), &ws.session, &options).await.unwrap();

    let report = ws.take_report();
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.task_count, 2);
    assert!(report.updated_files.is_empty());
    assert_eq!(
        ws.read("build/assets/app.css").as_deref(),
        Some("body { margin: 0 }")
    );

    let replayed_assets = ws.task_node("assets").unwrap();
    let replayed_site = ws.task_node("site").unwrap();
    assert_eq!(replayed_assets.products, assets.products);
    assert_eq!(replayed_assets.deps, assets.deps);
    assert_eq!(replayed_site.products, site.products);
    assert_eq!(replayed_site.deps, site.deps);
}
