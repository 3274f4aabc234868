#![allow(dead_code)]

pub use yesbuild_test_utils::{MockWorkspace, init_tracing};

use yesbuild::{CopyFiles, Project, TaskBody};

/// `assets` copies `static/*`; `site` depends on `assets` and copies the
/// pages.
pub fn site_project() -> Project {
    let mut project = Project::new();
    project
        .define("assets", |_| {
            TaskBody::action(CopyFiles::glob("static/*").relative("static"))
        })
        .define("site", |scope| {
            TaskBody::sequence(async move {
                scope.task("assets").await?;
                scope
                    .run(CopyFiles::files(["pages/index.md", "pages/about.md"]).relative("pages"))
                    .await?;
                Ok(None)
            })
        });
    project
}

pub fn site_workspace() -> MockWorkspace {
    init_tracing();
    let ws = MockWorkspace::new();
    ws.file("static/logo.svg", "<svg/>")
        .file("static/app.css", "body {}")
        .file("pages/index.md", "# home")
        .file("pages/about.md", "# about");
    ws
}
