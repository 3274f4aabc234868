// demos/site.rs

//! A small static site build.
//!
//! ```text
//! cargo run --example site -- config
//! cargo run --example site -- build -t site
//! cargo run --example site -- watch page
//! ```

use yesbuild::{CopyFiles, Exec, Parallel, Project, TaskBody, another_task};

fn project() -> Project {
    let mut project = Project::new();

    project
        .depend_file("demos/site.rs")
        .define("assets", |_| {
            TaskBody::action(CopyFiles::glob("static/**/*").relative("static"))
        })
        .define("styles", |_| {
            TaskBody::action(
                Exec::new("sass").args(["styles/main.scss", "build/styles/main.css"]),
            )
        })
        .define("page", |scope| {
            TaskBody::sequence(async move {
                let assets = scope.task("assets").await?;
                tracing::debug!(count = assets.products.len(), "assets available to page");
                scope
                    .run(CopyFiles::files(["index.html", "about.html"]))
                    .await?;
                Ok(None)
            })
        })
        .define("site", |_| TaskBody::action(Parallel::new(["styles", "page"])))
        .define("serve", |_| {
            TaskBody::action(
                Exec::new("python3")
                    .args(["-m", "http.server", "--directory", "build/page"])
                    .detached(),
            )
        })
        .define("default", |_| another_task("site"))
        .on_build_finished(|tasks| {
            println!("rebuilt: {}", tasks.join(", "));
        });

    project
}

#[tokio::main]
async fn main() {
    if let Err(err) = yesbuild::run(project()).await {
        eprintln!("yesbuild error: {err:?}");
        std::process::exit(1);
    }
}
