// tests/build_planning.rs

mod common;
use crate::common::builders::{mock_tree, ConfigBuilder};
use crate::common::init_tracing;

use std::path::PathBuf;
use std::sync::Arc;

use parless::fs::FileSystem;
use parless::orchestrator::{dry_run, plan};
use parless::types::Job;

fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

/// base.less is imported by child.less; other.less stands alone.
fn base_child_tree() -> Arc<dyn FileSystem> {
    Arc::new(mock_tree(&[
        ("/proj/base.less", ".base { color: red; }\n"),
        ("/proj/child.less", "@import \"base\";\n.child { color: blue; }\n"),
        ("/proj/other.less", ".other { margin: 0; }\n"),
    ]))
}

#[test]
fn changing_an_imported_file_rebuilds_only_its_importers() {
    init_tracing();

    let config = ConfigBuilder::new("/proj").changed("base.less").build();
    let plan = plan(&config, base_child_tree()).unwrap();

    assert_eq!(
        plan.jobs,
        vec![Job::new("/proj/child.less", "/proj/child.css")]
    );
    assert_eq!(
        plan.files_to_read,
        vec![p("/proj/base.less"), p("/proj/child.less")]
    );
    assert_eq!(plan.scanned, 3);
}

#[test]
fn no_filter_builds_every_top_level_file() {
    let config = ConfigBuilder::new("/proj").outputdir("/out").build();
    let plan = plan(&config, base_child_tree()).unwrap();

    let sources: Vec<PathBuf> = plan.jobs.iter().map(|j| j.source.clone()).collect();
    assert_eq!(sources, vec![p("/proj/child.less"), p("/proj/other.less")]);
    assert_eq!(plan.jobs[1].dest, p("/out/other.css"));

    for job in &plan.jobs {
        assert!(plan.files_to_read.contains(&job.source));
    }
}

#[test]
fn changing_a_target_rebuilds_just_that_target() {
    let config = ConfigBuilder::new("/proj").changed("other.less").build();
    let plan = plan(&config, base_child_tree()).unwrap();

    assert_eq!(plan.jobs, vec![Job::new("/proj/other.less", "/proj/other.css")]);
    assert_eq!(plan.files_to_read, vec![p("/proj/other.less")]);
}

#[test]
fn unknown_changed_file_selects_nothing() {
    let config = ConfigBuilder::new("/proj").changed("missing.less").build();
    let plan = plan(&config, base_child_tree()).unwrap();

    assert!(plan.jobs.is_empty());
    assert!(plan.files_to_read.is_empty());
}

#[test]
fn imports_from_search_paths_are_followed_but_never_targets() {
    let fs: Arc<dyn FileSystem> = Arc::new(mock_tree(&[
        ("/proj/src/app.less", "@import \"theme\";\n.app { x: 1; }\n"),
        ("/shared/theme.less", "@import \"colors\";\n"),
        ("/shared/colors.less", "@c: red;\n"),
    ]));

    let config = ConfigBuilder::new("/proj")
        .directory("src")
        .outputdir("dist")
        .search_path("/shared")
        .changed("/shared/colors.less")
        .build();
    let plan = plan(&config, fs).unwrap();

    assert_eq!(
        plan.jobs,
        vec![Job::new("/proj/src/app.less", "/proj/dist/app.css")]
    );
    assert_eq!(
        plan.files_to_read,
        vec![
            p("/proj/src/app.less"),
            p("/shared/colors.less"),
            p("/shared/theme.less"),
        ]
    );
}

#[test]
fn excluded_partials_are_not_targets() {
    let fs: Arc<dyn FileSystem> = Arc::new(mock_tree(&[
        ("/proj/main.less", ".main { a: b; }\n"),
        ("/proj/_mixins.less", ".m() { a: b; }\n"),
    ]));

    let config = ConfigBuilder::new("/proj").exclude("**/_*").build();
    let plan = plan(&config, fs).unwrap();

    assert_eq!(plan.scanned, 1);
    assert_eq!(plan.jobs, vec![Job::new("/proj/main.less", "/proj/main.css")]);
}

#[test]
fn dry_run_lists_targets_and_cycles() {
    let fs: Arc<dyn FileSystem> = Arc::new(mock_tree(&[
        ("/proj/main.less", "@import \"a\";\n"),
        ("/proj/lib/a.less", "@import \"b\";\n"),
        ("/proj/lib/b.less", "@import \"a\";\n"),
        ("/proj/a.less", "@import \"lib/a\";\n"),
    ]));

    let config = ConfigBuilder::new("/proj").match_pattern("main.less").build();
    let text = dry_run(&config, fs).unwrap();

    assert!(text.contains("targets (1):"), "{text}");
    assert!(text.contains("/proj/main.less -> /proj/main.css"), "{text}");
    assert!(text.contains("import cycles (1):"), "{text}");
    assert!(text.contains("/proj/lib/a.less <-> /proj/lib/b.less"), "{text}");
}
