// tests/in_process_build.rs

mod common;
use crate::common::builders::Fixture;
use crate::common::fake_compiler::RecordingCompiler;
use crate::common::scripted_launcher::{Script, ScriptedLauncher};
use crate::common::{init_tracing, with_timeout};

use std::sync::Arc;
use std::time::Duration;

use parless::compile::InlineCompiler;
use parless::config::BuildConfig;
use parless::errors::ParlessError;
use parless::fs::RealFileSystem;
use parless::orchestrator::{run_build, Interrupts};
use parless::scheduler::{InProcessLauncher, Scheduler, SchedulerCore, SchedulerInput};
use parless::types::Job;

fn launcher(config: &BuildConfig) -> InProcessLauncher {
    InProcessLauncher::new(
        Arc::new(RealFileSystem),
        Arc::new(InlineCompiler::new()),
        config.worker_settings(),
    )
}

fn recording_launcher(config: &BuildConfig, compiler: Arc<RecordingCompiler>) -> InProcessLauncher {
    InProcessLauncher::new(Arc::new(RealFileSystem), compiler, config.worker_settings())
}

fn site() -> Fixture {
    Fixture::new()
        .with_file("src/_vars.less", ".vars { color: red; }\n")
        .with_file("src/main.less", "@import \"_vars\";\n.main { margin: 0; }\n")
        .with_file("src/pages/home.less", ".home { padding: 1px; }\n")
        .with_file("src/empty.less", "/* nothing here */\n")
}

#[tokio::test]
async fn builds_every_target_into_the_output_tree() {
    init_tracing();

    let fixture = site();
    let config = fixture.config().workers(2).build();

    let report = with_timeout(run_build(
        &config,
        Arc::new(RealFileSystem),
        launcher(&config),
        Interrupts::Ignore,
    ))
    .await
    .unwrap();

    assert_eq!(report.targets, 3);
    assert_eq!(report.workers, 2);
    assert_eq!(report.replacements, 0);

    let main = fixture.read("out/main.css").expect("main.css written");
    assert!(main.contains(".vars"), "{main}");
    assert!(main.contains(".main"), "{main}");
    assert!(fixture.read("out/pages/home.css").is_some());

    // Partials are never targets; empty output is not written.
    assert!(fixture.read("out/_vars.css").is_none());
    assert!(fixture.read("out/empty.css").is_none());
}

#[tokio::test]
async fn changed_partial_rebuilds_only_its_importer() {
    init_tracing();

    let fixture = site();
    let config = fixture.config().workers(2).changed("_vars.less").build();
    let compiler = Arc::new(RecordingCompiler::new());

    let report = with_timeout(run_build(
        &config,
        Arc::new(RealFileSystem),
        recording_launcher(&config, Arc::clone(&compiler)),
        Interrupts::Ignore,
    ))
    .await
    .unwrap();

    assert_eq!(report.targets, 1);
    assert_eq!(compiler.compiled(), vec![fixture.path("src/main.less")]);
    assert!(fixture.read("out/main.css").is_some());
    assert!(fixture.read("out/pages/home.css").is_none());
}

#[tokio::test]
async fn nothing_to_build_starts_no_workers() {
    let fixture = site();
    let config = fixture.config().changed("unknown.less").build();
    let scripted = ScriptedLauncher::new(launcher(&config));
    let launched = scripted.launched();

    let report = with_timeout(run_build(
        &config,
        Arc::new(RealFileSystem),
        scripted,
        Interrupts::Ignore,
    ))
    .await
    .unwrap();

    assert_eq!(report.targets, 0);
    assert!(launched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn compile_error_aborts_the_run() {
    init_tracing();

    let fixture = Fixture::new()
        .with_file("src/bad.less", ".bad { color: red;\n")
        .with_file("src/good.less", ".good { color: blue; }\n");
    let config = fixture.config().workers(1).build();

    let result = with_timeout(run_build(
        &config,
        Arc::new(RealFileSystem),
        launcher(&config),
        Interrupts::Ignore,
    ))
    .await;

    match result {
        Err(ParlessError::WorkerFailed { id, message }) => {
            assert_eq!(id, 0);
            assert!(message.contains("bad.less"), "{message}");
        }
        other => panic!("expected WorkerFailed, got {other:?}"),
    }
    assert!(fixture.read("out/good.css").is_none());
}

#[tokio::test]
async fn compiler_rejection_is_reported_with_the_file() {
    let fixture = Fixture::new().with_file("src/a.less", ".a { b: c; }\n");
    let config = fixture.config().workers(1).build();
    let compiler = Arc::new(RecordingCompiler::new().failing_on("a.less"));

    let result = with_timeout(run_build(
        &config,
        Arc::new(RealFileSystem),
        recording_launcher(&config, compiler),
        Interrupts::Ignore,
    ))
    .await;

    assert!(
        matches!(&result, Err(ParlessError::WorkerFailed { message, .. }) if message.contains("rejected")),
        "{result:?}"
    );
}

#[tokio::test]
async fn crash_during_a_build_aborts_and_spawns_one_replacement() {
    init_tracing();

    let fixture = site();
    let config = fixture.config().workers(1).build();
    let scripted = ScriptedLauncher::new(launcher(&config)).script(0, Script::CrashOnBuild);
    let launched = scripted.launched();

    let result = with_timeout(run_build(
        &config,
        Arc::new(RealFileSystem),
        scripted,
        Interrupts::Ignore,
    ))
    .await;

    match result {
        Err(ParlessError::WorkerCrashed { id, file }) => {
            assert_eq!(id, 0);
            assert_eq!(file, fixture.path("src/empty.less"));
        }
        other => panic!("expected WorkerCrashed, got {other:?}"),
    }
    assert_eq!(*launched.lock().unwrap(), vec![0, 1]);
}

#[tokio::test]
async fn idle_worker_crash_is_replaced_and_the_run_completes() {
    init_tracing();

    let fixture = Fixture::new()
        .with_file("src/a.less", ".a { b: c; }\n")
        .with_file("src/b.less", ".b { c: d; }\n");
    let config = fixture.config().workers(2).build();
    let scripted = ScriptedLauncher::new(launcher(&config))
        .script(0, Script::Slow(Duration::from_millis(500)))
        .script(1, Script::DrainThenExit);
    let launched = scripted.launched();

    let report = with_timeout(run_build(
        &config,
        Arc::new(RealFileSystem),
        scripted,
        Interrupts::Ignore,
    ))
    .await
    .unwrap();

    assert_eq!(report.replacements, 1);
    assert_eq!(report.jobs_per_worker, vec![(0, 1), (1, 1)]);
    assert_eq!(*launched.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn a_worker_failing_to_start_leaves_a_smaller_quorum() {
    let fixture = site();
    let config = fixture.config().workers(2).build();
    let scripted = ScriptedLauncher::new(launcher(&config)).script(1, Script::FailSpawn);

    let report = with_timeout(run_build(
        &config,
        Arc::new(RealFileSystem),
        scripted,
        Interrupts::Ignore,
    ))
    .await
    .unwrap();

    assert_eq!(report.workers, 1);
    assert!(fixture.read("out/main.css").is_some());
}

#[tokio::test]
async fn every_worker_exiting_before_ready_loses_the_quorum() {
    let fixture = site();
    let config = fixture.config().workers(2).build();
    let scripted = ScriptedLauncher::new(launcher(&config))
        .script(0, Script::ExitBeforeReady)
        .script(1, Script::ExitBeforeReady);

    let result = with_timeout(run_build(
        &config,
        Arc::new(RealFileSystem),
        scripted,
        Interrupts::Ignore,
    ))
    .await;

    assert!(
        matches!(result, Err(ParlessError::QuorumLost { spawned: 2 })),
        "{result:?}"
    );
}

#[tokio::test]
async fn silent_workers_hit_the_ready_timeout() {
    let fixture = site();
    let config = fixture
        .config()
        .workers(1)
        .ready_timeout(Duration::from_secs(1))
        .build();
    let scripted = ScriptedLauncher::new(launcher(&config)).script(0, Script::Silent);

    let result = with_timeout(run_build(
        &config,
        Arc::new(RealFileSystem),
        scripted,
        Interrupts::Ignore,
    ))
    .await;

    assert!(
        matches!(
            result,
            Err(ParlessError::ReadyTimeout {
                secs: 1,
                ready: 0,
                expected: 1
            })
        ),
        "{result:?}"
    );
}

#[tokio::test]
async fn shutdown_request_interrupts_the_run() {
    let fixture = site();
    let config = fixture.config().workers(1).build();
    let scripted = ScriptedLauncher::new(launcher(&config)).script(0, Script::Silent);

    let core = SchedulerCore::new(
        1,
        vec![Job::new(fixture.path("src/main.less"), fixture.path("out/main.css"))],
        Vec::new(),
        Duration::from_secs(60),
    );
    let scheduler = Scheduler::new(core, scripted);
    scheduler
        .input_sender()
        .send(SchedulerInput::ShutdownRequested)
        .await
        .unwrap();

    let result = with_timeout(scheduler.run()).await;
    assert!(matches!(result, Err(ParlessError::Interrupted)), "{result:?}");
}
