#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout, TestResult};

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};

use autoprd::errors::RunnerError;
use autoprd::exec::{
    output_queue, GroupSignaller, LogLine, PlatformSignaller, RunOutcome, StreamOrigin,
    Supervisor, SupervisorOptions,
};
use autoprd::plan::InvocationPlan;
use autoprd::policy::SanctionedDirs;

fn sh(script: &str, extra: &[&str]) -> InvocationPlan {
    let mut args = vec!["-c".to_string(), script.to_string(), "sh".to_string()];
    args.extend(extra.iter().map(|s| s.to_string()));
    InvocationPlan::from_parts("/bin/sh", args, vec!["PATH=/usr/bin:/bin".to_string()])
}

fn options(grace: Duration, scratch: &Path) -> SupervisorOptions {
    SupervisorOptions {
        grace,
        sanctioned: SanctionedDirs::new(scratch, None),
    }
}

async fn drain(mut rx: mpsc::Receiver<LogLine>) -> Vec<LogLine> {
    let mut out = Vec::new();
    while let Some(l) = rx.recv().await {
        out.push(l);
    }
    out
}

async fn wait_for(rx: &mut mpsc::Receiver<LogLine>, text: &str, seen: &mut Vec<LogLine>) {
    while let Some(l) = rx.recv().await {
        let hit = l.text == text;
        seen.push(l);
        if hit {
            return;
        }
    }
    panic!("queue closed before {text:?} arrived");
}

fn finish_lines(lines: &[LogLine]) -> Vec<&LogLine> {
    lines
        .iter()
        .filter(|l| l.origin == StreamOrigin::Supervisor && l.text.starts_with("process finished"))
        .collect()
}

fn assert_single_trailing_finish(lines: &[LogLine]) {
    let finished = finish_lines(lines);
    assert_eq!(finished.len(), 1, "exactly one completion line: {lines:#?}");
    assert_eq!(lines.last(), Some(finished[0]), "completion line comes last");
}

/// Interrupts always fail; kills fail too when `refuse_kill` is set.
struct RefusingSignaller {
    refuse_kill: bool,
}

impl GroupSignaller for RefusingSignaller {
    fn interrupt(&self, _pid: u32) -> io::Result<()> {
        Err(io::Error::other("interrupt refused"))
    }

    fn kill(&self, pid: u32) -> io::Result<()> {
        if self.refuse_kill {
            Err(io::Error::other("kill refused"))
        } else {
            PlatformSignaller::default().kill(pid)
        }
    }
}

#[tokio::test]
async fn normal_exit_streams_both_pipes_then_finishes_once() -> TestResult {
    init_tracing();
    let scratch = tempfile::tempdir()?;
    let (tx, rx) = output_queue(64);
    let collector = tokio::spawn(drain(rx));
    let (_cancel_tx, cancel_rx) = oneshot::channel();

    let outcome = with_timeout(
        Supervisor::new(options(Duration::from_secs(5), scratch.path())).run(
            sh("echo out; echo err >&2; exit 3", &[]),
            None,
            Some(tx),
            cancel_rx,
        ),
    )
    .await?;

    assert_eq!(
        outcome,
        RunOutcome::Exited {
            code: Some(3),
            success: false
        }
    );
    assert!(matches!(outcome.into_result(), Err(RunnerError::ProcessFailed(Some(3)))));

    // The collector only finishes once every sender is gone.
    let lines = with_timeout(collector).await?;
    let out = lines.iter().find(|l| l.text == "out").expect("stdout line");
    assert!(!out.is_error);
    assert_eq!(out.origin, StreamOrigin::Stdout);
    let err = lines.iter().find(|l| l.text == "err").expect("stderr line");
    assert!(err.is_error);
    assert_eq!(err.origin, StreamOrigin::Stderr);

    assert_single_trailing_finish(&lines);
    assert_eq!(lines.last().unwrap().text, "process finished (exit code 3)");
    Ok(())
}

#[tokio::test]
async fn successful_exit_is_not_an_error_line() -> TestResult {
    let scratch = tempfile::tempdir()?;
    let (tx, rx) = output_queue(16);
    let collector = tokio::spawn(drain(rx));
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    // Dropping the sender means "never cancel".
    drop(cancel_tx);

    let outcome = with_timeout(
        Supervisor::new(options(Duration::from_secs(5), scratch.path())).run(
            sh("sleep 0.2; echo done", &[]),
            None,
            Some(tx),
            cancel_rx,
        ),
    )
    .await?;
    assert!(outcome.success());
    assert_eq!(outcome.into_result()?, Some(0));

    let lines = with_timeout(collector).await?;
    assert_single_trailing_finish(&lines);
    assert!(!lines.last().unwrap().is_error);
    Ok(())
}

#[tokio::test]
async fn cancellation_interrupts_the_group_within_grace() -> TestResult {
    init_tracing();
    let scratch = tempfile::tempdir()?;
    let grace = Duration::from_secs(3);
    let (tx, mut rx) = output_queue(64);
    let (cancel_tx, cancel_rx) = oneshot::channel();

    let opts = options(grace, scratch.path());
    let run = tokio::spawn(async move {
        Supervisor::new(opts)
            .run(sh("echo ready; sleep 30", &[]), None, Some(tx), cancel_rx)
            .await
    });

    let mut lines = Vec::new();
    with_timeout(wait_for(&mut rx, "ready", &mut lines)).await;

    let started = Instant::now();
    cancel_tx.send(()).expect("supervisor still listening");
    let outcome = with_timeout(run).await??;
    let elapsed = started.elapsed();

    assert!(matches!(outcome, RunOutcome::Cancelled { escalated: false, .. }), "{outcome:?}");
    assert!(elapsed < grace, "took {elapsed:?}");
    assert!(matches!(outcome.into_result(), Err(RunnerError::Cancelled)));

    lines.extend(with_timeout(drain(rx)).await);
    assert_single_trailing_finish(&lines);
    assert_eq!(lines.last().unwrap().text, "process finished (cancelled)");
    Ok(())
}

#[tokio::test]
async fn ignored_interrupt_escalates_to_kill_after_grace() -> TestResult {
    init_tracing();
    let scratch = tempfile::tempdir()?;
    let grace = Duration::from_millis(300);
    let (tx, mut rx) = output_queue(64);
    let (cancel_tx, cancel_rx) = oneshot::channel();

    let opts = options(grace, scratch.path());
    let run = tokio::spawn(async move {
        Supervisor::new(opts)
            .run(
                sh("trap '' INT; echo ready; sleep 30", &[]),
                None,
                Some(tx),
                cancel_rx,
            )
            .await
    });

    let mut lines = Vec::new();
    with_timeout(wait_for(&mut rx, "ready", &mut lines)).await;

    let started = Instant::now();
    cancel_tx.send(()).expect("supervisor still listening");
    let outcome = with_timeout(run).await??;
    let elapsed = started.elapsed();

    assert!(matches!(outcome, RunOutcome::Cancelled { escalated: true, .. }), "{outcome:?}");
    assert!(elapsed >= grace, "killed before the grace window ran out: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");

    lines.extend(with_timeout(drain(rx)).await);
    assert_single_trailing_finish(&lines);
    assert!(lines.last().unwrap().text.contains("killed after grace window"));
    Ok(())
}

#[tokio::test]
async fn descendant_ignoring_interrupt_cannot_hold_the_pipes_past_grace() -> TestResult {
    init_tracing();
    let scratch = tempfile::tempdir()?;
    let grace = Duration::from_millis(500);
    let (tx, mut rx) = output_queue(64);
    let (cancel_tx, cancel_rx) = oneshot::channel();

    // The shell exits on the interrupt; its background job keeps stdout open.
    let opts = options(grace, scratch.path());
    let run = tokio::spawn(async move {
        Supervisor::new(opts)
            .run(
                sh("(trap '' INT; sleep 8) & echo ready; wait", &[]),
                None,
                Some(tx),
                cancel_rx,
            )
            .await
    });

    let mut lines = Vec::new();
    with_timeout(wait_for(&mut rx, "ready", &mut lines)).await;

    let started = Instant::now();
    cancel_tx.send(()).expect("supervisor still listening");
    let outcome = with_timeout(run).await??;
    let elapsed = started.elapsed();

    assert!(outcome.is_cancelled(), "{outcome:?}");
    assert!(elapsed < grace + Duration::from_secs(2), "took {elapsed:?}");

    lines.extend(with_timeout(drain(rx)).await);
    assert_single_trailing_finish(&lines);
    assert_eq!(
        lines.last().unwrap().text,
        "process finished (cancelled; killed after grace window)"
    );
    Ok(())
}

#[tokio::test]
async fn failed_interrupt_is_reported_and_run_still_ends() -> TestResult {
    let scratch = tempfile::tempdir()?;
    let (tx, mut rx) = output_queue(64);
    let (cancel_tx, cancel_rx) = oneshot::channel();

    let opts = options(Duration::from_millis(200), scratch.path());
    let run = tokio::spawn(async move {
        Supervisor::with_signaller(opts, RefusingSignaller { refuse_kill: false })
            .run(sh("echo ready; sleep 30", &[]), None, Some(tx), cancel_rx)
            .await
    });

    let mut lines = Vec::new();
    with_timeout(wait_for(&mut rx, "ready", &mut lines)).await;
    cancel_tx.send(()).expect("supervisor still listening");

    let outcome = with_timeout(run).await??;
    assert!(matches!(outcome, RunOutcome::Cancelled { escalated: true, .. }));

    lines.extend(with_timeout(drain(rx)).await);
    let diag = lines
        .iter()
        .find(|l| l.text.contains("failed to interrupt process group"))
        .expect("interrupt failure diagnostic");
    assert!(diag.is_error);
    assert_eq!(diag.origin, StreamOrigin::Supervisor);
    assert_single_trailing_finish(&lines);
    Ok(())
}

#[tokio::test]
async fn failed_group_kill_falls_back_to_the_direct_child() -> TestResult {
    let scratch = tempfile::tempdir()?;
    let (tx, mut rx) = output_queue(64);
    let (cancel_tx, cancel_rx) = oneshot::channel();

    let opts = options(Duration::from_millis(200), scratch.path());
    let run = tokio::spawn(async move {
        Supervisor::with_signaller(opts, RefusingSignaller { refuse_kill: true })
            .run(sh("echo ready; exec sleep 30", &[]), None, Some(tx), cancel_rx)
            .await
    });

    let mut lines = Vec::new();
    with_timeout(wait_for(&mut rx, "ready", &mut lines)).await;
    cancel_tx.send(()).expect("supervisor still listening");

    let outcome = with_timeout(run).await??;
    assert!(matches!(outcome, RunOutcome::Cancelled { escalated: true, .. }));

    lines.extend(with_timeout(drain(rx)).await);
    assert!(lines.iter().any(|l| l.text.contains("failed to kill process group")));
    assert_single_trailing_finish(&lines);
    Ok(())
}

#[tokio::test]
async fn instruction_is_prepended_in_a_scratch_copy_that_is_removed() -> TestResult {
    init_tracing();
    let work = tempfile::tempdir()?;
    let scratch = work.path().join("scratch");
    let prd = work.path().join("prd.md");
    fs::write(&prd, "# Original\nbody\n")?;

    let (tx, rx) = output_queue(64);
    let collector = tokio::spawn(drain(rx));
    let (_cancel_tx, cancel_rx) = oneshot::channel();

    let outcome = with_timeout(
        Supervisor::new(options(Duration::from_secs(5), &scratch)).run(
            sh(r#"cat "$2""#, &["--prd", prd.to_str().unwrap()]),
            Some("Focus on tests.\n"),
            Some(tx),
            cancel_rx,
        ),
    )
    .await?;
    assert!(outcome.success());

    let lines = with_timeout(collector).await?;
    let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(
        &texts[..6],
        &[
            "<!-- autoprd:instructions:begin -->",
            "Focus on tests.",
            "<!-- autoprd:instructions:end -->",
            "",
            "# Original",
            "body",
        ]
    );
    assert_single_trailing_finish(&lines);

    assert_eq!(fs::read_to_string(&prd)?, "# Original\nbody\n");
    assert_eq!(fs::read_dir(&scratch)?.count(), 0, "scratch copy left behind");
    Ok(())
}

#[tokio::test]
async fn scratch_copy_is_removed_after_cancellation() -> TestResult {
    let work = tempfile::tempdir()?;
    let scratch = work.path().join("scratch");
    let prd = work.path().join("prd.md");
    fs::write(&prd, "body\n")?;

    let (tx, mut rx) = output_queue(64);
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let opts = options(Duration::from_secs(3), &scratch);
    let plan = sh("echo ready; sleep 30", &["--prd", prd.to_str().unwrap()]);
    let run = tokio::spawn(async move {
        Supervisor::new(opts)
            .run(plan, Some("stop early"), Some(tx), cancel_rx)
            .await
    });

    let mut lines = Vec::new();
    with_timeout(wait_for(&mut rx, "ready", &mut lines)).await;
    assert_eq!(fs::read_dir(&scratch)?.count(), 1, "scratch copy exists while running");

    cancel_tx.send(()).expect("supervisor still listening");
    let outcome = with_timeout(run).await??;
    assert!(outcome.is_cancelled());
    assert_eq!(fs::read_dir(&scratch)?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn instruction_without_prd_argument_fails_before_spawn() -> TestResult {
    let scratch = tempfile::tempdir()?;
    let (tx, rx) = output_queue(8);
    let (_cancel_tx, cancel_rx) = oneshot::channel();

    let err = Supervisor::new(options(Duration::from_secs(1), scratch.path()))
        .run(sh("echo never", &[]), Some("text"), Some(tx), cancel_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Scratch(_)), "{err:?}");

    let lines = with_timeout(drain(rx)).await;
    assert_eq!(lines.len(), 2, "{lines:#?}");
    assert!(lines[0].is_error);
    assert!(lines[0].text.starts_with("failed to prepare run"));
    assert!(lines.iter().all(|l| l.text != "never"));
    assert_single_trailing_finish(&lines);
    assert_eq!(lines[1].text, "process finished (failed to start)");
    assert!(lines[1].is_error);
    Ok(())
}

#[tokio::test]
async fn launch_failure_is_reported_and_queue_closes() -> TestResult {
    let scratch = tempfile::tempdir()?;
    let (tx, rx) = output_queue(8);
    let (_cancel_tx, cancel_rx) = oneshot::channel();
    let plan = InvocationPlan::from_parts("/nonexistent/bin/python3", vec![], vec![]);

    let err = Supervisor::new(options(Duration::from_secs(1), scratch.path()))
        .run(plan, None, Some(tx), cancel_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Launch { .. }), "{err:?}");
    assert_eq!(err.exit_code(), 1);

    let lines = with_timeout(drain(rx)).await;
    assert_eq!(lines.len(), 2, "{lines:#?}");
    assert!(lines[0].text.starts_with("failed to start"));
    assert_eq!(lines[0].origin, StreamOrigin::Supervisor);
    assert_single_trailing_finish(&lines);
    assert_eq!(lines[1].text, "process finished (failed to start)");
    Ok(())
}

#[tokio::test]
async fn output_is_drained_without_a_consumer() -> TestResult {
    let scratch = tempfile::tempdir()?;
    let (_cancel_tx, cancel_rx) = oneshot::channel();

    let outcome = with_timeout(
        Supervisor::new(options(Duration::from_secs(1), scratch.path())).run(
            sh("i=0; while [ $i -lt 3000 ]; do echo line $i; i=$((i+1)); done", &[]),
            None,
            None,
            cancel_rx,
        ),
    )
    .await?;
    assert!(outcome.success());
    Ok(())
}

#[tokio::test]
async fn slow_consumer_loses_lines_but_not_the_completion() -> TestResult {
    let scratch = tempfile::tempdir()?;
    let (tx, rx) = output_queue(1);
    let (_cancel_tx, cancel_rx) = oneshot::channel();

    let opts = options(Duration::from_secs(5), scratch.path());
    let run = tokio::spawn(async move {
        Supervisor::new(opts)
            .run(
                sh("i=0; while [ $i -lt 500 ]; do echo line $i; i=$((i+1)); done", &[]),
                None,
                Some(tx),
                cancel_rx,
            )
            .await
    });

    // Let the tool finish while nobody reads.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let lines = with_timeout(drain(rx)).await;
    let outcome = with_timeout(run).await??;

    assert!(outcome.success());
    assert_eq!(lines.first().map(|l| l.text.as_str()), Some("line 0"));
    assert!(lines.len() < 500);
    assert_single_trailing_finish(&lines);
    Ok(())
}
