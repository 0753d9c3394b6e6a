use std::path::PathBuf;

use clap::Parser;

use autoprd::cli::{CliArgs, LogLevel};
use autoprd::exec::DEFAULT_QUEUE_CAPACITY;
use autoprd::logging::parse_level_str;

#[test]
fn defaults_apply_when_only_prd_is_given() {
    let args = CliArgs::try_parse_from(["autoprd", "--prd", "docs/prd.md"]).unwrap();
    assert_eq!(args.config, PathBuf::from("autoprd.toml"));
    assert_eq!(args.prd, PathBuf::from("docs/prd.md"));
    assert_eq!(args.grace_seconds, 5);
    assert_eq!(args.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    assert!(args.log_file.is_none());
    assert!(!args.print_plan);
    assert!(args.log_level.is_none());
}

#[test]
fn prd_is_required() {
    assert!(CliArgs::try_parse_from(["autoprd"]).is_err());
}

#[test]
fn instruction_sources_are_mutually_exclusive() {
    let res = CliArgs::try_parse_from([
        "autoprd",
        "--prd",
        "p.md",
        "--instruction",
        "hi",
        "--instruction-file",
        "i.txt",
    ]);
    assert!(res.is_err());
}

#[test]
fn all_flags_parse() {
    let args = CliArgs::try_parse_from([
        "autoprd",
        "--config",
        "cfg/autoprd.toml",
        "--prd",
        "p.md",
        "--log-file",
        "/tmp/run.log",
        "--tool-log-level",
        "warn",
        "--instruction",
        "be brief",
        "--grace-seconds",
        "9",
        "--queue-capacity",
        "10",
        "--print-plan",
        "--log-level",
        "debug",
    ])
    .unwrap();
    assert_eq!(args.config, PathBuf::from("cfg/autoprd.toml"));
    assert_eq!(args.log_file, Some(PathBuf::from("/tmp/run.log")));
    assert_eq!(args.tool_log_level.as_deref(), Some("warn"));
    assert_eq!(args.instruction.as_deref(), Some("be brief"));
    assert_eq!(args.grace_seconds, 9);
    assert_eq!(args.queue_capacity, 10);
    assert!(args.print_plan);
    assert_eq!(args.log_level, Some(LogLevel::Debug));
}

#[test]
fn env_log_levels_parse_leniently() {
    assert_eq!(parse_level_str(" Debug "), Some(tracing::Level::DEBUG));
    assert_eq!(parse_level_str("warning"), Some(tracing::Level::WARN));
    assert_eq!(parse_level_str("loud"), None);
}
