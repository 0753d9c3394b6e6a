#![allow(dead_code)]

pub use autoprd_test_utils::{
    builders, init_tracing, with_timeout, with_timeout_secs, FakeRepo, SnapshotBuilder,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
