// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`supervisor`] runs one [`InvocationPlan`](crate::plan::InvocationPlan):
//!   spawn, stream, cancel, finish.
//! - [`stream`] reads one child pipe line by line into the bounded output
//!   queue with drop-and-warn backpressure.
//! - [`scratch`] materialises the PRD copy with a leading instruction block.
//! - [`signal`] holds the OS-specific process-group signalling.

pub mod scratch;
pub mod signal;
pub mod stream;
pub mod supervisor;

use std::fmt;

use chrono::{DateTime, Local};

pub use scratch::ScratchInput;
pub use signal::{configure_process_group, GroupSignaller, PlatformSignaller};
pub use stream::{
    output_queue, pump_lines, LineForwarder, Offer, PumpStats, DEFAULT_QUEUE_CAPACITY,
    MAX_LINE_BYTES,
};
pub use supervisor::{RunOutcome, SessionState, Supervisor, SupervisorOptions};

/// Where a [`LogLine`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamOrigin {
    Stdout,
    Stderr,
    /// Generated by the supervisor or a reader (diagnostics, completion).
    Supervisor,
}

impl fmt::Display for StreamOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamOrigin::Stdout => "stdout",
            StreamOrigin::Stderr => "stderr",
            StreamOrigin::Supervisor => "supervisor",
        })
    }
}

/// One line of live output, as delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub time: DateTime<Local>,
    pub text: String,
    pub is_error: bool,
    pub origin: StreamOrigin,
}

impl LogLine {
    pub fn from_stream(origin: StreamOrigin, text: impl Into<String>) -> Self {
        Self {
            time: Local::now(),
            text: text.into(),
            is_error: origin == StreamOrigin::Stderr,
            origin,
        }
    }

    /// Supervisor diagnostic; always flagged as an error line.
    pub fn diagnostic(text: impl Into<String>) -> Self {
        Self {
            time: Local::now(),
            text: text.into(),
            is_error: true,
            origin: StreamOrigin::Supervisor,
        }
    }

    pub(crate) fn supervisor(text: impl Into<String>, is_error: bool) -> Self {
        Self {
            time: Local::now(),
            text: text.into(),
            is_error,
            origin: StreamOrigin::Supervisor,
        }
    }
}
