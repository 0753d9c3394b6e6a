// src/exec/stream.rs

//! Line reader for one child output stream.
//!
//! Lines are offered to the bounded output queue without ever waiting on
//! it. When the queue is full the line is dropped and an overflow episode
//! starts. The episode's single notice goes into the first slot that frees
//! up, ahead of the next line, and the episode ends once a line gets through
//! again. The tool writes its own full log file, so the live queue is
//! allowed to lose lines.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::{LogLine, StreamOrigin};

/// Longest single line forwarded as one [`LogLine`]; longer runs are split.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Size the line buffer starts at and shrinks back to after a long line.
pub const INITIAL_BUFFER_BYTES: usize = 64 * 1024;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Create the bounded output queue consumed by a UI.
pub fn output_queue(capacity: usize) -> (mpsc::Sender<LogLine>, mpsc::Receiver<LogLine>) {
    mpsc::channel(capacity.max(1))
}

/// Counters reported by a finished reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub lines: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub overflow_episodes: u64,
    pub bytes: u64,
}

/// What happened to one offered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Delivered,
    /// Queue full. `starts_episode` is true for the first drop of an
    /// episode.
    Dropped { starts_episode: bool },
    /// No consumer attached (or it went away); the line is read and thrown
    /// away.
    Discarded,
}

/// Non-blocking forwarder holding the per-stream backpressure state.
#[derive(Debug)]
pub struct LineForwarder {
    queue: Option<mpsc::Sender<LogLine>>,
    dropping: bool,
    /// The current episode's notice has been enqueued.
    noticed: bool,
    episode_dropped: u64,
    stats: PumpStats,
}

impl LineForwarder {
    pub fn new(queue: Option<mpsc::Sender<LogLine>>) -> Self {
        Self {
            queue,
            dropping: false,
            noticed: false,
            episode_dropped: 0,
            stats: PumpStats::default(),
        }
    }

    /// True while inside an overflow episode.
    pub fn is_dropping(&self) -> bool {
        self.dropping
    }

    pub fn stats(&self) -> PumpStats {
        self.stats
    }

    pub fn offer(&mut self, line: LogLine) -> Offer {
        self.stats.lines += 1;
        self.send_notice();
        let Some(queue) = self.queue.as_ref() else {
            return Offer::Discarded;
        };

        match queue.try_send(line) {
            Ok(()) => {
                self.dropping = false;
                self.noticed = false;
                self.episode_dropped = 0;
                self.stats.delivered += 1;
                Offer::Delivered
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped += 1;
                self.episode_dropped += 1;
                if self.dropping {
                    return Offer::Dropped {
                        starts_episode: false,
                    };
                }
                self.dropping = true;
                self.stats.overflow_episodes += 1;
                warn!(capacity = queue.max_capacity(), "output queue full; dropping lines");
                Offer::Dropped {
                    starts_episode: true,
                }
            }
            Err(TrySendError::Closed(_)) => {
                debug!("output queue closed by consumer; discarding further lines");
                self.queue = None;
                Offer::Discarded
            }
        }
    }

    /// Enqueue the current episode's notice if a slot is free. At most one
    /// notice per episode; never waits.
    pub fn send_notice(&mut self) {
        if !self.dropping || self.noticed {
            return;
        }
        let Some(queue) = self.queue.as_ref() else {
            return;
        };
        let Ok(permit) = queue.try_reserve() else {
            return;
        };

        let capacity = queue.max_capacity();
        let dropped = self.episode_dropped;
        permit.send(LogLine::diagnostic(format!(
            "output queue full (capacity {capacity} lines, {dropped} dropped); live output resumes here, the tool's log file is complete"
        )));
        self.noticed = true;
        debug!(capacity, dropped, "overflow notice enqueued");
    }
}

/// Read `reader` to EOF, forwarding each line tagged with `origin`.
///
/// With `queue = None` the stream is still drained so the child never
/// blocks on a full pipe.
pub async fn pump_lines<R>(
    reader: R,
    origin: StreamOrigin,
    queue: Option<mpsc::Sender<LogLine>>,
) -> io::Result<PumpStats>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(INITIAL_BUFFER_BYTES, reader);
    let mut forwarder = LineForwarder::new(queue);
    let mut buf: Vec<u8> = Vec::with_capacity(INITIAL_BUFFER_BYTES);
    let mut bytes = 0u64;
    let mut after_split = false;

    loop {
        buf.clear();
        if buf.capacity() > INITIAL_BUFFER_BYTES {
            buf.shrink_to(INITIAL_BUFFER_BYTES);
        }

        let read = read_line_capped(&mut reader, &mut buf, MAX_LINE_BYTES).await?;
        if read.bytes == 0 {
            break;
        }
        bytes += read.bytes as u64;

        // The newline that ends a line we already split is not a line.
        if after_split && (buf == b"\n" || buf == b"\r\n") {
            after_split = false;
            continue;
        }
        after_split = !read.terminated;

        trim_newline(&mut buf);
        let text = String::from_utf8_lossy(&buf).into_owned();
        forwarder.offer(LogLine::from_stream(origin, text));
    }

    // Room may have freed up since the last drop.
    forwarder.send_notice();

    let mut stats = forwarder.stats();
    stats.bytes = bytes;
    debug!(
        stream = %origin,
        lines = stats.lines,
        dropped = stats.dropped,
        "stream reader reached EOF"
    );
    Ok(stats)
}

struct LineRead {
    bytes: usize,
    /// False when the line was cut at the size limit or at EOF.
    terminated: bool,
}

async fn read_line_capped<R>(reader: &mut R, out: &mut Vec<u8>, max: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut total = 0;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(LineRead {
                bytes: total,
                terminated: false,
            });
        }

        let room = max - out.len();
        let (take, terminated, done) = match available.iter().position(|b| *b == b'\n') {
            Some(i) if i < room => (i + 1, true, true),
            _ => {
                let take = available.len().min(room);
                (take, false, take == room)
            }
        };

        out.extend_from_slice(&available[..take]);
        reader.consume(take);
        total += take;

        if done {
            return Ok(LineRead {
                bytes: total,
                terminated,
            });
        }
    }
}

fn trim_newline(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
}
