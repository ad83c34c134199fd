//! Newline-delimited JSON event feed

use crate::engine::ProgressHandle;
use crate::error::{ProgressError, ProgressResult};
use crate::events::EventParser;
use crate::metrics;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// Line counts from one feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub applied: u64,
    pub rejected: u64,
}

/// Read events from `reader` until EOF, feeding each to the engine.
///
/// Malformed or rejected lines are logged and counted; the feed keeps going.
/// Only a closed engine or a read failure ends it early.
pub async fn run_reader<R>(mut reader: R, handle: ProgressHandle) -> ProgressResult<IngestStats>
where
    R: AsyncBufRead + Unpin,
{
    let parser = EventParser::new();
    let mut stats = IngestStats::default();
    let mut line_no = 0u64;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| ProgressError::Internal(format!("read failed: {}", e)))?;
        if read == 0 {
            break;
        }
        line_no += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                let e = ProgressError::EventParsing(format!("invalid UTF-8: {}", e));
                warn!("Skipping line {}: {}", line_no, e);
                metrics::record_rejected(&e);
                stats.rejected += 1;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let event = match parser.parse_line(line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping line {}: {}", line_no, e);
                metrics::record_rejected(&e);
                stats.rejected += 1;
                continue;
            }
        };

        match handle.apply(event).await {
            Ok(snapshot) => {
                debug!(
                    "Line {} applied: {}/{} steps complete",
                    line_no, snapshot.completed_count, snapshot.total
                );
                stats.applied += 1;
            }
            Err(ProgressError::EngineClosed) => return Err(ProgressError::EngineClosed),
            Err(e) => {
                warn!("Line {} rejected: {}", line_no, e);
                stats.rejected += 1;
            }
        }
    }

    info!(
        "Event feed ended: {} applied, {} rejected",
        stats.applied, stats.rejected
    );
    Ok(stats)
}

/// Feed events from the process's stdin
pub async fn run_stdin(handle: ProgressHandle) -> ProgressResult<IngestStats> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    run_reader(stdin, handle).await
}
