// SPDX-License-Identifier: MIT
//
// Per-peer receiver thread: blocks on the peer's read fd, frames inbound
// bytes into whole Messages, and deposits them into the match table.

use std::os::unix::io::RawFd;
use std::sync::Arc;

use crate::frame::{self, CHUNK_SIZE};
use crate::match_table::{MatchTable, Message};
use crate::pipe_io::{read_exact_fd, ReadOutcome};

/// Log a fatal I/O error and abort the whole process.
///
/// A panic here would only unwind this receiver thread: it is spawned via
/// `std::thread::spawn` and never joined except inside `Runtime::finalize`,
/// so an unwinding panic would leave `receiver_finished` unset and the
/// application thread parked in `Recv` forever instead of observing the
/// fault. Fatal faults must actually terminate the process, per spec.md
/// §7, regardless of which thread detects them.
fn fatal(source: usize, what: &str, err: std::io::Error) -> ! {
    log::error!("receiver[{source}]: fatal error {what}: {err}");
    std::process::abort();
}

/// Read and frame messages from `read_fd` (the pipe from peer `source`)
/// until the peer closes its write end, then mark `source` finished.
///
/// Runs for the lifetime of the runtime on a dedicated thread; terminates
/// normally on end-of-stream. Any other I/O error is a system fault and is
/// treated as fatal — a pipe between two sibling processes under this
/// runtime's control should never produce anything but clean EOF or
/// bytes, so anything else indicates a deeper problem than a peer
/// finishing.
pub fn run(source: usize, read_fd: RawFd, table: Arc<MatchTable>) {
    loop {
        let mut first = [0u8; CHUNK_SIZE];
        match read_exact_fd(read_fd, &mut first) {
            Ok(ReadOutcome::Eof) => break,
            Ok(ReadOutcome::Full) => {}
            Err(e) => fatal(source, "reading first chunk", e),
        }

        let hdr = frame::decode_header(&first);
        let count = hdr.count as usize;

        if count == 0 {
            table.push(
                source,
                Message {
                    count: 0,
                    tag: hdr.tag,
                    payload: Vec::new(),
                },
            );
            continue;
        }

        let mut payload = vec![0u8; count];
        let prefix = frame::first_chunk_payload(&first, count);
        payload[..prefix.len()].copy_from_slice(prefix);

        let mut offset = prefix.len();
        let mut should_break = false;
        while offset < count {
            let take = (count - offset).min(CHUNK_SIZE);
            match read_exact_fd(read_fd, &mut payload[offset..offset + take]) {
                Ok(ReadOutcome::Full) => {}
                Ok(ReadOutcome::Eof) => {
                    should_break = true;
                    break;
                }
                Err(e) => fatal(source, "reading continuation chunk", e),
            }
            offset += take;
        }

        if should_break {
            break;
        }

        table.push(
            source,
            Message {
                count: hdr.count,
                tag: hdr.tag,
                payload,
            },
        );
    }

    log::debug!("receiver[{source}] observed end-of-stream, terminating");
    table.mark_finished(source);
}
