// SPDX-License-Identifier: MIT
//
// Process-wide messaging runtime: owns the pipe fds, the match table, and
// the receiver threads. `Init`/`Finalize` bookend its lifetime; the
// module-level functions in `lib.rs` delegate to a process-global handle
// (spec.md §9's "thin module-level accessor for source-compatibility").

use std::env;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::{MimpiError, MimpiResult};
use crate::frame::CHUNK_SIZE;
use crate::match_table::{MatchTable, Message, RecvPoll};
use crate::pipe_io::{self, WriteOutcome};
use crate::{frame, receiver};

/// Largest world size this runtime accepts. Bounds the fixed-size
/// `MIMPI_READ_DSC_<i>`/`MIMPI_WRITE_DSC_<i>` env-var band and the number
/// of receiver threads spawned per process.
pub const MAX_WORLD_SIZE: usize = 32;

/// The process-wide messaging runtime.
///
/// Constructed by [`Runtime::init`] (reading environment variables set by
/// the launcher) or [`Runtime::from_parts`] (for tests and in-process
/// topologies). Torn down exactly once by [`Runtime::finalize`].
pub struct Runtime {
    world_size: usize,
    rank: usize,
    read_fds: Vec<RawFd>,
    write_fds: Vec<RawFd>,
    table: Arc<MatchTable>,
    receivers: Vec<JoinHandle<()>>,
}

/// Parse a required integer env var. Missing or malformed values are
/// startup configuration errors, not runtime faults a caller can recover
/// from — they abort the process, matching the launcher/runtime contract
/// where these variables are always set by `mimpirun`-style process setup.
fn parse_env_int(name: &str) -> i64 {
    let raw = env::var(name).unwrap_or_else(|_| panic!("missing required env var {name}"));
    raw.trim()
        .parse::<i64>()
        .unwrap_or_else(|e| panic!("env var {name}={raw:?} is not a valid integer: {e}"))
}

impl Runtime {
    /// Read `MIMPI_WORLD_SIZE`, `MIMPI_RANK`, and the per-peer descriptor
    /// env vars set by the launcher, then build the runtime and spawn one
    /// receiver thread per peer.
    ///
    /// `enable_deadlock_detection` is accepted for interface compatibility
    /// with the public `Init` surface but has no effect — deadlock
    /// detection is out of scope for this runtime.
    pub fn init(enable_deadlock_detection: bool) -> MimpiResult<Self> {
        if enable_deadlock_detection {
            log::debug!("deadlock detection requested but not implemented; ignoring");
        }

        // Ignore SIGPIPE: a write to a peer that has closed its read end
        // must surface as EPIPE on the write() call, not kill the process.
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_IGN);
        }

        let world_size = parse_env_int("MIMPI_WORLD_SIZE") as usize;
        let rank = parse_env_int("MIMPI_RANK") as usize;
        if !(2..=MAX_WORLD_SIZE).contains(&world_size) {
            panic!("MIMPI_WORLD_SIZE={world_size} outside supported range [2, {MAX_WORLD_SIZE}]");
        }
        if rank >= world_size {
            panic!("MIMPI_RANK={rank} out of range for world size {world_size}");
        }

        let mut read_fds = vec![-1 as RawFd; world_size];
        let mut write_fds = vec![-1 as RawFd; world_size];
        for i in 0..world_size {
            if i == rank {
                continue;
            }
            read_fds[i] = parse_env_int(&format!("MIMPI_READ_DSC_{i}")) as RawFd;
            write_fds[i] = parse_env_int(&format!("MIMPI_WRITE_DSC_{i}")) as RawFd;
        }

        Ok(Self::from_parts(world_size, rank, read_fds, write_fds))
    }

    /// Construct a runtime directly from already-open fds, skipping
    /// environment parsing. Used by the launcher-independent in-process
    /// topologies constructed in tests.
    pub fn from_parts(
        world_size: usize,
        rank: usize,
        read_fds: Vec<RawFd>,
        write_fds: Vec<RawFd>,
    ) -> Self {
        let table = Arc::new(MatchTable::new(world_size));
        let mut receivers = Vec::with_capacity(world_size - 1);
        for source in 0..world_size {
            if source == rank {
                continue;
            }
            let fd = read_fds[source];
            let table = Arc::clone(&table);
            receivers.push(std::thread::spawn(move || receiver::run(source, fd, table)));
        }

        Self {
            world_size,
            rank,
            read_fds,
            write_fds,
            table,
            receivers,
        }
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    fn validate_peer(&self, peer: i64) -> MimpiResult<usize> {
        if peer == self.rank as i64 {
            return Err(MimpiError::SelfOp);
        }
        if peer < 0 || peer as usize >= self.world_size {
            return Err(MimpiError::NoSuchRank);
        }
        Ok(peer as usize)
    }

    /// Blocking send of `data` (`data.len()` is the wire `count`) to
    /// `destination` tagged `tag`.
    pub fn send(&self, data: &[u8], destination: i64, tag: i32) -> MimpiResult {
        let destination = self.validate_peer(destination)?;
        let fd = self.write_fds[destination];

        let (first_chunk, consumed) = frame::encode_first(tag, data);
        match pipe_io::write_all_fd(fd, &first_chunk) {
            Ok(WriteOutcome::Full) => {}
            Ok(WriteOutcome::BrokenPipe) => return Err(MimpiError::RemoteFinished),
            Err(e) => panic!("send to rank {destination}: fatal error writing first chunk: {e}"),
        }

        let mut offset = consumed;
        while offset < data.len() {
            let take = (data.len() - offset).min(CHUNK_SIZE);
            match pipe_io::write_all_fd(fd, &data[offset..offset + take]) {
                Ok(WriteOutcome::Full) => {}
                Ok(WriteOutcome::BrokenPipe) => return Err(MimpiError::RemoteFinished),
                Err(e) => {
                    panic!("send to rank {destination}: fatal error writing continuation chunk: {e}")
                }
            }
            offset += take;
        }

        Ok(())
    }

    /// Blocking, tag-matched receive of exactly `data.len()` bytes from
    /// `source`. `tag == 0` matches any tag on the oldest queued message
    /// with an equal byte count.
    pub fn recv(&self, data: &mut [u8], source: i64, tag: i32) -> MimpiResult {
        let source = self.validate_peer(source)?;
        match self.table.recv(source, data.len() as i32, tag) {
            RecvPoll::Matched(Message { payload, .. }) => {
                data.copy_from_slice(&payload);
                Ok(())
            }
            RecvPoll::RemoteFinished => Err(MimpiError::RemoteFinished),
        }
    }

    /// Close every peer pipe endpoint, join all receiver threads, and
    /// drop any messages still queued. Consumes `self` so a second call is
    /// a compile error rather than a double-close at runtime.
    pub fn finalize(mut self) {
        // Close both endpoints of every peer pipe before joining: closing
        // the write end signals EOF to the remote receiver, closing the
        // read end is what unblocks this process's own receiver thread if
        // it is currently parked in a blocking read.
        for i in 0..self.world_size {
            if i == self.rank {
                continue;
            }
            if self.read_fds[i] >= 0 {
                pipe_io::close_fd(self.read_fds[i]);
            }
            if self.write_fds[i] >= 0 {
                pipe_io::close_fd(self.write_fds[i]);
            }
        }
        for handle in self.receivers.drain(..) {
            let _ = handle.join();
        }
    }
}
