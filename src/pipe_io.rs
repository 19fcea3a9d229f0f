// SPDX-License-Identifier: MIT
//
// Blocking read/write over a raw pipe file descriptor, with partial-transfer
// handling. This is the "channel abstraction" spec.md treats as an external
// collaborator — folded in here since the runtime owns the fds directly.
//
// Mirrors the raw-libc-syscall discipline of `platform::posix` in the
// teacher crate (direct `libc::read`/`libc::write` over an fd the caller
// owns, `EINTR` retried, other errors mapped to `io::Error`), adapted from
// shm mmap/munmap calls to blocking stream I/O.

use std::io;
use std::os::unix::io::RawFd;

/// Outcome of a full-buffer blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `buf` was filled completely.
    Full,
    /// The peer closed the pipe before any bytes of this call were read.
    Eof,
}

/// Outcome of a full-buffer blocking write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// All of `buf` was written.
    Full,
    /// The reader has gone away (`EPIPE`).
    BrokenPipe,
}

/// Read exactly `buf.len()` bytes from `fd`, blocking as needed.
///
/// Returns `Eof` only when the stream closes with zero bytes read so far
/// (clean end-of-stream before the message even starts). A close that
/// happens mid-message, after some bytes of this call were already read,
/// is a protocol violation by the peer and is reported as a fatal I/O
/// error, since a partially written chunk can never be completed once the
/// writer disappears — the spec only allows EOF between messages, and the
/// writer is always a single thread per peer that appends whole chunks.
pub fn read_exact_fd(fd: RawFd, buf: &mut [u8]) -> io::Result<ReadOutcome> {
    let mut off = 0usize;
    while off < buf.len() {
        let ret = unsafe {
            libc::read(
                fd,
                buf[off..].as_mut_ptr() as *mut libc::c_void,
                buf.len() - off,
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if ret == 0 {
            if off == 0 {
                return Ok(ReadOutcome::Eof);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed mid-chunk",
            ));
        }
        off += ret as usize;
    }
    Ok(ReadOutcome::Full)
}

/// Write exactly `buf` to `fd`, blocking as needed.
pub fn write_all_fd(fd: RawFd, buf: &[u8]) -> io::Result<WriteOutcome> {
    let mut off = 0usize;
    while off < buf.len() {
        let ret =
            unsafe { libc::write(fd, buf[off..].as_ptr() as *const libc::c_void, buf.len() - off) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::BrokenPipe => return Ok(WriteOutcome::BrokenPipe),
                _ => {
                    if err.raw_os_error() == Some(libc::EPIPE) {
                        return Ok(WriteOutcome::BrokenPipe);
                    }
                    return Err(err);
                }
            }
        }
        off += ret as usize;
    }
    Ok(WriteOutcome::Full)
}

/// Close a raw fd, logging (not panicking) on failure — teardown must not
/// abort partway through closing the remaining peer fds.
pub fn close_fd(fd: RawFd) {
    if unsafe { libc::close(fd) } != 0 {
        log::warn!(
            "close({fd}) failed during teardown: {}",
            io::Error::last_os_error()
        );
    }
}
