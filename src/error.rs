// SPDX-License-Identifier: MIT
//
// Typed return codes for the public send/recv/collective surface.
// System faults (unexpected OS errors, lock poisoning) are not represented
// here — they are fatal and abort the process via a direct panic at the
// call site in `runtime`/`receiver`.

use thiserror::Error;

/// Error returned by the blocking point-to-point and collective operations.
///
/// `Ok(())` is the library's `SUCCESS` return code; everything else the
/// operations can report without side effects or peer-lifecycle surprises
/// is one of these variants.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MimpiError {
    /// `Send`/`Recv` addressed the caller's own rank.
    #[error("attempted operation with own rank as peer")]
    SelfOp,
    /// `destination`/`source` fell outside `[0, world_size)`.
    #[error("no such rank")]
    NoSuchRank,
    /// The peer's side of the pipe has closed: it finalized or exited
    /// before (or while) this operation was waiting on it.
    #[error("remote peer has finished")]
    RemoteFinished,
    /// `finalize` was called on a runtime that was already torn down, or an
    /// operation was attempted after teardown.
    #[error("runtime already finalized")]
    AlreadyFinalized,
}

pub type MimpiResult<T = ()> = Result<T, MimpiError>;
