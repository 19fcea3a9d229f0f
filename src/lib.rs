// SPDX-License-Identifier: MIT
//
// Blocking point-to-point and collective message passing between sibling
// processes connected by a full mesh of anonymous pipes. A process's
// [`Runtime`] owns its half of that mesh; [`init`]/[`finalize`] and the
// free functions below back a process-global handle for callers that want
// the flat, module-level API instead of holding a `Runtime` themselves.

pub mod collectives;
mod error;
pub mod frame;
mod match_table;
mod pipe_io;
mod receiver;
mod runtime;

pub use collectives::MimpiOp;
pub use error::{MimpiError, MimpiResult};
pub use frame::{ANY_TAG, BARRIER_TAG, BCAST_TAG, REDUCE_TAG};
pub use runtime::{Runtime, MAX_WORLD_SIZE};

use std::sync::{Mutex, OnceLock};

fn handle() -> &'static Mutex<Option<Runtime>> {
    static HANDLE: OnceLock<Mutex<Option<Runtime>>> = OnceLock::new();
    HANDLE.get_or_init(|| Mutex::new(None))
}

/// Initialize the process-global runtime from the `MIMPI_*` environment
/// variables set by the launcher, and spawn its receiver threads.
///
/// Panics if called twice without an intervening [`finalize`] — that is a
/// caller bug, not a recoverable condition.
pub fn init(enable_deadlock_detection: bool) -> MimpiResult {
    let mut slot = handle().lock().unwrap();
    assert!(slot.is_none(), "mimpi::init called while already initialized");
    *slot = Some(Runtime::init(enable_deadlock_detection)?);
    Ok(())
}

/// Tear down the process-global runtime: close every peer pipe endpoint
/// and join the receiver threads.
///
/// Returns `MimpiError::AlreadyFinalized` if [`init`] was never called or
/// [`finalize`] already ran once — a second teardown would otherwise risk
/// double-closing an fd the OS has since reused for something else.
pub fn finalize() -> MimpiResult {
    match handle().lock().unwrap().take() {
        Some(runtime) => {
            runtime.finalize();
            Ok(())
        }
        None => Err(MimpiError::AlreadyFinalized),
    }
}

/// Run `f` against the live runtime. Only for queries with no failure mode
/// of their own (`world_rank`/`world_size`) — panics if called before
/// `init` or after `finalize`, since there's no sensible value to return.
fn with_runtime<T>(f: impl FnOnce(&Runtime) -> T) -> T {
    let slot = handle().lock().unwrap();
    let runtime = slot
        .as_ref()
        .expect("mimpi function called before init or after finalize");
    f(runtime)
}

/// Run `f` against the live runtime, reporting a missing runtime as
/// `MimpiError::AlreadyFinalized` rather than panicking.
fn try_with_runtime<T>(f: impl FnOnce(&Runtime) -> MimpiResult<T>) -> MimpiResult<T> {
    let slot = handle().lock().unwrap();
    match slot.as_ref() {
        Some(runtime) => f(runtime),
        None => Err(MimpiError::AlreadyFinalized),
    }
}

/// This process's position in `[0, world_size)`.
pub fn world_rank() -> usize {
    with_runtime(Runtime::rank)
}

/// The number of sibling processes in this run.
pub fn world_size() -> usize {
    with_runtime(Runtime::world_size)
}

/// Blocking send of `data` to `destination`, tagged `tag`.
pub fn send(data: &[u8], destination: i64, tag: i32) -> MimpiResult {
    try_with_runtime(|rt| rt.send(data, destination, tag))
}

/// Blocking, tag-matched receive of exactly `data.len()` bytes from `source`.
pub fn recv(data: &mut [u8], source: i64, tag: i32) -> MimpiResult {
    try_with_runtime(|rt| rt.recv(data, source, tag))
}

/// Block until every rank has called `barrier`.
pub fn barrier() -> MimpiResult {
    try_with_runtime(collectives::barrier)
}

/// Broadcast `data` from `root` to every rank, in place.
pub fn bcast(data: &mut [u8], root: usize) -> MimpiResult {
    try_with_runtime(|rt| collectives::bcast(rt, data, root))
}

/// Elementwise-reduce `send_data` across all ranks into `recv_data` at `root`.
pub fn reduce(send_data: &[u8], recv_data: &mut [u8], op: MimpiOp, root: usize) -> MimpiResult {
    try_with_runtime(|rt| collectives::reduce(rt, send_data, recv_data, op, root))
}
