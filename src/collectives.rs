// SPDX-License-Identifier: MIT
//
// Binary-tree collectives layered on Send/Recv using the reserved
// BARRIER_TAG/BCAST_TAG/REDUCE_TAG. Every rank computes its own place in
// the tree from (rank, root, world_size); no extra wire messages describe
// topology.

use crate::error::MimpiResult;
use crate::frame::{BARRIER_TAG, BCAST_TAG, REDUCE_TAG};
use crate::runtime::Runtime;

/// Elementwise reduction operator. Operands are the payload bytes
/// reinterpreted as `i8` lanes; `Sum`/`Prod` wrap on overflow rather than
/// panicking, matching plain 8-bit arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimpiOp {
    Max,
    Min,
    Sum,
    Prod,
}

impl MimpiOp {
    fn apply(self, dest: i8, src: i8) -> i8 {
        match self {
            MimpiOp::Max => dest.max(src),
            MimpiOp::Min => dest.min(src),
            MimpiOp::Sum => dest.wrapping_add(src),
            MimpiOp::Prod => dest.wrapping_mul(src),
        }
    }
}

/// A rank's neighbors in the binary tree rooted at some `root`. `None`
/// means the position doesn't exist for this `(rank, root, world_size)`.
struct TreePos {
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
}

/// Map `rank` to its parent/children, re-expressed as physical ranks.
///
/// `tree_idx` is `rank`'s index in root-relative numbering (root is index
/// 0); parent is `(tree_idx-1)/2`, children are `2*tree_idx+1`/`+2`, each
/// mapped back to a physical rank by adding `root` modulo `world_size`.
fn tree_pos(rank: usize, root: usize, world_size: usize) -> TreePos {
    let tree_idx = (rank + world_size - root) % world_size;
    let parent = (tree_idx != 0).then(|| ((tree_idx - 1) / 2 + root) % world_size);
    let left = (2 * tree_idx + 1 < world_size).then(|| (2 * tree_idx + 1 + root) % world_size);
    let right = (2 * tree_idx + 2 < world_size).then(|| (2 * tree_idx + 2 + root) % world_size);
    TreePos { parent, left, right }
}

/// Block until every rank has called `barrier`. Always rooted at rank 0.
pub fn barrier(runtime: &Runtime) -> MimpiResult {
    let pos = tree_pos(runtime.rank(), 0, runtime.world_size());

    if let Some(left) = pos.left {
        runtime.recv(&mut [], left as i64, BARRIER_TAG)?;
    }
    if let Some(right) = pos.right {
        runtime.recv(&mut [], right as i64, BARRIER_TAG)?;
    }

    if let Some(parent) = pos.parent {
        let _ = runtime.send(&[], parent as i64, BARRIER_TAG);
        runtime.recv(&mut [], parent as i64, BARRIER_TAG)?;
    }

    if let Some(left) = pos.left {
        let _ = runtime.send(&[], left as i64, BARRIER_TAG);
    }
    if let Some(right) = pos.right {
        let _ = runtime.send(&[], right as i64, BARRIER_TAG);
    }

    Ok(())
}

/// Broadcast `data` from `root` to every rank, in place.
pub fn bcast(runtime: &Runtime, data: &mut [u8], root: usize) -> MimpiResult {
    let pos = tree_pos(runtime.rank(), root, runtime.world_size());

    if let Some(left) = pos.left {
        runtime.recv(&mut [], left as i64, BCAST_TAG)?;
    }
    if let Some(right) = pos.right {
        runtime.recv(&mut [], right as i64, BCAST_TAG)?;
    }

    if let Some(parent) = pos.parent {
        let _ = runtime.send(&[], parent as i64, BCAST_TAG);
        runtime.recv(data, parent as i64, BCAST_TAG)?;
    }

    if let Some(left) = pos.left {
        let _ = runtime.send(data, left as i64, BCAST_TAG);
    }
    if let Some(right) = pos.right {
        let _ = runtime.send(data, right as i64, BCAST_TAG);
    }

    Ok(())
}

/// Elementwise-reduce `send_data` across all ranks into `recv_data` at
/// `root`, folding children left-then-right into the caller's own value.
/// `recv_data` is left untouched on non-root ranks.
pub fn reduce(
    runtime: &Runtime,
    send_data: &[u8],
    recv_data: &mut [u8],
    op: MimpiOp,
    root: usize,
) -> MimpiResult {
    let pos = tree_pos(runtime.rank(), root, runtime.world_size());
    let mut acc = send_data.to_vec();
    let mut child_buf = vec![0u8; send_data.len()];

    if let Some(left) = pos.left {
        runtime.recv(&mut child_buf, left as i64, REDUCE_TAG)?;
        fold(&mut acc, &child_buf, op);
    }
    if let Some(right) = pos.right {
        runtime.recv(&mut child_buf, right as i64, REDUCE_TAG)?;
        fold(&mut acc, &child_buf, op);
    }

    if let Some(parent) = pos.parent {
        let _ = runtime.send(&acc, parent as i64, REDUCE_TAG);
        runtime.recv(&mut [], parent as i64, REDUCE_TAG)?;
    } else {
        recv_data.copy_from_slice(&acc);
    }

    if let Some(left) = pos.left {
        let _ = runtime.send(&[], left as i64, REDUCE_TAG);
    }
    if let Some(right) = pos.right {
        let _ = runtime.send(&[], right as i64, REDUCE_TAG);
    }

    Ok(())
}

fn fold(dest: &mut [u8], src: &[u8], op: MimpiOp) {
    for (d, s) in dest.iter_mut().zip(src.iter()) {
        *d = op.apply(*d as i8, *s as i8) as u8;
    }
}
