// SPDX-License-Identifier: MIT
//
// Demonstrates Barrier, Bcast, and Reduce across however many ranks the
// launcher started.
//
// Usage (via the launcher):
//   launcher <world_size> demo_collectives

use pipemesh::MimpiOp;

fn main() {
    env_logger::init();

    pipemesh::init(false).expect("mimpi init");

    let rank = pipemesh::world_rank();
    let world_size = pipemesh::world_size();

    pipemesh::barrier().expect("barrier");
    println!("rank {rank}: past barrier");

    let root = 0;
    let mut buf = if rank == root {
        b"broadcast payload".to_vec()
    } else {
        vec![0u8; "broadcast payload".len()]
    };
    pipemesh::bcast(&mut buf, root).expect("bcast");
    println!(
        "rank {rank}: bcast result {:?}",
        String::from_utf8_lossy(&buf)
    );

    let send_data = vec![(rank + 1) as u8; 4];
    let mut recv_data = vec![0u8; 4];
    pipemesh::reduce(&send_data, &mut recv_data, MimpiOp::Sum, root).expect("reduce");
    if rank == root {
        println!(
            "rank {rank}: sum over {world_size} ranks = {recv_data:?} (wraps as i8)"
        );
    }

    pipemesh::finalize().expect("finalize");
}
