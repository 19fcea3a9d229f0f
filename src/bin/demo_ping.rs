// SPDX-License-Identifier: MIT
//
// Minimal two-rank ping/pong over Send/Recv.
//
// Usage (via the launcher):
//   launcher 2 demo_ping

fn main() {
    env_logger::init();

    pipemesh::init(false).expect("mimpi init");

    let rank = pipemesh::world_rank();
    let world_size = pipemesh::world_size();
    if world_size != 2 {
        eprintln!("demo_ping requires exactly 2 ranks, got {world_size}");
        pipemesh::finalize().expect("finalize");
        std::process::exit(1);
    }

    let peer = 1 - rank;
    let tag = 42;

    if rank == 0 {
        let payload = b"ping".to_vec();
        println!("rank 0: sending {:?} to rank {peer}", String::from_utf8_lossy(&payload));
        pipemesh::send(&payload, peer as i64, tag).expect("send ping");

        let mut buf = vec![0u8; 4];
        pipemesh::recv(&mut buf, peer as i64, tag).expect("recv pong");
        println!("rank 0: received {:?} from rank {peer}", String::from_utf8_lossy(&buf));
    } else {
        let mut buf = vec![0u8; 4];
        pipemesh::recv(&mut buf, peer as i64, tag).expect("recv ping");
        println!("rank 1: received {:?} from rank {peer}", String::from_utf8_lossy(&buf));

        let payload = b"pong".to_vec();
        pipemesh::send(&payload, peer as i64, tag).expect("send pong");
        println!("rank 1: sent {:?} to rank {peer}", String::from_utf8_lossy(&payload));
    }

    pipemesh::finalize().expect("finalize");
}
