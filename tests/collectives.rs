// SPDX-License-Identifier: MIT
//
// End-to-end Barrier/Bcast/Reduce scenarios over an in-process mesh of
// pipes, one OS thread per rank.

use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use pipemesh::collectives::{barrier, bcast, reduce};
use pipemesh::{MimpiOp, Runtime};

fn make_pipe() -> (RawFd, RawFd) {
    let mut fds = [0i32; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    (fds[0], fds[1])
}

fn build_mesh(world_size: usize) -> Vec<Runtime> {
    let mut read_fds = vec![vec![-1 as RawFd; world_size]; world_size];
    let mut write_fds = vec![vec![-1 as RawFd; world_size]; world_size];

    for i in 0..world_size {
        for j in 0..world_size {
            if i == j {
                continue;
            }
            let (rd, wr) = make_pipe();
            read_fds[i][j] = rd;
            write_fds[j][i] = wr;
        }
    }

    (0..world_size)
        .map(|rank| Runtime::from_parts(world_size, rank, read_fds[rank].clone(), write_fds[rank].clone()))
        .collect()
}

#[test]
fn barrier_orders_happens_before_across_four_ranks() {
    const W: usize = 4;
    let runtimes = build_mesh(W);

    // Each rank records a timestamp just before and just after the barrier;
    // every "before" must precede every "after" if the barrier actually
    // held everyone back.
    let before = Arc::new(Mutex::new(vec![None; W]));
    let after = Arc::new(Mutex::new(vec![None; W]));

    let handles: Vec<_> = runtimes
        .into_iter()
        .enumerate()
        .map(|(rank, rt)| {
            let before = Arc::clone(&before);
            let after = Arc::clone(&after);
            thread::spawn(move || {
                if rank != 0 {
                    thread::sleep(Duration::from_millis(rank as u64 * 10));
                }
                before.lock().unwrap()[rank] = Some(Instant::now());
                barrier(&rt).expect("barrier");
                after.lock().unwrap()[rank] = Some(Instant::now());
                rt.finalize();
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let latest_before = before
        .lock()
        .unwrap()
        .iter()
        .map(|t| t.unwrap())
        .max()
        .unwrap();
    let earliest_after = after
        .lock()
        .unwrap()
        .iter()
        .map(|t| t.unwrap())
        .min()
        .unwrap();
    assert!(
        latest_before <= earliest_after,
        "a rank crossed the barrier before the slowest rank arrived"
    );
}

#[test]
fn bcast_from_non_zero_root_reaches_every_rank() {
    const W: usize = 3;
    const ROOT: usize = 2;
    let runtimes = build_mesh(W);

    let payload = b"hello mesh";
    let handles: Vec<_> = runtimes
        .into_iter()
        .map(|rt| {
            thread::spawn(move || {
                let mut buf = if rt.rank() == ROOT {
                    payload.to_vec()
                } else {
                    vec![0u8; payload.len()]
                };
                bcast(&rt, &mut buf, ROOT).expect("bcast");
                rt.finalize();
                buf
            })
        })
        .collect();

    for h in handles {
        let buf = h.join().unwrap();
        assert_eq!(&buf, payload);
    }
}

#[test]
fn reduce_sum_wraps_like_signed_8_bit_arithmetic() {
    const W: usize = 3;
    const ROOT: usize = 0;
    let runtimes = build_mesh(W);

    // Each rank contributes 100 at a single lane; three ranks sum to 300,
    // which wraps as i8.
    let handles: Vec<_> = runtimes
        .into_iter()
        .map(|rt| {
            thread::spawn(move || {
                let send_data = [100u8];
                let mut recv_data = [0u8];
                reduce(&rt, &send_data, &mut recv_data, MimpiOp::Sum, ROOT).expect("reduce");
                let result = if rt.rank() == ROOT {
                    Some(recv_data[0])
                } else {
                    None
                };
                rt.finalize();
                result
            })
        })
        .collect();

    let mut root_result = None;
    for h in handles {
        if let Some(v) = h.join().unwrap() {
            root_result = Some(v);
        }
    }

    let expected = (100i8.wrapping_add(100)).wrapping_add(100) as u8;
    assert_eq!(root_result, Some(expected));
}
