// SPDX-License-Identifier: MIT
//
// The shared structure guarding per-source message queues, peer-finished
// flags, and the single-slot wait descriptor. Receiver threads only push;
// the application thread only pops. Exactly one application thread may be
// parked on the condvar at a time (serial application use, per the
// concurrency model).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::frame::ANY_TAG;

/// A completed inbound message, framed off one peer's pipe.
#[derive(Debug, Clone)]
pub struct Message {
    pub count: i32,
    pub tag: i32,
    pub payload: Vec<u8>,
}

impl Message {
    fn matches(&self, count: i32, tag: i32) -> bool {
        self.count == count && (self.tag == tag || tag == ANY_TAG)
    }
}

/// What the single parked application thread is waiting for.
///
/// A tagged enum per the design note in spec.md §9, replacing the original
/// sentinel-valued `wanted_source == -1` convention with a type that makes
/// "nobody is waiting" unrepresentable as a source index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitState {
    Idle,
    Waiting { source: usize, count: i32, tag: i32 },
}

struct Inner {
    queues: Vec<VecDeque<Message>>,
    receiver_finished: Vec<bool>,
    wanted: WaitState,
}

/// Outcome of `MatchTable::recv`: it only ever returns once a match has
/// landed or the source is known to be finished, blocking in between, so
/// there is no third "still pending" outcome to represent.
pub enum RecvPoll {
    Matched(Message),
    /// No match, and the source has finished — no further arrivals possible.
    RemoteFinished,
}

/// Shared rendezvous point between receiver threads and the application thread.
pub struct MatchTable {
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl MatchTable {
    pub fn new(world_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queues: (0..world_size).map(|_| VecDeque::new()).collect(),
                receiver_finished: vec![false; world_size],
                wanted: WaitState::Idle,
            }),
            cond: Condvar::new(),
        }
    }

    /// Receiver-side: append a framed message from `source` and wake the
    /// application thread if it is waiting on exactly this arrival.
    pub fn push(&self, source: usize, message: Message) {
        let mut inner = self.inner.lock().unwrap();
        let wakes = matches!(
            inner.wanted,
            WaitState::Waiting { source: s, count, tag } if s == source && message.matches(count, tag)
        );
        inner.queues[source].push_back(message);
        if wakes {
            inner.wanted = WaitState::Idle;
            self.cond.notify_all();
        }
    }

    /// Receiver-side: mark `source` as finished (its pipe reached EOF) and
    /// wake the application thread if it was waiting on this source at all.
    pub fn mark_finished(&self, source: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.receiver_finished[source] = true;
        if matches!(inner.wanted, WaitState::Waiting { source: s, .. } if s == source) {
            inner.wanted = WaitState::Idle;
            self.cond.notify_all();
        }
    }

    /// Application-side: block until a message matching `(source, count,
    /// tag)` arrives or `source` is observed to have finished.
    pub fn recv(&self, source: usize, count: i32, tag: i32) -> RecvPoll {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(pos) = inner.queues[source]
                .iter()
                .position(|m| m.matches(count, tag))
            {
                let message = inner.queues[source].remove(pos).unwrap();
                return RecvPoll::Matched(message);
            }
            if inner.receiver_finished[source] {
                return RecvPoll::RemoteFinished;
            }
            inner.wanted = WaitState::Waiting { source, count, tag };
            inner = self.cond.wait(inner).unwrap();
            // Spurious wakeups re-loop and re-check both the queue and the
            // finished flag; `wanted` may have been left `Waiting` by a
            // spurious wakeup and is simply overwritten on the next pass.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn immediate_match_is_consumed_without_blocking() {
        let table = MatchTable::new(2);
        table.push(
            1,
            Message {
                count: 3,
                tag: 7,
                payload: vec![1, 2, 3],
            },
        );
        match table.recv(1, 3, 7) {
            RecvPoll::Matched(m) => assert_eq!(m.payload, vec![1, 2, 3]),
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn tag_zero_matches_oldest_entry_with_equal_count() {
        let table = MatchTable::new(2);
        table.push(
            1,
            Message {
                count: 2,
                tag: 9,
                payload: vec![0xAA, 0xBB],
            },
        );
        match table.recv(1, 2, ANY_TAG) {
            RecvPoll::Matched(m) => assert_eq!(m.tag, 9),
            _ => panic!("expected wildcard match"),
        }
    }

    #[test]
    fn count_mismatch_never_matches_even_if_only_off_by_one() {
        let table = MatchTable::new(2);
        table.push(
            1,
            Message {
                count: 10,
                tag: 1,
                payload: vec![0u8; 10],
            },
        );
        table.mark_finished(1);
        match table.recv(1, 9, 1) {
            RecvPoll::RemoteFinished => {}
            _ => panic!("expected remote-finished: count mismatch leaves queue untouched"),
        }
    }

    #[test]
    fn finished_source_with_no_match_returns_remote_finished() {
        let table = MatchTable::new(2);
        table.mark_finished(1);
        match table.recv(1, 0, 1) {
            RecvPoll::RemoteFinished => {}
            _ => panic!("expected remote-finished"),
        }
    }

    #[test]
    fn blocked_recv_wakes_on_matching_arrival() {
        let table = Arc::new(MatchTable::new(2));
        let t2 = Arc::clone(&table);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            t2.push(
                1,
                Message {
                    count: 1,
                    tag: 4,
                    payload: vec![0x42],
                },
            );
        });
        match table.recv(1, 1, 4) {
            RecvPoll::Matched(m) => assert_eq!(m.payload, vec![0x42]),
            _ => panic!("expected match after wakeup"),
        }
        handle.join().unwrap();
    }

    #[test]
    fn blocked_recv_wakes_on_peer_finish() {
        let table = Arc::new(MatchTable::new(2));
        let t2 = Arc::clone(&table);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            t2.mark_finished(1);
        });
        match table.recv(1, 100, 1) {
            RecvPoll::RemoteFinished => {}
            _ => panic!("expected remote-finished after peer-finish wakeup"),
        }
        handle.join().unwrap();
    }
}
