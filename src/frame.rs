// SPDX-License-Identifier: MIT
//
// Wire framing: a fixed-size first chunk carrying an 8-byte header plus a
// payload prefix, followed by fixed-size continuation chunks. Pure,
// allocation-light encode/decode helpers with no I/O, so they're testable
// without pipes or threads.

/// Chunk size on the wire. Compile-time constant; must match across peers.
pub const CHUNK_SIZE: usize = 512;
/// Bytes of header at the front of the first chunk: `count` + `tag`, both i32 LE.
pub const HEADER_SIZE: usize = 8;
/// Payload bytes carried inline in the first chunk.
pub const FIRST_CHUNK_PAYLOAD: usize = CHUNK_SIZE - HEADER_SIZE;

/// Reserved tag: "any tag" wildcard for `Recv` predicates. Must never appear on the wire.
pub const ANY_TAG: i32 = 0;
pub const BARRIER_TAG: i32 = -1;
pub const BCAST_TAG: i32 = -2;
pub const REDUCE_TAG: i32 = -3;

/// Decoded header of a first chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub count: i32,
    pub tag: i32,
}

/// Number of continuation chunks needed to carry `payload_len` bytes, after
/// `FIRST_CHUNK_PAYLOAD` bytes have already gone out in the first chunk.
pub fn continuation_count(payload_len: usize) -> usize {
    let remaining = payload_len.saturating_sub(FIRST_CHUNK_PAYLOAD);
    remaining.div_ceil(CHUNK_SIZE)
}

/// Build a first chunk for `payload` (count/tag header + up to
/// `FIRST_CHUNK_PAYLOAD` bytes of payload, zero-padded if `payload` is
/// shorter). Returns the number of payload bytes consumed from `payload`.
pub fn encode_first(tag: i32, payload: &[u8]) -> ([u8; CHUNK_SIZE], usize) {
    let mut chunk = [0u8; CHUNK_SIZE];
    let count = payload.len() as i32;
    chunk[0..4].copy_from_slice(&count.to_le_bytes());
    chunk[4..8].copy_from_slice(&tag.to_le_bytes());
    let take = payload.len().min(FIRST_CHUNK_PAYLOAD);
    chunk[HEADER_SIZE..HEADER_SIZE + take].copy_from_slice(&payload[..take]);
    (chunk, take)
}

/// Decode the header out of a freshly read first-chunk buffer.
pub fn decode_header(chunk: &[u8; CHUNK_SIZE]) -> Header {
    let count = i32::from_le_bytes(chunk[0..4].try_into().unwrap());
    let tag = i32::from_le_bytes(chunk[4..8].try_into().unwrap());
    Header { count, tag }
}

/// The payload prefix living inside an already-decoded first chunk.
pub fn first_chunk_payload(chunk: &[u8; CHUNK_SIZE], count: usize) -> &[u8] {
    let take = count.min(FIRST_CHUNK_PAYLOAD);
    &chunk[HEADER_SIZE..HEADER_SIZE + take]
}
