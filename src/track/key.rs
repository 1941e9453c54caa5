//! Bucket index computation shared by all tracking tables.
//!
//! The hash is FNV-1 (64-bit) over a byte serialization of the key, reduced
//! modulo the fixed bucket count. It only accelerates lookup; buckets are
//! always searched with an exact key comparison.

pub const BUCKETS: usize = 512;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv64(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in data {
        hash = hash.wrapping_mul(FNV_PRIME);
        hash ^= u64::from(byte);
    }
    hash
}

/// Bucket index for a hostname key.
pub fn name_bucket(name: &str) -> usize {
    (fnv64(name.as_bytes()) % BUCKETS as u64) as usize
}

/// Bucket index for a (query source address, DNS query id) key.
pub fn query_bucket(src: u32, qid: u16) -> usize {
    let mut data = [0u8; 6];
    data[..4].copy_from_slice(&src.to_be_bytes());
    data[4..].copy_from_slice(&qid.to_be_bytes());
    (fnv64(&data) % BUCKETS as u64) as usize
}

/// Bucket index for a (client address, backend address) key.
pub fn pair_bucket(src: u32, dst: u32) -> usize {
    let mut data = [0u8; 8];
    data[..4].copy_from_slice(&src.to_be_bytes());
    data[4..].copy_from_slice(&dst.to_be_bytes());
    (fnv64(&data) % BUCKETS as u64) as usize
}

/// Bucket index for a TCP 4-tuple in one directional orientation.
pub fn flow_bucket(src: u32, dst: u32, sport: u16, dport: u16) -> usize {
    let mut data = [0u8; 12];
    data[..4].copy_from_slice(&src.to_be_bytes());
    data[4..8].copy_from_slice(&dst.to_be_bytes());
    data[8..10].copy_from_slice(&sport.to_be_bytes());
    data[10..].copy_from_slice(&dport.to_be_bytes());
    (fnv64(&data) % BUCKETS as u64) as usize
}
