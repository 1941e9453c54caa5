use crate::track::key::{flow_bucket, BUCKETS};

/// One observed, not-yet-closed TCP flow, stored as first seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TcpConnection {
    src: u32,
    dst: u32,
    sport: u16,
    dport: u16,
}

/// Deduplicates TCP flows by 4-tuple, in either directional orientation.
/// Only used in "track all TCP" mode.
pub struct TcpConnTracker {
    buckets: Vec<Vec<TcpConnection>>,
}

impl TcpConnTracker {
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); BUCKETS],
        }
    }

    fn position(&self, conn: &TcpConnection) -> Option<(usize, usize)> {
        let bucket = flow_bucket(conn.src, conn.dst, conn.sport, conn.dport);
        self.buckets[bucket]
            .iter()
            .position(|c| c == conn)
            .map(|i| (bucket, i))
    }

    fn either_orientation(
        &self,
        src: u32,
        dst: u32,
        sport: u16,
        dport: u16,
    ) -> Option<(usize, usize)> {
        let forward = TcpConnection { src, dst, sport, dport };
        let reverse = TcpConnection {
            src: dst,
            dst: src,
            sport: dport,
            dport: sport,
        };
        self.position(&forward).or_else(|| self.position(&reverse))
    }

    pub fn contains(&self, src: u32, dst: u32, sport: u16, dport: u16) -> bool {
        self.either_orientation(src, dst, sport, dport).is_some()
    }

    /// Remember a flow in the orientation it was first observed.
    pub fn insert(&mut self, src: u32, dst: u32, sport: u16, dport: u16) {
        let bucket = flow_bucket(src, dst, sport, dport);
        self.buckets[bucket].insert(0, TcpConnection { src, dst, sport, dport });
    }

    /// Forget a flow matching either orientation. Returns whether one was
    /// tracked.
    pub fn remove(&mut self, src: u32, dst: u32, sport: u16, dport: u16) -> bool {
        match self.either_orientation(src, dst, sport, dport) {
            Some((bucket, i)) => {
                self.buckets[bucket].remove(i);
                true
            }
            None => false,
        }
    }
}
