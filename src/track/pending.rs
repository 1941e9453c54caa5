use crate::track::key::{query_bucket, BUCKETS};

/// Pending queries older than this many capture-clock seconds are dropped.
pub const QUERY_EXPIRY_SECS: u32 = 10;

/// One outstanding DNS query awaiting its response.
#[derive(Debug, Clone)]
pub struct PendingQuery {
    pub qid: u16,
    pub src: u32,
    pub dst: u32,
    pub sport: u16,
    /// Capture timestamp (seconds) when the query was seen.
    pub ctime: u32,
    pub name: String,
}

/// In-flight DNS queries, bucketed on (source address, query id).
///
/// The bucket key intentionally under-specifies the match: a response is
/// only correlated after an exact comparison of id, reversed address pair,
/// reversed port and query name within the bucket chain.
pub struct PendingQueryTable {
    buckets: Vec<Vec<PendingQuery>>,
    len: usize,
}

impl PendingQueryTable {
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); BUCKETS],
            len: 0,
        }
    }

    pub fn insert(&mut self, query: PendingQuery) {
        let bucket = query_bucket(query.src, query.qid);
        self.buckets[bucket].insert(0, query);
        self.len += 1;
    }

    /// Find and consume the pending query matching a response observed as
    /// (resp_src -> resp_dst, destination port resp_dport). The response
    /// travels in the reverse direction of the query it answers.
    pub fn take_match(
        &mut self,
        resp_src: u32,
        resp_dst: u32,
        resp_dport: u16,
        qid: u16,
        name: &str,
    ) -> Option<PendingQuery> {
        let bucket = &mut self.buckets[query_bucket(resp_dst, qid)];
        let i = bucket.iter().position(|q| {
            q.qid == qid
                && q.dst == resp_src
                && q.src == resp_dst
                && q.sport == resp_dport
                && q.name == name
        })?;
        self.len -= 1;
        Some(bucket.remove(i))
    }

    /// Drop every entry aged `QUERY_EXPIRY_SECS` or more. Returns the number
    /// of entries removed.
    pub fn expire(&mut self, now: u32) -> usize {
        let mut removed = 0;
        for bucket in &mut self.buckets {
            bucket.retain(|q| {
                if now.wrapping_sub(q.ctime) >= QUERY_EXPIRY_SECS {
                    removed += 1;
                    false
                } else {
                    true
                }
            });
        }
        self.len -= removed;
        removed
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
