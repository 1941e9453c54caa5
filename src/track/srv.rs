use log::warn;

use crate::track::key::{name_bucket, BUCKETS};
use crate::track::ports::PortSet;

/// A hostname advertised by a DNS SRV record, with every port seen for it
/// and the service name that advertised it.
#[derive(Debug, Clone)]
pub struct SrvTarget {
    pub target: String,
    pub name: String,
    pub ports: PortSet,
}

/// All SRV targets ever seen, bucketed on target hostname.
///
/// Entries never expire; a long trace accumulates them for its whole run.
pub struct SrvTargetTable {
    buckets: Vec<Vec<SrvTarget>>,
}

impl SrvTargetTable {
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); BUCKETS],
        }
    }

    /// Record one SRV sighting of `target` on `port`, advertised by service
    /// `name`. Port-set overflow drops the port with a diagnostic only.
    pub fn observe(&mut self, target: &str, port: u16, name: &str) {
        let bucket = &mut self.buckets[name_bucket(target)];
        if let Some(srv) = bucket.iter_mut().find(|s| s.target == target) {
            if srv.ports.find_or_insert(port).is_none() {
                warn!("too many ports seen for SRV target '{}'", srv.target);
            }
            return;
        }

        let mut ports = PortSet::new();
        ports.find_or_insert(port);
        bucket.insert(
            0,
            SrvTarget {
                target: target.to_string(),
                name: name.to_string(),
                ports,
            },
        );
    }

    pub fn find(&self, target: &str) -> Option<&SrvTarget> {
        self.buckets[name_bucket(target)]
            .iter()
            .find(|s| s.target == target)
    }
}
