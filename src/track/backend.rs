use std::net::Ipv4Addr;

use log::warn;

use crate::track::key::{pair_bucket, BUCKETS};
use crate::track::ports::{PortSet, PORT_SET_CAPACITY};
use crate::track::srv::SrvTarget;

/// A resolved backend address, tracked per resolving client.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Client that performed the resolution.
    pub src: u32,
    /// Resolved backend address.
    pub dst: u32,
    /// Service name the backend was resolved for.
    pub name: String,
    /// Resolutions seen before any port was known for this backend.
    rcount: u64,
    ports: PortSet,
    /// Connection attempts per port slot.
    conn_counts: [u64; PORT_SET_CAPACITY],
    /// SRV-derived resolutions per port slot.
    res_counts: [u64; PORT_SET_CAPACITY],
}

/// One line of the final traffic report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub client: Ipv4Addr,
    pub backend: Ipv4Addr,
    /// `None` when no port was ever associated with the backend.
    pub port: Option<u16>,
    pub connections: u64,
    pub resolutions: u64,
    pub service: String,
}

/// Backends observed in DNS answers, bucketed on (client, backend) address
/// pair. Entries live until the end of the run.
pub struct BackendTable {
    buckets: Vec<Vec<Backend>>,
}

impl BackendTable {
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); BUCKETS],
        }
    }

    fn find_mut(&mut self, src: u32, dst: u32) -> Option<&mut Backend> {
        self.buckets[pair_bucket(src, dst)]
            .iter_mut()
            .find(|b| b.src == src && b.dst == dst)
    }

    /// Record one DNS resolution of `dst` for client `src`.
    ///
    /// With an SRV context the target's port set is merged in and each
    /// merged port's resolution counter bumped; without one only the scalar
    /// resolution count moves. Port-set overflow drops the remaining ports
    /// for this event with a diagnostic.
    pub fn record_resolution(&mut self, src: u32, dst: u32, name: &str, srv: Option<&SrvTarget>) {
        if let Some(backend) = self.find_mut(src, dst) {
            let Some(srv) = srv else {
                backend.rcount += 1;
                return;
            };
            for (_, port) in srv.ports.iter() {
                match backend.ports.find_or_insert(port) {
                    Some(slot) => backend.res_counts[slot] += 1,
                    None => {
                        warn!("backend for '{name}' is out of port slots");
                        return;
                    }
                }
            }
            return;
        }

        let mut backend = Backend {
            src,
            dst,
            name: srv.map_or_else(|| name.to_string(), |s| s.name.clone()),
            rcount: if srv.is_some() { 0 } else { 1 },
            ports: PortSet::new(),
            conn_counts: [0; PORT_SET_CAPACITY],
            res_counts: [0; PORT_SET_CAPACITY],
        };
        if let Some(srv) = srv {
            for (_, port) in srv.ports.iter() {
                if let Some(slot) = backend.ports.find_or_insert(port) {
                    backend.res_counts[slot] = 1;
                }
            }
        }
        self.buckets[pair_bucket(src, dst)].insert(0, backend);
    }

    /// Credit one connection attempt from `src` to `dst:dport`. Attempts
    /// toward pairs never seen in DNS are ignored.
    pub fn record_connection(&mut self, src: u32, dst: u32, dport: u16) {
        let Some(backend) = self.find_mut(src, dst) else {
            return;
        };
        match backend.ports.find_or_insert(dport) {
            Some(slot) => backend.conn_counts[slot] += 1,
            None => warn!("backend for '{}' is out of port slots", backend.name),
        }
    }

    /// Flatten the table into report rows, one per known (backend, port),
    /// plus a port-unknown row for backends without any port.
    pub fn report(&self) -> Vec<ReportRow> {
        let mut rows = Vec::new();
        for bucket in &self.buckets {
            for backend in bucket {
                let client = Ipv4Addr::from(backend.src);
                let addr = Ipv4Addr::from(backend.dst);
                for (slot, port) in backend.ports.iter() {
                    // Ports added only by connection crediting carry no
                    // per-port resolution count; fall back to the scalar.
                    let resolutions = if backend.res_counts[slot] == 0 {
                        backend.rcount
                    } else {
                        backend.res_counts[slot]
                    };
                    rows.push(ReportRow {
                        client,
                        backend: addr,
                        port: Some(port),
                        connections: backend.conn_counts[slot],
                        resolutions,
                        service: backend.name.clone(),
                    });
                }
                if backend.ports.is_empty() {
                    rows.push(ReportRow {
                        client,
                        backend: addr,
                        port: None,
                        connections: 0,
                        resolutions: backend.rcount,
                        service: backend.name.clone(),
                    });
                }
            }
        }
        rows
    }
}
