use log::debug;

use crate::dns::{self, DnsTables, PacketMeta, DNS_PORT};
use crate::track::{
    BackendTable, PendingQueryTable, ReportRow, SrvTargetTable, TcpConnTracker, QUERY_EXPIRY_SECS,
};

const TCP_FIN: u8 = 0x01;
const TCP_SYN: u8 = 0x02;
const TCP_RST: u8 = 0x04;

/// The stateful correlation core. Owns every tracking table; fed one
/// decoded segment at a time by the capture layer, single-threaded.
pub struct Engine {
    pending: PendingQueryTable,
    srv_targets: SrvTargetTable,
    backends: BackendTable,
    connections: TcpConnTracker,
    name_filter: Option<String>,
    track_all: bool,
    last_sweep: u32,
}

impl Engine {
    pub fn new(name_filter: Option<String>, track_all: bool) -> Self {
        Self {
            pending: PendingQueryTable::new(),
            srv_targets: SrvTargetTable::new(),
            backends: BackendTable::new(),
            connections: TcpConnTracker::new(),
            name_filter,
            track_all,
            last_sweep: 0,
        }
    }

    /// Feed one UDP payload. Only port-53 traffic is DNS-decoded.
    pub fn on_udp_segment(
        &mut self,
        src: u32,
        dst: u32,
        sport: u16,
        dport: u16,
        payload: &[u8],
        now: u32,
    ) {
        if sport != DNS_PORT && dport != DNS_PORT {
            return;
        }
        let mut tables = DnsTables {
            pending: &mut self.pending,
            srv_targets: &mut self.srv_targets,
            backends: &mut self.backends,
        };
        let meta = PacketMeta {
            src,
            dst,
            sport,
            dport,
            time: now,
        };
        dns::process_message(&mut tables, &meta, self.name_filter.as_deref(), payload);
    }

    /// Feed one TCP segment's addressing and flags byte.
    ///
    /// Default mode credits a connection attempt only for a pure SYN, in
    /// the observed direction. Track-all mode treats any segment of an
    /// untracked flow as a new connection; since a mid-stream segment does
    /// not reveal which side is the client, the attempt is credited in
    /// both directions and deduplicated until a FIN or RST closes the flow.
    pub fn on_tcp_segment(&mut self, src: u32, dst: u32, sport: u16, dport: u16, flags: u8) {
        if self.track_all {
            if flags & (TCP_FIN | TCP_RST) != 0 {
                self.connections.remove(src, dst, sport, dport);
                return;
            }
            if self.connections.contains(src, dst, sport, dport) {
                return;
            }
            self.connections.insert(src, dst, sport, dport);
            self.backends.record_connection(src, dst, dport);
            self.backends.record_connection(dst, src, sport);
        } else if flags == TCP_SYN {
            self.backends.record_connection(src, dst, dport);
        }
    }

    /// Advance the capture clock; sweeps expired pending queries at most
    /// once per expiry window.
    pub fn tick(&mut self, now: u32) {
        if now.wrapping_sub(self.last_sweep) > QUERY_EXPIRY_SECS {
            let removed = self.pending.expire(now);
            if removed > 0 {
                debug!("expired {removed} pending dns queries");
            }
            self.last_sweep = now;
        }
    }

    /// Drain the accumulated state into report rows.
    pub fn finalize(&self) -> Vec<ReportRow> {
        self.backends.report()
    }
}
