use log::{debug, warn};

use crate::dns::name::decode_name;
use crate::dns::types::{RecordType, CLASS_IN, QTYPE_A, QTYPE_SRV};
use crate::track::{BackendTable, PendingQuery, PendingQueryTable, SrvTarget, SrvTargetTable};

pub const DNS_PORT: u16 = 53;

const DNS_HEADER_LEN: usize = 12;
/// Anti-abuse bound; also weeds out misparsed non-DNS UDP traffic.
const MAX_ANSWER_COUNT: u16 = 1000;

/// Tables the decoder records findings into, injected per message.
pub struct DnsTables<'a> {
    pub pending: &'a mut PendingQueryTable,
    pub srv_targets: &'a mut SrvTargetTable,
    pub backends: &'a mut BackendTable,
}

/// Addressing and capture-clock context of the UDP segment being decoded.
#[derive(Debug, Clone, Copy)]
pub struct PacketMeta {
    pub src: u32,
    pub dst: u32,
    pub sport: u16,
    pub dport: u16,
    /// Capture timestamp, seconds.
    pub time: u32,
}

/// Which section of the message a resource record sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Answer,
    Authority,
    Additional,
}

fn read_u16(msg: &[u8], off: usize) -> Option<u16> {
    let bytes = msg.get(off..off + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u32(msg: &[u8], off: usize) -> Option<u32> {
    let bytes = msg.get(off..off + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode one DNS message and apply its effects to the tables.
///
/// Outbound queries (destination port 53) may start tracking a pending
/// query; inbound responses (source port 53) are correlated against the
/// pending table and mined for backend addresses and SRV targets. Anything
/// malformed is dropped without touching table state beyond what was
/// already consumed.
pub fn process_message(
    tables: &mut DnsTables<'_>,
    meta: &PacketMeta,
    name_filter: Option<&str>,
    payload: &[u8],
) {
    if payload.len() < DNS_HEADER_LEN {
        debug!("dns payload shorter than header, dropping");
        return;
    }

    let qid = read_u16(payload, 0).unwrap_or_default();
    // Flags at offset 2 are ignored; the port role decides the branch.
    let qdcount = read_u16(payload, 4).unwrap_or_default();
    let ancount = read_u16(payload, 6).unwrap_or_default();
    let nscount = read_u16(payload, 8).unwrap_or_default();
    let arcount = read_u16(payload, 10).unwrap_or_default();

    if qdcount > 1 || ancount > MAX_ANSWER_COUNT {
        warn!("implausible dns message: {qdcount} questions, {ancount} answers");
        return;
    }

    if meta.dport == DNS_PORT && qdcount == 1 {
        handle_query(tables, meta, name_filter, payload, qid);
    } else if meta.sport == DNS_PORT && ancount != 0 {
        handle_response(tables, meta, payload, qid, ancount, nscount, arcount);
    }
}

/// An outbound question that may be worth correlating later.
fn handle_query(
    tables: &mut DnsTables<'_>,
    meta: &PacketMeta,
    name_filter: Option<&str>,
    payload: &[u8],
    qid: u16,
) -> Option<()> {
    let mut off = DNS_HEADER_LEN;
    let (name, used) = match decode_name(payload, off) {
        Some(decoded) => decoded,
        None => {
            debug!("undecodable question name in query, dropping");
            return None;
        }
    };
    off += used;
    let qtype = read_u16(payload, off)?;
    let qclass = read_u16(payload, off + 2)?;

    if qclass != CLASS_IN || (qtype != QTYPE_A && qtype != QTYPE_SRV) {
        return None;
    }
    if let Some(filter) = name_filter {
        if !name.contains(filter) {
            return None;
        }
    }

    tables.pending.insert(PendingQuery {
        qid,
        src: meta.src,
        dst: meta.dst,
        sport: meta.sport,
        ctime: meta.time,
        name,
    });
    Some(())
}

/// An inbound answer; only interesting if it matches a tracked query.
fn handle_response(
    tables: &mut DnsTables<'_>,
    meta: &PacketMeta,
    payload: &[u8],
    qid: u16,
    ancount: u16,
    nscount: u16,
    arcount: u16,
) -> Option<()> {
    let mut off = DNS_HEADER_LEN;
    let (qname, used) = decode_name(payload, off)?;
    // Question qtype and qclass are not re-checked; the match against the
    // tracked query carries that decision.
    off += used + 4;

    // Unsolicited or already-expired answers fall out here.
    tables
        .pending
        .take_match(meta.src, meta.dst, meta.dport, qid, &qname)?;

    let mut srv_ctx: Option<SrvTarget> = tables.srv_targets.find(&qname).cloned();

    let mut section = Section::Answer;
    let mut remaining = [ancount, nscount, arcount];

    while off < payload.len() {
        // Advance the section cursor strictly by count exhaustion.
        while remaining[section as usize] == 0 {
            section = match section {
                Section::Answer => Section::Authority,
                Section::Authority => Section::Additional,
                Section::Additional => return Some(()),
            };
        }

        let (owner, used) = decode_name(payload, off)?;
        off += used;
        let rtype = RecordType::from_u16(read_u16(payload, off)?);
        let rclass = read_u16(payload, off + 2)?;
        // 4 bytes of TTL are unused.
        let rdlen = read_u16(payload, off + 8)? as usize;
        off += 10;
        payload.get(off..off + rdlen)?;

        if rtype == RecordType::Opt {
            // EDNS pseudo-record; its class field is a buffer size, not a
            // real class. Skip it wholesale.
        } else if rclass != CLASS_IN {
            debug!("non-internet record class {rclass}, abandoning message");
            return None;
        } else if section != Section::Authority {
            // Authority records get name/type/class extraction only.
            if section == Section::Additional {
                // Additional records stand on their own name.
                srv_ctx = tables.srv_targets.find(&owner).cloned();
            }
            match rtype {
                RecordType::Cname if ancount < 2 && srv_ctx.is_none() => {
                    // A bare redirect chain; nothing to learn from it.
                    return None;
                }
                RecordType::A if ancount > 1 || srv_ctx.is_some() => {
                    if rdlen < 4 {
                        return None;
                    }
                    let addr = read_u32(payload, off)?;
                    tables
                        .backends
                        .record_resolution(meta.dst, addr, &owner, srv_ctx.as_ref());
                }
                RecordType::Srv => {
                    // Priority and weight precede the port and target.
                    if rdlen < 7 {
                        return None;
                    }
                    let port = read_u16(payload, off + 4)?;
                    let (target, _) = decode_name(payload, off + 6)?;
                    tables.srv_targets.observe(&target, port, &owner);
                }
                _ => {}
            }
        }

        // The record is consumed only once its declared length is skipped.
        off += rdlen;
        remaining[section as usize] -= 1;
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> (PendingQueryTable, SrvTargetTable, BackendTable) {
        (
            PendingQueryTable::new(),
            SrvTargetTable::new(),
            BackendTable::new(),
        )
    }

    fn encode_name(name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        if !name.is_empty() {
            for label in name.split('.') {
                out.push(label.len() as u8);
                out.extend_from_slice(label.as_bytes());
            }
        }
        out.push(0);
        out
    }

    fn header(qid: u16, counts: [u16; 4]) -> Vec<u8> {
        let mut msg = Vec::new();
        msg.extend_from_slice(&qid.to_be_bytes());
        msg.extend_from_slice(&[0, 0]); // flags, ignored by the decoder
        for count in counts {
            msg.extend_from_slice(&count.to_be_bytes());
        }
        msg
    }

    fn question(name: &str, qtype: u16) -> Vec<u8> {
        let mut out = encode_name(name);
        out.extend_from_slice(&qtype.to_be_bytes());
        out.extend_from_slice(&CLASS_IN.to_be_bytes());
        out
    }

    fn record(owner: &str, rtype: u16, class: u16, rdata: &[u8]) -> Vec<u8> {
        let mut out = encode_name(owner);
        out.extend_from_slice(&rtype.to_be_bytes());
        out.extend_from_slice(&class.to_be_bytes());
        out.extend_from_slice(&[0, 0, 0, 60]); // ttl
        out.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        out.extend_from_slice(rdata);
        out
    }

    fn srv_rdata(port: u16, target: &str) -> Vec<u8> {
        let mut out = vec![0, 1, 0, 1]; // priority, weight
        out.extend_from_slice(&port.to_be_bytes());
        out.extend_from_slice(&encode_name(target));
        out
    }

    const CLIENT: u32 = 0x0a00_0001;
    const RESOLVER: u32 = 0x0a00_0035;

    fn query_meta(sport: u16) -> PacketMeta {
        PacketMeta {
            src: CLIENT,
            dst: RESOLVER,
            sport,
            dport: DNS_PORT,
            time: 0,
        }
    }

    fn response_meta(dport: u16) -> PacketMeta {
        PacketMeta {
            src: RESOLVER,
            dst: CLIENT,
            sport: DNS_PORT,
            dport,
            time: 1,
        }
    }

    fn run(
        tables: &mut (PendingQueryTable, SrvTargetTable, BackendTable),
        meta: &PacketMeta,
        filter: Option<&str>,
        payload: &[u8],
    ) {
        let mut view = DnsTables {
            pending: &mut tables.0,
            srv_targets: &mut tables.1,
            backends: &mut tables.2,
        };
        process_message(&mut view, meta, filter, payload);
    }

    #[test]
    fn an_outbound_a_query_is_tracked() {
        let mut t = tables();
        let mut msg = header(42, [1, 0, 0, 0]);
        msg.extend_from_slice(&question("app.internal", QTYPE_A));
        run(&mut t, &query_meta(5000), None, &msg);
        assert_eq!(t.0.len(), 1);
    }

    #[test]
    fn non_in_class_and_uninteresting_qtypes_are_not_tracked() {
        let mut t = tables();
        let mut msg = header(42, [1, 0, 0, 0]);
        msg.extend_from_slice(&encode_name("app.internal"));
        msg.extend_from_slice(&QTYPE_A.to_be_bytes());
        msg.extend_from_slice(&3u16.to_be_bytes()); // CHAOS class
        run(&mut t, &query_meta(5000), None, &msg);

        let mut msg = header(43, [1, 0, 0, 0]);
        msg.extend_from_slice(&question("app.internal", 16)); // TXT
        run(&mut t, &query_meta(5000), None, &msg);
        assert!(t.0.is_empty());
    }

    #[test]
    fn the_name_filter_is_a_case_sensitive_substring() {
        let mut t = tables();
        let mut msg = header(42, [1, 0, 0, 0]);
        msg.extend_from_slice(&question("app.internal", QTYPE_A));
        run(&mut t, &query_meta(5000), Some("App"), &msg);
        assert!(t.0.is_empty());
        run(&mut t, &query_meta(5000), Some("internal"), &msg);
        assert_eq!(t.0.len(), 1);
    }

    #[test]
    fn oversized_counts_are_rejected() {
        let mut t = tables();
        let mut msg = header(42, [2, 0, 0, 0]);
        msg.extend_from_slice(&question("app.internal", QTYPE_A));
        run(&mut t, &query_meta(5000), None, &msg);
        assert!(t.0.is_empty());

        let msg = header(42, [1, 1001, 0, 0]);
        run(&mut t, &response_meta(5000), None, &msg);
        assert!(t.2.report().is_empty());
    }

    fn track_query(t: &mut (PendingQueryTable, SrvTargetTable, BackendTable), qid: u16, name: &str, qtype: u16) {
        let mut msg = header(qid, [1, 0, 0, 0]);
        msg.extend_from_slice(&question(name, qtype));
        run(t, &query_meta(5000), None, &msg);
    }

    #[test]
    fn a_multi_answer_response_creates_backends() {
        let mut t = tables();
        track_query(&mut t, 42, "app.internal", QTYPE_A);

        let mut msg = header(42, [1, 2, 0, 0]);
        msg.extend_from_slice(&question("app.internal", QTYPE_A));
        msg.extend_from_slice(&record("app.internal", 1, CLASS_IN, &[10, 0, 0, 9]));
        msg.extend_from_slice(&record("app.internal", 1, CLASS_IN, &[10, 0, 0, 10]));
        run(&mut t, &response_meta(5000), None, &msg);

        assert!(t.0.is_empty());
        let rows = t.2.report();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.resolutions == 1 && r.service == "app.internal"));
    }

    #[test]
    fn a_single_answer_without_srv_context_is_ignored() {
        // One A answer and no SRV knowledge is not a load-balancing signal.
        let mut t = tables();
        track_query(&mut t, 42, "app.internal", QTYPE_A);

        let mut msg = header(42, [1, 1, 0, 0]);
        msg.extend_from_slice(&question("app.internal", QTYPE_A));
        msg.extend_from_slice(&record("app.internal", 1, CLASS_IN, &[10, 0, 0, 9]));
        run(&mut t, &response_meta(5000), None, &msg);

        assert!(t.0.is_empty());
        assert!(t.2.report().is_empty());
    }

    #[test]
    fn an_unsolicited_response_mutates_nothing() {
        let mut t = tables();
        let mut msg = header(42, [1, 2, 0, 0]);
        msg.extend_from_slice(&question("app.internal", QTYPE_A));
        msg.extend_from_slice(&record("app.internal", 1, CLASS_IN, &[10, 0, 0, 9]));
        msg.extend_from_slice(&record("app.internal", 1, CLASS_IN, &[10, 0, 0, 10]));
        run(&mut t, &response_meta(5000), None, &msg);
        assert!(t.2.report().is_empty());
    }

    #[test]
    fn srv_answers_populate_the_target_table() {
        let mut t = tables();
        track_query(&mut t, 7, "_db._tcp.internal", QTYPE_SRV);

        let mut msg = header(7, [1, 1, 0, 0]);
        msg.extend_from_slice(&question("_db._tcp.internal", QTYPE_SRV));
        msg.extend_from_slice(&record(
            "_db._tcp.internal",
            33,
            CLASS_IN,
            &srv_rdata(5432, "be1.internal"),
        ));
        run(&mut t, &response_meta(5000), None, &msg);

        let srv = t.1.find("be1.internal").unwrap();
        assert_eq!(srv.name, "_db._tcp.internal");
        assert_eq!(srv.ports.iter().map(|(_, p)| p).collect::<Vec<_>>(), [5432]);
    }

    #[test]
    fn a_record_with_known_srv_target_builds_a_backend_with_ports() {
        let mut t = tables();
        t.1.observe("be1.internal", 5432, "_db._tcp.internal");
        track_query(&mut t, 8, "be1.internal", QTYPE_A);

        let mut msg = header(8, [1, 1, 0, 0]);
        msg.extend_from_slice(&question("be1.internal", QTYPE_A));
        msg.extend_from_slice(&record("be1.internal", 1, CLASS_IN, &[10, 0, 0, 9]));
        run(&mut t, &response_meta(5000), None, &msg);

        let rows = t.2.report();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].port, Some(5432));
        assert_eq!(rows[0].resolutions, 1);
        assert_eq!(rows[0].service, "_db._tcp.internal");
    }

    #[test]
    fn additional_section_a_records_use_their_own_srv_context() {
        // SRV answer plus the target's address in the additional section,
        // all in one message.
        let mut t = tables();
        track_query(&mut t, 9, "_db._tcp.internal", QTYPE_SRV);

        let mut msg = header(9, [1, 1, 0, 1]);
        msg.extend_from_slice(&question("_db._tcp.internal", QTYPE_SRV));
        msg.extend_from_slice(&record(
            "_db._tcp.internal",
            33,
            CLASS_IN,
            &srv_rdata(5432, "be1.internal"),
        ));
        msg.extend_from_slice(&record("be1.internal", 1, CLASS_IN, &[10, 0, 0, 9]));
        run(&mut t, &response_meta(5000), None, &msg);

        let rows = t.2.report();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].backend.octets(), [10, 0, 0, 9]);
        assert_eq!(rows[0].port, Some(5432));
    }

    #[test]
    fn authority_records_are_extraction_only() {
        let mut t = tables();
        t.1.observe("ns.internal", 53, "internal");
        track_query(&mut t, 10, "app.internal", QTYPE_A);

        let mut msg = header(10, [1, 2, 1, 0]);
        msg.extend_from_slice(&question("app.internal", QTYPE_A));
        msg.extend_from_slice(&record("app.internal", 1, CLASS_IN, &[10, 0, 0, 9]));
        msg.extend_from_slice(&record("app.internal", 1, CLASS_IN, &[10, 0, 0, 10]));
        // An A record in authority for a known SRV target must not create
        // a backend.
        msg.extend_from_slice(&record("ns.internal", 1, CLASS_IN, &[10, 0, 0, 53]));
        run(&mut t, &response_meta(5000), None, &msg);

        let rows = t.2.report();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.backend.octets() != [10, 0, 0, 53]));
    }

    #[test]
    fn an_opt_record_is_skipped_without_class_inspection() {
        let mut t = tables();
        track_query(&mut t, 11, "app.internal", QTYPE_A);

        let mut msg = header(11, [1, 2, 0, 1]);
        msg.extend_from_slice(&question("app.internal", QTYPE_A));
        msg.extend_from_slice(&record("app.internal", 1, CLASS_IN, &[10, 0, 0, 9]));
        msg.extend_from_slice(&record("app.internal", 1, CLASS_IN, &[10, 0, 0, 10]));
        // OPT: class field carries a UDP buffer size, not a real class.
        msg.extend_from_slice(&record("", 41, 4096, &[]));
        run(&mut t, &response_meta(5000), None, &msg);
        assert_eq!(t.2.report().len(), 2);
    }

    #[test]
    fn a_non_internet_class_record_abandons_the_message() {
        let mut t = tables();
        track_query(&mut t, 12, "app.internal", QTYPE_A);

        let mut msg = header(12, [1, 2, 0, 0]);
        msg.extend_from_slice(&question("app.internal", QTYPE_A));
        msg.extend_from_slice(&record("app.internal", 1, 3, &[10, 0, 0, 9]));
        msg.extend_from_slice(&record("app.internal", 1, CLASS_IN, &[10, 0, 0, 10]));
        run(&mut t, &response_meta(5000), None, &msg);
        assert!(t.2.report().is_empty());
    }

    #[test]
    fn a_lone_cname_without_srv_context_abandons_the_message() {
        let mut t = tables();
        track_query(&mut t, 13, "app.internal", QTYPE_A);

        let mut msg = header(13, [1, 1, 0, 0]);
        msg.extend_from_slice(&question("app.internal", QTYPE_A));
        msg.extend_from_slice(&record(
            "app.internal",
            5,
            CLASS_IN,
            &encode_name("cdn.example"),
        ));
        run(&mut t, &response_meta(5000), None, &msg);
        assert!(t.2.report().is_empty());
        // The pending query was still consumed by the match.
        assert!(t.0.is_empty());
    }

    #[test]
    fn unknown_record_types_are_skipped_by_declared_length() {
        let mut t = tables();
        track_query(&mut t, 14, "app.internal", QTYPE_A);

        let mut msg = header(14, [1, 3, 0, 0]);
        msg.extend_from_slice(&question("app.internal", QTYPE_A));
        msg.extend_from_slice(&record("app.internal", 16, CLASS_IN, b"\x04text")); // TXT
        msg.extend_from_slice(&record("app.internal", 1, CLASS_IN, &[10, 0, 0, 9]));
        msg.extend_from_slice(&record("app.internal", 1, CLASS_IN, &[10, 0, 0, 10]));
        run(&mut t, &response_meta(5000), None, &msg);
        assert_eq!(t.2.report().len(), 2);
    }

    #[test]
    fn a_truncated_record_body_stops_processing_cleanly() {
        let mut t = tables();
        track_query(&mut t, 15, "app.internal", QTYPE_A);

        let mut msg = header(15, [1, 2, 0, 0]);
        msg.extend_from_slice(&question("app.internal", QTYPE_A));
        msg.extend_from_slice(&record("app.internal", 1, CLASS_IN, &[10, 0, 0, 9]));
        let mut second = record("app.internal", 1, CLASS_IN, &[10, 0, 0, 10]);
        second.truncate(second.len() - 2);
        msg.extend_from_slice(&second);
        run(&mut t, &response_meta(5000), None, &msg);

        // The first answer was already applied before the bad record.
        assert_eq!(t.2.report().len(), 1);
    }
}
