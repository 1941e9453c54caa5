//! Ethernet / 802.1Q / IPv4 demultiplexing.
//!
//! Isolates the UDP or TCP portion of a captured frame and normalizes
//! addresses and ports to host byte order for the engine. Anything that is
//! not plain IPv4 over Ethernet (with at most one VLAN tag) is dropped
//! silently, as are continuation fragments.

const ETHER_HEADER_LEN: usize = 14;
const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_VLAN: u16 = 0x8100;
const PROTO_TCP: u8 = 0x06;
const PROTO_UDP: u8 = 0x11;
const UDP_HEADER_LEN: usize = 8;

/// A transport segment cut out of one captured frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Segment<'a> {
    Udp {
        src: u32,
        dst: u32,
        sport: u16,
        dport: u16,
        payload: &'a [u8],
    },
    Tcp {
        src: u32,
        dst: u32,
        sport: u16,
        dport: u16,
        flags: u8,
    },
}

fn be16(bytes: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([bytes[off], bytes[off + 1]])
}

fn be32(bytes: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

pub fn decode_frame(data: &[u8]) -> Option<Segment<'_>> {
    if data.len() < ETHER_HEADER_LEN {
        return None;
    }
    let mut off = 12; // past the two MAC addresses
    let mut ethertype = be16(data, off);
    off += 2;
    if ethertype == ETHERTYPE_VLAN {
        if data.len() < off + 4 {
            return None;
        }
        off += 2; // VLAN tag itself is ignored
        ethertype = be16(data, off);
        off += 2;
    }
    if ethertype != ETHERTYPE_IPV4 {
        return None;
    }

    let ip = data.get(off..)?;
    if ip.len() < 20 || ip[0] >> 4 != 4 {
        return None;
    }
    let header_len = (ip[0] & 0x0f) as usize * 4;
    if header_len < 20 || ip.len() < header_len {
        return None;
    }
    // Continuation fragments carry no transport header.
    if be16(ip, 6) & 0x1fff != 0 {
        return None;
    }
    let proto = ip[9];
    let src = be32(ip, 12);
    let dst = be32(ip, 16);
    let transport = &ip[header_len..];

    match proto {
        PROTO_UDP => {
            if transport.len() < UDP_HEADER_LEN {
                return None;
            }
            Some(Segment::Udp {
                src,
                dst,
                sport: be16(transport, 0),
                dport: be16(transport, 2),
                payload: &transport[UDP_HEADER_LEN..],
            })
        }
        PROTO_TCP => {
            if transport.len() < 14 {
                return None;
            }
            Some(Segment::Tcp {
                src,
                dst,
                sport: be16(transport, 0),
                dport: be16(transport, 2),
                flags: transport[13],
            })
        }
        _ => None,
    }
}
