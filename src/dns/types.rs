/// DNS record types the tracker acts on (RFC 1035, RFC 2782, RFC 6891).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// A record: IPv4 address
    A,
    /// CNAME record: canonical name for an alias
    Cname,
    /// SRV record: service location - RFC 2782
    Srv,
    /// OPT pseudo-record: EDNS - RFC 6891
    Opt,
    /// Anything else; skipped by declared data length
    Other(u16),
}

impl RecordType {
    /// Convert wire format u16 to `RecordType`
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::A,
            5 => Self::Cname,
            33 => Self::Srv,
            41 => Self::Opt,
            n => Self::Other(n),
        }
    }
}

/// Query types worth tracking in outbound questions.
pub const QTYPE_A: u16 = 1;
pub const QTYPE_SRV: u16 = 33;

/// The Internet class; the only record class the tracker accepts.
pub const CLASS_IN: u16 = 1;
