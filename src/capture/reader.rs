use std::io::Read;

use anyhow::{bail, Context, Result};

const SNOOP_MAGIC: &[u8; 8] = b"snoop\0\0\0";
const SNOOP_VERSION: u32 = 2;
const DATALINK_ETHERNET: u32 = 4;
const FILE_HEADER_LEN: usize = 16;
const RECORD_HEADER_LEN: usize = 24;

/// One capture record, borrowed from the reader's working buffer.
#[derive(Debug)]
pub struct Record<'a> {
    /// Capture timestamp, seconds.
    pub sec: u32,
    /// Captured frame bytes, bounded by the record's snap length.
    pub data: &'a [u8],
}

/// Reads snoop capture files (RFC 1761): a fixed file header followed by
/// length-prefixed records. Framing problems are fatal; there is no
/// resynchronization.
pub struct SnoopReader<R> {
    input: R,
    /// Working buffer; doubles when a record outgrows it, never shrinks.
    buf: Vec<u8>,
}

fn be32(bytes: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

impl<R: Read> SnoopReader<R> {
    pub fn new(mut input: R) -> Result<Self> {
        let mut header = [0u8; FILE_HEADER_LEN];
        input
            .read_exact(&mut header)
            .context("failed to read snoop file header")?;
        if &header[..8] != SNOOP_MAGIC {
            bail!("input is not a snoop capture");
        }
        let version = be32(&header, 8);
        if version != SNOOP_VERSION {
            bail!("unsupported snoop version {version}");
        }
        let datalink = be32(&header, 12);
        if datalink != DATALINK_ETHERNET {
            bail!("only ethernet snoop captures are supported (datalink {datalink})");
        }
        Ok(Self {
            input,
            buf: vec![0; 512],
        })
    }

    /// Read the next record. `Ok(None)` at a clean end of input; a record
    /// cut off mid-way is an error.
    pub fn next_record(&mut self) -> Result<Option<Record<'_>>> {
        let header = match self.read_record_header()? {
            Some(header) => header,
            None => return Ok(None),
        };
        let _orig_len = be32(&header, 0);
        let snap_len = be32(&header, 4) as usize;
        let record_len = be32(&header, 8) as usize;
        let _drops = be32(&header, 12);
        let sec = be32(&header, 16);
        let _usec = be32(&header, 20);

        if record_len < RECORD_HEADER_LEN {
            bail!("capture record length {record_len} shorter than its own header");
        }
        let body_len = record_len - RECORD_HEADER_LEN;
        while body_len > self.buf.len() {
            let doubled = self.buf.len() * 2;
            self.buf.resize(doubled, 0);
        }
        self.input
            .read_exact(&mut self.buf[..body_len])
            .context("failed to read capture record body")?;

        // The body is padded to the record length; only snap bytes are
        // meaningful.
        let data_len = snap_len.min(body_len);
        Ok(Some(Record {
            sec,
            data: &self.buf[..data_len],
        }))
    }

    fn read_record_header(&mut self) -> Result<Option<[u8; RECORD_HEADER_LEN]>> {
        let mut header = [0u8; RECORD_HEADER_LEN];
        let mut filled = 0;
        while filled < RECORD_HEADER_LEN {
            let n = self
                .input
                .read(&mut header[filled..])
                .context("failed to read capture record header")?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                bail!("truncated capture record header");
            }
            filled += n;
        }
        Ok(Some(header))
    }
}
