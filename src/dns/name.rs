/// Maximum decoded name length; longer names are truncated, not rejected.
pub const MAX_NAME_LEN: usize = 255;

/// Upper bound on compression-pointer jumps per name.
const MAX_POINTER_JUMPS: usize = 16;

const PTR_MASK: u8 = 0xc0;

/// Decode a DNS name from `msg` starting at `start` (RFC 1035 section
/// 4.1.4).
///
/// Names are a sequence of length-prefixed labels joined with `.`. A length
/// byte with both top bits set is a compression pointer whose low 14 bits
/// are an absolute offset into `msg`; the pointer target must sit strictly
/// before the pointer itself, which makes every jump move backwards and
/// bounds the decode on hostile input. Any other top-bit pattern is
/// malformed.
///
/// Returns the decoded name and the number of bytes consumed at `start`,
/// or `None` on malformed input or running past the end of `msg`.
pub fn decode_name(msg: &[u8], start: usize) -> Option<(String, usize)> {
    let mut name = String::new();
    let mut pos = start;
    // Where reading resumes after the name; fixed by the first pointer.
    let mut end = None;
    let mut jumps = 0;

    loop {
        let len = *msg.get(pos)? as usize;
        if len == 0 {
            pos += 1;
            break;
        }
        match msg[pos] & PTR_MASK {
            0x00 => {
                let label = msg.get(pos + 1..pos + 1 + len)?;
                let sep = usize::from(!name.is_empty());
                if name.len() + sep + len > MAX_NAME_LEN {
                    // Output full: truncate, don't fail.
                    break;
                }
                if sep == 1 {
                    name.push('.');
                }
                name.push_str(&String::from_utf8_lossy(label));
                pos += 1 + len;
            }
            0xc0 => {
                let low = *msg.get(pos + 1)?;
                let target = ((len & 0x3f) << 8) | low as usize;
                if target >= pos {
                    // Forward or self pointer.
                    return None;
                }
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return None;
                }
                if end.is_none() {
                    end = Some(pos + 2);
                }
                pos = target;
            }
            _ => return None,
        }
    }

    Some((name, end.unwrap_or(pos) - start))
}
