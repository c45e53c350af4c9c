//! Little-endian read primitives shared by the parsers.
//!
//! Fixed-width integers are decoded with `byteorder::ReadBytesExt` at the
//! call sites; this module carries the two readers the format needs on top
//! of that: bounded NUL-terminated strings and 4-or-8-byte blob offsets.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;

use crate::errors::Result;

/// Reads bytes up to and including a NUL terminator, keeping at most
/// `max_len` content bytes. An overlong string is cut at the cap with a
/// diagnostic, as if the terminator had been found there.
pub fn read_cstring<R: Read>(r: &mut R, max_len: usize, what: &str) -> Result<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        r.read_exact(&mut byte)?;
        if byte[0] == 0 {
            break;
        }
        buf.push(byte[0]);
        if buf.len() == max_len {
            warn!("{} exceeds {} bytes, truncating", what, max_len);
            break;
        }
    }
    Ok(String::from_utf8(buf)?)
}

/// Reads one blob offset of the width selected by the cluster info byte:
/// 8 bytes when the extended bit is set, 4 otherwise.
pub fn read_offset<R: Read>(r: &mut R, extended: bool) -> Result<u64> {
    if extended {
        Ok(r.read_u64::<LittleEndian>()?)
    } else {
        Ok(u64::from(r.read_u32::<LittleEndian>()?))
    }
}
