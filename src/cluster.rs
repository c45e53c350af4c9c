//! Cluster access: locating a cluster's byte extent, decoding its info byte
//! and slicing blobs out of its (possibly compressed) content.
//!
//! A cluster's logical content is an offset table of `N + 1` entries
//! followed by `N` concatenated blob payloads; offsets are measured from the
//! first offset byte. The first offset divided by the offset width therefore
//! gives `N + 1`, which is how a reader discovers the blob count.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};

use bitreader::BitReader;
use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;
use xz2::read::XzDecoder;

use crate::errors::{Error, Result};
use crate::reader;
use crate::zim::ZimHeader;

/// Largest blob handed back to callers; longer blobs are truncated.
pub const MAX_BLOB_SIZE: u64 = 10_000_000;
/// Largest cluster the reader will buffer, compressed or decompressed.
pub const MAX_CLUSTER_SIZE: u64 = 64 * 1024 * 1024;
/// Granularity of the streaming XZ decode loop.
const DECODE_BUF_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Xz,
    Zstd,
}

impl Compression {
    pub fn from_code(raw: u8) -> Result<Compression> {
        match raw {
            1 => Ok(Compression::None),
            4 => Ok(Compression::Xz),
            5 => Ok(Compression::Zstd),
            _ => Err(Error::UnsupportedCompression(raw)),
        }
    }
}

/// A cluster of blobs, located but not yet decoded.
///
/// Within a ZIM archive, clusters contain several blobs of data that are all
/// compressed together. Each blob is the data for one article.
#[derive(Debug)]
pub struct Cluster {
    compression: Compression,
    extended: bool,
    /// File offset of the info byte.
    start: u64,
    /// Byte length of the content behind the info byte, as stored on disk.
    len: u64,
}

impl Cluster {
    /// Reads cluster `idx`'s extent from the cluster pointer table and its
    /// info byte from the cluster start. The last cluster ends at the
    /// checksum position; every other cluster ends where the next begins.
    pub fn locate(file: &mut File, header: &ZimHeader, idx: u32) -> Result<Cluster> {
        if idx >= header.cluster_count {
            return Err(Error::CorruptStream(format!(
                "cluster {} out of range, archive holds {} clusters",
                idx, header.cluster_count
            )));
        }

        file.seek(SeekFrom::Start(
            header.cluster_ptr_pos + u64::from(idx) * 8,
        ))?;
        let start = file.read_u64::<LittleEndian>()?;
        let end = if idx + 1 < header.cluster_count {
            file.read_u64::<LittleEndian>()?
        } else {
            header.checksum_pos
        };
        if end <= start {
            return Err(Error::CorruptStream(format!(
                "cluster {} ends at {} before it starts at {}",
                idx, end, start
            )));
        }

        file.seek(SeekFrom::Start(start))?;
        let info = file.read_u8()?;
        let (extended, compression) = parse_info_byte(info)?;

        Ok(Cluster {
            compression,
            extended,
            start,
            len: end - start - 1,
        })
    }

    fn offset_size(&self) -> u64 {
        if self.extended {
            8
        } else {
            4
        }
    }

    /// Materializes blob `blob_number`, decoding just enough of the cluster
    /// to find and extract it.
    pub fn read_blob(&self, file: &mut File, blob_number: u32) -> Result<Vec<u8>> {
        match self.compression {
            Compression::None => self.read_blob_plain(file, blob_number),
            Compression::Zstd => self.read_blob_zstd(file, blob_number),
            Compression::Xz => self.read_blob_xz(file, blob_number),
        }
    }

    /// Uncompressed cluster: the logical content is in place, three seeks
    /// reach the offsets and the payload.
    fn read_blob_plain(&self, file: &mut File, blob_number: u32) -> Result<Vec<u8>> {
        let base = self.start + 1;
        let width = self.offset_size();

        file.seek(SeekFrom::Start(base))?;
        let first = reader::read_offset(file, self.extended)?;
        self.check_blob_number(blob_number, first)?;

        file.seek(SeekFrom::Start(base + width * u64::from(blob_number)))?;
        let blob_start = reader::read_offset(file, self.extended)?;
        let blob_end = reader::read_offset(file, self.extended)?;
        let len = blob_len(blob_number, blob_start, blob_end)?;
        if blob_end > self.len {
            return Err(Error::CorruptStream(format!(
                "blob {} extends to {} past the cluster content end {}",
                blob_number, blob_end, self.len
            )));
        }

        file.seek(SeekFrom::Start(base + blob_start))?;
        let mut blob = vec![0u8; len as usize];
        file.read_exact(&mut blob)?;
        Ok(blob)
    }

    /// Zstd cluster: the whole content is buffered and decoded, then
    /// indexed like the uncompressed path but from offset 0.
    fn read_blob_zstd(&self, file: &mut File, blob_number: u32) -> Result<Vec<u8>> {
        if self.len > MAX_CLUSTER_SIZE {
            return Err(Error::LimitExceeded("compressed cluster too large"));
        }

        file.seek(SeekFrom::Start(self.start + 1))?;
        let mut compressed = vec![0u8; self.len as usize];
        file.read_exact(&mut compressed)?;

        let mut decoder = zstd::stream::read::Decoder::new(&compressed[..])
            .map_err(|e| Error::CorruptStream(e.to_string()))?;
        let mut data = Vec::new();
        decoder
            .by_ref()
            .take(MAX_CLUSTER_SIZE + 1)
            .read_to_end(&mut data)
            .map_err(|e| Error::CorruptStream(e.to_string()))?;
        if data.len() as u64 > MAX_CLUSTER_SIZE {
            return Err(Error::LimitExceeded("decompressed cluster too large"));
        }

        self.slice_decoded(&data, blob_number)
    }

    /// XZ cluster: the stream is decoded in passes with a bounded buffer,
    /// each pass skipping to a logical offset and capturing a fixed number
    /// of bytes. One pass learns the blob count from the first offset, one
    /// captures the two adjacent offsets delimiting the blob, and the last
    /// captures the payload itself.
    fn read_blob_xz(&self, file: &mut File, blob_number: u32) -> Result<Vec<u8>> {
        let base = self.start + 1;
        let width = self.offset_size();

        file.seek(SeekFrom::Start(base))?;
        let head = xz_slice(file.by_ref().take(self.len), 0, width)?;
        let first = reader::read_offset(&mut Cursor::new(&head), self.extended)?;
        self.check_blob_number(blob_number, first)?;

        file.seek(SeekFrom::Start(base))?;
        let pair = xz_slice(
            file.by_ref().take(self.len),
            width * u64::from(blob_number),
            width * 2,
        )?;
        let mut cur = Cursor::new(&pair);
        let blob_start = reader::read_offset(&mut cur, self.extended)?;
        let blob_end = reader::read_offset(&mut cur, self.extended)?;
        let len = blob_len(blob_number, blob_start, blob_end)?;

        file.seek(SeekFrom::Start(base))?;
        xz_slice(file.by_ref().take(self.len), blob_start, len)
    }

    /// Indexes a fully decoded cluster body.
    fn slice_decoded(&self, data: &[u8], blob_number: u32) -> Result<Vec<u8>> {
        let width = self.offset_size();
        let mut cur = Cursor::new(data);

        let first = reader::read_offset(&mut cur, self.extended)?;
        self.check_blob_number(blob_number, first)?;

        cur.set_position(width * u64::from(blob_number));
        let blob_start = reader::read_offset(&mut cur, self.extended)?;
        let blob_end = reader::read_offset(&mut cur, self.extended)?;
        let len = blob_len(blob_number, blob_start, blob_end)?;

        let start = blob_start as usize;
        let end = start + len as usize;
        if end > data.len() {
            return Err(Error::CorruptStream(format!(
                "blob {} extends to {} past the cluster content end {}",
                blob_number,
                end,
                data.len()
            )));
        }
        Ok(data[start..end].to_vec())
    }

    /// The first offset, divided by the offset width, is the offset count
    /// `N + 1`; valid blob numbers are `0..N`.
    fn check_blob_number(&self, blob_number: u32, first_offset: u64) -> Result<()> {
        let width = self.offset_size();
        if first_offset == 0 || first_offset % width != 0 {
            return Err(Error::CorruptStream(format!(
                "implausible first blob offset {}",
                first_offset
            )));
        }
        let blob_count = first_offset / width - 1;
        if u64::from(blob_number) >= blob_count {
            return Err(Error::CorruptStream(format!(
                "blob {} out of range, cluster holds {} blobs",
                blob_number, blob_count
            )));
        }
        Ok(())
    }
}

/// Checks the two offsets delimiting a blob and applies the size cap.
fn blob_len(blob_number: u32, blob_start: u64, blob_end: u64) -> Result<u64> {
    if blob_end < blob_start {
        return Err(Error::CorruptStream(format!(
            "blob {} ends at {} before it starts at {}",
            blob_number, blob_end, blob_start
        )));
    }
    let len = blob_end - blob_start;
    if len > MAX_BLOB_SIZE {
        warn!(
            "blob {} is {} bytes long, truncating to {}",
            blob_number, len, MAX_BLOB_SIZE
        );
        return Ok(MAX_BLOB_SIZE);
    }
    Ok(len)
}

/// Decodes the cluster info byte.
///
/// Four low bits:
///   - 1: no compression
///   - 4: XZ compressed
///   - 5: zstd compressed
/// Fifth bit:
///   - 0: normal (4-byte blob offsets)
///   - 1: extended (8-byte blob offsets)
fn parse_info_byte(info: u8) -> Result<(bool, Compression)> {
    let slice = &[info];
    let mut reader = BitReader::new(slice);
    // skip the three reserved bits
    reader.skip(3)?;

    Ok((reader.read_bool()?, Compression::from_code(reader.read_u8(4)?)?))
}

/// Streams an XZ payload and returns `len` decoded bytes starting at
/// logical offset `skip`, holding no more than `DECODE_BUF_SIZE` decoded
/// bytes at a time. End of stream before the requested range is complete is
/// a corruption error.
fn xz_slice<R: Read>(input: R, skip: u64, len: u64) -> Result<Vec<u8>> {
    let mut decoder = XzDecoder::new(input);
    let mut buf = [0u8; DECODE_BUF_SIZE];
    let mut to_skip = skip;
    let mut out = Vec::with_capacity(len as usize);

    while (out.len() as u64) < len {
        let n = decoder
            .read(&mut buf)
            .map_err(|e| Error::CorruptStream(e.to_string()))?;
        if n == 0 {
            return Err(Error::CorruptStream(format!(
                "stream ended {} bytes short of the requested range",
                len - out.len() as u64
            )));
        }

        let mut chunk = &buf[..n];
        if to_skip > 0 {
            if (chunk.len() as u64) <= to_skip {
                to_skip -= chunk.len() as u64;
                continue;
            }
            chunk = &chunk[to_skip as usize..];
            to_skip = 0;
        }

        let want = (len - out.len() as u64) as usize;
        out.extend_from_slice(&chunk[..want.min(chunk.len())]);
    }

    Ok(out)
}
