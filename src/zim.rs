use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;

use crate::cluster::Cluster;
use crate::directory_entry::{DirectoryEntry, Target, MAX_NAME_LEN};
use crate::directory_iterator::DirectoryIterator;
use crate::errors::{Error, Result};
use crate::mime_type::{MimeType, MIME_DELETED, MIME_REDIRECT, MIME_REDLINK};
use crate::reader;

/// Magic number to recognise the file format, must be 72173914
pub const ZIM_MAGIC_NUMBER: u32 = 72_173_914;

/// Redirect chains longer than this fail with `Error::RedirectLoop`.
pub const MAX_REDIRECT_DEPTH: usize = 16;

/// Longest mime string kept when parsing the MIME list.
const MAX_MIME_LEN: usize = 100;
/// Soft cap on the number of MIME list entries.
const MAX_MIME_TYPES: usize = 10_000;

/// Upper bound on one directory record on disk: the fixed prefix, a full
/// parameter payload and both names at their caps.
const MAX_ENTRY_SIZE: usize = 16 + 255 + 2 * (MAX_NAME_LEN + 1);

/// Represents an open ZIM archive.
///
/// The handle owns the parsed header, the MIME table and the path. Every
/// operation reopens the file for its own seeks, so handles are cheap to
/// share and operations stay independent.
pub struct Zim {
    path: PathBuf,
    pub header: ZimHeader,
    /// List of mimetypes used in this ZIM archive, in mime-code order.
    pub mime_table: Vec<String>,
}

/// A ZIM file starts with a fixed 80-byte header.
#[derive(Debug, Clone)]
pub struct ZimHeader {
    pub major_version: u16,
    pub minor_version: u16,
    /// unique id of this zim file, opaque
    pub uuid: u128,
    /// total number of articles
    pub article_count: u32,
    /// total number of clusters
    pub cluster_count: u32,
    /// position of the directory pointerlist ordered by URL
    pub url_ptr_pos: u64,
    /// position of the directory pointerlist ordered by Title; recorded but
    /// never decoded
    pub title_ptr_pos: u64,
    /// position of the cluster pointer list
    pub cluster_ptr_pos: u64,
    /// position of the MIME type list
    pub mime_list_pos: u64,
    /// main page, if any
    pub main_page: Option<u32>,
    /// layout page, if any
    pub layout_page: Option<u32>,
    /// pointer to the md5checksum of this file; also delimits the last
    /// cluster
    pub checksum_pos: u64,
    /// offset of URL-table entry 0, kept as diagnostic state
    pub dir_entries_pos: u64,
}

impl ZimHeader {
    /// Checks that the pointer tables and the checksum tail fit inside the
    /// file, so later seeks cannot silently run off the end.
    fn validate(&self, file_len: u64) -> Result<()> {
        let url_table_end = self
            .url_ptr_pos
            .checked_add(u64::from(self.article_count) * 8);
        let cluster_table_end = self
            .cluster_ptr_pos
            .checked_add(u64::from(self.cluster_count) * 8);

        let ok = self.mime_list_pos < file_len
            && self.checksum_pos <= file_len
            && matches!(url_table_end, Some(end) if end <= file_len)
            && matches!(cluster_table_end, Some(end) if end <= file_len);
        if !ok {
            return Err(Error::CorruptStream(
                "header positions point outside the file".to_string(),
            ));
        }
        Ok(())
    }
}

impl Zim {
    /// Opens a ZIM archive.
    ///
    /// Parses the fixed header and the MIME table; directory entries and
    /// clusters are not touched until they are asked for.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Zim> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();

        let magic = file.read_u32::<LittleEndian>()?;
        if magic != ZIM_MAGIC_NUMBER {
            return Err(Error::BadMagic);
        }

        let major_version = file.read_u16::<LittleEndian>()?;
        let minor_version = file.read_u16::<LittleEndian>()?;
        let uuid = file.read_u128::<LittleEndian>()?;
        let article_count = file.read_u32::<LittleEndian>()?;
        let cluster_count = file.read_u32::<LittleEndian>()?;
        let url_ptr_pos = file.read_u64::<LittleEndian>()?;
        let title_ptr_pos = file.read_u64::<LittleEndian>()?;
        let cluster_ptr_pos = file.read_u64::<LittleEndian>()?;
        let mime_list_pos = file.read_u64::<LittleEndian>()?;
        let main_page = defined_index(file.read_u32::<LittleEndian>()?);
        let layout_page = defined_index(file.read_u32::<LittleEndian>()?);
        let checksum_pos = file.read_u64::<LittleEndian>()?;

        if major_version != 5 && major_version != 6 {
            warn!(
                "unexpected zim major version {}, trying to read it anyway",
                major_version
            );
        }

        let mut header = ZimHeader {
            major_version,
            minor_version,
            uuid,
            article_count,
            cluster_count,
            url_ptr_pos,
            title_ptr_pos,
            cluster_ptr_pos,
            mime_list_pos,
            main_page,
            layout_page,
            checksum_pos,
            dir_entries_pos: 0,
        };
        header.validate(file_len)?;

        if article_count > 0 {
            file.seek(SeekFrom::Start(url_ptr_pos))?;
            header.dir_entries_pos = file.read_u64::<LittleEndian>()?;
            if header.dir_entries_pos > file_len {
                return Err(Error::CorruptStream(
                    "first directory entry points outside the file".to_string(),
                ));
            }
        }

        let mime_table = parse_mime_table(&mut file, mime_list_pos)?;

        Ok(Zim {
            path,
            header,
            mime_table,
        })
    }

    fn open_file(&self) -> Result<File> {
        Ok(File::open(&self.path)?)
    }

    /// Indexes into the ZIM mime_table, mapping the sentinel codes to their
    /// special variants. An out-of-range code is reported as unknown.
    pub fn get_mimetype(&self, mime_id: u16) -> MimeType {
        match mime_id {
            MIME_REDIRECT => MimeType::Redirect,
            MIME_REDLINK => MimeType::Redlink,
            MIME_DELETED => MimeType::Deleted,
            id => match self.mime_table.get(usize::from(id)) {
                Some(mime) => MimeType::Type(mime.clone()),
                None => {
                    warn!("unknown mimetype idx {}", id);
                    MimeType::Unknown
                }
            },
        }
    }

    /// Iterates over articles, sorted by URL.
    pub fn iterate_by_urls(&self) -> Result<DirectoryIterator<'_>> {
        Ok(DirectoryIterator::new(self, self.open_file()?))
    }

    /// Returns the `DirectoryEntry` found at the given URL index.
    pub fn entry_at(&self, index: u32) -> Result<DirectoryEntry> {
        let mut file = self.open_file()?;
        self.entry_at_with(&mut file, index)
    }

    pub(crate) fn entry_at_with(&self, file: &mut File, index: u32) -> Result<DirectoryEntry> {
        if index >= self.header.article_count {
            return Err(Error::NotFound);
        }

        file.seek(SeekFrom::Start(
            self.header.url_ptr_pos + u64::from(index) * 8,
        ))?;
        let entry_pos = file.read_u64::<LittleEndian>()?;
        file.seek(SeekFrom::Start(entry_pos))?;

        // one bounded read covers the longest possible record; the parse
        // stops wherever the title terminator is
        let mut buf = Vec::with_capacity(MAX_ENTRY_SIZE);
        file.by_ref().take(MAX_ENTRY_SIZE as u64).read_to_end(&mut buf)?;
        DirectoryEntry::parse(&mut Cursor::new(&buf))
    }

    /// Looks up an entry by URL with a binary search over the URL pointer
    /// table.
    ///
    /// The comparison matches the first `url.len()` bytes, so the returned
    /// entry's URL is only guaranteed to start with `url`; callers wanting
    /// strict equality should compare the full strings afterwards.
    pub fn find_by_url(&self, url: &str) -> Result<Option<DirectoryEntry>> {
        let mut file = self.open_file()?;
        let mut lo = 0u32;
        let mut hi = self.header.article_count;

        while lo < hi {
            let cut = lo + (hi - lo) / 2;
            let entry = self.entry_at_with(&mut file, cut)?;
            match prefix_compare(url.as_bytes(), entry.url.as_bytes()) {
                Ordering::Equal => return Ok(Some(entry)),
                Ordering::Less => hi = cut,
                Ordering::Greater => lo = cut + 1,
            }
        }
        Ok(None)
    }

    /// Materializes the content behind an entry, following redirects up to
    /// `MAX_REDIRECT_DEPTH` hops. Redlink and deleted entries are reported
    /// as not found.
    pub fn read_content(&self, entry: &DirectoryEntry) -> Result<Vec<u8>> {
        let mut file = self.open_file()?;
        let mut current = entry.clone();
        let mut depth = 0;

        loop {
            match current.target {
                Some(Target::Cluster(cluster_number, blob_number)) => {
                    let cluster = Cluster::locate(&mut file, &self.header, cluster_number)?;
                    return cluster.read_blob(&mut file, blob_number);
                }
                Some(Target::Redirect(index)) => {
                    depth += 1;
                    if depth > MAX_REDIRECT_DEPTH {
                        return Err(Error::RedirectLoop);
                    }
                    current = self.entry_at_with(&mut file, index)?;
                }
                None => return Err(Error::NotFound),
            }
        }
    }

    /// Reads blob `blob_number` out of cluster `cluster_number` directly,
    /// without going through a directory entry.
    pub fn read_blob(&self, cluster_number: u32, blob_number: u32) -> Result<Vec<u8>> {
        let mut file = self.open_file()?;
        let cluster = Cluster::locate(&mut file, &self.header, cluster_number)?;
        cluster.read_blob(&mut file, blob_number)
    }
}

/// Reads NUL-terminated mime strings until the terminating empty string.
fn parse_mime_table(file: &mut File, mime_list_pos: u64) -> Result<Vec<String>> {
    file.seek(SeekFrom::Start(mime_list_pos))?;
    let mut r = BufReader::new(file);

    let mut mime_table = Vec::new();
    loop {
        let mime = reader::read_cstring(&mut r, MAX_MIME_LEN, "mime type")?;
        if mime.is_empty() {
            break;
        }
        if mime_table.len() == MAX_MIME_TYPES {
            warn!(
                "mime list longer than {} entries, ignoring the rest",
                MAX_MIME_TYPES
            );
            break;
        }
        mime_table.push(mime);
    }
    Ok(mime_table)
}

/// Compares a query against an entry URL over the first `query.len()`
/// bytes. An entry URL shorter than the query compares less at its
/// terminator, matching `strncmp` against a NUL-terminated string.
fn prefix_compare(query: &[u8], entry_url: &[u8]) -> Ordering {
    if entry_url.len() >= query.len() {
        query.cmp(&entry_url[..query.len()])
    } else {
        match query[..entry_url.len()].cmp(entry_url) {
            Ordering::Equal => Ordering::Greater,
            other => other,
        }
    }
}

fn defined_index(val: u32) -> Option<u32> {
    if val == 0xffff_ffff {
        None
    } else {
        Some(val)
    }
}
