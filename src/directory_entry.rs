use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::errors::Result;
use crate::mime_type::{MIME_DELETED, MIME_REDIRECT, MIME_REDLINK};
use crate::namespace::Namespace;
use crate::reader;

/// Longest url or title the parser keeps.
pub const MAX_NAME_LEN: usize = 1000;

/// Where a directory entry's content lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Redirect specified as a URL-pointer-table index
    Redirect(u32),
    /// Cluster index and blob index
    Cluster(u32, u32),
}

/// Holds metadata about an article
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Mime-code as stored on disk; an index into the MIME table unless it
    /// is one of the sentinel values.
    pub mime_id: u16,
    /// defines to which namespace this directory entry belongs
    pub namespace: Namespace,
    /// identifies a revision of the contents of this directory entry
    pub revision: u32,
    /// the URL as refered in the URL pointer list
    pub url: String,
    /// title as refered in the Title pointer list or empty; in case it is
    /// empty, the URL is used as title
    pub title: String,
    /// `None` for the redlink/deleted sentinels.
    pub target: Option<Target>,
}

impl DirectoryEntry {
    /// Parses one directory record. The reader must be positioned at the
    /// record start; on return it is positioned just past the record.
    pub fn parse<R: Read>(r: &mut R) -> Result<DirectoryEntry> {
        let mime_id = r.read_u16::<LittleEndian>()?;

        // the parameter payload is unused and in practice always empty
        let parameter_len = r.read_u8()?;
        let mut parameter = vec![0u8; usize::from(parameter_len)];
        r.read_exact(&mut parameter)?;

        let namespace = Namespace::from(r.read_u8()?);
        let revision = r.read_u32::<LittleEndian>()?;

        let target = if mime_id == MIME_REDIRECT {
            Some(Target::Redirect(r.read_u32::<LittleEndian>()?))
        } else {
            let cluster_number = r.read_u32::<LittleEndian>()?;
            let blob_number = r.read_u32::<LittleEndian>()?;
            match mime_id {
                MIME_REDLINK | MIME_DELETED => None,
                _ => Some(Target::Cluster(cluster_number, blob_number)),
            }
        };

        let url = reader::read_cstring(r, MAX_NAME_LEN, "entry url")?;
        let title = reader::read_cstring(r, MAX_NAME_LEN, "entry title")?;

        Ok(DirectoryEntry {
            mime_id,
            namespace,
            revision,
            url,
            title,
            target,
        })
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.target, Some(Target::Redirect(_)))
    }
}
