//! Assembles complete synthetic ZIM archives for the integration tests:
//! header, MIME list, pointer tables, directory entries, clusters (with
//! real XZ/zstd compression) and the MD5 tail.

use std::io::Write;

use tempfile::NamedTempFile;

pub const COMP_NONE: u8 = 1;
pub const COMP_XZ: u8 = 4;
pub const COMP_ZSTD: u8 = 5;

pub enum Entry {
    Content {
        mime: u16,
        namespace: u8,
        url: String,
        title: String,
        cluster: u32,
        blob: u32,
    },
    Redirect {
        namespace: u8,
        url: String,
        title: String,
        target: u32,
    },
    Sentinel {
        mime: u16,
        namespace: u8,
        url: String,
        title: String,
    },
}

pub struct ClusterDef {
    pub compression: u8,
    pub extended: bool,
    pub blobs: Vec<Vec<u8>>,
}

#[derive(Default)]
pub struct ArchiveBuilder {
    pub mimes: Vec<String>,
    /// Entries in URL-pointer-table order; callers keep them sorted by
    /// `(namespace, url)` the way a real archive would be.
    pub entries: Vec<Entry>,
    pub clusters: Vec<ClusterDef>,
}

impl ArchiveBuilder {
    pub fn new() -> ArchiveBuilder {
        ArchiveBuilder::default()
    }

    pub fn mime(mut self, mime: &str) -> Self {
        self.mimes.push(mime.to_string());
        self
    }

    pub fn content(mut self, mime: u16, url: &str, title: &str, cluster: u32, blob: u32) -> Self {
        self.entries.push(Entry::Content {
            mime,
            namespace: b'A',
            url: url.to_string(),
            title: title.to_string(),
            cluster,
            blob,
        });
        self
    }

    pub fn redirect(mut self, url: &str, title: &str, target: u32) -> Self {
        self.entries.push(Entry::Redirect {
            namespace: b'A',
            url: url.to_string(),
            title: title.to_string(),
            target,
        });
        self
    }

    pub fn sentinel(mut self, mime: u16, url: &str, title: &str) -> Self {
        self.entries.push(Entry::Sentinel {
            mime,
            namespace: b'A',
            url: url.to_string(),
            title: title.to_string(),
        });
        self
    }

    pub fn cluster(mut self, compression: u8, blobs: &[&[u8]]) -> Self {
        self.clusters.push(ClusterDef {
            compression,
            extended: false,
            blobs: blobs.iter().map(|b| b.to_vec()).collect(),
        });
        self
    }

    pub fn cluster_extended(mut self, compression: u8, blobs: &[&[u8]]) -> Self {
        self.clusters.push(ClusterDef {
            compression,
            extended: true,
            blobs: blobs.iter().map(|b| b.to_vec()).collect(),
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let entry_records: Vec<Vec<u8>> = self.entries.iter().map(serialize_entry).collect();
        let cluster_records: Vec<Vec<u8>> = self.clusters.iter().map(serialize_cluster).collect();

        let mime_section = {
            let mut out = Vec::new();
            for mime in &self.mimes {
                out.extend_from_slice(mime.as_bytes());
                out.push(0);
            }
            out.push(0); // terminating empty string
            out
        };

        let mime_pos = 80u64;
        let url_ptr_pos = mime_pos + mime_section.len() as u64;
        let title_ptr_pos = url_ptr_pos + self.entries.len() as u64 * 8;
        let entries_pos = title_ptr_pos + self.entries.len() as u64 * 4;

        let mut entry_offsets = Vec::new();
        let mut pos = entries_pos;
        for record in &entry_records {
            entry_offsets.push(pos);
            pos += record.len() as u64;
        }

        let cluster_ptr_pos = pos;
        let clusters_pos = cluster_ptr_pos + self.clusters.len() as u64 * 8;
        let mut cluster_offsets = Vec::new();
        let mut pos = clusters_pos;
        for record in &cluster_records {
            cluster_offsets.push(pos);
            pos += record.len() as u64;
        }
        let checksum_pos = pos;

        let mut out = Vec::new();
        out.extend_from_slice(&72_173_914u32.to_le_bytes());
        out.extend_from_slice(&5u16.to_le_bytes()); // major version
        out.extend_from_slice(&0u16.to_le_bytes()); // minor version
        out.extend_from_slice(&[0u8; 16]); // uuid
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.clusters.len() as u32).to_le_bytes());
        out.extend_from_slice(&url_ptr_pos.to_le_bytes());
        out.extend_from_slice(&title_ptr_pos.to_le_bytes());
        out.extend_from_slice(&cluster_ptr_pos.to_le_bytes());
        out.extend_from_slice(&mime_pos.to_le_bytes());
        out.extend_from_slice(&0xffff_ffffu32.to_le_bytes()); // main page
        out.extend_from_slice(&0xffff_ffffu32.to_le_bytes()); // layout page
        out.extend_from_slice(&checksum_pos.to_le_bytes());
        assert_eq!(out.len(), 80);

        out.extend_from_slice(&mime_section);
        for offset in &entry_offsets {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        for index in 0..self.entries.len() as u32 {
            out.extend_from_slice(&index.to_le_bytes());
        }
        for record in &entry_records {
            out.extend_from_slice(record);
        }
        for offset in &cluster_offsets {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        for record in &cluster_records {
            out.extend_from_slice(record);
        }
        out.extend_from_slice(&[0u8; 16]); // md5 tail, never verified

        out
    }

    pub fn write(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp file");
        file.write_all(&self.build()).expect("write archive");
        file
    }
}

fn push_cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

fn serialize_entry(entry: &Entry) -> Vec<u8> {
    let mut out = Vec::new();
    match entry {
        Entry::Content {
            mime,
            namespace,
            url,
            title,
            cluster,
            blob,
        } => {
            out.extend_from_slice(&mime.to_le_bytes());
            out.push(0); // parameter len
            out.push(*namespace);
            out.extend_from_slice(&0u32.to_le_bytes()); // revision
            out.extend_from_slice(&cluster.to_le_bytes());
            out.extend_from_slice(&blob.to_le_bytes());
            push_cstr(&mut out, url);
            push_cstr(&mut out, title);
        }
        Entry::Redirect {
            namespace,
            url,
            title,
            target,
        } => {
            out.extend_from_slice(&0xffffu16.to_le_bytes());
            out.push(0);
            out.push(*namespace);
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&target.to_le_bytes());
            push_cstr(&mut out, url);
            push_cstr(&mut out, title);
        }
        Entry::Sentinel {
            mime,
            namespace,
            url,
            title,
        } => {
            out.extend_from_slice(&mime.to_le_bytes());
            out.push(0);
            out.push(*namespace);
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes()); // cluster, unused
            out.extend_from_slice(&0u32.to_le_bytes()); // blob, unused
            push_cstr(&mut out, url);
            push_cstr(&mut out, title);
        }
    }
    out
}

fn serialize_cluster(def: &ClusterDef) -> Vec<u8> {
    let width: u64 = if def.extended { 8 } else { 4 };
    let count = def.blobs.len() as u64;

    let mut offsets = Vec::new();
    let mut acc = (count + 1) * width;
    for blob in &def.blobs {
        offsets.push(acc);
        acc += blob.len() as u64;
    }
    offsets.push(acc); // end of the last blob == total logical length

    let mut content = Vec::new();
    for offset in &offsets {
        if def.extended {
            content.extend_from_slice(&offset.to_le_bytes());
        } else {
            content.extend_from_slice(&(*offset as u32).to_le_bytes());
        }
    }
    for blob in &def.blobs {
        content.extend_from_slice(blob);
    }

    let payload = match def.compression {
        COMP_XZ => xz_compress(&content),
        COMP_ZSTD => zstd::encode_all(&content[..], 0).expect("zstd encode"),
        _ => content,
    };

    let mut out = Vec::new();
    let mut info = def.compression & 0x0f;
    if def.extended {
        info |= 0x10;
    }
    out.push(info);
    out.extend_from_slice(&payload);
    out
}

fn xz_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).expect("xz encode");
    encoder.finish().expect("xz finish")
}
