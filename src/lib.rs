//! This crate provides a pure-rust library for reading ZIM files.
//!
//! ZIM files are a format used primarily to store wikis (such as Wikipedia and others based on
//! MediaWiki) for offline use.
//!
//! For more info, see the [OpenZIM website](https://openzim.org/wiki/OpenZIM)
//!
//! The reader is random access: [`Zim::open`] parses the header and MIME
//! table, [`Zim::iterate_by_urls`] walks the directory in URL order,
//! [`Zim::find_by_url`] binary searches it, and [`Zim::read_content`]
//! extracts an entry's bytes, transparently decoding XZ and zstd compressed
//! clusters and following redirects.

mod cluster;
mod directory_entry;
mod directory_iterator;
mod errors;
mod mime_type;
mod namespace;
mod reader;
mod zim;

pub use crate::cluster::{Cluster, Compression, MAX_BLOB_SIZE, MAX_CLUSTER_SIZE};
pub use crate::directory_entry::{DirectoryEntry, Target, MAX_NAME_LEN};
pub use crate::directory_iterator::DirectoryIterator;
pub use crate::errors::{Error, Result};
pub use crate::mime_type::MimeType;
pub use crate::namespace::Namespace;
pub use crate::zim::{Zim, ZimHeader, MAX_REDIRECT_DEPTH, ZIM_MAGIC_NUMBER};
