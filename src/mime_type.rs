use std::fmt;

/// Sentinel mime-code marking a redirect entry.
pub const MIME_REDIRECT: u16 = 0xffff;
/// Sentinel mime-code marking a redlink (a link target without content).
pub const MIME_REDLINK: u16 = 0xfffe;
/// Sentinel mime-code marking a deleted entry.
pub const MIME_DELETED: u16 = 0xfffd;

/// Resolved meaning of a directory entry's mime-code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeType {
    /// An actual mime string from the archive's MIME table.
    Type(String),
    /// A special "MimeType" that represents a redirection
    Redirect,
    Redlink,
    Deleted,
    /// A mime-code past the end of the MIME table.
    Unknown,
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MimeType::Type(mime) => f.write_str(mime),
            MimeType::Redirect => f.write_str("none (redirect)"),
            MimeType::Redlink | MimeType::Deleted => f.write_str("none (deleted page)"),
            MimeType::Unknown => f.write_str("unknown"),
        }
    }
}
