use std::io;
use std::result;
use std::string::FromUtf8Error;

pub type Result<T> = result::Result<T, Error>;

/// Everything that can go wrong while reading a ZIM archive.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file does not start with the ZIM magic number.
    #[error("not a zim archive (bad magic number)")]
    BadMagic,

    /// End of file reached before an expected byte count.
    #[error("unexpected end of file")]
    Truncated,

    #[error("io error: {0}")]
    Io(io::Error),

    /// A decompressor reported a data error, the stream ended before the
    /// requested logical offset, or an offset table contradicts itself.
    #[error("corrupt cluster stream: {0}")]
    CorruptStream(String),

    /// Cluster info byte names a compression outside {1, 4, 5}.
    #[error("unsupported cluster compression: {0}")]
    UnsupportedCompression(u8),

    /// The requested entry is a redlink or deleted page, or an index is out
    /// of range. URL lookup reports absence as `Ok(None)` instead.
    #[error("entry not found")]
    NotFound,

    #[error("redirect chain too deep")]
    RedirectLoop,

    /// A hard size cap was hit where truncation is not viable.
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),

    #[error("invalid utf-8 in archive string: {0}")]
    Utf8(#[from] FromUtf8Error),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::Truncated,
            _ => Error::Io(e),
        }
    }
}

impl From<bitreader::BitReaderError> for Error {
    fn from(e: bitreader::BitReaderError) -> Error {
        Error::CorruptStream(e.to_string())
    }
}
