use thiserror::Error;

/// crate specific Result type
pub type Result<T> = std::result::Result<T, Error>;

/// crate specific Error enum
#[derive(Error, Debug)]
pub enum Error {
    /// The fixed header block is missing, too short or inconsistent
    #[error("malformed LAS header: {0}")]
    MalformedHeader(String),

    /// Only point data record format 3 can be decoded
    #[error("unsupported point data record format {0}, only format 3 is supported")]
    UnsupportedPointFormat(u8),

    /// [std::io::Error]
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A read of the point data region returned fewer bytes than a full record needs
    #[error("truncated point data at byte {offset}: expected {expected} bytes, got {actual}")]
    TruncatedPointData {
        /// Where the short read started: an absolute file offset for streamed
        /// ranges, an offset into the caller's buffer for single records
        offset: u64,
        expected: usize,
        actual: usize,
    },

    /// Packets must hold at least one point and fit in memory
    #[error("the packet size must be at least one point and fit in the address space")]
    InvalidPacketSize,
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedHeader(reason.into())
    }
}
