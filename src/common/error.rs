//! Error types for BrambleDB.

use std::fmt;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write
/// `Result<T>`, the same way `std::io::Result` does.
pub type Result<T> = std::result::Result<T, Error>;

/// All recoverable errors in the storage core.
///
/// Invariant violations (removing a non-evictable frame from the replacer,
/// pin-count underflow) are not represented here; they panic.
#[derive(Debug)]
pub enum Error {
    /// I/O error from disk operations.
    Io(std::io::Error),

    /// Requested page does not exist on disk.
    PageNotFound(u32),

    /// The provided page id is the invalid sentinel.
    InvalidPageId(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when every frame is pinned.
    NoFreeFrames,

    /// On-disk state does not match what the caller expects
    /// (e.g. a node page whose type tag disagrees with the traversal).
    Corrupted(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::PageNotFound(pid) => write!(f, "page {} not found", pid),
            Error::InvalidPageId(pid) => write!(f, "invalid page id: {}", pid),
            Error::NoFreeFrames => write!(f, "no free frames available in buffer pool"),
            Error::Corrupted(msg) => write!(f, "corrupted page: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(42);
        assert_eq!(format!("{}", err), "page 42 not found");

        let err = Error::NoFreeFrames;
        assert_eq!(format!("{}", err), "no free frames available in buffer pool");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {}
            _ => panic!("expected Io error"),
        }
    }
}
