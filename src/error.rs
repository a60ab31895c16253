//! Error types shared by every layer of the core.

use std::fmt;
use std::io;

/// The classified reason a core operation failed, per the error taxonomy.
#[derive(Debug)]
pub enum FsError {
    /// A path component does not exist.
    NotFound,
    /// The resolved entry is a file where a directory was expected.
    NotADirectory,
    /// The resolved entry is a directory where a file was expected.
    NotAFile,
    /// The access check failed under the current uid/sudo/trust state.
    PermissionDenied,
    /// A name collision on create.
    Exists,
    /// Free blocks, directory slots, or user table slots are exhausted.
    NoSpace,
    /// A name or argument is malformed or out of bounds.
    InvalidArgument(&'static str),
    /// Wrong password on login, sudo, or passwd.
    AuthFailed,
    /// The underlying device failed.
    DeviceError(io::Error),
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no such file or directory"),
            Self::NotADirectory => write!(f, "not a directory"),
            Self::NotAFile => write!(f, "not a file"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::Exists => write!(f, "file exists"),
            Self::NoSpace => write!(f, "no space left on device"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::AuthFailed => write!(f, "authentication failed"),
            Self::DeviceError(e) => write!(f, "device error: {e}"),
        }
    }
}

impl std::error::Error for FsError {}

impl From<io::Error> for FsError {
    fn from(e: io::Error) -> Self {
        Self::DeviceError(e)
    }
}

/// The result type used throughout the core.
pub type FsResult<T> = Result<T, FsError>;
