use std::{fmt, io, path::Path, path::PathBuf};

/// Everything that can stop a generation run. Cache problems short of an
/// I/O failure are recoverable (the driver recomputes); the rest is fatal.
#[derive(Debug)]
pub enum Error {
    CacheMissing(PathBuf),
    CacheMalformed { path: PathBuf, reason: String },
    Io { path: PathBuf, source: io::Error },
    CountMismatch { n: usize, expected: u64, found: u64 },
    UnsupportedN(usize),
}

impl Error {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(path: &Path, reason: impl Into<String>) -> Self {
        Self::CacheMalformed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CacheMissing(path) => {
                write!(f, "cache file {} does not exist", path.display())
            }
            Error::CacheMalformed { path, reason } => {
                write!(f, "cache file {} is malformed: {}", path.display(), reason)
            }
            Error::Io { path, source } => {
                write!(f, "i/o failure on {}: {}", path.display(), source)
            }
            Error::CountMismatch { n, expected, found } => {
                write!(
                    f,
                    "count for n = {} does not match the reference table: expected {}, found {}",
                    n, expected, found
                )
            }
            Error::UnsupportedN(n) => {
                write!(f, "n = {} is outside the supported range (1..=126)", n)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
