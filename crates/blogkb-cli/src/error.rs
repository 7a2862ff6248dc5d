//! Process exit codes.
//!
//! Scripts can branch on the code without parsing stderr. `3` means the requested
//! section does not exist and `4` means the query was rejected before any lookup. Codes
//! `5` to `7` mean the source document could not be reached, arrived too late, or could
//! not be read. Anything unexpected exits with `1`.

use std::fmt;
use std::process::ExitCode;

use blogkb_core::{Error as CoreError, FetchError};

/// Why a command failed, as far as the exit code is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Internal,
    /// Bad arguments or an unreadable config file.
    Usage,
    /// `show` found no section with the given title.
    NotFound,
    InvalidQuery,
    /// The source document could not be fetched and nothing was cached.
    Network,
    Timeout,
    /// The source document was fetched but has no recognizable structure.
    Integrity,
}

impl ErrorCategory {
    /// Numeric exit code.
    pub const fn code(self) -> u8 {
        match self {
            Self::Internal => 1,
            Self::Usage => 2,
            Self::NotFound => 3,
            Self::InvalidQuery => 4,
            Self::Network => 5,
            Self::Timeout => 6,
            Self::Integrity => 7,
        }
    }

    /// Category of a failure reported by the knowledge base.
    pub fn from_core(err: &CoreError) -> Self {
        match err {
            CoreError::Fetch(FetchError::Timeout) => Self::Timeout,
            CoreError::Fetch(_) => Self::Network,
            CoreError::Parse(_) => Self::Integrity,
            CoreError::Query(_) => Self::InvalidQuery,
            CoreError::Config(_) => Self::Usage,
            // Keep timeouts and parse failures distinguishable behind the wrapper.
            CoreError::Unavailable(inner) => match Self::from_core(inner) {
                category @ (Self::Timeout | Self::Integrity) => category,
                _ => Self::Network,
            },
        }
    }

    /// Category of a command failure. The first knowledge base error in the chain wins.
    pub fn of(err: &anyhow::Error) -> Self {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<CoreError>())
            .map_or(Self::Internal, Self::from_core)
    }
}

impl From<ErrorCategory> for ExitCode {
    fn from(category: ErrorCategory) -> Self {
        Self::from(category.code())
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Internal => "internal error",
            Self::Usage => "bad arguments or config",
            Self::NotFound => "section not found",
            Self::InvalidQuery => "query rejected",
            Self::Network => "source unreachable",
            Self::Timeout => "source timed out",
            Self::Integrity => "source unreadable",
        })
    }
}
