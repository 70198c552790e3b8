// SPDX-License-Identifier: MIT
use core::fmt;

/// Errors returned synchronously to a registering caller.
///
/// Hardware and table invariant violations are not represented here; a broken
/// static bit table is an integration defect, not a runtime condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed context, out-of-range value, duplicate software SMI value,
    /// or a stale/foreign handle.
    InvalidParameter,
    /// The record database is full, or no software SMI value is left to
    /// auto-assign.
    OutOfResources,
    /// The platform tables do not wire up the requested source.
    Unsupported,
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::OutOfResources => write!(f, "out of resources"),
            Self::Unsupported => write!(f, "unsupported by this platform"),
        }
    }
}
