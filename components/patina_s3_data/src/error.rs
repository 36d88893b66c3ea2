//! S3 Data Error Types
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use core::fmt;

use r_efi::efi;

use crate::{layout::S3DataKind, reservation::ReservationId};

/// A specialized [`Result`](core::result::Result) type for S3 data operations.
pub type Result<T> = core::result::Result<T, S3DataError>;

/// Errors produced while saving S3 data.
///
/// A blob that was never saved is not an error. Restore operations report it as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S3DataError {
    /// The flash device could not be probed or its bus could not be claimed.
    StorageUnavailable,
    /// The blob does not fit in its region once the length field is accounted for.
    CapacityExceeded { kind: S3DataKind, requested: usize, available: u32 },
    /// Erasing the region failed.
    EraseFailed { kind: S3DataKind, status: efi::Status },
    /// Writing the length field or the payload failed.
    WriteFailed { kind: S3DataKind, status: efi::Status },
    /// Reserving resume memory failed.
    ReservationFailed { id: ReservationId, status: efi::Status },
    /// The storage window configuration is not usable.
    InvalidConfiguration(ConfigError),
}

impl fmt::Display for S3DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            S3DataError::StorageUnavailable => write!(f, "S3 data storage unavailable"),
            S3DataError::CapacityExceeded { kind, requested, available } => {
                write!(f, "{kind} blob of {requested:#x} bytes exceeds region payload capacity {available:#x}")
            }
            S3DataError::EraseFailed { kind, status } => write!(f, "erasing {kind} region failed: {status:?}"),
            S3DataError::WriteFailed { kind, status } => write!(f, "writing {kind} region failed: {status:?}"),
            S3DataError::ReservationFailed { id, status } => write!(f, "reserving {id:?} failed: {status:?}"),
            S3DataError::InvalidConfiguration(err) => write!(f, "invalid S3 data configuration: {err}"),
        }
    }
}

impl From<ConfigError> for S3DataError {
    fn from(err: ConfigError) -> Self {
        S3DataError::InvalidConfiguration(err)
    }
}

impl From<S3DataError> for efi::Status {
    fn from(err: S3DataError) -> efi::Status {
        match err {
            S3DataError::StorageUnavailable => efi::Status::NOT_READY,
            S3DataError::CapacityExceeded { .. } => efi::Status::BUFFER_TOO_SMALL,
            S3DataError::EraseFailed { status, .. }
            | S3DataError::WriteFailed { status, .. }
            | S3DataError::ReservationFailed { status, .. } => status,
            S3DataError::InvalidConfiguration(_) => efi::Status::INVALID_PARAMETER,
        }
    }
}

/// Reasons an [`S3DataConfig`](crate::config::S3DataConfig) is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The sector size is zero.
    ZeroSectorSize,
    /// The window extends past the end of the 32-bit flash address space.
    WindowOutOfRange,
    /// The three regions together do not fit in the window.
    RegionsExceedWindow,
    /// The window base is not sector aligned.
    MisalignedWindowBase,
    /// A region capacity is not a multiple of the sector size.
    MisalignedRegion(S3DataKind),
    /// A non-empty region cannot hold the length field.
    RegionTooSmall(S3DataKind),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroSectorSize => write!(f, "sector size is zero"),
            ConfigError::WindowOutOfRange => write!(f, "window exceeds the flash address space"),
            ConfigError::RegionsExceedWindow => write!(f, "regions exceed the window, increase the S3 data size"),
            ConfigError::MisalignedWindowBase => write!(f, "window base is not sector aligned"),
            ConfigError::MisalignedRegion(kind) => write!(f, "{kind} region is not a multiple of the sector size"),
            ConfigError::RegionTooSmall(kind) => write!(f, "{kind} region cannot hold the length field"),
        }
    }
}
