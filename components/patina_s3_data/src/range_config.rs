//! CPU Range Configuration Backend
//!
//! The memory range configuration of the CPU (MTRRs on x86) is captured during suspend and replayed during CPU
//! enumeration on resume. Reading and writing the actual registers is the job of the platform's CPU code; this crate
//! only stores the opaque snapshot.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

/// Largest range configuration snapshot the save path will capture.
///
/// The snapshot is taken into a stack buffer of this size, since no heap is available while saving.
pub const RANGE_CONFIG_SNAPSHOT_MAX: usize = 0x1000;

/// Access to the CPU memory range configuration.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait RangeConfigBackend {
    /// Serializes the current range configuration into `buffer`.
    ///
    /// Returns the number of bytes written. Zero means there is nothing to save. A backend that needs more space than
    /// `buffer` provides must not write past its end, and should report the length it needed.
    fn backup(&mut self, buffer: &mut [u8]) -> usize;

    /// Programs the range configuration from a snapshot produced by [`backup`](Self::backup).
    fn restore(&mut self, snapshot: &[u8]);
}

/// Backend for platforms without range configuration to preserve.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRangeConfig;

impl RangeConfigBackend for NoRangeConfig {
    fn backup(&mut self, _buffer: &mut [u8]) -> usize {
        0
    }

    fn restore(&mut self, _snapshot: &[u8]) {}
}
