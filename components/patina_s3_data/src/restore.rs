//! S3 Data Restore Paths
//!
//! Each resume phase reads only the region it needs from the memory-mapped window. The phases share no state, so they
//! may run in any order and any number of times.
//!
//! - [`early_restore`] runs before memory is initialized. It returns a view of the non-volatile blob that points into
//!   the mapped flash and never copies.
//! - [`late_restore`] runs once a heap exists. It copies the volatile blob into a buffer the caller owns.
//! - [`saved_range_config`] and [`restore_range_config`] are used during CPU enumeration.
//!
//! A missing, erased, or corrupt blob is not an error. It is reported as `None` and the resume path continues as if
//! there were no prior state.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::{boxed::Box, vec::Vec};

use crate::{
    LOG_TARGET, codec,
    layout::{S3DataKind, S3DataLayout},
    range_config::RangeConfigBackend,
    storage::{BlobView, MappedWindow},
};

fn lookup<'a>(layout: &S3DataLayout, window: &MappedWindow<'a>, kind: S3DataKind) -> Option<BlobView<'a>> {
    let view = codec::decode_view(window, kind, layout.locate(kind));
    match &view {
        Some(view) => log::debug!(target: LOG_TARGET, "Found saved {kind} data: {view:?}"),
        None => log::debug!(target: LOG_TARGET, "No saved {kind} data"),
    }
    view
}

/// Returns the saved non-volatile blob, borrowed from the mapped window.
pub fn early_restore<'a>(layout: &S3DataLayout, window: &MappedWindow<'a>) -> Option<BlobView<'a>> {
    lookup(layout, window, S3DataKind::NonVolatile)
}

/// Returns a heap copy of the saved volatile blob.
///
/// Returns `None` if nothing is saved or the copy cannot be allocated.
pub fn late_restore(layout: &S3DataLayout, window: &MappedWindow<'_>) -> Option<Box<[u8]>> {
    let view = lookup(layout, window, S3DataKind::Volatile)?;

    let mut copy = Vec::new();
    if copy.try_reserve_exact(view.as_bytes().len()).is_err() {
        log::warn!(target: LOG_TARGET, "Failed to allocate {:#x} bytes for the volatile data", view.len());
        return None;
    }
    copy.extend_from_slice(view.as_bytes());
    Some(copy.into_boxed_slice())
}

/// Returns the saved range configuration snapshot, borrowed from the mapped window.
pub fn saved_range_config<'a>(layout: &S3DataLayout, window: &MappedWindow<'a>) -> Option<BlobView<'a>> {
    lookup(layout, window, S3DataKind::RangeConfig)
}

/// Replays the saved range configuration snapshot into `backend`.
///
/// Returns true if a snapshot was found and handed to the backend.
pub fn restore_range_config(
    layout: &S3DataLayout,
    window: &MappedWindow<'_>,
    backend: &mut dyn RangeConfigBackend,
) -> bool {
    match saved_range_config(layout, window) {
        Some(view) => {
            log::info!(target: LOG_TARGET, "Restoring range configuration: {:#x} bytes", view.len());
            backend.restore(view.as_bytes());
            true
        }
        None => false,
    }
}
