//! S3 Data Blob Codec
//!
//! A stored blob is a 4-byte little-endian length followed by exactly that many payload bytes, placed at the start of
//! its region. Encoding goes through the [`SpiFlash`] driver; decoding reads the memory-mapped window and never copies
//! the payload.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use core::mem::size_of;

use zerocopy::{FromBytes, IntoBytes, byteorder::little_endian::U32};
use zerocopy_derive::*;

use crate::{
    LOG_TARGET,
    error::{Result, S3DataError},
    layout::{Region, S3DataKind},
    storage::{BlobView, MappedWindow, SpiFlash},
};

/// Size of the length field that precedes every payload.
pub const LENGTH_FIELD_SIZE: u32 = size_of::<BlobHeader>() as u32;

/// On-flash header of a stored blob.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct BlobHeader {
    length: U32,
}

impl BlobHeader {
    /// Creates a header for a payload of `length` bytes.
    pub fn new(length: u32) -> Self {
        Self { length: U32::new(length) }
    }

    /// The payload length recorded in the header.
    pub fn length(&self) -> u32 {
        self.length.get()
    }
}

/// Location of a decoded blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedBlob {
    /// Payload length in bytes. Never zero.
    pub length: u32,
    /// Device offset of the first payload byte.
    pub payload_offset: u32,
}

/// Returns an error if `length` bytes do not fit in the payload area of `region`.
pub fn check_capacity(kind: S3DataKind, region: Region, length: usize) -> Result<()> {
    if length > region.payload_capacity() as usize {
        return Err(S3DataError::CapacityExceeded { kind, requested: length, available: region.payload_capacity() });
    }
    Ok(())
}

/// Erases `region` and writes `payload` into it.
///
/// An empty payload is a no-op that leaves the region untouched. A payload larger than the region's payload capacity
/// fails with [`S3DataError::CapacityExceeded`] before anything is erased or written.
///
/// The payload is written before the length field. Until the length field is programmed it reads back as erased, so a
/// region whose payload write failed decodes as absent rather than as garbage.
///
/// The flash must already be probed and its bus claimed.
pub fn encode<F: SpiFlash + ?Sized>(flash: &mut F, kind: S3DataKind, region: Region, payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        return Ok(());
    }
    check_capacity(kind, region, payload.len())?;

    // Checked above, the payload is smaller than a u32 region.
    let header = BlobHeader::new(payload.len() as u32);

    log::debug!(target: LOG_TARGET, "Erasing {kind} region: offset={:#x}, size={:#x}", region.offset, region.capacity);
    flash.erase(region.offset, region.capacity).map_err(|status| S3DataError::EraseFailed { kind, status })?;

    log::debug!(target: LOG_TARGET, "Writing {kind} blob: offset={:#x}, length={:#x}", region.offset, header.length());
    flash.write(region.payload_offset(), payload).map_err(|status| S3DataError::WriteFailed { kind, status })?;
    flash.write(region.offset, header.as_bytes()).map_err(|status| S3DataError::WriteFailed { kind, status })?;

    Ok(())
}

/// Reads the blob header of `region` from the mapped window.
///
/// Returns `None` when nothing usable is stored: the region has no capacity, the length is zero, the length does not
/// fit in the region (erased flash reads back as `0xFFFFFFFF`), or the region is not covered by `window`.
pub fn decode(window: &MappedWindow<'_>, region: Region) -> Option<DecodedBlob> {
    if region.is_empty() {
        return None;
    }

    let header_bytes = window.read(region.offset, LENGTH_FIELD_SIZE)?;
    let length = BlobHeader::read_from_bytes(header_bytes).ok()?.length();

    if length == 0 {
        return None;
    }
    if length > region.payload_capacity() {
        if length != u32::MAX {
            log::warn!(
                target: LOG_TARGET,
                "Ignoring blob at {:#x}: length {:#x} exceeds payload capacity {:#x}",
                region.offset,
                length,
                region.payload_capacity()
            );
        }
        return None;
    }

    window.read(region.payload_offset(), length)?;
    Some(DecodedBlob { length, payload_offset: region.payload_offset() })
}

/// Decodes `region` and returns a view of its payload in the mapped window.
pub fn decode_view<'a>(window: &MappedWindow<'a>, kind: S3DataKind, region: Region) -> Option<BlobView<'a>> {
    let blob = decode(window, region)?;
    let data = window.read(blob.payload_offset, blob.length)?;
    Some(BlobView::new(kind, blob.payload_offset, data))
}
