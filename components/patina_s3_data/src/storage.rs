//! S3 Data Storage Access
//!
//! Two views of the same flash are used by this crate:
//!
//! - [`SpiFlash`]: the flash driver, used only on the save path. Flash must be erased before it is written, and
//!   erases operate on whole sectors.
//! - [`MappedWindow`]: a read-only view of the memory-mapped flash, used by the restore paths. No driver is required,
//!   which is what makes it usable before memory is initialized.
//!
//! ## Borrowed Views
//!
//! A [`BlobView`] borrows its bytes from a [`MappedWindow`], which in turn borrows the mapped flash. The view is only
//! meaningful while the mapped bytes are unchanged: any erase or write of the S3 data window through the flash driver
//! (the next suspend) invalidates every view into it. Consumers must finish with, or copy, the data before that point.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use core::{
    fmt,
    ops::{Deref, DerefMut},
    slice,
};

use r_efi::efi;

use crate::{LOG_TARGET, error::S3DataError, layout::S3DataKind};

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

/// SPI flash driver interface.
///
/// Offsets are flash device offsets.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait SpiFlash {
    /// Detects the flash part. Fails if no usable part is present.
    fn probe(&mut self) -> Result<(), efi::Status>;

    /// Claims the SPI bus for writing.
    fn claim_bus(&mut self) -> Result<(), efi::Status>;

    /// Releases the SPI bus.
    fn release_bus(&mut self);

    /// Erases `length` bytes starting at `offset`. Both must be sector aligned.
    fn erase(&mut self, offset: u32, length: u32) -> Result<(), efi::Status>;

    /// Programs `data` at `offset`. The range must have been erased.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), efi::Status>;
}

/// A probed flash with its bus claimed. The bus is released on drop.
pub(crate) struct FlashSession<'f, F: SpiFlash + ?Sized> {
    flash: &'f mut F,
}

impl<'f, F: SpiFlash + ?Sized> FlashSession<'f, F> {
    /// Probes the flash and claims its bus.
    pub(crate) fn open(flash: &'f mut F) -> Result<Self, S3DataError> {
        if let Err(status) = flash.probe() {
            log::warn!(target: LOG_TARGET, "SPI flash probe failed: {:?}", status);
            return Err(S3DataError::StorageUnavailable);
        }
        if let Err(status) = flash.claim_bus() {
            log::warn!(target: LOG_TARGET, "Failed to claim SPI bus: {:?}", status);
            return Err(S3DataError::StorageUnavailable);
        }
        Ok(Self { flash })
    }
}

impl<F: SpiFlash + ?Sized> Deref for FlashSession<'_, F> {
    type Target = F;

    fn deref(&self) -> &F {
        self.flash
    }
}

impl<F: SpiFlash + ?Sized> DerefMut for FlashSession<'_, F> {
    fn deref_mut(&mut self) -> &mut F {
        self.flash
    }
}

impl<F: SpiFlash + ?Sized> Drop for FlashSession<'_, F> {
    fn drop(&mut self) {
        self.flash.release_bus();
    }
}

/// Read-only view of memory-mapped flash.
///
/// `base` is the flash device offset of the first mapped byte, so reads use the same offsets as the flash driver.
#[derive(Clone, Copy)]
pub struct MappedWindow<'a> {
    base: u32,
    bytes: &'a [u8],
}

impl<'a> MappedWindow<'a> {
    /// Creates a window over `bytes`, which hold the flash contents starting at device offset `base`.
    pub const fn new(base: u32, bytes: &'a [u8]) -> Self {
        Self { base, bytes }
    }

    /// Creates a window over flash mapped at `address`.
    ///
    /// ## Safety
    ///
    /// - `address` must be the start of `length` readable bytes of mapped flash.
    /// - The mapping must stay in place for `'a`.
    pub unsafe fn from_raw_parts(base: u32, address: usize, length: usize) -> Self {
        // SAFETY: The caller guarantees the range is mapped and readable for 'a.
        let bytes = unsafe { slice::from_raw_parts(address as *const u8, length) };
        Self { base, bytes }
    }

    /// Device offset of the first mapped byte.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Number of mapped bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns `length` bytes at device offset `offset`, or `None` if any of them is outside the window.
    pub fn read(&self, offset: u32, length: u32) -> Option<&'a [u8]> {
        let start = offset.checked_sub(self.base)? as usize;
        let end = start.checked_add(length as usize)?;
        self.bytes.get(start..end)
    }
}

impl fmt::Debug for MappedWindow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedWindow")
            .field("base", &format_args!("{:#x}", self.base))
            .field("address", &self.bytes.as_ptr())
            .field("len", &format_args!("{:#x}", self.bytes.len()))
            .finish()
    }
}

/// A stored blob's payload, borrowed in place from a [`MappedWindow`].
///
/// See the [module documentation](self) for how long the view stays valid.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BlobView<'a> {
    kind: S3DataKind,
    offset: u32,
    data: &'a [u8],
}

impl<'a> BlobView<'a> {
    pub(crate) fn new(kind: S3DataKind, offset: u32, data: &'a [u8]) -> Self {
        Self { kind, offset, data }
    }

    /// The kind of data held in the view.
    pub fn kind(&self) -> S3DataKind {
        self.kind
    }

    /// Device offset of the first payload byte.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Payload length in bytes.
    pub fn len(&self) -> u32 {
        self.data.len() as u32
    }

    /// Always false, absent blobs are reported as `None` instead.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The payload bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Address of the payload in the mapped flash.
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }
}

impl fmt::Debug for BlobView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobView({}, offset: {:#x}, len: {:#x})", self.kind, self.offset, self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_read_bounds() {
        let bytes = [0u8, 1, 2, 3, 4, 5, 6, 7];
        let window = MappedWindow::new(0x100, &bytes);

        assert_eq!(window.read(0x100, 4), Some(&bytes[0..4]));
        assert_eq!(window.read(0x104, 4), Some(&bytes[4..8]));
        assert_eq!(window.read(0x108, 0), Some(&bytes[8..8]));
        assert_eq!(window.read(0x105, 4), None);
        assert_eq!(window.read(0xFF, 1), None);
        assert_eq!(window.read(u32::MAX, u32::MAX), None);
        assert_eq!(window.len(), 8);
        assert!(!window.is_empty());
    }

    #[test]
    fn test_window_from_raw_parts() {
        let bytes = [0xA5u8; 16];
        let window = unsafe { MappedWindow::from_raw_parts(0x2000, bytes.as_ptr() as usize, bytes.len()) };

        assert_eq!(window.base(), 0x2000);
        assert_eq!(window.read(0x200C, 4), Some(&[0xA5u8; 4][..]));
    }

    #[test]
    fn test_flash_session_releases_bus() {
        let mut flash = MockSpiFlash::new();
        let mut seq = mockall::Sequence::new();
        flash.expect_probe().once().in_sequence(&mut seq).returning(|| Ok(()));
        flash.expect_claim_bus().once().in_sequence(&mut seq).returning(|| Ok(()));
        flash.expect_erase().once().in_sequence(&mut seq).returning(|_, _| Err(efi::Status::DEVICE_ERROR));
        flash.expect_release_bus().once().in_sequence(&mut seq).return_const(());

        let mut session = FlashSession::open(&mut flash).unwrap();
        assert_eq!(session.erase(0, 0x1000), Err(efi::Status::DEVICE_ERROR));
        drop(session);
    }

    #[test]
    fn test_flash_session_probe_failure() {
        let mut flash = MockSpiFlash::new();
        flash.expect_probe().once().returning(|| Err(efi::Status::NOT_FOUND));
        flash.expect_claim_bus().never();
        flash.expect_release_bus().never();

        assert!(matches!(FlashSession::open(&mut flash), Err(S3DataError::StorageUnavailable)));
    }

    #[test]
    fn test_flash_session_claim_failure() {
        let mut flash = MockSpiFlash::new();
        flash.expect_probe().once().returning(|| Ok(()));
        flash.expect_claim_bus().once().returning(|| Err(efi::Status::ACCESS_DENIED));
        flash.expect_release_bus().never();

        assert!(matches!(FlashSession::open(&mut flash), Err(S3DataError::StorageUnavailable)));
    }

    #[test]
    fn test_blob_view_accessors() {
        let bytes = [0xAAu8, 0xBB, 0xCC];
        let view = BlobView::new(S3DataKind::NonVolatile, 0x7004, &bytes);

        assert_eq!(view.kind(), S3DataKind::NonVolatile);
        assert_eq!(view.offset(), 0x7004);
        assert_eq!(view.len(), 3);
        assert!(!view.is_empty());
        assert_eq!(view.as_ptr(), bytes.as_ptr());
        assert_eq!(format!("{view:?}"), "BlobView(NonVolatile, offset: 0x7004, len: 0x3)");
    }
}
