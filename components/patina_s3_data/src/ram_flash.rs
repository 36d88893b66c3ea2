//! RAM Backed SPI Flash
//!
//! A [`SpiFlash`] implementation backed by a heap buffer. It models NOR flash behavior closely enough to exercise the
//! save and restore paths off target:
//!
//! - Erased bytes read back as `0xFF`.
//! - Erases must be sector aligned.
//! - Programming can only clear bits, so writes to unerased flash corrupt data the same way real parts do.
//! - Erase and write require the bus to be claimed.
//!
//! Faults can be injected per region to test that failures on one region do not affect the others.
//!
//! ```rust
//! use patina_s3_data::{ram_flash::RamFlash, storage::SpiFlash};
//!
//! let mut flash = RamFlash::new(0x2000, 0x1000);
//! flash.probe().unwrap();
//! flash.claim_bus().unwrap();
//! flash.erase(0x1000, 0x1000).unwrap();
//! flash.write(0x1000, &[0x12, 0x34]).unwrap();
//! flash.release_bus();
//!
//! assert_eq!(flash.mapped().read(0x1000, 3), Some(&[0x12, 0x34, 0xFF][..]));
//! ```
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::{vec, vec::Vec};

use r_efi::efi;

use crate::storage::{MappedWindow, SpiFlash};

/// Value of an erased flash byte.
pub const ERASED_BYTE: u8 = 0xFF;

/// SPI flash emulated in memory.
#[derive(Debug, Clone)]
pub struct RamFlash {
    data: Vec<u8>,
    sector_size: u32,
    present: bool,
    bus_claimed: bool,
    erase_count: usize,
    write_count: usize,
    failing_erase: Option<u32>,
    failing_write: Option<u32>,
}

impl RamFlash {
    /// Creates an erased flash of `size` bytes.
    ///
    /// ## Panics
    ///
    /// Panics if `sector_size` is zero.
    pub fn new(size: usize, sector_size: u32) -> Self {
        assert!(sector_size != 0, "RamFlash::new: sector size is zero");
        Self {
            data: vec![ERASED_BYTE; size],
            sector_size,
            present: true,
            bus_claimed: false,
            erase_count: 0,
            write_count: 0,
            failing_erase: None,
            failing_write: None,
        }
    }

    /// Makes `probe` fail, as if no flash part was detected.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    /// Fails any erase that starts at `offset`.
    pub fn fail_erase_at(&mut self, offset: u32) {
        self.failing_erase = Some(offset);
    }

    /// Fails any write whose range covers `offset`.
    pub fn fail_write_at(&mut self, offset: u32) {
        self.failing_write = Some(offset);
    }

    /// Removes all injected faults.
    pub fn clear_faults(&mut self) {
        self.failing_erase = None;
        self.failing_write = None;
    }

    /// The raw flash contents.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// A view of the whole part as if it were memory mapped.
    pub fn mapped(&self) -> MappedWindow<'_> {
        MappedWindow::new(0, &self.data)
    }

    /// Number of successful erase operations.
    pub fn erase_count(&self) -> usize {
        self.erase_count
    }

    /// Number of successful write operations.
    pub fn write_count(&self) -> usize {
        self.write_count
    }

    /// Returns true while the bus is claimed.
    pub fn is_bus_claimed(&self) -> bool {
        self.bus_claimed
    }

    fn range(&self, offset: u32, length: usize) -> Result<core::ops::Range<usize>, efi::Status> {
        let start = offset as usize;
        let end = start.checked_add(length).ok_or(efi::Status::INVALID_PARAMETER)?;
        if end > self.data.len() {
            return Err(efi::Status::INVALID_PARAMETER);
        }
        Ok(start..end)
    }
}

impl SpiFlash for RamFlash {
    fn probe(&mut self) -> Result<(), efi::Status> {
        if self.present { Ok(()) } else { Err(efi::Status::NOT_FOUND) }
    }

    fn claim_bus(&mut self) -> Result<(), efi::Status> {
        if self.bus_claimed {
            return Err(efi::Status::ACCESS_DENIED);
        }
        self.bus_claimed = true;
        Ok(())
    }

    fn release_bus(&mut self) {
        self.bus_claimed = false;
    }

    fn erase(&mut self, offset: u32, length: u32) -> Result<(), efi::Status> {
        if !self.bus_claimed {
            return Err(efi::Status::NOT_READY);
        }
        if offset % self.sector_size != 0 || length % self.sector_size != 0 {
            return Err(efi::Status::INVALID_PARAMETER);
        }
        let range = self.range(offset, length as usize)?;
        if self.failing_erase == Some(offset) {
            return Err(efi::Status::DEVICE_ERROR);
        }

        self.data[range].fill(ERASED_BYTE);
        self.erase_count += 1;
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), efi::Status> {
        if !self.bus_claimed {
            return Err(efi::Status::NOT_READY);
        }
        let range = self.range(offset, data.len())?;
        if let Some(failing) = self.failing_write {
            if range.contains(&(failing as usize)) {
                return Err(efi::Status::DEVICE_ERROR);
            }
        }

        for (cell, byte) in self.data[range].iter_mut().zip(data) {
            *cell &= *byte;
        }
        self.write_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claimed(size: usize) -> RamFlash {
        let mut flash = RamFlash::new(size, 0x1000);
        flash.claim_bus().unwrap();
        flash
    }

    #[test]
    fn test_new_flash_is_erased() {
        let flash = RamFlash::new(0x2000, 0x1000);
        assert!(flash.bytes().iter().all(|b| *b == ERASED_BYTE));
        assert_eq!(flash.erase_count(), 0);
        assert_eq!(flash.write_count(), 0);
    }

    #[test]
    fn test_probe_absent_flash() {
        let mut flash = RamFlash::new(0x1000, 0x1000);
        flash.set_present(false);
        assert_eq!(flash.probe(), Err(efi::Status::NOT_FOUND));
        flash.set_present(true);
        assert_eq!(flash.probe(), Ok(()));
    }

    #[test]
    fn test_bus_must_be_claimed() {
        let mut flash = RamFlash::new(0x1000, 0x1000);
        assert_eq!(flash.erase(0, 0x1000), Err(efi::Status::NOT_READY));
        assert_eq!(flash.write(0, &[0]), Err(efi::Status::NOT_READY));

        flash.claim_bus().unwrap();
        assert!(flash.is_bus_claimed());
        assert_eq!(flash.claim_bus(), Err(efi::Status::ACCESS_DENIED));
        flash.release_bus();
        assert!(!flash.is_bus_claimed());
    }

    #[test]
    fn test_erase_alignment_and_bounds() {
        let mut flash = claimed(0x2000);
        assert_eq!(flash.erase(0x800, 0x1000), Err(efi::Status::INVALID_PARAMETER));
        assert_eq!(flash.erase(0, 0x800), Err(efi::Status::INVALID_PARAMETER));
        assert_eq!(flash.erase(0x1000, 0x2000), Err(efi::Status::INVALID_PARAMETER));
        assert_eq!(flash.erase(0x1000, 0x1000), Ok(()));
        assert_eq!(flash.erase_count(), 1);
    }

    #[test]
    fn test_write_only_clears_bits() {
        let mut flash = claimed(0x1000);
        flash.write(0, &[0xF0, 0x0F]).unwrap();
        flash.write(0, &[0x3C, 0xFF]).unwrap();
        assert_eq!(&flash.bytes()[0..3], &[0x30, 0x0F, 0xFF]);

        flash.erase(0, 0x1000).unwrap();
        flash.write(0, &[0x3C]).unwrap();
        assert_eq!(flash.bytes()[0], 0x3C);
        assert_eq!(flash.write_count(), 3);
    }

    #[test]
    fn test_write_out_of_bounds() {
        let mut flash = claimed(0x1000);
        assert_eq!(flash.write(0xFFF, &[0, 0]), Err(efi::Status::INVALID_PARAMETER));
        assert_eq!(flash.write(0xFFF, &[0]), Ok(()));
    }

    #[test]
    fn test_injected_faults() {
        let mut flash = claimed(0x3000);
        flash.fail_erase_at(0x1000);
        flash.fail_write_at(0x2004);

        assert_eq!(flash.erase(0x1000, 0x1000), Err(efi::Status::DEVICE_ERROR));
        assert_eq!(flash.erase(0x2000, 0x1000), Ok(()));
        assert_eq!(flash.write(0x2000, &[0; 4]), Ok(()));
        assert_eq!(flash.write(0x2002, &[0; 4]), Err(efi::Status::DEVICE_ERROR));

        flash.clear_faults();
        assert_eq!(flash.erase(0x1000, 0x1000), Ok(()));
        assert_eq!(flash.write(0x2002, &[0; 4]), Ok(()));
    }
}
