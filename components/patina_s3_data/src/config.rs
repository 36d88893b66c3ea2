//! S3 Data Configuration
//!
//! Describes where the S3 data window lives in the platform flash and how it is divided. The values are platform
//! build constants. [`S3DataConfig::new`] is a `const fn` so a platform that declares its configuration as a `const`
//! item gets a compile error, rather than silent truncation, when the regions do not fit in the window:
//!
//! ```rust,compile_fail
//! use patina_s3_data::config::S3DataConfig;
//!
//! // 0x6000 + 0x1000 + 0x1000 does not fit in 0x4000.
//! const CONFIG: S3DataConfig = S3DataConfig::new(0, 0x4000, 0x6000, 0x1000, 0x1000).assert_valid();
//! ```
//!
//! Configurations assembled at runtime are checked by [`S3DataConfig::validate`], which every constructor in this
//! crate calls before using the configuration.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use crate::{codec::LENGTH_FIELD_SIZE, error::ConfigError, layout::S3DataKind};

/// Erase sector size of most SPI flash parts.
pub const DEFAULT_SECTOR_SIZE: u32 = 0x1000;
/// Default capacity of the volatile data region.
pub const DEFAULT_VOLATILE_CAPACITY: u32 = 0x6000;
/// Default capacity of the range configuration (MTRR) region.
pub const DEFAULT_RANGE_CONFIG_CAPACITY: u32 = 0x1000;
/// Default capacity of the non-volatile data region.
pub const DEFAULT_NON_VOLATILE_CAPACITY: u32 = 0x1000;
/// Default device offset of the window: the last 64KB of a 16MB part.
pub const DEFAULT_WINDOW_BASE: u32 = 0x00FF_0000;
/// Default window size.
pub const DEFAULT_WINDOW_CAPACITY: u32 = 0x8000;

/// S3 Data Configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S3DataConfig {
    /// Flash device offset of the start of the window.
    pub window_base: u32,
    /// Size of the window in bytes.
    pub window_capacity: u32,
    pub volatile_capacity: u32,
    pub range_config_capacity: u32,
    pub non_volatile_capacity: u32,
    /// Flash erase granularity. Every region is erased on its own, so every capacity must be a multiple of it.
    pub sector_size: u32,
    /// High memory to reserve for the romstage stack on resume. Zero skips the reservation.
    pub romstage_stack_size: u32,
    /// High memory to reserve as resume scratch space. Zero skips the reservation.
    pub resume_scratch_size: u32,
}

impl S3DataConfig {
    /// Creates a configuration with the default sector size and no resume memory reservations.
    ///
    /// ## Panics
    ///
    /// Panics if the three regions do not fit in the window. In a `const` context this is a compile error.
    pub const fn new(
        window_base: u32,
        window_capacity: u32,
        volatile_capacity: u32,
        range_config_capacity: u32,
        non_volatile_capacity: u32,
    ) -> Self {
        let required = volatile_capacity as u64 + range_config_capacity as u64 + non_volatile_capacity as u64;
        assert!(required <= window_capacity as u64, "S3 data regions exceed the window, increase the S3 data size");

        Self {
            window_base,
            window_capacity,
            volatile_capacity,
            range_config_capacity,
            non_volatile_capacity,
            sector_size: DEFAULT_SECTOR_SIZE,
            romstage_stack_size: 0,
            resume_scratch_size: 0,
        }
    }

    /// Sets the flash erase granularity.
    pub const fn with_sector_size(mut self, sector_size: u32) -> Self {
        self.sector_size = sector_size;
        self
    }

    /// Sets the high memory areas reserved for the resume path during save.
    pub const fn with_resume_reservations(mut self, romstage_stack_size: u32, resume_scratch_size: u32) -> Self {
        self.romstage_stack_size = romstage_stack_size;
        self.resume_scratch_size = resume_scratch_size;
        self
    }

    /// Returns the configured capacity for `kind`.
    pub const fn capacity(&self, kind: S3DataKind) -> u32 {
        match kind {
            S3DataKind::Volatile => self.volatile_capacity,
            S3DataKind::RangeConfig => self.range_config_capacity,
            S3DataKind::NonVolatile => self.non_volatile_capacity,
        }
    }

    /// Checks every layout invariant.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.sector_size == 0 {
            return Err(ConfigError::ZeroSectorSize);
        }
        // The window may end exactly at the top of the 32-bit flash address space.
        if self.window_base as u64 + self.window_capacity as u64 > 1u64 << 32 {
            return Err(ConfigError::WindowOutOfRange);
        }
        let required =
            self.volatile_capacity as u64 + self.range_config_capacity as u64 + self.non_volatile_capacity as u64;
        if required > self.window_capacity as u64 {
            return Err(ConfigError::RegionsExceedWindow);
        }
        if self.window_base % self.sector_size != 0 {
            return Err(ConfigError::MisalignedWindowBase);
        }

        let mut i = 0;
        while i < S3DataKind::COUNT {
            let kind = S3DataKind::WINDOW_ORDER[i];
            let capacity = self.capacity(kind);
            if capacity % self.sector_size != 0 {
                return Err(ConfigError::MisalignedRegion(kind));
            }
            if capacity != 0 && capacity < LENGTH_FIELD_SIZE {
                return Err(ConfigError::RegionTooSmall(kind));
            }
            i += 1;
        }
        Ok(())
    }

    /// Returns the configuration if it is valid.
    ///
    /// ## Panics
    ///
    /// Panics if [`validate`](Self::validate) fails. In a `const` context this is a compile error.
    pub const fn assert_valid(self) -> Self {
        match self.validate() {
            Ok(()) => self,
            Err(ConfigError::ZeroSectorSize) => panic!("S3 data sector size is zero"),
            Err(ConfigError::WindowOutOfRange) => panic!("S3 data window exceeds the flash address space"),
            Err(ConfigError::RegionsExceedWindow) => panic!("S3 data regions exceed the window"),
            Err(ConfigError::MisalignedWindowBase) => panic!("S3 data window base is not sector aligned"),
            Err(ConfigError::MisalignedRegion(_)) => panic!("S3 data region is not a multiple of the sector size"),
            Err(ConfigError::RegionTooSmall(_)) => panic!("S3 data region cannot hold the length field"),
        }
    }
}

impl Default for S3DataConfig {
    fn default() -> Self {
        DEFAULT_CONFIG
    }
}

const DEFAULT_CONFIG: S3DataConfig = S3DataConfig::new(
    DEFAULT_WINDOW_BASE,
    DEFAULT_WINDOW_CAPACITY,
    DEFAULT_VOLATILE_CAPACITY,
    DEFAULT_RANGE_CONFIG_CAPACITY,
    DEFAULT_NON_VOLATILE_CAPACITY,
)
.assert_valid();
