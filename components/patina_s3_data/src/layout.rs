//! S3 Data Window Layout
//!
//! Maps each kind of S3 data to its fixed region of the storage window. Regions are generated once from a validated
//! [`S3DataConfig`] and stored in an array indexed by [`S3DataKind`], so no call site performs its own offset math.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use core::fmt;

use crate::{codec::LENGTH_FIELD_SIZE, config::S3DataConfig, error::ConfigError};

/// The kinds of data stored in the S3 data window.
///
/// The discriminants are the raw tags used by the silicon init library callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum S3DataKind {
    /// Consumed by the early (pre-memory) resume phase.
    NonVolatile = 0,
    /// Consumed by the late resume phase once heap is available.
    Volatile = 1,
    /// CPU memory range configuration (MTRR) snapshot, consumed during CPU enumeration.
    RangeConfig = 2,
}

impl S3DataKind {
    /// Number of data kinds.
    pub const COUNT: usize = 3;

    /// Data kinds in the order their regions appear in the window.
    pub const WINDOW_ORDER: [S3DataKind; S3DataKind::COUNT] =
        [S3DataKind::Volatile, S3DataKind::RangeConfig, S3DataKind::NonVolatile];

    /// Converts a raw tag into a data kind.
    pub const fn from_raw(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(S3DataKind::NonVolatile),
            1 => Some(S3DataKind::Volatile),
            2 => Some(S3DataKind::RangeConfig),
            _ => None,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u32> for S3DataKind {
    type Error = u32;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        S3DataKind::from_raw(tag).ok_or(tag)
    }
}

impl fmt::Display for S3DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            S3DataKind::NonVolatile => "NonVolatile",
            S3DataKind::Volatile => "Volatile",
            S3DataKind::RangeConfig => "RangeConfig",
        };
        f.write_str(name)
    }
}

/// A fixed region of the storage window.
///
/// `offset` is a flash device offset. A region with zero capacity has no storage behind it and every operation on it
/// is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    pub offset: u32,
    pub capacity: u32,
}

impl Region {
    /// The region returned for data that has no storage.
    pub const EMPTY: Region = Region { offset: 0, capacity: 0 };

    /// Returns true if there is no storage behind this region.
    pub const fn is_empty(&self) -> bool {
        self.capacity == 0
    }

    /// First device offset past the end of the region.
    pub const fn end(&self) -> u64 {
        self.offset as u64 + self.capacity as u64
    }

    /// Device offset where the payload begins.
    pub const fn payload_offset(&self) -> u32 {
        self.offset.saturating_add(LENGTH_FIELD_SIZE)
    }

    /// Largest payload the region can hold.
    pub const fn payload_capacity(&self) -> u32 {
        self.capacity.saturating_sub(LENGTH_FIELD_SIZE)
    }

    /// Returns true if the two regions share at least one byte.
    pub const fn overlaps(&self, other: &Region) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && (self.offset as u64) < other.end()
            && (other.offset as u64) < self.end()
    }
}

/// Region assignment for the S3 data window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S3DataLayout {
    regions: [Region; S3DataKind::COUNT],
    window: Region,
    sector_size: u32,
}

impl S3DataLayout {
    /// Validates the configuration and assigns the regions.
    pub fn new(config: &S3DataConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    /// Assigns regions in window order. The configuration must already be validated.
    const fn from_valid_config(config: &S3DataConfig) -> Self {
        let volatile = Self::place(config.window_base as u64, config.volatile_capacity);
        let range_config = Self::place(volatile.end(), config.range_config_capacity);
        let non_volatile = Self::place(range_config.end(), config.non_volatile_capacity);

        // Indexed by `S3DataKind` discriminant.
        Self {
            regions: [non_volatile, volatile, range_config],
            window: Region { offset: config.window_base, capacity: config.window_capacity },
            sector_size: config.sector_size,
        }
    }

    /// Places a region at `offset`. A validated window ends at or below 4 GiB, so only an empty region that follows
    /// everything else can start past the last device offset.
    const fn place(offset: u64, capacity: u32) -> Region {
        if offset > u32::MAX as u64 {
            return Region::EMPTY;
        }
        Region { offset: offset as u32, capacity }
    }

    /// Returns the region that holds `kind`.
    pub const fn locate(&self, kind: S3DataKind) -> Region {
        self.regions[kind.index()]
    }

    /// Returns the region for a raw data tag, or [`Region::EMPTY`] if the tag is not a known kind.
    pub const fn locate_raw(&self, tag: u32) -> Region {
        match S3DataKind::from_raw(tag) {
            Some(kind) => self.locate(kind),
            None => Region::EMPTY,
        }
    }

    /// The whole storage window.
    pub const fn window(&self) -> Region {
        self.window
    }

    /// Erase granularity of the underlying flash.
    pub const fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Iterates over the regions in window order.
    pub fn iter(&self) -> impl Iterator<Item = (S3DataKind, Region)> + '_ {
        S3DataKind::WINDOW_ORDER.into_iter().map(move |kind| (kind, self.locate(kind)))
    }
}
