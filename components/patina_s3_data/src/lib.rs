//! S3 Resume Data Persistence
//!
//! Persists the silicon initialization data needed to resume from S3 (suspend-to-RAM) in a dedicated window of the
//! platform SPI flash. On wake, the saved data lets firmware restore memory controller and cache range configuration
//! without repeating full hardware discovery.
//!
//! ## Storage Layout
//!
//! The S3 data window is split into three fixed regions. Each region holds at most one blob, stored as a 4-byte
//! little-endian length followed by the payload. There is no header, signature, or version.
//!
//! ```text
//! window_base
//!  + 0                                      : Volatile    [u32 length][payload]
//!  + volatile_capacity                      : RangeConfig [u32 length][payload]
//!  + volatile_capacity + range_config_cap   : NonVolatile [u32 length][payload]
//! ```
//!
//! ## Boot Phases
//!
//! - **Suspend**: [`S3DataStore::save`] writes the non-volatile and volatile blobs handed over by the silicon init
//!   library, plus a fresh snapshot of the CPU range configuration (MTRRs).
//! - **Early resume** (pre-memory): [`S3DataStore::early_restore`] returns a [`BlobView`] of the non-volatile blob
//!   that borrows the memory-mapped flash directly.
//! - **Late resume** (heap available): [`S3DataStore::late_restore`] copies the volatile blob into a heap buffer the
//!   caller owns.
//! - **CPU enumeration**: [`S3DataStore::saved_range_config`] and [`S3DataStore::restore_range_config`] expose the
//!   range configuration snapshot.
//!
//! ## Examples and Usage
//!
//! ```rust
//! use patina_s3_data::{config::S3DataConfig, ram_flash::RamFlash, store::S3DataStore};
//! use patina_s3_data::range_config::NoRangeConfig;
//! use patina_s3_data::reservation::NoReservation;
//! use patina_s3_data::save::S3SaveParams;
//!
//! const CONFIG: S3DataConfig = S3DataConfig::new(0, 0x8000, 0x6000, 0x1000, 0x1000);
//!
//! let store = S3DataStore::new(&CONFIG).unwrap();
//! let mut flash = RamFlash::new(0x8000, 0x1000);
//!
//! let report = store.save(
//!     &mut flash,
//!     &mut NoRangeConfig,
//!     &mut NoReservation,
//!     S3SaveParams { non_volatile: &[0xAA, 0xBB, 0xCC], volatile: &[] },
//! );
//! assert!(report.is_success());
//!
//! let window = flash.mapped();
//! let nv = store.early_restore(&window).unwrap();
//! assert_eq!(nv.as_bytes(), &[0xAA, 0xBB, 0xCC]);
//! assert!(store.late_restore(&window).is_none());
//! ```
//!
//! ## Logging
//!
//! All logging from this crate uses the `s3_data` log target.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
#![cfg_attr(all(not(feature = "std"), not(test), not(feature = "mockall")), no_std)]

extern crate alloc;

pub mod codec;
pub mod config;
pub mod error;
pub mod layout;
pub mod ram_flash;
pub mod range_config;
pub mod reservation;
pub mod restore;
pub mod save;
pub mod storage;
pub mod store;

pub use error::{ConfigError, S3DataError};
pub use layout::{Region, S3DataKind, S3DataLayout};
pub use storage::{BlobView, MappedWindow, SpiFlash};
pub use store::S3DataStore;

/// Log target used by every message emitted from this crate.
pub(crate) const LOG_TARGET: &str = "s3_data";
