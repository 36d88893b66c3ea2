//! S3 Data Integration Tests
//!
//! Runs a full suspend and resume cycle through the public [`S3DataStore`] API against an in-memory flash.
//!
//! ## Logging
//!
//! The `env_logger` crate can be used to enable logging during tests. Set the `RUST_LOG` environment variable to the
//! desired log level before running the tests, for example:
//!
//! ```sh
//! RUST_LOG=s3_data=debug cargo make test -p patina_s3_data --test s3_data_integration
//! ```
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent

use std::sync::Once;

use patina_s3_data::{
    MappedWindow, S3DataError, S3DataKind, S3DataStore,
    config::S3DataConfig,
    ram_flash::RamFlash,
    range_config::RangeConfigBackend,
    reservation::{NoReservation, ReservationId, ResumeMemoryReservation},
    save::{RegionOutcome, S3SaveParams},
};
use r_efi::efi;

static INIT: Once = Once::new();

fn init_logger() {
    INIT.call_once(|| {
        // Default to no logging unless RUST_LOG environment variable is set
        let mut builder = env_logger::Builder::from_default_env();

        if std::env::var("RUST_LOG").is_err() {
            builder.filter_level(log::LevelFilter::Off);
        }

        builder.init();
    });
}

const WINDOW_BASE: u32 = 0x00FF_0000;
const FLASH_SIZE: usize = 0x0100_0000;

/// Range configuration registers modeled as a byte array.
#[derive(Default)]
struct FakeRanges {
    registers: Vec<u8>,
    restored: Option<Vec<u8>>,
}

impl RangeConfigBackend for FakeRanges {
    fn backup(&mut self, buffer: &mut [u8]) -> usize {
        let length = self.registers.len().min(buffer.len());
        buffer[..length].copy_from_slice(&self.registers[..length]);
        self.registers.len()
    }

    fn restore(&mut self, snapshot: &[u8]) {
        self.restored = Some(snapshot.to_vec());
    }
}

/// Records reservations instead of touching a memory map.
#[derive(Default)]
struct RecordingReservation {
    reserved: Vec<(ReservationId, u32)>,
}

impl ResumeMemoryReservation for RecordingReservation {
    fn reserve(&mut self, id: ReservationId, size: u32) -> Result<(), efi::Status> {
        self.reserved.push((id, size));
        Ok(())
    }
}

fn window(flash: &RamFlash) -> MappedWindow<'_> {
    let start = WINDOW_BASE as usize;
    MappedWindow::new(WINDOW_BASE, &flash.bytes()[start..start + 0x8000])
}

#[test]
fn test_suspend_resume_cycle() {
    init_logger();
    let store = S3DataStore::new(&S3DataConfig::default()).unwrap();
    let mut flash = RamFlash::new(FLASH_SIZE, 0x1000);
    let mut ranges = FakeRanges { registers: vec![0x55; 64], ..Default::default() };

    let report = store.save(
        &mut flash,
        &mut ranges,
        &mut NoReservation,
        S3SaveParams { non_volatile: &[0xAA, 0xBB, 0xCC], volatile: &[] },
    );

    assert!(report.is_success());
    assert_eq!(report.outcome(S3DataKind::NonVolatile), RegionOutcome::Saved { length: 3 });
    assert_eq!(report.outcome(S3DataKind::Volatile), RegionOutcome::Skipped);
    assert_eq!(report.outcome(S3DataKind::RangeConfig), RegionOutcome::Saved { length: 64 });

    let volatile = store.locate(S3DataKind::Volatile);
    let start = volatile.offset as usize;
    assert!(flash.bytes()[start..start + volatile.capacity as usize].iter().all(|b| *b == 0xFF));

    // Resume: only the mapped window is available.
    let window = window(&flash);

    let nv = store.early_restore(&window).unwrap();
    assert_eq!(nv.len(), 3);
    assert_eq!(nv.as_bytes(), &[0xAA, 0xBB, 0xCC]);
    assert_eq!(nv.offset(), store.locate(S3DataKind::NonVolatile).offset + 4);

    assert!(store.late_restore(&window).is_none());

    let snapshot = store.saved_range_config(&window).unwrap();
    assert_eq!(snapshot.len(), 64);
    assert!(store.restore_range_config(&window, &mut ranges));
    assert_eq!(ranges.restored.as_deref(), Some(&[0x55; 64][..]));
}

#[test]
fn test_second_suspend_replaces_saved_data() {
    init_logger();
    let store = S3DataStore::new(&S3DataConfig::default()).unwrap();
    let mut flash = RamFlash::new(FLASH_SIZE, 0x1000);
    let mut ranges = FakeRanges { registers: vec![0x11; 32], ..Default::default() };

    store.save(
        &mut flash,
        &mut ranges,
        &mut NoReservation,
        S3SaveParams { non_volatile: &[1; 100], volatile: &[2; 0x5000] },
    );

    ranges.registers = vec![0x22; 16];
    let report = store.save(
        &mut flash,
        &mut ranges,
        &mut NoReservation,
        S3SaveParams { non_volatile: &[3; 10], volatile: &[4; 20] },
    );
    assert!(report.is_success());

    let window = window(&flash);
    assert_eq!(store.early_restore(&window).unwrap().as_bytes(), &[3; 10]);
    assert_eq!(store.late_restore(&window).as_deref(), Some(&[4; 20][..]));
    assert_eq!(store.saved_range_config(&window).unwrap().as_bytes(), &[0x22; 16]);
}

#[test]
fn test_failed_region_does_not_block_the_others() {
    init_logger();
    let store = S3DataStore::new(&S3DataConfig::default()).unwrap();
    let mut flash = RamFlash::new(FLASH_SIZE, 0x1000);
    flash.fail_erase_at(store.locate(S3DataKind::Volatile).offset);
    let mut ranges = FakeRanges { registers: vec![0x33; 8], ..Default::default() };

    let report = store.save(
        &mut flash,
        &mut ranges,
        &mut NoReservation,
        S3SaveParams { non_volatile: &[5; 4], volatile: &[6; 4] },
    );

    assert!(!report.is_success());
    assert_eq!(
        report.into_result(),
        Err(S3DataError::EraseFailed { kind: S3DataKind::Volatile, status: efi::Status::DEVICE_ERROR })
    );
    assert_eq!(efi::Status::from(report.errors().next().unwrap()), efi::Status::DEVICE_ERROR);
    assert!(!flash.is_bus_claimed());

    let window = window(&flash);
    assert_eq!(store.early_restore(&window).unwrap().as_bytes(), &[5; 4]);
    assert!(store.late_restore(&window).is_none());
    assert_eq!(store.saved_range_config(&window).unwrap().as_bytes(), &[0x33; 8]);
}

#[test]
fn test_missing_flash_degrades_to_no_prior_state() {
    init_logger();
    let config = S3DataConfig::default().with_resume_reservations(0x10000, 0x8000);
    let store = S3DataStore::new(&config).unwrap();
    let mut flash = RamFlash::new(FLASH_SIZE, 0x1000);
    flash.set_present(false);
    let mut ranges = FakeRanges { registers: vec![0x44; 8], ..Default::default() };
    let mut reserver = RecordingReservation::default();

    let report = store.save(
        &mut flash,
        &mut ranges,
        &mut reserver,
        S3SaveParams { non_volatile: &[1], volatile: &[2] },
    );

    assert_eq!(
        reserver.reserved,
        vec![(ReservationId::RomstageStack, 0x10000), (ReservationId::ResumeScratch, 0x8000)]
    );
    assert_eq!(report.errors().count(), 3);
    assert!(report.errors().all(|err| err == S3DataError::StorageUnavailable));
    assert_eq!(flash.erase_count(), 0);

    let window = window(&flash);
    assert!(store.early_restore(&window).is_none());
    assert!(store.late_restore(&window).is_none());
    assert!(!store.restore_range_config(&window, &mut ranges));
    assert!(ranges.restored.is_none());
}

#[test]
fn test_oversized_range_config_is_rejected() {
    init_logger();
    let store = S3DataStore::new(&S3DataConfig::default()).unwrap();
    let mut flash = RamFlash::new(FLASH_SIZE, 0x1000);
    let mut ranges = FakeRanges { registers: vec![0x77; 0x2000], ..Default::default() };

    let report = store.save(&mut flash, &mut ranges, &mut NoReservation, S3SaveParams::default());

    assert_eq!(
        report.outcome(S3DataKind::RangeConfig),
        RegionOutcome::Failed(S3DataError::CapacityExceeded {
            kind: S3DataKind::RangeConfig,
            requested: 0x2000,
            available: 0xFFC
        })
    );
    assert!(store.saved_range_config(&window(&flash)).is_none());
}

#[test]
fn test_interrupted_payload_write_restores_nothing() {
    init_logger();
    let store = S3DataStore::new(&S3DataConfig::default()).unwrap();
    let mut flash = RamFlash::new(FLASH_SIZE, 0x1000);
    flash.fail_write_at(store.locate(S3DataKind::NonVolatile).payload_offset());

    let report = store.save(
        &mut flash,
        &mut FakeRanges::default(),
        &mut NoReservation,
        S3SaveParams { non_volatile: &[0xAA, 0xBB, 0xCC], volatile: &[] },
    );

    assert!(matches!(
        report.outcome(S3DataKind::NonVolatile),
        RegionOutcome::Failed(S3DataError::WriteFailed { kind: S3DataKind::NonVolatile, .. })
    ));
    assert!(store.early_restore(&window(&flash)).is_none());
}
